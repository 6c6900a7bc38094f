use clap::Parser;
use docket::cli::{
    find_docket_dir, handle_delete, handle_edit, handle_export, handle_import, handle_init,
    handle_list, handle_move, handle_new, handle_open, handle_show, init_logging, Cli, Commands,
};
use docket::DocketConfig;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = find_docket_dir()
        .and_then(|dir| DocketConfig::load(&dir).ok())
        .unwrap_or_default();
    init_logging(&config.log_level);

    let result = match cli.command {
        Commands::Init => handle_init(),
        Commands::New { title, stdin, json } => handle_new(title, stdin, json).await,
        Commands::List { deleted, json } => handle_list(deleted, json).await,
        Commands::Show { id, json } => handle_show(id, json).await,
        Commands::Open { id } => handle_open(id).await,
        Commands::Edit { title, stdin } => handle_edit(title, stdin).await,
        Commands::Move { id, position } => handle_move(id, position).await,
        Commands::Delete { force } => handle_delete(force).await,
        Commands::Export { dir } => handle_export(dir).await,
        Commands::Import { file } => handle_import(file).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
