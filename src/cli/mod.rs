mod commands;
mod handlers;

pub use commands::{Cli, Commands};
pub use handlers::{
    find_docket_dir, handle_delete, handle_edit, handle_export, handle_import, handle_init,
    handle_list, handle_move, handle_new, handle_open, handle_show, init_logging,
};
