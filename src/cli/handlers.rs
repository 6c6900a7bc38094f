use std::env;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::config::{DocketConfig, CONFIG_FILE};
use crate::entity::{LegacyNote, Note, NoteTemplate};
use crate::error::{DocketError, Result};
use crate::notes::{ActiveNoteController, NoteStore};
use crate::storage::SqliteStore;

const DOCKET_DIR: &str = ".docket";

/// Install the stderr log subscriber. `RUST_LOG` wins over the config.
pub fn init_logging(default_level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .try_init();
}

/// Find the project root by looking for .docket/ or .git/
fn find_project_root() -> PathBuf {
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    let mut current = cwd.as_path();
    loop {
        if current.join(DOCKET_DIR).exists() || current.join(".git").exists() {
            return current.to_path_buf();
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return cwd,
        }
    }
}

/// The project's .docket/ directory, if one exists
pub fn find_docket_dir() -> Option<PathBuf> {
    let dir = find_project_root().join(DOCKET_DIR);
    dir.is_dir().then_some(dir)
}

/// Open the database, load the store and restore the active note.
async fn open_workspace() -> Result<ActiveNoteController> {
    let dir = find_docket_dir().ok_or(DocketError::NotInitialized)?;
    let config = DocketConfig::load(&dir)?;

    let backend = SqliteStore::open(&dir.join(&config.database))?;
    let mut store = NoteStore::new(backend).with_default_title(config.default_title.clone());
    store.load().await?;

    let mut controller =
        ActiveNoteController::new(store).with_untitled_placeholder(config.untitled_placeholder);
    controller.initialize().await?;
    Ok(controller)
}

fn short_id(uuid: &Uuid) -> String {
    uuid.to_string()[..7].to_string()
}

fn format_millis(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ms.to_string())
}

fn read_stdin() -> Result<String> {
    let mut content = String::new();
    io::stdin().read_to_string(&mut content)?;
    Ok(content)
}

/// Resolve a position ("2") or UUID prefix ("a1b2c") to a live note
fn resolve_id(store: &NoteStore, id: &str) -> Result<Uuid> {
    if let Ok(position) = id.parse::<usize>() {
        return Ok(store.get_by_position(position)?.uuid);
    }

    let prefix = id.to_lowercase();
    let mut matches = store
        .ordered()
        .filter(|note| note.uuid.to_string().starts_with(&prefix));
    match (matches.next(), matches.next()) {
        (Some(note), None) => Ok(note.uuid),
        (Some(_), Some(_)) => Err(DocketError::InvalidArgument(format!(
            "'{}' matches more than one note",
            id
        ))),
        (None, _) => Err(DocketError::NotFound(id.to_string())),
    }
}

fn print_note(store: &NoteStore, note: &Note) {
    let position = store
        .position_of(&note.uuid)
        .map(|p| p.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!("{}", note.title);
    println!("  uuid:     {}", note.uuid);
    println!("  position: {}", position);
    println!("  updated:  {}", format_millis(note.last_updated));
    if !note.body.is_empty() {
        println!();
        println!("{}", note.body);
    }
}

pub fn handle_init() -> Result<()> {
    let root = env::current_dir()?;
    let dir = root.join(DOCKET_DIR);

    if dir.exists() {
        return Err(DocketError::AlreadyInitialized);
    }

    fs::create_dir_all(&dir)?;
    let config = DocketConfig::default();
    fs::write(dir.join(CONFIG_FILE), serde_yaml::to_string(&config)?)?;
    SqliteStore::open(&dir.join(&config.database))?;

    println!("Initialized docket project in {}", root.display());
    Ok(())
}

pub async fn handle_new(title: Option<String>, stdin: bool, json: bool) -> Result<()> {
    let mut controller = open_workspace().await?;

    let body = if stdin { Some(read_stdin()?) } else { None };
    let note = controller.new_note(NoteTemplate { title, body }).await?;
    let position = controller.store().position_of(&note.uuid).unwrap_or_default();
    controller.close().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&note)?);
    } else {
        println!(
            "Created note {} ({}) - {}",
            position,
            short_id(&note.uuid),
            note.title
        );
    }
    Ok(())
}

pub async fn handle_list(deleted: bool, json: bool) -> Result<()> {
    let controller = open_workspace().await?;
    let store = controller.store();

    if deleted {
        let mut tombstones: Vec<String> = store.tombstones().iter().map(Uuid::to_string).collect();
        tombstones.sort();
        if json {
            println!("{}", serde_json::to_string_pretty(&tombstones)?);
        } else if tombstones.is_empty() {
            println!("No deleted notes.");
        } else {
            for uuid in tombstones {
                println!("  {}", uuid);
            }
        }
        return Ok(());
    }

    let notes: Vec<&Note> = store.ordered().collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&notes)?);
        return Ok(());
    }

    let active = controller.active_uuid();
    println!("Notes:\n");
    for (position, note) in notes.iter().enumerate() {
        let marker = if Some(note.uuid) == active { '*' } else { ' ' };
        println!(
            "  {:>3} {} ({}) {}",
            position,
            marker,
            short_id(&note.uuid),
            note.title
        );
    }
    Ok(())
}

pub async fn handle_show(id: Option<String>, json: bool) -> Result<()> {
    let controller = open_workspace().await?;
    let store = controller.store();

    let note = match id {
        Some(id) => store.get(&resolve_id(store, &id)?)?,
        None => controller.get_active()?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(note)?);
    } else {
        print_note(store, note);
    }
    Ok(())
}

pub async fn handle_open(id: String) -> Result<()> {
    let mut controller = open_workspace().await?;
    let uuid = resolve_id(controller.store(), &id)?;
    let note = controller.set_active(uuid).await?.clone();
    controller.close().await?;

    println!("Active: ({}) {}", short_id(&note.uuid), note.title);
    Ok(())
}

pub async fn handle_edit(title: Option<String>, stdin: bool) -> Result<()> {
    if title.is_none() && !stdin {
        return Err(DocketError::InvalidArgument(
            "nothing to edit: pass --title and/or --stdin".to_string(),
        ));
    }

    let mut controller = open_workspace().await?;
    let current = controller.get_active()?.clone();
    let title = title.unwrap_or(current.title);
    let body = if stdin { read_stdin()? } else { current.body };

    let saved = controller.save_active(title, body).await?;
    controller.close().await?;

    println!("Saved ({}) {}", short_id(&saved.uuid), saved.title);
    Ok(())
}

pub async fn handle_move(id: String, position: usize) -> Result<()> {
    let mut controller = open_workspace().await?;
    let uuid = resolve_id(controller.store(), &id)?;
    controller.move_note(&uuid, position).await?;
    controller.close().await?;

    let note = controller.store().get(&uuid)?;
    println!("Moved ({}) {} to {}", short_id(&uuid), note.title, position);
    Ok(())
}

pub async fn handle_delete(force: bool) -> Result<()> {
    let mut controller = open_workspace().await?;
    let note = controller.get_active()?.clone();

    // Confirm deletion unless --force is used
    let confirmed = if force {
        true
    } else {
        eprintln!(
            "Delete note ({}) - {}? [y/N] ",
            short_id(&note.uuid),
            note.title
        );

        // Check if stdin is a tty for interactive confirmation
        if atty::is(atty::Stream::Stdin) {
            let mut input = String::new();
            io::stdin().read_line(&mut input)?;
            input.trim().eq_ignore_ascii_case("y")
        } else {
            return Err(DocketError::InvalidArgument(
                "Use --force to delete in non-interactive mode".to_string(),
            ));
        }
    };

    let Some(outcome) = controller.delete_active(confirmed).await? else {
        println!("Cancelled.");
        return Ok(());
    };
    controller.close().await?;

    let active = controller.get_active()?;
    println!("Deleted ({}) {}", short_id(&outcome.removed), note.title);
    println!("Active: ({}) {}", short_id(&active.uuid), active.title);
    Ok(())
}

pub async fn handle_export(dir: Option<String>) -> Result<()> {
    let controller = open_workspace().await?;
    let dir = match dir {
        Some(dir) => PathBuf::from(dir),
        None => env::current_dir()?,
    };

    let path = controller.export_active(&dir).await?;
    println!("Exported to {}", path.display());
    Ok(())
}

pub async fn handle_import(file: String) -> Result<()> {
    let raw = fs::read_to_string(Path::new(&file))?;
    let records: Vec<LegacyNote> = serde_json::from_str(&raw)?;

    let mut controller = open_workspace().await?;
    let imported = controller.import_legacy(records).await?;
    controller.close().await?;

    println!("Imported {} notes", imported);
    Ok(())
}
