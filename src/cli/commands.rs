use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "docket")]
#[command(version, about = "A local-first markdown note manager")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new docket project in the current directory
    Init,

    /// Create a new note and make it active
    New {
        /// Note title
        #[arg(long, short = 't')]
        title: Option<String>,

        /// Read the body from stdin
        #[arg(long)]
        stdin: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List notes in order
    List {
        /// List deleted note UUIDs instead
        #[arg(long)]
        deleted: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a note (the active note by default)
    Show {
        /// Position like "2" or UUID prefix like "a1b2c"
        id: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Make a note active
    Open {
        /// Position like "2" or UUID prefix like "a1b2c"
        id: String,
    },

    /// Edit the active note
    Edit {
        /// New title
        #[arg(long, short = 't')]
        title: Option<String>,

        /// Read the new body from stdin
        #[arg(long)]
        stdin: bool,
    },

    /// Move a note to another position
    Move {
        /// Position like "2" or UUID prefix like "a1b2c"
        id: String,

        /// Zero-based target position
        position: usize,
    },

    /// Delete the active note
    Delete {
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
    },

    /// Write the active note to <title>.md
    Export {
        /// Output directory (defaults to the current directory)
        #[arg(long, short = 'd')]
        dir: Option<String>,
    },

    /// Import notes from a JSON export, including the older listOrder shape
    Import {
        /// Path to a JSON array of note records
        file: String,
    },
}
