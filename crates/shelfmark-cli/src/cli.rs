use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "shelfmark")]
#[command(about = "Keep bookmarks locally, sync them when a server is around")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Quick capture: shelfmark <URL> [TITLE...]
    #[arg(trailing_var_arg = true)]
    pub capture: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Save a link
    #[command(alias = "new")]
    Add {
        /// Link URL
        url: String,
        /// Optional title (URL host when omitted)
        title: Vec<String>,
        /// Optional note
        #[arg(short, long, default_value = "")]
        note: String,
        /// Destination folder name
        #[arg(short, long)]
        folder: Option<String>,
        /// Tags to attach
        #[arg(short, long)]
        tag: Vec<String>,
        /// Mark as important
        #[arg(long)]
        important: bool,
    },
    /// List links
    List {
        /// Number of links to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Only links in this folder
        #[arg(short, long)]
        folder: Option<String>,
        /// Only important links
        #[arg(long)]
        important: bool,
        /// Only archived links
        #[arg(long)]
        archived: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Operate on individual links
    Link {
        #[command(subcommand)]
        command: LinkCommands,
    },
    /// Manage folders
    Folder {
        #[command(subcommand)]
        command: FolderCommands,
    },
    /// Manage panels (pinned folder groups)
    Panel {
        #[command(subcommand)]
        command: PanelCommands,
    },
    /// Manage tags
    Tag {
        #[command(subcommand)]
        command: TagCommands,
    },
    /// Run a reconciliation pass against the sync server
    Sync,
    /// Inspect or drain the pending sync queue
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },
    /// Create, export, import, and prune snapshots
    Snapshot {
        #[command(subcommand)]
        command: SnapshotCommands,
    },
    /// Show or change sync configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum LinkCommands {
    /// Edit a link's url, title, or note
    Edit {
        /// Link id
        id: i64,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        note: Option<String>,
    },
    /// Move links to a folder (or to unfiled)
    Move {
        /// Link ids
        ids: Vec<i64>,
        /// Destination folder name; omit for unfiled
        #[arg(short, long)]
        folder: Option<String>,
    },
    /// Archive links
    Archive {
        /// Link ids
        ids: Vec<i64>,
    },
    /// Bring links back from the archive
    Unarchive {
        /// Link ids
        ids: Vec<i64>,
    },
    /// Toggle the important flag
    Important {
        /// Link id
        id: i64,
        /// Clear instead of set
        #[arg(long)]
        off: bool,
    },
    /// Delete links
    Delete {
        /// Link ids
        ids: Vec<i64>,
    },
}

#[derive(Subcommand)]
pub enum FolderCommands {
    /// Create a folder
    Add {
        /// Folder name
        name: String,
        /// Parent folder name (root when omitted)
        #[arg(short, long)]
        parent: Option<String>,
        /// Optional note
        #[arg(short, long, default_value = "")]
        note: String,
    },
    /// List folders as a tree
    List {
        /// Include archived folders
        #[arg(long)]
        archived: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rename a folder
    Rename {
        /// Current folder name
        name: String,
        /// New name
        new_name: String,
    },
    /// Move a folder under another parent (or to root)
    Move {
        /// Folder name
        name: String,
        /// New parent folder name; omit for root
        #[arg(short, long)]
        parent: Option<String>,
    },
    /// Archive or unarchive a folder
    Archive {
        /// Folder name
        name: String,
        /// Unarchive instead
        #[arg(long)]
        off: bool,
    },
    /// Delete a folder (its links become unfiled)
    Delete {
        /// Folder name
        name: String,
    },
}

#[derive(Subcommand)]
pub enum PanelCommands {
    /// Create a panel
    Add {
        /// Panel name
        name: String,
    },
    /// List panels with their pinned folders
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rename a panel
    Rename {
        /// Current panel name
        name: String,
        /// New name
        new_name: String,
    },
    /// Delete a panel
    Delete {
        /// Panel name
        name: String,
    },
    /// Pin a folder onto a panel
    Pin {
        /// Panel name
        panel: String,
        /// Folder name
        folder: String,
        /// Position within the panel
        #[arg(short, long, default_value = "0")]
        position: i64,
    },
    /// Unpin a folder from a panel
    Unpin {
        /// Panel name
        panel: String,
        /// Folder name
        folder: String,
    },
}

#[derive(Subcommand)]
pub enum TagCommands {
    /// List tags with usage counts
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Attach a tag to a link (creates the tag when needed)
    Attach {
        /// Link id
        link_id: i64,
        /// Tag name
        name: String,
    },
    /// Detach a tag from a link
    Detach {
        /// Link id
        link_id: i64,
        /// Tag name
        name: String,
    },
    /// Rename a tag
    Rename {
        /// Current tag name
        name: String,
        /// New name
        new_name: String,
    },
    /// Delete a tag everywhere
    Delete {
        /// Tag name
        name: String,
    },
}

#[derive(Subcommand)]
pub enum QueueCommands {
    /// Show queued operations
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replay queued operations against the server
    Drain,
    /// Drop every queued operation without replaying it
    Clear,
}

#[derive(Subcommand)]
pub enum SnapshotCommands {
    /// Capture a snapshot of the full dataset
    Take {
        /// Snapshot format
        #[arg(long, value_enum, default_value_t = SnapshotFormatArg::Json)]
        format: SnapshotFormatArg,
    },
    /// List stored snapshots
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write a stored snapshot to a file
    Export {
        /// Snapshot id
        id: i64,
        /// Output directory (current directory when omitted)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
    },
    /// Import a JSON snapshot file
    Import {
        /// Path to the snapshot file
        path: PathBuf,
    },
    /// Remove old snapshots
    Prune {
        /// Drop snapshots older than this many days
        #[arg(long)]
        max_age_days: Option<i64>,
        /// Keep at most this many snapshots
        #[arg(long)]
        keep: Option<usize>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current sync configuration
    Show,
    /// Set the sync server base URL
    SetServer {
        /// Server URL, e.g. <https://sync.example.com>
        url: String,
    },
    /// Set the sync bearer token
    SetToken {
        /// Bearer token
        token: String,
    },
    /// Set the allowed sync direction
    SetSyncType {
        /// One of: client-to-server, server-to-client, two-way
        value: String,
    },
    /// Remove server URL and token, disabling sync
    Reset,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum SnapshotFormatArg {
    Json,
    Html,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
