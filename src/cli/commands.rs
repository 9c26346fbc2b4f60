use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "nk", about = concat!("notekeep v", env!("CARGO_PKG_VERSION"), " - notes and to-dos, pinned and archived"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Run against a different workspace directory
    #[arg(short = 'C', long = "data-dir", global = true)]
    pub data_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a notekeep workspace in the current directory
    Init(InitArgs),
    /// Show the signed-in user
    Whoami,
    /// Add a note, or a to-do with --todo
    Add(AddArgs),
    /// Change fields of an item
    Edit(EditArgs),
    /// List items, pinned first then newest
    List(ListArgs),
    /// Show one item
    Show(IdArg),
    /// Toggle the pin on an item
    Pin(IdArg),
    /// Move an item to the archive
    Archive(IdArg),
    /// Move every active item to the archive
    ArchiveAll(GroupArg),
    /// Bring an archived item back to the dashboard
    Restore(IdArg),
    /// Delete an item forever
    Delete(DeleteArgs),
    /// Delete everything in the archive forever
    Purge(PurgeArgs),
    /// Manage groups (local backend)
    Group(GroupCmd),
    /// Write all items as JSON
    Export(ExportArgs),
    /// Show the recovery log
    Recovery(RecoveryArgs),
}

// ---------------------------------------------------------------------------
// Init
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct InitArgs {
    /// Workspace name (default: inferred from directory name)
    #[arg(long)]
    pub name: Option<String>,
    /// Use the remote backend at this server origin
    #[arg(long, value_name = "URL")]
    pub remote: Option<String>,
    /// Owner name reported in local mode
    #[arg(long)]
    pub owner: Option<String>,
    /// Reinitialize even if .notekeep/ already exists
    #[arg(long)]
    pub force: bool,
}

// ---------------------------------------------------------------------------
// Item commands
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct GroupArg {
    /// Group to use (default: [local] default_group)
    #[arg(long, short = 'g')]
    pub group: Option<String>,
}

#[derive(Args)]
pub struct IdArg {
    /// Item ID
    pub id: String,
    #[command(flatten)]
    pub group: GroupArg,
}

#[derive(Args)]
pub struct AddArgs {
    /// Note content or task description
    pub body: String,
    /// Optional title
    #[arg(long)]
    pub title: Option<String>,
    /// Tag (default: general)
    #[arg(long)]
    pub tag: Option<String>,
    /// Create a to-do instead of a note
    #[arg(long)]
    pub todo: bool,
    /// Priority, lower is more urgent (to-dos only)
    #[arg(long, requires = "todo")]
    pub priority: Option<u32>,
    /// Due date as YYYY-MM-DD (to-dos only)
    #[arg(long, requires = "todo")]
    pub due: Option<String>,
    /// Pin the new item
    #[arg(long)]
    pub pin: bool,
    #[command(flatten)]
    pub group: GroupArg,
}

#[derive(Args)]
pub struct EditArgs {
    /// Item ID
    pub id: String,
    /// New title
    #[arg(long, conflicts_with = "clear_title")]
    pub title: Option<String>,
    /// Remove the title
    #[arg(long)]
    pub clear_title: bool,
    /// New content
    #[arg(long)]
    pub body: Option<String>,
    /// New tag
    #[arg(long)]
    pub tag: Option<String>,
    /// New priority (to-dos only)
    #[arg(long, conflicts_with = "clear_priority")]
    pub priority: Option<u32>,
    /// Remove the priority
    #[arg(long)]
    pub clear_priority: bool,
    /// New due date as YYYY-MM-DD (to-dos only)
    #[arg(long, conflicts_with = "clear_due")]
    pub due: Option<String>,
    /// Remove the due date
    #[arg(long)]
    pub clear_due: bool,
    #[command(flatten)]
    pub group: GroupArg,
}

#[derive(Args)]
pub struct ListArgs {
    /// Only items whose title, body or tag contain this text
    pub filter: Option<String>,
    /// Show the archive instead of the dashboard
    #[arg(long, conflicts_with = "all")]
    pub archived: bool,
    /// Show active and archived items
    #[arg(long)]
    pub all: bool,
    /// Order the listing by ascending priority
    #[arg(long)]
    pub by_priority: bool,
    #[command(flatten)]
    pub group: GroupArg,
}

#[derive(Args)]
pub struct DeleteArgs {
    /// Item ID
    pub id: String,
    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
    #[command(flatten)]
    pub group: GroupArg,
}

#[derive(Args)]
pub struct PurgeArgs {
    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
    #[command(flatten)]
    pub group: GroupArg,
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct GroupCmd {
    #[command(subcommand)]
    pub action: Option<GroupAction>,
}

#[derive(Subcommand)]
pub enum GroupAction {
    /// List groups with item counts (default)
    List,
    /// Create an empty group
    Add(GroupNameArg),
    /// Delete a group and all of its items
    Rm(GroupRmArgs),
    /// Make a group the default for later commands
    Use(GroupNameArg),
}

#[derive(Args)]
pub struct GroupNameArg {
    /// Group name (lowercase, digits, hyphens)
    pub name: String,
}

#[derive(Args)]
pub struct GroupRmArgs {
    /// Group name
    pub name: String,
    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

// ---------------------------------------------------------------------------
// Export and recovery
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ExportArgs {
    /// Write the positional [title, description, dueDate, priority] layout
    #[arg(long)]
    pub legacy: bool,
    /// Write to a file instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<String>,
    #[command(flatten)]
    pub group: GroupArg,
}

#[derive(Args)]
pub struct RecoveryArgs {
    /// Maximum number of entries to show
    #[arg(long, default_value = "10")]
    pub limit: usize,
}
