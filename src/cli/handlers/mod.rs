mod init;
pub use init::cmd_init;

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::codec;
use crate::io::adapter::PersistenceAdapter;
use crate::io::config_io;
use crate::io::data_dir::DataDir;
use crate::io::local_store::LocalStore;
use crate::io::recovery::{self, atomic_write};
use crate::io::remote::RemoteApi;
use crate::io::session::{LocalSession, SessionError, User, require_user};
use crate::model::collection::{Collection, Scope};
use crate::model::config::{BackendMode, Config};
use crate::model::item::{Item, ItemDraft, ItemId, ItemKind, ItemPatch};
use crate::model::workspace::Workspace;
use crate::ops::coordinator::{
    ConfirmGate, CoordinatorSettings, MutationCoordinator, MutationError, Notice, NoticeLevel,
    Notifier,
};
use crate::ops::group_ops::{self, GroupError};
use crate::ops::store::{self, Applied, Mutation};
use crate::ops::view::{self, ViewOptions, ViewScope};

type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// An error whose message was already shown to the user through the
/// notifier. `main` exits non-zero without printing it again.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct Reported(pub String);

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CmdResult {
    let json = cli.json;
    let start = match cli.data_dir.as_deref() {
        Some(dir) => std::fs::canonicalize(dir)
            .map_err(|e| format!("cannot resolve -C path '{}': {}", dir, e))?,
        None => std::env::current_dir()?,
    };

    match cli.command {
        // Init works on `start` itself rather than discovering upwards
        Commands::Init(args) => cmd_init(args, &start),
        Commands::Whoami => cmd_whoami(&start, json),

        Commands::Add(args) => cmd_add(args, &start, json),
        Commands::Edit(args) => cmd_edit(args, &start, json),
        Commands::List(args) => cmd_list(args, &start, json),
        Commands::Show(args) => cmd_show(args, &start, json),
        Commands::Pin(args) => cmd_flag(args, &start, json, Mutation::TogglePin),
        Commands::Archive(args) => cmd_flag(args, &start, json, Mutation::Archive),
        Commands::Restore(args) => cmd_flag(args, &start, json, Mutation::Restore),
        Commands::ArchiveAll(args) => cmd_archive_all(args, &start, json),
        Commands::Delete(args) => cmd_delete(args, &start, json),
        Commands::Purge(args) => cmd_purge(args, &start, json),

        Commands::Group(args) => cmd_group(args, &start, json),
        Commands::Export(args) => cmd_export(args, &start),
        Commands::Recovery(args) => cmd_recovery(args, &start, json),
    }
}

// ---------------------------------------------------------------------------
// Backend and session
// ---------------------------------------------------------------------------

enum Backend {
    Local(LocalStore),
    Remote(RemoteApi),
}

impl Backend {
    fn open(data: &DataDir) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(match data.config.backend.mode {
            BackendMode::Local => Backend::Local(LocalStore::open(data)?),
            BackendMode::Remote => Backend::Remote(RemoteApi::from_config(&data.config.remote)?),
        })
    }

    fn adapter(&mut self) -> &mut dyn PersistenceAdapter {
        match self {
            Backend::Local(store) => store,
            Backend::Remote(api) => api,
        }
    }

    fn current_user(&self, config: &Config) -> Result<(User, Scope), SessionError> {
        match self {
            Backend::Local(_) => require_user(&LocalSession::from_config(config)),
            Backend::Remote(api) => require_user(api),
        }
    }

    fn local(&mut self) -> Result<&mut LocalStore, Box<dyn std::error::Error>> {
        match self {
            Backend::Local(store) => Ok(store),
            Backend::Remote(_) => Err("groups are only available with the local backend".into()),
        }
    }
}

/// An opened workspace with a checked session and one loaded collection
struct Context {
    data: DataDir,
    backend: Backend,
    collection: Collection,
}

impl Context {
    fn open(start: &Path, group: Option<String>) -> Result<Self, Box<dyn std::error::Error>> {
        let data = DataDir::discover(start)?;
        let mut backend = Backend::open(&data)?;
        let (_user, owner_scope) = backend.current_user(&data.config)?;

        let scope = match &backend {
            Backend::Local(_) => {
                let name = group.unwrap_or_else(|| data.config.local.default_group.clone());
                group_ops::validate_group_name(&name)?;
                Scope::Group(name)
            }
            Backend::Remote(_) if group.is_some() => {
                return Err("--group is only available with the local backend".into());
            }
            Backend::Remote(_) => owner_scope,
        };
        let collection = backend.adapter().load(&scope)?;
        tracing::debug!(scope = %scope, items = collection.len(), "collection loaded");
        Ok(Context {
            data,
            backend,
            collection,
        })
    }

    fn coordinator(&self, assume_yes: bool, json: bool) -> MutationCoordinator<StderrNotifier, TerminalGate> {
        MutationCoordinator::new(
            StderrNotifier { quiet: json },
            TerminalGate { assume_yes },
            CoordinatorSettings {
                delete_delay: Duration::from_millis(self.data.config.ui.delete_delay_ms),
            },
        )
    }

    fn scope_name(&self) -> String {
        self.collection.scope.name().to_string()
    }

    /// Run one mutation through a fresh coordinator
    fn run(
        &mut self,
        mutation: Mutation,
        assume_yes: bool,
        json: bool,
    ) -> Result<Applied, Box<dyn std::error::Error>> {
        let mut coordinator = self.coordinator(assume_yes, json);
        coordinator
            .run(mutation, &mut self.collection, self.backend.adapter())
            .map_err(surface)
    }
}

/// Errors the coordinator already announced become [`Reported`]
fn surface(err: MutationError) -> Box<dyn std::error::Error> {
    match err {
        MutationError::ConfirmationAborted | MutationError::Busy(_) => err.into(),
        other => Box::new(Reported(other.to_string())),
    }
}

/// Prints notices to stderr. In JSON mode only errors are shown.
struct StderrNotifier {
    quiet: bool,
}

impl Notifier for StderrNotifier {
    fn notify(&mut self, notice: Notice) {
        match notice.level {
            NoticeLevel::Error => eprintln!("error: {}", notice.message),
            _ if self.quiet => {}
            NoticeLevel::Loading => eprintln!("{}", notice.message),
            NoticeLevel::Success => eprintln!("{}", notice.message),
        }
    }
}

/// Asks on stderr and reads the answer from stdin. End of input means no.
struct TerminalGate {
    assume_yes: bool,
}

impl ConfirmGate for TerminalGate {
    fn confirm(&mut self, prompt: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        eprint!("{} [y/N] ", prompt);
        let _ = std::io::stderr().flush();
        let mut answer = String::new();
        match std::io::stdin().lock().read_line(&mut answer) {
            Ok(_) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
            Err(_) => false,
        }
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| format!("invalid date '{}': expected YYYY-MM-DD", s))
}

fn print_item(item: &Item, json: bool) -> CmdResult {
    if json {
        println!("{}", serde_json::to_string_pretty(&item_to_json(item))?);
    } else {
        println!("{}", item.id);
    }
    Ok(())
}

fn print_applied(applied: &Applied, json: bool) -> CmdResult {
    match applied {
        Applied::Item(item) => print_item(item, json),
        Applied::Removed(id) => {
            if json {
                println!("{}", serde_json::json!({ "deleted": id.as_str() }));
            } else {
                println!("{}", id);
            }
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

fn cmd_whoami(start: &Path, json: bool) -> CmdResult {
    let data = DataDir::discover(start)?;
    let backend = Backend::open(&data)?;
    let (user, _) = backend.current_user(&data.config)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&user)?);
    } else if user.email.is_empty() {
        println!("{}", user.name);
    } else {
        println!("{} <{}>", user.name, user.email);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Item commands
// ---------------------------------------------------------------------------

fn cmd_add(args: AddArgs, start: &Path, json: bool) -> CmdResult {
    let mut ctx = Context::open(start, args.group.group)?;
    let kind = if args.todo {
        let due = args.due.as_deref().map(parse_date).transpose()?;
        ItemKind::todo(args.priority, due)
    } else {
        ItemKind::Note
    };
    let draft = ItemDraft {
        title: args.title,
        body: args.body,
        tag: args.tag,
        pinned: args.pin,
        kind,
    };
    let applied = ctx.run(Mutation::Create(draft), false, json)?;
    print_applied(&applied, json)
}

fn cmd_edit(args: EditArgs, start: &Path, json: bool) -> CmdResult {
    let mut ctx = Context::open(start, args.group.group)?;
    let patch = ItemPatch {
        title: if args.clear_title {
            Some(None)
        } else {
            args.title.map(Some)
        },
        body: args.body,
        tag: args.tag,
        priority: if args.clear_priority {
            Some(None)
        } else {
            args.priority.map(Some)
        },
        due: if args.clear_due {
            Some(None)
        } else {
            args.due.as_deref().map(parse_date).transpose()?.map(Some)
        },
    };
    if patch.is_empty() {
        return Err("nothing to change: pass at least one field flag".into());
    }
    let applied = ctx.run(Mutation::Update(ItemId::new(args.id), patch), false, json)?;
    print_applied(&applied, json)
}

fn cmd_list(args: ListArgs, start: &Path, json: bool) -> CmdResult {
    let ctx = Context::open(start, args.group.group)?;
    let options = ViewOptions {
        scope: if args.all {
            ViewScope::All
        } else if args.archived {
            ViewScope::Archived
        } else {
            ViewScope::Active
        },
        by_priority: args.by_priority,
    };
    let filter = args.filter.unwrap_or_default();
    let items = view::project(&ctx.collection, &filter, &options);
    let summary = view::summarize(&ctx.collection);

    if json {
        let out = ListJson {
            scope: ctx.scope_name(),
            summary,
            items: items.iter().map(|i| item_to_json(i)).collect(),
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        let lines = format_listing(
            &ctx.scope_name(),
            &summary,
            &items,
            ctx.data.config.ui.density,
            terminal_width(),
        );
        for line in &lines {
            println!("{}", line);
        }
    }
    Ok(())
}

fn cmd_show(args: IdArg, start: &Path, json: bool) -> CmdResult {
    let ctx = Context::open(start, args.group.group)?;
    let item = store::get(&ctx.collection, &ItemId::new(args.id))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&item_to_json(item))?);
    } else {
        for line in format_item_detail(item) {
            println!("{}", line);
        }
    }
    Ok(())
}

/// pin / archive / restore
fn cmd_flag(args: IdArg, start: &Path, json: bool, make: fn(ItemId) -> Mutation) -> CmdResult {
    let mut ctx = Context::open(start, args.group.group)?;
    let applied = ctx.run(make(ItemId::new(args.id)), false, json)?;
    print_applied(&applied, json)
}

fn cmd_archive_all(args: GroupArg, start: &Path, json: bool) -> CmdResult {
    let mut ctx = Context::open(start, args.group)?;
    let mut coordinator = ctx.coordinator(false, json);
    let count = coordinator
        .archive_all(&mut ctx.collection, ctx.backend.adapter())
        .map_err(surface)?;
    if json {
        println!("{}", serde_json::to_string(&CountJson { count })?);
    } else {
        println!("Archived {} item(s)", count);
    }
    Ok(())
}

fn cmd_delete(args: DeleteArgs, start: &Path, json: bool) -> CmdResult {
    let mut ctx = Context::open(start, args.group.group)?;
    let id = ItemId::new(args.id);
    // Keep a copy for the recovery log
    let doomed = ctx.collection.items.get(&id).cloned();
    let applied = ctx.run(Mutation::Delete(id), args.yes, json)?;
    if let Some(item) = doomed {
        recovery::log_item_deletion(&ctx.data.dir, &ctx.scope_name(), &item);
    }
    print_applied(&applied, json)
}

fn cmd_purge(args: PurgeArgs, start: &Path, json: bool) -> CmdResult {
    let mut ctx = Context::open(start, args.group.group)?;
    let archived: Vec<Item> = store::archived_ids(&ctx.collection)
        .iter()
        .filter_map(|id| ctx.collection.items.get(id).cloned())
        .collect();

    let mut coordinator = ctx.coordinator(args.yes, json);
    let result = coordinator.purge_archived(&mut ctx.collection, ctx.backend.adapter());

    // Log whatever went, even if the batch stopped early
    let scope = ctx.scope_name();
    for item in archived.iter().filter(|i| !ctx.collection.contains(&i.id)) {
        recovery::log_item_deletion(&ctx.data.dir, &scope, item);
    }

    let count = result.map_err(surface)?;
    if json {
        println!("{}", serde_json::to_string(&CountJson { count })?);
    } else {
        println!("Deleted {} archived item(s)", count);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

fn cmd_group(args: GroupCmd, start: &Path, json: bool) -> CmdResult {
    let data = DataDir::discover(start)?;
    let mut backend = Backend::open(&data)?;
    backend.current_user(&data.config)?;
    let store = backend.local()?;

    match args.action.unwrap_or(GroupAction::List) {
        GroupAction::List => {
            let groups = group_ops::list_groups(store);
            if json {
                println!("{}", serde_json::to_string_pretty(&groups)?);
            } else if groups.is_empty() {
                println!("(no groups yet; `nk add` creates \"{}\")", data.config.local.default_group);
            } else {
                for g in &groups {
                    let marker = if g.name == data.config.local.default_group {
                        "*"
                    } else {
                        " "
                    };
                    println!(
                        "{} {}  {} active, {} archived",
                        marker, g.name, g.counts.active, g.counts.archived
                    );
                }
            }
        }
        GroupAction::Add(arg) => {
            group_ops::create_group(store, &arg.name)?;
            eprintln!("Group {} created", arg.name);
        }
        GroupAction::Rm(arg) => {
            let mut gate = TerminalGate {
                assume_yes: arg.yes,
            };
            let removed = match group_ops::delete_group(store, &arg.name, &mut gate) {
                Ok(n) => n,
                Err(GroupError::ConfirmationAborted) => return Err("cancelled".into()),
                Err(e) => return Err(e.into()),
            };
            eprintln!("Group {} deleted with {} item(s)", arg.name, removed);
        }
        GroupAction::Use(arg) => {
            group_ops::validate_group_name(&arg.name)?;
            let (_, mut doc) = config_io::read_config(&data.dir)?;
            config_io::set_default_group(&mut doc, &arg.name);
            config_io::write_config(&data.dir, &doc)?;
            eprintln!("Default group is now {}", arg.name);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Export and recovery
// ---------------------------------------------------------------------------

fn cmd_export(args: ExportArgs, start: &Path) -> CmdResult {
    let mut ctx = Context::open(start, args.group.group.clone())?;

    let text = if args.legacy {
        codec::encode_legacy(&ctx.collection)?
    } else {
        let workspace = match ctx.backend.local() {
            Ok(store) if args.group.group.is_none() => store.workspace().clone(),
            _ => {
                let mut single = Workspace::default();
                single.put(ctx.collection.clone());
                single
            }
        };
        codec::encode_workspace(&workspace)?
    };

    match args.output {
        Some(path) => {
            let path = PathBuf::from(path);
            atomic_write(&path, text.as_bytes())?;
            eprintln!("Exported to {}", path.display());
        }
        None => print!("{}", text),
    }
    Ok(())
}

fn cmd_recovery(args: RecoveryArgs, start: &Path, json: bool) -> CmdResult {
    let data = DataDir::discover(start)?;
    let entries = recovery::read_recovery_entries(&data.dir, Some(args.limit));
    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else if entries.is_empty() {
        println!("Recovery log is empty");
    } else {
        for entry in &entries {
            print!("{}", entry.render());
        }
    }
    Ok(())
}
