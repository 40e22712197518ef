//! Quire CLI
//!
//! Command-line interface for Quire - notes, collections and friends.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use quire_core::{Account, Config, CoreError, ErrorKind, Quire};

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "quire")]
#[command(about = "Quire - notes, collections and the friends you share them with")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Act as this account
    #[arg(short, long, global = true)]
    user: Option<String>,

    /// Use this config file instead of the default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage accounts
    Account {
        #[command(subcommand)]
        command: AccountCommands,
    },
    /// Manage friends and friend requests
    Friend {
        #[command(subcommand)]
        command: FriendCommands,
    },
    /// Manage notes
    Note {
        #[command(subcommand)]
        command: NoteCommands,
    },
    /// Manage collections
    Collection {
        #[command(subcommand)]
        command: CollectionCommands,
    },
    /// List notes and collections together
    #[command(alias = "ls")]
    List {
        /// notes, collections or all (defaults to the configured filter)
        #[arg(short, long)]
        filter: Option<String>,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum AccountCommands {
    /// Register a new account
    #[command(alias = "add")]
    Create { username: String },
    /// Show an account and its relationships
    Show { username: String },
    /// Delete an account with everything it owns
    #[command(alias = "rm")]
    Delete {
        username: String,
        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum FriendCommands {
    /// Send a friend request
    Request { username: String },
    /// Accept a pending request
    Accept { username: String },
    /// Deny a pending request
    Deny { username: String },
    /// Withdraw a request you sent
    Cancel { username: String },
    /// End a friendship and revoke shared access both ways
    #[command(alias = "rm")]
    Remove { username: String },
    /// List friends and pending requests
    #[command(alias = "ls")]
    List,
}

#[derive(Subcommand)]
enum NoteCommands {
    /// Create a note
    #[command(alias = "add")]
    Create {
        title: String,
        /// Note body
        #[arg(short, long)]
        body: String,
        #[arg(short, long)]
        subject: Option<String>,
        /// Tags to add
        #[arg(short, long)]
        tag: Vec<String>,
        /// Syntax used for the body (e.g. markdown)
        #[arg(long)]
        syntax: Option<String>,
    },
    /// Edit a note; changes reach every collection holding it
    Edit {
        title: String,
        /// New title
        #[arg(short = 'T', long)]
        rename: Option<String>,
        #[arg(short, long)]
        body: Option<String>,
        #[arg(short, long)]
        subject: Option<String>,
        /// Replace tags
        #[arg(short, long)]
        tag: Vec<String>,
        #[arg(long)]
        syntax: Option<String>,
    },
    /// Show a note
    Show { title: String },
    /// List notes
    #[command(alias = "ls")]
    List,
    /// Delete a note and its snapshots
    #[command(alias = "rm")]
    Delete { title: String },
    /// Share a note with a friend
    Share { title: String, username: String },
    /// Stop sharing a note
    Unshare { title: String, username: String },
}

#[derive(Subcommand)]
enum CollectionCommands {
    /// Create a collection from existing notes
    #[command(alias = "add")]
    Create {
        title: String,
        /// Note to include (repeatable, in order)
        #[arg(short, long = "note", required = true)]
        notes: Vec<String>,
        #[arg(short, long)]
        subject: Option<String>,
        #[arg(short, long)]
        body: Option<String>,
        #[arg(short, long)]
        tag: Vec<String>,
    },
    /// Edit a collection
    Edit {
        title: String,
        #[arg(short = 'T', long)]
        rename: Option<String>,
        /// Replace the contents with these notes
        #[arg(short, long = "note")]
        notes: Vec<String>,
        #[arg(short, long)]
        subject: Option<String>,
        #[arg(short, long)]
        body: Option<String>,
        #[arg(short, long)]
        tag: Vec<String>,
    },
    /// Append notes to a collection
    Append { title: String, notes: Vec<String> },
    /// Remove a note's snapshots from a collection
    Remove { title: String, note: String },
    /// Reorder a collection (zero-based positions in the new order)
    Reorder {
        title: String,
        #[arg(required = true)]
        order: Vec<usize>,
    },
    /// Show a collection
    Show { title: String },
    /// List collections
    #[command(alias = "ls")]
    List,
    /// Delete a collection
    #[command(alias = "rm")]
    Delete { title: String },
    /// Share a collection with a friend
    Share { title: String, username: String },
    /// Stop sharing a collection
    Unshare { title: String, username: String },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, log_level, log_file, listing_filter)
        key: String,
        /// Configuration value
        value: String,
    },
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    if let Err(error) = run(cli, &output) {
        eprintln!("Error: {:#}", error);
        if let Some(hint) = partial_failure_note(&error) {
            eprintln!("{}", hint);
        }
        std::process::exit(exit_code(&error));
    }
}

fn run(cli: Cli, output: &Output) -> Result<()> {
    // Config commands work without opening the store
    if let Commands::Config { command } = &cli.command {
        return match command {
            Some(ConfigCommands::Show) | None => {
                commands::config::show(cli.config.as_ref(), output)
            }
            Some(ConfigCommands::Set { key, value }) => {
                commands::config::set(key, value, cli.config.as_ref(), output)
            }
        };
    }

    let config = load_config(cli.config.as_ref())?;
    init_logging(&config);

    let quire = Quire::open_with_config(config)?;

    match cli.command {
        Commands::Account { command } => handle_account_command(command, &quire, output),
        Commands::Friend { command } => {
            let me = acting_account(&quire, cli.user.as_deref())?;
            handle_friend_command(command, &quire, &me, output)
        }
        Commands::Note { command } => {
            let me = acting_account(&quire, cli.user.as_deref())?;
            handle_note_command(command, &quire, &me, output)
        }
        Commands::Collection { command } => {
            let me = acting_account(&quire, cli.user.as_deref())?;
            handle_collection_command(command, &quire, &me, output)
        }
        Commands::List { filter } => {
            let me = acting_account(&quire, cli.user.as_deref())?;
            commands::list::list(&quire, &me, filter.as_deref(), output)
        }
        Commands::Config { .. } => Ok(()),
    }
}

fn handle_account_command(command: AccountCommands, quire: &Quire, output: &Output) -> Result<()> {
    match command {
        AccountCommands::Create { username } => commands::account::create(quire, &username, output),
        AccountCommands::Show { username } => commands::account::show(quire, &username, output),
        AccountCommands::Delete { username, force } => {
            commands::account::delete(quire, &username, force, output)
        }
    }
}

fn handle_friend_command(
    command: FriendCommands,
    quire: &Quire,
    me: &Account,
    output: &Output,
) -> Result<()> {
    match command {
        FriendCommands::Request { username } => {
            commands::friend::request(quire, me, &username, output)
        }
        FriendCommands::Accept { username } => {
            commands::friend::decide(quire, me, &username, true, output)
        }
        FriendCommands::Deny { username } => {
            commands::friend::decide(quire, me, &username, false, output)
        }
        FriendCommands::Cancel { username } => {
            commands::friend::cancel(quire, me, &username, output)
        }
        FriendCommands::Remove { username } => {
            commands::friend::remove(quire, me, &username, output)
        }
        FriendCommands::List => commands::friend::list(quire, me, output),
    }
}

fn handle_note_command(
    command: NoteCommands,
    quire: &Quire,
    me: &Account,
    output: &Output,
) -> Result<()> {
    match command {
        NoteCommands::Create {
            title,
            body,
            subject,
            tag,
            syntax,
        } => commands::note::create(
            quire,
            me,
            commands::note::NoteArgs {
                title: Some(title),
                body: Some(body),
                subject,
                tags: tag,
                syntax,
            },
            output,
        ),
        NoteCommands::Edit {
            title,
            rename,
            body,
            subject,
            tag,
            syntax,
        } => commands::note::edit(
            quire,
            me,
            &title,
            commands::note::NoteArgs {
                title: rename,
                body,
                subject,
                tags: tag,
                syntax,
            },
            output,
        ),
        NoteCommands::Show { title } => commands::note::show(quire, me, &title, output),
        NoteCommands::List => commands::note::list(quire, me, output),
        NoteCommands::Delete { title } => commands::note::delete(quire, me, &title, output),
        NoteCommands::Share { title, username } => {
            commands::note::share(quire, me, &title, &username, true, output)
        }
        NoteCommands::Unshare { title, username } => {
            commands::note::share(quire, me, &title, &username, false, output)
        }
    }
}

fn handle_collection_command(
    command: CollectionCommands,
    quire: &Quire,
    me: &Account,
    output: &Output,
) -> Result<()> {
    use commands::collection::{self, CollectionArgs};

    match command {
        CollectionCommands::Create {
            title,
            notes,
            subject,
            body,
            tag,
        } => collection::create(
            quire,
            me,
            CollectionArgs {
                title: Some(title),
                subject,
                body,
                tags: tag,
            },
            &notes,
            output,
        ),
        CollectionCommands::Edit {
            title,
            rename,
            notes,
            subject,
            body,
            tag,
        } => collection::edit(
            quire,
            me,
            &title,
            CollectionArgs {
                title: rename,
                subject,
                body,
                tags: tag,
            },
            &notes,
            output,
        ),
        CollectionCommands::Append { title, notes } => {
            collection::append(quire, me, &title, &notes, output)
        }
        CollectionCommands::Remove { title, note } => {
            collection::remove(quire, me, &title, &note, output)
        }
        CollectionCommands::Reorder { title, order } => {
            collection::reorder(quire, me, &title, &order, output)
        }
        CollectionCommands::Show { title } => collection::show(quire, me, &title, output),
        CollectionCommands::List => collection::list(quire, me, output),
        CollectionCommands::Delete { title } => collection::delete(quire, me, &title, output),
        CollectionCommands::Share { title, username } => {
            collection::share(quire, me, &title, &username, true, output)
        }
        CollectionCommands::Unshare { title, username } => {
            collection::share(quire, me, &title, &username, false, output)
        }
    }
}

pub(crate) fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    };
    config.context("Failed to load configuration")
}

/// Resolve the account commands run as
fn acting_account(quire: &Quire, user: Option<&str>) -> Result<Account> {
    let username = user.context("No account given. Pass --user <username>.")?;
    Ok(quire.accounts().find_by_username(username)?)
}

/// Initialize tracing from the configured level, to stderr or the log file
fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|e| {
        eprintln!(
            "Warning: Invalid log level {:?}: {}",
            config.log_level, e
        );
        EnvFilter::new("warn")
    });

    let Some(log_path) = config.log_file.as_ref() else {
        // Ignore error if already initialized
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
        return;
    };

    let log_file = match OpenOptions::new().create(true).append(true).open(log_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not open log file {:?}: {}", log_path, e);
            return;
        }
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(Mutex::new(log_file))
        .try_init();
}

/// Exit status for a failed command, by error kind
fn exit_code(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<CoreError>().map(CoreError::kind) {
        Some(ErrorKind::Validation) => 2,
        Some(ErrorKind::Conflict) => 3,
        Some(ErrorKind::NotFound) => 4,
        Some(ErrorKind::StoreFault) | None => 1,
    }
}

/// Note for a store failure that struck after some writes had committed
fn partial_failure_note(error: &anyhow::Error) -> Option<String> {
    let completed = error.downcast_ref::<CoreError>()?.completed_writes();
    (completed > 0).then(|| format!("{completed} change(s) were saved before the failure."))
}
