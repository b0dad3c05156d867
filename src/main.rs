use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
mod auth;
use guardian_vault::{Record, Storage, Vault, default_storage, format, primary_status};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn resolve_storage(path: Option<PathBuf>) -> Result<Storage> {
    match path {
        Some(p) => Ok(Storage::new(p)),
        None => default_storage(),
    }
}

#[derive(Debug, Parser)]
#[command(name = "guardian")]
#[command(version, about = "Offline password vault using the portable .guardian format.")]
struct Cli {
    /// Path to the vault file
    #[arg(long, global = true, value_name = "PATH", env = "GUARDIAN_VAULT")]
    vault: Option<PathBuf>,

    /// Log debug events to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, clap::Args)]
struct RecordFields {
    /// Login name
    #[arg(short, long)]
    username: Option<String>,

    /// Site address
    #[arg(long)]
    url: Option<String>,

    /// Free-text notes
    #[arg(long)]
    notes: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Creates an empty vault
    Init,

    /// Adds a record
    #[command(arg_required_else_help = true)]
    Add {
        name: String,
        password: String,
        #[command(flatten)]
        fields: RecordFields,
    },

    /// Prints a record's password (by id or name)
    #[command(arg_required_else_help = true)]
    Get { record: String },

    /// Changes fields of a record (by id or name)
    #[command(arg_required_else_help = true)]
    Update {
        record: String,
        /// New password
        #[arg(short, long)]
        password: Option<String>,
        /// New display name
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        fields: RecordFields,
    },

    /// Removes a record (by id or name)
    #[command(arg_required_else_help = true)]
    Remove { record: String },

    /// Lists record names
    List {
        /// Print ids, usernames and modification times too
        #[arg(short, long, default_value_t = false)]
        all: bool,
    },

    /// Shows information about the vault
    Info,

    /// Changes the vault passphrase
    Passwd,

    /// Reports whether Argon2id is usable on this host
    Status,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("GUARDIAN_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open(path: Option<PathBuf>) -> Result<Vault> {
    let storage = resolve_storage(path)?;
    let passphrase = auth::read_passphrase()?;
    Vault::open_with_storage(passphrase, storage)
}

/// Id of the record matching `query` by id or name.
fn resolve_id(vault: &Vault, query: &str) -> Result<String> {
    match vault.find(query) {
        Some(record) => Ok(record.id.clone()),
        None => bail!("record '{query}' not found"),
    }
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let args = Cli::parse();
    init_tracing(args.verbose);

    match args.command {
        Commands::Init => {
            let storage = resolve_storage(args.vault)?;
            let passphrase = auth::read_passphrase()?;
            let vault = Vault::init_with_storage(passphrase, storage)?;
            println!("vault initialized at {}", vault.storage().path().display());
        }
        Commands::Add {
            name,
            password,
            fields,
        } => {
            let mut vault = open(args.vault)?;
            let mut record = Record::generate(&name, password);
            record.username = fields.username;
            record.url = fields.url;
            record.notes = fields.notes;
            let id = record.id.clone();

            vault.add(record)?;
            vault.save()?;
            println!("added '{name}' ({id})");
        }
        Commands::Get { record } => {
            let vault = open(args.vault)?;
            match vault.find(&record) {
                Some(found) => println!("{}", found.password),
                None => bail!("record '{record}' not found"),
            }
        }
        Commands::Update {
            record,
            password,
            name,
            fields,
        } => {
            let mut vault = open(args.vault)?;
            let id = resolve_id(&vault, &record)?;
            vault.update(&id, |r| {
                if let Some(password) = password {
                    r.password = password;
                }
                if let Some(name) = name {
                    r.name = name;
                }
                if fields.username.is_some() {
                    r.username = fields.username;
                }
                if fields.url.is_some() {
                    r.url = fields.url;
                }
                if fields.notes.is_some() {
                    r.notes = fields.notes;
                }
            })?;
            vault.save()?;
            println!("record '{record}' updated");
        }
        Commands::Remove { record } => {
            let mut vault = open(args.vault)?;
            let id = resolve_id(&vault, &record)?;
            let removed = vault.remove(&id)?;
            vault.save()?;
            println!("record '{}' removed", removed.name);
        }
        Commands::List { all } => {
            let vault = open(args.vault)?;
            let records = vault.records();

            if records.is_empty() {
                println!("No records stored.");
                return Ok(());
            }

            if !all {
                for record in records {
                    println!("{}", record.name);
                }
                return Ok(());
            }

            let id_w = records
                .iter()
                .map(|r| r.id.len())
                .chain(std::iter::once("Id".len()))
                .max()
                .unwrap_or(0);
            let name_w = records
                .iter()
                .map(|r| r.name.len())
                .chain(std::iter::once("Name".len()))
                .max()
                .unwrap_or(0);
            let user_w = records
                .iter()
                .map(|r| r.username.as_deref().map_or(0, str::len))
                .chain(std::iter::once("Username".len()))
                .max()
                .unwrap_or(0);

            println!("{:<id_w$}  {:<name_w$}  {:<user_w$}  Modified", "Id", "Name", "Username");
            println!("{:-<id_w$}  {:-<name_w$}  {:-<user_w$}  {:-<8}", "", "", "", "");
            for r in records {
                println!(
                    "{:<id_w$}  {:<name_w$}  {:<user_w$}  {}",
                    r.id,
                    r.name,
                    r.username.as_deref().unwrap_or(""),
                    r.last_modified
                );
            }
        }
        Commands::Info => {
            let vault = open(args.vault)?;
            let data = vault.storage().load()?;
            let container = format::parse(&data).context("vault file changed while reading")?;
            let payload = vault.payload();

            println!("Path:          {}", vault.storage().path().display());
            println!("Format:        v{}", container.version());
            println!("Size:          {} bytes", data.len());
            println!("Records:       {}", payload.len());
            println!("Created:       {}", payload.created_at());
            println!("Last modified: {}", payload.last_modified());
        }
        Commands::Passwd => {
            let mut vault = open(args.vault)?;
            let new_passphrase = auth::read_new_passphrase()?;
            vault.change_passphrase(new_passphrase)?;
            println!("passphrase changed");
        }
        Commands::Status => {
            let status = primary_status();
            let state = if status.available {
                "available"
            } else {
                "unavailable, using pbkdf2-hmac-sha256 fallback"
            };
            println!("{} (v{:#x}): {state}", status.algorithm, status.version);
        }
    }

    Ok(())
}
