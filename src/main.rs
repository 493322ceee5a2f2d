//! Clientbook CLI Entry Point
//!
//! Subcommands:
//! - `connect` / `connections` - manage saved database connections
//! - `init` / `drop` - create or drop the `client` and `phone` tables
//! - `find`, `add-client`, `add-phone`, `change`, `delete-phone`, `delete-client` -
//!   client book operations taking a JSON client descriptor
//!
//! All output to stdout is one JSON envelope. Logs go to stderr (and `--log-file`).
//! The exit code is 1 only when the database or the configuration is unusable.

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing::info;

use clientbook::logging::{self, DEFAULT_LEVEL};
use clientbook::{
    list_connections, resolve_connection, save_connection, ClientDescriptor, ClientbookError,
    ConfigLocation, ConnectionConfig, ConnectionInfo, DatabaseEngine, DatabaseType, ErrorEnvelope,
    ErrorInfo, Metadata, PhoneTarget, Phonebook, StoredConnection, SuccessEnvelope, Table,
};

/// Clientbook - clients and their phone numbers in `PostgreSQL` or `SQLite`
#[derive(Parser)]
#[command(name = "clientbook")]
#[command(version)]
struct Cli {
    /// Saved connection name (defaults to the project's default connection)
    #[arg(long, global = true)]
    connection: Option<String>,

    /// Project the connection belongs to (defaults to the current directory)
    #[arg(long, global = true)]
    project_path: Option<String>,

    /// Log level for stderr and the log file; `RUST_LOG` takes precedence
    #[arg(long, global = true, default_value = DEFAULT_LEVEL)]
    log_level: String,

    /// Also append logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a database connection and optionally save it
    Connect(ConnectArgs),

    /// List saved connections
    Connections,

    #[command(flatten)]
    Book(BookCommand),
}

#[derive(Subcommand)]
enum BookCommand {
    /// Create the client and phone tables
    Init,

    /// Drop the phone and client tables
    Drop,

    /// Show a client and all of its phone numbers
    Find {
        /// Client descriptor as JSON, e.g. '{"mail": "x@test"}'
        descriptor: String,
    },

    /// Add a client (name, surname and mail required) with optional phone numbers
    AddClient { descriptor: String },

    /// Add the descriptor's new_number values to a client
    AddPhone {
        descriptor: String,

        /// Skip resolution and use this client id
        #[arg(long)]
        client_id: Option<i64>,
    },

    /// Apply the descriptor's new_* values to a client
    Change { descriptor: String },

    /// Delete the descriptor's numbers, or every number of one client
    DeletePhone {
        #[arg(required_unless_present = "all_of")]
        descriptor: Option<String>,

        /// Delete every phone number of this client id
        #[arg(long, conflicts_with = "descriptor")]
        all_of: Option<i64>,
    },

    /// Delete a client and all of its phone numbers
    DeleteClient { descriptor: String },
}

#[derive(Args)]
struct ConnectArgs {
    #[arg(long, value_enum)]
    engine: EngineArg,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    #[arg(long)]
    user: Option<String>,

    /// Prompted for when neither this nor --password-env is given
    #[arg(long)]
    password: Option<String>,

    /// Environment variable holding the password; saved instead of the password
    #[arg(long)]
    password_env: Option<String>,

    #[arg(long)]
    database: Option<String>,

    /// Database file (sqlite)
    #[arg(long)]
    file: Option<PathBuf>,

    /// Save the validated connection under --connection (default name "default")
    #[arg(long, value_enum)]
    save: Option<SaveArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum EngineArg {
    Postgres,
    Sqlite,
}

#[derive(Clone, Copy, ValueEnum)]
enum SaveArg {
    Local,
    Global,
}

impl Commands {
    const fn name(&self) -> &'static str {
        match self {
            Self::Connect(_) => "connect",
            Self::Connections => "connections",
            Self::Book(command) => match command {
                BookCommand::Init => "init",
                BookCommand::Drop => "drop",
                BookCommand::Find { .. } => "find",
                BookCommand::AddClient { .. } => "add-client",
                BookCommand::AddPhone { .. } => "add-phone",
                BookCommand::Change { .. } => "change",
                BookCommand::DeletePhone { .. } => "delete-phone",
                BookCommand::DeleteClient { .. } => "delete-client",
            },
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let command = cli.command.name();

    if let Err(err) = logging::init_logging(&cli.log_level, cli.log_file.as_deref()) {
        return report_error("", command, &err.into());
    }

    let started = Instant::now();
    let (engine, outcome) = execute(&cli).await;
    let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    match outcome {
        Ok(data) => {
            let envelope = SuccessEnvelope::new(engine, command, data, Metadata::new(elapsed));
            print_json(&envelope);
            ExitCode::SUCCESS
        }
        Err(err) => report_error(&engine, command, &err),
    }
}

fn print_json(value: &impl serde::Serialize) {
    match serde_json::to_string(value) {
        Ok(line) => println!("{line}"),
        Err(e) => {
            println!(r#"{{"ok": false, "error": {{"code": "INTERNAL_ERROR", "message": "{e}"}}}}"#);
        }
    }
}

/// Print the error envelope; fatal errors end the process with status 1
fn report_error(engine: &str, command: &str, err: &anyhow::Error) -> ExitCode {
    let (envelope, fatal) = match err.downcast_ref::<ClientbookError>() {
        Some(err) => (ErrorEnvelope::from_error(engine, command, err), !err.is_recoverable()),
        None => (
            ErrorEnvelope::new(
                engine,
                command,
                ErrorInfo::new("INTERNAL_ERROR", format!("{err:#}")),
            ),
            true,
        ),
    };
    print_json(&envelope);
    if fatal {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Run the command; the engine name is empty when no connection was resolved
async fn execute(cli: &Cli) -> (String, anyhow::Result<Value>) {
    let (config, job) = match &cli.command {
        Commands::Connect(args) => match connect_config(args) {
            Ok(config) => (config, Job::Connect(args)),
            Err(err) => return (String::new(), Err(err)),
        },
        Commands::Connections => return (String::new(), connections()),
        Commands::Book(command) => {
            match resolve_connection(cli.project_path.as_deref(), cli.connection.as_deref()) {
                Ok(config) => (config, Job::Book(command)),
                Err(err) => return (String::new(), Err(err.into())),
            }
        }
    };

    let engine = config.engine.as_str().to_string();
    let outcome = match config.engine {
        #[cfg(feature = "sqlite")]
        DatabaseType::SQLite => run_with::<clientbook::SqliteEngine>(cli, job, config).await,
        #[cfg(not(feature = "sqlite"))]
        DatabaseType::SQLite => Err(ClientbookError::config_error(
            "SQLite engine not enabled. Build with --features sqlite",
        )
        .into()),

        #[cfg(feature = "postgres")]
        DatabaseType::Postgres => run_with::<clientbook::PostgresEngine>(cli, job, config).await,
        #[cfg(not(feature = "postgres"))]
        DatabaseType::Postgres => Err(ClientbookError::config_error(
            "PostgreSQL engine not enabled. Build with --features postgres",
        )
        .into()),
    };
    (engine, outcome)
}

fn connections() -> anyhow::Result<Value> {
    let listed: Vec<Value> = list_connections()?
        .into_iter()
        .map(|(project, name, config)| {
            json!({
                "project": project,
                "name": name,
                "engine": config.engine,
                "database": config.display_name(),
            })
        })
        .collect();
    Ok(json!({ "connections": listed }))
}

/// Build a config from `connect` flags, prompting for a missing postgres password
fn connect_config(args: &ConnectArgs) -> anyhow::Result<ConnectionConfig> {
    let config = match args.engine {
        EngineArg::Sqlite => {
            let file = args.file.clone().ok_or_else(|| {
                ClientbookError::config_error("Missing required field for sqlite: file")
            })?;
            ConnectionConfig::sqlite(file)
        }
        EngineArg::Postgres => {
            let password = match (&args.password, &args.password_env) {
                (Some(password), _) => password.clone(),
                (None, Some(env_var)) => std::env::var(env_var).map_err(|_| {
                    ClientbookError::config_error(format!(
                        "Environment variable {env_var} not found for password"
                    ))
                })?,
                (None, None) => dialoguer::Password::new()
                    .with_prompt("Password")
                    .interact()
                    .map_err(|e| {
                        ClientbookError::config_error(format!("Could not read password: {e}"))
                    })?,
            };
            ConnectionConfig {
                engine: DatabaseType::Postgres,
                host: args.host.clone(),
                port: args.port,
                user: args.user.clone(),
                password: Some(password),
                database: args.database.clone(),
                file: None,
            }
        }
    };
    Ok(config)
}

/// A command that needs a database connection
#[derive(Clone, Copy)]
enum Job<'a> {
    Connect(&'a ConnectArgs),
    Book(&'a BookCommand),
}

async fn run_with<E: DatabaseEngine>(
    cli: &Cli,
    job: Job<'_>,
    config: ConnectionConfig,
) -> anyhow::Result<Value> {
    match job {
        Job::Connect(args) => connect::<E>(cli, args, config).await,
        Job::Book(command) => {
            let book = Phonebook::<E>::connect(config).await?;
            run_book(&book, command).await
        }
    }
}

async fn connect<E: DatabaseEngine>(
    cli: &Cli,
    args: &ConnectArgs,
    config: ConnectionConfig,
) -> anyhow::Result<Value> {
    let info: ConnectionInfo = E::validate_connection(&config).await?;
    info!(
        database = %config.display_name(),
        version = %info.database_version,
        "Connection validated"
    );

    let Some(save) = args.save else {
        return Ok(json!({ "connection_info": info }));
    };

    let location = match save {
        SaveArg::Local => ConfigLocation::Local,
        SaveArg::Global => ConfigLocation::Global,
    };
    let name = cli.connection.clone().unwrap_or_else(|| "default".to_string());

    let mut stored = StoredConnection { config, password_env: args.password_env.clone() };
    if stored.password_env.is_some() {
        stored.config.password = None;
    }
    save_connection(cli.project_path.clone(), Some(name.clone()), stored, location)
        .with_context(|| format!("Failed to save connection '{name}'"))?;
    info!("Connection '{name}' saved");

    Ok(json!({ "connection_info": info, "connection_name": name }))
}

fn parse_descriptor(text: &str) -> Result<ClientDescriptor, ClientbookError> {
    serde_json::from_str(text)
        .map_err(|e| ClientbookError::invalid_input(format!("Invalid client descriptor: {e}")))
}

async fn run_book<E: DatabaseEngine>(
    book: &Phonebook<E>,
    command: &BookCommand,
) -> anyhow::Result<Value> {
    let data = match command {
        BookCommand::Init => {
            book.create_tables().await?;
            json!({ "tables": [Table::Client, Table::Phone] })
        }
        BookCommand::Drop => json!({ "dropped": book.drop_tables().await? }),
        BookCommand::Find { descriptor } => {
            serde_json::to_value(book.find_client(&parse_descriptor(descriptor)?).await?)?
        }
        BookCommand::AddClient { descriptor } => {
            serde_json::to_value(book.add_client(&parse_descriptor(descriptor)?).await?)?
        }
        BookCommand::AddPhone { descriptor, client_id } => {
            serde_json::to_value(book.add_phone(&parse_descriptor(descriptor)?, *client_id).await?)?
        }
        BookCommand::Change { descriptor } => {
            serde_json::to_value(book.change_client(&parse_descriptor(descriptor)?).await?)?
        }
        BookCommand::DeletePhone { descriptor, all_of } => {
            let descriptor = descriptor.as_deref().map(parse_descriptor).transpose()?;
            let target = match (all_of, &descriptor) {
                (Some(client_id), _) => PhoneTarget::AllOf(*client_id),
                (None, Some(descriptor)) => PhoneTarget::Listed(descriptor),
                (None, None) => return Err(ClientbookError::missing_field("number").into()),
            };
            serde_json::to_value(book.delete_phone(target).await?)?
        }
        BookCommand::DeleteClient { descriptor } => {
            serde_json::to_value(book.delete_client(&parse_descriptor(descriptor)?).await?)?
        }
    };
    Ok(data)
}
