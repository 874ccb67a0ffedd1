use std::path::{Path, PathBuf};

use clap::Parser;
use okta_provider::{
    apps::{self, AppFilter, AppLookupError, AppSearch},
    authenticators::AuthenticatorKey,
    client::{ClientError, OktaClient},
    config::{ConfigError, ProviderConfig},
    models::{UserConfig, UserState},
    observability::init_tracing,
    reconciler::{self, Plan, ReadOutcome, ReconcileError},
};
use serde::{Serialize, de::DeserializeOwned};

/// CLI arguments for the provider
#[derive(Parser, Debug)]
#[command(version, about = "Declarative user management for Okta", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to config file
    #[arg(short, long, global = true, default_value = "okta-provider.toml")]
    config: PathBuf,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Show what `apply` would change
    Plan {
        /// Desired user configuration (JSON)
        #[arg(short, long)]
        desired: PathBuf,
        /// Recorded state (JSON); a missing file means the user does not exist yet
        #[arg(short, long)]
        state: PathBuf,
    },
    /// Create or update the user, then refresh the recorded state
    Apply {
        #[arg(short, long)]
        desired: PathBuf,
        #[arg(short, long)]
        state: PathBuf,
    },
    /// Refresh the recorded state from the remote user
    Read {
        #[arg(short, long)]
        state: PathBuf,
    },
    /// Record an existing user by id or login
    Import {
        id_or_login: String,
        #[arg(short, long)]
        state: PathBuf,
    },
    /// Deprovision and delete the recorded user
    Destroy {
        #[arg(short, long)]
        state: PathBuf,
    },
    /// Look up applications
    Apps {
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        label_prefix: Option<String>,
        /// Only ACTIVE applications
        #[arg(long)]
        active_only: bool,
        /// Page size for the listing
        #[arg(long)]
        limit: Option<u32>,
        /// Print every match instead of the single best one
        #[arg(long)]
        all: bool,
    },
    /// List authenticator keys
    Authenticators {
        /// Only keys usable in sign-on policies
        #[arg(long)]
        policy_configurable: bool,
    },
    /// Export the JSON schema for the configuration file
    Schema {
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Lookup(#[from] AppLookupError),

    #[error("invalid application search: {0}")]
    Search(#[from] validator::ValidationErrors),

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0} records no user; run `apply` or `import` first")]
    NoRecordedUser(PathBuf),

    #[cfg(not(feature = "json-schema"))]
    #[error("JSON schema export requires the 'json-schema' feature")]
    SchemaUnavailable,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = run(args).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), CliError> {
    match args.command {
        Command::Authenticators {
            policy_configurable,
        } => {
            run_authenticators(policy_configurable);
            Ok(())
        }
        Command::Schema { output } => run_schema_export(output).await,
        command => {
            let config = ProviderConfig::from_file(&args.config)?;
            if let Err(e) = init_tracing(&config.observability.logging) {
                eprintln!("Warning: failed to initialize logging: {e}");
            }
            let client = OktaClient::new(&config.client)?;
            run_remote(command, &client, &config).await
        }
    }
}

async fn run_remote(
    command: Command,
    client: &OktaClient,
    config: &ProviderConfig,
) -> Result<(), CliError> {
    match command {
        Command::Plan { desired, state } => {
            let desired: UserConfig = read_json(&desired).await?;
            let state = read_state(&state).await?;
            match Plan::for_user(&state, &desired) {
                Plan::Create => println!("create user {}", desired.login()),
                Plan::NoChange => println!("no changes"),
                Plan::Update(changes) => println!(
                    "update user {}: {}",
                    state.id().unwrap_or_default(),
                    changes.changed_attributes().join(", ")
                ),
            }
            Ok(())
        }
        Command::Apply {
            desired,
            state: state_path,
        } => {
            let desired: UserConfig = read_json(&desired).await?;
            let mut state = read_state(&state_path).await?;
            let result = reconciler::apply(client, &desired, &mut state, &config.reconciler).await;
            // Whatever was committed is recorded, even when a later step failed.
            if state.is_created() {
                write_json(&state_path, &state).await?;
            } else {
                forget_state(&state_path).await?;
            }
            if result? == ReadOutcome::Gone {
                println!("user no longer exists");
            }
            Ok(())
        }
        Command::Read { state: state_path } => {
            let mut state = recorded_state(&state_path).await?;
            match reconciler::read(client, &mut state).await? {
                ReadOutcome::Found => write_json(&state_path, &state).await?,
                ReadOutcome::Gone => {
                    println!("user no longer exists");
                    remove_file(&state_path).await?;
                }
            }
            Ok(())
        }
        Command::Import { id_or_login, state } => {
            let imported = reconciler::import(client, &id_or_login).await?;
            write_json(&state, &imported).await
        }
        Command::Destroy { state: state_path } => {
            let mut state = recorded_state(&state_path).await?;
            reconciler::delete(client, &mut state).await?;
            remove_file(&state_path).await
        }
        Command::Apps {
            id,
            label,
            label_prefix,
            active_only,
            limit,
            all,
        } => {
            let filter = AppFilter::new(AppSearch {
                id,
                label,
                label_prefix,
                active_only,
            })?;
            if all {
                print_json(&apps::search_apps(client, &filter, limit).await?)
            } else {
                print_json(&apps::find_app(client, &filter, limit).await?)
            }
        }
        Command::Authenticators { .. } | Command::Schema { .. } => Ok(()),
    }
}

fn run_authenticators(policy_configurable: bool) {
    for key in AuthenticatorKey::ALL {
        if !policy_configurable || key.is_policy_configurable() {
            println!("{key}");
        }
    }
}

async fn run_schema_export(output: Option<PathBuf>) -> Result<(), CliError> {
    #[cfg(feature = "json-schema")]
    {
        let content = ProviderConfig::json_schema_string().map_err(|source| CliError::Json {
            path: PathBuf::from("<schema>"),
            source,
        })?;
        match output {
            Some(path) => {
                tokio::fs::write(&path, &content)
                    .await
                    .map_err(|source| CliError::Io {
                        path: path.clone(),
                        source,
                    })?;
                eprintln!("Config JSON schema written to {}", path.display());
            }
            None => println!("{content}"),
        }
        Ok(())
    }
    #[cfg(not(feature = "json-schema"))]
    {
        let _ = output;
        Err(CliError::SchemaUnavailable)
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CliError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    serde_json::from_str(&contents).map_err(|source| CliError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// The recorded state, or an empty one when the file does not exist yet.
async fn read_state(path: &Path) -> Result<UserState, CliError> {
    match tokio::fs::try_exists(path).await {
        Ok(true) => read_json(path).await,
        Ok(false) => Ok(UserState::default()),
        Err(source) => Err(CliError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

async fn recorded_state(path: &Path) -> Result<UserState, CliError> {
    let state = read_state(path).await?;
    if state.is_created() {
        Ok(state)
    } else {
        Err(CliError::NoRecordedUser(path.to_path_buf()))
    }
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), CliError> {
    let contents = serde_json::to_string_pretty(value).map_err(|source| CliError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    tokio::fs::write(path, contents)
        .await
        .map_err(|source| CliError::Io {
            path: path.to_path_buf(),
            source,
        })
}

async fn remove_file(path: &Path) -> Result<(), CliError> {
    tokio::fs::remove_file(path)
        .await
        .map_err(|source| CliError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Remove a state file whose user no longer exists, if there is one.
async fn forget_state(path: &Path) -> Result<(), CliError> {
    match tokio::fs::try_exists(path).await {
        Ok(true) => remove_file(path).await,
        Ok(false) => Ok(()),
        Err(source) => Err(CliError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let contents = serde_json::to_string_pretty(value).map_err(|source| CliError::Json {
        path: PathBuf::from("<stdout>"),
        source,
    })?;
    println!("{contents}");
    Ok(())
}
