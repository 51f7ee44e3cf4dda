//! CLI module — Clap argument parser, output helpers, and command
//! implementations.

pub mod output;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use crate::config::Settings;
use crate::errors::{LockboxError, Result};
use crate::service::{access, ServiceRegistry};
use crate::store::Registry;

/// Lockbox CLI: encrypted secret storage with remote retrieval.
#[derive(Parser)]
#[command(
    name = "lockbox",
    about = "Encrypted secret storage with remote retrieval",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Manager namespace to operate on
    #[arg(short, long, default_value = "main", global = true)]
    pub manager: String,

    /// Snapshot file (default from lockbox.toml, or lockbox.snapshot)
    #[arg(short, long, global = true)]
    pub file: Option<String>,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Store a secret (create or overwrite)
    Set {
        /// Entry id (e.g. services/db)
        id: String,
        /// Secret value (omit for interactive prompt)
        value: Option<String>,
    },

    /// Retrieve a secret's value
    Get {
        /// Entry id
        id: String,
    },

    /// Compare a stored secret against a value
    Check {
        /// Entry id
        id: String,
        /// Expected value
        value: String,
    },

    /// Delete a secret after verifying its value
    Unset {
        /// Entry id
        id: String,
        /// Stored value, for verification
        value: String,
    },

    /// Delete a secret unconditionally
    Delete {
        /// Entry id
        id: String,
    },

    /// List all stored entry ids
    List {
        /// Join ids with a delimiter instead of printing a table
        #[arg(short, long)]
        delimiter: Option<String>,
    },

    /// Serve read access to this manager over HTTP until Ctrl-C
    Serve {
        /// Bind address (default from lockbox.toml)
        #[arg(short, long)]
        address: Option<String>,

        /// Request-path prefix (default from lockbox.toml)
        #[arg(short, long)]
        prefix: Option<String>,

        /// Only allow requests presenting this access token
        #[arg(short, long)]
        token: Option<String>,

        /// Handle requests concurrently instead of one at a time
        #[arg(long)]
        multi: bool,
    },
}

/// Run the parsed command.
pub async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load(Path::new("."))?;
    let snapshot_file = cli
        .file
        .clone()
        .unwrap_or_else(|| settings.snapshot_file.clone());

    let registry = Arc::new(Registry::with_params(settings.kdf_params()));
    load_snapshot(&registry, &snapshot_file)?;
    ensure_manager(&registry, &cli.manager)?;

    match cli.command {
        Commands::Set { ref id, ref value } => {
            let value = match value {
                Some(v) => v.clone(),
                None => prompt("Value")?,
            };
            let password = prompt("Password")?;
            registry.overwrite(id, &value, &password)?;
            registry.write_to_disk(Path::new(&snapshot_file))?;
            output::success(&format!("Stored '{id}'."));
        }
        Commands::Get { ref id } => {
            let password = prompt("Password")?;
            let value = registry.get(id, &password)?;
            println!("{value}");
        }
        Commands::Check {
            ref id,
            ref value,
        } => {
            let password = prompt("Password")?;
            let result = registry.check(id, &password, value)?;
            println!("{result}");
        }
        Commands::Unset {
            ref id,
            ref value,
        } => {
            let password = prompt("Password")?;
            registry.unset(id, value, &password)?;
            registry.write_to_disk(Path::new(&snapshot_file))?;
            output::success(&format!("Removed '{id}'."));
        }
        Commands::Delete { ref id } => {
            registry.delete(id)?;
            registry.write_to_disk(Path::new(&snapshot_file))?;
            output::success(&format!("Deleted '{id}'."));
        }
        Commands::List { ref delimiter } => match delimiter {
            Some(delim) => println!("{}", registry.list_joined(delim)?),
            None => {
                let ids = registry.list()?;
                output::info(&format!("{} — {} entr(ies)", cli.manager, ids.len()));
                output::print_id_table(&ids);
            }
        },
        Commands::Serve {
            ref address,
            ref prefix,
            ref token,
            multi,
        } => {
            serve(
                &registry,
                &cli.manager,
                address.as_deref().unwrap_or(&settings.service_address),
                prefix.as_deref().unwrap_or(&settings.service_prefix),
                token.clone(),
                multi,
            )
            .await?;
        }
    }

    Ok(())
}

async fn serve(
    registry: &Arc<Registry>,
    manager: &str,
    address: &str,
    prefix: &str,
    token: Option<String>,
    multi: bool,
) -> Result<()> {
    let callback: access::AccessCallback = match token {
        Some(expected) => {
            Arc::new(move |token: &str, _: &str, _: &str, _: &str| token == expected)
        }
        None => {
            output::info("No access token configured — every request will be allowed.");
            access::full_access()
        }
    };

    let services = ServiceRegistry::new(Arc::clone(registry));
    if multi {
        services
            .start_multi(address, prefix, manager, Some(callback))
            .await?;
    } else {
        services
            .start_simple(address, prefix, manager, Some(callback))
            .await?;
    }

    output::success(&format!("Serving '{manager}' on {address}/{prefix}."));
    output::tip("Press Ctrl-C to stop.");

    tokio::signal::ctrl_c()
        .await
        .map_err(LockboxError::Io)?;

    services.stop(Duration::from_secs(5), address, prefix).await
}

fn load_snapshot(registry: &Registry, file: &str) -> Result<()> {
    let path = Path::new(file);
    if path.exists() {
        registry.read_from_disk(path)?;
    }
    Ok(())
}

fn ensure_manager(registry: &Registry, name: &str) -> Result<()> {
    match registry.register(name) {
        Ok(()) | Err(LockboxError::AlreadyExists(_)) => {}
        Err(e) => return Err(e),
    }
    registry.set_default(name)
}

fn prompt(label: &str) -> Result<String> {
    dialoguer::Password::new()
        .with_prompt(label)
        .interact()
        .map_err(|e| LockboxError::InvalidArgument(format!("prompt failed: {e}")))
}
