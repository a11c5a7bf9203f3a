// agent/src/main.rs

use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing::{error, info, warn};

mod admin;
mod config;
mod error;
mod first_run;
mod ports;
mod service;
mod sys;
#[cfg(test)]
mod testing;
mod vault;
mod watcher;

use crate::config::AgentConfig;
use crate::error::{AgentError, AgentResult};
use crate::service::{ServiceDeps, ZomboidService};
use crate::sys::traits::{AdminQueryable, OptionStore, PortOwner, ServiceLifecycle};

#[derive(Parser)]
#[command(name = "zomboid-agent", about = "Lifecycle agent for a Project Zomboid dedicated server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start once to generate defaults, open game ports, seed the RCON password (root)
    FirstRun,
    /// Answer first-run admin prompts until the server finishes loading (ExecStartPost)
    PostStart,
    /// Set an option; port options are reconciled with the firewall
    Set { option: String, value: String },
    /// Print an option value
    Get { option: String },
    /// Print a JSON status document
    Status,
    /// Print the connected player count, or "unknown"
    Players,
    /// Send a server-wide message
    Broadcast {
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },
    /// Force a world save
    Save,
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    // Maps onto the host's structured log pipeline when asked to.
    if std::env::var("ZOMBOID_LOG_FORMAT").as_deref() == Ok("json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "fatal");
            eprintln!("ERROR: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> AgentResult<()> {
    let config = AgentConfig::load()?;

    // The privileged flow is gated before anything is touched.
    if matches!(command, Command::FirstRun) {
        first_run::require_root()?;
    }

    let deps = ServiceDeps::linux(&config).await?;
    let service = ZomboidService::new(&config, deps);

    match command {
        Command::FirstRun => {
            let report = first_run::run(&config, &service).await?;
            info!(running_after = ?report.running_after, rcon_password_set = report.rcon_password_set, "first-run configuration complete");
        }
        Command::PostStart => {
            // Timing out here is not fatal; the unit keeps starting.
            let outcome = service.post_start().await?;
            if outcome.is_running() {
                info!(?outcome, "post-start finished");
            } else {
                warn!(?outcome, "post-start gave up waiting for the startup banner");
            }
        }
        Command::Set { option, value } => {
            let change = service.set_option(&option, &value).await?;
            println!("{} = {}", change.name, change.new);
        }
        Command::Get { option } => {
            if sys::options::lookup(&option).is_none() {
                return Err(AgentError::Option(format!("unknown option '{}'", option)));
            }
            println!("{}", service.options().get(&option).await.unwrap_or_default());
        }
        Command::Status => {
            let report = service.status(&config).await;
            let json = serde_json::to_string_pretty(&report)
                .map_err(|e| AgentError::Service(format!("status encoding failed: {}", e)))?;
            println!("{}", json);
        }
        Command::Players => match service.get_player_count().await.available() {
            Some(count) => println!("{}", count),
            None => println!("unknown"),
        },
        Command::Broadcast { message } => {
            if !service.broadcast(&message.join(" ")).await.is_available() {
                info!("RCON unavailable, message not sent");
            }
        }
        Command::Save => {
            if !service.save_world().await.is_available() {
                info!("RCON unavailable, world not saved");
            }
        }
    }

    Ok(())
}
