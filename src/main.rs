//! NightWatch - Main entry point.
//!
//! Usage: nightwatch <COMMAND> [ARGS]
//!
//! Commands:
//!   list                    List addons and their status
//!   install <name>          Install or update an addon
//!   uninstall <name>        Remove an addon
//!   check                   Check NSQC for updates
//!   watch                   Check NSQC for updates periodically
//!   launch                  Start the game
//!   set-game-path <dir>     Set the directory containing Wow.exe
//!   logs                    Print the log directory
//!
//! Options:
//!   --version, -v    Show version
//!   --help, -h       Show this help

use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;

use nightwatch::addons::{AddonEvent, AddonRegistry, AddonSnapshot};
use nightwatch::{launcher, logging, Config};

/// Current version.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Width of the textual progress bar.
const BAR_WIDTH: usize = 30;

const USAGE: &str = "Usage: nightwatch <COMMAND> [ARGS]

Commands:
  list                    List addons and their status
  install <name>          Install or update an addon
  uninstall <name>        Remove an addon
  check                   Check NSQC for updates
  watch                   Check NSQC for updates periodically
  launch                  Start the game
  set-game-path <dir>     Set the directory containing Wow.exe
  logs                    Print the log directory

Options:
  --version, -v    Show version
  --help, -h       Show this help";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().skip(1).collect();

    if args.iter().any(|a| a == "--version" || a == "-v") {
        println!("nightwatch v{}", VERSION);
        return Ok(());
    }
    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{}", USAGE);
        return Ok(());
    }

    let mut config = Config::load()?;
    if let Err(e) = logging::init(&config.log_config) {
        eprintln!("Logging disabled: {}", e);
    }

    let command = args[0].as_str();
    let operand = args.get(1).map(String::as_str);

    match command {
        "logs" => {
            println!("{}", logging::log_directory().display());
            Ok(())
        }
        "set-game-path" => {
            let dir = operand.ok_or("set-game-path needs a directory")?;
            config.set_game_path(&PathBuf::from(dir))?;
            println!("Game path set to {}", dir);
            Ok(())
        }
        "launch" => {
            let root = require_game_path(&config)?;
            if launcher::launch(&root) {
                Ok(())
            } else {
                Err(format!("could not start {}", launcher::GAME_EXECUTABLE).into())
            }
        }
        "list" | "install" | "uninstall" | "check" | "watch" => {
            require_game_path(&config)?;
            run_addon_command(&config, command, operand).await
        }
        other => Err(format!("unknown command '{}'\n\n{}", other, USAGE).into()),
    }
}

/// Returns the configured game path or an explanatory error.
fn require_game_path(config: &Config) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if !config.is_game_path_valid() {
        return Err(format!(
            "game path is not set or does not contain {}; run `nightwatch set-game-path <dir>`",
            launcher::GAME_EXECUTABLE
        )
        .into());
    }
    config
        .game_path
        .clone()
        .ok_or_else(|| "game path is not set".into())
}

/// Runs a command that needs the addon registry.
async fn run_addon_command(
    config: &Config,
    command: &str,
    operand: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (tx, rx) = mpsc::unbounded_channel();
    let registry = Arc::new(AddonRegistry::new(config.registry_options(), Arc::new(tx))?);
    let printer = spawn_event_printer(rx);

    registry.load().await?;

    let result: Result<(), Box<dyn std::error::Error>> = match command {
        "list" => {
            if let Err(e) = registry.check_for_update().await {
                eprintln!("Update check failed: {}", e);
            }
            print_addons(&registry.snapshot());
            Ok(())
        }
        "install" | "uninstall" => {
            let name = operand.ok_or_else(|| format!("{} needs an addon name", command))?;
            registry
                .toggle(name, command == "install")
                .await
                .map_err(Into::into)
        }
        "check" => {
            let needs_update = registry.check_for_update().await?;
            println!(
                "NSQC is {}",
                if needs_update { "outdated" } else { "up to date" }
            );
            Ok(())
        }
        "watch" => {
            println!(
                "Checking for NSQC updates every {}s, Ctrl+C to stop",
                config.update_interval.as_secs()
            );
            let watcher = registry.spawn_update_watcher(config.update_interval);
            tokio::signal::ctrl_c().await?;
            watcher.abort();
            let _ = watcher.await;
            Ok(())
        }
        _ => unreachable!("dispatched commands are matched above"),
    };

    // Dropping the registry closes the event channel and ends the printer.
    drop(registry);
    let _ = printer.await;
    result
}

/// Prints events as they arrive.
fn spawn_event_printer(mut rx: UnboundedReceiver<AddonEvent>) -> JoinHandle<()> {
    let interactive = atty::is(atty::Stream::Stdout);

    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                AddonEvent::Progress { name, fraction } => {
                    if interactive {
                        print!("\r{:<16} {}", name, progress_bar(fraction));
                        let _ = io::stdout().flush();
                    } else {
                        println!("{}: {:.0}%", name, fraction * 100.0);
                    }
                }
                AddonEvent::Finished { name, success } => {
                    if interactive {
                        println!();
                    }
                    println!("{}: {}", name, if success { "done" } else { "failed" });
                }
                AddonEvent::Error { message } => {
                    if interactive {
                        println!();
                    }
                    eprintln!("Error: {}", message);
                }
                AddonEvent::UpdateAvailable { name } => {
                    println!("Update available for {}", name);
                }
            }
        }
    })
}

/// Renders `[#####.....]  50%`.
fn progress_bar(fraction: f64) -> String {
    let filled = ((fraction.clamp(0.0, 1.0) * BAR_WIDTH as f64).round()) as usize;
    format!(
        "[{}{}] {:>3.0}%",
        "#".repeat(filled),
        ".".repeat(BAR_WIDTH - filled),
        fraction * 100.0
    )
}

/// Prints the addon table.
fn print_addons(snapshots: &[AddonSnapshot]) {
    if snapshots.is_empty() {
        println!("No addons available.");
        return;
    }

    let width = snapshots
        .iter()
        .map(|s| s.descriptor.name.len())
        .max()
        .unwrap_or(0)
        .max(4);

    println!("{:<width$}  {:<9}  {:<6}  DESCRIPTION", "NAME", "INSTALLED", "UPDATE");
    for snapshot in snapshots {
        println!(
            "{:<width$}  {:<9}  {:<6}  {}",
            snapshot.descriptor.name,
            if snapshot.state.installed { "yes" } else { "no" },
            if snapshot.state.needs_update { "yes" } else { "" },
            snapshot.descriptor.description,
        );
    }
}
