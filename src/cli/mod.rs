pub mod console;

use std::{path::PathBuf, time::Duration};

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;

use crate::{
    config::{ConfigStore, JsonConfigStore, CONFIG_FILE_NAME},
    ledger::table::check_title,
    runner::{start_tracker, DEFAULT_TICK_INTERVAL},
    utils::{
        dir::{create_application_default_path, ensure_dir},
        logging::{enable_logging, CLI_PREFIX, TRACKER_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "Windowtally", version, long_about = None)]
#[command(about = "Tracks time spent in a chosen application", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, global = true, help = "Log everything down to trace level")]
    log: bool,
    #[arg(
        long = "log-console",
        global = true,
        help = "Also print logs to the console. This option is for debugging purposes only"
    )]
    log_console: bool,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Start tracking in the current terminal")]
    Run {
        #[arg(
            long = "interval-ms",
            default_value_t = DEFAULT_TICK_INTERVAL.as_millis() as u64,
            help = "How often the foreground window is checked"
        )]
        interval_ms: u64,
    },
    #[command(about = "Show or change what is tracked. Without options prints the current settings")]
    Config {
        #[arg(long, conflicts_with = "always", help = "Part of the window title to track")]
        target: Option<String>,
        #[arg(long, help = "Track all the time, ignoring the window")]
        always: bool,
        #[arg(long, help = "Title the time is saved under")]
        title: Option<String>,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let app_dir = args
        .dir
        .map_or_else(create_application_default_path, ensure_dir)?;

    let logging_level = args.log.then_some(LevelFilter::TRACE);
    let prefix = match args.commands {
        Commands::Run { .. } => TRACKER_PREFIX,
        Commands::Config { .. } => CLI_PREFIX,
    };
    enable_logging(prefix, &app_dir.join("logs"), logging_level, args.log_console)?;

    match args.commands {
        Commands::Run { interval_ms } => {
            if interval_ms == 0 {
                return Err(anyhow!("--interval-ms must be positive"));
            }
            start_tracker(&app_dir, Duration::from_millis(interval_ms)).await
        }
        Commands::Config {
            target,
            always,
            title,
        } => {
            let store = JsonConfigStore::new(app_dir.join(CONFIG_FILE_NAME));
            let mut config = store.load();
            let changed = target.is_some() || always || title.is_some();

            if let Some(target) = target {
                config.target_pattern = target.trim().to_string();
            }
            if always {
                config.target_pattern = String::new();
            }
            if let Some(title) = title {
                if !title.trim().is_empty() {
                    check_title(&title)?;
                }
                config.session_title = title.trim().to_string();
            }
            if changed {
                store.save(&config)?;
            }

            println!("{config}");
            Ok(())
        }
    }
}
