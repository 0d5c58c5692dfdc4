use anyhow::Result;
use clap::Parser;
use log::{error, info, warn};
use rg_dock::{App, AppConfig};
use rg_dock_core::constants::SLOW_ANIMATION_INTERVAL;
use std::path::PathBuf;

/// rg-dock - A desktop dock with pluggable applets and animated data renderers
#[derive(Parser, Debug, Clone)]
#[command(name = "rg-dock")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Extra directory to scan for module libraries (repeatable)
    #[arg(short = 'm', long = "modules-dir", value_name = "DIR")]
    modules_dir: Vec<PathBuf>,

    /// Application config file to use instead of the per-user one
    #[arg(short = 'c', long = "conf", value_name = "FILE")]
    conf: Option<PathBuf>,

    /// Theme directory holding the main config and module configs
    #[arg(short = 't', long = "theme-dir", value_name = "DIR")]
    theme_dir: Option<PathBuf>,

    /// Load modules even when their version checks fail
    #[arg(long = "easter-eggs")]
    easter_eggs: bool,

    /// List available modules and exit
    #[arg(short = 'l', long = "list-modules")]
    list_modules: bool,

    /// Never use the accelerated rendering path
    #[arg(long = "no-accel")]
    no_accel: bool,

    /// Stop after this many animation ticks
    #[arg(long = "ticks", value_name = "N")]
    ticks: Option<u64>,

    /// Debug verbosity level (0=quiet, 1=info, 2=debug, 3=trace)
    #[arg(short = 'd', long = "debug", value_name = "LEVEL", default_value = "0")]
    debug: u8,
}

fn main() {
    let cli = Cli::parse();

    // Level 0 (default): warn only
    // Level 1: info
    // Level 2: debug
    // Level 3+: trace
    let log_level = match cli.debug {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    // Allow RUST_LOG to override CLI setting
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    warn!("Starting rg-dock v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(cli) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.conf {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load().unwrap_or_else(|e| {
            warn!("Failed to load config, using defaults: {}", e);
            AppConfig::default()
        }),
    };
    if let Some(dir) = &cli.theme_dir {
        config.theme_dir = Some(dir.clone());
    }
    config.module_dirs.extend(cli.modules_dir.iter().cloned());
    config.easter_eggs |= cli.easter_eggs;
    if cli.no_accel {
        config.accelerated = false;
    }
    Ok(config)
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let mut app = App::new(&config)?;

    if cli.list_modules {
        for module in app.list_modules() {
            println!(
                "{:<20} {:<24} v{:<8} {}{}",
                module.name,
                module.title,
                module.version,
                if module.active { "active" } else { "inactive" },
                if module.builtin { " (built-in)" } else { "" },
            );
        }
        return Ok(());
    }

    app.start()?;

    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    rt.block_on(async {
        let mut interval = tokio::time::interval(SLOW_ANIMATION_INTERVAL);
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        info!("Starting animation loop");
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    app.tick();
                    app.idle();
                    if cli.ticks.is_some_and(|limit| app.ticks() >= limit) {
                        break;
                    }
                }
                _ = &mut ctrl_c => {
                    info!("Interrupted");
                    break;
                }
            }
        }
    });

    app.shutdown();
    Ok(())
}
