mod config;
mod console;
mod controller;
mod event;
mod hotkey;
mod keys;
mod logging;
mod media;
mod mpv;
mod paths;
mod sequence;
mod session;
mod status;
mod timefmt;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::controller::PlaybackState;
use crate::event::PlayerEvent;
use crate::hotkey::HotkeyHandle;
use crate::mpv::{MpvEngine, MpvSettings};
use crate::session::{Flow, Overrides, Session};
use crate::status::PlayerStatus;

const EVENT_QUEUE: usize = 64;

#[derive(Parser, Debug)]
#[command(
    name = "livesplit-player",
    version,
    about = "Hotkey-driven companion video player for LiveSplit One"
)]
struct Args {
    /// Path to the config file (defaults to the platform config directory).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Video to load, overriding `player.source`.
    #[arg(long)]
    source: Option<PathBuf>,

    /// Start offset in milliseconds, overriding `player.offset_ms`.
    #[arg(long)]
    offset: Option<u64>,

    /// Do not install the global keyboard listener.
    #[arg(long)]
    no_hotkeys: bool,

    /// Do not read control commands from stdin.
    #[arg(long)]
    no_console: bool,

    /// Enable debug logging (ignored when RUST_LOG is set).
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            source: self.source.clone(),
            offset_ms: self.offset,
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    logging::init_logging(args.verbose);

    if let Err(e) = run(args).await {
        error!("{e:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    // ── App data directory ────────────────────────────────────────────────────
    let app_dir = paths::app_data_dir()?;
    std::fs::create_dir_all(&app_dir)
        .with_context(|| format!("Failed to create app data directory {}", app_dir.display()))?;

    // ── Configuration ─────────────────────────────────────────────────────────
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| paths::config_file_path(&app_dir));
    let config = config::load_or_default(&config_path).unwrap_or_else(|e| {
        warn!("[config] Error (using defaults): {e:#}");
        Config::default()
    });

    // ── Initial status ────────────────────────────────────────────────────────
    let status_path = paths::status_file_path(&app_dir);
    let mut current_status = PlayerStatus::new();

    let (event_tx, mut event_rx) = mpsc::channel::<PlayerEvent>(EVENT_QUEUE);

    // ── Background tasks ──────────────────────────────────────────────────────
    tokio::spawn(config::watch_config(config_path, event_tx.clone()));

    if !args.no_console {
        let input = BufReader::new(tokio::io::stdin());
        tokio::spawn(console::run(input, event_tx.clone()));
    }

    // Graceful shutdown on Ctrl+C.
    {
        let tx = event_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = tx.send(PlayerEvent::Shutdown).await;
            }
        });
    }

    let mut hotkey_handle = if args.no_hotkeys {
        None
    } else {
        hotkey::start_with(&config.hotkeys, &mut current_status, |bindings| {
            hotkey::start(bindings, event_tx.clone())
        })
    };

    // ── Media engine ──────────────────────────────────────────────────────────
    let settings = MpvSettings {
        mpv_path: config.player.mpv_path.clone(),
        window_title: config.player.window_title.clone(),
    };
    let engine = MpvEngine::launch(&settings, event_tx.clone()).await?;

    let mut session = Session::new(engine, config, args.overrides(), current_status);

    session.status.hotkeys_active = hotkey_handle.as_ref().is_some_and(HotkeyHandle::is_running);
    session.status.sync(&session.controller);
    status::write_status(&status_path, &session.status);
    let mut last_written = session.status.clone();

    info!("livesplit-player v{} started", env!("CARGO_PKG_VERSION"));

    // ── Event loop ────────────────────────────────────────────────────────────
    while let Some(evt) = event_rx.recv().await {
        match session.handle_event(evt) {
            Flow::Continue => {}
            Flow::Reloaded => {
                if !args.no_hotkeys {
                    let hotkeys = session.config().hotkeys.clone();
                    hotkey::refresh(&mut hotkey_handle, &hotkeys, &mut session.status, |bindings| {
                        hotkey::start(bindings, event_tx.clone())
                    });
                }
            }
            Flow::Exit => break,
        }

        session.status.hotkeys_active =
            hotkey_handle.as_ref().is_some_and(HotkeyHandle::is_running);
        session.status.sync(&session.controller);
        if session.status.needs_write(&last_written) {
            status::write_status(&status_path, &session.status);
            last_written = session.status.clone();
        }
    }

    // ── Teardown ──────────────────────────────────────────────────────────────
    session.controller.engine_mut().shutdown().await;
    if let Some(handle) = hotkey_handle {
        handle.stop();
    }

    session.status.sync(&session.controller);
    session.status.state = PlaybackState::Stopped;
    session.status.hotkeys_active = false;
    status::write_status(&status_path, &session.status);
    Ok(())
}
