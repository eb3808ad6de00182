mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::{Outcome, UiCommand};
use soundcloudify_channel::HandlerTable;
use soundcloudify_core::{artwork_url, AppConfig};
use soundcloudify_player::{bind_player_events, PlayerController};
use soundcloudify_store::{load_session, spawn_writer, FileStore, MemoryStore, NowPlayingStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "soundcloudify",
    about = "Playlist front-end for the soundcloudify background player"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Connect to the background player and read commands from stdin.
    Run {
        /// Keep the playlist in memory only.
        #[arg(long)]
        ephemeral: bool,
    },
    /// Print the stored playlist and playback state.
    Status,
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cmd = cli.command.unwrap_or(Commands::Run { ephemeral: false });
    let cfg_path = cli.config.unwrap_or_else(default_config_path);

    match cmd {
        Commands::Config {
            action: ConfigAction::Init,
        } => {
            init_config(&cfg_path)?;
            println!("Initialized config at {}", cfg_path.display());
            Ok(())
        }
        Commands::Status => {
            let cfg = load_or_default(&cfg_path)?;
            init_logging(&cfg.log_level);
            status(&cfg).await
        }
        Commands::Run { ephemeral } => {
            let cfg = load_or_default(&cfg_path)?;
            init_logging(&cfg.log_level);
            run(cfg, ephemeral).await
        }
    }
}

async fn run(cfg: AppConfig, ephemeral: bool) -> Result<()> {
    let store: Arc<dyn NowPlayingStore> = if ephemeral {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(FileStore::new(data_dir(&cfg)))
    };
    let session = load_session(store.as_ref(), cfg.player.default_volume).await;
    let (persistence, writer) = spawn_writer(
        Arc::clone(&store),
        Duration::from_millis(cfg.player.volume_save_debounce_ms),
    );

    let addr = cfg.channel.socket_addr()?;
    let (sender, mut events) = soundcloudify_channel::connect(&addr, &cfg.channel.name)
        .await
        .with_context(|| format!("is the background player listening on {addr}?"))?;

    let mut player = PlayerController::new(session, sender, persistence.clone());
    let mut handlers = HandlerTable::new();
    bind_player_events(&mut handlers, |notice| eprintln!("! {notice}"));

    info!(
        store = store.name(),
        tracks = player.tracks().len(),
        channel = %cfg.channel.name,
        "soundcloudify started"
    );

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut out = std::io::stdout();

    loop {
        tokio::select! {
            event = events.next_event() => {
                match event {
                    Some(event) => {
                        handlers.dispatch(&mut player, event);
                    }
                    None => {
                        warn!("background player closed the channel; shutting down");
                        break;
                    }
                }
            }
            line = input.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) => match UiCommand::parse(&line) {
                        Ok(Some(command)) => {
                            match commands::execute(&mut player, command, &cfg.player, &mut out) {
                                Ok(Outcome::Continue) => {}
                                Ok(Outcome::Quit) => break,
                                Err(err) => eprintln!("error: {err:#}"),
                            }
                        }
                        Ok(None) => {}
                        Err(err) => eprintln!("error: {err:#}"),
                    },
                    Ok(None) => {
                        info!("stdin closed; following the background player only");
                        stdin_open = false;
                    }
                    Err(err) => {
                        error!(error = %err, "failed to read stdin");
                        stdin_open = false;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("received ctrl-c; shutting down");
                break;
            }
        }
    }

    drop(player);
    if !persistence.flush().await {
        warn!("persistence writer stopped before shutdown flush");
    }
    drop(persistence);
    writer.await.context("persistence writer panicked")?;
    Ok(())
}

async fn status(cfg: &AppConfig) -> Result<()> {
    let store = FileStore::new(data_dir(cfg));
    let session = load_session(&store, cfg.player.default_volume).await;

    println!("store: {}", store.dir().display());
    println!(
        "state: {} (volume {:.2}, repeat {}, shuffle {})",
        if session.state.playing { "playing" } else { "paused" },
        session.state.volume,
        session.state.repeat.as_str(),
        if session.state.shuffle { "on" } else { "off" },
    );
    match &session.state.current_track {
        Some(track) => println!("track: [{}] {}", session.state.current_index, track.title),
        None => println!("track: <none>"),
    }
    for (index, track) in session.tracks.iter().enumerate() {
        println!(
            "{index:>3}  {}{}  {}",
            track.title,
            if track.error { " (error)" } else { "" },
            artwork_url(track.artwork_url.as_deref(), &cfg.player.artwork_placeholder),
        );
    }

    Ok(())
}

fn default_config_path() -> PathBuf {
    let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("soundcloudify").join("config.toml")
}

fn data_dir(cfg: &AppConfig) -> PathBuf {
    cfg.data_dir.clone().unwrap_or_else(|| {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("soundcloudify")
    })
}

fn init_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }
    let cfg = AppConfig::default();
    let toml = toml::to_string_pretty(&cfg)?;
    std::fs::write(path, toml)
        .with_context(|| format!("failed to write config file {}", path.display()))?;
    Ok(())
}

fn load_or_default(path: &Path) -> Result<AppConfig> {
    let mut cfg = if !path.exists() {
        AppConfig::default()
    } else {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&data).with_context(|| format!("failed to parse {}", path.display()))?
    };
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

fn init_logging(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_new(log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // Logs go to stderr; stdout carries command output.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .try_init();
}

fn apply_env_overrides(cfg: &mut AppConfig) {
    if let Ok(v) = std::env::var("SOUNDCLOUDIFY_LOG_LEVEL") {
        if !v.trim().is_empty() {
            cfg.log_level = v;
        }
    }
    if let Ok(v) = std::env::var("SOUNDCLOUDIFY_BACKGROUND_ADDR") {
        if !v.trim().is_empty() {
            cfg.channel.background_addr = v;
        }
    }
    if let Ok(v) = std::env::var("SOUNDCLOUDIFY_DATA_DIR") {
        if !v.trim().is_empty() {
            cfg.data_dir = Some(PathBuf::from(v));
        }
    }
}
