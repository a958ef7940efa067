// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Headless scenelink client: connects to a controller, keeps the scene tree
//! and its component instances in sync, and logs what changes.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use scenelink_app_core::config::ConfigService;
use scenelink_app_core::prefs::{ClientPrefs, PREFS_KEY};
use scenelink_config_fs::FsConfigStore;
use scenelink_hydrate::{ComponentRegistry, SceneHost};
use scenelink_proto::scene_channels;
use scenelink_session_client::{Session, SessionConfig, SocketConnector};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless scenelink client")]
struct Args {
    /// Controller endpoint (`tcp://host:port` or `unix:///path`)
    #[arg(long)]
    endpoint: Option<String>,
    /// Deployment query string, e.g. `ws=tcp://10.0.0.2:7420&reconnect_attempts=5`
    #[arg(long)]
    query: Option<String>,
    /// Consecutive failed attempts before giving up
    #[arg(long)]
    reconnect_attempts: Option<u32>,
    /// Delay between automatic attempts
    #[arg(long)]
    reconnect_interval_ms: Option<u64>,
    /// Ignore saved preferences and do not write any
    #[arg(long)]
    no_prefs: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Reconnect,
    Disconnect,
    Quit,
}

fn parse_command(line: &str) -> Option<Command> {
    match line.trim() {
        "r" | "reconnect" => Some(Command::Reconnect),
        "d" | "disconnect" => Some(Command::Disconnect),
        "q" | "quit" => Some(Command::Quit),
        _ => None,
    }
}

/// Saved prefs, then the query string, then explicit flags.
fn session_config(prefs: &ClientPrefs, args: &Args) -> Result<SessionConfig> {
    let endpoint = prefs
        .endpoint
        .parse()
        .with_context(|| format!("saved endpoint {:?}", prefs.endpoint))?;
    let mut cfg = SessionConfig::new(endpoint)
        .with_reconnect_attempts(prefs.reconnect_attempts)
        .with_reconnect_interval(Duration::from_millis(prefs.reconnect_interval_ms))
        .with_max_frame_bytes(prefs.max_frame_bytes);
    if let Some(query) = &args.query {
        cfg = cfg.from_query(query).context("--query")?;
    }
    if let Some(endpoint) = &args.endpoint {
        cfg.endpoint = endpoint.parse().context("--endpoint")?;
    }
    if let Some(attempts) = args.reconnect_attempts {
        cfg = cfg.with_reconnect_attempts(attempts);
    }
    if let Some(ms) = args.reconnect_interval_ms {
        cfg = cfg.with_reconnect_interval(Duration::from_millis(ms));
    }
    Ok(cfg)
}

fn stdin_commands() -> mpsc::UnboundedReceiver<Command> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            let Some(cmd) = parse_command(&line) else {
                warn!(input = %line.trim(), "unknown command (r = reconnect, d = disconnect, q = quit)");
                continue;
            };
            if tx.send(cmd).is_err() {
                break;
            }
        }
    });
    rx
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Best-effort prefs; a missing config dir is not fatal.
    let config = if args.no_prefs {
        None
    } else {
        FsConfigStore::new().map(ConfigService::new).ok()
    };
    let (prefs, prefs_err) = match config.as_ref().map(|svc| svc.load_or_init::<ClientPrefs>(PREFS_KEY)) {
        Some(Ok(prefs)) => (prefs, None),
        Some(Err(err)) => (ClientPrefs::default(), Some(err)),
        None => (ClientPrefs::default(), None),
    };

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&prefs.log_filter)
            .with_context(|| format!("log filter {:?}", prefs.log_filter))?,
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
    if let Some(err) = prefs_err {
        warn!(%err, "saved preferences unreadable; using defaults");
    }

    let session_cfg = session_config(&prefs, &args)?;
    info!(
        endpoint = %session_cfg.endpoint,
        attempts = session_cfg.reconnect_attempts,
        interval = ?session_cfg.reconnect_interval,
        "starting scenelink client"
    );

    let channels = scene_channels();
    let mut host = SceneHost::attach(&channels, Arc::new(ComponentRegistry::builtin()));
    let handle = Session::spawn(session_cfg, SocketConnector, &channels);
    let mut status = handle.status();
    let mut commands = stdin_commands();

    loop {
        tokio::select! {
            applied = host.next() => match applied {
                Some(0) => {}
                Some(n) => info!(
                    edits = n,
                    revision = host.tree().revision(),
                    instances = host.hydrator().len(),
                    "scene updated"
                ),
                None => break,
            },
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let label = status.borrow_and_update().label();
                info!(status = %label, "session");
            }
            Some(cmd) = commands.recv() => match cmd {
                Command::Reconnect => handle.reconnect(),
                Command::Disconnect => handle.disconnect(),
                Command::Quit => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    handle.shutdown().await.context("session shutdown")?;
    host.detach();
    info!("scenelink client stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        Args::parse_from(std::iter::once("scenelink-client").chain(extra.iter().copied()))
    }

    #[test]
    fn commands_parse_short_and_long_forms() {
        assert_eq!(parse_command("r"), Some(Command::Reconnect));
        assert_eq!(parse_command(" disconnect \n"), Some(Command::Disconnect));
        assert_eq!(parse_command("q"), Some(Command::Quit));
        assert_eq!(parse_command("x"), None);
    }

    #[test]
    fn flags_override_query_which_overrides_prefs() {
        let prefs = ClientPrefs {
            reconnect_attempts: 7,
            ..ClientPrefs::default()
        };
        let cfg = session_config(&prefs, &args(&[])).unwrap();
        assert_eq!(cfg.reconnect_attempts, 7);

        let cfg = session_config(&prefs, &args(&["--query", "reconnect_attempts=5&reconnect_interval=250"])).unwrap();
        assert_eq!(cfg.reconnect_attempts, 5);
        assert_eq!(cfg.reconnect_interval, Duration::from_millis(250));

        let cfg = session_config(
            &prefs,
            &args(&["--query", "reconnect_attempts=5", "--reconnect-attempts", "1"]),
        )
        .unwrap();
        assert_eq!(cfg.reconnect_attempts, 1);
    }

    #[test]
    fn endpoint_flag_wins() {
        let cfg = session_config(
            &ClientPrefs::default(),
            &args(&["--query", "ws=tcp://10.0.0.1:9000", "--endpoint", "tcp://10.0.0.2:9001"]),
        )
        .unwrap();
        assert_eq!(cfg.endpoint.to_string(), "tcp://10.0.0.2:9001");
    }

    #[test]
    fn bad_saved_endpoint_is_reported() {
        let prefs = ClientPrefs {
            endpoint: "not a url".into(),
            ..ClientPrefs::default()
        };
        assert!(session_config(&prefs, &args(&[])).is_err());
    }
}
