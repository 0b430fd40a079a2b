mod commands;

use crate::commands::{parse_command, Command, HELP};
use clap::Parser;
use pendulum_core::persistence::load_settings;
use pendulum_core::{
    ControlActor, ControlIntent, ParameterSet, PendulumConfig, SessionController, StatusEvent,
    StatusSink, VtsClient,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "vts-pendulum", about = "Oscillates VTube Studio custom parameters")]
struct Args {
    /// VTube Studio API endpoint (env: VTS_WS_URL).
    #[arg(long)]
    ws_url: Option<String>,

    /// Where the authentication token is cached (env: VTS_TOKEN_PATH).
    #[arg(long, value_name = "PATH")]
    token_path: Option<PathBuf>,

    /// Updates per second (env: PENDULUM_TICK_HZ).
    #[arg(long)]
    tick_hz: Option<u32>,

    /// Settings file to load on startup.
    #[arg(long, value_name = "PATH")]
    settings: Option<PathBuf>,

    /// Start streaming immediately.
    #[arg(long, default_value_t = false)]
    autostart: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let args = Args::parse();

    let mut config = PendulumConfig::from_env()?;
    if let Some(url) = args.ws_url {
        config.ws_url = url;
    }
    if let Some(path) = args.token_path {
        config.token_path = path;
    }
    if let Some(hz) = args.tick_hz {
        config.tick_rate_hz = hz;
    }
    config.validate()?;

    let params = ParameterSet::new();
    if let Some(path) = args.settings.as_deref() {
        let n = load_settings(path, &params)
            .map_err(|e| anyhow::anyhow!("failed to load {}: {e}", path.display()))?;
        tracing::info!(count = n, path = %path.display(), "settings loaded");
    }

    let (status_tx, mut status_rx) = mpsc::unbounded_channel::<StatusEvent>();
    let status: Arc<dyn StatusSink> = Arc::new(status_tx);
    let printer = tokio::spawn(async move {
        while let Some(ev) = status_rx.recv().await {
            print_status(&ev);
        }
    });

    let client_config = config.clone();
    let controller = SessionController::new(
        params,
        config.tick_period(),
        Arc::clone(&status),
        move || VtsClient::new(&client_config),
    );
    let (tx, rx) = mpsc::channel(32);
    let actor = tokio::spawn(ControlActor::new(controller, Arc::clone(&status)).run(rx));
    drop(status);

    eprintln!("{HELP}");
    if args.autostart {
        tx.send(ControlIntent::Start).await?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_command(&line) {
                    Ok(Command::Intent(intent)) => {
                        if tx.send(intent).await.is_err() {
                            break;
                        }
                    }
                    Ok(Command::Help) => eprintln!("{HELP}"),
                    Ok(Command::Quit) => break,
                    Ok(Command::Empty) => {}
                    Err(e) => eprintln!("{e}"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                eprintln!("interrupted");
                break;
            }
        }
    }

    // Closing the channel makes the actor stop the session and release the
    // websocket before it returns.
    drop(tx);
    actor.await?;
    let _ = tokio::time::timeout(Duration::from_millis(200), printer).await;
    Ok(())
}

fn print_status(ev: &StatusEvent) {
    if ev.is_error {
        eprintln!("[{}] {}", ev.state, ev.message);
    } else {
        println!("[{}] {}", ev.state, ev.message);
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}
