//! Chrome native messaging host
//!
//! Reads length-prefixed [`Request`] frames from stdin, answers each one
//! against the attached tab and writes [`Response`] frames to stdout. Fresh
//! job records are pushed as the page changes. Logs go to stderr.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use job_autopilot::messaging::{Outbound, native};
use job_autopilot::resume::PdftotextExtractor;
use job_autopilot::scoring::ConstantScorer;
use job_autopilot::settings::JsonFileStore;
use job_autopilot::{
    BrowserSession, ConnectionOptions, Dispatcher, ExecutionContext, LaunchOptions, Request, Response, SitePreset,
    Timings,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "native-host")]
#[command(version)]
#[command(about = "Native messaging host for the job autopilot extension", long_about = None)]
struct Cli {
    /// DevTools WebSocket URL of the browser to drive
    #[arg(long, value_name = "URL")]
    connect: Option<String>,

    /// Launch browser in headed mode when not connecting (default: headless)
    #[arg(long, short = 'H')]
    headed: bool,

    /// Path to custom browser executable
    #[arg(long, value_name = "PATH")]
    executable_path: Option<PathBuf>,

    /// Persistent browser profile directory
    #[arg(long, value_name = "DIR")]
    user_data_dir: Option<PathBuf>,

    /// Page to open on startup
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Site preset JSON (default: built-in LinkedIn preset)
    #[arg(long, value_name = "FILE")]
    preset: Option<PathBuf>,

    /// Timing overrides JSON (millisecond fields)
    #[arg(long, value_name = "FILE")]
    timings: Option<PathBuf>,

    /// Settings file
    #[arg(long, value_name = "FILE", default_value = "job-autopilot-settings.json")]
    settings: PathBuf,

    /// Match score (0-100) given to every posting during bulk apply
    #[arg(long, value_name = "SCORE", value_parser = clap::value_parser!(u8).range(0..=100))]
    score: Option<u8>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(long, short = 'v', action = ArgAction::Count)]
    verbose: u8,

    /// Chrome passes the calling extension's origin as a trailing argument
    #[arg(hide = true)]
    origin: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    // stdout carries frames, so logging must stay on stderr
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .target(env_logger::Target::Stderr)
        .init();

    let timings = match &cli.timings {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)
            .with_context(|| format!("Invalid timings file {}", path.display()))?,
        None => Timings::default(),
    };
    let preset = match &cli.preset {
        Some(path) => SitePreset::load(path).with_context(|| format!("Invalid preset {}", path.display()))?,
        None => SitePreset::linkedin(&timings)?,
    };

    let session = match &cli.connect {
        Some(ws_url) => BrowserSession::connect(ConnectionOptions::new(ws_url))?,
        None => {
            let mut options = LaunchOptions::new().headless(!cli.headed);
            if let Some(path) = &cli.executable_path {
                options = options.chrome_path(path);
            }
            if let Some(dir) = &cli.user_data_dir {
                options = options.user_data_dir(dir);
            }
            BrowserSession::launch(options)?
        }
    };
    let doc = session.open_document(cli.url.as_deref())?;

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Outbound>();
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(message) = outbound_rx.recv().await {
            if let Err(e) = native::write_message(&mut stdout, &message).await {
                log::error!("Failed to write message: {}", e);
            }
        }
    });

    let (push_tx, mut push_rx) = mpsc::unbounded_channel();
    let forward = outbound_tx.clone();
    tokio::spawn(async move {
        while let Some(push) = push_rx.recv().await {
            if forward.send(Outbound::Push(push)).is_err() {
                break;
            }
        }
    });

    match PdftotextExtractor::new().check_installation().await {
        Ok(version) => log::debug!("Resume extraction via {}", version),
        Err(e) => log::warn!("Resume extraction unavailable: {}", e),
    }

    let mut dispatcher = Dispatcher::new(Arc::new(doc), preset)
        .with_context(Arc::new(ExecutionContext::new(timings)))
        .with_settings(Arc::new(JsonFileStore::new(&cli.settings)))
        .with_pushes(push_tx);
    match cli.score {
        Some(score) => dispatcher = dispatcher.with_scorer(Arc::new(ConstantScorer::new(score))),
        None => log::warn!("No --score given, bulk apply scores every posting 0"),
    }

    dispatcher.announce_ready();
    let watcher = match dispatcher.watch_content().await {
        Ok(handle) => Some(handle),
        Err(e) => {
            log::warn!("Content watcher unavailable: {}", e);
            None
        }
    };
    log::info!("Native host ready (origin: {})", cli.origin.join(" "));

    let mut stdin = tokio::io::stdin();
    loop {
        let frame = match native::read_frame(&mut stdin).await {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                log::error!("Failed to read message: {}", e);
                break;
            }
        };

        let request: Request = match serde_json::from_slice(&frame) {
            Ok(request) => request,
            Err(e) => {
                log::warn!("Malformed request: {}", e);
                let _ = outbound_tx.send(Outbound::Response(Response::error(format!("Malformed request: {}", e))));
                continue;
            }
        };

        log::debug!("Received {}", request.kind());
        let dispatcher = dispatcher.clone();
        let reply = outbound_tx.clone();
        tokio::spawn(async move {
            let response = dispatcher.handle(request).await;
            let _ = reply.send(Outbound::Response(response));
        });
    }

    log::info!("Browser closed the channel, shutting down");
    if let Some(handle) = watcher {
        handle.cancel();
    }
    drop(dispatcher);
    drop(outbound_tx);
    // in-flight replies still get a moment to drain
    let _ = tokio::time::timeout(std::time::Duration::from_secs(2), writer).await;
    drop(session);
    Ok(())
}
