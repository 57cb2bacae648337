//! job-autopilot command line
//!
//! Runs the content-side flows against a live Chrome tab (launched or attached
//! over CDP) or against a saved HTML page.

use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use clap::{ArgAction, Parser, Subcommand};
use job_autopilot::messaging::{Autopilot, LocalTransport, contract_schema};
use job_autopilot::scoring::ConstantScorer;
use job_autopilot::settings::JsonFileStore;
use job_autopilot::{
    BrowserSession, ConnectionOptions, Dispatcher, Document, ExecutionContext, ExtensionClient, HtmlDocument,
    LaunchOptions, Request, Response, SettingsStore, SitePreset, Timings,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "job-autopilot")]
#[command(version)]
#[command(about = "Scrape job postings and drive apply flows in Chrome", long_about = None)]
struct Cli {
    /// Launch browser in headed mode (default: headless)
    #[arg(long, short = 'H', global = true)]
    headed: bool,

    /// Path to custom browser executable
    #[arg(long, value_name = "PATH", global = true)]
    executable_path: Option<PathBuf>,

    /// DevTools WebSocket URL of a running browser
    #[arg(long, value_name = "URL", global = true)]
    connect: Option<String>,

    /// Persistent browser profile directory
    #[arg(long, value_name = "DIR", global = true)]
    user_data_dir: Option<PathBuf>,

    /// Page to open before running the command
    #[arg(long, value_name = "URL", global = true)]
    url: Option<String>,

    /// Work on a saved HTML page instead of a browser
    #[arg(long, value_name = "FILE", global = true)]
    html: Option<PathBuf>,

    /// Site preset JSON (default: built-in LinkedIn preset)
    #[arg(long, value_name = "FILE", global = true)]
    preset: Option<PathBuf>,

    /// Timing overrides JSON (millisecond fields)
    #[arg(long, value_name = "FILE", global = true)]
    timings: Option<PathBuf>,

    /// Settings file
    #[arg(long, value_name = "FILE", default_value = "job-autopilot-settings.json", global = true)]
    settings: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract the current posting
    Scrape,
    /// Run the apply sequence on the current posting
    Apply,
    /// Apply to every visible job whose score clears the threshold
    ApplyAll {
        /// Plain-text resume (default: resumeText from settings)
        #[arg(long, value_name = "FILE")]
        resume: Option<PathBuf>,
        #[arg(long, default_value_t = 75)]
        threshold: u8,
        /// Precomputed match score used for every posting
        #[arg(long, default_value_t = 0)]
        score: u8,
    },
    /// Extract text from a resume PDF
    Resume { pdf: PathBuf },
    /// Print a record every time the posting changes
    Watch {
        /// Auto apply when settings allow it, using this precomputed score
        #[arg(long, value_name = "SCORE")]
        autopilot: Option<u8>,
    },
    /// Show or update settings
    Settings {
        #[arg(long)]
        auto_apply: Option<bool>,
        #[arg(long)]
        min_score: Option<u8>,
        #[arg(long)]
        num_applications: Option<u32>,
        /// Plain-text resume to store
        #[arg(long, value_name = "FILE")]
        resume: Option<PathBuf>,
    },
    /// Print the JSON schema of the message contract
    Schema,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let store = Arc::new(JsonFileStore::new(&cli.settings));
    match &cli.command {
        Command::Schema => {
            println!("{}", serde_json::to_string_pretty(&contract_schema())?);
            return Ok(());
        }
        Command::Settings { auto_apply, min_score, num_applications, resume } => {
            let today = chrono::Local::now().date_naive();
            let mut settings = store.load_for_today(today).await?;
            if let Some(v) = auto_apply {
                settings.auto_apply = *v;
            }
            if let Some(v) = min_score {
                settings.min_score = *v;
            }
            if let Some(v) = num_applications {
                settings.num_applications = *v;
                settings.remaining_applications = settings.remaining_applications.min(*v);
            }
            if let Some(path) = resume {
                settings.resume_text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read resume {}", path.display()))?;
            }
            store.save(&settings).await?;
            println!("{}", serde_json::to_string_pretty(&settings)?);
            return Ok(());
        }
        _ => {}
    }

    let timings = match &cli.timings {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)
            .with_context(|| format!("Invalid timings file {}", path.display()))?,
        None => Timings::default(),
    };
    let preset = match &cli.preset {
        Some(path) => SitePreset::load(path).with_context(|| format!("Invalid preset {}", path.display()))?,
        None => SitePreset::linkedin(&timings)?,
    };

    // keeps the browser alive for the duration of the command
    let (_session, doc) = open_page(&cli)?;
    let (push_tx, mut push_rx) = mpsc::unbounded_channel();
    let dispatcher = Dispatcher::new(doc, preset)
        .with_context(Arc::new(ExecutionContext::new(timings.clone())))
        .with_settings(store.clone())
        .with_pushes(push_tx);

    let request = match &cli.command {
        Command::Scrape => Request::ScrapeJobDetails,
        Command::Apply => Request::AutoApply,
        Command::ApplyAll { resume, threshold, score } => {
            let resume_text = match resume {
                Some(path) => std::fs::read_to_string(path)?,
                None => String::new(),
            };
            let dispatcher = dispatcher.with_scorer(Arc::new(ConstantScorer::new(*score)));
            let request = Request::ApplyToAllVisibleJobs { resume_text, threshold: *threshold };
            return print_response(dispatcher.handle(request).await);
        }
        Command::Resume { pdf } => {
            let bytes = std::fs::read(pdf).with_context(|| format!("Failed to read {}", pdf.display()))?;
            Request::ExtractResumeText { pdf_base64: STANDARD.encode(bytes) }
        }
        Command::Watch { autopilot } => {
            dispatcher.announce_ready();
            let _watcher = dispatcher.watch_content().await?;
            let pilot = autopilot.map(|score| {
                let transport = Arc::new(LocalTransport::connected(dispatcher.clone()));
                let client = ExtensionClient::local(transport).with_timings(timings.clone());
                Autopilot::new(client, store.clone(), Arc::new(ConstantScorer::new(score)))
            });

            log::info!("Watching for posting changes");
            while let Some(push) = push_rx.recv().await {
                println!("{}", serde_json::to_string(&push)?);
                if let Some(pilot) = &pilot {
                    let action = pilot.on_push(push).await?;
                    log::info!("Autopilot: {:?}", action);
                }
            }
            return Ok(());
        }
        Command::Schema | Command::Settings { .. } => return Ok(()),
    };

    print_response(dispatcher.handle(request).await)
}

fn open_page(cli: &Cli) -> Result<(Option<BrowserSession>, Arc<dyn Document>)> {
    if let Some(path) = &cli.html {
        let markup = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let url = match &cli.url {
            Some(url) => url.clone(),
            None => format!("file://{}", std::fs::canonicalize(path)?.display()),
        };
        return Ok((None, Arc::new(HtmlDocument::new(markup).with_url(url))));
    }

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
    Ok((Some(session), Arc::new(doc)))
}

fn print_response(response: Response) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&response)?);
    if let Response::Error { error } = response {
        bail!(error);
    }
    Ok(())
}
