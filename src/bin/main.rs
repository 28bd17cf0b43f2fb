use anyhow::Context;
use clap::{Parser, Subcommand};
use eoka_replay::{
    EokaPage, Flow, Inputs, PageDriver, Replayer, Settings, TaskStatus, TaskStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "eoka-replay")]
#[command(about = "Replay recorded browser user flows")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Settings file (YAML)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose output (-v for info, -vv for debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (only errors)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a flow in a fresh browser
    Run {
        /// Flow file, relative to the flows directory
        flow: String,

        /// Set an input (can be used multiple times)
        #[arg(short = 'I', long = "input", value_name = "KEY=VALUE")]
        inputs: Vec<String>,

        /// JSON object of inputs; -I values take precedence
        #[arg(long = "inputs", value_name = "FILE")]
        inputs_file: Option<PathBuf>,

        /// Run in headless mode (overrides settings)
        #[arg(long)]
        headless: bool,
    },

    /// Print a flow's input schema
    Schema {
        /// Flow file, relative to the flows directory
        flow: String,
    },

    /// Parse a flow without running it
    Check {
        /// Flow file, relative to the flows directory
        flow: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            _ => Level::DEBUG,
        }
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    let settings = match cli.config {
        Some(ref path) => Settings::load(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => Settings::from_env()?,
    };
    let replayer = Replayer::from_settings(&settings, TaskStore::new());

    match cli.command {
        Command::Run {
            flow,
            inputs,
            inputs_file,
            headless,
        } => {
            let mut merged = match inputs_file {
                Some(path) => {
                    let content = std::fs::read_to_string(&path)
                        .with_context(|| format!("reading inputs from {}", path.display()))?;
                    Inputs::from_json(&content)?
                }
                None => Inputs::new(),
            };
            merged = merged.merge(Inputs::from_args(&inputs)?);

            let mut settings = settings;
            if headless {
                settings.browser.headless = true;
            }
            run(&replayer, &settings, &flow, merged).await
        }
        Command::Schema { flow } => {
            let schema = replayer
                .input_schema(&flow)
                .await
                .with_context(|| format!("reading flow {}", flow))?;
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(())
        }
        Command::Check { flow } => {
            check(&replayer, &flow).with_context(|| format!("checking flow {}", flow))
        }
    }
}

async fn run(
    replayer: &Replayer,
    settings: &Settings,
    flow_ref: &str,
    inputs: Inputs,
) -> anyhow::Result<()> {
    let path = replayer.resolve_path(flow_ref);
    let flow = Flow::load_with_inputs(&path, &inputs)
        .with_context(|| format!("loading flow {}", path.display()))?;
    let (width, height) = match settings.browser.viewport {
        Some(v) => (v.width, v.height),
        None => flow.initial_viewport().unwrap_or((1280, 720)),
    };

    let stealth = eoka::StealthConfig {
        headless: settings.browser.headless,
        proxy: settings.browser.proxy.clone(),
        user_agent: settings.browser.user_agent.clone(),
        viewport_width: width,
        viewport_height: height,
        ..Default::default()
    };

    debug!(
        "Launching browser (headless: {}, viewport: {}x{})",
        settings.browser.headless, width, height
    );
    let browser = Arc::new(
        eoka::Browser::launch_with_config(stealth)
            .await
            .context("launching browser")?,
    );
    let page = EokaPage::open(browser.clone(), "about:blank")
        .await?
        .with_poll_interval(settings.poll_interval_ms);
    let page: Arc<dyn PageDriver> = Arc::new(page);

    println!("Replaying: {}", flow.title.as_deref().unwrap_or(flow_ref));

    let handle = replayer.launch(flow_ref, inputs, page).await;
    let task_id = handle.task_id();
    let poll = Duration::from_millis(settings.poll_interval_ms);
    loop {
        let entry = replayer.store().status(task_id).await?;
        if entry.status.is_terminal() {
            break;
        }
        tokio::time::sleep(poll).await;
    }
    let entry = handle.wait().await?;

    println!("{}", serde_json::to_string_pretty(&entry)?);

    // The replay task has exited, so this is the last reference.
    match Arc::try_unwrap(browser) {
        Ok(browser) => browser.close().await?,
        Err(_) => warn!("Browser still referenced; leaving it to exit on drop"),
    }

    if entry.status == TaskStatus::Failed {
        std::process::exit(1);
    }
    Ok(())
}

fn check(replayer: &Replayer, flow_ref: &str) -> eoka_replay::Result<()> {
    let path = replayer.resolve_path(flow_ref);
    let flow = Flow::load(&path)?;

    println!("Flow valid: {}", flow.title.as_deref().unwrap_or(flow_ref));
    println!("  Path: {}", path.display());
    println!("  Steps: {}", flow.steps.len());
    for (index, step) in flow.steps.iter().enumerate() {
        let selector = step
            .selectors
            .iter()
            .find(|s| s.query().is_some())
            .map(|s| format!(" {}", s))
            .unwrap_or_default();
        println!("    {}. {}{}", index, step.action.name(), selector);
        for event in &step.asserted_events {
            println!("       asserts {}", event.name());
        }
    }
    if flow.input_schema.is_some() {
        println!("  Input schema: yes");
    }
    Ok(())
}
