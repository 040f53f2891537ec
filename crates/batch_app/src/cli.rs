use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use batch_core::{BatchRequest, BatchView, StopPolicy};
use batch_engine::{BatchController, ChannelObserver};
use batch_logging::batch_info;
use clap::{ArgAction, Parser, ValueEnum};

use crate::render::{OutputMode, Renderer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StopPolicyArg {
    /// Let the running download finish, start nothing new
    Finish,
    /// Kill the running download
    Immediate,
}

impl From<StopPolicyArg> for StopPolicy {
    fn from(arg: StopPolicyArg) -> Self {
        match arg {
            StopPolicyArg::Finish => StopPolicy::Finish,
            StopPolicyArg::Immediate => StopPolicy::Immediate,
        }
    }
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "batchdl",
    version,
    about = "Download a list of tracks one by one through an external downloader"
)]
pub struct Cli {
    /// Text file with one URL or identifier per line (blank lines are skipped)
    #[arg(long, short = 'l')]
    pub list: Option<PathBuf>,

    /// Directory the downloader writes into
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// RON file with downloader settings; command-line flags win over it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Downloader executable
    #[arg(long)]
    pub tool: Option<String>,

    /// Extra argument placed before `download` (repeatable), e.g. `--tool python3 --tool-arg=-m --tool-arg spotdl`
    #[arg(long = "tool-arg", allow_hyphen_values = true)]
    pub tool_args: Vec<String>,

    /// Audio format passed to the downloader
    #[arg(long)]
    pub format: Option<String>,

    /// Bitrate passed to the downloader
    #[arg(long)]
    pub bitrate: Option<String>,

    /// Output path template below the output directory, without extension
    #[arg(long)]
    pub output_template: Option<String>,

    /// What `stop` does to the download in progress
    #[arg(long, value_enum)]
    pub stop_policy: Option<StopPolicyArg>,

    /// Print one JSON object per event instead of text
    #[arg(long)]
    pub json: bool,

    /// Also write logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

pub fn run(args: Cli) -> Result<()> {
    crate::logging::init(&args);

    let list = args
        .list
        .as_deref()
        .ok_or_else(|| anyhow!("missing --list <FILE>"))?;
    let output_dir = args
        .output
        .clone()
        .ok_or_else(|| anyhow!("missing --output <DIR>"))?;

    let identifiers = crate::config::load_identifiers(list)?;
    if identifiers.is_empty() {
        bail!("no identifiers found in {}", list.display());
    }
    let tool = crate::config::build_tool_config(&args)?;
    batch_info!("Tool settings: {:?}", tool);

    let request = BatchRequest::new(identifiers, output_dir);
    let mut view = BatchView::new(request.items());
    let (observer, events) = ChannelObserver::channel();
    let controller = BatchController::new(request, tool, Box::new(observer));

    let mode = if args.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };
    let renderer = Renderer::new(mode, view.rows().len());

    controller.start().context("failed to start batch")?;
    crate::controls::spawn_stdin_controls(controller.clone(), mode == OutputMode::Text);

    // Disconnects once the run loop has dropped the observer.
    for event in events.iter() {
        view.apply(&event);
        let changed = view.consume_dirty();
        renderer.event(&event, &view, changed)?;
    }

    let report = controller
        .wait()
        .context("run loop ended without a report")?;
    renderer.summary(&report)?;
    Ok(())
}
