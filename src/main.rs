use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use simplelog::{Config, LevelFilter, WriteLogger};

use fbvpdf::ddi::{DdiChannel, DdiRole};
use fbvpdf::document::{DocumentEngine, TextDocument};
use fbvpdf::settings::load_settings;
use fbvpdf::shell::{EngineLoader, ViewerShell};
use fbvpdf::viewer::RunMode;

#[derive(Parser, Debug)]
#[command(name = "fbvpdf", about = "Remote-controllable schematic viewer", version)]
struct Args {
    /// Document to open
    path: Option<PathBuf>,

    /// DDI channel path prefix
    #[arg(short = 'D', long = "ddi")]
    ddi_prefix: Option<String>,

    /// Process this payload as if it arrived over the channel, then keep
    /// running (or exit, with --headless)
    #[arg(short = 's', long = "send")]
    payload: Option<String>,

    /// Single-shot search oracle mode: scan, report, exit
    #[arg(long)]
    headless: bool,

    /// Open at this page (1-based)
    #[arg(short = 'p', long = "page")]
    page: Option<i32>,

    /// Invert colors
    #[arg(short = 'I', long)]
    invert: bool,

    /// Window width
    #[arg(short = 'W', long)]
    width: Option<u32>,

    /// Window height
    #[arg(short = 'H', long)]
    height: Option<u32>,

    /// Log everything
    #[arg(long)]
    verbose: bool,
}

fn open_document(path: &Path) -> Result<Box<dyn DocumentEngine>> {
    let doc = TextDocument::open(path)
        .with_context(|| format!("cannot open document {}", path.display()))?;
    Ok(Box::new(doc))
}

fn main() -> Result<()> {
    let args = Args::parse();

    WriteLogger::init(
        if args.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        },
        Config::default(),
        File::create("fbvpdf.log")?,
    )?;

    info!("starting fbvpdf");
    let settings = load_settings();

    let doc: Box<dyn DocumentEngine> = match &args.path {
        Some(path) => open_document(path)?,
        None => Box::new(TextDocument::from_text("")),
    };
    let loader: EngineLoader = Box::new(|path| Ok(Box::new(TextDocument::open(path)?)));

    let mut ddi = DdiChannel::new();
    if let Some(prefix) = args.ddi_prefix.as_ref().or(settings.ddi_prefix.as_ref()) {
        ddi.configure(prefix);
        ddi.set_role(DdiRole::Responder);
        info!("channel configured on prefix {prefix}");
    }

    let mut shell = ViewerShell::new(doc, loader, ddi);
    shell.set_poll_interval(settings.poll_interval);
    shell.viewer.heuristics = settings.heuristics;
    shell.viewer.raise_on_hit = settings.raise_on_hit;
    shell.viewer.invert = settings.invert;
    shell.viewer.win_w = args.width.unwrap_or(settings.window_width);
    shell.viewer.win_h = args.height.unwrap_or(settings.window_height);
    for (action, combo) in &settings.keys {
        shell.viewer.keymap.rebind(*action, *combo);
    }
    shell.viewer.keymap.derive_shifted();
    if args.invert {
        shell.viewer.invert = true;
    }
    if args.headless {
        shell.viewer.run_mode = RunMode::Headless;
    }
    if let Some(page) = args.page {
        shell.viewer.jump_to_page_xy(page - 1, 0.0, 0.0);
    }

    if let Some(payload) = &args.payload {
        shell.process_payload(payload);
    }

    if shell.is_running() && shell.viewer.run_mode == RunMode::Interactive {
        shell.run();
    }

    info!("fbvpdf exiting");
    Ok(())
}
