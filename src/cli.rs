use crate::config::{Config, load_config};
use crate::editor::Editor;
use crate::geometry::SizeTable;
use crate::ir::{Area, GraphStore};
use crate::layout_dump::{LayoutDump, write_layout_dump};
use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "mapedit",
    version,
    about = "Auto-arrange one lane of a message-mapping document"
)]
pub struct Args {
    /// Input document (.json) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "document")]
    pub output_format: OutputFormat,

    /// Config file (JSON5)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Area to arrange
    #[arg(short = 'a', long = "area", value_parser = parse_area, default_value = "operations")]
    pub area: Area,

    /// y of the first branch
    #[arg(long = "top")]
    pub top: Option<f32>,

    /// Log verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// The arranged document
    Document,
    /// Boxes and edge segments for inspection
    Dump,
}

fn parse_area(token: &str) -> std::result::Result<Area, String> {
    Area::from_token(token).ok_or_else(|| format!("unknown area `{token}`"))
}

pub fn run() -> Result<()> {
    run_with(Args::parse())
}

pub fn run_with(args: Args) -> Result<()> {
    init_tracing(args.verbose);
    let mut config = load_config(args.config.as_deref())?;
    if let Some(top) = args.top {
        config.layout.top = top;
    }
    let input = read_input(args.input.as_deref())?;
    let arranged = arrange(&input, &config, args.area, args.output_format)?;
    match (&arranged, args.output.as_deref()) {
        (Arranged::Dump(dump), Some(path)) => write_layout_dump(path, dump),
        (_, path) => write_output(&arranged.to_text()?, path),
    }
}

enum Arranged {
    Document(String),
    Dump(LayoutDump),
}

impl Arranged {
    fn to_text(&self) -> Result<String> {
        Ok(match self {
            Arranged::Document(text) => text.clone(),
            Arranged::Dump(dump) => serde_json::to_string_pretty(dump)?,
        })
    }
}

/// Load a document, arrange `area` and render the result.
fn arrange(input: &str, config: &Config, area: Area, format: OutputFormat) -> Result<Arranged> {
    let store = GraphStore::from_json(input)?;
    let sizes = SizeTable::declared(&store, &config.layout);
    let mut editor = Editor::new(store, sizes, config);
    let report = editor.run_auto_layout(area);
    if report.branches == 0 {
        tracing::warn!(area = %area, "no edges enter this area from the input side; nothing arranged");
    }
    tracing::info!(
        branches = report.branches,
        moved = report.moved,
        lane = report.lane_objects,
        "arranged"
    );
    Ok(match format {
        OutputFormat::Document => Arranged::Document(editor.store().to_json_pretty()?),
        OutputFormat::Dump => Arranged::Dump(LayoutDump::from_store(
            editor.store(),
            editor.geometry(),
            &editor.layout_config().ports,
            Some(report),
        )),
    })
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    // a subscriber may already be installed when embedded
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path
        && path != Path::new("-")
    {
        return Ok(std::fs::read_to_string(path)?);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn write_output(text: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, text)?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}
