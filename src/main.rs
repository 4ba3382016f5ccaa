//! OCR Fusion - command line front end
//!
//! Each file argument is one page. Text goes to stdout, logs to stderr.

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ocr_fusion::assembly::{self, join_pages};
use ocr_fusion::config::{self, AppConfig};
use ocr_fusion::source::{FileImageSource, ImageSource};
use ocr_fusion::storage;
use ocr_fusion::vision::TesseractCli;
use ocr_fusion::visualize::{FileVisualizationSink, PrefixedSink, VisualizationSink};

/// Assembly strategy selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Multi-scale row scan fused with the whole-page pass
    Fuse,
    /// Best multi-scale candidate without fusion
    Multi,
    /// Row scan at a single window height
    Rows,
    /// One block-mode box pass assembled into lines
    Boxes,
    /// Save the page with recognized words highlighted
    Highlight,
}

/// Window height given as pixels or `auto`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowHeight {
    Auto,
    Pixels(u32),
}

impl FromStr for RowHeight {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("auto") {
            return Ok(RowHeight::Auto);
        }
        match s.parse::<u32>() {
            Ok(0) => Err("row height must be positive".to_string()),
            Ok(px) => Ok(RowHeight::Pixels(px)),
            Err(_) => Err(format!("expected a pixel count or `auto`, got `{}`", s)),
        }
    }
}

/// OCR Fusion - Row-based OCR text assembly
#[derive(Parser, Debug)]
#[command(name = "ocr-fusion")]
#[command(about = "Assemble page text from overlapping row scans and a whole-page OCR pass")]
struct Args {
    /// Page images, processed in order
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Assembly strategy
    #[arg(short, long, value_enum, default_value = "fuse")]
    mode: Mode,

    /// Window height in pixels or `auto`; restricts `fuse`/`multi` to one height
    #[arg(long)]
    row_height: Option<RowHeight>,

    /// Window overlap in pixels for `rows` mode (default: a third of the height)
    #[arg(long)]
    overlap: Option<u32>,

    /// Minimum word confidence (0-100)
    #[arg(long)]
    min_confidence: Option<f32>,

    /// Save annotated window images
    #[arg(long)]
    visualize: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Configuration file (default: <config dir>/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tesseract executable
    #[arg(long)]
    tesseract: Option<String>,

    /// Recognition language, e.g. `eng+deu`
    #[arg(long)]
    lang: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = load_or_default_config(args.config.as_deref())?;
    apply_overrides(&mut config, &args);
    config
        .assembly
        .validate()
        .context("Invalid assembly options")?;

    let recognizer = TesseractCli::new(&config.engine);
    match recognizer.version() {
        Ok(version) => info!("Using {}", version),
        Err(e) => bail!("Tesseract is not usable: {}", e),
    }
    if let Ok(installed) = recognizer.available_languages() {
        for lang in recognizer.language().split('+') {
            if !installed.iter().any(|l| l == lang) {
                warn!("Language `{}` is not installed", lang);
            }
        }
    }

    let sink = if config.assembly.visualize || args.mode == Mode::Highlight {
        let dir = match &config.output.visualization_dir {
            Some(dir) => dir.clone(),
            None => storage::get_visualization_dir()?,
        };
        info!("Saving visualizations to {:?}", dir);
        Some(FileVisualizationSink::new(dir)?)
    } else {
        None
    };

    match args.mode {
        Mode::Fuse => run_fuse(&args, &config, &recognizer, sink.as_ref()),
        Mode::Multi => run_multi(&args, &config, &recognizer, sink.as_ref()),
        Mode::Rows => run_rows(&args, &config, &recognizer, sink.as_ref()),
        Mode::Boxes => run_boxes(&args, &config, &recognizer),
        Mode::Highlight => match &sink {
            Some(sink) => run_highlight(&args, &config, &recognizer, sink),
            None => bail!("Highlight mode needs a visualization directory"),
        },
    }
}

/// Load configuration from the given path, the default location, or defaults
fn load_or_default_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        let config = config::load_config(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?;
        info!("Loaded configuration from {:?}", path);
        return Ok(config);
    }

    if let Ok(config_dir) = storage::get_config_dir() {
        let config_path = config_dir.join("config.toml");
        if config_path.exists() {
            if let Ok(config) = config::load_config(&config_path) {
                info!("Loaded configuration from {:?}", config_path);
                return Ok(config);
            }
        }
    }
    info!("Using default configuration");
    Ok(AppConfig::default())
}

/// Command line flags win over the configuration file
fn apply_overrides(config: &mut AppConfig, args: &Args) {
    if let Some(min_confidence) = args.min_confidence {
        config.assembly.min_confidence = min_confidence;
    }
    if args.visualize {
        config.assembly.visualize = true;
    }
    if args.mode != Mode::Rows {
        match args.row_height {
            Some(RowHeight::Pixels(height)) => config.assembly.window_heights = vec![height],
            Some(RowHeight::Auto) => config.assembly.auto_window_height = true,
            None => {}
        }
    }
    if let Some(path) = &args.tesseract {
        config.engine.tesseract_path = path.clone();
    }
    if let Some(lang) = &args.lang {
        config.engine.language = lang.clone();
    }
}

/// Sink for one page, labels prefixed with the page number when there are several
fn page_sink<'a>(sink: Option<&'a FileVisualizationSink>, idx: usize, pages: usize) -> Option<PrefixedSink<'a>> {
    let sink = sink?;
    let prefix = if pages > 1 {
        format!("page_{:03}", idx + 1)
    } else {
        "page".to_string()
    };
    Some(PrefixedSink::new(sink, prefix))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_fuse(
    args: &Args,
    config: &AppConfig,
    recognizer: &TesseractCli,
    sink: Option<&FileVisualizationSink>,
) -> Result<()> {
    let pages = assembly::assemble_pages(
        &args.files,
        &FileImageSource,
        recognizer,
        &config.assembly,
        sink.map(|s| s as &dyn VisualizationSink),
    )
    .context("Failed to assemble pages")?;

    if args.json {
        return print_json(&pages);
    }
    let texts = pages.iter().map(|p| p.result.text.as_str());
    println!("{}", render_pages(texts, args.files.len(), &config.output.page_separator));
    Ok(())
}

fn run_multi(
    args: &Args,
    config: &AppConfig,
    recognizer: &TesseractCli,
    sink: Option<&FileVisualizationSink>,
) -> Result<()> {
    let mut selections = Vec::with_capacity(args.files.len());

    for (idx, path) in args.files.iter().enumerate() {
        let page = FileImageSource.load(path)?;
        let page_sink = page_sink(sink, idx, args.files.len());
        let selection = assembly::select_text(
            &page,
            recognizer,
            &config.assembly,
            page_sink.as_ref().map(|s| s as &dyn VisualizationSink),
        )
        .with_context(|| format!("Failed to read {:?}", path))?;
        selections.push(selection);
    }

    if args.json {
        return print_json(&selections);
    }
    let texts = selections.iter().map(|s| s.best_text());
    println!("{}", render_pages(texts, args.files.len(), &config.output.page_separator));
    Ok(())
}

fn run_rows(
    args: &Args,
    config: &AppConfig,
    recognizer: &TesseractCli,
    sink: Option<&FileVisualizationSink>,
) -> Result<()> {
    let mut extractions = Vec::with_capacity(args.files.len());

    for (idx, path) in args.files.iter().enumerate() {
        let page = FileImageSource.load(path)?;
        let height = match args.row_height {
            Some(RowHeight::Pixels(px)) => px,
            Some(RowHeight::Auto) => assembly::suggest_row_height(&page, recognizer, &config.assembly),
            None => config.assembly.window_heights.iter().copied().max().unwrap_or(100),
        };
        let overlap = args.overlap.unwrap_or_else(|| config.assembly.overlap_for(height));
        info!("Scanning {:?} with window height {} and overlap {}", path, height, overlap);

        let page_sink = page_sink(sink, idx, args.files.len());
        let extraction = assembly::extract_rows(
            &page,
            recognizer,
            &config.assembly,
            height,
            overlap,
            page_sink.as_ref().map(|s| s as &dyn VisualizationSink),
        )
        .with_context(|| format!("Failed to scan {:?}", path))?;
        extractions.push(extraction);
    }

    if args.json {
        return print_json(&extractions);
    }
    let texts = extractions.iter().map(|e| e.text.as_str());
    println!("{}", render_pages(texts, args.files.len(), &config.output.page_separator));
    Ok(())
}

fn run_boxes(args: &Args, config: &AppConfig, recognizer: &TesseractCli) -> Result<()> {
    let mut texts = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let page = FileImageSource.load(path)?;
        let text = assembly::extract_region(&page, recognizer, &config.assembly)
            .with_context(|| format!("Failed to read {:?}", path))?;
        texts.push(text);
    }

    if args.json {
        return print_json(&texts);
    }
    println!(
        "{}",
        render_pages(texts.iter().map(String::as_str), args.files.len(), &config.output.page_separator)
    );
    Ok(())
}

fn run_highlight(
    args: &Args,
    config: &AppConfig,
    recognizer: &TesseractCli,
    sink: &FileVisualizationSink,
) -> Result<()> {
    let mut results = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let page = FileImageSource.load(path)?;
        let label = path
            .file_stem()
            .map(|s| format!("{}_highlighted", s.to_string_lossy()))
            .unwrap_or_else(|| "highlighted".to_string());
        let result = assembly::highlight_boxes(&page, recognizer, &config.assembly, sink, &label)
            .with_context(|| format!("Failed to highlight {:?}", path))?;
        results.push(result);
    }

    if args.json {
        return print_json(&results);
    }
    for result in &results {
        println!("{} ({} words)", result.visualization, result.boxes.len());
    }
    Ok(())
}

/// A single page prints bare; several pages get separator headers
fn render_pages<'a>(texts: impl IntoIterator<Item = &'a str>, pages: usize, separator: &str) -> String {
    if pages > 1 {
        join_pages(texts, separator)
    } else {
        texts.into_iter().collect::<Vec<_>>().join("\n")
    }
}
