//! Batch stencils from the terminal, through the same session the GUI uses.
//!
//! ```text
//! easystencil --input portrait.jpg --output portrait-stencil.png
//! easystencil -i shots/*.jpg --style rojas --output-dir stencils/
//! easystencil -i face.png --backend sketch --transparent
//! easystencil -i old-stencil.png --recolor-only --style azules -o blue.png
//! ```
//!
//! Files are handled one at a time; each is written before the next starts.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;

use crate::io::Upload;
use crate::ops::generate::{self, StencilGenerator};
use crate::ops::recolor::{RecolorMode, extract_ink, recolor_encoded};
use crate::session::SessionController;
use crate::settings::{AppSettings, Backend};
use crate::store::{JsonFileStore, MemoryStore, WorkStore};
use crate::styles::ColorStyle;

/// Upper bound on one generation request.
const GENERATION_TIMEOUT: Duration = Duration::from_secs(300);

/// EasyStencil headless stencil generator.
#[derive(Parser, Debug)]
#[command(
    name = "easystencil",
    about = "EasyStencil headless tattoo stencil generator",
    long_about = "Turn photos into tattoo stencils without opening the GUI.\n\
                  Accepts JPG, PNG and WebP up to 10MB and writes PNG.\n\n\
                  Example:\n  \
                  easystencil --input portrait.jpg --output stencil.png\n  \
                  easystencil -i *.jpg --style rojas --output-dir out/"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.jpg", "shots/*.png").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Line color: negras, rojas, azules, violetas, verdes (or its hex).
    /// Defaults to the style saved in settings.
    #[arg(short, long, value_name = "STYLE")]
    pub style: Option<String>,

    /// Extra instruction sent ahead of the stencil guidelines.
    #[arg(short, long, value_name = "TEXT")]
    pub prompt: Option<String>,

    /// Generator backend: gemini or sketch. Defaults to the saved setting.
    #[arg(short, long, value_name = "BACKEND")]
    pub backend: Option<String>,

    /// Write lines on a transparent background instead of white.
    #[arg(long)]
    pub transparent: bool,

    /// Treat each input as an existing black-line stencil and only recolor it.
    #[arg(long)]
    pub recolor_only: bool,

    /// Output file path. Only valid for single-file input.
    /// For batch input use --output-dir instead.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    /// Files are written here as `{stem}-stencil.png`.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Record each generated stencil in the saved works list.
    #[arg(long)]
    pub save: bool,

    /// Print per-file timing and mirror the session log to stderr.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// `-i`/`--input` on the command line means no window.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| a == "--input" || a == "-i")
    }
}

/// Process every input. Fails if any single file failed.
pub fn run(args: CliArgs) -> ExitCode {
    crate::logger::echo_to_stderr(args.verbose);

    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    let mut settings = AppSettings::load();
    if let Some(name) = &args.backend {
        match Backend::parse(name) {
            Some(b) => settings.backend = b,
            None => {
                eprintln!("error: unknown backend '{}' (expected gemini or sketch).", name);
                return ExitCode::FAILURE;
            }
        }
    }
    let style = match &args.style {
        Some(id) => match ColorStyle::parse(id) {
            Some(s) => s,
            None => {
                eprintln!(
                    "error: unknown style '{}' (expected one of: {}).",
                    id,
                    ColorStyle::ALL.map(|s| s.id()).join(", ")
                );
                return ExitCode::FAILURE;
            }
        },
        None => settings.default_style,
    };
    settings.default_style = style;
    settings.transparent_background = args.transparent;

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("error: could not create output directory '{}': {}", dir.display(), e);
        return ExitCode::FAILURE;
    }

    let store: Box<dyn WorkStore> = match (args.save, JsonFileStore::open_default()) {
        (true, Some(store)) => Box::new(store),
        (true, None) => {
            eprintln!("warning: no config directory available, works will not be saved.");
            Box::new(MemoryStore::new())
        }
        (false, _) => Box::new(MemoryStore::new()),
    };
    let generator: Arc<dyn StencilGenerator> = Arc::from(generate::from_settings(&settings));
    let mut session = SessionController::with_settings(generator, store, &settings);
    if let Some(p) = &args.prompt {
        session.prompt = p.clone();
    }

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }

        let file_start = Instant::now();

        let Some(output_path) =
            stencil_path_for(input_path, args.output.as_deref(), args.output_dir.as_deref())
        else {
            eprintln!("  error: cannot determine output path for '{}'.", input_path.display());
            any_failure = true;
            continue;
        };

        let result = if args.recolor_only {
            recolor_one(input_path, &output_path, style, args.transparent)
        } else {
            generate_one(&mut session, input_path, &output_path)
        };

        match result {
            Ok(()) => {
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

fn generate_one(session: &mut SessionController, input: &Path, output: &Path) -> Result<(), String> {
    session.load_path(input).map_err(|e| e.user_message())?;
    if !session.generate() {
        return Err("generation could not start".to_string());
    }
    if !session.wait_for_generation(GENERATION_TIMEOUT) {
        session.reset();
        return Err("generation timed out".to_string());
    }
    if let Some(msg) = session.last_error() {
        // The generic message hides the cause; point at the log.
        let hint = crate::logger::log_path()
            .map(|p| format!(" (details in {})", p.display()))
            .unwrap_or_default();
        return Err(format!("{}{}", msg, hint));
    }
    session.save_png(output).map_err(|e| e.to_string())
}

fn recolor_one(input: &Path, output: &Path, style: ColorStyle, transparent: bool) -> Result<(), String> {
    let upload = Upload::read(input).map_err(|e| e.to_string())?;
    let recolored = if transparent {
        let img = upload.decode().map_err(|e| e.to_string())?;
        extract_ink(&img, [0, 0, 0], style.rgb())
    } else {
        recolor_encoded(&upload.bytes, RecolorMode::Opaque, [0, 0, 0], style.rgb())
            .map_err(|e| e.to_string())?
    };
    crate::io::write_png(&recolored, output).map_err(|e| format!("save failed: {}", e))
}

/// Literal paths and glob matches in the order given, each file once.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut inputs: Vec<PathBuf> = Vec::new();
    for pattern in patterns {
        let found: Vec<PathBuf> = if Path::new(pattern).exists() {
            vec![PathBuf::from(pattern)]
        } else {
            match glob::glob(pattern) {
                Ok(paths) => paths.flatten().collect(),
                Err(e) => {
                    eprintln!("warning: skipping '{}': {}", pattern, e);
                    continue;
                }
            }
        };
        if found.is_empty() {
            eprintln!("warning: nothing matches '{}'.", pattern);
        }
        for path in found {
            if !inputs.contains(&path) {
                inputs.push(path);
            }
        }
    }
    inputs
}

/// `--output` as given, otherwise `{stem}-stencil.png` in `--output-dir` or
/// beside the input.
fn stencil_path_for(input: &Path, output: Option<&Path>, output_dir: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = output {
        return Some(path.to_path_buf());
    }
    let name = format!("{}-stencil.png", input.file_stem()?.to_string_lossy());
    let dir = output_dir.or_else(|| input.parent()).unwrap_or(Path::new("."));
    Some(dir.join(name))
}
