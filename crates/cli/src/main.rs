#![deny(unsafe_code)]
//! CLI binary for the fieldglow flow-field background engine.
//!
//! Subcommands:
//! - `render <preset>`: run a preset headlessly for N frames, write a PNG
//! - `list`: print available presets
//! - `schema <preset>`: print a preset's parameter schema as JSON

mod error;

use clap::{Parser, Subcommand};
use error::CliError;
use fieldglow_core::{Engine, Viewport};
use fieldglow_engines::{render_headless, HeadlessOptions, PointerPath, PresetKind};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fieldglow", about = "Flow-field background renderer")]
struct Cli {
    /// Output as JSON instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a preset for N frames and write a PNG of the last one.
    Render {
        /// Preset name (e.g. "attention").
        preset: String,

        /// Viewport width in logical pixels.
        #[arg(short = 'W', long, default_value_t = 640)]
        width: u32,

        /// Viewport height in logical pixels.
        #[arg(short = 'H', long, default_value_t = 360)]
        height: u32,

        /// Number of host frame callbacks to simulate.
        #[arg(short, long, default_value_t = 120)]
        frames: usize,

        /// Simulated display refresh rate.
        #[arg(long, default_value_t = 60.0)]
        fps: f64,

        /// Noise seed for deterministic output.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Device pixel ratio (clamped to the preset's ceiling).
        #[arg(long, default_value_t = 1.0)]
        dpr: f64,

        /// Synthetic pointer: "none", "sweep" or "X,Y".
        #[arg(short, long, default_value = "none")]
        pointer: String,

        /// Output file path.
        #[arg(short, long, default_value = "output.png")]
        output: PathBuf,

        /// Flat parameter overrides as a JSON object.
        #[arg(long, default_value = "{}")]
        params: String,
    },
    /// List available presets.
    List,
    /// Print the parameter schema of a preset.
    Schema {
        preset: String,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // A subscriber installed by an embedding process wins.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}

fn parse_pointer(spec: &str) -> Result<PointerPath, CliError> {
    match spec.trim() {
        "none" => Ok(PointerPath::None),
        "sweep" => Ok(PointerPath::Sweep),
        other => {
            let (x, y) = other
                .split_once(',')
                .ok_or_else(|| CliError::Input(format!("invalid --pointer '{other}'")))?;
            let coord = |s: &str| {
                s.trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| CliError::Input(format!("invalid --pointer coordinate '{s}'")))
            };
            Ok(PointerPath::Fixed {
                x: coord(x)?,
                y: coord(y)?,
            })
        }
    }
}

fn parse_params(raw: &str) -> Result<serde_json::Value, CliError> {
    let params: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| CliError::Input(format!("invalid --params JSON: {e}")))?;
    if !params.is_object() {
        return Err(CliError::Input("--params must be a JSON object".into()));
    }
    Ok(params)
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::List => {
            let presets = PresetKind::list_presets();
            if cli.json {
                let info = serde_json::json!({ "presets": presets });
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("Presets:");
                for name in presets {
                    println!("  {name}");
                }
            }
        }
        Command::Schema { preset } => {
            let schema = PresetKind::from_name(&preset)?.config().param_schema();
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
        Command::Render {
            preset,
            width,
            height,
            frames,
            fps,
            seed,
            dpr,
            pointer,
            output,
            params,
        } => {
            let params = parse_params(&params)?;
            let pointer = parse_pointer(&pointer)?;
            let kind = PresetKind::from_name(&preset)?;
            let (w, h) = (f64::from(width), f64::from(height));

            let scene = kind.build(Viewport::logical(w, h), seed, &params)?;
            let background = scene.config().render.background;
            let options = HeadlessOptions {
                width: w,
                height: h,
                dpr,
                frames,
                fps,
                pointer,
            };
            let driver = render_headless(scene, &options)?;
            fieldglow_engines::snapshot::write_png(driver.surface(), background, &output)?;

            if cli.json {
                let info = serde_json::json!({
                    "preset": kind.name(),
                    "width": width,
                    "height": height,
                    "frames": driver.frames_rendered(),
                    "seed": seed,
                    "effects": driver.engine().overlay().len(),
                    "params": driver.engine().params(),
                    "output": output.display().to_string(),
                });
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                eprintln!(
                    "rendered {} ({width}x{height}, {} frames, seed {seed}) -> {}",
                    kind.name(),
                    driver.frames_rendered(),
                    output.display()
                );
            }
        }
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let json_mode = cli.json;
    if let Err(e) = run(cli) {
        if json_mode {
            let j = serde_json::json!({"error": e.to_string(), "exit_code": e.exit_code()});
            eprintln!("{}", serde_json::to_string_pretty(&j).unwrap_or_default());
        } else {
            eprintln!("error: {e}");
        }
        process::exit(e.exit_code());
    }
}
