use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;
use std::str::FromStr;
use tabled::{Table, Tabled};

use breathrs::adapter::{ClipMetadata, FrameRange, RecordingAdapter};
use breathrs::logging::{init_logging, LogConfig, LogLevel};
use breathrs::models::{AgeGroup, IndicatorCategory, ProtocolAction, STRESS_MAX, STRESS_MIN};
use breathrs::SessionConfig;

/// BreathRS - Biometric-Driven Guided Breathing
///
/// Maps heart-rate-variability readings and stress levels to guided
/// breathing patterns via a clinical decision table, and drives a
/// phase-cycling animation controller from them.
#[derive(Parser)]
#[command(name = "breathrs")]
#[command(author = "BreathRS Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Biometric-driven guided breathing", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the full 15-cell clinical decision surface
    Table,

    /// Classify an RMSSD reading for an age group
    Classify {
        /// Age group (child, young-adult, older-adult)
        #[arg(short, long)]
        age_group: String,

        /// RMSSD reading in milliseconds
        #[arg(short, long)]
        rmssd: f64,
    },

    /// Run the full decision pipeline for a biometric reading
    Recommend {
        /// Age group (child, young-adult, older-adult)
        #[arg(short, long)]
        age_group: String,

        /// RMSSD reading in milliseconds
        #[arg(short, long)]
        rmssd: f64,

        /// Stress level (1-5)
        #[arg(short, long)]
        stress: u8,

        /// Emit the pattern as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Simulate a breathing session against a recording adapter
    Simulate {
        /// Age group (child, young-adult, older-adult)
        #[arg(short, long, default_value = "young-adult")]
        age_group: String,

        /// RMSSD reading in milliseconds
        #[arg(short, long, default_value = "25.0")]
        rmssd: f64,

        /// Stress level (1-5)
        #[arg(short, long, default_value = "5")]
        stress: u8,

        /// Number of full breath cycles to simulate
        #[arg(long, default_value = "3")]
        cycles: u32,

        /// Optional animation clip to read segment metadata from
        #[arg(long)]
        clip: Option<PathBuf>,
    },

    /// Manage session configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a default configuration file
    Init,
    /// Show the active configuration
    Show,
}

#[derive(Tabled)]
struct SurfaceRow {
    #[tabled(rename = "Stress")]
    stress: u8,
    #[tabled(rename = "HRV category")]
    category: String,
    #[tabled(rename = "Inhale (s)")]
    inhale: String,
    #[tabled(rename = "Exhale (s)")]
    exhale: String,
    #[tabled(rename = "Action")]
    action: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LogLevel::Warn,
        1 => LogLevel::Info,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };
    init_logging(&LogConfig {
        level,
        ..LogConfig::default()
    })?;

    let config = match &cli.config {
        Some(path) => SessionConfig::load(path)?,
        None => {
            let path = SessionConfig::default_path();
            if path.exists() {
                SessionConfig::load(&path)?
            } else {
                SessionConfig::default()
            }
        }
    };

    match cli.command {
        Commands::Table => print_decision_surface(&config),
        Commands::Classify { age_group, rmssd } => classify(&config, &age_group, rmssd),
        Commands::Recommend {
            age_group,
            rmssd,
            stress,
            json,
        } => recommend(&config, &age_group, rmssd, stress, json),
        Commands::Simulate {
            age_group,
            rmssd,
            stress,
            cycles,
            clip,
        } => simulate(&config, &age_group, rmssd, stress, cycles, clip),
        Commands::Config { action } => handle_config(&cli.config, &config, action),
    }
}

fn parse_age_group(s: &str) -> Result<AgeGroup> {
    AgeGroup::from_str(s).map_err(|e| anyhow!(e))
}

fn action_colored(action: ProtocolAction) -> ColoredString {
    // Mirror of the clinical display palette: activation in red/orange,
    // waiting in magenta, monitoring in blue, nothing to do in green.
    let text = action.to_string();
    match action {
        ProtocolAction::ActivateProtocol => text.as_str().red().bold(),
        ProtocolAction::ContinueProtocol => text.as_str().yellow().bold(),
        ProtocolAction::WaitReevaluate => text.as_str().magenta(),
        ProtocolAction::Monitor => text.as_str().blue(),
        ProtocolAction::NoAction => text.as_str().green(),
    }
}

fn print_decision_surface(config: &SessionConfig) -> Result<()> {
    let engine = config.build_engine();
    let mut rows = Vec::new();
    for stress in (STRESS_MIN..=STRESS_MAX).rev() {
        for category in [
            IndicatorCategory::Critical,
            IndicatorCategory::Tolerable,
            IndicatorCategory::Normal,
        ] {
            let pattern = engine.compute_pattern(category, stress)?;
            rows.push(SurfaceRow {
                stress,
                category: category.to_string(),
                inhale: format!("{:.1}", pattern.inhale_secs),
                exhale: format!("{:.1}", pattern.exhale_secs),
                action: pattern.action.to_string(),
            });
        }
    }
    println!("{}", "Clinical decision surface".bold());
    println!("{}", Table::new(rows));
    Ok(())
}

fn classify(config: &SessionConfig, age_group: &str, rmssd: f64) -> Result<()> {
    let group = parse_age_group(age_group)?;
    let table = config.build_threshold_table()?;
    let bounds = table.bounds_for(group)?;
    let category = table.classify(group, rmssd)?;
    println!(
        "{} {:.1} ms for {} (bands: <{} critical, <{} tolerable): {}",
        "RMSSD".bold(),
        rmssd,
        group,
        bounds.critical_bound,
        bounds.tolerable_bound,
        category.to_string().as_str().bold()
    );
    Ok(())
}

fn recommend(
    config: &SessionConfig,
    age_group: &str,
    rmssd: f64,
    stress: u8,
    json: bool,
) -> Result<()> {
    let group = parse_age_group(age_group)?;
    let mut session = config.build_session()?;
    let pattern = session
        .update(group, rmssd, stress)
        .map_err(|e| anyhow!("{}", e.user_message()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&pattern)?);
        return Ok(());
    }

    println!("{}", action_colored(pattern.action));
    println!("  {}", pattern.rationale);
    println!(
        "  Inhale {}s / Exhale {}s",
        format!("{:.1}", pattern.inhale_secs).as_str().bold(),
        format!("{:.1}", pattern.exhale_secs).as_str().bold()
    );
    Ok(())
}

fn simulate(
    config: &SessionConfig,
    age_group: &str,
    rmssd: f64,
    stress: u8,
    cycles: u32,
    clip: Option<PathBuf>,
) -> Result<()> {
    let group = parse_age_group(age_group)?;
    let clip_meta = match clip {
        Some(path) => load_clip_metadata(&path)?,
        None => builtin_clip()?,
    };

    let mut session = config.build_session()?;
    let adapter = Rc::new(RefCell::new(RecordingAdapter::new()));
    session.attach_clip(clip_meta);
    session.attach_adapter(Box::new(Rc::clone(&adapter)));

    let pattern = session
        .update(group, rmssd, stress)
        .map_err(|e| anyhow!("{}", e.user_message()))?;
    println!(
        "{} {}",
        "Pattern:".bold(),
        format!(
            "inhale {:.1}s / exhale {:.1}s ({})",
            pattern.inhale_secs, pattern.exhale_secs, pattern.action
        )
    );

    if !config.autostart {
        println!("(autostart disabled in config; starting explicitly for simulation)");
    }
    session.start();
    // Each cycle is one inhale and one exhale completion.
    for _ in 0..cycles * 2 {
        let state = session.controller().state();
        if let Some((segment, speed)) = adapter.borrow().last_play() {
            println!(
                "  {:<9} frames {}-{} at speed {:.3}",
                state.to_string(),
                segment.start_frame,
                segment.end_frame,
                speed
            );
        }
        session.on_phase_complete();
    }
    session.stop();
    println!(
        "{} {} commands issued",
        "Done:".bold(),
        adapter.borrow().commands.len()
    );
    Ok(())
}

fn handle_config(
    path_arg: &Option<PathBuf>,
    config: &SessionConfig,
    action: ConfigAction,
) -> Result<()> {
    let path = path_arg
        .clone()
        .unwrap_or_else(SessionConfig::default_path);
    match action {
        ConfigAction::Init => {
            SessionConfig::default().save(&path)?;
            println!("Wrote default configuration to {}", path.display());
        }
        ConfigAction::Show => {
            println!("{}", toml::to_string_pretty(config)?);
        }
    }
    Ok(())
}

/// Built-in two-segment clip used when no asset is supplied
fn builtin_clip() -> Result<ClipMetadata> {
    let mut segments = HashMap::new();
    segments.insert("inhale".to_string(), FrameRange::new(0, 180));
    segments.insert("exhale".to_string(), FrameRange::new(181, 360));
    Ok(ClipMetadata::new(Some(30.0), segments)?)
}

/// Read frame rate and breathing segments out of a Lottie-style clip JSON
///
/// Asset parsing is host-side; the core only receives the validated
/// metadata. Layers named "Breathe in"/"Breathe out" (or plain
/// "inhale"/"exhale") provide the segment in/out points.
fn load_clip_metadata(path: &std::path::Path) -> Result<ClipMetadata> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read clip: {}", path.display()))?;
    let data: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse clip JSON: {}", path.display()))?;

    let frame_rate = data.get("fr").and_then(|v| v.as_f64());
    let mut segments = HashMap::new();
    if let Some(layers) = data.get("layers").and_then(|v| v.as_array()) {
        for layer in layers {
            let name = layer.get("nm").and_then(|v| v.as_str()).unwrap_or("");
            let key = match name {
                "Breathe in" | "inhale" => "inhale",
                "Breathe out" | "exhale" => "exhale",
                _ => continue,
            };
            let ip = layer.get("ip").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
            let op = layer.get("op").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
            segments.insert(key.to_string(), FrameRange::new(ip, op));
        }
    }

    ClipMetadata::new(frame_rate, segments).map_err(|e| anyhow!("{}", e.user_message()))
}
