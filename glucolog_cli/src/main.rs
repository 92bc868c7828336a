use clap::{Parser, Subcommand};
use glucolog_core::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// How far back to read diary history for safety calculations. Comfortably
/// covers the ultra-long action window (42 h).
const HISTORY_WINDOW_DAYS: i64 = 7;

#[derive(Parser)]
#[command(name = "glucolog")]
#[command(about = "Personal diabetes diary with dose safety checks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Override config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Record a diary entry (glucose, insulin, carbs)
    Log {
        /// Blood glucose in mg/dL
        #[arg(long)]
        glucose: Option<f64>,

        /// Reading context (fasting, pre-meal, post-meal, bedtime, random)
        #[arg(long)]
        context: Option<String>,

        /// Insulin dose as NAME=UNITS (repeatable)
        #[arg(long = "insulin", value_name = "NAME=UNITS")]
        insulin: Vec<String>,

        /// Carbohydrates in grams
        #[arg(long)]
        carbs: Option<f64>,

        /// Free-text note
        #[arg(long)]
        note: Option<String>,

        /// Proceed despite warning-level safety findings
        #[arg(long)]
        acknowledge_warnings: bool,
    },

    /// Evaluate a proposed dose without logging anything
    Check {
        /// Proposed insulin dose in units
        #[arg(long)]
        dose: f64,

        /// Glucose to evaluate against (defaults to the latest logged reading)
        #[arg(long)]
        glucose: Option<f64>,
    },

    /// Show current IOB, COB and interval state (default)
    Status,

    /// Roll up WAL entries to CSV
    Rollup {
        /// Clean up processed WAL files after rollup
        #[arg(long)]
        cleanup: bool,
    },
}

struct LogOptions {
    glucose: Option<f64>,
    context: Option<String>,
    insulin: Vec<String>,
    carbs: Option<f64>,
    note: Option<String>,
    acknowledge_warnings: bool,
}

fn main() -> Result<()> {
    // Initialize logging
    glucolog_core::logging::init();

    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(Config::default_config_path);

    match cli.command.unwrap_or(Commands::Status) {
        Commands::Init { force } => cmd_init(&config_path, force),

        Commands::Log {
            glucose,
            context,
            insulin,
            carbs,
            note,
            acknowledge_warnings,
        } => {
            let (config, data_dir) = load_config(&config_path, cli.data_dir)?;
            cmd_log(
                &data_dir,
                &config,
                LogOptions {
                    glucose,
                    context,
                    insulin,
                    carbs,
                    note,
                    acknowledge_warnings,
                },
            )
        }

        Commands::Check { dose, glucose } => {
            let (config, data_dir) = load_config(&config_path, cli.data_dir)?;
            cmd_check(&data_dir, &config, dose, glucose)
        }

        Commands::Status => {
            let (config, data_dir) = load_config(&config_path, cli.data_dir)?;
            cmd_status(&data_dir, &config)
        }

        Commands::Rollup { cleanup } => {
            let (config, data_dir) = load_config(&config_path, cli.data_dir)?;
            cmd_rollup(&data_dir, &config, cleanup)
        }
    }
}

/// Load config and resolve the data directory, with the CLI override winning
fn load_config(config_path: &Path, data_dir_override: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let config = Config::load_from(config_path)?;
    let data_dir = data_dir_override.unwrap_or_else(|| config.data.data_dir.clone());
    Ok((config, data_dir))
}

fn wal_path(data_dir: &Path) -> PathBuf {
    data_dir.join("wal").join("diary.wal")
}

fn csv_path(data_dir: &Path) -> PathBuf {
    data_dir.join("diary.csv")
}

fn cmd_init(config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "config file already exists at {:?}; use --force to overwrite",
            config_path
        )));
    }

    let config = Config::default();
    config.save_to(config_path)?;

    println!("✓ Wrote default config to {}", config_path.display());
    println!("  Review the [safety] thresholds with your care team before relying on dose checks.");
    Ok(())
}

fn cmd_log(data_dir: &Path, config: &Config, opts: LogOptions) -> Result<()> {
    let wal_path = wal_path(data_dir);
    let csv_path = csv_path(data_dir);

    let doses = parse_insulin_args(&opts.insulin)?;

    if opts.glucose.is_none() && doses.is_empty() && opts.carbs.is_none() {
        return Err(Error::Other(
            "nothing to log; provide --glucose, --insulin or --carbs".into(),
        ));
    }

    let meal_context = match opts.context.as_deref() {
        Some(raw) => match MealContext::parse(raw) {
            Some(context) => Some(context),
            None => {
                eprintln!("Unknown context: {}. Recording without one.", raw);
                None
            }
        },
        None => None,
    };

    let now = chrono::Utc::now();

    // Any insulin in the entry goes through the safety gate first
    if !doses.is_empty() {
        let entries = load_recent_entries(&wal_path, &csv_path, HISTORY_WINDOW_DAYS)?;
        let total_units: f64 = doses.values().sum();

        let evaluation = evaluate_dose(
            &entries,
            total_units,
            opts.glucose,
            now.timestamp_millis(),
            &config.safety,
            &config.profiles,
        );

        display_evaluation(&evaluation);

        if evaluation.verdict.blocked() {
            return Err(Error::Other("dose blocked by safety check".into()));
        }
        if !evaluation.verdict.safe && !opts.acknowledge_warnings {
            return Err(Error::Other(
                "dose has safety warnings; re-run with --acknowledge-warnings to proceed".into(),
            ));
        }
    }

    let entry = DiaryEntry {
        id: uuid::Uuid::new_v4(),
        timestamp: Some(RawTimestamp::DateTime(now)),
        glucose_mg_dl: opts.glucose,
        meal_context,
        insulin_doses: doses,
        carbs_grams: opts.carbs,
        note: opts.note,
    };

    let mut sink = JsonlSink::new(&wal_path);
    sink.append(&entry)?;

    println!("\n✓ Entry logged!");
    Ok(())
}

fn cmd_check(data_dir: &Path, config: &Config, dose: f64, glucose: Option<f64>) -> Result<()> {
    let entries = load_recent_entries(&wal_path(data_dir), &csv_path(data_dir), HISTORY_WINDOW_DAYS)?;

    let evaluation = evaluate_dose(
        &entries,
        dose,
        glucose,
        chrono::Utc::now().timestamp_millis(),
        &config.safety,
        &config.profiles,
    );

    display_evaluation(&evaluation);

    let outcome = if evaluation.verdict.blocked() {
        "BLOCKED"
    } else if evaluation.verdict.safe {
        "PERMITTED"
    } else {
        "PERMITTED (with warnings)"
    };
    println!("\n  Verdict: {}", outcome);

    Ok(())
}

fn cmd_status(data_dir: &Path, config: &Config) -> Result<()> {
    let entries = load_recent_entries(&wal_path(data_dir), &csv_path(data_dir), HISTORY_WINDOW_DAYS)?;

    let insulin = insulin_records(&entries);
    let carbs = carb_records(&entries);
    let readings = glucose_readings(&entries);

    let now_millis = chrono::Utc::now().timestamp_millis();
    let iob = calculate_iob(&insulin, now_millis, &config.profiles);
    let cob = calculate_cob(&carbs, now_millis, config.safety.carb_absorption_minutes);
    let interval = can_dose_again(&insulin, now_millis, config.safety.minimum_interval_minutes);

    println!("\n╭─────────────────────────────────────────╮");
    println!("│  DIARY STATUS");
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  Active insulin: {:.2} u", iob);
    println!("  Carbs on board: {:.1} g", cob);

    match readings.iter().max_by_key(|r| r.timestamp_millis) {
        Some(reading) => {
            let risk = classify(reading.value_mg_dl);
            println!("  Last glucose: {:.0} mg/dL ({})", reading.value_mg_dl, risk.label());
            if risk != RiskCategory::Normal {
                println!("  {}", risk.suggested_action());
            }
        }
        None => println!("  Last glucose: none recorded"),
    }

    if interval.can_dose_now {
        println!("  Dosing interval: clear");
    } else {
        println!("  Dosing interval: wait {} more minutes", interval.wait_minutes);
    }

    println!();
    Ok(())
}

fn cmd_rollup(data_dir: &Path, _config: &Config, cleanup: bool) -> Result<()> {
    let wal_dir = data_dir.join("wal");
    let wal_path = wal_path(data_dir);
    let csv_path = csv_path(data_dir);

    if !wal_path.exists() {
        println!("No WAL file found - nothing to roll up.");
        return Ok(());
    }

    let count = glucolog_core::csv_rollup::wal_to_csv_and_archive(&wal_path, &csv_path)?;

    println!("✓ Rolled up {} entries to CSV", count);
    println!("  CSV: {}", csv_path.display());

    if cleanup {
        let cleaned = glucolog_core::csv_rollup::cleanup_processed_wals(&wal_dir)?;
        if cleaned > 0 {
            println!("✓ Cleaned up {} processed WAL files", cleaned);
        }
    }

    Ok(())
}

/// Parse repeated `--insulin NAME=UNITS` arguments into a dose map
fn parse_insulin_args(args: &[String]) -> Result<BTreeMap<String, f64>> {
    let mut doses = BTreeMap::new();

    for arg in args {
        let Some((name, units)) = arg.split_once('=') else {
            return Err(Error::Other(format!(
                "invalid insulin argument {:?}; expected NAME=UNITS",
                arg
            )));
        };

        let units: f64 = units
            .trim()
            .parse()
            .map_err(|_| Error::Other(format!("invalid unit amount in {:?}", arg)))?;

        if !units.is_finite() || units <= 0.0 {
            return Err(Error::Other(format!(
                "insulin units must be positive in {:?}",
                arg
            )));
        }

        doses.insert(name.trim().to_string(), units);
    }

    Ok(doses)
}

fn display_evaluation(evaluation: &DoseEvaluation) {
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  DOSE SAFETY CHECK");
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  Active insulin: {:.2} u", evaluation.iob);
    println!("  Carbs on board: {:.1} g", evaluation.cob);

    match (evaluation.glucose_mg_dl, evaluation.risk) {
        (Some(glucose), Some(risk)) => {
            println!("  Glucose: {:.0} mg/dL ({})", glucose, risk.label());
        }
        _ => println!("  Glucose: no reading available"),
    }

    for message in &evaluation.verdict.critical_warnings {
        println!("\n  ✗ CRITICAL: {}", message);
    }
    for message in &evaluation.verdict.warnings {
        println!("\n  ⚠ {}", message);
    }
    for message in &evaluation.verdict.info {
        println!("\n  ℹ {}", message);
    }

    if let Some(ref recommendation) = evaluation.verdict.recommendation {
        println!("\n  → {}", recommendation);
    }
}
