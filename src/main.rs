use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

use ctrl_warner_rs::alert::{spawn_dispatcher, AlertStateMachine, JsonLinesSink, LogSink};
use ctrl_warner_rs::config::AlertConfig;
use ctrl_warner_rs::ctrl_store::load_dataset;
use ctrl_warner_rs::driver::Driver;
use ctrl_warner_rs::location;
use ctrl_warner_rs::proximity::ProximityEvaluator;
use ctrl_warner_rs::types::PositionFix;

#[derive(Parser, Debug)]
#[command(name = "ctrl_warner")]
#[command(about = "Warns when approaching speed control points", long_about = None)]
struct Args {
    /// Control point dataset (.json or .json.gz)
    #[arg(long)]
    dataset: PathBuf,

    /// JSON config file, defaults apply for missing keys
    #[arg(long)]
    config: Option<PathBuf>,

    /// Recorded fixes to replay; without it a drive over a control point is simulated
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Control point to simulate the approach to (default: lowest id)
    #[arg(long)]
    target_id: Option<i64>,

    /// Simulated start distance in meters
    #[arg(long, default_value = "800")]
    start_distance: f64,

    /// Simulated speed in m/s
    #[arg(long, default_value = "20")]
    speed: f64,

    /// Duration in seconds (0 = until the source is exhausted)
    #[arg(long, default_value = "0")]
    duration: u64,

    /// Output directory for status files
    #[arg(long, default_value = "ctrl_warner_sessions")]
    output_dir: PathBuf,

    /// Print alert events as JSON lines on stdout
    #[arg(long)]
    json: bool,

    /// Disable the notification sound
    #[arg(long)]
    no_notification: bool,

    /// Disable voice cues
    #[arg(long)]
    no_tts: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match args.config.as_ref() {
        Some(path) => AlertConfig::load(path)?,
        None => AlertConfig::default(),
    };
    if args.no_notification {
        config.play_notification = false;
    }
    if args.no_tts {
        config.play_tts = false;
    }

    eprintln!("[{}] Control point warner starting", ts_now());
    eprintln!("  Dataset: {}", args.dataset.display());
    eprintln!("  Warn distance: {} m", config.warn_distance_m);
    eprintln!("  Notification: {}, voice: {}", config.play_notification, config.play_tts);
    eprintln!("  Output Dir: {}", args.output_dir.display());

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("creating {}", args.output_dir.display()))?;

    let tree = Arc::new(load_dataset(&args.dataset)?);
    if tree.is_empty() {
        bail!("no usable control points in {}", args.dataset.display());
    }

    let (event_tx, event_rx) = crossbeam::channel::unbounded();
    let dispatcher = if args.json {
        spawn_dispatcher(event_rx, JsonLinesSink::new(std::io::stdout()))
    } else {
        spawn_dispatcher(event_rx, LogSink)
    };

    let (fix_tx, fix_rx) = mpsc::channel::<PositionFix>(100);
    let period = config.gps_update_interval();
    let source = match args.replay.as_ref() {
        Some(path) => {
            let fixes = location::load_fixes(path)?;
            tokio::spawn(location::replay_loop(fix_tx, fixes, period))
        }
        None => {
            let target = match args.target_id {
                Some(id) => tree
                    .get(id)
                    .ok_or_else(|| anyhow!("control point {} not in dataset", id))?,
                None => tree
                    .iter()
                    .min_by_key(|ctrl| ctrl.id)
                    .cloned()
                    .ok_or_else(|| anyhow!("dataset is empty"))?,
            };
            tokio::spawn(location::approach_loop(
                fix_tx,
                (*target).clone(),
                args.start_distance,
                args.speed,
                period,
            ))
        }
    };

    let evaluator = ProximityEvaluator::new(tree.clone(), config.warn_distance_m);
    let tick = config.main_driver_interval();
    let driver = Driver::new(evaluator, AlertStateMachine::new(config), event_tx, tick)
        .with_status_file(args.output_dir.join("live_status.json"));

    let run = driver.run(fix_rx);
    tokio::pin!(run);
    let deadline = async {
        if args.duration > 0 {
            sleep(Duration::from_secs(args.duration)).await
        } else {
            std::future::pending::<()>().await
        }
    };

    let finished = tokio::select! {
        status = &mut run => Some(status),
        _ = deadline => None,
    };
    let status = match finished {
        Some(status) => status,
        None => {
            eprintln!("[{}] Duration reached, stopping...", ts_now());
            // Dropping the source's sender ends the driver loop
            source.abort();
            run.await
        }
    };

    let stats = tokio::task::spawn_blocking(move || dispatcher.join())
        .await?
        .map_err(|_| anyhow!("alert dispatcher panicked"))?;

    let status_path = args.output_dir.join("live_status_final.json");
    status
        .save(&status_path)
        .with_context(|| format!("writing {}", status_path.display()))?;

    eprintln!("\n=== Final Stats ===");
    eprintln!("Fixes: {} ({} invalid)", status.fixes_received, status.invalid_fixes);
    eprintln!("In range: {}", status.results_in_range);
    eprintln!("Voice cues: {}, notifications: {}", status.voice_cues, status.notifications);
    eprintln!(
        "Resets: {} moved away, {} timeout",
        status.moved_away_resets, status.timeout_resets
    );
    eprintln!("Events delivered: {}, failed: {}", stats.delivered, stats.failed);
    eprintln!("Status: {}", status_path.display());

    Ok(())
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}
