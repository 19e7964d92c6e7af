use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use ctrl_warner_rs::config::MAX_CTRLS_IN_AREA;
use ctrl_warner_rs::ctrl_store::load_dataset;
use ctrl_warner_rs::proximity::ProximityEvaluator;
use ctrl_warner_rs::types::PositionFix;

/// List the control points around a position, nearest first
#[derive(Parser, Debug)]
#[command(name = "ctrl_area")]
struct Args {
    /// Control point dataset (.json or .json.gz)
    #[arg(long)]
    dataset: PathBuf,

    #[arg(long, allow_hyphen_values = true)]
    lat: f64,

    #[arg(long, allow_hyphen_values = true)]
    lng: f64,

    /// Search radius in meters
    #[arg(long, default_value = "1500")]
    radius: u32,

    #[arg(long, default_value_t = MAX_CTRLS_IN_AREA)]
    limit: usize,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let tree = Arc::new(load_dataset(&args.dataset)?);
    let evaluator = ProximityEvaluator::new(tree, args.radius);
    let fix = PositionFix::new(args.lat, args.lng, 0.0, 0.0);
    if !fix.is_valid() {
        anyhow::bail!("invalid position ({}, {})", args.lat, args.lng);
    }

    let limit = args.limit.min(MAX_CTRLS_IN_AREA);
    let ranked = evaluator.ranked(&fix, args.radius, limit);
    if ranked.is_empty() {
        println!("No control points within {} m", args.radius);
        return Ok(());
    }

    for (ctrl, distance) in &ranked {
        let speed = ctrl.speed_label().unwrap_or_else(|| "-".to_string());
        println!("{:>6} m  {:<14} {}", distance, speed, ctrl.description);
    }
    println!("{} control points within {} m", ranked.len(), args.radius);
    Ok(())
}
