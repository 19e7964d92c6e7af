use crate::error::{Result, WarnError};
use crate::types::{ControlPoint, PositionFix};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;
use tokio::time::{interval, Duration};

/// Meters per degree of latitude on the mean-radius sphere
const METERS_PER_DEG_LAT: f64 = 111_195.0;

/// Load a recorded drive: JSON array of fixes, optionally gzip-compressed
pub fn load_fixes(path: &Path) -> Result<Vec<PositionFix>> {
    let file = File::open(path).map_err(|e| {
        WarnError::Storage(format!("Failed to open {}: {}", path.display(), e))
    })?;

    let fixes = if path.extension().map(|e| e == "gz").unwrap_or(false) {
        read_fixes(GzDecoder::new(file))?
    } else {
        read_fixes(file)?
    };

    log::info!("Loaded {} fixes from {}", fixes.len(), path.display());
    Ok(fixes)
}

fn read_fixes<R: Read>(reader: R) -> Result<Vec<PositionFix>> {
    serde_json::from_reader(BufReader::new(reader))
        .map_err(|e| WarnError::Storage(format!("Failed to parse fixes: {}", e)))
}

/// Push recorded fixes at the nominal GPS rate, then return.
///
/// Drops a fix when the channel is full and stops early once the receiver
/// is gone. Returns the number of fixes delivered.
pub async fn replay_loop(tx: Sender<PositionFix>, fixes: Vec<PositionFix>, period: Duration) -> u64 {
    let mut ticker = interval(period);
    let mut sent = 0u64;
    let total = fixes.len();

    for fix in fixes {
        ticker.tick().await;

        match tx.try_send(fix) {
            Ok(_) => {
                sent += 1;
                if sent % 50 == 0 {
                    log::debug!("[replay] {}/{} fixes", sent, total);
                }
            }
            Err(TrySendError::Closed(_)) => {
                log::info!("[replay] Channel closed after {} fixes", sent);
                break;
            }
            Err(TrySendError::Full(_)) => {
                log::debug!("[replay] Channel full, dropping fix");
            }
        }
    }

    log::info!("[replay] Finished, {} of {} fixes delivered", sent, total);
    sent
}

/// Fixes for a car driving due north straight over `target`.
///
/// Starts `start_distance_m` south of the point, advances `speed_mps` per
/// `period` and ends `pass_by_m` north of it.
pub fn simulated_approach(
    target: &ControlPoint,
    start_distance_m: f64,
    speed_mps: f64,
    period: Duration,
    pass_by_m: f64,
) -> Vec<PositionFix> {
    let step_m = speed_mps * period.as_secs_f64();
    if !(step_m > 0.0) || !start_distance_m.is_finite() || !pass_by_m.is_finite() {
        return Vec::new();
    }

    let mut fixes = Vec::new();
    let mut offset_m = -start_distance_m;
    let mut t = 0.0;
    while offset_m <= pass_by_m {
        fixes.push(PositionFix {
            latitude: target.latitude + offset_m / METERS_PER_DEG_LAT,
            longitude: target.longitude,
            speed_mps,
            accuracy_m: 5.0,
            timestamp: t,
        });
        offset_m += step_m;
        t += period.as_secs_f64();
    }
    fixes
}

/// Drive the simulated approach through the channel
pub async fn approach_loop(
    tx: Sender<PositionFix>,
    target: ControlPoint,
    start_distance_m: f64,
    speed_mps: f64,
    period: Duration,
) -> u64 {
    log::info!(
        "[sim] Approaching control point {} '{}' from {} m at {:.1} m/s",
        target.id,
        target.description,
        start_distance_m,
        speed_mps
    );
    let fixes = simulated_approach(&target, start_distance_m, speed_mps, period, start_distance_m);
    replay_loop(tx, fixes, period).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proximity::distance_meters;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tokio::sync::mpsc;

    fn target() -> ControlPoint {
        ControlPoint::new(1, 48.0, 11.0, 80, "B13")
    }

    #[test]
    fn test_simulated_approach_passes_target() {
        let fixes = simulated_approach(&target(), 600.0, 20.0, Duration::from_secs(1), 200.0);
        // -600..=200 in 20 m steps
        assert_eq!(fixes.len(), 41);

        let first = &fixes[0];
        let d = distance_meters(first.latitude, first.longitude, 48.0, 11.0);
        assert!((599..=601).contains(&d), "got {}", d);
        assert!(first.latitude < 48.0);

        let last = fixes.last().unwrap();
        assert!(last.latitude > 48.0);
        assert!(fixes.windows(2).all(|w| w[1].latitude > w[0].latitude));
        assert!(fixes.windows(2).all(|w| w[1].timestamp > w[0].timestamp));
        assert!(fixes.iter().all(|f| f.is_valid()));
    }

    #[test]
    fn test_simulated_approach_rejects_standstill() {
        assert!(simulated_approach(&target(), 600.0, 0.0, Duration::from_secs(1), 0.0).is_empty());
    }

    #[test]
    fn test_load_fixes_plain_and_gz() {
        let json = r#"[
            {"latitude": 48.0, "longitude": 11.0, "speed": 13.5, "accuracy": 4.0, "timestamp": 1.0},
            {"latitude": 48.001, "longitude": 11.0}
        ]"#;
        let dir = std::env::temp_dir();
        let plain = dir.join(format!("ctrl_warner_{}_fixes.json", std::process::id()));
        let gz = dir.join(format!("ctrl_warner_{}_fixes.json.gz", std::process::id()));

        std::fs::write(&plain, json).unwrap();
        let mut encoder = GzEncoder::new(File::create(&gz).unwrap(), Compression::default());
        encoder.write_all(json.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let a = load_fixes(&plain).unwrap();
        let b = load_fixes(&gz).unwrap();
        let _ = std::fs::remove_file(&plain);
        let _ = std::fs::remove_file(&gz);

        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
        assert_eq!(a[0].speed_mps, 13.5);
        assert_eq!(a[1].speed_mps, 0.0);
        assert!(load_fixes(Path::new("/nonexistent/fixes.json")).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_delivers_in_order() {
        let (tx, mut rx) = mpsc::channel(16);
        let fixes: Vec<PositionFix> = (0..5)
            .map(|i| PositionFix::new(48.0 + i as f64 * 0.001, 11.0, 10.0, i as f64))
            .collect();

        let sent = replay_loop(tx, fixes.clone(), Duration::from_millis(800)).await;
        assert_eq!(sent, 5);

        let mut received = Vec::new();
        while let Some(fix) = rx.recv().await {
            received.push(fix);
        }
        assert_eq!(received, fixes);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_stops_on_closed_channel() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let fixes = vec![PositionFix::new(48.0, 11.0, 10.0, 0.0); 3];
        assert_eq!(replay_loop(tx, fixes, Duration::from_millis(800)).await, 0);
    }
}
