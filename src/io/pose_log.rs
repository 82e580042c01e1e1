//! Recorded pose feed: CSV loading and paced replay.
//!
//! Format (header row required, `#` starts a comment line):
//! ```text
//! timestamp_ns,agent,px,py,pz,qw,qx,qy,qz
//! ```
//! Poses are in the telemetry convention, exactly as a live feed would
//! deliver them.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use csv::ReaderBuilder;
use nalgebra::{Quaternion, Vector3};
use serde::Deserialize;
use tracing::{debug, info};

use crate::state::AgentId;
use crate::system::{PoseMsg, SharedState};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PoseRecord {
    pub timestamp_ns: u64,
    pub agent: usize,
    pub px: f64,
    pub py: f64,
    pub pz: f64,
    pub qw: f64,
    pub qx: f64,
    pub qy: f64,
    pub qz: f64,
}

impl PoseRecord {
    pub fn to_msg(&self) -> PoseMsg {
        PoseMsg::new(
            AgentId(self.agent),
            Vector3::new(self.px, self.py, self.pz),
            Quaternion::new(self.qw, self.qx, self.qy, self.qz),
        )
    }
}

/// Load a pose log, sorted by timestamp (stable for equal stamps).
pub fn load_pose_log<P: AsRef<Path>>(path: P) -> Result<Vec<PoseRecord>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    read_pose_log(file).with_context(|| format!("Failed to read {}", path.display()))
}

pub fn read_pose_log<R: Read>(reader: R) -> Result<Vec<PoseRecord>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    for (row, rec) in rdr.deserialize::<PoseRecord>().enumerate() {
        records.push(rec.with_context(|| format!("Bad pose record at row {}", row + 1))?);
    }
    records.sort_by_key(|r| r.timestamp_ns);
    Ok(records)
}

/// Send `records` at their recorded pacing, relative to the first one.
///
/// Returns the number of messages delivered. Stops early when the receiver
/// is gone or shutdown is requested.
pub fn replay(records: &[PoseRecord], tx: &Sender<PoseMsg>, shared: &SharedState) -> usize {
    let Some(first) = records.first() else {
        return 0;
    };
    let t0 = first.timestamp_ns;
    let start = Instant::now();

    let mut sent = 0;
    for record in records {
        let due = start + Duration::from_nanos(record.timestamp_ns.saturating_sub(t0));
        let now = Instant::now();
        if due > now {
            std::thread::sleep(due - now);
        }
        if shared.is_shutdown_requested() {
            debug!("Pose replay interrupted by shutdown");
            break;
        }
        if tx.send(record.to_msg()).is_err() {
            debug!("Pose receiver dropped, stopping replay");
            break;
        }
        sent += 1;
    }
    sent
}

/// Run [`replay`] on its own thread. The sender is dropped when the replay
/// ends, which is how the dispatcher learns the feed is over.
pub fn spawn_replay(
    records: Vec<PoseRecord>,
    tx: Sender<PoseMsg>,
    shared: Arc<SharedState>,
) -> Result<JoinHandle<usize>> {
    std::thread::Builder::new()
        .name("pose-replay".to_string())
        .spawn(move || {
            let sent = replay(&records, &tx, &shared);
            info!("Pose replay finished: {}/{} poses sent", sent, records.len());
            sent
        })
        .context("Failed to spawn pose replay thread")
}
