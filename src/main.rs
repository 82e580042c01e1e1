use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use crossbeam_channel::bounded;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use swarm_vision::bridge::OfflineBridge;
use swarm_vision::io::{SessionConfig, SinkKind, load_pose_log, spawn_replay};
use swarm_vision::publish::{OutputSink, TraceSink};
use swarm_vision::system::{Dispatcher, DispatcherOptions, PoseMsg, Session, SharedState};
use swarm_vision::viz::RerunSink;

const APP_NAME: &str = "swarm-vision";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Usage: swarm-vision [config.yaml] [poses.csv]
    let args: Vec<String> = std::env::args().collect();
    let config_path = args.get(1).map(Path::new);
    let pose_log_path = args.get(2).map(Path::new);

    let config = SessionConfig::load_or_default(config_path);

    let sink: Box<dyn OutputSink> = match config.output.sink {
        SinkKind::Trace => Box::new(TraceSink::new()),
        SinkKind::RerunSpawn => Box::new(RerunSink::spawn(APP_NAME)?),
        SinkKind::RerunSave => Box::new(RerunSink::save(APP_NAME, &config.output.rrd_path)?),
    };

    let session = Session::new(&config, Some(Box::new(OfflineBridge::new())), sink);

    let shared = SharedState::new();
    let (pose_tx, pose_rx) = bounded::<PoseMsg>(config.session.pose_queue);

    let replay = match pose_log_path {
        Some(path) => {
            let records = load_pose_log(path)?;
            info!("Replaying {} poses from {}", records.len(), path.display());
            Some(spawn_replay(records, pose_tx, Arc::clone(&shared))?)
        }
        None => {
            warn!("No pose log given, agents will stay unresolved");
            drop(pose_tx);
            None
        }
    };

    let options = DispatcherOptions::from_config(&config);
    let _session = Dispatcher::new(session, pose_rx, Arc::clone(&shared), options).run();

    // Stop the replay thread if the run ended first.
    shared.request_shutdown();
    if let Some(handle) = replay {
        if handle.join().is_err() {
            warn!("Pose replay thread panicked");
        }
    }

    let stats = shared.stats();
    info!(
        "Done: {} poses ingested ({} rejected), {} render ticks ({} skipped), {} publish ticks ({} skipped)",
        stats.poses_ingested,
        stats.poses_rejected,
        stats.render_ticks,
        stats.render_skipped,
        stats.publish_ticks,
        stats.publish_skipped
    );
    Ok(())
}
