//! Feeds a stream of decoded QR text into a coordinator.
//!
//! The camera side is an external collaborator; all this loop sees is a
//! `Stream` of strings. After every verdict it arms the cool-down timer that
//! puts the session back into `Scanning`.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info};

use crate::services::checkin::coordinator::CheckInCoordinator;
use crate::services::checkin::session::ScanReport;

/// Runs until the decode stream ends or nobody listens for reports anymore.
pub async fn run_scan_loop<S>(
    coordinator: Arc<CheckInCoordinator>,
    mut decoded: S,
    reports: mpsc::Sender<ScanReport>,
) where
    S: Stream<Item = String> + Unpin,
{
    let mut pending_resume: Option<(u64, Instant)> = None;

    loop {
        let resume_at = pending_resume
            .map(|(_, at)| at)
            .unwrap_or_else(Instant::now);

        tokio::select! {
            _ = sleep_until(resume_at), if pending_resume.is_some() => {
                if let Some((sequence, _)) = pending_resume.take() {
                    if coordinator.resume_after_cooldown(sequence) {
                        debug!(event_id = %coordinator.event_id(), sequence, "cool-down over, scanning resumed");
                    }
                }
            }
            next = decoded.next() => {
                let Some(text) = next else {
                    info!(event_id = %coordinator.event_id(), "decode stream closed");
                    break;
                };
                let Some(report) = coordinator.submit(&text).await else {
                    continue;
                };
                pending_resume = Some((report.sequence, Instant::now() + coordinator.cooldown()));
                if reports.send(report).await.is_err() {
                    debug!(event_id = %coordinator.event_id(), "report receiver dropped");
                    break;
                }
            }
        }
    }
}
