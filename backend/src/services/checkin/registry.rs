//! Live scanning sessions, one per staff device.
//!
//! Every session gets its own coordinator plus a background scan loop fed
//! through a bounded channel, for camera bridges that push raw decodes.
//! Sessions for the same event are independent of each other; the guest
//! store's conditional update is what keeps them from double-admitting.
//!
//! Fed decodes carry the session's stop epoch from when they were queued, so
//! a `stop` discards whatever is still waiting in the channel. Sessions
//! nobody has touched for `idle_timeout` are closed by [`ScanSessionRegistry::expire_idle`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};
use uuid::Uuid;

use crate::credentials::TokenCodec;
use crate::errors::{ServiceError, ServiceResult};
use crate::repositories::{EventStore, GuestStore};
use crate::services::checkin::coordinator::{CheckInCoordinator, ScanSettings, SessionBinding};
use crate::services::checkin::driver::run_scan_loop;
use crate::utils::clock::Clock;

/// Decodes buffered per session before new ones are dropped.
const FEED_CAPACITY: usize = 16;

/// A queued decode and the stop epoch it was captured under.
type FedDecode = (u64, String);

#[derive(Clone)]
struct ActiveSession {
    coordinator: Arc<CheckInCoordinator>,
    feed: mpsc::Sender<FedDecode>,
    last_active_millis: Arc<AtomicI64>,
}

/// Outcome of pushing text into a session's feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    Queued,
    /// The feed is full; the decode was discarded.
    Dropped,
}

pub struct ScanSessionRegistry {
    codec: Arc<TokenCodec>,
    guests: Arc<dyn GuestStore>,
    events: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
    settings: ScanSettings,
    sessions: RwLock<HashMap<String, ActiveSession>>,
}

impl ScanSessionRegistry {
    pub fn new(
        codec: Arc<TokenCodec>,
        guests: Arc<dyn GuestStore>,
        events: Arc<dyn EventStore>,
        clock: Arc<dyn Clock>,
        settings: ScanSettings,
    ) -> Self {
        Self {
            codec,
            guests,
            events,
            clock,
            settings,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Opens a scanning session bound to `event_id` for `staff_id` and starts it.
    ///
    /// # Errors
    /// - `Validation` when the event id is blank
    /// - `NotFound` when the event does not exist
    pub async fn open(
        &self,
        event_id: &str,
        staff_id: &str,
    ) -> ServiceResult<(String, Arc<CheckInCoordinator>)> {
        let event_id = event_id.trim();
        if event_id.is_empty() {
            return Err(ServiceError::validation("Event ID is required"));
        }

        let event = self
            .events
            .get_event(event_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Event", event_id))?;

        let coordinator = Arc::new(CheckInCoordinator::new(
            SessionBinding {
                event_id: event.id.clone(),
                staff_id: staff_id.to_string(),
            },
            self.codec.clone(),
            self.guests.clone(),
            self.clock.clone(),
            self.settings,
        ));
        coordinator.start();

        let (feed, feed_rx) = mpsc::channel::<FedDecode>(FEED_CAPACITY);
        let (report_tx, mut report_rx) = mpsc::channel(FEED_CAPACITY);
        let current = coordinator.clone();
        let decoded = ReceiverStream::new(feed_rx).filter_map(move |(epoch, text)| {
            if epoch == current.stop_epoch() {
                Some(text)
            } else {
                debug!(event_id = %current.event_id(), "discarding decode queued before stop");
                None
            }
        });
        tokio::spawn(run_scan_loop(coordinator.clone(), decoded, report_tx));
        tokio::spawn(async move {
            while let Some(report) = report_rx.recv().await {
                debug!(sequence = report.sequence, outcome = ?report.outcome, "fed scan finished");
            }
        });

        let session_id = Uuid::now_v7().to_string();
        self.write().insert(
            session_id.clone(),
            ActiveSession {
                coordinator: coordinator.clone(),
                feed,
                last_active_millis: Arc::new(AtomicI64::new(self.clock.now_millis())),
            },
        );
        info!(
            session_id = %session_id,
            event_id = %event.id,
            staff_id,
            active = self.active_sessions(),
            "scan session opened"
        );

        Ok((session_id, coordinator))
    }

    pub fn get(&self, session_id: &str) -> ServiceResult<Arc<CheckInCoordinator>> {
        self.touch(session_id).map(|session| session.coordinator)
    }

    /// Queues raw decoded text for the session's scan loop.
    pub fn feed(&self, session_id: &str, text: String) -> ServiceResult<FeedStatus> {
        let session = self.touch(session_id)?;
        let epoch = session.coordinator.stop_epoch();

        match session.feed.try_send((epoch, text)) {
            Ok(()) => Ok(FeedStatus::Queued),
            Err(mpsc::error::TrySendError::Full(_)) => Ok(FeedStatus::Dropped),
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(ServiceError::internal_error("Scan loop is no longer running"))
            }
        }
    }

    /// Stops and forgets a session. Its scan loop ends once the feed closes.
    pub fn close(&self, session_id: &str) -> ServiceResult<()> {
        let session = self
            .write()
            .remove(session_id)
            .ok_or_else(|| ServiceError::not_found("Scan session", session_id))?;
        session.coordinator.stop();
        info!(session_id, event_id = %session.coordinator.event_id(), "scan session closed");
        Ok(())
    }

    /// Closes every session idle for longer than the configured timeout.
    /// Returns how many were closed.
    pub fn expire_idle(&self) -> usize {
        let idle_millis = i64::try_from(self.settings.idle_timeout.as_millis()).unwrap_or(i64::MAX);
        let now = self.clock.now_millis();

        let expired: Vec<(String, ActiveSession)> = {
            let mut sessions = self.write();
            let stale: Vec<String> = sessions
                .iter()
                .filter(|(_, session)| {
                    now.saturating_sub(session.last_active_millis.load(Ordering::SeqCst))
                        > idle_millis
                })
                .map(|(id, _)| id.clone())
                .collect();
            stale
                .into_iter()
                .filter_map(|id| sessions.remove(&id).map(|session| (id, session)))
                .collect()
        };

        for (session_id, session) in &expired {
            session.coordinator.stop();
            info!(
                session_id = %session_id,
                event_id = %session.coordinator.event_id(),
                "idle scan session expired"
            );
        }
        expired.len()
    }

    pub fn active_sessions(&self) -> usize {
        self.read().len()
    }

    fn touch(&self, session_id: &str) -> ServiceResult<ActiveSession> {
        let session = self
            .read()
            .get(session_id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found("Scan session", session_id))?;
        session
            .last_active_millis
            .store(self.clock.now_millis(), Ordering::SeqCst);
        Ok(session)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, ActiveSession>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, ActiveSession>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }
}
