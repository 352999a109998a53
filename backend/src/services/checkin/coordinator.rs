//! Turns decoded QR text into an admit decision for one scanning session.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::credentials::{CredentialPayload, TokenCodec, envelope};
use crate::database::models::{AdmitAttempt, CheckInStamp, Guest};
use crate::errors::{CredentialError, CredentialResult};
use crate::repositories::GuestStore;
use crate::services::checkin::session::{
    AdmitRecord, GuestSummary, ScanOutcome, ScanPhase, ScanReport, ScanSession, ScanStep,
    TrailEntry,
};
use crate::utils::clock::Clock;

/// Who is scanning, and for which event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionBinding {
    pub event_id: String,
    pub staff_id: String,
}

#[derive(Debug, Clone, Copy)]
pub struct ScanSettings {
    /// How long a result stays on screen before scanning resumes.
    pub cooldown: Duration,
    /// Number of admissions kept in the session history.
    pub history_limit: usize,
    /// Sessions untouched for this long are closed by the registry sweep.
    pub idle_timeout: Duration,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(3),
            history_limit: 20,
            idle_timeout: Duration::from_secs(60 * 60),
        }
    }
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionSnapshot {
    pub event_id: String,
    pub staff_id: String,
    #[serde(flatten)]
    pub phase: ScanPhase,
    pub scanning: bool,
    pub processing: bool,
    pub last_result: Option<ScanReport>,
    pub history: Vec<AdmitRecord>,
}

enum Admission {
    Admitted(Guest),
    AlreadyAdmitted(Guest),
}

/// Per-session state machine driving check-in.
///
/// Only one decode is processed at a time: text submitted while the session
/// is not `Scanning` is dropped. The session lock is never held across an
/// `.await`.
pub struct CheckInCoordinator {
    binding: SessionBinding,
    codec: Arc<TokenCodec>,
    guests: Arc<dyn GuestStore>,
    clock: Arc<dyn Clock>,
    settings: ScanSettings,
    session: Mutex<ScanSession>,
}

impl CheckInCoordinator {
    pub fn new(
        binding: SessionBinding,
        codec: Arc<TokenCodec>,
        guests: Arc<dyn GuestStore>,
        clock: Arc<dyn Clock>,
        settings: ScanSettings,
    ) -> Self {
        Self {
            binding,
            codec,
            guests,
            clock,
            session: Mutex::new(ScanSession::new(settings.history_limit)),
            settings,
        }
    }

    pub fn event_id(&self) -> &str {
        &self.binding.event_id
    }

    pub fn staff_id(&self) -> &str {
        &self.binding.staff_id
    }

    pub fn cooldown(&self) -> Duration {
        self.settings.cooldown
    }

    pub fn phase(&self) -> ScanPhase {
        self.session().phase()
    }

    pub fn start(&self) -> ScanPhase {
        let phase = self.session().start();
        info!(event_id = %self.binding.event_id, staff_id = %self.binding.staff_id, ?phase, "scanner started");
        phase
    }

    pub fn stop(&self) -> ScanPhase {
        let phase = self.session().stop();
        info!(event_id = %self.binding.event_id, ?phase, "scanner stopped");
        phase
    }

    pub fn stop_epoch(&self) -> u64 {
        self.session().stop_epoch()
    }

    pub fn restart(&self) -> ScanPhase {
        self.session().restart()
    }

    pub fn scan_next(&self) -> ScanPhase {
        self.session().scan_next()
    }

    /// Applies a due cool-down using the injected clock.
    pub fn poll(&self) -> ScanPhase {
        let cooldown = i64::try_from(self.settings.cooldown.as_millis()).unwrap_or(i64::MAX);
        let now = self.clock.now_millis();
        self.session().poll(now, cooldown)
    }

    /// Ends the cool-down of result `sequence`, if it is still showing.
    pub fn resume_after_cooldown(&self, sequence: u64) -> bool {
        self.session().resume(sequence)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let session = self.session();
        SessionSnapshot {
            event_id: self.binding.event_id.clone(),
            staff_id: self.binding.staff_id.clone(),
            phase: session.phase(),
            scanning: session.is_scanning(),
            processing: session.is_processing(),
            last_result: session.last_result().cloned(),
            history: session.history(),
        }
    }

    /// Processes one decoded QR string.
    ///
    /// Returns `None` when the session is not accepting scans (stopped, idle,
    /// showing a result, or already processing another decode).
    pub async fn submit(&self, decoded: &str) -> Option<ScanReport> {
        let Some(sequence) = self.session().begin_processing() else {
            debug!(event_id = %self.binding.event_id, "decode ignored, session is not scanning");
            return None;
        };
        let claim = ProcessingClaim {
            coordinator: self,
            settled: false,
        };

        let scanned_at = self.clock.now_millis();
        let mut trail = Vec::new();
        let verdict = self.process(decoded, scanned_at, &mut trail).await;
        let report = build_report(sequence, scanned_at, verdict, trail);

        match report.outcome {
            ScanOutcome::Admitted => info!(
                event_id = %self.binding.event_id,
                guest_id = ?report.guest.as_ref().map(|g| &g.id),
                staff_id = %self.binding.staff_id,
                "guest admitted"
            ),
            ScanOutcome::AlreadyAdmitted => info!(
                event_id = %self.binding.event_id,
                guest_id = ?report.guest.as_ref().map(|g| &g.id),
                "guest already admitted"
            ),
            ScanOutcome::Rejected => warn!(
                event_id = %self.binding.event_id,
                kind = report.error_kind.unwrap_or("unknown"),
                reason = report.reason.as_deref().unwrap_or(""),
                "scan rejected"
            ),
        }

        claim.finish(report.clone(), self.clock.now_millis());
        Some(report)
    }

    async fn process(
        &self,
        decoded: &str,
        now_millis: i64,
        trail: &mut Vec<TrailEntry>,
    ) -> CredentialResult<Admission> {
        let unpacked = record(trail, ScanStep::Unpack, envelope::unpack(decoded), |_| {
            "envelope accepted".to_string()
        })?;

        let payload = record(
            trail,
            ScanStep::Verify,
            self.codec.verify(&unpacked.token, now_millis),
            |payload: &CredentialPayload| {
                format!("token valid until {}", payload.expires_at_millis)
            },
        )?;

        let hints_agree = unpacked.event_id.as_deref().is_none_or(|id| id == payload.event_id)
            && unpacked.guest_id.as_deref().is_none_or(|id| id == payload.guest_id);
        if !hints_agree {
            debug!(
                hinted_event = ?unpacked.event_id,
                hinted_guest = ?unpacked.guest_id,
                "envelope hints disagree with the verified token"
            );
        }

        let event_check = if payload.event_id == self.binding.event_id {
            Ok(())
        } else {
            Err(CredentialError::EventMismatch {
                expected: self.binding.event_id.clone(),
                found: payload.event_id.clone(),
            })
        };
        record(trail, ScanStep::EventMatch, event_check, |_| {
            format!("token issued for event {}", payload.event_id)
        })?;

        let lookup = match self
            .guests
            .get_guest(&self.binding.event_id, &payload.guest_id)
            .await
        {
            Ok(Some(guest)) => Ok(guest),
            Ok(None) => Err(CredentialError::GuestNotFound {
                event_id: self.binding.event_id.clone(),
                guest_id: payload.guest_id.clone(),
            }),
            Err(e) => {
                error!(event_id = %self.binding.event_id, "guest lookup failed: {:#}", e);
                Err(CredentialError::Store(e))
            }
        };
        let guest = record(trail, ScanStep::GuestLookup, lookup, |guest: &Guest| {
            format!("found guest {}", guest.id)
        })?;

        if guest.checked_in {
            trail.push(TrailEntry {
                step: ScanStep::Admit,
                passed: false,
                detail: "guest is already checked in".to_string(),
            });
            return Ok(Admission::AlreadyAdmitted(guest));
        }

        let Some(check_in_time) = DateTime::<Utc>::from_timestamp_millis(now_millis) else {
            let error =
                CredentialError::Store(anyhow::anyhow!("clock reading {now_millis} is out of range"));
            return record(trail, ScanStep::Admit, Err(error), |_| String::new());
        };

        let stamp = CheckInStamp {
            check_in_time,
            checked_in_by: self.binding.staff_id.clone(),
            qr_token_used: unpacked.token.clone(),
        };

        let admitted = match self
            .guests
            .mark_checked_in(&self.binding.event_id, &guest.id, stamp)
            .await
        {
            Ok(AdmitAttempt::Admitted(guest)) => Ok(guest),
            Ok(AdmitAttempt::AlreadyCheckedIn(guest)) => {
                warn!(
                    event_id = %self.binding.event_id,
                    guest_id = %guest.id,
                    "guest was admitted by another scanner first"
                );
                trail.push(TrailEntry {
                    step: ScanStep::Admit,
                    passed: false,
                    detail: "guest was checked in by another scanner".to_string(),
                });
                return Ok(Admission::AlreadyAdmitted(guest));
            }
            Ok(AdmitAttempt::NotFound) => Err(CredentialError::GuestNotFound {
                event_id: self.binding.event_id.clone(),
                guest_id: guest.id.clone(),
            }),
            Err(e) => {
                error!(event_id = %self.binding.event_id, "check-in write failed: {:#}", e);
                Err(CredentialError::Store(e))
            }
        };

        let guest = record(trail, ScanStep::Admit, admitted, |_| "guest checked in".to_string())?;
        Ok(Admission::Admitted(guest))
    }

    fn session(&self) -> MutexGuard<'_, ScanSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Holds the session's processing claim; releases it even if the scan
/// future is dropped before it produced a verdict.
struct ProcessingClaim<'a> {
    coordinator: &'a CheckInCoordinator,
    settled: bool,
}

impl ProcessingClaim<'_> {
    fn finish(mut self, report: ScanReport, now_millis: i64) {
        self.coordinator.session().finish(report, now_millis);
        self.settled = true;
    }
}

impl Drop for ProcessingClaim<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.coordinator.session().abandon();
        }
    }
}

/// Appends a trail entry for `step` and passes the result through.
fn record<T>(
    trail: &mut Vec<TrailEntry>,
    step: ScanStep,
    result: CredentialResult<T>,
    describe: impl FnOnce(&T) -> String,
) -> CredentialResult<T> {
    let (passed, detail) = match &result {
        Ok(value) => (true, describe(value)),
        Err(e) => (false, e.to_string()),
    };
    trail.push(TrailEntry {
        step,
        passed,
        detail,
    });
    result
}

fn summarize(guest: &Guest) -> GuestSummary {
    GuestSummary {
        id: guest.id.clone(),
        name: guest.name.clone(),
        check_in_time: guest.check_in_time,
        checked_in_by: guest.checked_in_by.clone(),
    }
}

fn build_report(
    sequence: u64,
    scanned_at_millis: i64,
    verdict: CredentialResult<Admission>,
    trail: Vec<TrailEntry>,
) -> ScanReport {
    let (outcome, reason, error_kind, guest) = match verdict {
        Ok(Admission::Admitted(guest)) => (ScanOutcome::Admitted, None, None, Some(summarize(&guest))),
        Ok(Admission::AlreadyAdmitted(guest)) => (
            ScanOutcome::AlreadyAdmitted,
            Some("guest is already checked in".to_string()),
            None,
            Some(summarize(&guest)),
        ),
        Err(e) => (ScanOutcome::Rejected, Some(e.to_string()), Some(e.kind()), None),
    };

    ScanReport {
        sequence,
        outcome,
        reason,
        error_kind,
        guest,
        scanned_at_millis,
        trail,
    }
}
