//! Scanning-session state and its transitions.
//!
//! ```text
//! Idle --start--> Scanning --submit--> Processing --> Result(..) --cool-down / next--> Scanning
//!   ^                |                                    |
//!   +------stop------+                                    +--stop--> Stopped --restart--> Scanning
//! ```
//!
//! A stop that arrives while `Processing` is recorded and applied once the
//! in-flight scan has committed or rejected.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

/// Terminal verdict of one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanOutcome {
    Admitted,
    AlreadyAdmitted,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "outcome", rename_all = "snake_case")]
pub enum ScanPhase {
    Idle,
    Scanning,
    Processing,
    Result(ScanOutcome),
    Stopped,
}

/// Steps of the scan pipeline, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStep {
    Unpack,
    Verify,
    EventMatch,
    GuestLookup,
    Admit,
}

/// One diagnostic line per step attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrailEntry {
    pub step: ScanStep,
    pub passed: bool,
    pub detail: String,
}

/// The guest a scan resolved to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuestSummary {
    pub id: String,
    pub name: String,
    pub check_in_time: Option<DateTime<Utc>>,
    pub checked_in_by: Option<String>,
}

/// Everything the operator is shown after a scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanReport {
    pub sequence: u64,
    pub outcome: ScanOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest: Option<GuestSummary>,
    pub scanned_at_millis: i64,
    pub trail: Vec<TrailEntry>,
}

/// A successful admission kept in the session history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdmitRecord {
    pub sequence: u64,
    pub guest_id: String,
    pub guest_name: String,
    pub admitted_at_millis: i64,
}

/// Mutable state of one scanning session.
#[derive(Debug)]
pub struct ScanSession {
    phase: ScanPhase,
    stop_requested: bool,
    stop_epoch: u64,
    sequence: u64,
    result_since_millis: Option<i64>,
    last_result: Option<ScanReport>,
    history: VecDeque<AdmitRecord>,
    history_limit: usize,
}

impl ScanSession {
    pub fn new(history_limit: usize) -> Self {
        Self {
            phase: ScanPhase::Idle,
            stop_requested: false,
            stop_epoch: 0,
            sequence: 0,
            result_since_millis: None,
            last_result: None,
            history: VecDeque::with_capacity(history_limit),
            history_limit,
        }
    }

    pub fn phase(&self) -> ScanPhase {
        self.phase
    }

    pub fn is_scanning(&self) -> bool {
        self.phase == ScanPhase::Scanning
    }

    pub fn is_processing(&self) -> bool {
        self.phase == ScanPhase::Processing
    }

    /// Bumped by every `stop`. Decodes captured under an older epoch are stale.
    pub fn stop_epoch(&self) -> u64 {
        self.stop_epoch
    }

    pub fn last_result(&self) -> Option<&ScanReport> {
        self.last_result.as_ref()
    }

    /// Most recent admission first.
    pub fn history(&self) -> Vec<AdmitRecord> {
        self.history.iter().rev().cloned().collect()
    }

    pub fn start(&mut self) -> ScanPhase {
        if self.phase == ScanPhase::Idle {
            self.phase = ScanPhase::Scanning;
        }
        self.phase
    }

    pub fn stop(&mut self) -> ScanPhase {
        self.stop_epoch += 1;
        match self.phase {
            ScanPhase::Scanning => self.phase = ScanPhase::Idle,
            ScanPhase::Processing => self.stop_requested = true,
            ScanPhase::Result(_) => {
                self.phase = ScanPhase::Stopped;
                self.result_since_millis = None;
            }
            ScanPhase::Idle | ScanPhase::Stopped => {}
        }
        self.phase
    }

    pub fn restart(&mut self) -> ScanPhase {
        match self.phase {
            ScanPhase::Idle | ScanPhase::Stopped | ScanPhase::Result(_) => {
                self.phase = ScanPhase::Scanning;
                self.result_since_millis = None;
            }
            // Cancels a stop that has not been applied yet.
            ScanPhase::Processing => self.stop_requested = false,
            ScanPhase::Scanning => {}
        }
        self.phase
    }

    /// Operator skipped the cool-down.
    pub fn scan_next(&mut self) -> ScanPhase {
        if let ScanPhase::Result(_) = self.phase {
            self.phase = ScanPhase::Scanning;
            self.result_since_millis = None;
        }
        self.phase
    }

    /// Resumes scanning once the cool-down measured from the last result has passed.
    pub fn poll(&mut self, now_millis: i64, cooldown_millis: i64) -> ScanPhase {
        if let (ScanPhase::Result(_), Some(since)) = (self.phase, self.result_since_millis) {
            if now_millis.saturating_sub(since) >= cooldown_millis {
                self.phase = ScanPhase::Scanning;
                self.result_since_millis = None;
            }
        }
        self.phase
    }

    /// Timer-driven resume. Only the result numbered `sequence` is resumed,
    /// so a stale timer cannot cut a later result's cool-down short.
    pub fn resume(&mut self, sequence: u64) -> bool {
        if matches!(self.phase, ScanPhase::Result(_)) && self.sequence == sequence {
            self.phase = ScanPhase::Scanning;
            self.result_since_millis = None;
            return true;
        }
        false
    }

    /// Claims the session for one decode. `None` while anything but `Scanning`.
    pub fn begin_processing(&mut self) -> Option<u64> {
        if self.phase != ScanPhase::Scanning {
            return None;
        }
        self.phase = ScanPhase::Processing;
        self.sequence += 1;
        Some(self.sequence)
    }

    /// Records the verdict of the in-flight scan.
    pub fn finish(&mut self, report: ScanReport, now_millis: i64) {
        if report.outcome == ScanOutcome::Admitted {
            if let Some(guest) = &report.guest {
                if self.history.len() == self.history_limit {
                    self.history.pop_front();
                }
                if self.history_limit > 0 {
                    self.history.push_back(AdmitRecord {
                        sequence: report.sequence,
                        guest_id: guest.id.clone(),
                        guest_name: guest.name.clone(),
                        admitted_at_millis: report.scanned_at_millis,
                    });
                }
            }
        }

        if self.stop_requested {
            self.stop_requested = false;
            self.phase = ScanPhase::Stopped;
            self.result_since_millis = None;
        } else {
            self.phase = ScanPhase::Result(report.outcome);
            self.result_since_millis = Some(now_millis);
        }
        self.last_result = Some(report);
    }

    /// Releases a claim whose scan never produced a verdict.
    pub fn abandon(&mut self) {
        if self.phase != ScanPhase::Processing {
            return;
        }
        if self.stop_requested {
            self.stop_requested = false;
            self.phase = ScanPhase::Stopped;
        } else {
            self.phase = ScanPhase::Scanning;
        }
    }
}
