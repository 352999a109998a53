//! Data access for events and guest lists.
//!
//! The check-in flow talks to storage only through the [`GuestStore`] and
//! [`EventStore`] ports, so the coordinator can be exercised against
//! in-memory doubles and deployed against SQLite.

use async_trait::async_trait;

use crate::database::models::{AdmitAttempt, CheckInStamp, Event, Guest};

pub mod event_repository;
pub mod guest_repository;

/// Port for reading guests and admitting them.
#[async_trait]
pub trait GuestStore: Send + Sync {
    async fn get_guest(&self, event_id: &str, guest_id: &str) -> anyhow::Result<Option<Guest>>;

    /// Marks the guest checked in only if they are not already.
    ///
    /// Must be a single atomic operation against the store: two concurrent
    /// calls for the same guest yield exactly one `Admitted`.
    async fn mark_checked_in(
        &self,
        event_id: &str,
        guest_id: &str,
        stamp: CheckInStamp,
    ) -> anyhow::Result<AdmitAttempt>;
}

/// Port for resolving events.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn get_event(&self, event_id: &str) -> anyhow::Result<Option<Event>>;
}
