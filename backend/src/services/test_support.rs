use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Notify, Semaphore};

use crate::config::CryptoConfig;
use crate::credentials::TokenCodec;
use crate::database::models::{AdmitAttempt, CheckInStamp, Event, Guest};
use crate::repositories::{EventStore, GuestStore};
use crate::utils::clock::Clock;

/// 2023-11-14T22:13:20Z, a fixed starting point for test clocks.
pub(crate) const T0: i64 = 1_700_000_000_000;

pub(crate) fn test_codec() -> Arc<TokenCodec> {
    let config = CryptoConfig::new(vec![0x11; 32], vec![0x22; 32]).expect("test keys are valid");
    Arc::new(TokenCodec::new(&config).expect("test codec builds"))
}

pub(crate) fn guest(event_id: &str, id: &str, name: &str) -> Guest {
    let created = DateTime::<Utc>::from_timestamp_millis(T0).expect("T0 is in range");
    Guest {
        id: id.to_string(),
        event_id: event_id.to_string(),
        name: name.to_string(),
        email: None,
        checked_in: false,
        check_in_time: None,
        checked_in_by: None,
        qr_token_used: None,
        created_at: created,
        updated_at: created,
    }
}

pub(crate) fn event(id: &str) -> Event {
    let created = DateTime::<Utc>::from_timestamp_millis(T0).expect("T0 is in range");
    Event {
        id: id.to_string(),
        name: format!("Event {id}"),
        venue: None,
        starts_at: None,
        created_at: created,
        updated_at: created,
        is_deleted: false,
        deleted_at: None,
    }
}

// Settable time source for deterministic coordinator tests.
#[derive(Default)]
pub(crate) struct ManualClock(AtomicI64);

impl ManualClock {
    pub(crate) fn at(millis: i64) -> Arc<Self> {
        Arc::new(Self(AtomicI64::new(millis)))
    }

    pub(crate) fn set(&self, millis: i64) {
        self.0.store(millis, Ordering::SeqCst);
    }

    pub(crate) fn advance(&self, millis: i64) {
        self.0.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

type GuestTable = Arc<Mutex<HashMap<(String, String), Guest>>>;

/// In-memory guest list. The compare-and-set runs under one lock.
#[derive(Clone, Default)]
pub(crate) struct MemoryGuestStore {
    guests: GuestTable,
    fail: bool,
}

impl MemoryGuestStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Every call errors, as if the database were unreachable.
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn insert_test_guest(&self, guest: Guest) {
        let mut guard = self.guests.lock().expect("guests mutex poisoned");
        guard.insert((guest.event_id.clone(), guest.id.clone()), guest);
    }

    pub(crate) fn get_test_guest(&self, event_id: &str, guest_id: &str) -> Option<Guest> {
        let guard = self.guests.lock().expect("guests mutex poisoned");
        guard
            .get(&(event_id.to_string(), guest_id.to_string()))
            .cloned()
    }
}

#[async_trait]
impl GuestStore for MemoryGuestStore {
    async fn get_guest(&self, event_id: &str, guest_id: &str) -> anyhow::Result<Option<Guest>> {
        if self.fail {
            anyhow::bail!("connection refused");
        }
        Ok(self.get_test_guest(event_id, guest_id))
    }

    async fn mark_checked_in(
        &self,
        event_id: &str,
        guest_id: &str,
        stamp: CheckInStamp,
    ) -> anyhow::Result<AdmitAttempt> {
        if self.fail {
            anyhow::bail!("connection refused");
        }

        let mut guard = self.guests.lock().expect("guests mutex poisoned");
        let Some(guest) = guard.get_mut(&(event_id.to_string(), guest_id.to_string())) else {
            return Ok(AdmitAttempt::NotFound);
        };
        if guest.checked_in {
            return Ok(AdmitAttempt::AlreadyCheckedIn(guest.clone()));
        }

        guest.checked_in = true;
        guest.check_in_time = Some(stamp.check_in_time);
        guest.checked_in_by = Some(stamp.checked_in_by);
        guest.qr_token_used = Some(stamp.qr_token_used);
        guest.updated_at = stamp.check_in_time;
        Ok(AdmitAttempt::Admitted(guest.clone()))
    }
}

/// Guest store whose lookups park until the test releases them.
#[derive(Clone)]
pub(crate) struct GatedGuestStore {
    inner: MemoryGuestStore,
    entered: Arc<Notify>,
    release: Arc<Semaphore>,
}

impl GatedGuestStore {
    pub(crate) fn new(inner: MemoryGuestStore) -> Self {
        Self {
            inner,
            entered: Arc::new(Notify::new()),
            release: Arc::new(Semaphore::new(0)),
        }
    }

    /// Resolves once a lookup is parked at the gate.
    pub(crate) async fn lookup_started(&self) {
        self.entered.notified().await;
    }

    pub(crate) fn release_one(&self) {
        self.release.add_permits(1);
    }
}

#[async_trait]
impl GuestStore for GatedGuestStore {
    async fn get_guest(&self, event_id: &str, guest_id: &str) -> anyhow::Result<Option<Guest>> {
        self.entered.notify_one();
        self.release.acquire().await?.forget();
        self.inner.get_guest(event_id, guest_id).await
    }

    async fn mark_checked_in(
        &self,
        event_id: &str,
        guest_id: &str,
        stamp: CheckInStamp,
    ) -> anyhow::Result<AdmitAttempt> {
        self.inner.mark_checked_in(event_id, guest_id, stamp).await
    }
}

#[derive(Clone, Default)]
pub(crate) struct MemoryEventStore {
    events: Arc<Mutex<HashMap<String, Event>>>,
}

impl MemoryEventStore {
    pub(crate) fn with_events(ids: &[&str]) -> Self {
        let store = Self::default();
        {
            let mut guard = store.events.lock().expect("events mutex poisoned");
            for id in ids {
                guard.insert(id.to_string(), event(id));
            }
        }
        store
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn get_event(&self, event_id: &str) -> anyhow::Result<Option<Event>> {
        let guard = self.events.lock().expect("events mutex poisoned");
        Ok(guard.get(event_id).cloned())
    }
}
