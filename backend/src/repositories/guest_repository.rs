//! Database repository for guest lists and check-in state.

use crate::database::models::{AdmitAttempt, CheckInStamp, CreateGuest, Guest};
use crate::repositories::GuestStore;
use anyhow::Result;
use async_trait::async_trait;
use sqlx::SqlitePool;

/// Repository for guest database operations.
///
/// Guests are keyed by `(event_id, id)`; the same guest id may appear on
/// several events' lists.
#[derive(Clone)]
pub struct GuestRepository {
    /// Shared SQLite connection pool
    pool: SqlitePool,
}

impl GuestRepository {
    /// Creates a new GuestRepository instance.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Adds a guest to an event's list, not yet checked in.
    pub async fn create_guest(&self, guest: CreateGuest) -> Result<Guest> {
        let guest = sqlx::query_as::<_, Guest>(
            r#"
            INSERT INTO guests (id, event_id, name, email)
            VALUES (?, ?, ?, ?)
            RETURNING id, event_id, name, email, checked_in, check_in_time,
                      checked_in_by, qr_token_used, created_at, updated_at
            "#,
        )
        .bind(guest.id.trim())
        .bind(guest.event_id.trim())
        .bind(guest.name.trim())
        .bind(guest.email)
        .fetch_one(&self.pool)
        .await?;

        Ok(guest)
    }

    /// Retrieves a guest by event and guest id.
    ///
    /// # Returns
    /// `Some(Guest)` if found and not deleted, `None` otherwise
    pub async fn get_guest_by_id(&self, event_id: &str, guest_id: &str) -> Result<Option<Guest>> {
        let guest = sqlx::query_as::<_, Guest>(
            r#"
            SELECT id, event_id, name, email, checked_in, check_in_time,
                   checked_in_by, qr_token_used, created_at, updated_at
            FROM guests
            WHERE event_id = ? AND id = ? AND is_deleted = 0
            "#,
        )
        .bind(event_id)
        .bind(guest_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(guest)
    }

    /// Writes the check-in stamp if, and only if, the guest is not checked in yet.
    ///
    /// # Effects
    /// - One conditional `UPDATE ... WHERE checked_in = 0`, so concurrent
    ///   scanners cannot both admit the same guest
    /// - When no row is updated, re-reads the guest to tell "already checked
    ///   in" apart from "not found"
    pub async fn check_in_guest(
        &self,
        event_id: &str,
        guest_id: &str,
        stamp: CheckInStamp,
    ) -> Result<AdmitAttempt> {
        let admitted = sqlx::query_as::<_, Guest>(
            r#"
            UPDATE guests
            SET checked_in = 1,
                check_in_time = ?,
                checked_in_by = ?,
                qr_token_used = ?,
                updated_at = CURRENT_TIMESTAMP
            WHERE event_id = ? AND id = ? AND checked_in = 0 AND is_deleted = 0
            RETURNING id, event_id, name, email, checked_in, check_in_time,
                      checked_in_by, qr_token_used, created_at, updated_at
            "#,
        )
        .bind(stamp.check_in_time)
        .bind(&stamp.checked_in_by)
        .bind(&stamp.qr_token_used)
        .bind(event_id)
        .bind(guest_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(guest) = admitted {
            return Ok(AdmitAttempt::Admitted(guest));
        }

        Ok(match self.get_guest_by_id(event_id, guest_id).await? {
            Some(guest) => AdmitAttempt::AlreadyCheckedIn(guest),
            None => AdmitAttempt::NotFound,
        })
    }
}

#[async_trait]
impl GuestStore for GuestRepository {
    async fn get_guest(&self, event_id: &str, guest_id: &str) -> Result<Option<Guest>> {
        self.get_guest_by_id(event_id, guest_id).await
    }

    async fn mark_checked_in(
        &self,
        event_id: &str,
        guest_id: &str,
        stamp: CheckInStamp,
    ) -> Result<AdmitAttempt> {
        self.check_in_guest(event_id, guest_id, stamp).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::database::models::CreateEvent;
    use crate::repositories::event_repository::EventRepository;
    use chrono::{DateTime, Utc};

    async fn seeded() -> GuestRepository {
        let db = Database::in_memory().await.unwrap();
        EventRepository::new(db.pool().clone())
            .create_event(CreateEvent {
                id: "EVT_1".to_string(),
                name: "Gala".to_string(),
                venue: None,
                starts_at: None,
            })
            .await
            .unwrap();

        let repo = GuestRepository::new(db.pool().clone());
        repo.create_guest(CreateGuest {
            id: "GST_1".to_string(),
            event_id: "EVT_1".to_string(),
            name: "Ada".to_string(),
            email: None,
        })
        .await
        .unwrap();
        repo
    }

    fn stamp(millis: i64, staff: &str) -> CheckInStamp {
        CheckInStamp {
            check_in_time: DateTime::<Utc>::from_timestamp_millis(millis).unwrap(),
            checked_in_by: staff.to_string(),
            qr_token_used: "cipher.mac".to_string(),
        }
    }

    #[tokio::test]
    async fn new_guests_are_not_checked_in() {
        let repo = seeded().await;
        let guest = repo.get_guest("EVT_1", "GST_1").await.unwrap().unwrap();
        assert!(!guest.checked_in);
        assert_eq!(guest.check_in_time, None);
        assert_eq!(guest.checked_in_by, None);
    }

    #[tokio::test]
    async fn check_in_happens_once() {
        let repo = seeded().await;

        let first = repo
            .mark_checked_in("EVT_1", "GST_1", stamp(1_700_000_000_000, "STAFF_1"))
            .await
            .unwrap();
        let AdmitAttempt::Admitted(admitted) = first else {
            panic!("expected admission, got {first:?}");
        };
        assert!(admitted.checked_in);
        assert_eq!(admitted.checked_in_by.as_deref(), Some("STAFF_1"));
        assert_eq!(admitted.qr_token_used.as_deref(), Some("cipher.mac"));

        let second = repo
            .mark_checked_in("EVT_1", "GST_1", stamp(1_700_000_999_000, "STAFF_2"))
            .await
            .unwrap();
        let AdmitAttempt::AlreadyCheckedIn(unchanged) = second else {
            panic!("expected already checked in, got {second:?}");
        };
        assert_eq!(unchanged.check_in_time, admitted.check_in_time);
        assert_eq!(unchanged.checked_in_by.as_deref(), Some("STAFF_1"));
    }

    #[tokio::test]
    async fn guests_are_scoped_to_their_event() {
        let repo = seeded().await;

        assert!(repo.get_guest("EVT_2", "GST_1").await.unwrap().is_none());
        assert_eq!(
            repo.mark_checked_in("EVT_2", "GST_1", stamp(1, "STAFF_1"))
                .await
                .unwrap(),
            AdmitAttempt::NotFound
        );
        assert_eq!(
            repo.mark_checked_in("EVT_1", "GST_404", stamp(1, "STAFF_1"))
                .await
                .unwrap(),
            AdmitAttempt::NotFound
        );
    }
}
