//! Database repository for event records.

use crate::database::models::{CreateEvent, Event};
use crate::repositories::EventStore;
use anyhow::Result;
use async_trait::async_trait;
use sqlx::SqlitePool;

/// Repository for event database operations.
#[derive(Clone)]
pub struct EventRepository {
    /// Shared SQLite connection pool
    pool: SqlitePool,
}

impl EventRepository {
    /// Creates a new EventRepository instance.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates a new event in the database.
    pub async fn create_event(&self, event: CreateEvent) -> Result<Event> {
        let event = sqlx::query_as::<_, Event>(
            r#"
            INSERT INTO events (id, name, venue, starts_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, name, venue, starts_at, created_at, updated_at, is_deleted, deleted_at
            "#,
        )
        .bind(event.id.trim())
        .bind(event.name.trim())
        .bind(event.venue)
        .bind(event.starts_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(event)
    }

    /// Retrieves an event by its identifier.
    ///
    /// # Returns
    /// `Some(Event)` if found and not deleted, `None` otherwise
    pub async fn get_event_by_id(&self, id: &str) -> Result<Option<Event>> {
        let event = sqlx::query_as::<_, Event>(
            r#"
            SELECT id, name, venue, starts_at, created_at, updated_at, is_deleted, deleted_at
            FROM events WHERE id = ? AND is_deleted = 0
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(event)
    }
}

#[async_trait]
impl EventStore for EventRepository {
    async fn get_event(&self, event_id: &str) -> Result<Option<Event>> {
        self.get_event_by_id(event_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;

    #[tokio::test]
    async fn creates_and_reads_events() {
        let db = Database::in_memory().await.unwrap();
        let repo = EventRepository::new(db.pool().clone());

        let created = repo
            .create_event(CreateEvent {
                id: " EVT_1 ".to_string(),
                name: "Launch party".to_string(),
                venue: Some("Hall A".to_string()),
                starts_at: None,
            })
            .await
            .unwrap();
        assert_eq!(created.id, "EVT_1");

        let fetched = repo.get_event("EVT_1").await.unwrap().unwrap();
        assert_eq!(fetched.name, "Launch party");
        assert_eq!(fetched.venue.as_deref(), Some("Hall A"));
        assert!(repo.get_event("EVT_2").await.unwrap().is_none());
    }
}
