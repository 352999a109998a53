//! Rust structs that represent database table mappings.
//!
//! These models define the structure of data as it is stored in and retrieved
//! from the database. Note that these may differ from API-specific models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: String,
    pub name: String,
    pub venue: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateEvent {
    #[validate(length(min = 1, max = 128, message = "Event ID must be between 1-128 characters"))]
    pub id: String,
    #[validate(length(min = 1, max = 255, message = "Event name must be between 1-255 characters"))]
    pub name: String,
    pub venue: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
}

/// A guest on an event's list.
///
/// `checked_in` flips from false to true at most once; the three fields
/// after it are written in the same update.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Guest {
    pub id: String,
    pub event_id: String,
    pub name: String,
    pub email: Option<String>,
    pub checked_in: bool,
    pub check_in_time: Option<DateTime<Utc>>,
    pub checked_in_by: Option<String>,
    pub qr_token_used: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateGuest {
    #[validate(length(min = 1, max = 128, message = "Guest ID must be between 1-128 characters"))]
    pub id: String,
    #[validate(length(min = 1, message = "Event ID is required"))]
    pub event_id: String,
    #[validate(length(min = 1, max = 255, message = "Guest name must be between 1-255 characters"))]
    pub name: String,
    #[validate(email(message = "Must be a valid email"))]
    pub email: Option<String>,
}

/// Everything written onto a guest record when they are admitted.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckInStamp {
    pub check_in_time: DateTime<Utc>,
    pub checked_in_by: String,
    pub qr_token_used: String,
}

/// Result of a conditional check-in against the guest store.
#[derive(Debug, Clone, PartialEq)]
pub enum AdmitAttempt {
    /// The guest was not checked in; the stamp has been written.
    Admitted(Guest),
    /// The guest was already checked in; nothing was written.
    AlreadyCheckedIn(Guest),
    /// No such guest in the event.
    NotFound,
}
