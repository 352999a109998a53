//! Staff authentication for the check-in API.
//!
//! Staff tokens are HS256 JWTs carrying the staff id (`sub`) and role; the
//! staff id is what gets written to `checked_in_by` on admission.

pub mod middleware;
