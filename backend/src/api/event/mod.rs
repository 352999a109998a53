//! Module for event and guest list API endpoints.
//!
//! Organizers register events and the guests allowed in; scanners only read.

pub mod handlers;
pub mod routes;
