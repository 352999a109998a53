//! Module for door-side scanning API endpoints.
//!
//! A staff device opens a session bound to one event, then submits decoded
//! QR text to it. Sessions are private to the staff member who opened them.

pub mod handlers;
pub mod routes;
