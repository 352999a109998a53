//! Module for credential API endpoints: issuing QR credentials to guests and
//! verifying tokens outside a scanning session.

pub mod handlers;
pub mod routes;
