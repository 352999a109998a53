//! Check-in credentials: the payload sealed inside a token, the codec that
//! seals and opens tokens, and the QR envelope the token travels in.
//!
//! Everything here is pure and synchronous. Side effects live in
//! `services::checkin`.

pub mod codec;
pub mod envelope;
pub mod payload;

pub use codec::{IssueRequest, TokenCodec};
pub use payload::CredentialPayload;
