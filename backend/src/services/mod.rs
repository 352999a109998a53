//! Module for core business logic services.
//!
//! This module encapsulates services that perform specific business operations
//! and orchestrate interactions between different parts of the application,
//! such as issuing credentials and running door-side scanning sessions.

pub mod checkin;
pub mod credential_service;

#[cfg(test)]
pub(crate) mod test_support;
