//! Clients for external services.

pub mod ai;
