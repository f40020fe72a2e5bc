//! HTTP handlers.

pub mod admin;
pub mod catalog;
pub mod health;
pub mod metrics;
