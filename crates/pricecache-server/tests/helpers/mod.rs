//! Test helpers para pricecache-server.

#![allow(dead_code, unused_imports)]

pub mod client;
pub mod source;

pub use client::{TestApp, TestClient, TestResponse, app, app_with};
pub use source::StubSource;
