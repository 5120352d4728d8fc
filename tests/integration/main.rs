//! End-to-end bench scenarios, driven through the public API with paused
//! tokio time.

mod common;
mod noise;
mod scenarios;
