//! Cloud Controller client.
//!
//! Implements the engine's `RemoteApi` over the v2 and v3 HTTP APIs, with UAA
//! client-credentials auth. Each call is a single attempt; retry and conflict
//! handling belong to the engine's provisioner.

pub mod client;
pub mod wire;

pub use client::CloudController;
