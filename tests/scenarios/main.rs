//! End-to-end scenarios across store, delivery, view and streaming

#[path = "../common/mod.rs"]
mod common;

mod composite;
mod config;
mod delivery;
mod failures;
mod multi_process;
mod store;
mod streaming;
