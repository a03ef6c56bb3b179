//! media-gallery - A media gallery backed by a blob store and a document store
//!
//! This crate provides media upload, listing and deletion with:
//! - Swappable object storage backends (local filesystem, Azure Blob Storage)
//! - Swappable metadata backends (redb, Azure Cosmos DB, or a remote relay)
//! - An upload/delete workflow that keeps the two stores in step and logs
//!   every transition, plus a reconciliation sweep for interrupted sequences
//! - REST API with a metadata relay and multipart upload support

pub mod api;
pub mod config;
pub mod gallery;
pub mod object_store;
pub mod storage;
#[cfg(test)]
pub mod testutil;
pub mod workflow;

use config::Config;
use workflow::MediaWorkflow;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub workflow: MediaWorkflow,
}

impl AppState {
    pub fn new(config: Config, workflow: MediaWorkflow) -> Self {
        Self { config, workflow }
    }
}
