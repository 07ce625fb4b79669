//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use std::sync::Arc;
use warehouse_core::DocumentService;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub documents: Arc<DocumentService>,
    pub config: Arc<Config>,
}

impl AppState {
    /// The shareable preview link for a slug.
    pub fn preview_url(&self, slug: &str) -> String {
        format!("{}/p/{}", self.config.public_base_url, slug)
    }
}
