//! Configuration management service.
//!
//! Stores generic DOM-action configurations and host/URL/page routing
//! configurations as YAML files, and answers priority match queries over
//! the routing configurations.

pub mod config;
pub mod matching;
pub mod models;
pub mod server;
pub mod store;

use models::{Config, SpecificConfig};
use store::DocumentStore;

pub use config::{Settings, SettingsError};
pub use matching::MatchQuery;
pub use store::StoreError;

/// Store of generic configurations.
pub type ConfigStore = DocumentStore<Config>;

/// Store of specific (routing) configurations.
pub type SpecificStore = DocumentStore<SpecificConfig>;
