//! Configuration documents and API response bodies.

mod config;
mod responses;
mod specific;

pub use config::{Action, Config};
pub use responses::{ErrorResponse, MatchResponse, MessageResponse};
pub use specific::{DataSource, IdSet, SpecificConfig};
