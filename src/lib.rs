pub mod cache;
pub mod config;
pub mod db;
pub mod embeddings;
pub mod error;
pub mod index;
pub mod ingest;
pub mod memory;
pub mod router;
pub mod server;
pub mod session;
pub mod sources;

pub use config::Config;
pub use error::{AskragError, Result};
pub use router::{AnswerRouter, AnswerSource, AskResult};
