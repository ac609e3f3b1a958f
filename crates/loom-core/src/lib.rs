pub mod config;
pub mod db;
pub mod error;
pub mod imagine;
pub mod io;
pub mod notify;
pub mod orchestrator;
pub mod paths;
pub mod quota;
pub mod record;
pub mod sequence;
pub mod submission;
pub mod transform;

pub use error::{LoomError, Result};
