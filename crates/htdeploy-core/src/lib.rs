pub mod config;
pub mod error;
pub mod progress;
pub mod types;

pub use error::{DeployError, DeployResult};
pub use progress::{NoProgress, Progress};
