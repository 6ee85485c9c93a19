//! htdeploy-sync: pattern matching, scanning, preprocessing, manifest
//! codec, planning, job running, and the Deployer orchestration protocol.

pub mod deploy;
pub mod jobs;
pub mod manifest;
pub mod pattern;
pub mod planner;
pub mod preprocess;
pub mod scanner;

pub use deploy::{deploy, DeployOptions, DeployReport};
pub use planner::{plan, Plan};
pub use preprocess::{FilterRegistry, Preprocessor};
