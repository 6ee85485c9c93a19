//! htdeploy-transport: the `Server` abstraction plus concrete backends.

pub mod local;
pub mod server;
#[cfg(feature = "sftp")]
pub mod sftp;

pub use local::LocalFsServer;
pub use server::{PurgeEntryFn, Server, WriteProgressFn};
#[cfg(feature = "sftp")]
pub use sftp::SftpServer;
