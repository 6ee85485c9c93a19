//! The `Server` abstraction (spec §6): the one contract the synchronization
//! core requires of a file-transfer backend. Concrete backends (local
//! filesystem, SFTP) live in sibling modules; the core never depends on
//! them directly.

use async_trait::async_trait;
use std::path::Path;

/// Byte-progress callback for a single `write_file` call (0-100).
pub type WriteProgressFn<'a> = &'a (dyn Fn(u8) + Send + Sync);

/// Callback invoked once per entry removed during a `purge`.
pub type PurgeEntryFn<'a> = &'a (dyn Fn(&str) + Send + Sync);

/// Synchronous-looking (but `async`, so real backends can await network
/// I/O) operations against a remote file tree. Exclusively owned by the
/// Deployer for the duration of one deploy; no two calls are ever in
/// flight concurrently (spec §5).
#[async_trait]
pub trait Server: Send + Sync {
    /// Establish the session. Called once, before anything else.
    async fn connect(&mut self) -> anyhow::Result<()>;

    /// Absolute remote root path, no trailing `/`.
    fn remote_dir(&self) -> &str;

    /// Fails if `remote_path` is absent.
    async fn read_file(&self, remote_path: &str, local_dest: &Path) -> anyhow::Result<()>;

    /// Creates or overwrites `remote_path` from the bytes at `local_source`.
    async fn write_file(
        &self,
        local_source: &Path,
        remote_path: &str,
        on_progress: Option<WriteProgressFn<'_>>,
    ) -> anyhow::Result<()>;

    /// Atomic on the remote.
    async fn rename_file(&self, from: &str, to: &str) -> anyhow::Result<()>;

    async fn remove_file(&self, path: &str) -> anyhow::Result<()>;

    async fn remove_dir(&self, path: &str) -> anyhow::Result<()>;

    /// Idempotent; creates missing parent directories too.
    async fn create_dir(&self, path: &str) -> anyhow::Result<()>;

    /// Removes every entry inside `path`, preserving `path` itself.
    async fn purge(&self, path: &str, on_entry: Option<PurgeEntryFn<'_>>) -> anyhow::Result<()>;

    /// Runs a remote shell command, returning its output. Fails (and the
    /// error carries the output) on non-zero exit.
    async fn execute(&self, cmd: &str) -> anyhow::Result<String>;
}
