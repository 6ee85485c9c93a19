//! Filesystem-backed `Server`: treats a second local directory as "remote".
//!
//! Used by `htdeploy-sync`'s own test suite (the way the teacher's engine
//! tests stand a `tempfile::TempDir` in for a real SeaweedFS endpoint) and
//! by operators who publish to a locally mounted path (e.g. an already
//! network-mounted share) without a dedicated SFTP round-trip.

use crate::server::{PurgeEntryFn, Server, WriteProgressFn};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub struct LocalFsServer {
    root: PathBuf,
    root_display: String,
}

impl LocalFsServer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root_display = root.to_string_lossy().trim_end_matches('/').to_string();
        Self { root, root_display }
    }

    /// Map a manifest-style remote path (`/a/b.txt`, leading slash) onto a
    /// real filesystem path under `self.root`.
    fn resolve(&self, remote_path: &str) -> PathBuf {
        self.root.join(remote_path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Server for LocalFsServer {
    async fn connect(&mut self) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    fn remote_dir(&self) -> &str {
        &self.root_display
    }

    async fn read_file(&self, remote_path: &str, local_dest: &Path) -> anyhow::Result<()> {
        let src = self.resolve(remote_path);
        if let Some(parent) = local_dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(&src, local_dest).await?;
        Ok(())
    }

    async fn write_file(
        &self,
        local_source: &Path,
        remote_path: &str,
        on_progress: Option<WriteProgressFn<'_>>,
    ) -> anyhow::Result<()> {
        let dest = self.resolve(remote_path);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(local_source, &dest).await?;
        if let Some(cb) = on_progress {
            cb(100);
        }
        Ok(())
    }

    async fn rename_file(&self, from: &str, to: &str) -> anyhow::Result<()> {
        let from = self.resolve(from);
        let to = self.resolve(to);
        if let Some(parent) = to.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::rename(&from, &to).await?;
        Ok(())
    }

    async fn remove_file(&self, path: &str) -> anyhow::Result<()> {
        tokio::fs::remove_file(self.resolve(path)).await?;
        Ok(())
    }

    async fn remove_dir(&self, path: &str) -> anyhow::Result<()> {
        let dir = self.resolve(path);
        if dir.exists() {
            tokio::fs::remove_dir(&dir).await?;
        }
        Ok(())
    }

    async fn create_dir(&self, path: &str) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(self.resolve(path)).await?;
        Ok(())
    }

    async fn purge(&self, path: &str, on_entry: Option<PurgeEntryFn<'_>>) -> anyhow::Result<()> {
        let dir = self.resolve(path);
        if !dir.exists() {
            return Ok(());
        }
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let entry_path = entry.path();
            let meta = entry.metadata().await?;
            if let Some(cb) = on_entry {
                cb(&entry_path.to_string_lossy());
            }
            if meta.is_dir() {
                tokio::fs::remove_dir_all(&entry_path).await?;
            } else {
                tokio::fs::remove_file(&entry_path).await?;
            }
        }
        Ok(())
    }

    async fn execute(&self, cmd: &str) -> anyhow::Result<String> {
        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(cmd)
            .current_dir(&self.root)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("remote command failed: {cmd}: {stderr}");
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
