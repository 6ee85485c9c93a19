//! SFTP `Server` backend, behind the `sftp` feature.
//!
//! `ssh2` is a blocking API (grounded in the corpus's own SFTP sync tool,
//! which drives it the same way); every call is pushed onto a blocking
//! task via `spawn_blocking` so the rest of the deploy pipeline keeps its
//! async shape without stalling the runtime.

use crate::server::{PurgeEntryFn, Server, WriteProgressFn};
use async_trait::async_trait;
use ssh2::Session;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub struct SftpServer {
    host: String,
    port: u16,
    username: String,
    key_file: Option<PathBuf>,
    password: Option<String>,
    remote_root: String,
    session: Option<Arc<Mutex<Session>>>,
}

impl SftpServer {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        remote_root: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            key_file: None,
            password: None,
            remote_root: remote_root.into().trim_end_matches('/').to_string(),
            session: None,
        }
    }

    pub fn with_key_file(mut self, path: PathBuf) -> Self {
        self.key_file = Some(path);
        self
    }

    pub fn with_password(mut self, password: String) -> Self {
        self.password = Some(password);
        self
    }

    fn session(&self) -> anyhow::Result<Arc<Mutex<Session>>> {
        self.session
            .clone()
            .ok_or_else(|| anyhow::anyhow!("SFTP session not connected"))
    }

    /// Join a manifest-style remote path onto the configured remote root.
    fn full_path(&self, remote_path: &str) -> String {
        format!("{}/{}", self.remote_root, remote_path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Server for SftpServer {
    async fn connect(&mut self) -> anyhow::Result<()> {
        let host = self.host.clone();
        let port = self.port;
        let username = self.username.clone();
        let key_file = self.key_file.clone();
        let password = self.password.clone();

        let session = tokio::task::spawn_blocking(move || -> anyhow::Result<Session> {
            let tcp = TcpStream::connect((host.as_str(), port))?;
            let mut session = Session::new()?;
            session.set_tcp_stream(tcp);
            session.handshake()?;

            if let Some(key) = &key_file {
                session.userauth_pubkey_file(&username, None, key, None)?;
            } else if let Some(pass) = &password {
                session.userauth_password(&username, pass)?;
            } else {
                anyhow::bail!("SFTP backend needs either a key_file or a password");
            }

            if !session.authenticated() {
                anyhow::bail!("SFTP authentication failed for {username}@{host}");
            }

            Ok(session)
        })
        .await??;

        self.session = Some(Arc::new(Mutex::new(session)));
        Ok(())
    }

    fn remote_dir(&self) -> &str {
        &self.remote_root
    }

    async fn read_file(&self, remote_path: &str, local_dest: &Path) -> anyhow::Result<()> {
        let session = self.session()?;
        let remote = self.full_path(remote_path);
        let local = local_dest.to_path_buf();

        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            if let Some(parent) = local.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let sess = session.lock().unwrap();
            let sftp = sess.sftp()?;
            let mut remote_file = sftp.open(Path::new(&remote))?;
            let mut buf = Vec::new();
            remote_file.read_to_end(&mut buf)?;
            std::fs::write(&local, buf)?;
            Ok(())
        })
        .await?
    }

    async fn write_file(
        &self,
        local_source: &Path,
        remote_path: &str,
        on_progress: Option<WriteProgressFn<'_>>,
    ) -> anyhow::Result<()> {
        let session = self.session()?;
        let remote = self.full_path(remote_path);
        let local = local_source.to_path_buf();

        let data = tokio::fs::read(&local).await?;
        let total = data.len().max(1);

        let result = tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let sess = session.lock().unwrap();
            let sftp = sess.sftp()?;
            let mut remote_file = sftp.create(Path::new(&remote))?;
            remote_file.write_all(&data)?;
            Ok(())
        })
        .await?;

        if let Some(cb) = on_progress {
            cb(if result.is_ok() { 100 } else { 0 });
        }
        result
    }

    async fn rename_file(&self, from: &str, to: &str) -> anyhow::Result<()> {
        let session = self.session()?;
        let from = self.full_path(from);
        let to = self.full_path(to);

        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let sess = session.lock().unwrap();
            let sftp = sess.sftp()?;
            // Overwrite semantics: the destination may already exist from a
            // previous deploy's committed rename.
            let _ = sftp.unlink(Path::new(&to));
            sftp.rename(Path::new(&from), Path::new(&to), None)?;
            Ok(())
        })
        .await?
    }

    async fn remove_file(&self, path: &str) -> anyhow::Result<()> {
        let session = self.session()?;
        let full = self.full_path(path);

        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let sess = session.lock().unwrap();
            let sftp = sess.sftp()?;
            sftp.unlink(Path::new(&full))?;
            Ok(())
        })
        .await?
    }

    async fn remove_dir(&self, path: &str) -> anyhow::Result<()> {
        let session = self.session()?;
        let full = self.full_path(path);

        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let sess = session.lock().unwrap();
            let sftp = sess.sftp()?;
            sftp.rmdir(Path::new(&full))?;
            Ok(())
        })
        .await?
    }

    async fn create_dir(&self, path: &str) -> anyhow::Result<()> {
        let session = self.session()?;
        let full = self.full_path(path);

        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let sess = session.lock().unwrap();
            let sftp = sess.sftp()?;
            // Idempotent, create-parents: walk the path component by
            // component, ignoring "already exists" failures.
            let mut acc = String::new();
            for component in full.trim_matches('/').split('/') {
                if component.is_empty() {
                    continue;
                }
                acc.push('/');
                acc.push_str(component);
                let _ = sftp.mkdir(Path::new(&acc), 0o755);
            }
            Ok(())
        })
        .await?
    }

    async fn purge(&self, path: &str, on_entry: Option<PurgeEntryFn<'_>>) -> anyhow::Result<()> {
        let session = self.session()?;
        let full = self.full_path(path);

        // Collect entries synchronously (blocking), report them back so the
        // caller can invoke `on_entry` on the async side.
        let entries = tokio::task::spawn_blocking({
            let session = session.clone();
            let full = full.clone();
            move || -> anyhow::Result<Vec<(String, bool)>> {
                let sess = session.lock().unwrap();
                let sftp = sess.sftp()?;
                let listing = sftp.readdir(Path::new(&full))?;
                Ok(listing
                    .into_iter()
                    .filter_map(|(entry_path, stat)| {
                        let name = entry_path.file_name()?.to_string_lossy().into_owned();
                        if name == "." || name == ".." {
                            return None;
                        }
                        Some((
                            format!("{full}/{name}"),
                            stat.is_dir(),
                        ))
                    })
                    .collect())
            }
        })
        .await??;

        for (entry_path, is_dir) in entries {
            if let Some(cb) = on_entry {
                cb(&entry_path);
            }
            let session = session.clone();
            let entry_path_for_task = entry_path.clone();
            tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
                let sess = session.lock().unwrap();
                let sftp = sess.sftp()?;
                if is_dir {
                    sftp.rmdir(Path::new(&entry_path_for_task))?;
                } else {
                    sftp.unlink(Path::new(&entry_path_for_task))?;
                }
                Ok(())
            })
            .await??;
        }

        Ok(())
    }

    async fn execute(&self, cmd: &str) -> anyhow::Result<String> {
        let session = self.session()?;
        let cmd = cmd.to_string();

        tokio::task::spawn_blocking(move || -> anyhow::Result<String> {
            let sess = session.lock().unwrap();
            let mut channel = sess.channel_session()?;
            channel.exec(&cmd)?;

            let mut output = String::new();
            channel.read_to_string(&mut output)?;
            channel.wait_close()?;

            let exit_status = channel.exit_status()?;
            if exit_status != 0 {
                anyhow::bail!("remote command exited {exit_status}: {cmd}");
            }
            Ok(output)
        })
        .await?
    }
}
