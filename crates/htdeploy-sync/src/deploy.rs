//! Deployer: the 14-phase orchestration protocol tying scanner, planner,
//! manifest, and jobs together around a `Server`.
//!
//! Phases:
//!  1. connect
//!  2. run local pre-jobs
//!  3. load the remote manifest (absence tolerated, treated as empty)
//!  4. scan the local tree
//!  5. plan (diff local vs. remote FileMaps)
//!  6. fast paths: nothing to do, or test-mode dry run
//!  7. write the running marker
//!  8. run remote pre-jobs
//!  9. upload phase (stage every changed entry as `<path>.deploytmp`)
//! 10. rename phase (commit staged uploads, manifest path last)
//! 11. delete phase (best-effort; a failure is logged, not fatal)
//! 12. purge phase
//! 13. post-jobs
//! 14. clear the running marker
//!
//! Once any upload has been renamed into place, the deploy has
//! partially committed: a later fatal error does not roll earlier
//! renames back, and the running marker is left in place as crash
//! evidence rather than cleaned up proactively (spec §7).

use crate::jobs;
use crate::manifest;
use crate::planner::{self, Plan};
use crate::preprocess::Preprocessor;
use crate::scanner;
use htdeploy_core::types::{is_dir_path, Job};
use htdeploy_core::{DeployError, Progress};
use htdeploy_transport::Server;
use std::path::Path;

pub struct DeployOptions {
    pub manifest_filename: String,
    pub ignore: Vec<String>,
    pub allow_delete: bool,
    pub purge: Vec<String>,
    pub before_jobs: Vec<Job>,
    pub after_jobs: Vec<Job>,
    pub test_mode: bool,
    pub temp_dir: std::path::PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct DeployReport {
    pub uploaded: usize,
    pub deleted: usize,
    pub purged: usize,
    pub manifest_changed: bool,
    pub dry_run: bool,
}

fn manifest_path(filename: &str) -> String {
    format!("/{filename}")
}

fn running_marker_path(filename: &str) -> String {
    format!("/{filename}.running")
}

pub async fn deploy(
    local_root: &Path,
    server: &mut dyn Server,
    preprocessor: &Preprocessor,
    opts: &DeployOptions,
    progress: &dyn Progress,
) -> Result<DeployReport, DeployError> {
    // Phase 1: connect.
    server
        .connect()
        .await
        .map_err(|e| DeployError::server("connect", server.remote_dir(), e))?;

    // Phase 2: local pre-jobs.
    let (local_before, remote_before) = jobs::partition_local(&opts.before_jobs);
    jobs::run_all(&local_before, server)
        .await
        .map_err(|e| DeployError::Job(format!("local pre-job failed: {e}")))?;

    let manifest_rel = manifest_path(&opts.manifest_filename);
    let running_rel = running_marker_path(&opts.manifest_filename);

    // Phase 3: load the remote manifest.
    let remote_map = load_remote_manifest(server, &manifest_rel).await;

    // Phase 4: scan the local tree.
    let mut local_map = scanner::scan(local_root, &opts.ignore, preprocessor, progress)
        .map_err(|e| DeployError::Manifest(format!("scan failed: {e}")))?;
    // The manifest's own path never participates in diffing.
    local_map.remove(&manifest_rel);

    // Phase 5: plan.
    let plan = planner::plan(&local_map, &remote_map, opts.allow_delete, &manifest_rel);

    // Phase 6: fast paths.
    if !plan.manifest_changed {
        tracing::info!("nothing to deploy, local and remote are already in sync");
        return Ok(DeployReport {
            manifest_changed: false,
            ..Default::default()
        });
    }

    if opts.test_mode {
        tracing::info!(
            uploads = plan.uploads.len(),
            deletes = plan.deletes.len(),
            "test mode: dry run, no changes written"
        );
        return Ok(DeployReport {
            uploaded: plan.uploads.len(),
            deleted: plan.deletes.len(),
            manifest_changed: true,
            dry_run: true,
            ..Default::default()
        });
    }

    // Phase 7: write the running marker.
    write_running_marker(server, &running_rel).await?;

    // Phase 8: remote pre-jobs.
    jobs::run_all(&remote_before, server)
        .await
        .map_err(|e| DeployError::Job(format!("remote pre-job failed: {e}")))?;

    // Phases 9-10: upload then rename, manifest last.
    let uploaded = run_upload_and_rename(server, local_root, preprocessor, &plan, &local_map, progress).await?;

    // Phase 11: delete phase, best-effort.
    let deleted = run_deletes(server, &plan).await;

    // Phase 12: purge phase.
    let purged = run_purges(server, &opts.purge).await;

    // Phase 13: post-jobs.
    jobs::run_all(&opts.after_jobs, server)
        .await
        .map_err(|e| DeployError::Job(format!("post-job failed: {e}")))?;

    // Phase 14: clear the running marker.
    server
        .remove_file(&running_rel)
        .await
        .map_err(|e| DeployError::server("remove_file", &running_rel, e))?;

    Ok(DeployReport {
        uploaded,
        deleted,
        purged,
        manifest_changed: true,
        dry_run: false,
    })
}

async fn load_remote_manifest(server: &dyn Server, manifest_rel: &str) -> htdeploy_core::types::FileMap {
    let tmp = match tempfile::NamedTempFile::new() {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!(error = %e, "could not allocate temp file for manifest download, treating as first deploy");
            return htdeploy_core::types::FileMap::new();
        }
    };

    if let Err(e) = server.read_file(manifest_rel, tmp.path()).await {
        tracing::info!(error = %e, "no existing remote manifest, treating as first deploy");
        return htdeploy_core::types::FileMap::new();
    }

    match std::fs::read(tmp.path()) {
        Ok(bytes) => manifest::decode(&bytes),
        Err(e) => {
            tracing::warn!(error = %e, "could not read downloaded manifest, treating as first deploy");
            htdeploy_core::types::FileMap::new()
        }
    }
}

async fn write_running_marker(server: &dyn Server, running_rel: &str) -> Result<(), DeployError> {
    let tmp = tempfile::NamedTempFile::new().map_err(DeployError::Io)?;
    std::fs::write(tmp.path(), b"running\n").map_err(DeployError::Io)?;
    server
        .write_file(tmp.path(), running_rel, None)
        .await
        .map_err(|e| DeployError::server("write_file", running_rel, e))
}

async fn run_upload_and_rename(
    server: &dyn Server,
    local_root: &Path,
    preprocessor: &Preprocessor,
    plan: &Plan,
    local_map: &htdeploy_core::types::FileMap,
    progress: &dyn Progress,
) -> Result<usize, DeployError> {
    let total = plan.uploads.len() as u64;
    let mut staged = Vec::with_capacity(plan.uploads.len());

    for (idx, rel_path) in plan.uploads.iter().enumerate() {
        progress.step(idx as u64 + 1, total, rel_path);

        if is_dir_path(rel_path) {
            server
                .create_dir(rel_path)
                .await
                .map_err(|e| DeployError::server("create_dir", rel_path, e))?;
            continue;
        }

        let abs_path = local_root.join(rel_path.trim_start_matches('/'));
        let pp_path = if local_map.contains_key(rel_path) {
            preprocessor
                .preprocess(&abs_path, rel_path)
                .map_err(|e| DeployError::Manifest(format!("preprocess {rel_path}: {e}")))?
        } else {
            // The manifest itself: materialized below, not read from disk.
            continue;
        };

        let staged_path = format!("{rel_path}.deploytmp");
        server
            .write_file(&pp_path, &staged_path, None)
            .await
            .map_err(|e| DeployError::server("write_file", &staged_path, e))?;
        staged.push((staged_path, rel_path.clone()));
    }

    // The manifest path is last in `plan.uploads` and was skipped above;
    // stage it now from freshly-encoded bytes.
    if let Some(manifest_rel) = plan.uploads.last() {
        let encoded = manifest::encode(local_map)
            .map_err(|e| DeployError::Manifest(format!("encode manifest: {e}")))?;
        let tmp = tempfile::NamedTempFile::new().map_err(DeployError::Io)?;
        std::fs::write(tmp.path(), &encoded).map_err(DeployError::Io)?;
        let staged_path = format!("{manifest_rel}.deploytmp");
        server
            .write_file(tmp.path(), &staged_path, None)
            .await
            .map_err(|e| DeployError::server("write_file", &staged_path, e))?;
        staged.push((staged_path, manifest_rel.clone()));
    }

    // Rename phase: commit in the same order, manifest last.
    for (staged_path, final_path) in &staged {
        server
            .rename_file(staged_path, final_path)
            .await
            .map_err(|e| DeployError::server("rename_file", final_path, e))?;
    }

    Ok(staged.len())
}

async fn run_deletes(server: &dyn Server, plan: &Plan) -> usize {
    let mut count = 0;
    for path in &plan.deletes {
        let result = if is_dir_path(path) {
            server.remove_dir(path).await
        } else {
            server.remove_file(path).await
        };
        match result {
            Ok(()) => count += 1,
            Err(e) => tracing::warn!(path, error = %e, "delete failed, continuing"),
        }
    }
    count
}

async fn run_purges(server: &dyn Server, purge_paths: &[String]) -> usize {
    let mut count = 0;
    for path in purge_paths {
        let result = server
            .purge(path, Some(&|entry: &str| tracing::debug!(entry, "purged")))
            .await;
        match result {
            Ok(()) => count += 1,
            Err(e) => tracing::warn!(path, error = %e, "purge failed, continuing"),
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::FilterRegistry;
    use htdeploy_core::NoProgress;
    use htdeploy_transport::LocalFsServer;

    fn preprocessor(tmp: &Path) -> Preprocessor {
        Preprocessor::new(FilterRegistry::new(), vec![], tmp.join("pp"))
    }

    fn opts() -> DeployOptions {
        DeployOptions {
            manifest_filename: ".htdeployment".into(),
            ignore: vec![],
            allow_delete: false,
            purge: vec![],
            before_jobs: vec![],
            after_jobs: vec![],
            test_mode: false,
            temp_dir: std::env::temp_dir(),
        }
    }

    #[tokio::test]
    async fn first_deploy_uploads_everything_and_writes_manifest() {
        let local = tempfile::tempdir().unwrap();
        let remote = tempfile::tempdir().unwrap();
        std::fs::write(local.path().join("a.txt"), b"hello").unwrap();

        let mut server = LocalFsServer::new(remote.path());
        let pp = preprocessor(local.path());
        let report = deploy(local.path(), &mut server, &pp, &opts(), &NoProgress)
            .await
            .unwrap();

        assert_eq!(report.uploaded, 2); // a.txt + manifest
        assert!(remote.path().join("a.txt").exists());
        assert!(remote.path().join(".htdeployment").exists());
        assert!(!remote.path().join(".htdeployment.running").exists());
    }

    #[tokio::test]
    async fn second_deploy_with_no_changes_is_a_fast_path_noop() {
        let local = tempfile::tempdir().unwrap();
        let remote = tempfile::tempdir().unwrap();
        std::fs::write(local.path().join("a.txt"), b"hello").unwrap();

        let mut server = LocalFsServer::new(remote.path());
        let pp = preprocessor(local.path());
        deploy(local.path(), &mut server, &pp, &opts(), &NoProgress)
            .await
            .unwrap();

        let report = deploy(local.path(), &mut server, &pp, &opts(), &NoProgress)
            .await
            .unwrap();
        assert!(!report.manifest_changed);
        assert_eq!(report.uploaded, 0);
    }

    #[tokio::test]
    async fn test_mode_dry_run_writes_nothing() {
        let local = tempfile::tempdir().unwrap();
        let remote = tempfile::tempdir().unwrap();
        std::fs::write(local.path().join("a.txt"), b"hello").unwrap();

        let mut server = LocalFsServer::new(remote.path());
        let pp = preprocessor(local.path());
        let mut o = opts();
        o.test_mode = true;
        let report = deploy(local.path(), &mut server, &pp, &o, &NoProgress)
            .await
            .unwrap();

        assert!(report.dry_run);
        assert!(!remote.path().join("a.txt").exists());
    }

    #[tokio::test]
    async fn removed_local_file_is_deleted_remotely_only_with_allow_delete() {
        let local = tempfile::tempdir().unwrap();
        let remote = tempfile::tempdir().unwrap();
        std::fs::write(local.path().join("a.txt"), b"hello").unwrap();
        std::fs::write(local.path().join("b.txt"), b"world").unwrap();

        let mut server = LocalFsServer::new(remote.path());
        let pp = preprocessor(local.path());
        deploy(local.path(), &mut server, &pp, &opts(), &NoProgress)
            .await
            .unwrap();

        std::fs::remove_file(local.path().join("b.txt")).unwrap();

        let mut o = opts();
        o.allow_delete = true;
        let report = deploy(local.path(), &mut server, &pp, &o, &NoProgress)
            .await
            .unwrap();

        assert_eq!(report.deleted, 1);
        assert!(!remote.path().join("b.txt").exists());
        assert!(remote.path().join("a.txt").exists());
    }
}
