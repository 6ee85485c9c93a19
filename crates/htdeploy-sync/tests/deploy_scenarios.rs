//! End-to-end deploy scenarios against a filesystem-backed `Server`,
//! standing a second `tempfile::TempDir` in for a real remote endpoint.

use htdeploy_core::types::Job;
use htdeploy_core::NoProgress;
use htdeploy_sync::preprocess::{FilterRegistry, Preprocessor};
use htdeploy_sync::{deploy, DeployOptions};
use htdeploy_transport::LocalFsServer;
use std::path::Path;

fn preprocessor(tmp: &Path) -> Preprocessor {
    Preprocessor::new(FilterRegistry::new(), vec![], tmp.join("pp"))
}

fn base_opts() -> DeployOptions {
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
async fn s1_first_deploy_stages_and_commits_everything() {
    let local = tempfile::tempdir().unwrap();
    let remote = tempfile::tempdir().unwrap();
    std::fs::write(local.path().join("a.txt"), b"hello").unwrap();
    std::fs::create_dir(local.path().join("sub")).unwrap();
    std::fs::write(local.path().join("sub/b.txt"), b"world").unwrap();

    let mut server = LocalFsServer::new(remote.path());
    let pp = preprocessor(local.path());
    let report = deploy(local.path(), &mut server, &pp, &base_opts(), &NoProgress)
        .await
        .unwrap();

    assert_eq!(report.uploaded, 4); // sub/, sub/b.txt, a.txt, manifest
    assert!(remote.path().join("a.txt").exists());
    assert!(remote.path().join("sub/b.txt").exists());
    assert!(remote.path().join(".htdeployment").exists());
    assert!(!remote.path().join(".htdeployment.running").exists());
    assert!(!remote.path().join("a.txt.deploytmp").exists());
}

#[tokio::test]
async fn s2_idempotent_redeploy_is_a_noop() {
    let local = tempfile::tempdir().unwrap();
    let remote = tempfile::tempdir().unwrap();
    std::fs::write(local.path().join("a.txt"), b"hello").unwrap();
    std::fs::create_dir(local.path().join("sub")).unwrap();
    std::fs::write(local.path().join("sub/b.txt"), b"world").unwrap();

    let mut server = LocalFsServer::new(remote.path());
    let pp = preprocessor(local.path());
    deploy(local.path(), &mut server, &pp, &base_opts(), &NoProgress)
        .await
        .unwrap();

    let report = deploy(local.path(), &mut server, &pp, &base_opts(), &NoProgress)
        .await
        .unwrap();

    assert!(!report.manifest_changed);
    assert_eq!(report.uploaded, 0);
    assert!(!remote.path().join(".htdeployment.running").exists());
}

#[tokio::test]
async fn s3_modified_file_reuploads_only_that_file_and_manifest() {
    let local = tempfile::tempdir().unwrap();
    let remote = tempfile::tempdir().unwrap();
    std::fs::write(local.path().join("a.txt"), b"hello").unwrap();

    let mut server = LocalFsServer::new(remote.path());
    let pp = preprocessor(local.path());
    deploy(local.path(), &mut server, &pp, &base_opts(), &NoProgress)
        .await
        .unwrap();

    std::fs::write(local.path().join("a.txt"), b"hello, changed").unwrap();
    let report = deploy(local.path(), &mut server, &pp, &base_opts(), &NoProgress)
        .await
        .unwrap();

    assert_eq!(report.uploaded, 2); // a.txt + manifest
    assert_eq!(
        std::fs::read(remote.path().join("a.txt")).unwrap(),
        b"hello, changed"
    );
}

#[tokio::test]
async fn s4_delete_is_gated_by_allow_delete() {
    let local = tempfile::tempdir().unwrap();
    let remote = tempfile::tempdir().unwrap();
    std::fs::create_dir(local.path().join("sub")).unwrap();
    std::fs::write(local.path().join("sub/b.txt"), b"world").unwrap();

    let mut server = LocalFsServer::new(remote.path());
    let pp = preprocessor(local.path());
    deploy(local.path(), &mut server, &pp, &base_opts(), &NoProgress)
        .await
        .unwrap();

    std::fs::remove_file(local.path().join("sub/b.txt")).unwrap();

    // allowDelete=false: manifest updates, nothing is removed remotely.
    let report = deploy(local.path(), &mut server, &pp, &base_opts(), &NoProgress)
        .await
        .unwrap();
    assert!(report.manifest_changed);
    assert_eq!(report.deleted, 0);
    assert!(remote.path().join("sub/b.txt").exists());

    // allowDelete=true: the stale file and now-empty dir are removed.
    let mut o = base_opts();
    o.allow_delete = true;
    let report = deploy(local.path(), &mut server, &pp, &o, &NoProgress)
        .await
        .unwrap();
    assert_eq!(report.deleted, 2);
    assert!(!remote.path().join("sub/b.txt").exists());
    assert!(!remote.path().join("sub").exists());
}

#[tokio::test]
async fn s5_pattern_negation_keeps_only_the_negated_file() {
    let local = tempfile::tempdir().unwrap();
    let remote = tempfile::tempdir().unwrap();
    std::fs::write(local.path().join("a.log"), b"drop me").unwrap();
    std::fs::write(local.path().join("keep.log"), b"keep me").unwrap();

    let mut server = LocalFsServer::new(remote.path());
    let pp = preprocessor(local.path());
    let mut opts = base_opts();
    opts.ignore = vec!["*.log".to_string(), "!keep.log".to_string()];

    deploy(local.path(), &mut server, &pp, &opts, &NoProgress)
        .await
        .unwrap();

    assert!(!remote.path().join("a.log").exists());
    assert!(remote.path().join("keep.log").exists());
}

#[tokio::test]
async fn s6_prejob_failure_aborts_before_any_upload() {
    let local = tempfile::tempdir().unwrap();
    let remote = tempfile::tempdir().unwrap();
    std::fs::write(local.path().join("a.txt"), b"hello").unwrap();

    let mut server = LocalFsServer::new(remote.path());
    let pp = preprocessor(local.path());
    let mut opts = base_opts();
    opts.before_jobs = vec![Job::Local("true".into()), Job::Local("false".into())];

    let result = deploy(local.path(), &mut server, &pp, &opts, &NoProgress).await;

    assert!(result.is_err());
    assert!(!remote.path().join("a.txt").exists());
    assert!(!remote.path().join(".htdeployment").exists());
    assert!(!remote.path().join(".htdeployment.running").exists());
}
