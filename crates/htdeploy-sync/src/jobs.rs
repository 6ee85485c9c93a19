//! JobRunner: sequential, fail-fast execution of pre/post-deploy jobs.
//!
//! `local:` jobs run in the local shell even when partitioned into the
//! "before"/"after" groups that otherwise run after Server contact — the
//! scheme determines *how* a job runs, the partition (local vs.
//! before/after) determines *when* it runs relative to the running
//! marker. See [`partition_local`].

use htdeploy_core::types::Job;
use htdeploy_transport::Server;

/// Split `jobs` into the subset that can run before the Server is ever
/// contacted (`local:` jobs and callbacks) and everything else
/// (`remote:`/`http:`), preserving relative order within each group.
pub fn partition_local(jobs: &[Job]) -> (Vec<Job>, Vec<Job>) {
    let mut local = Vec::new();
    let mut rest = Vec::new();
    for job in jobs {
        if job.is_local_scheme() {
            local.push(job.clone());
        } else {
            rest.push(job.clone());
        }
    }
    (local, rest)
}

/// Run `jobs` in order, aborting on the first failure.
pub async fn run_all(jobs: &[Job], server: &dyn Server) -> anyhow::Result<()> {
    for job in jobs {
        run_one(job, server).await?;
    }
    Ok(())
}

async fn run_one(job: &Job, server: &dyn Server) -> anyhow::Result<()> {
    match job {
        Job::Local(cmd) => run_local(cmd).await,
        Job::Remote(cmd) => {
            let output = server.execute(cmd).await?;
            tracing::debug!(cmd, output, "remote job completed");
            Ok(())
        }
        Job::Http(url) => run_http(url).await,
        Job::Callback(cb) => {
            let cb = cb.clone();
            tokio::task::spawn_blocking(move || cb.run()).await?
        }
    }
}

async fn run_local(cmd: &str) -> anyhow::Result<()> {
    let cmd = cmd.to_string();
    let status = tokio::task::spawn_blocking(move || {
        std::process::Command::new("sh").arg("-c").arg(&cmd).status()
    })
    .await??;

    if !status.success() {
        anyhow::bail!("local job `{cmd}` exited with {status}", cmd = cmd);
    }
    Ok(())
}

async fn run_http(url: &str) -> anyhow::Result<()> {
    let url = url.to_string();
    let response = tokio::task::spawn_blocking(move || {
        reqwest::blocking::Client::new().get(&url).send()
    })
    .await??;

    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("http job `{url}` returned {status}");
    }
    Ok(())
}
