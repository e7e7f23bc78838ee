//! Workspace commands: clone, fetch, pull, merge, checkout, commit, push.

use anyhow::{bail, Context as _, Result};

use crate::engine::{BatchReport, CheckoutRequest, CommitRequest, Orchestrator, PushOutcome};

pub(super) async fn clone(orchestrator: &mut Orchestrator) -> Result<()> {
    let report = orchestrator.clone().await.context("clone failed")?;
    // Clone fills in module paths and branch lists.
    orchestrator
        .save_registry()
        .context("failed to save registry")?;
    finish(&report)
}

pub(super) async fn fetch(orchestrator: &mut Orchestrator) -> Result<()> {
    let report = orchestrator.fetch().await.context("fetch failed")?;
    finish(&report)
}

pub(super) async fn pull(orchestrator: &mut Orchestrator) -> Result<()> {
    let report = orchestrator.pull().await.context("pull failed")?;
    finish(&report)
}

pub(super) async fn merge(orchestrator: &mut Orchestrator, source: &str) -> Result<()> {
    let report = orchestrator.merge(source).await.context("merge failed")?;
    finish(&report)
}

pub(super) async fn checkout(
    orchestrator: &mut Orchestrator,
    remote_branch: String,
    branch: Option<String>,
    safe: bool,
) -> Result<()> {
    let mut request = CheckoutRequest::new(remote_branch);
    if let Some(branch) = branch {
        request = request.with_branch(branch);
    }
    if safe {
        request = request.safe();
    }

    let report = orchestrator
        .checkout(request)
        .await
        .context("checkout failed")?;
    if report.all_succeeded() {
        orchestrator
            .save_registry()
            .context("failed to save registry")?;
    }
    finish(&report)
}

pub(super) async fn commit(
    orchestrator: &mut Orchestrator,
    label: String,
    message: String,
) -> Result<()> {
    let report = orchestrator
        .commit(CommitRequest::new(label, message))
        .await
        .context("commit failed")?;

    for (module, oid) in report.succeeded() {
        match oid {
            Some(oid) => println!("{}: {}", module, oid),
            None => println!("{}: nothing to commit", module),
        }
    }
    finish(&report)
}

pub(super) async fn push(orchestrator: &mut Orchestrator) -> Result<()> {
    match orchestrator.push().await.context("push failed")? {
        PushOutcome::Skipped => {
            println!("Push skipped");
            Ok(())
        }
        PushOutcome::Completed(report) => finish(&report),
    }
}

/// Summarize a batch; any failed module fails the command.
fn finish<T>(report: &BatchReport<T>) -> Result<()> {
    let failed = report.failure_count();
    let total = report.results.len();
    println!(
        "{}: {} of {} module(s) succeeded",
        report.operation,
        total - failed,
        total
    );
    if failed > 0 {
        bail!("{} of {} module(s) failed", failed, total);
    }
    Ok(())
}
