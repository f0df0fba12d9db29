//! Fire-and-forget compatibility checks.
//!
//! Checks run on their own task and report back over a channel that the
//! session loop drains, so a slow provider never holds up a turn.

use interview_core::{
    compatibility::{CheckKind, CompatibilityChecker, CompatibilityReport},
    history::Turn,
    metadata::InterviewMetadata,
};
use std::sync::Arc;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{Instrument, debug, info_span};

/// A finished check, successful or not.
#[derive(Debug)]
pub struct ProbeResult {
    pub kind: CheckKind,
    pub report: anyhow::Result<CompatibilityReport>,
}

/// Starts a check in the background.
///
/// `transcript` is only consulted by the full check.
pub fn spawn_probe(
    kind: CheckKind,
    checker: Arc<dyn CompatibilityChecker>,
    metadata: InterviewMetadata,
    transcript: Vec<Turn>,
    results: mpsc::Sender<ProbeResult>,
) -> JoinHandle<()> {
    let span = info_span!("compatibility_probe", ?kind);
    tokio::spawn(
        async move {
            let report = match kind {
                CheckKind::Quick => checker.quick_check(&metadata).await,
                CheckKind::Full => checker.full_check(&metadata, &transcript).await,
            };
            if results.send(ProbeResult { kind, report }).await.is_err() {
                debug!("Session closed before the compatibility check finished");
            }
        }
        .instrument(span),
    )
}
