//! Per-call protocol state machine.
//!
//! A [`Session`] owns everything about one call: the conversation history,
//! the interview clock, reminder and compatibility bookkeeping, and the handle
//! of the reply currently being generated. Inbound events are handled one at
//! a time; the only work that outlives an event is the in-flight reply and
//! the background compatibility checks, both of which report back through
//! [`Session::run`]'s select loop.

use super::{
    cycle::{GenerationOutcome, GenerationRequest, generate_reply},
    prober::{ProbeResult, spawn_probe},
    protocol::{EndOfCall, EndReason, GREETING_RESPONSE_ID, InboundEvent, last_user_utterance},
    writer::FrameWriter,
};
use crate::state::AppState;
use anyhow::Result;
use futures_util::{Stream, StreamExt};
use interview_core::{
    compatibility::{CheckKind, Verdict},
    history::HistoryBuffer,
    metadata::InterviewMetadata,
    outcome::CallOutcome,
    timer::{EXPIRED_MESSAGE, TimerCheck, TurnTimer},
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::{
    sync::mpsc,
    task::{JoinError, JoinHandle},
};
use tracing::{Instrument, debug, error, info, warn};

/// Reminders in escalating order; the last one repeats if more are allowed.
pub const REMINDER_MESSAGES: &[&str] = &[
    "Sorry, I didn't quite catch that. Could you please repeat your answer?",
    "Take your time, there's no rush at all. Whenever you're ready, go ahead.",
];

pub const SILENCE_FAREWELL: &str = "It seems we may have lost you. \
Thank you for your time today, feel free to start a new practice session whenever you're ready. Goodbye!";

pub const INCOMPATIBILITY_FAREWELL: &str = "Thank you for your time today. \
Based on your background, this role looks quite different from your experience, \
so let's stop here. I'd encourage you to practice for a role closer to your profile. Goodbye!";

pub const MISMATCH_FAREWELL: &str = "Thanks for walking me through your experience. \
It sounds like this position is a long way from what you've been doing, so let's wrap up here. \
Good luck with your search. Goodbye!";

const PROBE_BUFFER: usize = 4;

/// Where a call is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingSetup,
    Active,
    Ended,
}

pub struct Session {
    call_id: String,
    phase: Phase,
    state: Arc<AppState>,
    writer: FrameWriter,
    history: HistoryBuffer,
    timer: TurnTimer,
    metadata: Option<InterviewMetadata>,
    next_response_id: u64,
    greeted: bool,
    reminders: u32,
    exchanges: u32,
    in_flight: Option<JoinHandle<GenerationOutcome>>,
    verdict: Verdict,
    full_check_started: bool,
    pending_termination: Option<EndReason>,
    end_reason: Option<EndReason>,
    probe_tx: mpsc::Sender<ProbeResult>,
    probe_rx: mpsc::Receiver<ProbeResult>,
}

impl Session {
    /// Creates a session for a freshly opened connection and starts its clock.
    pub fn new(call_id: impl Into<String>, state: Arc<AppState>, writer: FrameWriter) -> Self {
        let settings = state.settings.clone();
        let (probe_tx, probe_rx) = mpsc::channel(PROBE_BUFFER);
        Self {
            call_id: call_id.into(),
            phase: Phase::AwaitingSetup,
            state,
            writer,
            history: HistoryBuffer::new(settings.history_cap),
            timer: TurnTimer::from_minutes(
                settings.max_duration_minutes,
                settings.warning_minutes,
            ),
            metadata: None,
            next_response_id: GREETING_RESPONSE_ID + 1,
            greeted: false,
            reminders: 0,
            exchanges: 0,
            in_flight: None,
            verdict: Verdict::NotChecked,
            full_check_started: false,
            pending_termination: None,
            end_reason: None,
            probe_tx,
            probe_rx,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    pub fn verdict(&self) -> &Verdict {
        &self.verdict
    }

    pub fn is_generating(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Sends the handshake frame. Must be the first thing on the wire.
    pub async fn open(&mut self) -> Result<()> {
        self.writer.config().await
    }

    /// Drives the session until the inbound stream ends.
    pub async fn run<S>(mut self, inbound: S) -> CallOutcome
    where
        S: Stream<Item = String>,
    {
        let mut inbound = std::pin::pin!(inbound);
        loop {
            tokio::select! {
                biased;
                Some(result) = self.probe_rx.recv() => self.apply_probe(result),
                outcome = wait_generation(&mut self.in_flight) => self.finish_generation(outcome),
                frame = inbound.next() => match frame {
                    Some(text) => self.handle_text(&text).await,
                    None => break,
                },
            }
        }
        self.close()
    }

    /// Decodes one inbound text frame and dispatches it.
    ///
    /// Malformed frames are logged and dropped; the connection stays open.
    pub async fn handle_text(&mut self, text: &str) {
        let raw: Value = match serde_json::from_str(text) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Dropping inbound frame that is not valid JSON");
                return;
            }
        };
        match InboundEvent::deserialize(&raw) {
            Ok(event) => self.handle_event(event, &raw).await,
            Err(e) => warn!(error = %e, "Dropping inbound frame with an unreadable shape"),
        }
    }

    pub async fn handle_event(&mut self, event: InboundEvent, raw: &Value) {
        let kind = event.kind();
        let result = match event {
            InboundEvent::PingPong { timestamp } => self.writer.pong(timestamp).await,
            InboundEvent::CallDetails { .. } => self.setup(raw).await,
            InboundEvent::UpdateOnly { transcript } => {
                debug!(entries = transcript.len(), "Transcript update, no reply owed");
                self.ensure_setup(raw).await
            }
            InboundEvent::ResponseRequired {
                response_id,
                transcript,
            } => {
                self.respond(response_id, last_user_utterance(&transcript), raw)
                    .await
            }
            InboundEvent::ReminderRequired { response_id, .. } => {
                self.remind(response_id, raw).await
            }
            InboundEvent::Unknown => {
                warn!("Ignoring inbound event of unknown kind");
                Ok(())
            }
        };
        if let Err(e) = result {
            error!(error = ?e, kind, "Failed to handle inbound event");
        }
    }

    /// Handles call setup. Only the first occurrence has any effect.
    async fn setup(&mut self, raw: &Value) -> Result<()> {
        if self.greeted {
            debug!("Ignoring repeated call setup");
            return Ok(());
        }

        let mut metadata = InterviewMetadata::from_event(raw);
        if metadata.call_id.is_none() {
            metadata.call_id = Some(self.call_id.clone());
        }
        info!(
            candidate = ?metadata.candidate_name,
            role = ?metadata.role,
            company = ?metadata.company,
            language = %metadata.language,
            domain = %metadata.domain,
            "Call set up"
        );

        spawn_probe(
            CheckKind::Quick,
            self.state.compatibility.clone(),
            metadata.clone(),
            Vec::new(),
            self.probe_tx.clone(),
        );

        let system_prompt = self.state.prompts.system_prompt(&metadata);
        let greeting = self.state.prompts.greeting(&metadata);
        self.history.set_system(system_prompt);
        self.metadata = Some(metadata);
        self.greeted = true;
        self.phase = Phase::Active;

        self.say(GREETING_RESPONSE_ID, &greeting, None).await
    }

    /// Synthesizes setup from a turn event when no setup event ever arrived.
    async fn ensure_setup(&mut self, raw: &Value) -> Result<()> {
        if self.phase == Phase::AwaitingSetup {
            info!("Turn event arrived before call setup, setting up from it");
            self.setup(raw).await?;
        }
        Ok(())
    }

    /// The primary turn-taking path.
    async fn respond(
        &mut self,
        response_id: Option<u64>,
        user_text: Option<&str>,
        raw: &Value,
    ) -> Result<()> {
        self.ensure_setup(raw).await?;
        if self.phase == Phase::Ended {
            debug!(?response_id, "Call already ended, no reply");
            return Ok(());
        }
        if self.in_flight.is_some() {
            warn!(?response_id, "Reply already in flight, dropping overlapping request");
            return Ok(());
        }

        if let Some(text) = user_text {
            self.reminders = 0;
            self.exchanges += 1;
            self.history.push_user(text);
        }
        let id = self.allocate_response_id(response_id);

        match self.timer.check() {
            TimerCheck::Expired => {
                return self
                    .end_call(id, EXPIRED_MESSAGE, EndOfCall::after_spoken(EndReason::MaxDuration))
                    .await;
            }
            TimerCheck::Warn => {
                info!(remaining = ?self.timer.remaining(), "Warning candidate about time");
                let warning = self.timer.warning_message();
                return self.say(id, &warning, None).await;
            }
            TimerCheck::Running => {}
        }

        if let Some(reason) = self.pending_termination {
            let farewell = match reason {
                EndReason::Mismatch => MISMATCH_FAREWELL,
                _ => INCOMPATIBILITY_FAREWELL,
            };
            return self
                .end_call(id, farewell, EndOfCall::interruptible(reason))
                .await;
        }

        self.maybe_start_full_check();

        let pruned = self.history.prune();
        if pruned > 0 {
            debug!(pruned, "Pruned history before generating");
        }

        let request = GenerationRequest {
            llm_client: self.state.llm_client.clone(),
            history: self.history.snapshot(),
            writer: self.writer.clone(),
            response_id: id,
            retry: self.state.settings.retry,
        };
        self.in_flight = Some(tokio::spawn(
            generate_reply(request).in_current_span(),
        ));
        Ok(())
    }

    /// Nudges a silent caller, ending the call once the limit is reached.
    async fn remind(&mut self, response_id: Option<u64>, raw: &Value) -> Result<()> {
        self.ensure_setup(raw).await?;
        if self.phase == Phase::Ended {
            return Ok(());
        }
        if self.in_flight.is_some() {
            debug!(?response_id, "Reply in flight, skipping reminder");
            return Ok(());
        }

        self.reminders += 1;
        let id = self.allocate_response_id(response_id);
        if self.reminders >= self.state.settings.max_reminders {
            info!(reminders = self.reminders, "Caller stayed silent, ending call");
            return self
                .end_call(id, SILENCE_FAREWELL, EndOfCall::after_spoken(EndReason::Silence))
                .await;
        }

        let index = (self.reminders as usize - 1).min(REMINDER_MESSAGES.len() - 1);
        self.say(id, REMINDER_MESSAGES[index], None).await
    }

    /// Echoes the platform's identifier when given, otherwise counts on from
    /// the last one used.
    fn allocate_response_id(&mut self, inbound: Option<u64>) -> u64 {
        let id = inbound.unwrap_or(self.next_response_id);
        self.next_response_id = self.next_response_id.max(id.saturating_add(1));
        id
    }

    /// Speaks a complete message and keeps the history within its cap.
    async fn say(&mut self, id: u64, text: &str, end: Option<EndOfCall>) -> Result<()> {
        let sent = self.writer.speak(&mut self.history, id, text, end).await;
        self.history.prune();
        sent
    }

    async fn end_call(&mut self, id: u64, farewell: &str, end: EndOfCall) -> Result<()> {
        info!(reason = %end.reason, response_id = id, "Ending call");
        self.phase = Phase::Ended;
        self.end_reason = Some(end.reason);
        self.say(id, farewell, Some(end)).await
    }

    /// Starts the one full compatibility check once enough turns have passed.
    fn maybe_start_full_check(&mut self) {
        if self.full_check_started
            || (self.exchanges as usize) < self.state.settings.full_check_after_turns
        {
            return;
        }
        let Some(metadata) = self.metadata.clone() else {
            return;
        };
        self.full_check_started = true;
        info!(exchanges = self.exchanges, "Starting full compatibility check");
        spawn_probe(
            CheckKind::Full,
            self.state.compatibility.clone(),
            metadata,
            self.history.snapshot(),
            self.probe_tx.clone(),
        );
    }

    fn apply_probe(&mut self, result: ProbeResult) {
        if self.phase == Phase::Ended {
            debug!(kind = ?result.kind, "Ignoring compatibility result for an ended call");
            return;
        }
        match result.report {
            Err(e) => {
                warn!(kind = ?result.kind, error = ?e, "Compatibility check failed, continuing without a verdict");
            }
            Ok(report) => {
                let terminate = self
                    .state
                    .compatibility_policy
                    .should_terminate(result.kind, &report);
                info!(
                    kind = ?result.kind,
                    compatible = report.compatible,
                    confidence = report.confidence,
                    severity = ?report.severity,
                    terminate,
                    "Compatibility verdict"
                );
                if terminate && self.pending_termination.is_none() {
                    self.pending_termination = Some(match result.kind {
                        CheckKind::Quick => EndReason::Incompatibility,
                        CheckKind::Full => EndReason::Mismatch,
                    });
                }
                self.verdict = Verdict::from_report(report);
            }
        }
    }

    /// Records a finished reply and releases the in-flight guard.
    fn finish_generation(&mut self, outcome: Result<GenerationOutcome, JoinError>) {
        self.in_flight = None;
        match outcome {
            Ok(outcome) => {
                if let GenerationOutcome::Fallback(_) = outcome {
                    warn!("Spoke fallback apology instead of a reply");
                }
                self.history.push_assistant(outcome.text());
                self.history.prune();
            }
            Err(e) => error!(error = %e, "Reply generation task failed"),
        }
    }

    /// Tears down background work and classifies how the call went.
    fn close(mut self) -> CallOutcome {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
        let reason = self.end_reason.map(|r| r.to_string());
        let outcome = self.state.settings.outcome.classify(
            self.timer.elapsed(),
            self.exchanges,
            reason.as_deref(),
        );
        info!(
            %outcome,
            elapsed = ?self.timer.elapsed(),
            exchanges = self.exchanges,
            verdict_checked = self.verdict.is_checked(),
            "Call finished"
        );
        outcome
    }
}

/// Resolves when the in-flight reply finishes; pends forever when idle.
async fn wait_generation(
    in_flight: &mut Option<JoinHandle<GenerationOutcome>>,
) -> Result<GenerationOutcome, JoinError> {
    match in_flight.as_mut() {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}
