//! Contains the logic for producing one streamed interviewer reply.

use super::{protocol::ServerFrame, writer::FrameWriter};
use anyhow::{Result, bail};
use futures_util::StreamExt;
use interview_core::{
    history::Turn,
    llm_client::{LLMClient, LLMStreamEvent},
    retry::{RetryPolicy, retry_with_backoff},
};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Spoken when every completion attempt has failed.
pub const FALLBACK_APOLOGY: &str = "I'm sorry, I'm having a little trouble on my end. \
Could you please repeat that?";

/// What a generation task hands back to the session once it is done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// The model's reply, already streamed to the platform.
    Completed(String),
    /// The fallback apology that was spoken instead.
    Fallback(String),
}

impl GenerationOutcome {
    /// Text to record as the assistant turn.
    pub fn text(&self) -> &str {
        match self {
            GenerationOutcome::Completed(text) | GenerationOutcome::Fallback(text) => text,
        }
    }
}

/// Everything a generation task needs, owned so it can run on its own task.
pub struct GenerationRequest {
    pub llm_client: Arc<dyn LLMClient>,
    pub history: Vec<Turn>,
    pub writer: FrameWriter,
    pub response_id: u64,
    pub retry: RetryPolicy,
}

/// Generates and streams the next assistant turn.
///
/// This involves:
/// 1.  Opening a streaming completion over the supplied history.
/// 2.  Forwarding every fragment as its own frame as soon as it arrives.
/// 3.  Retrying with backoff when an attempt fails before anything was spoken.
/// 4.  Closing the turn with an empty completion frame, or speaking a single
///     apology if every attempt failed.
#[instrument(name = "generate_reply", skip_all, fields(response_id = request.response_id))]
pub async fn generate_reply(request: GenerationRequest) -> GenerationOutcome {
    let GenerationRequest {
        llm_client,
        history,
        writer,
        response_id,
        retry,
    } = request;
    let llm = llm_client.as_ref();
    let history = history.as_slice();
    let writer_ref = &writer;

    let result = retry_with_backoff(&retry, move |attempt| {
        stream_attempt(llm, history, writer_ref, response_id, attempt)
    })
    .await;

    match result {
        Ok(text) => {
            if let Err(e) = writer.finish(response_id).await {
                warn!(error = %e, "Could not send completion marker");
            }
            GenerationOutcome::Completed(text)
        }
        Err(e) => {
            warn!(error = %e, "Completion failed on every attempt, apologizing");
            if let Err(e) = writer
                .send(ServerFrame::complete(response_id, FALLBACK_APOLOGY, None))
                .await
            {
                warn!(error = %e, "Could not send fallback apology");
            }
            GenerationOutcome::Fallback(FALLBACK_APOLOGY.to_string())
        }
    }
}

/// One completion attempt.
///
/// Fails (and so becomes retryable) only while nothing has been forwarded.
/// Once fragments have been spoken, a broken stream ends the turn with what
/// was already said instead of repeating it.
async fn stream_attempt(
    llm: &dyn LLMClient,
    history: &[Turn],
    writer: &FrameWriter,
    response_id: u64,
    attempt: u32,
) -> Result<String> {
    let mut stream = llm.stream_reply(history).await?;
    let mut full_response = String::new();

    while let Some(event) = stream.next().await {
        match event {
            Ok(LLMStreamEvent::TextChunk(chunk)) => {
                writer.chunk(response_id, chunk.clone()).await?;
                full_response.push_str(&chunk);
            }
            Err(e) if full_response.is_empty() => return Err(e),
            Err(e) => {
                warn!(attempt, error = %e, "Completion stream broke mid-reply, keeping partial text");
                break;
            }
        }
    }

    if full_response.trim().is_empty() {
        bail!("completion stream produced no text");
    }
    info!(attempt, chars = full_response.len(), "Reply streamed");
    Ok(full_response)
}
