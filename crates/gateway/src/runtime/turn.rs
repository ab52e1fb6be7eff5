//! One inbound turn, end to end.
//!
//! Envelope in → session lookup → steering or provider execution → reply
//! dispatched back through the boundary that produced the envelope. The
//! provider event stream is consumed concurrently so usage and context
//! updates land on the session as they arrive.

use std::sync::Arc;

use tokio::sync::mpsc;

use ar_channels::boundary::ChannelBoundary;
use ar_channels::OutboundDispatcher;
use ar_domain::envelope::{AgentRoute, InboundEnvelope, StatusKind};
use ar_domain::error::{Error, ProviderErrorCode, Result};
use ar_domain::event::{DoneReason, ProviderEvent, ProviderEventKind};
use ar_domain::trace::TraceEvent;
use ar_providers::orchestrator::ExecuteRequest;
use ar_providers::ProviderQueryInput;
use ar_sessions::manager::SharedSession;
use ar_sessions::ChatRecord;

use crate::state::AppState;

/// Result of handling one envelope.
#[derive(Debug)]
pub struct TurnOutcome {
    pub session_key: String,
    /// Provider that answered; `None` when the message was buffered.
    pub provider_id: Option<String>,
    pub reply: String,
    pub delivered_message_id: Option<String>,
    /// The session was mid-response; the text went to the steering buffer.
    pub steered: bool,
}

/// Internal result of one provider execution.
pub(crate) struct ProviderTurn {
    pub provider_id: String,
    pub attempts: u32,
    pub reply: String,
}

/// Handle a normalized inbound envelope and dispatch the response.
pub async fn handle_envelope(
    state: &AppState,
    boundary: Arc<dyn ChannelBoundary>,
    envelope: InboundEnvelope,
) -> Result<TurnOutcome> {
    let identity = envelope.identity.session.clone();
    let (primary, _) = state.provider_chain.clone();
    let route = AgentRoute::new(
        identity.clone(),
        boundary.channel_type(),
        envelope.identity.user_id.clone(),
        None,
        primary,
    );

    let shared = state.sessions.get_or_create(&identity);

    // Mid-response messages steer the running query instead of starting a
    // second one.
    {
        let mut session = shared.lock();
        if session.is_running {
            let dropped =
                session.add_steering(envelope.text.clone(), envelope.identity.timestamp_ms);
            if !dropped.is_empty() {
                TraceEvent::SteeringDropped {
                    session_key: session.session_key.clone(),
                    dropped: dropped.len(),
                }
                .emit();
            }
            session.touch();
            return Ok(TurnOutcome {
                session_key: route.session_key.clone(),
                provider_id: None,
                reply: String::new(),
                delivered_message_id: None,
                steered: true,
            });
        }
    }

    let turn = run_provider_turn(
        state,
        &route,
        envelope.text.clone(),
        Some(envelope.identity.message_id.clone()),
    )
    .await;

    let dispatcher = OutboundDispatcher::new(boundary);
    match turn {
        Ok(turn) => {
            tracing::debug!(
                session_key = %route.session_key,
                provider_id = %turn.provider_id,
                attempts = turn.attempts,
                "turn completed"
            );
            let mut delivered_message_id = None;
            if !turn.reply.is_empty() {
                let receipt = dispatcher.send_text(&route, turn.reply.clone()).await?;
                delivered_message_id = Some(receipt.message_id);
            }
            Ok(TurnOutcome {
                session_key: route.session_key,
                provider_id: Some(turn.provider_id),
                reply: turn.reply,
                delivered_message_id,
                steered: false,
            })
        }
        Err(e) => {
            // The adapter's `done{failed}` already streamed; render the
            // user-visible status through the same outbound path.
            if let Err(send_err) = dispatcher
                .send_status(&route, StatusKind::Error, user_facing_error(&e))
                .await
            {
                tracing::warn!(error = %send_err, "failed to deliver error status");
            }
            Err(e)
        }
    }
}

/// Execute one provider query in the session addressed by `route`.
///
/// Shared between channel turns and scheduled jobs — both address sessions
/// by canonical key and capture the dialogue under the storage partition.
pub(crate) async fn run_provider_turn(
    state: &AppState,
    route: &AgentRoute,
    text: String,
    message_id: Option<String>,
) -> Result<ProviderTurn> {
    let shared = state.sessions.get_by_key(&route.session_key)?;

    let (prompt, provider_session_id, working_dir) = {
        let mut session = shared.lock();
        session.is_running = true;
        session.touch();
        let prompt = match session.consume_steering() {
            Some(steering) => format!("{steering}\n---\n{text}"),
            None => text.clone(),
        };
        (
            prompt,
            session.provider_session_id.clone(),
            session.working_dir.clone(),
        )
    };

    let mut user_record = ChatRecord::new("user", &text);
    if let Some(id) = message_id {
        user_record = user_record.with_message_id(id);
    }
    if let Err(e) = state
        .chats
        .append(&route.storage_partition_key, &[user_record])
    {
        tracing::warn!(error = %e, "chat capture failed (user)");
    }

    let (primary, fallback) = state.provider_chain.clone();
    let request = ExecuteRequest {
        primary_provider_id: primary,
        fallback_provider_id: fallback,
        input: ProviderQueryInput {
            prompt,
            session_key: route.session_key.clone(),
            provider_session_id,
            working_dir,
        },
    };

    let (tx, rx) = mpsc::channel(256);
    let collector = tokio::spawn(collect_events(rx, Arc::clone(&shared)));

    let cancel = state.cancel_map.register(&route.session_key);
    let exec_result = tokio::select! {
        result = state.orchestrator.execute(request, tx) => result,
        () = cancel.cancelled() => Err(Error::provider(
            &route.provider_id,
            ProviderErrorCode::Abort,
            "query aborted",
        )),
    };
    state.cancel_map.remove(&route.session_key);

    let collected = collector.await.unwrap_or_default();

    {
        let mut session = shared.lock();
        session.is_running = false;
        session.record_query();
        if let Some(sid) = &collected.provider_session_id {
            session.provider_session_id = Some(sid.clone());
        }
    }

    let outcome = exec_result?;

    if collected.done == Some(DoneReason::Aborted) {
        tracing::info!(session_key = %route.session_key, "query stream ended aborted");
    }

    if !collected.reply.is_empty() {
        if let Err(e) = state.chats.append(
            &route.storage_partition_key,
            &[ChatRecord::new("assistant", &collected.reply)],
        ) {
            tracing::warn!(error = %e, "chat capture failed (assistant)");
        }
    }

    Ok(ProviderTurn {
        provider_id: outcome.provider_id,
        attempts: outcome.attempts,
        reply: collected.reply,
    })
}

#[derive(Default)]
struct Collected {
    reply: String,
    provider_session_id: Option<String>,
    done: Option<DoneReason>,
}

/// Drain the event stream, applying usage/context to the session as events
/// arrive (in emission order, one query at a time).
async fn collect_events(
    mut rx: mpsc::Receiver<ProviderEvent>,
    shared: SharedSession,
) -> Collected {
    let mut collected = Collected::default();
    while let Some(event) = rx.recv().await {
        match event.kind {
            ProviderEventKind::Session {
                provider_session_id,
            } => {
                collected.provider_session_id = Some(provider_session_id);
            }
            ProviderEventKind::Text { delta } => collected.reply.push_str(&delta),
            ProviderEventKind::Tool { name, phase, .. } => {
                tracing::debug!(tool = %name, ?phase, "tool event");
            }
            ProviderEventKind::Usage {
                input_tokens,
                output_tokens,
                ..
            } => {
                shared.lock().apply_usage(input_tokens, output_tokens);
            }
            ProviderEventKind::Context {
                used_tokens,
                max_tokens,
            } => {
                shared.lock().set_context_window(used_tokens, max_tokens);
            }
            ProviderEventKind::RateLimit {
                retry_after_ms,
                status_code,
            } => {
                tracing::debug!(?retry_after_ms, ?status_code, "provider rate limited");
            }
            ProviderEventKind::Done { reason, .. } => collected.done = Some(reason),
        }
    }
    collected
}

fn user_facing_error(e: &Error) -> String {
    match e.provider_code() {
        Some(ProviderErrorCode::RateLimit) => {
            "The assistant is rate-limited right now. Please try again shortly.".into()
        }
        Some(ProviderErrorCode::ContextLimit) => {
            "This conversation is too long for the model. Start a new thread.".into()
        }
        Some(ProviderErrorCode::Abort) => "The request was cancelled.".into(),
        _ => "The assistant could not complete this request.".into(),
    }
}
