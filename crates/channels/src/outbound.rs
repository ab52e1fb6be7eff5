//! Outbound orchestration — one dispatch path for every payload shape.
//!
//! Channels only know how to send text and reactions, so `normalize` folds
//! the richer payloads down first: a status becomes its message text, a
//! choice becomes a numbered list. Text and reaction payloads pass through
//! untouched.

use std::sync::Arc;

use ar_domain::envelope::{
    AgentRoute, ChoiceOption, DeliveryReceipt, OutboundPayload, StatusKind,
};
use ar_domain::error::Result;
use ar_domain::trace::TraceEvent;

use crate::boundary::ChannelBoundary;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Normalizer
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Render a choice payload as plain text: question, blank line, then one
/// `i. label` line per option starting at 1.
pub fn render_choice_text(question: &str, choices: &[ChoiceOption]) -> String {
    let mut text = String::from(question);
    text.push_str("\n\n");
    for (i, choice) in choices.iter().enumerate() {
        if i > 0 {
            text.push('\n');
        }
        text.push_str(&format!("{}. {}", i + 1, choice.label));
    }
    text
}

/// Fold a payload into something a text-and-reaction channel can send.
///
/// Text and reaction payloads are returned unchanged; status and choice
/// become text payloads carrying the same route and correlation id.
pub fn normalize(payload: OutboundPayload) -> OutboundPayload {
    match payload {
        OutboundPayload::Status {
            route,
            message,
            correlation_id,
            ..
        } => OutboundPayload::Text {
            route,
            text: message,
            correlation_id,
        },
        OutboundPayload::Choice {
            route,
            question,
            choices,
            correlation_id,
        } => OutboundPayload::Text {
            route,
            text: render_choice_text(&question, &choices),
            correlation_id,
        },
        passthrough @ (OutboundPayload::Text { .. } | OutboundPayload::Reaction { .. }) => {
            passthrough
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Dispatcher
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Single entry point for everything going back to a channel. Construction
/// binds the dispatcher to the boundary that produced the inbound.
pub struct OutboundDispatcher {
    boundary: Arc<dyn ChannelBoundary>,
}

impl OutboundDispatcher {
    pub fn new(boundary: Arc<dyn ChannelBoundary>) -> Self {
        Self { boundary }
    }

    /// Dispatch one payload through the boundary's `deliver_outbound`.
    pub async fn dispatch(&self, payload: OutboundPayload) -> Result<DeliveryReceipt> {
        let payload_type = match &payload {
            OutboundPayload::Text { .. } => "text",
            OutboundPayload::Status { .. } => "status",
            OutboundPayload::Choice { .. } => "choice",
            OutboundPayload::Reaction { .. } => "reaction",
        };
        let session_key = payload.route().session_key.clone();

        let receipt = self.boundary.deliver_outbound(&payload).await?;

        TraceEvent::OutboundDispatched {
            channel: self.boundary.channel_type().to_owned(),
            session_key,
            payload_type: payload_type.to_owned(),
            message_id: receipt.message_id.clone(),
        }
        .emit();

        Ok(receipt)
    }

    pub async fn send_text(
        &self,
        route: &AgentRoute,
        text: impl Into<String>,
    ) -> Result<DeliveryReceipt> {
        self.dispatch(OutboundPayload::Text {
            route: route.clone(),
            text: text.into(),
            correlation_id: None,
        })
        .await
    }

    pub async fn send_status(
        &self,
        route: &AgentRoute,
        status: StatusKind,
        message: impl Into<String>,
    ) -> Result<DeliveryReceipt> {
        self.dispatch(OutboundPayload::Status {
            route: route.clone(),
            status,
            message: message.into(),
            correlation_id: None,
        })
        .await
    }

    pub async fn send_choice(
        &self,
        route: &AgentRoute,
        question: impl Into<String>,
        choices: Vec<ChoiceOption>,
    ) -> Result<DeliveryReceipt> {
        self.dispatch(OutboundPayload::Choice {
            route: route.clone(),
            question: question.into(),
            choices,
            correlation_id: None,
        })
        .await
    }

    pub async fn send_reaction(
        &self,
        route: &AgentRoute,
        target_message_id: impl Into<String>,
        reaction: impl Into<String>,
    ) -> Result<DeliveryReceipt> {
        self.dispatch(OutboundPayload::Reaction {
            route: route.clone(),
            target_message_id: target_message_id.into(),
            reaction: reaction.into(),
            correlation_id: None,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ar_domain::identity::SessionIdentity;

    fn route() -> AgentRoute {
        let id = SessionIdentity::new("default", "100", "main").unwrap();
        AgentRoute::new(id, "acct", "user-1", None, "claude")
    }

    #[test]
    fn text_passes_through_unchanged() {
        let p = OutboundPayload::Text {
            route: route(),
            text: "hello".into(),
            correlation_id: Some("c".into()),
        };
        match normalize(p) {
            OutboundPayload::Text {
                text,
                correlation_id,
                ..
            } => {
                assert_eq!(text, "hello");
                assert_eq!(correlation_id.as_deref(), Some("c"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn reaction_passes_through_unchanged() {
        let p = OutboundPayload::Reaction {
            route: route(),
            target_message_id: "m1".into(),
            reaction: "👍".into(),
            correlation_id: None,
        };
        assert!(matches!(normalize(p), OutboundPayload::Reaction { .. }));
    }

    #[test]
    fn status_becomes_its_message_text() {
        let p = OutboundPayload::Status {
            route: route(),
            status: StatusKind::Working,
            message: "processing".into(),
            correlation_id: Some("req-7".into()),
        };
        match normalize(p) {
            OutboundPayload::Text {
                text,
                correlation_id,
                ..
            } => {
                assert_eq!(text, "processing");
                assert_eq!(correlation_id.as_deref(), Some("req-7"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn choice_renders_numbered_lines() {
        let p = OutboundPayload::Choice {
            route: route(),
            question: "Deploy now?".into(),
            choices: vec![
                ChoiceOption {
                    id: "yes".into(),
                    label: "Yes, deploy".into(),
                },
                ChoiceOption {
                    id: "no".into(),
                    label: "Hold off".into(),
                },
            ],
            correlation_id: None,
        };
        match normalize(p) {
            OutboundPayload::Text { text, .. } => {
                assert_eq!(text, "Deploy now?\n\n1. Yes, deploy\n2. Hold off");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn choice_with_single_option() {
        let text = render_choice_text(
            "Pick",
            &[ChoiceOption {
                id: "a".into(),
                label: "Only".into(),
            }],
        );
        assert_eq!(text, "Pick\n\n1. Only");
    }
}
