//! Inbound frame decoding
//!
//! Every server frame is a JSON object with a `type` discriminator.
//! [`decode_frame`] turns one raw frame into an [`InboundEvent`] without
//! touching any state, so the dispatch logic in [`super::SessionStream`]
//! stays separate from parsing.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{ChatbotError, Result};

/// One decoded server frame
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// Server acknowledged the stream connection
    ConnectionEstablished,
    /// Echo of a message the user sent
    UserMessage {
        /// Message text
        text: String,
        /// Server timestamp, as sent
        timestamp: Option<String>,
    },
    /// Metadata describing the assistant turn that follows
    AssistantMetadata(Value),
    /// A fragment of the assistant's response
    AssistantChunk(String),
    /// Recommended items for the current turn
    Recommendations(Vec<Value>),
    /// A suggested follow-up question
    FollowUpQuestion(String),
    /// Details of a query the assistant ran this turn
    QueryExecution(Value),
    /// Server-side session state snapshot
    SessionState(Value),
    /// The assistant's response is finished
    ResponseComplete,
    /// Server-reported error
    Error(String),
    /// Frame with a missing or unrecognized `type`
    Unknown(String),
}

impl InboundEvent {
    /// Wire name of the event's `type` tag
    pub fn tag(&self) -> &'static str {
        match self {
            InboundEvent::ConnectionEstablished => "connection_established",
            InboundEvent::UserMessage { .. } => "user_message",
            InboundEvent::AssistantMetadata(_) => "assistant_metadata",
            InboundEvent::AssistantChunk(_) => "assistant_message_chunk",
            InboundEvent::Recommendations(_) => "recommendations",
            InboundEvent::FollowUpQuestion(_) => "follow_up_question",
            InboundEvent::QueryExecution(_) => "query_execution",
            InboundEvent::SessionState(_) => "session_state",
            InboundEvent::ResponseComplete => "response_complete",
            InboundEvent::Error(_) => "error",
            InboundEvent::Unknown(_) => "unknown",
        }
    }
}

#[derive(Debug, Deserialize)]
struct UserMessagePayload {
    #[serde(default)]
    message: String,
    #[serde(default)]
    timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    chunk: String,
}

#[derive(Debug, Deserialize)]
struct RecommendationsPayload {
    #[serde(default)]
    items: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct FollowUpPayload {
    #[serde(default)]
    question: String,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Decode one raw text frame
///
/// # Errors
///
/// Returns `ChatbotError::Decode` if the frame is not valid JSON, or if a
/// recognized event carries fields of the wrong type. A frame without a
/// string `type`, or with a tag this client does not know, decodes to
/// [`InboundEvent::Unknown`].
///
/// # Examples
///
/// ```
/// use chatbot_client::stream::event::{decode_frame, InboundEvent};
///
/// let event = decode_frame(r#"{"type":"assistant_message_chunk","chunk":"Hi"}"#).unwrap();
/// assert_eq!(event, InboundEvent::AssistantChunk("Hi".to_string()));
///
/// let event = decode_frame(r#"{"type":"typing_indicator"}"#).unwrap();
/// assert!(matches!(event, InboundEvent::Unknown(_)));
/// ```
pub fn decode_frame(raw: &str) -> Result<InboundEvent> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| ChatbotError::Decode(format!("malformed frame: {}", e)))?;

    let Some(tag) = value.get("type").and_then(Value::as_str).map(str::to_owned) else {
        return Ok(InboundEvent::Unknown(raw.to_string()));
    };

    let event = match tag.as_str() {
        "connection_established" => InboundEvent::ConnectionEstablished,
        "user_message" => {
            let payload: UserMessagePayload = payload(&tag, value)?;
            InboundEvent::UserMessage {
                text: payload.message,
                timestamp: payload.timestamp,
            }
        }
        "assistant_metadata" => InboundEvent::AssistantMetadata(value),
        "assistant_message_chunk" => {
            let payload: ChunkPayload = payload(&tag, value)?;
            InboundEvent::AssistantChunk(payload.chunk)
        }
        "recommendations" => {
            let payload: RecommendationsPayload = payload(&tag, value)?;
            InboundEvent::Recommendations(payload.items.unwrap_or_default())
        }
        "follow_up_question" => {
            let payload: FollowUpPayload = payload(&tag, value)?;
            InboundEvent::FollowUpQuestion(payload.question)
        }
        "query_execution" => InboundEvent::QueryExecution(value),
        "session_state" => {
            InboundEvent::SessionState(value.get("state").cloned().unwrap_or(Value::Null))
        }
        "response_complete" => InboundEvent::ResponseComplete,
        "error" => {
            let payload: ErrorPayload = payload(&tag, value)?;
            InboundEvent::Error(
                payload
                    .error
                    .or(payload.message)
                    .unwrap_or_else(|| "Unknown error".to_string()),
            )
        }
        _ => InboundEvent::Unknown(raw.to_string()),
    };

    Ok(event)
}

fn payload<T: serde::de::DeserializeOwned>(tag: &str, value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| ChatbotError::Decode(format!("invalid {} frame: {}", tag, e)).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode_kind(raw: &str) -> Option<ChatbotError> {
        match decode_frame(raw) {
            Ok(_) => None,
            Err(e) => e.downcast::<ChatbotError>().ok(),
        }
    }

    #[test]
    fn test_decode_user_message() {
        let event =
            decode_frame(r#"{"type":"user_message","message":"hello","timestamp":"2024-05-01T10:00:00Z"}"#)
                .unwrap();
        assert_eq!(
            event,
            InboundEvent::UserMessage {
                text: "hello".to_string(),
                timestamp: Some("2024-05-01T10:00:00Z".to_string()),
            }
        );
    }

    #[test]
    fn test_decode_chunk() {
        let event = decode_frame(r#"{"type":"assistant_message_chunk","chunk":" there"}"#).unwrap();
        assert_eq!(event, InboundEvent::AssistantChunk(" there".to_string()));
    }

    #[test]
    fn test_decode_opaque_payloads_pass_through() {
        let raw = json!({"type": "query_execution", "query_type": "sql", "result_count": 3});
        let event = decode_frame(&raw.to_string()).unwrap();
        assert_eq!(event, InboundEvent::QueryExecution(raw));

        let raw = json!({"type": "assistant_metadata", "model": "m1"});
        let event = decode_frame(&raw.to_string()).unwrap();
        assert_eq!(event, InboundEvent::AssistantMetadata(raw));
    }

    #[test]
    fn test_decode_session_state_keeps_state_field() {
        let event = decode_frame(r#"{"type":"session_state","state":{"step":2}}"#).unwrap();
        assert_eq!(event, InboundEvent::SessionState(json!({"step": 2})));
    }

    #[test]
    fn test_decode_recommendations_missing_items_is_empty() {
        let event = decode_frame(r#"{"type":"recommendations"}"#).unwrap();
        assert_eq!(event, InboundEvent::Recommendations(Vec::new()));

        let event = decode_frame(r#"{"type":"recommendations","items":null}"#).unwrap();
        assert_eq!(event, InboundEvent::Recommendations(Vec::new()));
    }

    #[test]
    fn test_decode_error_prefers_error_field() {
        let event = decode_frame(r#"{"type":"error","error":"boom","message":"other"}"#).unwrap();
        assert_eq!(event, InboundEvent::Error("boom".to_string()));

        let event = decode_frame(r#"{"type":"error","message":"fallback"}"#).unwrap();
        assert_eq!(event, InboundEvent::Error("fallback".to_string()));
    }

    #[test]
    fn test_decode_unknown_tag_does_not_fail() {
        let raw = r#"{"type":"typing","who":"bot"}"#;
        assert_eq!(decode_frame(raw).unwrap(), InboundEvent::Unknown(raw.to_string()));
    }

    #[test]
    fn test_decode_missing_or_non_string_type_is_unknown() {
        assert!(matches!(decode_frame(r#"{"chunk":"x"}"#).unwrap(), InboundEvent::Unknown(_)));
        assert!(matches!(decode_frame(r#"{"type":7}"#).unwrap(), InboundEvent::Unknown(_)));
        assert!(matches!(decode_frame("[1,2]").unwrap(), InboundEvent::Unknown(_)));
    }

    #[test]
    fn test_decode_malformed_json_is_decode_error() {
        assert!(matches!(decode_kind("{not json"), Some(ChatbotError::Decode(_))));
    }

    #[test]
    fn test_decode_wrong_field_type_is_decode_error() {
        assert!(matches!(
            decode_kind(r#"{"type":"assistant_message_chunk","chunk":42}"#),
            Some(ChatbotError::Decode(_))
        ));
    }

    #[test]
    fn test_payload_error_names_the_frame_type() {
        let err = decode_frame(r#"{"type":"error","error":["not","text"]}"#).unwrap_err();
        assert!(err.to_string().contains("invalid error frame"));

        let err = decode_frame(r#"{"type":"user_message","message":1}"#).unwrap_err();
        assert!(err.to_string().contains("invalid user_message frame"));
    }

    #[test]
    fn test_tag_matches_wire_name() {
        let event = decode_frame(r#"{"type":"follow_up_question","question":"More?"}"#).unwrap();
        assert_eq!(event.tag(), "follow_up_question");
        assert_eq!(InboundEvent::ResponseComplete.tag(), "response_complete");
    }
}
