//! Session stream state machine
//!
//! [`SessionStream`] owns one session's live connection. It turns transport
//! lifecycle events and inbound frames into [`DisplayCommand`]s, and turns
//! user text into outbound frames.
//!
//! ```text
//! Disconnected --open--> Connecting --on_open--> Connected --on_error--> Errored
//!      ^                     |                       |                      |
//!      +------------------on_close-------------------+----------------------+
//! ```
//!
//! The stream performs no I/O of its own beyond handing frames to the
//! [`Transport`]; the caller pumps [`TransportEvent`]s from the
//! [`ConnectionHandle`] into [`SessionStream::handle`] and renders whatever
//! comes back.

pub mod display;
pub mod event;

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::error::{ChatbotError, Result, AUTH_REJECTED_CLOSE_CODE};
use crate::session::{AuthDescriptor, Session};
use crate::transport::{stream_url, Connector, EventReceiver, Transport, TransportEvent};

pub use display::{ConnectionState, DisplayCommand, Role};
pub use event::{decode_frame, InboundEvent};

/// Returned by [`SessionStream::open`]
#[derive(Debug)]
pub struct ConnectionHandle {
    /// The stream URL that was dialed
    pub url: Url,
    /// Lifecycle events of the connection, in arrival order
    pub events: EventReceiver,
}

/// Text of the assistant message currently streaming
///
/// Exists only between the first chunk of a turn and the `response_complete`
/// that ends it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssistantDraft {
    content: String,
}

impl AssistantDraft {
    /// Accumulated text so far
    pub fn content(&self) -> &str {
        &self.content
    }

    fn push(&mut self, chunk: &str) {
        self.content.push_str(chunk);
    }

    fn freeze(self) -> String {
        self.content
    }
}

#[derive(Serialize)]
struct OutboundFrame<'a> {
    message: &'a str,
}

/// One session's live connection and per-turn state
pub struct SessionStream {
    base_url: Url,
    connector: Arc<dyn Connector>,
    state: ConnectionState,
    transport: Option<Arc<dyn Transport>>,
    close_requested: bool,
    session: Option<Session>,
    draft: Option<AssistantDraft>,
    last_assistant_message: Option<String>,
    metadata: Option<Value>,
    query_execution: Option<Value>,
    last_close: Option<(u16, String)>,
}

impl std::fmt::Debug for SessionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStream")
            .field("base_url", &self.base_url.as_str())
            .field("state", &self.state)
            .field("session", &self.session.as_ref().map(|s| s.id.as_str()))
            .field("close_requested", &self.close_requested)
            .finish()
    }
}

impl SessionStream {
    /// Create a disconnected stream for the server at `base_url`
    pub fn new(base_url: Url, connector: Arc<dyn Connector>) -> Self {
        Self {
            base_url,
            connector,
            state: ConnectionState::Disconnected,
            transport: None,
            close_requested: false,
            session: None,
            draft: None,
            last_assistant_message: None,
            metadata: None,
            query_execution: None,
            last_close: None,
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Session the stream was last opened for
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Record the session resource reported by a session load
    pub fn set_resource(&mut self, resource_id: &str) {
        if let Some(session) = self.session.as_mut() {
            session.replace_resource(resource_id);
        }
    }

    /// Assistant message currently streaming, if any
    pub fn draft(&self) -> Option<&AssistantDraft> {
        self.draft.as_ref()
    }

    /// Text of the most recently completed assistant message
    pub fn last_assistant_message(&self) -> Option<&str> {
        self.last_assistant_message.as_deref()
    }

    /// Metadata stored for the current turn
    pub fn metadata(&self) -> Option<&Value> {
        self.metadata.as_ref()
    }

    /// Query execution stored for the current turn
    pub fn query_execution(&self) -> Option<&Value> {
        self.query_execution.as_ref()
    }

    /// Code and reason of the last close, if the stream has closed
    pub fn last_close(&self) -> Option<(u16, &str)> {
        self.last_close
            .as_ref()
            .map(|(code, reason)| (*code, reason.as_str()))
    }

    /// Start connecting to the stream for `session_id`
    ///
    /// Any live connection is closed first and all per-turn state is reset.
    ///
    /// # Errors
    ///
    /// Returns `ChatbotError::MissingSession` without dialing when
    /// `session_id` is empty, or a config error if the stream URL cannot be
    /// derived from the base URL.
    pub fn open(&mut self, session_id: &str, auth: AuthDescriptor) -> Result<ConnectionHandle> {
        if session_id.trim().is_empty() {
            return Err(ChatbotError::MissingSession.into());
        }

        let url = stream_url(&self.base_url, session_id, &auth)?;

        if let Some(previous) = self.transport.take() {
            tracing::debug!("Closing previous stream before reopening");
            previous.close();
        }

        let resource_id = self
            .session
            .as_ref()
            .filter(|s| s.id == session_id)
            .map(|s| s.resource_id.clone())
            .unwrap_or_default();
        self.session = Some(Session::new(session_id, resource_id, auth));
        self.reset_turn();
        self.close_requested = false;
        self.last_close = None;

        let (transport, events) = self.connector.connect(&url);
        self.transport = Some(transport);
        self.state = ConnectionState::Connecting;
        tracing::info!("Opening stream for session {}", session_id);

        Ok(ConnectionHandle { url, events })
    }

    /// Dispatch one transport event
    ///
    /// # Errors
    ///
    /// Propagates decode errors from [`SessionStream::on_frame`].
    pub fn handle(&mut self, event: TransportEvent) -> Result<Vec<DisplayCommand>> {
        match event {
            TransportEvent::Opened => Ok(self.on_open()),
            TransportEvent::Frame(raw) => self.on_frame(&raw),
            TransportEvent::Error(err) => Ok(self.on_error(&err)),
            TransportEvent::Closed { code, reason } => Ok(self.on_close(code, &reason)),
        }
    }

    /// The transport finished its handshake
    pub fn on_open(&mut self) -> Vec<DisplayCommand> {
        if self.close_requested || self.state != ConnectionState::Connecting {
            tracing::debug!("Ignoring open in state {:?}", self.state);
            return Vec::new();
        }

        self.state = ConnectionState::Connected;
        tracing::info!("Stream connected");
        vec![
            DisplayCommand::Status(ConnectionState::Connected),
            DisplayCommand::Ready,
            DisplayCommand::System("WebSocket connected. Ready to chat.".to_string()),
        ]
    }

    /// One inbound text frame arrived
    ///
    /// Frames that arrive while not connected, or after [`SessionStream::close`]
    /// was called, are dropped.
    ///
    /// # Errors
    ///
    /// Returns `ChatbotError::Decode` for malformed frames. Stream state is
    /// left unchanged in that case.
    pub fn on_frame(&mut self, raw: &str) -> Result<Vec<DisplayCommand>> {
        if self.close_requested || self.state != ConnectionState::Connected {
            tracing::debug!("Dropping frame received in state {:?}", self.state);
            return Ok(Vec::new());
        }

        let event = decode_frame(raw)?;
        tracing::debug!("Received {} event", event.tag());
        Ok(self.dispatch(event))
    }

    /// The transport reported an error
    pub fn on_error(&mut self, err: &str) -> Vec<DisplayCommand> {
        tracing::warn!("Stream error: {}", err);
        self.state = ConnectionState::Errored;
        vec![
            DisplayCommand::Status(ConnectionState::Errored),
            DisplayCommand::ConnectionError(format!("WebSocket error: {}", err)),
        ]
    }

    /// The connection closed
    pub fn on_close(&mut self, code: u16, reason: &str) -> Vec<DisplayCommand> {
        tracing::info!("Stream closed (code={})", code);
        self.state = ConnectionState::Disconnected;
        self.transport = None;
        self.close_requested = false;
        self.last_close = Some((code, reason.to_string()));

        let mut commands = Vec::with_capacity(4);
        if code == AUTH_REJECTED_CLOSE_CODE {
            let reason = if reason.is_empty() {
                "Invalid proxy token"
            } else {
                reason
            };
            commands.push(DisplayCommand::AuthFailed(reason.to_string()));
        }
        commands.push(DisplayCommand::Status(ConnectionState::Disconnected));
        commands.push(DisplayCommand::DisableInput);
        commands.push(DisplayCommand::Disconnected);
        commands
    }

    /// Send one user message
    ///
    /// The text is trimmed before sending. On success the per-turn trackers
    /// (metadata, query execution, draft) are reset for the reply.
    ///
    /// # Errors
    ///
    /// Returns `ChatbotError::EmptyMessage` for blank text,
    /// `ChatbotError::NotConnected` unless connected, or a transport error if
    /// the frame cannot be queued. Nothing is sent in any of these cases.
    pub fn send(&mut self, text: &str) -> Result<()> {
        let message = text.trim();
        if message.is_empty() {
            return Err(ChatbotError::EmptyMessage.into());
        }

        let transport = match (&self.transport, self.state, self.close_requested) {
            (Some(transport), ConnectionState::Connected, false) => Arc::clone(transport),
            _ => return Err(ChatbotError::NotConnected.into()),
        };

        let frame = serde_json::to_string(&OutboundFrame { message })?;
        transport.send(frame)?;

        self.reset_turn();
        Ok(())
    }

    /// Close the connection if one is open; calling it again does nothing
    pub fn close(&mut self) {
        if self.close_requested {
            return;
        }
        if let Some(transport) = &self.transport {
            tracing::info!("Closing stream");
            transport.close();
            self.close_requested = true;
        }
    }

    fn reset_turn(&mut self) {
        self.metadata = None;
        self.query_execution = None;
        self.draft = None;
    }

    fn dispatch(&mut self, event: InboundEvent) -> Vec<DisplayCommand> {
        match event {
            InboundEvent::ConnectionEstablished => {
                tracing::debug!("Connection established");
                Vec::new()
            }
            InboundEvent::UserMessage { text, timestamp } => vec![DisplayCommand::Message {
                role: Role::User,
                text,
                timestamp,
            }],
            InboundEvent::AssistantMetadata(metadata) => {
                self.metadata = Some(metadata);
                Vec::new()
            }
            InboundEvent::AssistantChunk(chunk) => {
                let mut commands = Vec::with_capacity(2);
                if self.draft.is_none() {
                    commands.push(DisplayCommand::NewAssistantMessage);
                }
                let draft = self.draft.get_or_insert_with(AssistantDraft::default);
                draft.push(&chunk);
                commands.push(DisplayCommand::UpdateAssistantMessage(
                    draft.content().to_string(),
                ));
                commands
            }
            InboundEvent::Recommendations(items) => {
                if items.is_empty() {
                    return Vec::new();
                }
                let mut commands = vec![DisplayCommand::Recommendations(items)];
                if let Some(query) = &self.query_execution {
                    commands.push(DisplayCommand::QueryLink(query.clone()));
                }
                commands
            }
            InboundEvent::FollowUpQuestion(question) => {
                vec![DisplayCommand::Suggestion(question)]
            }
            InboundEvent::QueryExecution(query) => {
                self.query_execution = Some(query);
                Vec::new()
            }
            InboundEvent::SessionState(state) => {
                tracing::debug!("Session state: {}", state);
                Vec::new()
            }
            InboundEvent::ResponseComplete => {
                let mut commands = Vec::with_capacity(2);
                if let Some(draft) = self.draft.take() {
                    let text = draft.freeze();
                    self.last_assistant_message = Some(text.clone());
                    commands.push(DisplayCommand::AssistantMessageComplete(text));
                }
                commands.push(DisplayCommand::ClearInput);
                commands
            }
            InboundEvent::Error(message) => vec![DisplayCommand::Error(message)],
            InboundEvent::Unknown(raw) => {
                tracing::debug!("Unknown message type: {}", raw);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::fake::FakeConnector;
    use serde_json::json;

    fn stream_with(connector: Arc<FakeConnector>) -> SessionStream {
        SessionStream::new(Url::parse("http://localhost:8000").unwrap(), connector)
    }

    fn connected() -> (SessionStream, Arc<FakeConnector>) {
        let connector = Arc::new(FakeConnector::new());
        let mut stream = stream_with(Arc::clone(&connector));
        stream.open("s1", AuthDescriptor::none()).unwrap();
        stream.on_open();
        (stream, connector)
    }

    fn frame(stream: &mut SessionStream, value: Value) -> Vec<DisplayCommand> {
        stream.on_frame(&value.to_string()).unwrap()
    }

    fn error_kind(result: Result<()>) -> ChatbotError {
        result
            .unwrap_err()
            .downcast::<ChatbotError>()
            .expect("expected a ChatbotError")
    }

    #[test]
    fn test_open_with_empty_session_fails_without_dialing() {
        let connector = Arc::new(FakeConnector::new());
        let mut stream = stream_with(Arc::clone(&connector));

        let err = stream.open("", AuthDescriptor::none()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ChatbotError>(),
            Some(ChatbotError::MissingSession)
        ));
        assert_eq!(connector.attempts(), 0);
        assert_eq!(stream.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_open_moves_to_connecting_and_builds_url() {
        let connector = Arc::new(FakeConnector::new());
        let mut stream = stream_with(Arc::clone(&connector));

        let handle = stream.open("abc", AuthDescriptor::proxy("tok")).unwrap();
        assert_eq!(stream.state(), ConnectionState::Connecting);
        assert_eq!(
            handle.url.as_str(),
            "ws://localhost:8000/api/v1/chatbot/sessions/abc/?token=tok"
        );
        assert_eq!(connector.last_url(), Some(handle.url));
        assert_eq!(stream.session().map(|s| s.id.as_str()), Some("abc"));
    }

    #[test]
    fn test_on_open_emits_ready() {
        let connector = Arc::new(FakeConnector::new());
        let mut stream = stream_with(connector);
        stream.open("s1", AuthDescriptor::none()).unwrap();

        let commands = stream.on_open();
        assert_eq!(stream.state(), ConnectionState::Connected);
        assert!(commands.contains(&DisplayCommand::Ready));
    }

    #[tokio::test]
    async fn test_handle_pumps_events_from_connection() {
        let connector = Arc::new(FakeConnector::new());
        let mut stream = stream_with(Arc::clone(&connector));
        let mut handle = stream.open("s1", AuthDescriptor::none()).unwrap();

        let events = connector.event_sender(0).unwrap();
        events.send(TransportEvent::Opened).unwrap();
        events
            .send(TransportEvent::Frame(
                json!({"type": "assistant_message_chunk", "chunk": "Hi"}).to_string(),
            ))
            .unwrap();

        let mut all = Vec::new();
        for _ in 0..2 {
            let event = handle.events.recv().await.unwrap();
            all.extend(stream.handle(event).unwrap());
        }
        assert!(all.contains(&DisplayCommand::Ready));
        assert!(all.contains(&DisplayCommand::UpdateAssistantMessage("Hi".to_string())));
    }

    #[test]
    fn test_chunks_stream_into_one_message() {
        let (mut stream, _) = connected();

        let first = frame(&mut stream, json!({"type": "assistant_message_chunk", "chunk": "Hi"}));
        assert_eq!(
            first,
            vec![
                DisplayCommand::NewAssistantMessage,
                DisplayCommand::UpdateAssistantMessage("Hi".to_string()),
            ]
        );

        let second =
            frame(&mut stream, json!({"type": "assistant_message_chunk", "chunk": " there"}));
        assert_eq!(
            second,
            vec![DisplayCommand::UpdateAssistantMessage("Hi there".to_string())]
        );

        let done = frame(&mut stream, json!({"type": "response_complete"}));
        assert_eq!(
            done,
            vec![
                DisplayCommand::AssistantMessageComplete("Hi there".to_string()),
                DisplayCommand::ClearInput,
            ]
        );
        assert_eq!(stream.last_assistant_message(), Some("Hi there"));
        assert!(stream.draft().is_none());
    }

    #[test]
    fn test_draft_is_concatenation_of_chunks_between_completions() {
        let (mut stream, _) = connected();
        let turns: [&[&str]; 3] = [&["a", "b", "c"], &["", "x"], &["one ", "two ", "three"]];

        for chunks in turns {
            for chunk in chunks {
                frame(
                    &mut stream,
                    json!({"type": "assistant_message_chunk", "chunk": chunk}),
                );
            }
            let expected: String = chunks.concat();
            assert_eq!(stream.draft().map(|d| d.content()), Some(expected.as_str()));

            frame(&mut stream, json!({"type": "response_complete"}));
            assert!(stream.draft().is_none());
            assert_eq!(stream.last_assistant_message(), Some(expected.as_str()));
        }
    }

    #[test]
    fn test_response_complete_without_draft_only_clears_input() {
        let (mut stream, _) = connected();
        let commands = frame(&mut stream, json!({"type": "response_complete"}));
        assert_eq!(commands, vec![DisplayCommand::ClearInput]);
    }

    #[test]
    fn test_user_message_is_displayed() {
        let (mut stream, _) = connected();
        let commands = frame(
            &mut stream,
            json!({"type": "user_message", "message": "hello", "timestamp": "2024-01-01T00:00:00Z"}),
        );
        assert_eq!(
            commands,
            vec![DisplayCommand::Message {
                role: Role::User,
                text: "hello".to_string(),
                timestamp: Some("2024-01-01T00:00:00Z".to_string()),
            }]
        );
    }

    #[test]
    fn test_metadata_and_query_are_stored_silently() {
        let (mut stream, _) = connected();
        let meta = json!({"type": "assistant_metadata", "intent": "search"});
        let query = json!({"type": "query_execution", "query_type": "sql", "result_count": 2});

        assert!(frame(&mut stream, meta.clone()).is_empty());
        assert!(frame(&mut stream, query.clone()).is_empty());
        assert_eq!(stream.metadata(), Some(&meta));
        assert_eq!(stream.query_execution(), Some(&query));
    }

    #[test]
    fn test_empty_recommendations_emit_nothing() {
        let (mut stream, _) = connected();
        frame(&mut stream, json!({"type": "query_execution", "query_type": "sql"}));
        let commands = frame(&mut stream, json!({"type": "recommendations", "items": []}));
        assert!(commands.is_empty());
    }

    #[test]
    fn test_recommendations_without_query_have_no_link() {
        let (mut stream, _) = connected();
        let commands = frame(
            &mut stream,
            json!({"type": "recommendations", "items": [{"name": "Plan A"}]}),
        );
        assert_eq!(
            commands,
            vec![DisplayCommand::Recommendations(vec![json!({"name": "Plan A"})])]
        );
    }

    #[test]
    fn test_recommendations_with_query_add_link() {
        let (mut stream, _) = connected();
        let query = json!({"type": "query_execution", "query_type": "sql", "result_count": 1});
        frame(&mut stream, query.clone());

        let commands = frame(
            &mut stream,
            json!({"type": "recommendations", "items": [{"name": "Plan A"}]}),
        );
        assert_eq!(commands.len(), 2);
        assert!(matches!(commands[0], DisplayCommand::Recommendations(ref items) if items.len() == 1));
        assert_eq!(commands[1], DisplayCommand::QueryLink(query));
    }

    #[test]
    fn test_follow_up_and_error_events() {
        let (mut stream, _) = connected();
        assert_eq!(
            frame(&mut stream, json!({"type": "follow_up_question", "question": "More?"})),
            vec![DisplayCommand::Suggestion("More?".to_string())]
        );
        assert_eq!(
            frame(&mut stream, json!({"type": "error", "error": "quota exceeded"})),
            vec![DisplayCommand::Error("quota exceeded".to_string())]
        );
    }

    #[test]
    fn test_noop_events_leave_state_unchanged() {
        let (mut stream, _) = connected();
        frame(&mut stream, json!({"type": "assistant_message_chunk", "chunk": "partial"}));

        for value in [
            json!({"type": "connection_established"}),
            json!({"type": "session_state", "state": "active"}),
            json!({"type": "mystery", "payload": 1}),
        ] {
            assert!(frame(&mut stream, value).is_empty());
        }

        assert_eq!(stream.state(), ConnectionState::Connected);
        assert_eq!(stream.draft().map(|d| d.content()), Some("partial"));
        assert!(stream.metadata().is_none());
    }

    #[test]
    fn test_malformed_frame_is_reported_and_state_kept() {
        let (mut stream, _) = connected();
        frame(&mut stream, json!({"type": "assistant_message_chunk", "chunk": "ok"}));

        let err = stream.on_frame("{broken").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ChatbotError>(),
            Some(ChatbotError::Decode(_))
        ));
        assert_eq!(stream.state(), ConnectionState::Connected);
        assert_eq!(stream.draft().map(|d| d.content()), Some("ok"));
    }

    #[test]
    fn test_send_blank_fails_with_empty_message() {
        let (mut stream, connector) = connected();
        for text in ["", "   ", "\n\t"] {
            assert!(matches!(error_kind(stream.send(text)), ChatbotError::EmptyMessage));
        }
        assert!(connector.last().unwrap().sent().is_empty());
    }

    #[test]
    fn test_send_when_not_connected_fails() {
        let connector = Arc::new(FakeConnector::new());
        let mut stream = stream_with(Arc::clone(&connector));
        assert!(matches!(error_kind(stream.send("hi")), ChatbotError::NotConnected));

        stream.open("s1", AuthDescriptor::none()).unwrap();
        assert!(matches!(error_kind(stream.send("hi")), ChatbotError::NotConnected));
        assert!(connector.last().unwrap().sent().is_empty());

        stream.on_open();
        stream.on_error("reset");
        assert!(matches!(error_kind(stream.send("hi")), ChatbotError::NotConnected));
        assert!(connector.last().unwrap().sent().is_empty());
    }

    #[test]
    fn test_send_writes_trimmed_frame_and_resets_turn() {
        let (mut stream, connector) = connected();
        frame(&mut stream, json!({"type": "assistant_metadata", "a": 1}));
        frame(&mut stream, json!({"type": "query_execution", "q": 1}));
        frame(&mut stream, json!({"type": "assistant_message_chunk", "chunk": "stale"}));

        stream.send("  what's new?  ").unwrap();

        let sent = connector.last().unwrap().sent();
        assert_eq!(sent.len(), 1);
        let value: Value = serde_json::from_str(&sent[0]).unwrap();
        assert_eq!(value, json!({"message": "what's new?"}));

        assert!(stream.metadata().is_none());
        assert!(stream.query_execution().is_none());
        assert!(stream.draft().is_none());

        let commands = frame(&mut stream, json!({"type": "assistant_message_chunk", "chunk": "x"}));
        assert_eq!(commands[0], DisplayCommand::NewAssistantMessage);
    }

    #[test]
    fn test_send_transport_failure_is_reported() {
        let connector = Arc::new(FakeConnector::failing());
        let mut stream = stream_with(connector);
        stream.open("s1", AuthDescriptor::none()).unwrap();
        stream.on_open();
        assert!(matches!(error_kind(stream.send("hi")), ChatbotError::Transport(_)));
    }

    #[test]
    fn test_on_error_does_not_close_transport() {
        let (mut stream, connector) = connected();
        let commands = stream.on_error("connection reset");
        assert_eq!(stream.state(), ConnectionState::Errored);
        assert!(commands
            .iter()
            .any(|c| matches!(c, DisplayCommand::ConnectionError(m) if m.contains("connection reset"))));
        assert_eq!(connector.last().unwrap().close_calls(), 0);
    }

    #[test]
    fn test_close_code_4001_reports_auth_failure() {
        let connector = Arc::new(FakeConnector::new());
        let mut stream = stream_with(connector);
        stream.open("s1", AuthDescriptor::proxy("bad")).unwrap();
        stream.on_open();

        let commands = stream.on_close(4001, "bad token");
        assert_eq!(stream.state(), ConnectionState::Disconnected);
        assert_eq!(commands[0], DisplayCommand::AuthFailed("bad token".to_string()));
        assert!(commands.contains(&DisplayCommand::DisableInput));
        assert!(commands.contains(&DisplayCommand::Disconnected));
        assert_eq!(stream.last_close(), Some((4001, "bad token")));
    }

    #[test]
    fn test_close_code_4001_without_reason_uses_default() {
        let (mut stream, _) = connected();
        let commands = stream.on_close(4001, "");
        assert_eq!(
            commands[0],
            DisplayCommand::AuthFailed("Invalid proxy token".to_string())
        );
    }

    #[test]
    fn test_normal_close_has_no_auth_failure() {
        let (mut stream, _) = connected();
        let commands = stream.on_close(1000, "");
        assert!(!commands
            .iter()
            .any(|c| matches!(c, DisplayCommand::AuthFailed(_))));
        assert_eq!(
            commands,
            vec![
                DisplayCommand::Status(ConnectionState::Disconnected),
                DisplayCommand::DisableInput,
                DisplayCommand::Disconnected,
            ]
        );
    }

    #[test]
    fn test_errored_then_closed_returns_to_disconnected() {
        let (mut stream, _) = connected();
        stream.on_error("boom");
        stream.on_close(1006, "");
        assert_eq!(stream.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_close_is_idempotent() {
        let (mut stream, connector) = connected();
        stream.close();
        stream.close();
        assert_eq!(connector.last().unwrap().close_calls(), 1);

        let mut fresh = stream_with(Arc::new(FakeConnector::new()));
        fresh.close();
        assert_eq!(fresh.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_frames_after_close_are_ignored() {
        let (mut stream, _) = connected();
        stream.close();

        let commands = frame(&mut stream, json!({"type": "assistant_message_chunk", "chunk": "late"}));
        assert!(commands.is_empty());
        assert!(stream.draft().is_none());
        assert!(matches!(error_kind(stream.send("hi")), ChatbotError::NotConnected));

        stream.on_close(1000, "");
        assert_eq!(stream.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_frames_before_open_are_ignored() {
        let connector = Arc::new(FakeConnector::new());
        let mut stream = stream_with(connector);
        stream.open("s1", AuthDescriptor::none()).unwrap();
        let commands = frame(&mut stream, json!({"type": "error", "error": "early"}));
        assert!(commands.is_empty());
    }

    #[test]
    fn test_reopen_closes_previous_transport_and_resets() {
        let (mut stream, connector) = connected();
        frame(&mut stream, json!({"type": "assistant_message_chunk", "chunk": "half"}));

        stream.open("s2", AuthDescriptor::none()).unwrap();
        assert_eq!(connector.attempts(), 2);
        assert_eq!(connector.transport(0).unwrap().close_calls(), 1);
        assert_eq!(stream.state(), ConnectionState::Connecting);
        assert!(stream.draft().is_none());
        assert_eq!(stream.session().map(|s| s.id.as_str()), Some("s2"));
    }

    #[test]
    fn test_fresh_open_after_close_works() {
        let (mut stream, connector) = connected();
        stream.close();
        stream.on_close(1000, "");

        stream.open("s1", AuthDescriptor::none()).unwrap();
        stream.on_open();
        stream.send("again").unwrap();
        assert_eq!(connector.last().unwrap().sent().len(), 1);
    }

    #[test]
    fn test_end_to_end_hi_there() {
        let (mut stream, _) = connected();
        let mut displayed = String::new();

        for value in [
            json!({"type": "assistant_message_chunk", "chunk": "Hi"}),
            json!({"type": "assistant_message_chunk", "chunk": " there"}),
            json!({"type": "response_complete"}),
        ] {
            for command in frame(&mut stream, value) {
                if let DisplayCommand::UpdateAssistantMessage(text) = command {
                    displayed = text;
                }
            }
        }

        assert_eq!(displayed, "Hi there");
    }

    #[test]
    fn test_set_resource_updates_session() {
        let (mut stream, _) = connected();
        stream.set_resource("branch-9");
        assert_eq!(stream.session().map(|s| s.resource_id.as_str()), Some("branch-9"));
    }
}
