//! Per-document editing session: buffer, log, presence, and sync state.

use std::time::Duration;

use smol_str::SmolStr;

use crate::buffer::DocumentBuffer;
use crate::clock::OpClock;
use crate::log::OperationLog;
use crate::messages::SyncMessage;
use crate::op::{Operation, OperationKind};
use crate::presence::{self, PeerCursor, PresenceSet};
use crate::transform;

/// Connection lifecycle of a document session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No channel. Buffer and log are retained for the next sync.
    #[default]
    Disconnected,
    /// Waiting for the channel to open.
    Connecting,
    /// Sync request sent, waiting for an authoritative snapshot.
    Syncing,
    /// Synced; edits flow both ways.
    Live,
}

impl SessionState {
    /// True while the buffer is not yet authoritative.
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Connecting | Self::Syncing)
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }
}

/// A rejected host call.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SessionError {
    /// Local edits are refused until the session is live, so a later
    /// sync snapshot can never silently discard accepted input.
    #[error("session is not live")]
    NotLive,

    /// Empty edits are dropped rather than broadcast.
    #[error("operation content is empty")]
    EmptyEdit,
}

/// What feeding one inbound frame to the session changed.
#[derive(Debug, Default)]
pub struct HandleOutcome {
    /// Frame to send back (a sync response for a newcomer).
    pub reply: Option<SyncMessage>,
    /// Buffer text changed.
    pub content_changed: bool,
    /// Presence set changed.
    pub cursors_changed: bool,
    /// Lifecycle state moved.
    pub state_changed: bool,
}

/// One document's editing session.
///
/// Exclusively owns the buffer, log, and presence set; every mutation
/// goes through these methods, one frame or host call at a time, each
/// running to completion before the next. Does no IO itself: the
/// [`SessionCoordinator`](crate::coordinator::SessionCoordinator) moves
/// frames between this and a channel.
#[derive(Debug)]
pub struct DocumentSession {
    user: SmolStr,
    user_name: SmolStr,
    document: SmolStr,
    color: u32,
    state: SessionState,
    buffer: DocumentBuffer,
    log: OperationLog,
    presence: PresenceSet,
    clock: OpClock,
}

impl DocumentSession {
    /// New session for `document`, attributing edits to `user`.
    pub fn new(
        user: impl Into<SmolStr>,
        user_name: impl Into<SmolStr>,
        document: impl Into<SmolStr>,
    ) -> Self {
        let user = user.into();
        let color = presence::color_for_user(&user);
        Self {
            user,
            user_name: user_name.into(),
            document: document.into(),
            color,
            state: SessionState::default(),
            buffer: DocumentBuffer::new(),
            log: OperationLog::new(),
            presence: PresenceSet::new(),
            clock: OpClock::new(),
        }
    }

    /// Override the palette colour broadcast with local cursor moves.
    pub fn with_color(mut self, color: u32) -> Self {
        self.color = color;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn color(&self) -> u32 {
        self.color
    }

    /// Current buffer text.
    pub fn content(&self) -> String {
        self.buffer.to_string()
    }

    pub fn buffer(&self) -> &DocumentBuffer {
        &self.buffer
    }

    pub fn log(&self) -> &OperationLog {
        &self.log
    }

    /// Peer cursors, ordered by user id.
    pub fn cursors(&self) -> Vec<PeerCursor> {
        self.presence.snapshot()
    }

    /// The driver is about to open the channel.
    pub fn connecting(&mut self) {
        self.state = SessionState::Connecting;
    }

    /// Channel opened: request a snapshot from whoever is already live.
    ///
    /// Returns `None` when the session was seeded before the channel came
    /// up; it already holds an authoritative buffer and serves newcomers
    /// instead of requesting state.
    pub fn channel_opened(&mut self) -> Option<SyncMessage> {
        if self.state.is_live() {
            return None;
        }
        self.state = SessionState::Syncing;
        Some(SyncMessage::SyncRequest {
            user: self.user.clone(),
            document: self.document.clone(),
        })
    }

    /// Channel dropped. Buffer and log stay for the resync; presence is
    /// connection-bound and cleared.
    pub fn channel_closed(&mut self) {
        self.state = SessionState::Disconnected;
        self.presence.clear();
    }

    /// Feed one inbound frame through the typed dispatch.
    pub fn handle_message(&mut self, message: SyncMessage) -> HandleOutcome {
        match message {
            SyncMessage::SyncRequest { user, document } => self.on_sync_request(user, document),
            SyncMessage::SyncResponse {
                content,
                operations,
            } => self.on_sync_response(content, operations),
            SyncMessage::Operation(op) => self.on_operation(op),
            SyncMessage::CursorUpdate {
                user,
                user_name,
                position,
                color,
            } => self.on_cursor_update(user, user_name, position, color),
        }
    }

    /// Peer-symmetric sync: any live peer answers a newcomer.
    fn on_sync_request(&mut self, user: SmolStr, document: SmolStr) -> HandleOutcome {
        let mut outcome = HandleOutcome::default();
        if user == self.user || document != self.document || !self.state.is_live() {
            return outcome;
        }
        tracing::debug!(peer = %user, document = %document, "serving sync request");
        outcome.reply = Some(SyncMessage::SyncResponse {
            content: self.buffer.to_string(),
            operations: self.log.operations().to_vec(),
        });
        outcome
    }

    fn on_sync_response(&mut self, content: String, operations: Vec<Operation>) -> HandleOutcome {
        let mut outcome = HandleOutcome::default();
        match self.state {
            SessionState::Syncing => {
                self.buffer.set_text(&content);
                self.log.replace_all(operations);
                self.state = SessionState::Live;
                outcome.content_changed = true;
                outcome.state_changed = true;
                tracing::debug!(document = %self.document, ops = self.log.len(), "synced");
            }
            SessionState::Live => {
                // The first responder won; late answers carry nothing new.
                tracing::debug!(document = %self.document, "ignoring late sync response");
            }
            SessionState::Disconnected | SessionState::Connecting => {
                tracing::warn!(
                    document = %self.document,
                    state = ?self.state,
                    "unexpected sync response"
                );
            }
        }
        outcome
    }

    fn on_operation(&mut self, op: Operation) -> HandleOutcome {
        let mut outcome = HandleOutcome::default();
        if op.user == self.user {
            // Own echo: already applied when the edit was made.
            return outcome;
        }
        if !self.state.is_live() {
            tracing::debug!(state = ?self.state, "dropping operation outside live state");
            return outcome;
        }
        // Shift the op past everything that happened after the state its
        // author saw, then log the original: the log records causal
        // history, not replay order.
        let transformed =
            transform::transform_against(&op, self.log.operations_after(op.timestamp));
        if self.log.append(op) {
            self.buffer.apply(&transformed);
            outcome.content_changed = true;
        }
        outcome
    }

    fn on_cursor_update(
        &mut self,
        user: SmolStr,
        user_name: SmolStr,
        position: usize,
        color: u32,
    ) -> HandleOutcome {
        let mut outcome = HandleOutcome::default();
        if user == self.user {
            return outcome;
        }
        self.presence.upsert(user, user_name, position, color);
        outcome.cursors_changed = true;
        outcome
    }

    /// Host-invoked edit: apply locally first, log it, hand back the
    /// operation for broadcast. The author never waits on the network to
    /// see their own edit.
    pub fn local_edit(
        &mut self,
        kind: OperationKind,
        position: usize,
        content: impl Into<SmolStr>,
    ) -> Result<Operation, SessionError> {
        if !self.state.is_live() {
            return Err(SessionError::NotLive);
        }
        let content = content.into();
        if content.is_empty() {
            return Err(SessionError::EmptyEdit);
        }
        let position = position.min(self.buffer.len_chars());
        let op = Operation::new(self.user.clone(), kind, position, content, self.clock.next());
        self.buffer.apply(&op);
        self.log.append(op.clone());
        Ok(op)
    }

    /// Host-invoked cursor move: a frame to broadcast, nothing stored.
    pub fn local_cursor(&self, position: usize) -> Result<SyncMessage, SessionError> {
        if !self.state.is_live() {
            return Err(SessionError::NotLive);
        }
        Ok(SyncMessage::CursorUpdate {
            user: self.user.clone(),
            user_name: self.user_name.clone(),
            position,
            color: self.color,
        })
    }

    /// Install `content` as the authoritative document and go live
    /// without a snapshot exchange. For brand-new documents, or for going
    /// solo after a sync timeout when the host knows no peer will answer.
    pub fn seed(&mut self, content: &str) {
        self.buffer.set_text(content);
        self.log.replace_all(Vec::new());
        self.state = SessionState::Live;
        tracing::debug!(document = %self.document, "seeded");
    }

    /// Leaving the document: presence dropped, back to disconnected.
    /// Channel teardown is the driver's job.
    pub fn leave(&mut self) {
        self.presence.clear();
        self.state = SessionState::Disconnected;
    }

    /// Drop peer cursors idle longer than `max_age`. Returns true if the
    /// presence set changed.
    pub fn prune_cursors(&mut self, max_age: Duration) -> bool {
        self.presence.prune_stale(max_age)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live_session() -> DocumentSession {
        let mut session = DocumentSession::new("alice", "Alice", "task-1");
        session.connecting();
        session.channel_opened();
        session.handle_message(SyncMessage::SyncResponse {
            content: String::new(),
            operations: Vec::new(),
        });
        session
    }

    fn remote_op(
        user: &str,
        kind: OperationKind,
        position: usize,
        content: &str,
        timestamp: u64,
    ) -> SyncMessage {
        SyncMessage::Operation(Operation::new(user, kind, position, content, timestamp))
    }

    #[test]
    fn test_lifecycle_to_live() {
        let mut session = DocumentSession::new("alice", "Alice", "task-1");
        assert_eq!(session.state(), SessionState::Disconnected);

        session.connecting();
        assert_eq!(session.state(), SessionState::Connecting);
        assert!(session.state().is_loading());

        let request = session.channel_opened();
        assert_eq!(session.state(), SessionState::Syncing);
        match request {
            Some(SyncMessage::SyncRequest { user, document }) => {
                assert_eq!(user, "alice");
                assert_eq!(document, "task-1");
            }
            other => panic!("unexpected request: {other:?}"),
        }

        let outcome = session.handle_message(SyncMessage::SyncResponse {
            content: "Hello".into(),
            operations: Vec::new(),
        });
        assert!(outcome.state_changed);
        assert!(outcome.content_changed);
        assert_eq!(session.state(), SessionState::Live);
        assert_eq!(session.content(), "Hello");
    }

    #[test]
    fn test_late_sync_response_is_ignored() {
        let mut session = live_session();
        session.handle_message(SyncMessage::SyncResponse {
            content: "first".into(),
            operations: Vec::new(),
        });
        // Already live from the helper; this second snapshot must lose.
        assert_eq!(session.content(), "");
    }

    #[test]
    fn test_seeded_session_skips_sync_request() {
        let mut session = DocumentSession::new("alice", "Alice", "task-1");
        session.seed("draft");
        assert!(session.channel_opened().is_none());
        assert_eq!(session.state(), SessionState::Live);
        assert_eq!(session.content(), "draft");
    }

    #[test]
    fn test_live_session_serves_sync_requests() {
        let mut session = live_session();
        session.local_edit(OperationKind::Insert, 0, "Hello").unwrap();

        let outcome = session.handle_message(SyncMessage::SyncRequest {
            user: "bob".into(),
            document: "task-1".into(),
        });
        match outcome.reply {
            Some(SyncMessage::SyncResponse {
                content,
                operations,
            }) => {
                assert_eq!(content, "Hello");
                assert_eq!(operations.len(), 1);
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[test]
    fn test_sync_requests_for_other_documents_or_self_are_ignored() {
        let mut session = live_session();

        let own = session.handle_message(SyncMessage::SyncRequest {
            user: "alice".into(),
            document: "task-1".into(),
        });
        assert!(own.reply.is_none());

        let other_doc = session.handle_message(SyncMessage::SyncRequest {
            user: "bob".into(),
            document: "task-2".into(),
        });
        assert!(other_doc.reply.is_none());
    }

    #[test]
    fn test_syncing_session_does_not_serve_sync_requests() {
        let mut session = DocumentSession::new("alice", "Alice", "task-1");
        session.connecting();
        session.channel_opened();

        let outcome = session.handle_message(SyncMessage::SyncRequest {
            user: "bob".into(),
            document: "task-1".into(),
        });
        assert!(outcome.reply.is_none());
    }

    #[test]
    fn test_local_edit_semantics() {
        let mut session = live_session();

        session.local_edit(OperationKind::Insert, 0, "Hello").unwrap();
        assert_eq!(session.content(), "Hello");

        session
            .local_edit(OperationKind::Insert, 5, " World")
            .unwrap();
        assert_eq!(session.content(), "Hello World");

        session.local_edit(OperationKind::Delete, 0, "Hello ").unwrap();
        assert_eq!(session.content(), "World");

        session.local_edit(OperationKind::Update, 0, "wyrld").unwrap();
        assert_eq!(session.content(), "wyrld");
        assert_eq!(session.log().len(), 4);
    }

    #[test]
    fn test_local_edits_refused_unless_live() {
        let mut session = DocumentSession::new("alice", "Alice", "task-1");
        assert!(matches!(
            session.local_edit(OperationKind::Insert, 0, "x"),
            Err(SessionError::NotLive)
        ));

        session.connecting();
        session.channel_opened();
        assert!(matches!(
            session.local_edit(OperationKind::Insert, 0, "x"),
            Err(SessionError::NotLive)
        ));
        assert_eq!(session.log().len(), 0);
    }

    #[test]
    fn test_empty_local_edit_refused() {
        let mut session = live_session();
        assert!(matches!(
            session.local_edit(OperationKind::Insert, 0, ""),
            Err(SessionError::EmptyEdit)
        ));
    }

    #[test]
    fn test_local_edit_clamps_position() {
        let mut session = live_session();
        let op = session
            .local_edit(OperationKind::Insert, 999, "end")
            .unwrap();
        // The broadcast op carries the clamped position so peers apply
        // the same edit.
        assert_eq!(op.position, 0);
        assert_eq!(session.content(), "end");
    }

    #[test]
    fn test_own_echo_is_not_reapplied() {
        let mut session = live_session();
        let op = session.local_edit(OperationKind::Insert, 0, "Hi").unwrap();

        let outcome = session.handle_message(SyncMessage::Operation(op));
        assert!(!outcome.content_changed);
        assert_eq!(session.content(), "Hi");
        assert_eq!(session.log().len(), 1);
    }

    #[test]
    fn test_duplicate_remote_operation_applied_once() {
        let mut session = live_session();
        let op = Operation::new("bob", OperationKind::Insert, 0, "x", 10);

        session.handle_message(SyncMessage::Operation(op.clone()));
        let second = session.handle_message(SyncMessage::Operation(op));
        assert!(!second.content_changed);
        assert_eq!(session.content(), "x");
        assert_eq!(session.log().len(), 1);
    }

    #[test]
    fn test_operations_dropped_while_syncing() {
        let mut session = DocumentSession::new("alice", "Alice", "task-1");
        session.connecting();
        session.channel_opened();

        let outcome =
            session.handle_message(remote_op("bob", OperationKind::Insert, 0, "x", 10));
        assert!(!outcome.content_changed);
        assert_eq!(session.content(), "");
    }

    #[test]
    fn test_remote_edit_with_earlier_timestamp_lands_before_local_insert() {
        // Sync hands us "Hello", we append " World", then a concurrent
        // insert at 0 with an earlier timestamp arrives: it stays at 0
        // and the buffer becomes "Hi! Hello World".
        let mut session = DocumentSession::new("alice", "Alice", "task-1");
        session.connecting();
        session.channel_opened();
        session.handle_message(SyncMessage::SyncResponse {
            content: "Hello".into(),
            operations: Vec::new(),
        });

        let local = session
            .local_edit(OperationKind::Insert, 5, " World")
            .unwrap();
        assert_eq!(session.content(), "Hello World");

        let earlier = local.timestamp - 1;
        let outcome = session.handle_message(remote_op(
            "bob",
            OperationKind::Insert,
            0,
            "Hi! ",
            earlier,
        ));
        assert!(outcome.content_changed);
        assert_eq!(session.content(), "Hi! Hello World");
    }

    #[test]
    fn test_remote_edit_transformed_past_later_local_insert() {
        // Both peers target the end of "Hello"; our logged insert has the
        // later timestamp, so the remote one shifts past it.
        let mut session = DocumentSession::new("alice", "Alice", "task-1");
        session.connecting();
        session.channel_opened();
        session.handle_message(SyncMessage::SyncResponse {
            content: "Hello".into(),
            operations: Vec::new(),
        });

        let local = session
            .local_edit(OperationKind::Insert, 5, " World")
            .unwrap();
        let outcome = session.handle_message(remote_op(
            "bob",
            OperationKind::Insert,
            5,
            "!",
            local.timestamp - 1,
        ));
        assert!(outcome.content_changed);
        assert_eq!(session.content(), "Hello World!");
    }

    #[test]
    fn test_sequential_remote_scenario() {
        let mut session = live_session();

        session.handle_message(remote_op("bob", OperationKind::Insert, 0, "AB", 1));
        assert_eq!(session.content(), "AB");

        session.handle_message(remote_op("bob", OperationKind::Insert, 0, "CD", 2));
        assert_eq!(session.content(), "CDAB");

        session.handle_message(remote_op("bob", OperationKind::Delete, 1, "D", 3));
        assert_eq!(session.content(), "CAB");
    }

    #[test]
    fn test_arrival_order_does_not_change_the_result() {
        // Two concurrent inserts at 0 from different peers, arriving in
        // opposite orders on two sessions, converge to the same text.
        let newer = Operation::new("bob", OperationKind::Insert, 0, "X", 200);
        let older = Operation::new("carol", OperationKind::Insert, 0, "Y", 100);

        let mut forward = live_session();
        forward.handle_message(SyncMessage::Operation(older.clone()));
        forward.handle_message(SyncMessage::Operation(newer.clone()));

        let mut reversed = live_session();
        reversed.handle_message(SyncMessage::Operation(newer));
        reversed.handle_message(SyncMessage::Operation(older));

        assert_eq!(forward.content(), reversed.content());
        assert_eq!(forward.content(), "XY");
    }

    #[test]
    fn test_cursor_upsert_keeps_one_entry_per_user() {
        let mut session = live_session();

        session.handle_message(SyncMessage::CursorUpdate {
            user: "bob".into(),
            user_name: "Bob".into(),
            position: 3,
            color: 1,
        });
        session.handle_message(SyncMessage::CursorUpdate {
            user: "bob".into(),
            user_name: "Bob".into(),
            position: 7,
            color: 1,
        });

        let cursors = session.cursors();
        assert_eq!(cursors.len(), 1);
        assert_eq!(cursors[0].position, 7);
    }

    #[test]
    fn test_own_cursor_echo_is_ignored() {
        let mut session = live_session();
        let outcome = session.handle_message(SyncMessage::CursorUpdate {
            user: "alice".into(),
            user_name: "Alice".into(),
            position: 3,
            color: 1,
        });
        assert!(!outcome.cursors_changed);
        assert!(session.cursors().is_empty());
    }

    #[test]
    fn test_local_cursor_frame() {
        let mut session = live_session();
        match session.local_cursor(4) {
            Ok(SyncMessage::CursorUpdate {
                user,
                user_name,
                position,
                color,
            }) => {
                assert_eq!(user, "alice");
                assert_eq!(user_name, "Alice");
                assert_eq!(position, 4);
                assert_eq!(color, session.color());
            }
            other => panic!("unexpected frame: {other:?}"),
        }

        session.channel_closed();
        assert!(session.local_cursor(4).is_err());
    }

    #[test]
    fn test_channel_closed_keeps_state_but_drops_presence() {
        let mut session = live_session();
        session.local_edit(OperationKind::Insert, 0, "Hi").unwrap();
        session.handle_message(SyncMessage::CursorUpdate {
            user: "bob".into(),
            user_name: "Bob".into(),
            position: 0,
            color: 1,
        });

        session.channel_closed();
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(session.content(), "Hi");
        assert_eq!(session.log().len(), 1);
        assert!(session.cursors().is_empty());

        // A reopened channel starts a fresh sync.
        let request = session.channel_opened();
        assert!(request.is_some());
        assert_eq!(session.state(), SessionState::Syncing);
    }
}
