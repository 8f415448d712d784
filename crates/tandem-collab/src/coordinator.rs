//! Async driver wiring one session to its channel.
//!
//! The coordinator owns the [`DocumentSession`] exclusively and runs a
//! single task: host commands, channel events, the sync timeout, and the
//! cursor prune tick all land in one loop, each handled to completion
//! before the next. Hosts keep a cloneable [`SessionHandle`] and observe
//! the session through watch channels instead of touching shared state.

use std::future;

use smol_str::SmolStr;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, Instant};

use crate::channel::{ChannelEvent, DocumentChannel};
use crate::config::SessionConfig;
use crate::messages::SyncMessage;
use crate::op::{Operation, OperationKind};
use crate::presence::PeerCursor;
use crate::session::{DocumentSession, SessionError, SessionState};

/// Host commands queued ahead of the coordinator loop.
const COMMAND_BUFFER: usize = 64;

/// Connection status published to the host.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionStatus {
    /// Lifecycle state.
    pub state: SessionState,
    /// Last failure worth showing, cleared when the session goes live.
    pub error: Option<SmolStr>,
}

impl SessionStatus {
    /// True while the buffer is not yet authoritative.
    pub fn is_loading(&self) -> bool {
        self.state.is_loading()
    }

    pub fn is_live(&self) -> bool {
        self.state.is_live()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// A failed host-side call.
#[derive(Debug, thiserror::Error)]
pub enum HandleError {
    /// The coordinator task has shut down.
    #[error("session has shut down")]
    Closed,

    /// The session refused the call.
    #[error(transparent)]
    Session(#[from] SessionError),
}

enum SessionCommand {
    Edit {
        kind: OperationKind,
        position: usize,
        content: SmolStr,
        reply: oneshot::Sender<Result<Operation, SessionError>>,
    },
    MoveCursor {
        position: usize,
    },
    Seed {
        content: String,
    },
    Leave,
}

/// Host-side handle to a running coordinator.
///
/// Cheap to clone. Edits and cursor moves are forwarded to the
/// coordinator task; buffer text, peer cursors, and status come back on
/// the watch channels.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    content: watch::Receiver<String>,
    cursors: watch::Receiver<Vec<PeerCursor>>,
    status: watch::Receiver<SessionStatus>,
}

impl SessionHandle {
    /// Apply a local edit and broadcast it. Returns the logged operation.
    pub async fn edit(
        &self,
        kind: OperationKind,
        position: usize,
        content: impl Into<SmolStr>,
    ) -> Result<Operation, HandleError> {
        let (reply, result) = oneshot::channel();
        self.commands
            .send(SessionCommand::Edit {
                kind,
                position,
                content: content.into(),
                reply,
            })
            .await
            .map_err(|_| HandleError::Closed)?;
        result
            .await
            .map_err(|_| HandleError::Closed)?
            .map_err(HandleError::from)
    }

    /// Insert `text` at char offset `position`.
    pub async fn insert(
        &self,
        position: usize,
        text: impl Into<SmolStr>,
    ) -> Result<Operation, HandleError> {
        self.edit(OperationKind::Insert, position, text).await
    }

    /// Remove `text` (the chars being deleted) at `position`.
    pub async fn delete(
        &self,
        position: usize,
        text: impl Into<SmolStr>,
    ) -> Result<Operation, HandleError> {
        self.edit(OperationKind::Delete, position, text).await
    }

    /// Replace `text.len()` chars at `position` with `text`.
    pub async fn replace(
        &self,
        position: usize,
        text: impl Into<SmolStr>,
    ) -> Result<Operation, HandleError> {
        self.edit(OperationKind::Update, position, text).await
    }

    /// Broadcast the local cursor position. Fire-and-forget: cursor moves
    /// are never buffered or logged.
    pub async fn move_cursor(&self, position: usize) -> Result<(), HandleError> {
        self.commands
            .send(SessionCommand::MoveCursor { position })
            .await
            .map_err(|_| HandleError::Closed)
    }

    /// Install content as the authoritative document and go live without
    /// waiting for a sync response.
    pub async fn seed(&self, content: impl Into<String>) -> Result<(), HandleError> {
        self.commands
            .send(SessionCommand::Seed {
                content: content.into(),
            })
            .await
            .map_err(|_| HandleError::Closed)
    }

    /// Leave the document and stop the coordinator.
    pub async fn leave(&self) -> Result<(), HandleError> {
        self.commands
            .send(SessionCommand::Leave)
            .await
            .map_err(|_| HandleError::Closed)
    }

    /// Buffer text, updated on every applied edit.
    pub fn content(&self) -> watch::Receiver<String> {
        self.content.clone()
    }

    /// Peer cursors, ordered by user id.
    pub fn cursors(&self) -> watch::Receiver<Vec<PeerCursor>> {
        self.cursors.clone()
    }

    /// Lifecycle state and last error.
    pub fn status(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }
}

/// Drives one [`DocumentSession`] over an injected channel.
pub struct SessionCoordinator<C> {
    session: DocumentSession,
    channel: C,
    config: SessionConfig,
    commands: mpsc::Receiver<SessionCommand>,
    content: watch::Sender<String>,
    cursors: watch::Sender<Vec<PeerCursor>>,
    status: watch::Sender<SessionStatus>,
    error: Option<SmolStr>,
    sync_deadline: Option<Instant>,
    prune_deadline: Option<Instant>,
}

impl<C: DocumentChannel> SessionCoordinator<C> {
    /// Pair a session with its channel. The returned coordinator must be
    /// spawned via [`run`](Self::run); the handle is the host's side.
    pub fn new(
        session: DocumentSession,
        channel: C,
        config: SessionConfig,
    ) -> (Self, SessionHandle) {
        let session = match config.cursor_color {
            Some(color) => session.with_color(color),
            None => session,
        };
        let (commands_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (content_tx, content_rx) = watch::channel(session.content());
        let (cursors_tx, cursors_rx) = watch::channel(session.cursors());
        let (status_tx, status_rx) = watch::channel(SessionStatus {
            state: session.state(),
            error: None,
        });

        let handle = SessionHandle {
            commands: commands_tx,
            content: content_rx,
            cursors: cursors_rx,
            status: status_rx,
        };
        let coordinator = Self {
            session,
            channel,
            config,
            commands,
            content: content_tx,
            cursors: cursors_tx,
            status: status_tx,
            error: None,
            sync_deadline: None,
            prune_deadline: None,
        };
        (coordinator, handle)
    }

    /// Run until the host leaves, drops every handle, or the channel ends
    /// for good.
    pub async fn run(mut self) {
        self.session.connecting();
        self.publish_status();
        self.prune_deadline = self.config.cursor_idle().map(|window| Instant::now() + window);

        loop {
            let sync_deadline = self.sync_deadline;
            let prune_deadline = self.prune_deadline;
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => {
                        if self.handle_command(command).await {
                            break;
                        }
                    }
                    None => break,
                },
                event = self.channel.next_event() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => {
                        tracing::debug!(document = %self.session.document(), "channel ended");
                        self.session.channel_closed();
                        self.error = Some("channel ended".into());
                        self.publish_cursors();
                        self.publish_status();
                        break;
                    }
                },
                _ = maybe_sleep(sync_deadline) => self.on_sync_timeout(),
                _ = maybe_sleep(prune_deadline) => self.on_prune_tick(),
            }
        }
    }

    /// Returns true when the loop should stop.
    async fn handle_command(&mut self, command: SessionCommand) -> bool {
        match command {
            SessionCommand::Edit {
                kind,
                position,
                content,
                reply,
            } => {
                let result = self.session.local_edit(kind, position, content);
                if let Ok(op) = &result {
                    self.publish_content();
                    self.broadcast(SyncMessage::Operation(op.clone())).await;
                }
                let _ = reply.send(result);
                false
            }
            SessionCommand::MoveCursor { position } => {
                match self.session.local_cursor(position) {
                    Ok(frame) => self.broadcast(frame).await,
                    Err(e) => tracing::debug!(error = %e, "cursor move dropped"),
                }
                false
            }
            SessionCommand::Seed { content } => {
                self.session.seed(&content);
                self.sync_deadline = None;
                self.error = None;
                self.publish_content();
                self.publish_status();
                false
            }
            SessionCommand::Leave => {
                self.session.leave();
                self.publish_cursors();
                self.publish_status();
                true
            }
        }
    }

    async fn handle_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Opened => match self.session.channel_opened() {
                Some(request) => {
                    self.sync_deadline = Some(Instant::now() + self.config.sync_timeout());
                    self.publish_status();
                    self.broadcast(request).await;
                }
                None => {
                    tracing::debug!(
                        document = %self.session.document(),
                        "channel open, already live"
                    );
                }
            },
            ChannelEvent::Message(message) => {
                let outcome = self.session.handle_message(message);
                if outcome.state_changed {
                    if self.session.state().is_live() {
                        self.sync_deadline = None;
                        self.error = None;
                    }
                    self.publish_status();
                }
                if outcome.content_changed {
                    self.publish_content();
                }
                if outcome.cursors_changed {
                    self.publish_cursors();
                }
                if let Some(reply) = outcome.reply {
                    self.broadcast(reply).await;
                }
            }
            ChannelEvent::Closed => {
                self.session.channel_closed();
                self.sync_deadline = None;
                self.error = Some("connection lost".into());
                self.publish_cursors();
                self.publish_status();
            }
        }
    }

    async fn broadcast(&mut self, frame: SyncMessage) {
        if let Err(e) = self.channel.broadcast(&frame).await {
            tracing::warn!(error = %e, "broadcast failed");
            self.error = Some(e.to_string().into());
            self.publish_status();
        }
    }

    fn on_sync_timeout(&mut self) {
        self.sync_deadline = None;
        tracing::warn!(document = %self.session.document(), "sync timed out");
        self.error = Some("sync timed out".into());
        self.publish_status();
    }

    fn on_prune_tick(&mut self) {
        if let Some(window) = self.config.cursor_idle() {
            if self.session.prune_cursors(window) {
                self.publish_cursors();
            }
            self.prune_deadline = Some(Instant::now() + window);
        }
    }

    fn publish_content(&self) {
        self.content.send_replace(self.session.content());
    }

    fn publish_cursors(&self) {
        self.cursors.send_replace(self.session.cursors());
    }

    fn publish_status(&self) {
        self.status.send_replace(SessionStatus {
            state: self.session.state(),
            error: self.error.clone(),
        });
    }
}

async fn maybe_sleep(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => future::pending().await,
    }
}
