//! The connection session.
//!
//! A [`Session`] owns at most one live connection.  The read half of the
//! socket is moved into a spawned read-loop task which forwards lines over
//! an [`mpsc`] channel; the write half stays with the session and is only
//! touched from `&mut self` methods, so state changes happen in one place.
//!
//! ```text
//!   control context                     read-loop task (per connection)
//!   ───────────────                     ──────────────────────────────
//!   connect() ──spawn──────────────────► read_loop(reader, generation)
//!   send()  ──► LineWriter                   │ Line / Ended
//!   next_event() ◄── mpsc ◄──────────────────┘
//! ```
//!
//! Every connection gets a fresh generation number, and teardown retires it.
//! Messages from any other generation are dropped in [`Session::next_event`],
//! so a read loop that was torn down never surfaces anything.
//!
//! A failed write is the one exit that keeps what was already read: lines
//! queued by the read loop are delivered before the closing events.

use std::collections::VecDeque;

use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

use crate::framer::OutboundMessage;
use crate::net::{connect_plain, LineReader, LineWriter, NetEvent};
use crate::registry::{ConnectionRegistry, ConnectionTarget};

const EVENT_QUEUE: usize = 256;

/// How long a failed write waits for the read loop to see the peer's close.
const READER_GRACE: Duration = Duration::from_millis(250);

// ── Public types ──────────────────────────────────────────────────────────────

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Authenticated,
}

/// What the display surface receives from a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// One line from the server, verbatim.
    Line(String),
    /// A locally generated `Error: ...` line.
    Diagnostic(String),
    /// The connection has gone away and the session is reusable.
    Disconnected,
}

// ── Read loop ─────────────────────────────────────────────────────────────────

/// Message from a read-loop task.
#[derive(Debug)]
struct Inbound {
    generation: u64,
    kind: InboundKind,
}

#[derive(Debug)]
enum InboundKind {
    Line(String),
    /// The loop has stopped; `Some` carries the read error.
    Ended(Option<String>),
}

/// Spawned once per connection.  Reads until EOF or error.
async fn read_loop<R: AsyncRead + Unpin>(
    mut reader: LineReader<R>,
    generation: u64,
    tx: mpsc::Sender<Inbound>,
) {
    loop {
        let ended = match reader.recv().await {
            Ok(events) => {
                let mut closed = false;
                for ev in events {
                    let kind = match ev {
                        NetEvent::Line(line) => InboundKind::Line(line),
                        NetEvent::Closed => {
                            closed = true;
                            InboundKind::Ended(None)
                        }
                    };
                    if tx.send(Inbound { generation, kind }).await.is_err() {
                        return; // session dropped
                    }
                }
                closed
            }
            Err(e) => {
                debug!(generation, "read error: {e}");
                let _ = tx.send(Inbound { generation, kind: InboundKind::Ended(Some(e.to_string())) }).await;
                true
            }
        };
        if ended {
            return;
        }
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

/// One connection at a time to a broadcast server.
///
/// Create with [`Session::new`], then [`connect`](Self::connect),
/// [`send`](Self::send), and drain [`next_event`](Self::next_event).
pub struct Session {
    state: SessionState,
    target: Option<ConnectionTarget>,
    writer: Option<LineWriter>,
    reader_task: Option<JoinHandle<()>>,
    /// Incremented for every connection attempt and every teardown.
    generation: u64,
    inbound_tx: mpsc::Sender<Inbound>,
    inbound_rx: mpsc::Receiver<Inbound>,
    /// Events raised by the control context itself (connect errors, etc.).
    pending: VecDeque<SessionEvent>,
    registry: ConnectionRegistry,
}

impl Session {
    pub fn new(registry: ConnectionRegistry) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(EVENT_QUEUE);
        Self {
            state: SessionState::Disconnected,
            target: None,
            writer: None,
            reader_task: None,
            generation: 0,
            inbound_tx,
            inbound_rx,
            pending: VecDeque::new(),
            registry,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The target of the current (or most recent) connection.
    pub fn target(&self) -> Option<&ConnectionTarget> {
        self.target.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.writer.is_some()
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Connect to `target`, replacing any existing connection.
    ///
    /// Failures are reported as a [`SessionEvent::Diagnostic`] and leave the
    /// session [`Disconnected`](SessionState::Disconnected).
    pub async fn connect(&mut self, target: ConnectionTarget) {
        self.teardown().await;

        self.generation += 1;
        self.state = SessionState::Connecting;
        self.target = Some(target.clone());
        info!(%target, generation = self.generation, "connecting");

        let (reader, writer) = match connect_plain(&target.host, target.port).await {
            Ok(halves) => halves,
            Err(e) => {
                warn!(%target, "connect failed: {e}");
                self.fail(&e.to_string());
                return;
            }
        };
        self.attach(target, reader, writer).await;
    }

    /// Log in over an already-open transport and start its read loop.
    pub(crate) async fn attach<R>(&mut self, target: ConnectionTarget, reader: LineReader<R>, mut writer: LineWriter)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        if let Err(e) = writer.send_raw(target.login_line().as_bytes()).await {
            warn!(%target, "login write failed: {e}");
            self.fail(&e.to_string());
            return;
        }
        debug!(username = %target.username, "login sent");

        self.state = SessionState::Authenticated;
        self.target = Some(target.clone());
        if let Err(e) = self.registry.record(&target) {
            warn!("could not record last connection: {e}");
        }

        self.writer = Some(writer);
        let tx = self.inbound_tx.clone();
        self.reader_task = Some(tokio::spawn(read_loop(reader, self.generation, tx)));
    }

    /// Write `msg` on the current connection.
    ///
    /// Returns `false` if nothing was written: either there is no connection
    /// (silently dropped) or the write failed.  A failed write ends the
    /// session: lines already read are still delivered, then one diagnostic
    /// unless the peer had closed cleanly, then [`SessionEvent::Disconnected`].
    pub async fn send(&mut self, msg: &OutboundMessage) -> bool {
        let Some(writer) = self.writer.as_mut() else {
            debug!(payload = %msg.payload, "no connection; dropping send");
            return false;
        };
        match writer.send(msg).await {
            Ok(()) => true,
            Err(e) => {
                warn!("send failed: {e}");
                self.abandon(&e.to_string()).await;
                false
            }
        }
    }

    /// Close the current connection, if any.  Emits no event.
    pub async fn disconnect(&mut self) {
        if self.is_connected() {
            info!(generation = self.generation, "disconnecting");
        }
        self.teardown().await;
    }

    /// Connect to the last recorded target.  Returns `false` if there is none.
    pub async fn reconnect_to_last(&mut self) -> bool {
        match self.registry.load() {
            Some(target) => {
                self.connect(target).await;
                true
            }
            None => {
                debug!("no last connection recorded");
                false
            }
        }
    }

    /// Wait for the next event for the display.
    ///
    /// Returns `None` only if the event channel has shut down, which cannot
    /// happen while the session is alive.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        loop {
            if let Some(ev) = self.pending.pop_front() {
                return Some(ev);
            }
            let msg = self.inbound_rx.recv().await?;
            if let Some(ev) = self.accept(msg) {
                return Some(ev);
            }
        }
    }

    /// Next event if one is ready, without waiting.
    pub fn try_next_event(&mut self) -> Option<SessionEvent> {
        loop {
            if let Some(ev) = self.pending.pop_front() {
                return Some(ev);
            }
            let msg = self.inbound_rx.try_recv().ok()?;
            if let Some(ev) = self.accept(msg) {
                return Some(ev);
            }
        }
    }

    // ── Internals ─────────────────────────────────────────────────────────

    /// Stop the read loop and close the socket.  Waits for the task to end
    /// so the old connection is fully released before returning.  Anything
    /// the loop queued is discarded.
    async fn teardown(&mut self) {
        if let Some(task) = self.reader_task.take() {
            task.abort();
            let _ = task.await;
        }
        self.close_writer().await;
        self.retire();
    }

    /// Tear down after a failed write without losing what was read.
    ///
    /// The read loop gets [`READER_GRACE`] to finish on its own; a peer that
    /// already closed is then reported as a clean end rather than as the
    /// write error.  Queued lines come first, then at most one diagnostic,
    /// then [`SessionEvent::Disconnected`].
    async fn abandon(&mut self, cause: &str) {
        self.close_writer().await;
        if let Some(mut task) = self.reader_task.take() {
            if timeout(READER_GRACE, &mut task).await.is_err() {
                task.abort();
                let _ = task.await;
            }
        }

        let mut clean_end = false;
        while let Ok(msg) = self.inbound_rx.try_recv() {
            if msg.generation != self.generation {
                continue;
            }
            match msg.kind {
                InboundKind::Line(line) => self.pending.push_back(SessionEvent::Line(line)),
                InboundKind::Ended(error) => clean_end = error.is_none(),
            }
        }
        self.retire();

        if clean_end {
            info!("server closed connection");
        } else {
            self.pending.push_back(diagnostic(cause));
        }
        self.pending.push_back(SessionEvent::Disconnected);
    }

    /// Invalidate everything still queued for the current generation.
    fn retire(&mut self) {
        self.generation += 1;
        self.state = SessionState::Disconnected;
    }

    async fn close_writer(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.shutdown().await;
        }
    }

    /// Apply one read-loop message.  End-of-loop handling queues its events
    /// on `pending` and returns `None`.
    fn accept(&mut self, msg: Inbound) -> Option<SessionEvent> {
        if msg.generation != self.generation {
            return None; // superseded or torn down
        }
        match msg.kind {
            InboundKind::Line(line) => Some(SessionEvent::Line(line)),
            InboundKind::Ended(error) => {
                // The task has already returned; dropping the write half
                // closes the socket.
                self.reader_task = None;
                self.writer = None;
                self.state = SessionState::Disconnected;
                match error {
                    None => info!(generation = self.generation, "server closed connection"),
                    Some(e) => {
                        warn!(generation = self.generation, "connection lost: {e}");
                        self.pending.push_back(diagnostic(&e));
                    }
                }
                self.pending.push_back(SessionEvent::Disconnected);
                None
            }
        }
    }

    fn fail(&mut self, cause: &str) {
        self.state = SessionState::Disconnected;
        self.pending.push_back(diagnostic(cause));
    }
}

fn diagnostic(cause: &str) -> SessionEvent {
    SessionEvent::Diagnostic(format!("Error: {cause}"))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
