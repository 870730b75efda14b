//! Main async event loop: the line-mode terminal front-end.
//!
//! ## Architecture
//!
//! The [`Session`] read loop runs in its own spawned task; its lines reach
//! [`EventLoop::run`] through [`Session::next_event`].  Keyboard input is
//! read on a dedicated thread and forwarded over an [`mpsc`] channel.
//!
//! ```text
//!   ┌──────────────────────────┐
//!   │  EventLoop::run()        │
//!   │  tokio::select! over:    │
//!   │  • stdin lines           │◄── stdin thread
//!   │  • session.next_event()  │◄── read-loop task
//!   │  • Ctrl-C                │
//!   └──────────────────────────┘
//! ```
//!
//! ## Client commands
//!
//! | Input | Effect |
//! |-------|--------|
//! | `connect <host> <port> <name>` | open a session |
//! | `/bct <text>`, `/bca <text>` | tell / broadcast |
//! | `/hotkeys` | list hotkey slots |
//! | `/hk <n>` | trigger hotkey `n` (1-based) |
//! | `/sethk <n> <text>` | replace hotkey `n` |
//! | `/addhk <text>` | append a hotkey |
//! | `/reconnect` | reconnect to the last server |
//! | `/dc` | disconnect |
//! | `/quit` | exit |
//!
//! Anything else is sent as chat.

use std::io;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::directive::{interpret_hotkey, interpret_line, Action};
use crate::display::Display;
use crate::hotkey::HotkeyStore;
use crate::registry::{ConnectionRegistry, ConnectionTarget};
use crate::session::{Session, SessionEvent, SessionState};
use crate::store::SharedStore;

/// Ties the session, hotkeys and display together.
pub struct EventLoop {
    session: Session,
    hotkeys: HotkeyStore,
    display: Box<dyn Display + Send>,
    /// Set to `true` to exit the main loop after the current iteration.
    quit: bool,
}

impl EventLoop {
    pub fn new(store: SharedStore, display: Box<dyn Display + Send>) -> Self {
        Self {
            session: Session::new(ConnectionRegistry::new(store.clone())),
            hotkeys: HotkeyStore::load(store),
            display,
            quit: false,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn push_output(&mut self, line: &str) {
        self.display.show(line);
    }

    /// Connect to `target` and report the outcome.
    pub async fn connect(&mut self, target: ConnectionTarget) {
        self.push_output(&format!("% Connecting to {target}"));
        self.session.connect(target).await;
        self.report_connected();
    }

    /// Reconnect to the last server, if one is recorded.
    pub async fn reconnect(&mut self) {
        if self.session.reconnect_to_last().await {
            self.report_connected();
        } else {
            self.push_output("% No previous connection");
        }
    }

    fn report_connected(&mut self) {
        if self.session.state() == SessionState::Authenticated {
            if let Some(target) = self.session.target() {
                let msg = format!("% Connected to {target}");
                self.push_output(&msg);
            }
        }
    }

    // ── Main loop ─────────────────────────────────────────────────────────

    /// Run until `/quit`, end of input, or Ctrl-C.
    pub async fn run(&mut self) -> io::Result<()> {
        // A dedicated thread owns stdin; tokio::io::stdin() would orphan a
        // blocking reader every time select! drops its future.
        let (stdin_tx, mut stdin_rx) = mpsc::channel::<String>(16);
        std::thread::spawn(move || {
            use std::io::BufRead;
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if stdin_tx.blocking_send(line).is_err() {
                    break; // event loop exited
                }
            }
        });

        while !self.quit {
            tokio::select! {
                line = stdin_rx.recv() => match line {
                    Some(line) => self.dispatch_line(&line).await,
                    None => {
                        debug!("stdin closed");
                        self.quit = true;
                    }
                },
                Some(ev) = self.session.next_event() => self.handle_session_event(ev),
                _ = tokio::signal::ctrl_c() => self.quit = true,
            }
        }

        self.session.disconnect().await;
        info!("exiting");
        Ok(())
    }

    // ── Input dispatch ────────────────────────────────────────────────────

    pub async fn dispatch_line(&mut self, line: &str) {
        let trimmed = line.trim();
        let Some(rest) = trimmed.strip_prefix('/') else {
            self.perform(interpret_line(line)).await;
            return;
        };
        let (cmd, args) = rest
            .split_once(char::is_whitespace)
            .map(|(c, a)| (c, a.trim()))
            .unwrap_or((rest, ""));

        match cmd {
            "quit" => self.quit = true,
            "dc" => {
                self.session.disconnect().await;
                self.push_output("% Disconnected");
            }
            "reconnect" => self.reconnect().await,
            "hotkeys" => self.list_hotkeys(),
            "hk" => match self.slot_index(args) {
                Some(i) => self.trigger_hotkey(i).await,
                None => self.push_output("% usage: /hk <n>"),
            },
            "sethk" => {
                let (n, body) = args.split_once(char::is_whitespace).unwrap_or((args, ""));
                match self.slot_index(n) {
                    Some(i) => self.edit_hotkey(i, body.trim()),
                    None => self.push_output("% usage: /sethk <n> <text>"),
                }
            }
            "addhk" => self.add_hotkey(args),
            // Markers and unknown slash text go to the server.
            _ => self.perform(interpret_line(line)).await,
        }
    }

    /// Carry out a directive.
    pub async fn perform(&mut self, action: Action) {
        match action {
            Action::Connect(target) => self.connect(target).await,
            Action::Send(msg) => {
                self.session.send(&msg).await;
            }
            Action::Prefill(text) => self.push_output(&format!("% prefill: {text}")),
            Action::Ignore => {}
        }
    }

    // ── Hotkeys ───────────────────────────────────────────────────────────

    /// Parse a 1-based slot number.
    fn slot_index(&self, s: &str) -> Option<usize> {
        s.parse::<usize>().ok()?.checked_sub(1)
    }

    fn list_hotkeys(&mut self) {
        let lines: Vec<String> = self
            .hotkeys
            .hotkeys()
            .iter()
            .enumerate()
            .map(|(i, body)| format!("% {:>2}: {body}", i + 1))
            .collect();
        for line in lines {
            self.push_output(&line);
        }
    }

    pub async fn trigger_hotkey(&mut self, index: usize) {
        match self.hotkeys.get(index).map(interpret_hotkey) {
            Some(action) => self.perform(action).await,
            None => {
                let msg = format!("% no hotkey slot {} (have {})", index + 1, self.hotkeys.len());
                self.push_output(&msg);
            }
        }
    }

    fn edit_hotkey(&mut self, index: usize, body: &str) {
        let result = self.hotkeys.set(index, body);
        match result {
            Ok(()) => self.persist_hotkeys(),
            Err(e) => self.push_output(&format!("% {e}")),
        }
    }

    fn add_hotkey(&mut self, body: &str) {
        match self.hotkeys.add(body) {
            Ok(i) => {
                self.push_output(&format!("% added hotkey {}", i + 1));
                self.persist_hotkeys();
            }
            Err(e) => self.push_output(&format!("% {e}")),
        }
    }

    fn persist_hotkeys(&mut self) {
        if let Err(e) = self.hotkeys.persist() {
            self.push_output(&format!("% could not save hotkeys: {e}"));
        }
    }

    // ── Session events ────────────────────────────────────────────────────

    pub fn handle_session_event(&mut self, ev: SessionEvent) {
        match ev {
            SessionEvent::Line(line) => self.push_output(&line),
            SessionEvent::Diagnostic(line) => self.push_output(&line),
            SessionEvent::Disconnected => self.push_output("% Disconnected"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
