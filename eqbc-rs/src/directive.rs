//! User directives: what a line of input or a hotkey body turns into.
//!
//! Every entry point (input field, intent buttons, hotkeys) goes through
//! here before anything touches the session.  A `connect <host> <port>
//! <user>` directive is intercepted wherever it appears; everything else is
//! handed to the [framer](crate::framer).
//!
//! Malformed `connect` directives are dropped without a diagnostic.  This is
//! the established behaviour and callers rely on it.

use tracing::debug;

use crate::framer::{frame, split_marker, suggest_prefill, translate_hotkey, Intent, OutboundMessage};
use crate::registry::{parse_port, ConnectionTarget};

/// What the caller should do with a piece of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Open a new session to this target.
    Connect(ConnectionTarget),
    /// Write this message on the current session.
    Send(OutboundMessage),
    /// Put this text back into the input field.
    Prefill(String),
    /// Nothing to do.
    Ignore,
}

/// Result of looking for a `connect` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    NotConnect,
    Connect(ConnectionTarget),
    Malformed,
}

/// Recognise `connect <host> <port> <username>`.
///
/// Tokens past the third are ignored.
pub fn parse_connect(text: &str) -> Directive {
    let mut tokens = text.split_whitespace();
    if tokens.next() != Some("connect") {
        return Directive::NotConnect;
    }
    let (Some(host), Some(port), Some(username)) = (tokens.next(), tokens.next(), tokens.next())
    else {
        return Directive::Malformed;
    };
    match parse_port(port) {
        Some(port) => Directive::Connect(ConnectionTarget::new(host, port, username)),
        None => Directive::Malformed,
    }
}

fn connect_action(text: &str) -> Option<Action> {
    match parse_connect(text) {
        Directive::NotConnect => None,
        Directive::Connect(target) => Some(Action::Connect(target)),
        Directive::Malformed => {
            debug!(text, "ignoring malformed connect directive");
            Some(Action::Ignore)
        }
    }
}

/// Interpret text submitted through an explicit intent affordance.
pub fn interpret_input(raw: &str, intent: Intent) -> Action {
    if raw.trim().is_empty() {
        return match intent {
            Intent::PlainSend => Action::Ignore,
            _ => Action::Prefill(suggest_prefill(intent)),
        };
    }
    if let Some(action) = connect_action(raw) {
        return action;
    }
    frame(raw, intent).map_or(Action::Ignore, Action::Send)
}

/// Interpret a free-form line where a leading marker picks the intent.
///
/// `/bct Bob hi` is a tell to `Bob hi`; a bare `/bct` asks for the prefill.
pub fn interpret_line(raw: &str) -> Action {
    let trimmed = raw.trim();
    for intent in [Intent::TellTarget, Intent::BroadcastAll] {
        if trimmed == intent.marker() {
            return interpret_input("", intent);
        }
    }
    if trimmed == "/bcaa" {
        return interpret_input("", Intent::BroadcastAll);
    }
    match split_marker(raw.trim_start()) {
        Some((intent, rest)) => interpret_input(rest, intent),
        None => interpret_input(raw, Intent::PlainSend),
    }
}

/// Interpret a hotkey body.
pub fn interpret_hotkey(body: &str) -> Action {
    if let Some(action) = connect_action(body) {
        return action;
    }
    translate_hotkey(body).map_or(Action::Ignore, Action::Send)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
