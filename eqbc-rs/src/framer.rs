//! Outbound command framing.
//!
//! Translates user text plus an [`Intent`] into an [`OutboundMessage`] and
//! the exact bytes that go on the wire.  Pure; no I/O.
//!
//! | Intent | Payload | Wire bytes |
//! |--------|---------|------------|
//! | [`Intent::PlainSend`] | `text` | `text\n` |
//! | [`Intent::TellTarget`] | `TELL text` | `<TAB>TELL text\n` |
//! | [`Intent::BroadcastAll`] | `MSGALL text` | `<TAB>MSGALL text\n` |
//!
//! The lowercase `/bct`, `/bca` and `/bcaa` forms are *input markers* only.
//! They select an intent and are replaced by the uppercase keyword before
//! anything reaches the server.

/// Byte placed before a line to mark it as a server command.
pub const CONTROL_BYTE: u8 = 0x09;

const TELL_KEYWORD: &str = "TELL";
const MSGALL_KEYWORD: &str = "MSGALL";

/// Input markers, longest first so `/bcaa ` wins over `/bca `.
const MARKERS: &[(&str, Intent)] = &[
    ("/bcaa ", Intent::BroadcastAll),
    ("/bca ", Intent::BroadcastAll),
    ("/bct ", Intent::TellTarget),
];

// ── Intent / Framing ──────────────────────────────────────────────────────────

/// Which affordance triggered a send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    /// Free-form text (Enter in the input line).
    PlainSend,
    /// Targeted tell (`TELL`).
    TellTarget,
    /// Broadcast to every connected peer (`MSGALL`).
    BroadcastAll,
}

impl Intent {
    /// The input marker for this intent, without the trailing space.
    pub fn marker(self) -> &'static str {
        match self {
            Intent::PlainSend => "",
            Intent::TellTarget => "/bct",
            Intent::BroadcastAll => "/bca",
        }
    }

    /// The protocol keyword placed in front of the payload, if any.
    pub fn keyword(self) -> Option<&'static str> {
        match self {
            Intent::PlainSend => None,
            Intent::TellTarget => Some(TELL_KEYWORD),
            Intent::BroadcastAll => Some(MSGALL_KEYWORD),
        }
    }
}

/// Whether an outbound line is chat text or a server command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    Chat,
    Command,
}

// ── OutboundMessage ───────────────────────────────────────────────────────────

/// A single line ready for the session's write path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub payload: String,
    pub framing: Framing,
}

impl OutboundMessage {
    pub fn chat(payload: impl Into<String>) -> Self {
        Self { payload: payload.into(), framing: Framing::Chat }
    }

    pub fn command(payload: impl Into<String>) -> Self {
        Self { payload: payload.into(), framing: Framing::Command }
    }

    /// Encode as wire bytes: optional control byte, UTF-8 payload, `\n`.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.payload.len() + 2);
        if self.framing == Framing::Command {
            buf.push(CONTROL_BYTE);
        }
        buf.extend_from_slice(self.payload.as_bytes());
        buf.push(b'\n');
        buf
    }
}

// ── Framing functions ─────────────────────────────────────────────────────────

/// Text to put back in the input field when an intent button is pressed on
/// an empty line.
pub fn suggest_prefill(intent: Intent) -> String {
    match intent {
        Intent::PlainSend => String::new(),
        other => format!("{} ", other.marker()),
    }
}

/// Frame `raw` for `intent`.  Returns `None` for blank input.
pub fn frame(raw: &str, intent: Intent) -> Option<OutboundMessage> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }
    Some(match intent.keyword() {
        None => OutboundMessage::chat(text),
        Some(kw) => OutboundMessage::command(format!("{kw} {text}")),
    })
}

/// Split a leading intent marker off `text`.
///
/// Returns the intent and everything after the marker's space.
pub fn split_marker(text: &str) -> Option<(Intent, &str)> {
    MARKERS
        .iter()
        .find_map(|&(marker, intent)| text.strip_prefix(marker).map(|rest| (intent, rest)))
}

/// Translate a hotkey body into an outbound message.
///
/// A body with a marker has the marker replaced by the protocol keyword and
/// is framed as a command; any other body is sent verbatim as chat.
pub fn translate_hotkey(body: &str) -> Option<OutboundMessage> {
    match split_marker(body) {
        Some((intent, rest)) => frame(rest, intent),
        None if body.trim().is_empty() => None,
        None => Some(OutboundMessage::chat(body)),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_send_is_trimmed_chat() {
        let msg = frame("  hello there  ", Intent::PlainSend).unwrap();
        assert_eq!(msg, OutboundMessage::chat("hello there"));
        assert_eq!(msg.to_wire(), b"hello there\n");
    }

    #[test]
    fn tell_is_command() {
        let msg = frame("Bob //sit", Intent::TellTarget).unwrap();
        assert_eq!(msg.payload, "TELL Bob //sit");
        assert_eq!(msg.framing, Framing::Command);
        assert_eq!(msg.to_wire(), b"\tTELL Bob //sit\n");
    }

    #[test]
    fn broadcast_is_command() {
        let msg = frame(" //stand ", Intent::BroadcastAll).unwrap();
        assert_eq!(msg.to_wire(), b"\tMSGALL //stand\n");
    }

    #[test]
    fn blank_input_frames_nothing() {
        for intent in [Intent::PlainSend, Intent::TellTarget, Intent::BroadcastAll] {
            assert!(frame("", intent).is_none());
            assert!(frame(" \t ", intent).is_none());
        }
    }

    #[test]
    fn prefill_is_marker_plus_space() {
        assert_eq!(suggest_prefill(Intent::TellTarget), "/bct ");
        assert_eq!(suggest_prefill(Intent::BroadcastAll), "/bca ");
        assert_eq!(suggest_prefill(Intent::PlainSend), "");
    }

    #[test]
    fn split_marker_prefers_longest() {
        assert_eq!(split_marker("/bcaa //sit"), Some((Intent::BroadcastAll, "//sit")));
        assert_eq!(split_marker("/bca //sit"), Some((Intent::BroadcastAll, "//sit")));
        assert_eq!(split_marker("/bct Bob hi"), Some((Intent::TellTarget, "Bob hi")));
    }

    #[test]
    fn split_marker_requires_space() {
        assert_eq!(split_marker("/bct"), None);
        assert_eq!(split_marker("/bctx foo"), None);
        assert_eq!(split_marker("say /bct foo"), None);
    }

    #[test]
    fn hotkey_with_marker_is_rewritten() {
        let msg = translate_hotkey("/bcaa //sit").unwrap();
        assert_eq!(msg, OutboundMessage::command("MSGALL //sit"));
        let msg = translate_hotkey("/bct Cleric //cast 1").unwrap();
        assert_eq!(msg, OutboundMessage::command("TELL Cleric //cast 1"));
    }

    #[test]
    fn hotkey_without_marker_is_verbatim_chat() {
        let msg = translate_hotkey("hail everyone ").unwrap();
        assert_eq!(msg, OutboundMessage::chat("hail everyone "));
    }

    #[test]
    fn blank_hotkeys_send_nothing() {
        assert!(translate_hotkey("").is_none());
        assert!(translate_hotkey("   ").is_none());
        assert!(translate_hotkey("/bct    ").is_none());
    }

    #[test]
    fn payload_utf8_is_preserved() {
        let msg = frame("héllo wörld", Intent::PlainSend).unwrap();
        assert_eq!(msg.to_wire(), "héllo wörld\n".as_bytes());
    }
}
