//! Client for EQBC-style broadcast servers.
//!
//! Layered leaves-first:
//!
//! - [`framer`]: intent + text → framed outbound line
//! - [`directive`]: input / hotkey → connect, send, prefill
//! - [`store`], [`registry`], [`hotkey`]: persisted state
//! - [`net`], [`session`]: the connection and its read loop
//! - [`event_loop`], [`display`], [`cli`]: the terminal front-end

pub mod cli;
pub mod directive;
pub mod display;
pub mod event_loop;
pub mod framer;
pub mod hotkey;
pub mod net;
pub mod registry;
pub mod session;
pub mod store;
