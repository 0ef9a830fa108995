//! Notification relay: merges an agent's run stream with MCP server
//! notifications.
//!
//! Notification text is extracted ([`extract`]), streamed to the UI as a
//! synthetic assistant message ([`translator`]), and committed to the live
//! run's history ([`splicer`]) so later turns can refer to it. The
//! [`multiplexer`] drives both producers and decides when the notification
//! side is finished.

pub mod extract;
pub mod multiplexer;
pub mod run_state;
pub mod splicer;
pub mod translator;

pub use extract::extract_text_fragments;
pub use multiplexer::{relay, RelayEvent, RelayOptions};
pub use run_state::{InMemoryRunState, RunState};
pub use splicer::Splicer;
pub use translator::Translator;
