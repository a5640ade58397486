//! Headless live-chat client: dual long-poll engine + widget state machine.
//!
//! ARCHITECTURE
//! ============
//! Two independent long-poll channels feed a shared message store:
//! a heavy "messages" channel (active only while the chat panel is open)
//! and a light "system count" channel (active whenever the user is
//! authenticated and the document is visible). The [`controller`] owns
//! both channels and translates panel/visibility/compose events into
//! channel starts/stops and one-shot HTTP calls.
//!
//! The library is UI-agnostic: rendered messages, notices and badge
//! updates are emitted as [`controller::WidgetEvent`]s over an mpsc
//! channel; `src/main.rs` is a terminal front-end over the same surface.

pub mod api;
pub mod backoff;
pub mod config;
pub mod controller;
pub mod draft;
pub mod message;
pub mod poll;
pub mod store;
pub mod transport;

pub use config::WidgetConfig;
pub use controller::{WidgetController, WidgetEvent};
pub use message::{Message, Sender};
pub use transport::{Encoding, HttpTransport, Transport, TransportError};
