//! # exercise-iframe
//!
//! Host and guest sides of the sandboxed exercise iframe channel.
//!
//! The host page renders an untrusted exercise service inside a sandboxed
//! iframe. Instead of broadcasting on the window, the two sides share one
//! dedicated message channel:
//!
//! 1. The host mounts an [`ExerciseFrame`], which allocates a channel and
//!    arms a one-shot window listener.
//! 2. The guest's [`ParentConnection`] posts `"ready"` to its parent.
//! 3. The host verifies origin and source, then transfers port B with a
//!    `"communication-port"` message.
//! 4. Language and state flow host to guest on port A; answers, uploads and
//!    height changes flow back.
//!
//! ## Features
//!
//! - `web`: `web-sys` platform and `wasm-bindgen` exports for the browser
//!
//! ## Example
//!
//! ```ignore
//! use exercise_iframe::{ExerciseFrame, FrameProps, HostConfig};
//!
//! let mut frame = ExerciseFrame::new(platform, HostConfig::default());
//! frame.set_on_message(|message, _port| {
//!     log::info!("guest says {}", message.tag());
//!     Ok(())
//! });
//! let view = frame.update(&FrameProps {
//!     url: Some("https://exercises.example.com/quiz".to_string()),
//!     language: Some("en-US".to_string()),
//!     ..Default::default()
//! });
//! ```

mod channel;
mod config;
mod error;
mod guest;
mod handshake;
mod inbound;
mod lifecycle;
mod outbound;
pub mod platform;
#[cfg(feature = "web")]
pub mod web;

pub use channel::{create_channel, Channel};
pub use config::{HandshakeConfig, HostConfig, RecoveryConfig, RetryPolicy, SandboxConfig};
pub use error::{Error, Result, TransportError};
pub use guest::{HostMessageHandler, ParentConnection};
pub use handshake::{HandshakeCoordinator, HandshakeState, OriginPolicy};
pub use inbound::{dispatch, Dispatched, MessageConsumer};
pub use lifecycle::{ExerciseFrame, FrameProps, FrameView, IframeAttributes};
pub use outbound::OutboundSync;
pub use platform::{
    FrameElement, GuestPlatform, HostPlatform, ListenerAction, MessagePort, WindowMessage,
};
