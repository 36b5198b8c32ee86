//! One-shot port hand-off over the window bridge.
//!
//! The guest announces itself with the bare string `"ready"`. The host checks
//! where the announcement came from, then posts `"communication-port"` to the
//! iframe's window with port B as the only transferable.

use log::{debug, error, info, warn};

use exercise_protocol::wire::{is_ready_message, COMMUNICATION_PORT_MESSAGE, SANDBOXED_ORIGIN};

use crate::channel::Channel;
use crate::platform::{FrameElement, HostPlatform, ListenerAction, WindowMessage};
use crate::TransportError;

/// Progress of the hand-off.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HandshakeState {
    /// Listening for `"ready"`.
    Armed,
    /// Port B was posted at `at_ms`.
    Transferred { at_ms: f64 },
    /// The hand-off failed and will not be retried.
    Stalled,
}

/// Which origins may announce `"ready"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginPolicy {
    pub sandboxed: bool,
    pub allow_same_origin: bool,
    /// Origin of the host document.
    pub host_origin: String,
}

impl OriginPolicy {
    /// Whether a message from `origin` may take part in the handshake.
    pub fn accepts(&self, origin: &str) -> bool {
        if !self.sandboxed {
            return true;
        }
        origin == SANDBOXED_ORIGIN || (self.allow_same_origin && origin == self.host_origin)
    }
}

/// Result of checking one window event.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ReadyCheck<W> {
    /// A `"ready"` from the iframe's own window.
    Verified(W),
    /// Not a handshake message for this iframe.
    Ignored,
    /// A `"ready"` without a source window arrived while the iframe has no
    /// content window.
    Unresolvable,
}

/// Verify that `event` is a `"ready"` from the iframe behind `frame`.
pub(crate) fn check_ready<F: FrameElement, P>(
    policy: &OriginPolicy,
    event: &WindowMessage<F::Window, P>,
    frame: Option<&F>,
) -> ReadyCheck<F::Window>
where
    F::Window: PartialEq,
{
    let ready = is_ready_message(&event.data);
    if !policy.accepts(&event.origin) {
        if ready {
            warn!(
                "[exercise-frame] Ignoring ready message from unexpected origin {}",
                event.origin
            );
        }
        return ReadyCheck::Ignored;
    }
    if !ready {
        return ReadyCheck::Ignored;
    }

    // Without a content window no source can match; only a sourceless ready
    // is attributed to this iframe.
    match (event.source.as_ref(), frame.and_then(FrameElement::content_window)) {
        (Some(source), Some(content_window)) if *source == content_window => {
            ReadyCheck::Verified(content_window)
        }
        (None, None) => ReadyCheck::Unresolvable,
        _ => {
            warn!("[exercise-frame] Ignoring ready message from a window other than the iframe");
            ReadyCheck::Ignored
        }
    }
}

/// Post `port` to `window` as the `"communication-port"` message.
pub(crate) fn transfer_port<H: HostPlatform>(
    platform: &H,
    window: &H::Window,
    target_origin: &str,
    port: H::Port,
) -> Result<(), TransportError> {
    platform.post_port_to_window(window, COMMUNICATION_PORT_MESSAGE, target_origin, port)
}

/// Drives the hand-off for one channel.
#[derive(Debug)]
pub struct HandshakeCoordinator {
    policy: OriginPolicy,
    target_origin: String,
    state: HandshakeState,
}

impl HandshakeCoordinator {
    pub fn new(policy: OriginPolicy, target_origin: impl Into<String>) -> Self {
        Self {
            policy,
            target_origin: target_origin.into(),
            state: HandshakeState::Armed,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Time of the transfer, once it happened.
    pub fn transferred_at(&self) -> Option<f64> {
        match self.state {
            HandshakeState::Transferred { at_ms } => Some(at_ms),
            _ => None,
        }
    }

    pub fn policy(&self) -> &OriginPolicy {
        &self.policy
    }

    pub fn target_origin(&self) -> &str {
        &self.target_origin
    }

    /// Record a transfer made outside the window listener.
    pub(crate) fn mark_transferred(&mut self, at_ms: f64) {
        self.state = HandshakeState::Transferred { at_ms };
    }

    /// Handle one window event while armed.
    ///
    /// Returns [`ListenerAction::Remove`] once the coordinator reached a
    /// terminal state; events after that are rejected without inspection.
    pub fn handle_event<H: HostPlatform>(
        &mut self,
        platform: &H,
        event: &WindowMessage<H::Window, H::Port>,
        frame: Option<&H::Frame>,
        channel: &mut Channel<H::Port>,
    ) -> ListenerAction {
        if self.state != HandshakeState::Armed {
            return ListenerAction::Remove;
        }

        let window = match check_ready(&self.policy, event, frame) {
            ReadyCheck::Verified(window) => window,
            ReadyCheck::Ignored => return ListenerAction::Keep,
            ReadyCheck::Unresolvable => {
                error!("[exercise-frame] Received ready but the iframe has no content window");
                self.state = HandshakeState::Stalled;
                return ListenerAction::Remove;
            }
        };

        let Some(port) = channel.take_remote() else {
            error!("[exercise-frame] Port was already transferred");
            self.state = HandshakeState::Stalled;
            return ListenerAction::Remove;
        };

        match transfer_port(platform, &window, &self.target_origin, port) {
            Ok(()) => {
                let at_ms = platform.now_ms();
                info!("[exercise-frame] Transferred communication port to iframe");
                debug!("[exercise-frame] Handshake completed at {}ms", at_ms);
                self.state = HandshakeState::Transferred { at_ms };
            }
            Err(e) => {
                error!("[exercise-frame] Failed to transfer communication port: {}", e);
                self.state = HandshakeState::Stalled;
            }
        }
        ListenerAction::Remove
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Clone)]
    struct TestFrame(Option<u32>);

    impl FrameElement for TestFrame {
        type Window = u32;

        fn content_window(&self) -> Option<u32> {
            self.0
        }

        fn set_height(&self, _height: &str) {}
    }

    fn policy() -> OriginPolicy {
        OriginPolicy {
            sandboxed: true,
            allow_same_origin: false,
            host_origin: "https://courses.example.com".to_string(),
        }
    }

    fn event(origin: &str, source: Option<u32>, data: serde_json::Value) -> WindowMessage<u32, ()> {
        WindowMessage {
            origin: origin.to_string(),
            source,
            data,
            ports: Vec::new(),
        }
    }

    #[test]
    fn sandboxed_origin_rules() {
        let strict = policy();
        assert!(strict.accepts("null"));
        assert!(!strict.accepts("https://courses.example.com"));

        let dev = OriginPolicy {
            allow_same_origin: true,
            ..policy()
        };
        assert!(dev.accepts("https://courses.example.com"));
        assert!(!dev.accepts("https://evil.example.com"));

        let unsandboxed = OriginPolicy {
            sandboxed: false,
            ..policy()
        };
        assert!(unsandboxed.accepts("https://anything.example.com"));
    }

    #[test]
    fn ready_must_come_from_the_content_window() {
        let frame = TestFrame(Some(7));
        let ok = event("null", Some(7), json!("ready"));
        assert_eq!(check_ready(&policy(), &ok, Some(&frame)), ReadyCheck::Verified(7));

        let other = event("null", Some(8), json!("ready"));
        assert_eq!(check_ready(&policy(), &other, Some(&frame)), ReadyCheck::Ignored);

        let wrapped = event("null", Some(7), json!({ "message": "ready" }));
        assert_eq!(check_ready(&policy(), &wrapped, Some(&frame)), ReadyCheck::Ignored);
    }

    #[test]
    fn ready_without_content_window_is_ignored() {
        let ready = event("null", Some(7), json!("ready"));
        assert_eq!(
            check_ready(&policy(), &ready, Some(&TestFrame(None))),
            ReadyCheck::Ignored
        );
        assert_eq!(
            check_ready::<TestFrame, ()>(&policy(), &ready, None),
            ReadyCheck::Ignored
        );
    }

    #[test]
    fn sourceless_ready_without_content_window_is_unresolvable() {
        let ready = event("null", None, json!("ready"));
        assert_eq!(
            check_ready(&policy(), &ready, Some(&TestFrame(None))),
            ReadyCheck::Unresolvable
        );
        assert_eq!(
            check_ready(&policy(), &ready, Some(&TestFrame(Some(7)))),
            ReadyCheck::Ignored
        );
    }
}
