//! Pushes language and state updates to the guest.

use log::{debug, error};

use exercise_protocol::{IframeState, MessageToIframe};

use crate::platform::MessagePort;
use crate::TransportError;

/// Tracks what the guest should see and what it was last sent.
///
/// Callers pass `None` for the port until the handshake has transferred
/// port B; updates made before that are held and sent by [`flush`].
///
/// [`flush`]: OutboundSync::flush
#[derive(Debug, Default)]
pub struct OutboundSync {
    language: Option<String>,
    desired_state: Option<IframeState>,
    last_posted: Option<IframeState>,
}

impl OutboundSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// The state last delivered to the port, if any.
    pub fn last_posted(&self) -> Option<&IframeState> {
        self.last_posted.as_ref()
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Record a new UI language and post it when the channel is open.
    pub fn set_language<P: MessagePort>(&mut self, language: &str, port: Option<&P>) {
        if self.language.as_deref() == Some(language) {
            return;
        }
        self.language = Some(language.to_string());
        if let Some(port) = port {
            self.post_language(port);
        }
    }

    /// Record the desired state and post it when the channel is open.
    pub fn set_state<P: MessagePort>(&mut self, state: Option<IframeState>, port: Option<&P>) {
        self.desired_state = state;
        if let Some(port) = port {
            self.post_state(port);
        }
    }

    /// Send everything held so far: language first, then state.
    pub fn flush<P: MessagePort>(&mut self, port: &P) {
        if self.language.is_some() {
            self.post_language(port);
        }
        self.post_state(port);
    }

    /// Forget what was posted, e.g. after the guest got a new port.
    pub fn reset(&mut self) {
        self.last_posted = None;
    }

    fn post_language<P: MessagePort>(&self, port: &P) {
        let Some(language) = &self.language else {
            return;
        };
        if let Err(e) = post(port, &MessageToIframe::set_language(language.clone())) {
            error!("[exercise-frame] Failed to post language: {}", e);
        }
    }

    /// Post the desired state unless it equals the last one delivered.
    ///
    /// `last_posted` is updated only after the post succeeded, so a failed
    /// post is retried by the next identical update.
    fn post_state<P: MessagePort>(&mut self, port: &P) {
        let Some(state) = &self.desired_state else {
            return;
        };
        if self.last_posted.as_ref() == Some(state) {
            debug!("[exercise-frame] State unchanged, not posting");
            return;
        }
        match post(port, &MessageToIframe::set_state(state.clone())) {
            Ok(()) => self.last_posted = Some(state.clone()),
            Err(e) => error!("[exercise-frame] Failed to post state: {}", e),
        }
    }
}

fn post<P: MessagePort>(port: &P, message: &MessageToIframe) -> Result<(), TransportError> {
    let value = message.to_value().map_err(|e| {
        TransportError::PostFailed(format!("cannot encode {}: {}", message.tag(), e))
    })?;
    port.post_message(&value)
}
