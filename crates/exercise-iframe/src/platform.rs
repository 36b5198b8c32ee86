//! Browser primitives the channel is built on.
//!
//! The host and guest logic only talks to these traits. The `web` feature
//! implements them over `web-sys`; tests use the in-memory platform from
//! `exercise-iframe-mock`.

use serde_json::Value;

use crate::TransportError;

/// What a window listener wants after handling an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerAction {
    /// Stay subscribed.
    Keep,
    /// Unsubscribe before the next event is delivered.
    Remove,
}

/// A `message` event delivered to a window.
#[derive(Debug, Clone)]
pub struct WindowMessage<W, P> {
    /// Origin of the sending document, `"null"` for opaque origins.
    pub origin: String,
    /// Window that posted the message, if known.
    pub source: Option<W>,
    /// Structured-clone payload as JSON.
    pub data: Value,
    /// Ports transferred with the message.
    pub ports: Vec<P>,
}

/// Callback for window `message` events.
pub type WindowHandler<W, P> = Box<dyn FnMut(&WindowMessage<W, P>) -> ListenerAction>;

/// Callback for messages arriving on a port.
pub type PortHandler = Box<dyn FnMut(Value)>;

/// One end of a message channel.
pub trait MessagePort: Clone {
    /// Post a JSON message to the other end.
    fn post_message(&self, message: &Value) -> Result<(), TransportError>;

    /// Replace the handler for incoming messages; `None` detaches it.
    fn set_onmessage(&self, handler: Option<PortHandler>);

    /// Stop delivering messages on this end.
    fn close(&self);
}

/// The `<iframe>` element rendered by the host.
pub trait FrameElement: Clone {
    type Window;

    /// Window of the embedded document, if it exists yet.
    fn content_window(&self) -> Option<Self::Window>;

    /// Set the `height` attribute, e.g. `"480px"`.
    fn set_height(&self, height: &str);
}

/// Browser services used by the host page.
pub trait HostPlatform: 'static {
    type Port: MessagePort + 'static;
    type Window: Clone + PartialEq + 'static;
    type Frame: FrameElement<Window = Self::Window> + 'static;
    /// Subscription handle; dropping it removes the listener.
    type Listener: 'static;

    /// Allocate a linked pair of ports.
    fn create_channel(&self) -> Result<(Self::Port, Self::Port), TransportError>;

    /// Listen for `message` events on the host window.
    fn add_window_listener(
        &self,
        handler: WindowHandler<Self::Window, Self::Port>,
    ) -> Self::Listener;

    /// Post a string to `target`, transferring `port` with it.
    fn post_port_to_window(
        &self,
        target: &Self::Window,
        message: &str,
        target_origin: &str,
        port: Self::Port,
    ) -> Result<(), TransportError>;

    /// Origin of the host document.
    fn location_origin(&self) -> String;

    /// Monotonic clock in milliseconds.
    fn now_ms(&self) -> f64;
}

/// Browser services used inside the exercise iframe.
pub trait GuestPlatform: 'static {
    type Port: MessagePort + 'static;
    type Window: Clone + PartialEq + 'static;
    /// Subscription handle; dropping it removes the listener.
    type Listener: 'static;
    /// Pending timeout; dropping it cancels the callback.
    type Timer: 'static;

    /// The embedding window, `None` when running top-level.
    fn parent(&self) -> Option<Self::Window>;

    /// Post a message to the embedding window.
    fn post_to_parent(&self, message: &Value, target_origin: &str) -> Result<(), TransportError>;

    /// Listen for `message` events on the guest window.
    fn add_window_listener(
        &self,
        handler: WindowHandler<Self::Window, Self::Port>,
    ) -> Self::Listener;

    /// Run `callback` once after `delay_ms`.
    fn set_timeout(&self, delay_ms: f64, callback: Box<dyn FnOnce()>) -> Self::Timer;

    /// Monotonic clock in milliseconds.
    fn now_ms(&self) -> f64;
}
