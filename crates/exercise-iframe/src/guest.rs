//! Guest side of the handshake, running inside the exercise iframe.
//!
//! The guest cannot know when the host's listener is armed, so it keeps
//! announcing `"ready"` with exponential backoff until the parent window
//! answers with a `"communication-port"` message carrying a port.

use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use log::{debug, error, info, warn};
use serde_json::Value;

use exercise_protocol::wire::{is_communication_port_message, ANY_TARGET_ORIGIN, READY_MESSAGE};
use exercise_protocol::{classify_to_iframe, MessageFromIframe, MessageToIframe};

use crate::config::RetryPolicy;
use crate::inbound::panic_reason;
use crate::platform::{GuestPlatform, ListenerAction, MessagePort, PortHandler, WindowMessage};
use crate::TransportError;

/// Receives validated host messages together with the port for replies.
pub type HostMessageHandler<P> = Box<dyn FnMut(MessageToIframe, &P) -> anyhow::Result<()>>;

type HandlerSlot<P> = RefCell<Option<HostMessageHandler<P>>>;

/// Connection from an exercise iframe to its host page.
pub struct ParentConnection<G: GuestPlatform> {
    inner: Rc<RefCell<Connection<G>>>,
    handler: Rc<HandlerSlot<G::Port>>,
    _listener: Option<G::Listener>,
}

struct Connection<G: GuestPlatform> {
    platform: Rc<G>,
    parent: Option<G::Window>,
    policy: RetryPolicy,
    port: Option<G::Port>,
    announcements: u32,
    retry: Option<G::Timer>,
}

impl<G: GuestPlatform> ParentConnection<G> {
    /// Start announcing `"ready"` to the parent window.
    pub fn connect(platform: G, policy: RetryPolicy) -> Self {
        let platform = Rc::new(platform);
        let parent = platform.parent();
        let inner = Rc::new(RefCell::new(Connection {
            platform: platform.clone(),
            parent,
            policy,
            port: None,
            announcements: 0,
            retry: None,
        }));
        let handler: Rc<HandlerSlot<G::Port>> = Rc::new(RefCell::new(None));

        if inner.borrow().parent.is_none() {
            warn!("[parent-connection] Not embedded in a parent window, not connecting");
            return Self {
                inner,
                handler,
                _listener: None,
            };
        }

        let listener = platform.add_window_listener(port_listener(
            Rc::downgrade(&inner),
            Rc::downgrade(&handler),
        ));
        announce(&inner);

        Self {
            inner,
            handler,
            _listener: Some(listener),
        }
    }

    /// Register the handler for host messages. The latest handler wins.
    pub fn set_on_message<F>(&mut self, handler: F)
    where
        F: FnMut(MessageToIframe, &G::Port) -> anyhow::Result<()> + 'static,
    {
        *self.handler.borrow_mut() = Some(Box::new(handler));
    }

    /// The port received from the host, once connected.
    pub fn port(&self) -> Option<G::Port> {
        self.inner.borrow().port.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.borrow().port.is_some()
    }

    /// Number of `"ready"` messages posted so far.
    pub fn announcements(&self) -> u32 {
        self.inner.borrow().announcements
    }

    /// Post a message to the host.
    pub fn send(&self, message: &MessageFromIframe) -> Result<(), TransportError> {
        let port = self.port().ok_or_else(|| {
            TransportError::ChannelUnavailable("not connected to parent".to_string())
        })?;
        let value = message.to_value().map_err(|e| {
            TransportError::PostFailed(format!("cannot encode {}: {}", message.tag(), e))
        })?;
        port.post_message(&value)
    }
}

impl<G: GuestPlatform> Drop for ParentConnection<G> {
    fn drop(&mut self) {
        let mut inner = self.inner.borrow_mut();
        inner.retry = None;
        if let Some(port) = &inner.port {
            port.set_onmessage(None);
        }
    }
}

/// Post `"ready"` and schedule the next attempt.
fn announce<G: GuestPlatform>(inner: &Rc<RefCell<Connection<G>>>) {
    let mut conn = inner.borrow_mut();
    if conn.port.is_some() {
        return;
    }

    let ready = Value::String(READY_MESSAGE.to_string());
    if let Err(e) = conn.platform.post_to_parent(&ready, ANY_TARGET_ORIGIN) {
        warn!("[parent-connection] Failed to post ready: {}", e);
    }

    let delay = conn.policy.delay_ms(conn.announcements);
    conn.announcements += 1;
    debug!(
        "[parent-connection] Sent ready ({}), retrying in {}ms",
        conn.announcements, delay
    );

    let weak = Rc::downgrade(inner);
    let timer = conn.platform.set_timeout(
        delay as f64,
        Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                announce(&inner);
            }
        }),
    );
    conn.retry = Some(timer);
}

fn port_listener<G: GuestPlatform>(
    inner: Weak<RefCell<Connection<G>>>,
    handler: Weak<HandlerSlot<G::Port>>,
) -> Box<dyn FnMut(&WindowMessage<G::Window, G::Port>) -> ListenerAction> {
    Box::new(move |event| {
        let Some(conn_rc) = inner.upgrade() else {
            return ListenerAction::Remove;
        };
        let mut conn = conn_rc.borrow_mut();

        if conn.parent.is_none() || event.source.as_ref() != conn.parent.as_ref() {
            return ListenerAction::Keep;
        }
        if !is_communication_port_message(&event.data) {
            return ListenerAction::Keep;
        }
        let Some(port) = event.ports.first() else {
            warn!("[parent-connection] communication-port message without a port");
            return ListenerAction::Keep;
        };
        if conn.port.is_some() {
            debug!("[parent-connection] Ignoring additional communication port");
            return ListenerAction::Keep;
        }

        // The handler must be in place before anyone can post to the port.
        port.set_onmessage(Some(host_message_handler(
            Rc::downgrade(&conn_rc),
            handler.clone(),
        )));
        conn.port = Some(port.clone());
        conn.retry = None;
        info!(
            "[parent-connection] Connected to parent after {} announcement(s)",
            conn.announcements
        );
        ListenerAction::Keep
    })
}

fn host_message_handler<G: GuestPlatform>(
    inner: Weak<RefCell<Connection<G>>>,
    handler: Weak<HandlerSlot<G::Port>>,
) -> PortHandler {
    Box::new(move |payload| {
        let message = match classify_to_iframe(&payload) {
            Ok(message) => message,
            Err(e) => {
                warn!("[parent-connection] Discarding invalid message from parent: {}", e);
                return;
            }
        };
        let Some(conn) = inner.upgrade() else {
            return;
        };
        let Some(port) = conn.borrow().port.clone() else {
            return;
        };
        let Some(slot) = handler.upgrade() else {
            return;
        };

        let taken = slot.borrow_mut().take();
        let Some(mut current) = taken else {
            debug!("[parent-connection] No handler for {} message", message.tag());
            return;
        };
        let tag = message.tag();
        match catch_unwind(AssertUnwindSafe(|| current(message, &port))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("[parent-connection] onMessage failed on {}: {:#}", tag, e),
            Err(panic) => error!(
                "[parent-connection] onMessage crashed on {}: {}",
                tag,
                panic_reason(panic.as_ref())
            ),
        }
        let mut slot = slot.borrow_mut();
        if slot.is_none() {
            *slot = Some(current);
        }
    })
}
