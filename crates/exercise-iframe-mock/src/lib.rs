//! Mock browser platform for testing exercise-iframe
//!
//! This provides in-memory implementations of the platform traits so host and
//! guest logic can be tested without a browser. Nothing is delivered
//! asynchronously: tests decide when window messages, port messages and timers
//! fire.

mod logging;

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use exercise_iframe::platform::{
    FrameElement, GuestPlatform, HostPlatform, ListenerAction, MessagePort, PortHandler,
    WindowHandler, WindowMessage,
};
use exercise_iframe::TransportError;
use serde_json::Value;

pub use logging::{capture_logs, LogCapture};

/// Window message carrying mock windows and ports.
pub type MockWindowMessage = WindowMessage<MockWindow, MockPort>;

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// One end of an in-memory message channel.
#[derive(Clone)]
pub struct MockPort {
    inner: Rc<PortInner>,
}

struct PortInner {
    id: u64,
    /// Messages posted on this end, oldest first
    sent: RefCell<Vec<Value>>,
    handler: RefCell<Option<PortHandler>>,
    peer: RefCell<Weak<PortInner>>,
    closed: Cell<bool>,
    fail_posts: Cell<bool>,
}

impl MockPort {
    fn pair(first_id: u64) -> (MockPort, MockPort) {
        let a = Rc::new(PortInner::new(first_id));
        let b = Rc::new(PortInner::new(first_id + 1));
        *a.peer.borrow_mut() = Rc::downgrade(&b);
        *b.peer.borrow_mut() = Rc::downgrade(&a);
        (MockPort { inner: a }, MockPort { inner: b })
    }

    /// Identifier unique within one platform
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Messages posted on this end
    pub fn sent(&self) -> Vec<Value> {
        self.inner.sent.borrow().clone()
    }

    /// Messages posted on this end with the given `message` tag
    pub fn sent_with_tag(&self, tag: &str) -> Vec<Value> {
        self.sent()
            .into_iter()
            .filter(|m| m.get("message").and_then(Value::as_str) == Some(tag))
            .collect()
    }

    /// Forget recorded posts
    pub fn clear_sent(&self) {
        self.inner.sent.borrow_mut().clear();
    }

    /// The other end of the channel, while it is alive
    pub fn peer(&self) -> Option<MockPort> {
        self.inner
            .peer
            .borrow()
            .upgrade()
            .map(|inner| MockPort { inner })
    }

    /// Deliver `message` to this end's handler, as if the peer had posted it.
    ///
    /// Returns false when no handler is installed or the port is closed.
    pub fn deliver(&self, message: Value) -> bool {
        if self.inner.closed.get() {
            return false;
        }
        let taken = self.inner.handler.borrow_mut().take();
        let Some(mut handler) = taken else {
            return false;
        };
        handler(message);
        let mut slot = self.inner.handler.borrow_mut();
        if slot.is_none() {
            *slot = Some(handler);
        }
        true
    }

    /// Post on this end and deliver to the peer's handler
    pub fn send_to_peer(&self, message: Value) -> bool {
        if self.post_message(&message).is_err() {
            return false;
        }
        self.peer().is_some_and(|peer| peer.deliver(message))
    }

    pub fn has_handler(&self) -> bool {
        self.inner.handler.borrow().is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.get()
    }

    /// Make subsequent posts fail
    pub fn set_fail_posts(&self, fail: bool) {
        self.inner.fail_posts.set(fail);
    }
}

impl PortInner {
    fn new(id: u64) -> Self {
        Self {
            id,
            sent: RefCell::new(Vec::new()),
            handler: RefCell::new(None),
            peer: RefCell::new(Weak::new()),
            closed: Cell::new(false),
            fail_posts: Cell::new(false),
        }
    }
}

impl PartialEq for MockPort {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for MockPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MockPort({})", self.inner.id)
    }
}

impl MessagePort for MockPort {
    fn post_message(&self, message: &Value) -> Result<(), TransportError> {
        if self.inner.fail_posts.get() {
            return Err(TransportError::PostFailed("mock port rejects posts".to_string()));
        }
        if self.inner.closed.get() {
            return Err(TransportError::PostFailed("port is closed".to_string()));
        }
        self.inner.sent.borrow_mut().push(message.clone());
        Ok(())
    }

    fn set_onmessage(&self, handler: Option<PortHandler>) {
        *self.inner.handler.borrow_mut() = handler;
    }

    fn close(&self) {
        self.inner.closed.set(true);
    }
}

// ---------------------------------------------------------------------------
// Windows and frames
// ---------------------------------------------------------------------------

/// A post received by a [`MockWindow`].
#[derive(Debug, Clone)]
pub struct WindowPost {
    pub message: Value,
    pub target_origin: String,
    pub transfer: Vec<MockPort>,
}

/// A browsing context that records what is posted to it.
#[derive(Clone)]
pub struct MockWindow {
    inner: Rc<WindowInner>,
}

struct WindowInner {
    name: String,
    posts: RefCell<Vec<WindowPost>>,
    fail_posts: Cell<bool>,
}

impl MockWindow {
    pub fn new(name: &str) -> Self {
        Self {
            inner: Rc::new(WindowInner {
                name: name.to_string(),
                posts: RefCell::new(Vec::new()),
                fail_posts: Cell::new(false),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Everything posted to this window
    pub fn posts(&self) -> Vec<WindowPost> {
        self.inner.posts.borrow().clone()
    }

    /// Ports transferred to this window, oldest first
    pub fn transferred_ports(&self) -> Vec<MockPort> {
        self.inner
            .posts
            .borrow()
            .iter()
            .flat_map(|post| post.transfer.iter().cloned())
            .collect()
    }

    /// Make subsequent posts fail
    pub fn set_fail_posts(&self, fail: bool) {
        self.inner.fail_posts.set(fail);
    }

    fn record(&self, post: WindowPost) -> Result<(), TransportError> {
        if self.inner.fail_posts.get() {
            return Err(TransportError::PostFailed(format!(
                "{} rejects posts",
                self.inner.name
            )));
        }
        self.inner.posts.borrow_mut().push(post);
        Ok(())
    }
}

impl PartialEq for MockWindow {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for MockWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MockWindow({})", self.inner.name)
    }
}

/// An `<iframe>` element.
#[derive(Clone)]
pub struct MockFrame {
    content_window: Rc<RefCell<Option<MockWindow>>>,
    height: Rc<RefCell<Option<String>>>,
}

impl MockFrame {
    /// A frame whose document is `window`
    pub fn new(window: &MockWindow) -> Self {
        Self {
            content_window: Rc::new(RefCell::new(Some(window.clone()))),
            height: Rc::new(RefCell::new(None)),
        }
    }

    /// A frame without a document yet
    pub fn detached() -> Self {
        Self {
            content_window: Rc::new(RefCell::new(None)),
            height: Rc::new(RefCell::new(None)),
        }
    }

    /// Last value written to the `height` attribute
    pub fn height(&self) -> Option<String> {
        self.height.borrow().clone()
    }

    pub fn set_content_window(&self, window: Option<MockWindow>) {
        *self.content_window.borrow_mut() = window;
    }
}

impl FrameElement for MockFrame {
    type Window = MockWindow;

    fn content_window(&self) -> Option<MockWindow> {
        self.content_window.borrow().clone()
    }

    fn set_height(&self, height: &str) {
        *self.height.borrow_mut() = Some(height.to_string());
    }
}

// ---------------------------------------------------------------------------
// Shared browser core: listeners, clock, timers
// ---------------------------------------------------------------------------

type SharedHandler = Rc<RefCell<WindowHandler<MockWindow, MockPort>>>;

struct TimerEntry {
    id: u64,
    due: f64,
    callback: Box<dyn FnOnce()>,
}

#[derive(Default)]
struct Core {
    /// Simulated time in milliseconds
    now: Cell<f64>,
    next_id: Cell<u64>,
    listeners: RefCell<Vec<(u64, SharedHandler)>>,
    timers: RefCell<Vec<TimerEntry>>,
    /// Delay of every timeout ever scheduled
    scheduled_delays: RefCell<Vec<f64>>,
}

impl Core {
    fn next_id(&self) -> u64 {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        id
    }

    fn add_listener(self: &Rc<Self>, handler: WindowHandler<MockWindow, MockPort>) -> MockListener {
        let id = self.next_id();
        self.listeners
            .borrow_mut()
            .push((id, Rc::new(RefCell::new(handler))));
        MockListener {
            id,
            core: Rc::downgrade(self),
        }
    }

    fn remove_listener(&self, id: u64) {
        self.listeners.borrow_mut().retain(|(entry, _)| *entry != id);
    }

    /// Deliver to a snapshot of the listeners registered before the call.
    fn dispatch(&self, message: &MockWindowMessage) -> usize {
        let snapshot: Vec<(u64, SharedHandler)> = self.listeners.borrow().clone();
        let mut delivered = 0;
        for (id, handler) in snapshot {
            let registered = self.listeners.borrow().iter().any(|(entry, _)| *entry == id);
            if !registered {
                continue;
            }
            let Ok(mut handler) = handler.try_borrow_mut() else {
                continue;
            };
            delivered += 1;
            if (*handler)(message) == ListenerAction::Remove {
                self.remove_listener(id);
            }
        }
        delivered
    }

    fn set_timeout(self: &Rc<Self>, delay_ms: f64, callback: Box<dyn FnOnce()>) -> MockTimer {
        let id = self.next_id();
        self.scheduled_delays.borrow_mut().push(delay_ms);
        self.timers.borrow_mut().push(TimerEntry {
            id,
            due: self.now.get() + delay_ms,
            callback,
        });
        MockTimer {
            id,
            core: Rc::downgrade(self),
        }
    }

    /// Move the clock forward, firing due timers in order.
    fn advance(&self, ms: f64) {
        let target = self.now.get() + ms;
        loop {
            let next = {
                let mut timers = self.timers.borrow_mut();
                let index = timers
                    .iter()
                    .enumerate()
                    .filter(|(_, timer)| timer.due <= target)
                    .min_by(|(_, a), (_, b)| a.due.total_cmp(&b.due).then(a.id.cmp(&b.id)))
                    .map(|(index, _)| index);
                index.map(|index| timers.remove(index))
            };
            let Some(timer) = next else {
                break;
            };
            self.now.set(timer.due.max(self.now.get()));
            (timer.callback)();
        }
        self.now.set(target);
    }
}

/// Window listener registration; dropping it unsubscribes.
pub struct MockListener {
    id: u64,
    core: Weak<Core>,
}

impl Drop for MockListener {
    fn drop(&mut self) {
        if let Some(core) = self.core.upgrade() {
            core.remove_listener(self.id);
        }
    }
}

/// Scheduled timeout; dropping it cancels the callback.
pub struct MockTimer {
    id: u64,
    core: Weak<Core>,
}

impl Drop for MockTimer {
    fn drop(&mut self) {
        if let Some(core) = self.core.upgrade() {
            core.timers.borrow_mut().retain(|timer| timer.id != self.id);
        }
    }
}

// ---------------------------------------------------------------------------
// Host platform
// ---------------------------------------------------------------------------

/// Mock platform for the host page.
#[derive(Clone)]
pub struct MockPlatform {
    core: Rc<Core>,
    origin: Rc<RefCell<String>>,
    fail_channels: Rc<Cell<bool>>,
    channels: Rc<RefCell<Vec<(MockPort, MockPort)>>>,
}

impl MockPlatform {
    /// Create a host platform at `https://courses.example.com`
    pub fn new() -> Self {
        Self::with_origin("https://courses.example.com")
    }

    pub fn with_origin(origin: &str) -> Self {
        Self {
            core: Rc::new(Core::default()),
            origin: Rc::new(RefCell::new(origin.to_string())),
            fail_channels: Rc::new(Cell::new(false)),
            channels: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Make channel allocation fail
    pub fn set_fail_channels(&self, fail: bool) {
        self.fail_channels.set(fail);
    }

    /// Every channel allocated so far
    pub fn channels(&self) -> Vec<(MockPort, MockPort)> {
        self.channels.borrow().clone()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.borrow().len()
    }

    /// Number of active window listeners
    pub fn listener_count(&self) -> usize {
        self.core.listeners.borrow().len()
    }

    /// Deliver a window message; returns how many listeners saw it
    pub fn dispatch(&self, message: &MockWindowMessage) -> usize {
        self.core.dispatch(message)
    }

    /// Deliver `data` posted by `source` with the given origin
    pub fn post_from(&self, source: &MockWindow, origin: &str, data: Value) -> usize {
        self.dispatch(&WindowMessage {
            origin: origin.to_string(),
            source: Some(source.clone()),
            data,
            ports: Vec::new(),
        })
    }

    pub fn now(&self) -> f64 {
        self.core.now.get()
    }

    /// Advance the simulated clock
    pub fn advance_time(&self, ms: f64) {
        self.core.advance(ms);
    }
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl HostPlatform for MockPlatform {
    type Port = MockPort;
    type Window = MockWindow;
    type Frame = MockFrame;
    type Listener = MockListener;

    fn create_channel(&self) -> Result<(MockPort, MockPort), TransportError> {
        if self.fail_channels.get() {
            return Err(TransportError::ChannelUnavailable(
                "mock channel allocation disabled".to_string(),
            ));
        }
        let first_id = self.core.next_id();
        self.core.next_id();
        let pair = MockPort::pair(first_id);
        self.channels.borrow_mut().push(pair.clone());
        Ok(pair)
    }

    fn add_window_listener(&self, handler: WindowHandler<MockWindow, MockPort>) -> MockListener {
        self.core.add_listener(handler)
    }

    fn post_port_to_window(
        &self,
        target: &MockWindow,
        message: &str,
        target_origin: &str,
        port: MockPort,
    ) -> Result<(), TransportError> {
        target.record(WindowPost {
            message: Value::String(message.to_string()),
            target_origin: target_origin.to_string(),
            transfer: vec![port],
        })
    }

    fn location_origin(&self) -> String {
        self.origin.borrow().clone()
    }

    fn now_ms(&self) -> f64 {
        self.core.now.get()
    }
}

// ---------------------------------------------------------------------------
// Guest platform
// ---------------------------------------------------------------------------

/// Mock platform for the document inside the iframe.
#[derive(Clone)]
pub struct MockGuestPlatform {
    core: Rc<Core>,
    parent: Option<MockWindow>,
}

impl MockGuestPlatform {
    /// A guest embedded in `parent`
    pub fn new(parent: &MockWindow) -> Self {
        Self {
            core: Rc::new(Core::default()),
            parent: Some(parent.clone()),
        }
    }

    /// A guest running as a top-level document
    pub fn top_level() -> Self {
        Self {
            core: Rc::new(Core::default()),
            parent: None,
        }
    }

    /// Deliver a window message; returns how many listeners saw it
    pub fn dispatch(&self, message: &MockWindowMessage) -> usize {
        self.core.dispatch(message)
    }

    /// Deliver a `communication-port` message from `source` carrying `port`
    pub fn offer_port(&self, source: &MockWindow, port: &MockPort) -> usize {
        self.dispatch(&WindowMessage {
            origin: "https://courses.example.com".to_string(),
            source: Some(source.clone()),
            data: Value::String("communication-port".to_string()),
            ports: vec![port.clone()],
        })
    }

    pub fn listener_count(&self) -> usize {
        self.core.listeners.borrow().len()
    }

    /// Number of timeouts not yet fired or cancelled
    pub fn pending_timers(&self) -> usize {
        self.core.timers.borrow().len()
    }

    /// Delay of every timeout scheduled so far
    pub fn scheduled_delays(&self) -> Vec<f64> {
        self.core.scheduled_delays.borrow().clone()
    }

    pub fn now(&self) -> f64 {
        self.core.now.get()
    }

    /// Advance the simulated clock, firing due timers
    pub fn advance_time(&self, ms: f64) {
        self.core.advance(ms);
    }
}

impl GuestPlatform for MockGuestPlatform {
    type Port = MockPort;
    type Window = MockWindow;
    type Listener = MockListener;
    type Timer = MockTimer;

    fn parent(&self) -> Option<MockWindow> {
        self.parent.clone()
    }

    fn post_to_parent(&self, message: &Value, target_origin: &str) -> Result<(), TransportError> {
        let parent = self
            .parent
            .as_ref()
            .ok_or_else(|| TransportError::PostFailed("no parent window".to_string()))?;
        parent.record(WindowPost {
            message: message.clone(),
            target_origin: target_origin.to_string(),
            transfer: Vec::new(),
        })
    }

    fn add_window_listener(&self, handler: WindowHandler<MockWindow, MockPort>) -> MockListener {
        self.core.add_listener(handler)
    }

    fn set_timeout(&self, delay_ms: f64, callback: Box<dyn FnOnce()>) -> MockTimer {
        self.core.set_timeout(delay_ms, callback)
    }

    fn now_ms(&self) -> f64 {
        self.core.now.get()
    }
}
