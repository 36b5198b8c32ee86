//! The host-side exercise iframe component.
//!
//! An [`ExerciseFrame`] is fed props on every render. The first render with a
//! URL mounts a session: one channel, an armed handshake, and the inbound and
//! outbound wiring. Later renders with the same URL only push state and
//! language; a different URL tears the session down and mounts a new one.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use exercise_protocol::wire::{IFRAME_SANDBOX, MISSING_URL_KEY, SANDBOX_ALLOW_SAME_ORIGIN};
use exercise_protocol::{IframeState, MessageFromIframe};

use crate::channel::{create_channel, Channel};
use crate::config::HostConfig;
use crate::handshake::{
    check_ready, transfer_port, HandshakeCoordinator, HandshakeState, OriginPolicy, ReadyCheck,
};
use crate::inbound::{dispatch, MessageConsumer};
use crate::outbound::OutboundSync;
use crate::platform::{HostPlatform, ListenerAction, MessagePort, PortHandler, WindowMessage};

/// Inputs of one render.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameProps {
    pub url: Option<String>,
    pub state: Option<IframeState>,
    /// BCP-47 locale of the host UI; nothing is posted while unset or blank.
    pub language: Option<String>,
    pub title: String,
    pub show_borders: bool,
    /// Render without the `sandbox` attribute and skip origin checks.
    pub disable_sandbox: bool,
    pub heading: Option<String>,
}

/// Attributes of the rendered `<iframe>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IframeAttributes {
    pub src: String,
    pub title: String,
    /// `None` when sandboxing is disabled.
    pub sandbox: Option<String>,
    pub show_borders: bool,
    pub heading: Option<String>,
}

/// Output of one render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FrameView {
    /// No URL: show the translated fallback message.
    MissingUrl { message_key: &'static str },
    Iframe(IframeAttributes),
    /// The channel could not be created for this mount.
    Empty,
}

type ConsumerSlot<P> = RefCell<Option<MessageConsumer<P>>>;

/// Host component owning at most one mounted session.
pub struct ExerciseFrame<H: HostPlatform> {
    platform: Rc<H>,
    config: HostConfig,
    consumer: Rc<ConsumerSlot<H::Port>>,
    mount: Option<Mount<H>>,
}

struct Mount<H: HostPlatform> {
    url: String,
    /// `None` when channel creation failed.
    session: Option<Rc<RefCell<Session<H>>>>,
}

impl<H: HostPlatform> ExerciseFrame<H> {
    pub fn new(platform: H, config: HostConfig) -> Self {
        Self {
            platform: Rc::new(platform),
            config,
            consumer: Rc::new(RefCell::new(None)),
            mount: None,
        }
    }

    /// Register the consumer for guest messages. The latest consumer wins.
    pub fn set_on_message<F>(&mut self, consumer: F)
    where
        F: FnMut(MessageFromIframe, &H::Port) -> anyhow::Result<()> + 'static,
    {
        *self.consumer.borrow_mut() = Some(Box::new(consumer));
    }

    /// Apply new props and describe what to render.
    pub fn update(&mut self, props: &FrameProps) -> FrameView {
        let Some(url) = props
            .url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
        else {
            if self.mount.take().is_some() {
                debug!("[exercise-frame] URL removed, unmounting");
            }
            return FrameView::MissingUrl {
                message_key: MISSING_URL_KEY,
            };
        };

        if self.mount.as_ref().map(|m| m.url.as_str()) != Some(url) {
            if let Some(old) = self.mount.take() {
                info!("[exercise-frame] URL changed from {} to {}, remounting", old.url, url);
            }
            self.mount = Some(self.mount_session(url, props.disable_sandbox));
        }

        let Some(session) = self.mount.as_ref().and_then(|m| m.session.as_ref()) else {
            return FrameView::Empty;
        };
        session.borrow_mut().apply(props);

        FrameView::Iframe(IframeAttributes {
            src: url.to_string(),
            title: props.title.clone(),
            sandbox: self.sandbox_attribute(props.disable_sandbox),
            show_borders: props.show_borders,
            heading: props.heading.clone(),
        })
    }

    /// Hand the rendered iframe element to the session.
    pub fn attach_frame(&mut self, frame: H::Frame) {
        match self.session() {
            Some(session) => session.borrow_mut().frame = Some(frame),
            None => warn!("[exercise-frame] Ignoring iframe element without a mounted session"),
        }
    }

    /// Drop the session: listeners are removed and both ports released.
    pub fn unmount(&mut self) {
        if let Some(mount) = self.mount.take() {
            debug!("[exercise-frame] Unmounting {}", mount.url);
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.session().is_some()
    }

    /// Handshake progress of the current session.
    pub fn handshake_state(&self) -> Option<HandshakeState> {
        self.session().map(|s| s.borrow().handshake.state())
    }

    /// Port transfer recoveries performed by the current session.
    pub fn recovery_count(&self) -> u32 {
        self.session().map_or(0, |s| s.borrow().recoveries)
    }

    /// The host's end of the current channel.
    pub fn port(&self) -> Option<H::Port> {
        self.session().map(|s| s.borrow().channel.local().clone())
    }

    fn session(&self) -> Option<&Rc<RefCell<Session<H>>>> {
        self.mount.as_ref().and_then(|m| m.session.as_ref())
    }

    fn sandbox_attribute(&self, disable_sandbox: bool) -> Option<String> {
        if disable_sandbox {
            return None;
        }
        if self.config.sandbox.allow_same_origin {
            Some(format!("{} {}", IFRAME_SANDBOX, SANDBOX_ALLOW_SAME_ORIGIN))
        } else {
            Some(IFRAME_SANDBOX.to_string())
        }
    }

    fn mount_session(&self, url: &str, disable_sandbox: bool) -> Mount<H> {
        let channel = match create_channel(&*self.platform) {
            Ok(channel) => channel,
            Err(_) => {
                return Mount {
                    url: url.to_string(),
                    session: None,
                }
            }
        };

        let policy = OriginPolicy {
            sandboxed: !disable_sandbox,
            allow_same_origin: self.config.sandbox.allow_same_origin,
            host_origin: self.platform.location_origin(),
        };
        let handshake = HandshakeCoordinator::new(policy, self.config.handshake.target_origin.clone());

        let session = Rc::new_cyclic(|self_ref| {
            RefCell::new(Session {
                self_ref: self_ref.clone(),
                platform: self.platform.clone(),
                config: self.config.clone(),
                consumer: Rc::downgrade(&self.consumer),
                handshake,
                channel,
                frame: None,
                outbound: OutboundSync::new(),
                recoveries: 0,
                reload_watch_installed: false,
                listeners: Vec::new(),
            })
        });

        {
            let mut s = session.borrow_mut();
            let handler = s.inbound_handler();
            s.channel.local().set_onmessage(Some(handler));
            let listener = s.listen(Session::on_handshake_event);
            s.listeners.push(listener);
        }
        debug!("[exercise-frame] Mounted {}, waiting for ready", url);

        Mount {
            url: url.to_string(),
            session: Some(session),
        }
    }
}

/// State of one mount.
struct Session<H: HostPlatform> {
    self_ref: Weak<RefCell<Session<H>>>,
    platform: Rc<H>,
    config: HostConfig,
    consumer: Weak<ConsumerSlot<H::Port>>,
    handshake: HandshakeCoordinator,
    channel: Channel<H::Port>,
    frame: Option<H::Frame>,
    outbound: OutboundSync,
    recoveries: u32,
    reload_watch_installed: bool,
    listeners: Vec<H::Listener>,
}

impl<H: HostPlatform> Session<H> {
    /// Port A once the guest holds port B.
    fn open_port(&self) -> Option<H::Port> {
        self.handshake
            .transferred_at()
            .map(|_| self.channel.local().clone())
    }

    fn apply(&mut self, props: &FrameProps) {
        let port = self.open_port();
        let language = props
            .language
            .as_deref()
            .map(str::trim)
            .filter(|language| !language.is_empty());
        if let Some(language) = language {
            self.outbound.set_language(language, port.as_ref());
        }
        self.outbound.set_state(props.state.clone(), port.as_ref());
    }

    /// Subscribe `handler` to window messages for as long as the session lives.
    fn listen(
        &self,
        handler: fn(&mut Self, &WindowMessage<H::Window, H::Port>) -> ListenerAction,
    ) -> H::Listener {
        let weak = self.self_ref.clone();
        self.platform.add_window_listener(Box::new(move |event| {
            let Some(session) = weak.upgrade() else {
                return ListenerAction::Remove;
            };
            let mut session = session.borrow_mut();
            handler(&mut session, event)
        }))
    }

    fn inbound_handler(&self) -> PortHandler {
        let session = self.self_ref.clone();
        let consumer = self.consumer.clone();
        Box::new(move |payload| {
            let Some(session) = session.upgrade() else {
                return;
            };
            let (frame, port) = {
                let s = session.borrow();
                (s.frame.clone(), s.channel.local().clone())
            };

            // The consumer may replace itself while running; keep the newer one.
            let slot = consumer.upgrade();
            let mut current = slot.as_ref().and_then(|slot| slot.borrow_mut().take());
            dispatch(&payload, frame.as_ref(), &port, current.as_mut());
            if let (Some(slot), Some(previous)) = (slot, current) {
                let mut slot = slot.borrow_mut();
                if slot.is_none() {
                    *slot = Some(previous);
                }
            }
        })
    }

    fn on_handshake_event(&mut self, event: &WindowMessage<H::Window, H::Port>) -> ListenerAction {
        let was_armed = self.handshake.state() == HandshakeState::Armed;
        let platform = self.platform.clone();
        let action = self.handshake.handle_event(
            &*platform,
            event,
            self.frame.as_ref(),
            &mut self.channel,
        );

        if was_armed && self.handshake.transferred_at().is_some() {
            let port = self.channel.local().clone();
            self.outbound.flush(&port);
            if self.config.recovery.enabled && !self.reload_watch_installed {
                let listener = self.listen(Session::on_reload_event);
                self.listeners.push(listener);
                self.reload_watch_installed = true;
            }
        }
        action
    }

    /// Watch for a second `"ready"` from the same iframe after the transfer.
    ///
    /// A guest that reloads in place loses its port and announces itself
    /// again; once the recovery window has passed it gets a fresh channel.
    fn on_reload_event(&mut self, event: &WindowMessage<H::Window, H::Port>) -> ListenerAction {
        let Some(transferred_at) = self.handshake.transferred_at() else {
            return ListenerAction::Keep;
        };
        let window = match check_ready(self.handshake.policy(), event, self.frame.as_ref()) {
            ReadyCheck::Verified(window) => window,
            ReadyCheck::Ignored => return ListenerAction::Keep,
            ReadyCheck::Unresolvable => {
                warn!("[exercise-frame] Received ready but the iframe has no content window");
                return ListenerAction::Keep;
            }
        };

        let elapsed = self.platform.now_ms() - transferred_at;
        if elapsed < self.config.recovery.window_ms as f64 {
            debug!("[exercise-frame] Ignoring ready {}ms after port transfer", elapsed);
            return ListenerAction::Keep;
        }
        if self.recoveries >= self.config.recovery.max_attempts {
            error!(
                "[exercise-frame] Max recovery attempts ({}) reached, ignoring ready from iframe",
                self.config.recovery.max_attempts
            );
            return ListenerAction::Remove;
        }

        self.recover(&window);
        ListenerAction::Keep
    }

    /// Replace the channel and hand the new port B to `window`.
    fn recover(&mut self, window: &H::Window) {
        let mut channel = match create_channel(&*self.platform) {
            Ok(channel) => channel,
            Err(_) => return,
        };
        let Some(remote) = channel.take_remote() else {
            return;
        };
        channel.local().set_onmessage(Some(self.inbound_handler()));

        let platform = self.platform.clone();
        if let Err(e) = transfer_port(&*platform, window, self.handshake.target_origin(), remote) {
            error!("[exercise-frame] Failed to transfer recovery port: {}", e);
            channel.local().set_onmessage(None);
            return;
        }

        let old = std::mem::replace(&mut self.channel, channel);
        old.local().set_onmessage(None);
        old.local().close();

        self.recoveries += 1;
        self.handshake.mark_transferred(platform.now_ms());
        info!(
            "[exercise-frame] Iframe reloaded, transferred a new port (recovery {}/{})",
            self.recoveries, self.config.recovery.max_attempts
        );

        let port = self.channel.local().clone();
        self.outbound.reset();
        self.outbound.flush(&port);
    }
}

impl<H: HostPlatform> Drop for Session<H> {
    fn drop(&mut self) {
        self.channel.local().set_onmessage(None);
        self.channel.local().close();
    }
}
