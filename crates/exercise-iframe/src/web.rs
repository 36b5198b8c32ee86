//! Browser platform and JavaScript exports.
//!
//! Payloads cross the JS boundary as JSON through `js_sys::JSON`, so every
//! value the Rust side sees is plain data.

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::{Array, Function};
use log::{error, Level, LevelFilter, Log, Metadata, Record};
use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{console, HtmlIFrameElement, MessageChannel, MessageEvent, Window};

use exercise_protocol::classify_from_iframe;

use crate::platform::{
    FrameElement, GuestPlatform, HostPlatform, ListenerAction, MessagePort, PortHandler,
    WindowHandler, WindowMessage,
};
use crate::{ExerciseFrame, FrameProps, HostConfig, ParentConnection, TransportError};

const MESSAGE_EVENT: &str = "message";

fn describe(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}

fn js_to_json(value: &JsValue) -> Value {
    js_sys::JSON::stringify(value)
        .ok()
        .and_then(|text| text.as_string())
        .and_then(|text| serde_json::from_str(&text).ok())
        .unwrap_or(Value::Null)
}

fn json_to_js(value: &Value) -> Result<JsValue, JsValue> {
    let text = serde_json::to_string(value).map_err(|e| JsValue::from_str(&e.to_string()))?;
    js_sys::JSON::parse(&text)
}

fn to_js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// A `MessagePort` and the closure currently installed as its handler.
#[derive(Clone)]
pub struct WebPort {
    port: web_sys::MessagePort,
    onmessage: Rc<RefCell<Option<Closure<dyn FnMut(MessageEvent)>>>>,
}

impl WebPort {
    fn new(port: web_sys::MessagePort) -> Self {
        Self {
            port,
            onmessage: Rc::new(RefCell::new(None)),
        }
    }

    /// The underlying JS port.
    pub fn as_js(&self) -> &web_sys::MessagePort {
        &self.port
    }
}

impl MessagePort for WebPort {
    fn post_message(&self, message: &Value) -> Result<(), TransportError> {
        let value = json_to_js(message).map_err(|e| TransportError::PostFailed(describe(&e)))?;
        self.port
            .post_message(&value)
            .map_err(|e| TransportError::PostFailed(describe(&e)))
    }

    fn set_onmessage(&self, handler: Option<PortHandler>) {
        let closure = handler.map(|mut handler| {
            Closure::wrap(Box::new(move |event: MessageEvent| {
                handler(js_to_json(&event.data()));
            }) as Box<dyn FnMut(MessageEvent)>)
        });
        self.port
            .set_onmessage(closure.as_ref().map(|c| c.as_ref().unchecked_ref()));
        *self.onmessage.borrow_mut() = closure;
    }

    fn close(&self) {
        self.port.close();
    }
}

impl FrameElement for HtmlIFrameElement {
    type Window = Window;

    fn content_window(&self) -> Option<Window> {
        HtmlIFrameElement::content_window(self)
    }

    fn set_height(&self, height: &str) {
        HtmlIFrameElement::set_height(self, height);
    }
}

/// Window `message` subscription; dropping it removes the listener.
pub struct WebWindowListener {
    window: Window,
    callback: Closure<dyn FnMut(MessageEvent)>,
}

impl Drop for WebWindowListener {
    fn drop(&mut self) {
        let _ = self
            .window
            .remove_event_listener_with_callback(MESSAGE_EVENT, self.callback.as_ref().unchecked_ref());
    }
}

/// Pending `setTimeout`; dropping it clears the timeout.
pub struct WebTimer {
    window: Window,
    handle: i32,
    _callback: Closure<dyn FnMut()>,
}

impl Drop for WebTimer {
    fn drop(&mut self) {
        self.window.clear_timeout_with_handle(self.handle);
    }
}

/// Platform over the current browser window.
pub struct WebPlatform {
    window: Window,
}

impl WebPlatform {
    pub fn new() -> Result<Self, TransportError> {
        let window = web_sys::window()
            .ok_or_else(|| TransportError::ChannelUnavailable("no window".to_string()))?;
        Ok(Self { window })
    }

    fn listen(&self, mut handler: WindowHandler<Window, WebPort>) -> WebWindowListener {
        let window = self.window.clone();
        let own_function: Rc<RefCell<Option<Function>>> = Rc::new(RefCell::new(None));
        let remove_with = own_function.clone();

        let callback = Closure::wrap(Box::new(move |event: MessageEvent| {
            let message = WindowMessage {
                origin: event.origin(),
                source: event.source().map(|source| source.unchecked_into::<Window>()),
                data: js_to_json(&event.data()),
                ports: event
                    .ports()
                    .iter()
                    .map(|port| WebPort::new(port.unchecked_into()))
                    .collect(),
            };
            if handler(&message) == ListenerAction::Remove {
                if let Some(function) = remove_with.borrow().as_ref() {
                    let _ = window.remove_event_listener_with_callback(MESSAGE_EVENT, function);
                }
            }
        }) as Box<dyn FnMut(MessageEvent)>);

        let function: &Function = callback.as_ref().unchecked_ref();
        if let Err(e) = self
            .window
            .add_event_listener_with_callback(MESSAGE_EVENT, function)
        {
            error!("[exercise-frame] Failed to add message listener: {}", describe(&e));
        }
        *own_function.borrow_mut() = Some(function.clone());

        WebWindowListener {
            window: self.window.clone(),
            callback,
        }
    }

    fn clock(&self) -> f64 {
        self.window
            .performance()
            .map(|performance| performance.now())
            .unwrap_or_else(js_sys::Date::now)
    }
}

impl HostPlatform for WebPlatform {
    type Port = WebPort;
    type Window = Window;
    type Frame = HtmlIFrameElement;
    type Listener = WebWindowListener;

    fn create_channel(&self) -> Result<(WebPort, WebPort), TransportError> {
        let channel =
            MessageChannel::new().map_err(|e| TransportError::ChannelUnavailable(describe(&e)))?;
        Ok((WebPort::new(channel.port1()), WebPort::new(channel.port2())))
    }

    fn add_window_listener(&self, handler: WindowHandler<Window, WebPort>) -> WebWindowListener {
        self.listen(handler)
    }

    fn post_port_to_window(
        &self,
        target: &Window,
        message: &str,
        target_origin: &str,
        port: WebPort,
    ) -> Result<(), TransportError> {
        let transfer = Array::of1(port.as_js());
        target
            .post_message_with_transfer(&JsValue::from_str(message), target_origin, &transfer)
            .map_err(|e| TransportError::PostFailed(describe(&e)))
    }

    fn location_origin(&self) -> String {
        self.window.location().origin().unwrap_or_default()
    }

    fn now_ms(&self) -> f64 {
        self.clock()
    }
}

impl GuestPlatform for WebPlatform {
    type Port = WebPort;
    type Window = Window;
    type Listener = WebWindowListener;
    type Timer = WebTimer;

    fn parent(&self) -> Option<Window> {
        // A top-level window is its own parent.
        self.window
            .parent()
            .ok()
            .flatten()
            .filter(|parent| *parent != self.window)
    }

    fn post_to_parent(&self, message: &Value, target_origin: &str) -> Result<(), TransportError> {
        let parent = GuestPlatform::parent(self)
            .ok_or_else(|| TransportError::PostFailed("no parent window".to_string()))?;
        let value = json_to_js(message).map_err(|e| TransportError::PostFailed(describe(&e)))?;
        parent
            .post_message(&value, target_origin)
            .map_err(|e| TransportError::PostFailed(describe(&e)))
    }

    fn add_window_listener(&self, handler: WindowHandler<Window, WebPort>) -> WebWindowListener {
        self.listen(handler)
    }

    fn set_timeout(&self, delay_ms: f64, callback: Box<dyn FnOnce()>) -> WebTimer {
        let callback = Closure::once(callback);
        let handle = self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                callback.as_ref().unchecked_ref(),
                delay_ms as i32,
            )
            .unwrap_or_else(|e| {
                error!("[parent-connection] Failed to schedule timeout: {}", describe(&e));
                0
            });
        WebTimer {
            window: self.window.clone(),
            handle,
            _callback: callback,
        }
    }

    fn now_ms(&self) -> f64 {
        self.clock()
    }
}

struct ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = JsValue::from_str(&format!("{} {}", record.level(), record.args()));
        match record.level() {
            Level::Error => console::error_1(&line),
            Level::Warn => console::warn_1(&line),
            Level::Info => console::info_1(&line),
            Level::Debug | Level::Trace => console::debug_1(&line),
        }
    }

    fn flush(&self) {}
}

static LOGGER: ConsoleLogger = ConsoleLogger;

/// Route `log` output to the browser console and install the panic hook.
///
/// `level` is a `log` level name such as `"debug"`; defaults to `info`.
#[wasm_bindgen(js_name = initLogging)]
pub fn init_logging(level: Option<String>) {
    console_error_panic_hook::set_once();

    let filter = level
        .and_then(|level| level.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info);
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(filter);
    }
}

fn load_config(config_toml: Option<String>) -> Result<HostConfig, JsValue> {
    match config_toml {
        Some(text) => HostConfig::from_toml(&text).map_err(to_js_error),
        None => Ok(HostConfig::default()),
    }
}

/// Host-side component for JavaScript callers.
#[wasm_bindgen]
pub struct WebExerciseFrame {
    inner: ExerciseFrame<WebPlatform>,
}

#[wasm_bindgen]
impl WebExerciseFrame {
    /// Create a component, optionally configured from TOML.
    #[wasm_bindgen(constructor)]
    pub fn new(config_toml: Option<String>) -> Result<WebExerciseFrame, JsValue> {
        let config = load_config(config_toml)?;
        let platform = WebPlatform::new().map_err(to_js_error)?;
        Ok(Self {
            inner: ExerciseFrame::new(platform, config),
        })
    }

    /// Apply props (a `FrameProps` object) and return the view to render.
    pub fn update(&mut self, props: JsValue) -> Result<JsValue, JsValue> {
        let props: FrameProps = serde_json::from_value(js_to_json(&props)).map_err(to_js_error)?;
        let view = self.inner.update(&props);
        let view = serde_json::to_value(&view).map_err(to_js_error)?;
        json_to_js(&view)
    }

    #[wasm_bindgen(js_name = attachFrame)]
    pub fn attach_frame(&mut self, frame: HtmlIFrameElement) {
        self.inner.attach_frame(frame);
    }

    /// Register `callback(message, port)` for guest messages.
    #[wasm_bindgen(js_name = setOnMessage)]
    pub fn set_on_message(&mut self, callback: Function) {
        self.inner.set_on_message(move |message, port: &WebPort| {
            let value = json_to_js(&message.to_value()?)
                .map_err(|e| anyhow::anyhow!(describe(&e)))?;
            callback
                .call2(&JsValue::NULL, &value, port.as_js())
                .map_err(|e| anyhow::anyhow!(describe(&e)))?;
            Ok(())
        });
    }

    pub fn unmount(&mut self) {
        self.inner.unmount();
    }
}

/// Guest-side connection for JavaScript callers.
#[wasm_bindgen]
pub struct WebParentConnection {
    inner: ParentConnection<WebPlatform>,
}

#[wasm_bindgen]
impl WebParentConnection {
    /// Start announcing to the parent window.
    #[wasm_bindgen(constructor)]
    pub fn new(config_toml: Option<String>) -> Result<WebParentConnection, JsValue> {
        let config = load_config(config_toml)?;
        let platform = WebPlatform::new().map_err(to_js_error)?;
        Ok(Self {
            inner: ParentConnection::connect(platform, config.guest),
        })
    }

    /// Register `callback(message, port)` for validated host messages.
    #[wasm_bindgen(js_name = setOnMessage)]
    pub fn set_on_message(&mut self, callback: Function) {
        self.inner.set_on_message(move |message, port: &WebPort| {
            let value = json_to_js(&message.to_value()?)
                .map_err(|e| anyhow::anyhow!(describe(&e)))?;
            callback
                .call2(&JsValue::NULL, &value, port.as_js())
                .map_err(|e| anyhow::anyhow!(describe(&e)))?;
            Ok(())
        });
    }

    /// Validate and post a guest message to the host.
    pub fn send(&self, message: JsValue) -> Result<(), JsValue> {
        let message = classify_from_iframe(&js_to_json(&message)).map_err(to_js_error)?;
        self.inner.send(&message).map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = isConnected)]
    pub fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }
}
