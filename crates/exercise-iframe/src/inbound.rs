//! Routes guest messages arriving on port A.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use log::{debug, error, warn};
use serde_json::Value;

use exercise_protocol::{classify_from_iframe, MessageFromIframe};

use crate::platform::FrameElement;

/// Receives every recognized guest message except height changes.
///
/// The port is passed along so the consumer can answer, e.g. with an
/// `upload-result`.
pub type MessageConsumer<P> = Box<dyn FnMut(MessageFromIframe, &P) -> anyhow::Result<()>>;

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// The iframe height was updated.
    Resized(String),
    /// The consumer accepted the message.
    Delivered,
    /// No consumer is registered.
    Unhandled,
    /// The consumer returned an error or panicked.
    ConsumerFailed,
    /// The payload is not a guest message.
    Discarded,
}

/// Handle one payload from the guest.
pub fn dispatch<F: FrameElement, P>(
    payload: &Value,
    frame: Option<&F>,
    port: &P,
    consumer: Option<&mut MessageConsumer<P>>,
) -> Dispatched {
    let message = match classify_from_iframe(payload) {
        Ok(message) => message,
        Err(e) => {
            warn!("[exercise-frame] Discarding unrecognized message from iframe: {}", e);
            return Dispatched::Discarded;
        }
    };

    if let MessageFromIframe::HeightChanged(change) = &message {
        let height = change.css_height();
        match frame {
            Some(frame) => frame.set_height(&height),
            None => warn!("[exercise-frame] Height changed before the iframe was attached"),
        }
        return Dispatched::Resized(height);
    }

    let Some(consumer) = consumer else {
        debug!("[exercise-frame] No handler for {} message", message.tag());
        return Dispatched::Unhandled;
    };

    let tag = message.tag();
    match catch_unwind(AssertUnwindSafe(|| consumer(message, port))) {
        Ok(Ok(())) => Dispatched::Delivered,
        Ok(Err(e)) => {
            error!("[exercise-frame] onMessageFromIframe crashed on {}: {:#}", tag, e);
            Dispatched::ConsumerFailed
        }
        Err(panic) => {
            error!(
                "[exercise-frame] onMessageFromIframe crashed on {}: {}",
                tag,
                panic_reason(panic.as_ref())
            );
            Dispatched::ConsumerFailed
        }
    }
}

/// Message carried by a caught panic payload.
pub(crate) fn panic_reason(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;

    #[derive(Clone, Default)]
    struct TestFrame(std::rc::Rc<RefCell<Option<String>>>);

    impl FrameElement for TestFrame {
        type Window = ();

        fn content_window(&self) -> Option<()> {
            Some(())
        }

        fn set_height(&self, height: &str) {
            *self.0.borrow_mut() = Some(height.to_string());
        }
    }

    #[test]
    fn height_never_reaches_consumer() {
        let frame = TestFrame::default();
        let mut consumer: MessageConsumer<()> =
            Box::new(|_: MessageFromIframe, _: &()| -> anyhow::Result<()> {
                panic!("consumer must not see height changes")
            });

        let outcome = dispatch(
            &json!({ "message": "height-changed", "data": 480 }),
            Some(&frame),
            &(),
            Some(&mut consumer),
        );
        assert_eq!(outcome, Dispatched::Resized("480px".to_string()));
        assert_eq!(frame.0.borrow().as_deref(), Some("480px"));
    }

    #[test]
    fn consumer_panics_are_contained() {
        let mut consumer: MessageConsumer<()> =
            Box::new(|_: MessageFromIframe, _: &()| -> anyhow::Result<()> { panic!("boom") });
        let outcome = dispatch::<TestFrame, ()>(
            &json!({ "message": "file-upload", "url": "blob:x", "data": null }),
            None,
            &(),
            Some(&mut consumer),
        );
        assert_eq!(outcome, Dispatched::ConsumerFailed);
    }

    #[test]
    fn unknown_messages_are_discarded() {
        let called = std::rc::Rc::new(std::cell::Cell::new(false));
        let seen = called.clone();
        let mut consumer: MessageConsumer<()> =
            Box::new(move |_: MessageFromIframe, _: &()| -> anyhow::Result<()> {
                seen.set(true);
                Ok(())
            });

        let outcome = dispatch::<TestFrame, ()>(
            &json!({ "message": "unknown-type", "foo": 1 }),
            None,
            &(),
            Some(&mut consumer),
        );
        assert_eq!(outcome, Dispatched::Discarded);
        assert!(!called.get());
    }
}
