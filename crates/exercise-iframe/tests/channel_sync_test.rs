mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::{answer_state, answer_state_with_submission, props, Host, EXERCISE_URL};
use exercise_iframe::MessagePort;
use exercise_iframe_mock::capture_logs;
use exercise_protocol::{classify_to_iframe, MessageFromIframe, MessageToIframe};
use serde_json::json;

#[test]
fn traffic_waits_for_transfer_then_language_goes_first() {
    let state = answer_state("task-1", json!({ "options": ["a", "b"] }));
    let mut p = props(EXERCISE_URL, Some(state.clone()));
    p.language = Some("fi-FI".to_string());
    let host = Host::mount(Default::default(), &p);

    let port_a = host.host_port();
    assert!(port_a.sent().is_empty());

    host.send_ready();

    let sent = port_a.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0], json!({ "message": "set-language", "data": "fi-FI" }));
    assert_eq!(
        classify_to_iframe(&sent[1]).unwrap(),
        MessageToIframe::SetState(state)
    );
}

#[test]
fn deep_equal_states_post_once() {
    let mut host = Host::mount_default();
    host.send_ready();
    let port_a = host.host_port();

    let first = answer_state_with_submission("task-1");
    let second = answer_state_with_submission("task-1");
    host.frame.update(&props(EXERCISE_URL, Some(first)));
    host.frame.update(&props(EXERCISE_URL, Some(second)));

    assert_eq!(port_a.sent_with_tag("set-state").len(), 1);
}

#[test]
fn different_states_post_in_order() {
    let mut host = Host::mount_default();
    host.send_ready();
    let port_a = host.host_port();

    let first = answer_state("task-1", json!({ "options": 2 }));
    let second = answer_state("task-1", json!({ "options": 3 }));
    host.frame
        .update(&props(EXERCISE_URL, Some(first.clone())));
    host.frame
        .update(&props(EXERCISE_URL, Some(second.clone())));

    let posted = port_a.sent_with_tag("set-state");
    assert_eq!(posted.len(), 2);
    assert_eq!(
        classify_to_iframe(&posted[0]).unwrap(),
        MessageToIframe::SetState(first)
    );
    assert_eq!(
        classify_to_iframe(&posted[1]).unwrap(),
        MessageToIframe::SetState(second)
    );
}

#[test]
fn failed_state_post_is_retried_with_same_state() {
    let logs = capture_logs();
    let mut host = Host::mount_default();
    host.send_ready();
    let port_a = host.host_port();
    let state = answer_state("task-1", json!(null));

    port_a.set_fail_posts(true);
    host.frame
        .update(&props(EXERCISE_URL, Some(state.clone())));
    assert!(port_a.sent_with_tag("set-state").is_empty());
    assert!(logs.has_error_containing("Failed to post state"));

    port_a.set_fail_posts(false);
    host.frame.update(&props(EXERCISE_URL, Some(state)));
    assert_eq!(port_a.sent_with_tag("set-state").len(), 1);
}

#[test]
fn language_changes_post_independently() {
    let state = answer_state("task-1", json!(null));
    let mut host = Host::mount(Default::default(), &props(EXERCISE_URL, Some(state.clone())));
    host.send_ready();
    let port_a = host.host_port();

    let mut finnish = props(EXERCISE_URL, Some(state));
    finnish.language = Some("fi-FI".to_string());
    host.frame.update(&finnish);
    host.frame.update(&finnish);

    let languages = port_a.sent_with_tag("set-language");
    assert_eq!(languages.len(), 2);
    assert_eq!(languages[1]["data"], "fi-FI");
    assert_eq!(port_a.sent_with_tag("set-state").len(), 1);
}

#[test]
fn height_change_resizes_and_skips_consumer() {
    let mut host = Host::mount_default();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let recorder = seen.clone();
    host.frame.set_on_message(move |message, _port| {
        recorder.borrow_mut().push(message);
        Ok(())
    });
    host.send_ready();

    host.guest_port()
        .send_to_peer(json!({ "message": "height-changed", "data": 480 }));

    assert_eq!(host.element.height().as_deref(), Some("480px"));
    assert!(seen.borrow().is_empty());
}

#[test]
fn unknown_messages_never_reach_consumer() {
    let logs = capture_logs();
    let mut host = Host::mount_default();
    let calls = Rc::new(RefCell::new(0));
    let counter = calls.clone();
    host.frame.set_on_message(move |_, _| {
        *counter.borrow_mut() += 1;
        Ok(())
    });
    host.send_ready();

    host.guest_port()
        .send_to_peer(json!({ "message": "unknown-type", "foo": 1 }));

    assert_eq!(*calls.borrow(), 0);
    assert!(logs.has_log_containing("unknown message type: unknown-type"));
}

#[test]
fn consumer_failure_does_not_stop_dispatch() {
    let logs = capture_logs();
    let mut host = Host::mount_default();
    host.frame.set_on_message(|message, _| match message {
        MessageFromIframe::CurrentState(_) => Err(anyhow::anyhow!("boom")),
        _ => Ok(()),
    });
    host.send_ready();
    let guest = host.guest_port();

    guest.send_to_peer(json!({ "message": "current-state", "data": {}, "valid": true }));
    guest.send_to_peer(json!({ "message": "height-changed", "data": 300 }));

    assert!(logs.has_error_containing("onMessageFromIframe crashed"));
    assert!(logs.has_error_containing("boom"));
    assert_eq!(host.element.height().as_deref(), Some("300px"));
}

#[test]
fn consumer_panic_is_contained() {
    let logs = capture_logs();
    let mut host = Host::mount_default();
    let delivered = Rc::new(RefCell::new(0));
    let counter = delivered.clone();
    host.frame.set_on_message(move |message, _| {
        if let MessageFromIframe::FileUpload(_) = message {
            panic!("upload handler exploded");
        }
        *counter.borrow_mut() += 1;
        Ok(())
    });
    host.send_ready();
    let guest = host.guest_port();

    guest.send_to_peer(json!({ "message": "file-upload", "url": "blob:a", "data": null }));
    guest.send_to_peer(json!({ "message": "current-state", "data": [1], "valid": false }));

    assert!(logs.has_error_containing("upload handler exploded"));
    assert_eq!(*delivered.borrow(), 1);
}

#[test]
fn consumer_can_reply_on_the_port() {
    let mut host = Host::mount_default();
    host.frame.set_on_message(|message, port| {
        if let MessageFromIframe::FileUpload(upload) = message {
            let reply = MessageToIframe::upload_succeeded(format!("{}/stored", upload.url));
            port.post_message(&reply.to_value()?)?;
        }
        Ok(())
    });
    host.send_ready();

    host.guest_port().send_to_peer(
        json!({ "message": "file-upload", "url": "https://cdn.example.com/f", "data": {} }),
    );

    let replies = host.host_port().sent_with_tag("upload-result");
    assert_eq!(
        replies,
        vec![json!({
            "message": "upload-result",
            "success": true,
            "url": "https://cdn.example.com/f/stored"
        })]
    );
}

#[test]
fn latest_consumer_is_used() {
    let mut host = Host::mount_default();
    let log = Rc::new(RefCell::new(Vec::new()));
    let first = log.clone();
    host.frame.set_on_message(move |_, _| {
        first.borrow_mut().push("first");
        Ok(())
    });
    let second = log.clone();
    host.frame.set_on_message(move |_, _| {
        second.borrow_mut().push("second");
        Ok(())
    });
    host.send_ready();

    host.guest_port()
        .send_to_peer(json!({ "message": "current-state", "data": null, "valid": true }));

    assert_eq!(*log.borrow(), vec!["second"]);
}

#[test]
fn missing_or_blank_language_is_not_posted() {
    let state = answer_state("task-1", json!(null));
    let mut p = props(EXERCISE_URL, Some(state));
    p.language = None;
    let mut host = Host::mount(Default::default(), &p);
    host.send_ready();
    let port_a = host.host_port();

    p.language = Some("  ".to_string());
    host.frame.update(&p);

    assert!(port_a.sent_with_tag("set-language").is_empty());
    assert_eq!(port_a.sent_with_tag("set-state").len(), 1);

    p.language = Some("sv-SE".to_string());
    host.frame.update(&p);
    assert_eq!(
        port_a.sent_with_tag("set-language"),
        vec![json!({ "message": "set-language", "data": "sv-SE" })]
    );
}
