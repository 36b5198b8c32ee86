#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use exercise_iframe::{ExerciseFrame, FrameProps, FrameView, HostConfig};
use exercise_iframe_mock::{MockFrame, MockPlatform, MockPort, MockWindow};
use exercise_protocol::{
    AnswerExerciseData, AnswerExerciseState, ExerciseTaskSubmission, IframeState, UserInformation,
};
use serde_json::{json, Value};

pub const EXERCISE_URL: &str = "https://example.com/ex";

pub fn answer_state(task: &str, public_spec: Value) -> IframeState {
    IframeState::AnswerExercise(AnswerExerciseState {
        exercise_task_id: task.to_string(),
        user_information: UserInformation {
            pseudonymous_id: "anon-1".to_string(),
            signed_in: true,
        },
        user_variables: None,
        data: AnswerExerciseData {
            public_spec,
            previous_submission: None,
        },
    })
}

pub fn answer_state_with_submission(task: &str) -> IframeState {
    let submission = ExerciseTaskSubmission {
        id: "submission-1".to_string(),
        created_at: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2024, 3, 1, 10, 5, 0).unwrap(),
        deleted_at: None,
        exercise_slide_submission_id: "slide-submission-1".to_string(),
        exercise_task_id: task.to_string(),
        exercise_slide_id: "slide-1".to_string(),
        data_json: json!({ "selected": [1] }),
        exercise_task_grading_id: None,
        metadata: Value::Null,
    };
    match answer_state(task, json!({ "options": 3 })) {
        IframeState::AnswerExercise(mut state) => {
            state.data.previous_submission = Some(submission);
            IframeState::AnswerExercise(state)
        }
        other => other,
    }
}

pub fn props(url: &str, state: Option<IframeState>) -> FrameProps {
    FrameProps {
        url: Some(url.to_string()),
        state,
        language: Some("en-US".to_string()),
        title: "Exercise".to_string(),
        ..Default::default()
    }
}

/// A host page with one mounted exercise iframe.
pub struct Host {
    pub platform: MockPlatform,
    pub guest_window: MockWindow,
    pub element: MockFrame,
    pub frame: ExerciseFrame<MockPlatform>,
}

impl Host {
    pub fn new(config: HostConfig) -> Self {
        let platform = MockPlatform::new();
        let guest_window = MockWindow::new("exercise");
        let element = MockFrame::new(&guest_window);
        let frame = ExerciseFrame::new(platform.clone(), config);
        Self {
            platform,
            guest_window,
            element,
            frame,
        }
    }

    /// Render `props` and attach the iframe element.
    pub fn mount(config: HostConfig, props: &FrameProps) -> Self {
        let mut host = Self::new(config);
        let view = host.frame.update(props);
        assert!(matches!(view, FrameView::Iframe(_)), "unexpected view {:?}", view);
        host.frame.attach_frame(host.element.clone());
        host
    }

    pub fn mount_default() -> Self {
        Self::mount(HostConfig::default(), &props(EXERCISE_URL, None))
    }

    /// The guest announces itself from inside the sandbox.
    pub fn send_ready(&self) -> usize {
        self.platform
            .post_from(&self.guest_window, "null", json!("ready"))
    }

    /// Port B as received by the guest most recently.
    pub fn guest_port(&self) -> MockPort {
        self.guest_window
            .transferred_ports()
            .last()
            .cloned()
            .expect("no port was transferred")
    }

    /// Port A of the current channel.
    pub fn host_port(&self) -> MockPort {
        self.frame.port().expect("no mounted session")
    }

    pub fn transfer_count(&self) -> usize {
        self.guest_window.transferred_ports().len()
    }
}
