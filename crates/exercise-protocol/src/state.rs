//! State payloads carried by `set-state` messages.
//!
//! The payloads are opaque to the channel itself, but the host checks their
//! outer shape before a guest ever sees them: every view type has its own set
//! of required fields, and timestamps must be real timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::wire::decode_arm;
use crate::ValidationError;

/// Free-form variables stored for a user by an exercise service.
pub type UserVariablesMap = Map<String, Value>;

/// Which view the guest should render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IframeViewType {
    /// A student answering the exercise.
    AnswerExercise,
    /// A read-only view of a previous submission.
    ViewSubmission,
    /// A course author editing the exercise.
    ExerciseEditor,
}

impl IframeViewType {
    /// Wire value of the view type.
    pub fn as_str(&self) -> &'static str {
        match self {
            IframeViewType::AnswerExercise => "answer-exercise",
            IframeViewType::ViewSubmission => "view-submission",
            IframeViewType::ExerciseEditor => "exercise-editor",
        }
    }

    /// Parse a wire value, returning `None` outside the closed set.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "answer-exercise" => Some(IframeViewType::AnswerExercise),
            "view-submission" => Some(IframeViewType::ViewSubmission),
            "exercise-editor" => Some(IframeViewType::ExerciseEditor),
            _ => None,
        }
    }
}

/// Who is looking at the exercise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInformation {
    /// Stable identifier that does not reveal the user.
    pub pseudonymous_id: String,
    /// Whether the user is signed in.
    pub signed_in: bool,
}

/// Grading lifecycle of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GradingProgress {
    /// Grading failed.
    Failed,
    /// Grading has not started.
    NotReady,
    /// Waiting for a human grader.
    PendingManual,
    /// Waiting for an automatic grader.
    Pending,
    /// Grading is complete.
    FullyGraded,
}

/// Grading attached to a submission under review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingResult {
    /// Progress of the grading.
    pub grading_progress: GradingProgress,
    /// Points given.
    pub score_given: f64,
    /// Maximum points available.
    pub score_maximum: f64,
    /// Feedback text shown to the student.
    pub feedback_text: Option<String>,
    /// Service-specific feedback payload.
    #[serde(default)]
    pub feedback_json: Value,
    /// User variables the grader wants stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_user_variables: Option<UserVariablesMap>,
}

/// A previously stored answer to an exercise task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseTaskSubmission {
    /// Submission identifier.
    pub id: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Deletion timestamp, if the submission was deleted.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Slide submission this task submission belongs to.
    pub exercise_slide_submission_id: String,
    /// Task the submission answers.
    pub exercise_task_id: String,
    /// Slide the task belongs to.
    pub exercise_slide_id: String,
    /// Service-specific answer payload.
    #[serde(default)]
    pub data_json: Value,
    /// Grading of the submission, if any.
    pub exercise_task_grading_id: Option<String>,
    /// Service-specific metadata.
    #[serde(default)]
    pub metadata: Value,
}

/// An exercise template available from a repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryExercise {
    pub id: String,
    pub repository_id: String,
    pub part: String,
    pub name: String,
    pub repository_url: String,
    pub checksum: Vec<f64>,
    pub download_url: String,
}

/// `data` of an `answer-exercise` state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerExerciseData {
    #[serde(default)]
    pub public_spec: Value,
    pub previous_submission: Option<ExerciseTaskSubmission>,
}

/// `data` of a `view-submission` state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewSubmissionData {
    #[serde(default)]
    pub public_spec: Value,
    #[serde(default)]
    pub user_answer: Value,
    #[serde(default)]
    pub model_solution_spec: Value,
    pub grading: Option<GradingResult>,
}

/// `data` of an `exercise-editor` state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseEditorData {
    #[serde(default)]
    pub private_spec: Value,
}

/// State for a student answering an exercise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerExerciseState {
    pub exercise_task_id: String,
    pub user_information: UserInformation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_variables: Option<UserVariablesMap>,
    pub data: AnswerExerciseData,
}

/// State for reviewing a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewSubmissionState {
    pub exercise_task_id: String,
    pub user_information: UserInformation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_variables: Option<UserVariablesMap>,
    pub data: ViewSubmissionData,
}

/// State for the exercise editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseEditorState {
    pub exercise_task_id: String,
    pub user_information: UserInformation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_exercises: Option<Vec<RepositoryExercise>>,
    pub data: ExerciseEditorData,
}

/// Everything the guest needs to render one view.
///
/// `PartialEq` is structural, which is what the outbound synchronizer uses to
/// suppress re-sending an unchanged state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "view_type", rename_all = "kebab-case")]
pub enum IframeState {
    AnswerExercise(AnswerExerciseState),
    ViewSubmission(ViewSubmissionState),
    ExerciseEditor(ExerciseEditorState),
}

impl IframeState {
    /// View type of the state.
    pub fn view_type(&self) -> IframeViewType {
        match self {
            IframeState::AnswerExercise(_) => IframeViewType::AnswerExercise,
            IframeState::ViewSubmission(_) => IframeViewType::ViewSubmission,
            IframeState::ExerciseEditor(_) => IframeViewType::ExerciseEditor,
        }
    }

    /// Exercise task the state belongs to.
    pub fn exercise_task_id(&self) -> &str {
        match self {
            IframeState::AnswerExercise(state) => &state.exercise_task_id,
            IframeState::ViewSubmission(state) => &state.exercise_task_id,
            IframeState::ExerciseEditor(state) => &state.exercise_task_id,
        }
    }

    /// Validate an untyped state object.
    ///
    /// `tag` names the enclosing message in error reports. The `view_type`
    /// discriminator picks exactly one shape to check.
    pub fn validate(value: &Value, tag: &str) -> Result<Self, ValidationError> {
        let object = value.as_object().ok_or(ValidationError::NotAnObject)?;
        let raw_view_type = object
            .get("view_type")
            .and_then(Value::as_str)
            .ok_or_else(|| ValidationError::invalid(tag, "missing view_type"))?;
        let view_type = IframeViewType::parse(raw_view_type).ok_or_else(|| {
            ValidationError::invalid(tag, format!("unknown view_type {}", raw_view_type))
        })?;
        if !object.get("data").is_some_and(Value::is_object) {
            return Err(ValidationError::invalid(tag, "data must be an object"));
        }

        match view_type {
            IframeViewType::AnswerExercise => {
                decode_arm(tag, value).map(IframeState::AnswerExercise)
            }
            IframeViewType::ViewSubmission => {
                decode_arm(tag, value).map(IframeState::ViewSubmission)
            }
            IframeViewType::ExerciseEditor => {
                decode_arm(tag, value).map(IframeState::ExerciseEditor)
            }
        }
    }
}

/// Whether a value is a structurally valid state object.
pub fn is_iframe_state(value: &Value) -> bool {
    IframeState::validate(value, "state").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn submission() -> Value {
        json!({
            "id": "4d0a3f5e-0000-0000-0000-000000000001",
            "created_at": "2024-03-01T10:00:00Z",
            "updated_at": "2024-03-01T10:05:00Z",
            "deleted_at": null,
            "exercise_slide_submission_id": "slide-submission",
            "exercise_task_id": "task",
            "exercise_slide_id": "slide",
            "data_json": { "answer": 42 },
            "exercise_task_grading_id": null,
            "metadata": null
        })
    }

    #[test]
    fn answer_exercise_with_previous_submission() {
        let value = json!({
            "view_type": "answer-exercise",
            "exercise_task_id": "task",
            "user_information": { "pseudonymous_id": "p", "signed_in": true },
            "data": { "public_spec": [1, 2], "previous_submission": submission() }
        });

        let state = IframeState::validate(&value, "set-state").unwrap();
        assert_eq!(state.view_type(), IframeViewType::AnswerExercise);
        assert_eq!(state.exercise_task_id(), "task");
        match state {
            IframeState::AnswerExercise(state) => {
                let previous = state.data.previous_submission.unwrap();
                assert_eq!(previous.created_at.to_rfc3339(), "2024-03-01T10:00:00+00:00");
            }
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[test]
    fn timestamps_must_be_real_dates() {
        let mut previous = submission();
        previous["created_at"] = json!("yesterday");
        let value = json!({
            "view_type": "answer-exercise",
            "exercise_task_id": "task",
            "user_information": { "pseudonymous_id": "p", "signed_in": false },
            "data": { "public_spec": null, "previous_submission": previous }
        });

        let err = IframeState::validate(&value, "set-state").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidShape { .. }));
    }

    #[test]
    fn view_submission_checks_grading_progress() {
        let value = json!({
            "view_type": "view-submission",
            "exercise_task_id": "task",
            "user_information": { "pseudonymous_id": "p", "signed_in": true },
            "data": {
                "public_spec": {},
                "user_answer": {},
                "model_solution_spec": null,
                "grading": {
                    "grading_progress": "Halfway",
                    "score_given": 1,
                    "score_maximum": 2,
                    "feedback_text": null
                }
            }
        });

        assert!(!is_iframe_state(&value));
    }

    #[test]
    fn editor_checks_repository_exercises() {
        let value = json!({
            "view_type": "exercise-editor",
            "exercise_task_id": "task",
            "user_information": { "pseudonymous_id": "p", "signed_in": true },
            "repository_exercises": [{
                "id": "r1",
                "repository_id": "repo",
                "part": "part01",
                "name": "hello",
                "repository_url": "https://git.example.com/repo",
                "checksum": [1, 2, 3],
                "download_url": "https://git.example.com/repo/hello.zip"
            }],
            "data": { "private_spec": { "options": [] } }
        });
        assert!(is_iframe_state(&value));

        let mut broken = value.clone();
        broken["repository_exercises"][0]["checksum"] = json!("abc");
        assert!(!is_iframe_state(&broken));
    }

    #[test]
    fn unknown_view_type_and_non_object_data_are_rejected() {
        let unknown = json!({
            "view_type": "grade-exercise",
            "exercise_task_id": "task",
            "user_information": { "pseudonymous_id": "p", "signed_in": true },
            "data": {}
        });
        let err = IframeState::validate(&unknown, "set-state").unwrap_err();
        assert_eq!(
            err,
            ValidationError::invalid("set-state", "unknown view_type grade-exercise")
        );

        let scalar_data = json!({
            "view_type": "exercise-editor",
            "exercise_task_id": "task",
            "user_information": { "pseudonymous_id": "p", "signed_in": true },
            "data": "spec"
        });
        assert!(!is_iframe_state(&scalar_data));
    }
}
