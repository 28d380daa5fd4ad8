//! Error types for course progression

use thiserror::Error;

use super::pipeline::Stage;
use crate::api::{ApiError, Id, ProgressRecord, SubmissionStatus};

/// Errors raised by the progression engine
#[derive(Debug, Error)]
pub enum ProgressionError {
    /// Transport or authentication failure
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The optimistic local write succeeded but the server did not confirm it
    #[error("Progress saved locally but not synced: {source}")]
    ProgressNotSynced {
        /// Local record as it stands after the write
        record: ProgressRecord,
        /// Why the push failed
        source: ApiError,
    },

    /// Progress reported on a lecture that is still locked
    #[error("Lecture {lecture_id} is locked. Complete the previous lecture first")]
    LectureLocked {
        lecture_id: Id,
        /// Lecture that has to be watched first, if one exists
        blocking_lecture_id: Option<Id>,
    },

    /// Lecture id not part of the loaded course
    #[error("Lecture {0} is not part of this course")]
    UnknownLecture(Id),

    /// A pipeline stage was entered before the previous one completed
    #[error("{stage} is locked until the previous step is complete")]
    StageLocked { stage: Stage },

    /// Course has no assignment
    #[error("This course does not have an assignment yet")]
    NoAssignment,

    /// Course has no exam
    #[error("This course does not have an exam yet")]
    NoExam,

    /// Submission already waiting on an instructor
    #[error("Assignment is {} - wait for the instructor's review", .status.label())]
    AssignmentPending { status: SubmissionStatus },

    /// Approved submissions are final
    #[error("Assignment is already approved")]
    AssignmentAlreadyApproved,

    /// Exam attempts are single-shot
    #[error("Exam already taken")]
    ExamAlreadyTaken {
        score: Option<f64>,
        passed: bool,
    },
}

impl ProgressionError {
    /// Check if this error requires re-authentication
    pub fn requires_reauth(&self) -> bool {
        match self {
            Self::Api(e) | Self::ProgressNotSynced { source: e, .. } => e.requires_reauth(),
            _ => false,
        }
    }

    /// Check if this error was raised client-side by a gate, before any network call
    pub fn is_gating_violation(&self) -> bool {
        matches!(
            self,
            Self::LectureLocked { .. }
                | Self::StageLocked { .. }
                | Self::AssignmentPending { .. }
                | Self::AssignmentAlreadyApproved
                | Self::ExamAlreadyTaken { .. }
        )
    }

    /// Message suitable for showing to the student
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(e) if e.requires_reauth() => {
                "Your session has expired. Please sign in again.".to_string()
            }
            Self::Api(e) if e.is_recoverable() => {
                format!("Could not reach the server ({}). Please try again.", e)
            }
            Self::ProgressNotSynced { .. } => {
                "Your progress is saved on this device but could not be sent to the server. \
                 It will be sent with your next progress update."
                    .to_string()
            }
            Self::LectureLocked { .. } => {
                "This lecture is locked. Go back and complete the previous lecture first."
                    .to_string()
            }
            other => other.to_string(),
        }
    }
}
