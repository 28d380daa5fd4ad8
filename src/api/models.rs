//! Data models for course API requests and responses
//!
//! Field names follow the data model used throughout the crate; serde renames
//! map them onto the backend's wire names (`video_lecture`, `student`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of any server-side record
pub type Id = u64;

/// A single video lecture of a course
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lecture {
    pub id: Id,
    #[serde(rename = "course")]
    pub course_id: Id,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// 1-based position in the course's unlock chain
    pub order: u32,
    /// Video file path or URL as returned by the server
    #[serde(rename = "video_file", default)]
    pub video_reference: Option<String>,
    #[serde(rename = "duration", default)]
    pub duration_seconds: u32,
}

/// Watch progress of one student on one lecture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    #[serde(rename = "video_lecture")]
    pub lecture_id: Id,
    #[serde(rename = "student")]
    pub student_id: Id,
    /// Percentage watched (0-100)
    #[serde(rename = "progress", default)]
    pub progress_percent: f64,
    #[serde(default)]
    pub watched: bool,
}

/// Body of `POST /progress/update_progress/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub video_lecture: Id,
    pub progress: f64,
    pub watched: bool,
}

/// Course assignment metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: Id,
    #[serde(rename = "course")]
    pub course_id: Id,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default = "default_max_score")]
    pub max_score: u32,
}

fn default_max_score() -> u32 {
    100
}

/// Review status of an assignment submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    /// No submission record exists yet (never sent by the server)
    NotSubmitted,
    Submitted,
    UnderReview,
    Approved,
    Rejected,
    /// Any status this client does not know, e.g. `reviewed`
    #[serde(other)]
    Unknown,
}

impl SubmissionStatus {
    /// Waiting on an instructor
    pub fn is_pending_review(&self) -> bool {
        matches!(self, Self::Submitted | Self::UnderReview | Self::Unknown)
    }

    /// Review outcome reached
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Self::NotSubmitted => "not submitted",
            Self::Submitted => "submitted",
            Self::UnderReview => "under review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Unknown => "awaiting a decision",
        }
    }
}

/// A student's submission for an assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentSubmission {
    pub id: Id,
    #[serde(rename = "assignment")]
    pub assignment_id: Id,
    #[serde(rename = "student")]
    pub student_id: Id,
    pub status: SubmissionStatus,
    #[serde(default)]
    pub score: Option<u32>,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default)]
    pub submission_text: Option<String>,
}

/// File attached to an assignment submission
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Multipart form sent to `POST /assignment-submissions/`
#[derive(Debug, Clone, PartialEq)]
pub struct NewAssignmentSubmission {
    pub assignment_id: Id,
    pub submission_text: String,
    pub file: Option<SubmissionFile>,
}

/// Kind of exam question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
}

/// Answer option of a multiple-choice question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub id: Id,
    pub choice_text: String,
}

/// Exam question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: Id,
    #[serde(rename = "question_text")]
    pub text: String,
    #[serde(rename = "question_type")]
    pub kind: QuestionKind,
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub score: u32,
    #[serde(default)]
    pub choices: Vec<Choice>,
}

/// Final exam of a course
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exam {
    pub id: Id,
    #[serde(rename = "course")]
    pub course_id: Id,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "duration", default)]
    pub duration_minutes: u32,
    #[serde(default = "default_passing_score")]
    pub passing_score: u32,
    #[serde(default)]
    pub questions: Vec<Question>,
}

fn default_passing_score() -> u32 {
    70
}

/// A student's single exam attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamSubmission {
    pub id: Id,
    #[serde(rename = "exam")]
    pub exam_id: Id,
    #[serde(rename = "student")]
    pub student_id: Id,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub passed: bool,
}

/// One answer in an exam attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamAnswer {
    pub question_id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_choice_id: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_text: Option<String>,
}

impl ExamAnswer {
    /// Answer by picking a choice
    pub fn choice(question_id: Id, choice_id: Id) -> Self {
        Self { question_id, selected_choice_id: Some(choice_id), answer_text: None }
    }

    /// Answer with free text (also used for true/false)
    pub fn text(question_id: Id, text: impl Into<String>) -> Self {
        Self { question_id, selected_choice_id: None, answer_text: Some(text.into()) }
    }
}

/// Body of `POST /exam-submissions/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExamSubmission {
    pub exam: Id,
    pub answers: Vec<ExamAnswer>,
    pub student: Id,
}

/// Server verdict on an exam attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamResult {
    pub score: f64,
    pub passed: bool,
    #[serde(default)]
    pub total_questions: Option<u32>,
    #[serde(default)]
    pub correct_answers: Option<u32>,
    #[serde(default)]
    pub certificate_issued: Option<bool>,
}

/// Proof of course completion, only ever created by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    pub id: Id,
    #[serde(rename = "course")]
    pub course_id: Id,
    #[serde(rename = "student")]
    pub student_id: Id,
    pub certificate_id: String,
    #[serde(alias = "issued_date")]
    pub issued_at: DateTime<Utc>,
    #[serde(default)]
    pub download_url: Option<String>,
}

/// Records that belong to a single student
pub trait StudentOwned {
    fn student_id(&self) -> Id;
}

impl StudentOwned for ProgressRecord {
    fn student_id(&self) -> Id {
        self.student_id
    }
}

impl StudentOwned for AssignmentSubmission {
    fn student_id(&self) -> Id {
        self.student_id
    }
}

impl StudentOwned for ExamSubmission {
    fn student_id(&self) -> Id {
        self.student_id
    }
}

impl StudentOwned for Certificate {
    fn student_id(&self) -> Id {
        self.student_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lecture_deserializes_from_wire_names() {
        let json = r#"{
            "id": 7, "title": "Intro", "course": 3,
            "video_file": "/media/video_lectures/intro.mp4",
            "video_url": "http://localhost:8000/media/video_lectures/intro.mp4",
            "duration": 600, "order": 1, "description": "Welcome",
            "created_at": "2025-01-01T00:00:00Z"
        }"#;
        let lecture: Lecture = serde_json::from_str(json).unwrap();
        assert_eq!(lecture.course_id, 3);
        assert_eq!(lecture.duration_seconds, 600);
        assert_eq!(lecture.video_reference.as_deref(), Some("/media/video_lectures/intro.mp4"));
    }

    #[test]
    fn progress_record_deserializes_from_wire_names() {
        let json = r#"{"id": 1, "student": 4, "video_lecture": 7, "watched": true,
                       "progress": 95.5, "last_watched": "2025-01-01T00:00:00Z"}"#;
        let record: ProgressRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.lecture_id, 7);
        assert_eq!(record.student_id, 4);
        assert!(record.watched);
    }

    #[test]
    fn submission_status_parses_snake_case() {
        let status: SubmissionStatus = serde_json::from_str(r#""under_review""#).unwrap();
        assert_eq!(status, SubmissionStatus::UnderReview);
        assert!(status.is_pending_review());
        assert!(!status.is_terminal());
    }

    #[test]
    fn unrecognized_submission_status_still_parses() {
        let json = r#"{"id": 11, "assignment": 5, "student": 4, "status": "reviewed",
                       "score": null, "feedback": "Looked at it"}"#;
        let submission: AssignmentSubmission = serde_json::from_str(json).unwrap();
        assert_eq!(submission.status, SubmissionStatus::Unknown);
        assert!(submission.status.is_pending_review());
        assert!(!submission.status.is_terminal());
    }

    #[test]
    fn exam_answer_omits_empty_fields() {
        let json = serde_json::to_string(&ExamAnswer::choice(1, 5)).unwrap();
        assert_eq!(json, r#"{"question_id":1,"selected_choice_id":5}"#);
    }

    #[test]
    fn certificate_accepts_issued_date_alias() {
        let json = r#"{"id": 1, "course": 2, "student": 3, "certificate_id": "APL0020003250101",
                       "issued_date": "2025-01-01T10:00:00Z", "final_score": "88.00"}"#;
        let cert: Certificate = serde_json::from_str(json).unwrap();
        assert_eq!(cert.certificate_id, "APL0020003250101");
        assert!(cert.download_url.is_none());
    }
}
