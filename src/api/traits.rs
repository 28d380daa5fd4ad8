//! The `CourseApi` trait - one method per REST endpoint the client consumes.
//!
//! Implemented by [`ApiClient`](super::ApiClient) for the real server and by
//! [`MockApi`](super::MockApi) for tests. Results are returned as the server
//! sends them; ownership filtering and sorting happen in the sync layer.

use async_trait::async_trait;

use super::error::ApiError;
use super::models::*;

#[async_trait]
pub trait CourseApi: Send + Sync {
    /// `GET /video-lectures/?course_id={id}`
    async fn list_lectures(&self, course_id: Id) -> Result<Vec<Lecture>, ApiError>;

    /// `GET /progress/`
    async fn list_progress(&self) -> Result<Vec<ProgressRecord>, ApiError>;

    /// `POST /progress/update_progress/`
    async fn update_progress(&self, update: &ProgressUpdate) -> Result<(), ApiError>;

    /// `GET /assignments/?course_id={id}`
    async fn list_assignments(&self, course_id: Id) -> Result<Vec<Assignment>, ApiError>;

    /// `GET /assignment-submissions/?assignment={id}`
    async fn list_assignment_submissions(
        &self,
        assignment_id: Id,
    ) -> Result<Vec<AssignmentSubmission>, ApiError>;

    /// `POST /assignment-submissions/` (multipart)
    async fn create_assignment_submission(
        &self,
        submission: NewAssignmentSubmission,
    ) -> Result<AssignmentSubmission, ApiError>;

    /// `GET /exams/?course_id={id}`
    async fn list_exams(&self, course_id: Id) -> Result<Vec<Exam>, ApiError>;

    /// `GET /questions/?exam_id={id}`
    async fn list_questions(&self, exam_id: Id) -> Result<Vec<Question>, ApiError>;

    /// `GET /exam-submissions/?exam={id}`
    async fn list_exam_submissions(&self, exam_id: Id) -> Result<Vec<ExamSubmission>, ApiError>;

    /// `POST /exam-submissions/`
    async fn create_exam_submission(
        &self,
        submission: &NewExamSubmission,
    ) -> Result<ExamResult, ApiError>;

    /// `GET /certificates/?course_id={id}`
    async fn list_certificates(&self, course_id: Id) -> Result<Vec<Certificate>, ApiError>;
}
