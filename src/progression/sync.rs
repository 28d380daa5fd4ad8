//! Network I/O for course progression
//!
//! Wraps a [`CourseApi`] and turns raw endpoint results into the views the
//! engine works with: lectures sorted by order, records narrowed to the
//! signed-in student, and the first assignment/exam of a course.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use super::poll::{PollHandle, spawn_poller};
use crate::api::*;

/// Assignment of a course together with the student's submission
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssignmentStatus {
    pub assignment: Option<Assignment>,
    pub submission: Option<AssignmentSubmission>,
}

impl AssignmentStatus {
    /// Review status, `NotSubmitted` when no submission exists
    pub fn status(&self) -> SubmissionStatus {
        self.submission.as_ref().map_or(SubmissionStatus::NotSubmitted, |s| s.status)
    }

    /// Whether the review reached approved or rejected
    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }
}

/// Exam of a course together with the student's attempt
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExamStatus {
    pub exam: Option<Exam>,
    pub submission: Option<ExamSubmission>,
}

/// Drop records that belong to other students.
///
/// The server is expected to scope these endpoints to the caller; this check
/// only guards against it returning more than it should and is not an
/// authorization mechanism.
pub fn retain_owned<T: StudentOwned>(records: Vec<T>, student_id: Id, kind: &str) -> Vec<T> {
    let total = records.len();
    let owned: Vec<T> = records.into_iter().filter(|r| r.student_id() == student_id).collect();
    if owned.len() != total {
        tracing::warn!(
            "Filtered out {} {} record(s) belonging to other students",
            total - owned.len(),
            kind
        );
    }
    owned
}

/// Transport boundary of the progression engine
#[derive(Clone)]
pub struct SyncLayer {
    api: Arc<dyn CourseApi>,
    student_id: Id,
}

impl SyncLayer {
    /// Create a sync layer acting for `student_id`
    pub fn new(api: Arc<dyn CourseApi>, student_id: Id) -> Self {
        Self { api, student_id }
    }

    /// The signed-in student
    pub fn student_id(&self) -> Id {
        self.student_id
    }

    /// Lectures of a course ordered by `order`
    pub async fn fetch_lectures(&self, course_id: Id) -> Result<Vec<Lecture>, ApiError> {
        let mut lectures = self.api.list_lectures(course_id).await?;
        lectures.retain(|l| l.course_id == course_id);
        lectures.sort_by_key(|l| (l.order, l.id));
        tracing::debug!("Fetched {} lectures for course {}", lectures.len(), course_id);
        Ok(lectures)
    }

    /// The student's progress records for the given lectures
    pub async fn fetch_progress(
        &self,
        lectures: &[Lecture],
    ) -> Result<Vec<ProgressRecord>, ApiError> {
        let ids: HashSet<Id> = lectures.iter().map(|l| l.id).collect();
        let records = retain_owned(self.api.list_progress().await?, self.student_id, "progress");
        Ok(records.into_iter().filter(|r| ids.contains(&r.lecture_id)).collect())
    }

    /// Report playback progress for a lecture
    pub async fn push_progress(
        &self,
        lecture_id: Id,
        percent: f64,
        watched: bool,
    ) -> Result<(), ApiError> {
        tracing::debug!(
            "Pushing progress {:.0}% (watched: {}) for lecture {}",
            percent,
            watched,
            lecture_id
        );
        let update = ProgressUpdate { video_lecture: lecture_id, progress: percent, watched };
        self.api.update_progress(&update).await
    }

    /// The course's assignment and the student's latest submission for it
    pub async fn fetch_assignment_status(
        &self,
        course_id: Id,
    ) -> Result<AssignmentStatus, ApiError> {
        let Some(assignment) = self.api.list_assignments(course_id).await?.into_iter().next() else {
            return Ok(AssignmentStatus::default());
        };

        let submissions = retain_owned(
            self.api.list_assignment_submissions(assignment.id).await?,
            self.student_id,
            "assignment submission",
        );
        let submission = submissions
            .into_iter()
            .filter(|s| s.assignment_id == assignment.id)
            .max_by_key(|s| s.id);

        Ok(AssignmentStatus { assignment: Some(assignment), submission })
    }

    /// Submit (or resubmit) an assignment
    pub async fn submit_assignment(
        &self,
        assignment_id: Id,
        text: impl Into<String>,
        file: Option<SubmissionFile>,
    ) -> Result<AssignmentSubmission, ApiError> {
        let submission =
            NewAssignmentSubmission { assignment_id, submission_text: text.into(), file };
        let created = self.api.create_assignment_submission(submission).await?;
        tracing::info!("Submitted assignment {} (submission {})", assignment_id, created.id);
        Ok(created)
    }

    /// The course's exam including its questions
    pub async fn fetch_exam(&self, course_id: Id) -> Result<Option<Exam>, ApiError> {
        let Some(mut exam) = self.api.list_exams(course_id).await?.into_iter().next() else {
            return Ok(None);
        };
        if exam.questions.is_empty() {
            exam.questions = self.api.list_questions(exam.id).await?;
        }
        exam.questions.sort_by_key(|q| (q.order, q.id));
        Ok(Some(exam))
    }

    /// The student's attempt at an exam, if any
    pub async fn fetch_exam_status(
        &self,
        exam_id: Id,
    ) -> Result<Option<ExamSubmission>, ApiError> {
        let submissions = retain_owned(
            self.api.list_exam_submissions(exam_id).await?,
            self.student_id,
            "exam submission",
        );
        Ok(submissions.into_iter().filter(|s| s.exam_id == exam_id).min_by_key(|s| s.id))
    }

    /// Exam and attempt of a course in one call
    pub async fn fetch_exam_state(&self, course_id: Id) -> Result<ExamStatus, ApiError> {
        let Some(exam) = self.fetch_exam(course_id).await? else {
            return Ok(ExamStatus::default());
        };
        let submission = self.fetch_exam_status(exam.id).await?;
        Ok(ExamStatus { exam: Some(exam), submission })
    }

    /// Submit the single exam attempt
    pub async fn submit_exam(
        &self,
        exam_id: Id,
        answers: Vec<ExamAnswer>,
    ) -> Result<ExamResult, ApiError> {
        let submission = NewExamSubmission { exam: exam_id, answers, student: self.student_id };
        let result = self.api.create_exam_submission(&submission).await?;
        tracing::info!(
            "Exam {} submitted: score {:.1}, passed {}",
            exam_id,
            result.score,
            result.passed
        );
        Ok(result)
    }

    /// The student's certificate for a course, if issued
    pub async fn fetch_certificate(&self, course_id: Id) -> Result<Option<Certificate>, ApiError> {
        let certificates = retain_owned(
            self.api.list_certificates(course_id).await?,
            self.student_id,
            "certificate",
        );
        Ok(certificates.into_iter().find(|c| c.course_id == course_id))
    }

    /// Re-fetch assignment status until the review reaches a verdict
    pub fn start_review_polling(
        &self,
        course_id: Id,
        interval: Duration,
    ) -> PollHandle<AssignmentStatus> {
        let sync = self.clone();
        spawn_poller(
            interval,
            move || {
                let sync = sync.clone();
                async move { sync.fetch_assignment_status(course_id).await }
            },
            AssignmentStatus::is_terminal,
        )
    }

    /// Re-fetch the certificate until the server has issued it
    pub fn start_certificate_polling(
        &self,
        course_id: Id,
        interval: Duration,
    ) -> PollHandle<Option<Certificate>> {
        let sync = self.clone();
        spawn_poller(
            interval,
            move || {
                let sync = sync.clone();
                async move { sync.fetch_certificate(course_id).await }
            },
            Option::is_some,
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn assignment() -> Assignment {
        Assignment {
            id: 5,
            course_id: 1,
            title: "Essay".into(),
            description: String::new(),
            due_date: None,
            max_score: 100,
        }
    }

    fn submission(id: Id, student_id: Id, status: SubmissionStatus) -> AssignmentSubmission {
        AssignmentSubmission {
            id,
            assignment_id: 5,
            student_id,
            status,
            score: None,
            feedback: None,
            submission_text: None,
        }
    }

    #[test]
    fn retain_owned_filters_other_students() {
        let records = vec![
            submission(1, 4, SubmissionStatus::Submitted),
            submission(2, 9, SubmissionStatus::Approved),
        ];
        let owned = retain_owned(records, 4, "assignment submission");
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].id, 1);
    }

    #[tokio::test]
    async fn lectures_come_back_sorted() {
        let api = Arc::new(MockApi::new(4).with_lectures(1, 3));
        let sync = SyncLayer::new(api, 4);
        let lectures = sync.fetch_lectures(1).await.unwrap();
        let orders: Vec<u32> = lectures.iter().map(|l| l.order).collect();
        assert_eq!(orders, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn assignment_status_ignores_other_students_approval() {
        let api = Arc::new(
            MockApi::new(4)
                .with_assignment(assignment())
                .with_assignment_submission(submission(2, 9, SubmissionStatus::Approved)),
        );
        let status = SyncLayer::new(api, 4).fetch_assignment_status(1).await.unwrap();
        assert!(status.assignment.is_some());
        assert_eq!(status.status(), SubmissionStatus::NotSubmitted);
    }

    #[tokio::test]
    async fn course_without_assignment_has_empty_status() {
        let api = Arc::new(MockApi::new(4));
        let status = SyncLayer::new(api, 4).fetch_assignment_status(1).await.unwrap();
        assert_eq!(status, AssignmentStatus::default());
    }

    #[tokio::test]
    async fn certificate_of_other_student_is_not_ours() {
        let api = Arc::new(MockApi::new(4).with_certificate(Certificate {
            id: 1,
            course_id: 1,
            student_id: 9,
            certificate_id: "APL0010009250101".into(),
            issued_at: Utc::now(),
            download_url: None,
        }));
        assert!(SyncLayer::new(api, 4).fetch_certificate(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn review_polling_stops_on_verdict() {
        let api = Arc::new(
            MockApi::new(4)
                .with_assignment(assignment())
                .with_assignment_submission(submission(11, 4, SubmissionStatus::Submitted)),
        );
        let sync = SyncLayer::new(api.clone(), 4);
        let mut handle = sync.start_review_polling(1, Duration::from_millis(10));

        let first = handle.next().await.unwrap().unwrap();
        assert_eq!(first.status(), SubmissionStatus::Submitted);

        api.review_submission(11, SubmissionStatus::Approved, Some(92));
        let mut last = first;
        while let Some(update) = handle.next().await {
            last = update.unwrap();
        }
        assert_eq!(last.status(), SubmissionStatus::Approved);
        assert!(handle.is_stopped());
    }

    #[tokio::test]
    async fn certificate_polling_stops_once_issued() {
        let api = Arc::new(MockApi::new(4));
        let sync = SyncLayer::new(api.clone(), 4);
        let mut handle = sync.start_certificate_polling(1, Duration::from_millis(10));

        assert!(handle.next().await.unwrap().unwrap().is_none());
        api.issue_certificate(1);

        let mut issued = None;
        while let Some(update) = handle.next().await {
            issued = update.unwrap();
        }
        assert_eq!(issued.unwrap().student_id, 4);
    }
}
