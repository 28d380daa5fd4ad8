//! In-memory course API for testing.
//!
//! Behaves like the backend where it matters to the client: progress is an
//! upsert whose `watched` flag never reverts, a second exam attempt is refused,
//! and list endpoints return every student's records unless told otherwise.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use super::error::ApiError;
use super::models::*;
use super::traits::CourseApi;

#[derive(Debug, Default)]
struct MockState {
    lectures: Vec<Lecture>,
    progress: Vec<ProgressRecord>,
    assignments: Vec<Assignment>,
    assignment_submissions: Vec<AssignmentSubmission>,
    exams: Vec<Exam>,
    exam_submissions: Vec<ExamSubmission>,
    certificates: Vec<Certificate>,
    next_id: Id,
}

impl MockState {
    fn next_id(&mut self) -> Id {
        self.next_id += 1;
        self.next_id
    }
}

/// Mock backend for testing.
pub struct MockApi {
    student_id: Id,
    state: Mutex<MockState>,
    fail_progress_push: AtomicBool,
    fail_reads: AtomicBool,
    unauthorized: AtomicBool,
    issue_certificates: AtomicBool,
    progress_pushes: AtomicU32,
    calls: AtomicU32,
}

impl MockApi {
    /// Create an empty backend acting on behalf of `student_id`
    pub fn new(student_id: Id) -> Self {
        Self {
            student_id,
            state: Mutex::new(MockState { next_id: 1000, ..Default::default() }),
            fail_progress_push: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            unauthorized: AtomicBool::new(false),
            issue_certificates: AtomicBool::new(true),
            progress_pushes: AtomicU32::new(0),
            calls: AtomicU32::new(0),
        }
    }

    /// Add lectures `1..=count` (ids `100 + order`) to a course
    pub fn with_lectures(self, course_id: Id, count: u32) -> Self {
        {
            let mut state = self.lock();
            for order in 1..=count {
                state.lectures.push(Lecture {
                    id: 100 + order as Id,
                    course_id,
                    title: format!("Part {}", order),
                    description: String::new(),
                    order,
                    video_reference: Some(format!("/media/video_lectures/{}.mp4", order)),
                    duration_seconds: 600,
                });
            }
        }
        self
    }

    /// Add an assignment to a course
    pub fn with_assignment(self, assignment: Assignment) -> Self {
        self.lock().assignments.push(assignment);
        self
    }

    /// Add an exam to a course
    pub fn with_exam(self, exam: Exam) -> Self {
        self.lock().exams.push(exam);
        self
    }

    /// Insert a raw progress record (any student)
    pub fn with_progress(self, record: ProgressRecord) -> Self {
        self.lock().progress.push(record);
        self
    }

    /// Insert a raw assignment submission (any student)
    pub fn with_assignment_submission(self, submission: AssignmentSubmission) -> Self {
        self.lock().assignment_submissions.push(submission);
        self
    }

    /// Insert a raw exam submission (any student)
    pub fn with_exam_submission(self, submission: ExamSubmission) -> Self {
        self.lock().exam_submissions.push(submission);
        self
    }

    /// Insert a raw certificate (any student)
    pub fn with_certificate(self, certificate: Certificate) -> Self {
        self.lock().certificates.push(certificate);
        self
    }

    /// Whether a passing exam immediately issues a certificate
    pub fn with_certificate_issuance(self, enabled: bool) -> Self {
        self.issue_certificates.store(enabled, Ordering::SeqCst);
        self
    }

    /// Make progress pushes fail with a transport-like error
    pub fn set_fail_progress_push(&self, fail: bool) {
        self.fail_progress_push.store(fail, Ordering::SeqCst);
    }

    /// Make every read endpoint fail with a server error
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every call answer 401
    pub fn set_unauthorized(&self, unauthorized: bool) {
        self.unauthorized.store(unauthorized, Ordering::SeqCst);
    }

    /// Instructor action: change a submission's review status
    pub fn review_submission(
        &self,
        submission_id: Id,
        status: SubmissionStatus,
        score: Option<u32>,
    ) {
        let mut state = self.lock();
        if let Some(sub) = state.assignment_submissions.iter_mut().find(|s| s.id == submission_id) {
            sub.status = status;
            sub.score = score;
        }
    }

    /// Server-side issuance of a certificate for the acting student
    pub fn issue_certificate(&self, course_id: Id) {
        let mut state = self.lock();
        Self::issue_certificate_locked(&mut state, course_id, self.student_id);
    }

    /// Current server copy of the acting student's progress for a lecture
    pub fn progress_for(&self, lecture_id: Id) -> Option<ProgressRecord> {
        self.lock()
            .progress
            .iter()
            .find(|p| p.lecture_id == lecture_id && p.student_id == self.student_id)
            .cloned()
    }

    /// Number of successful and failed progress pushes received
    pub fn progress_push_count(&self) -> u32 {
        self.progress_pushes.load(Ordering::SeqCst)
    }

    /// Total number of calls made against this backend
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn enter(&self) -> Result<(), ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unauthorized.load(Ordering::SeqCst) {
            return Err(ApiError::Unauthorized { status: 401, message: "Invalid token.".into() });
        }
        Ok(())
    }

    fn enter_read(&self) -> Result<(), ApiError> {
        self.enter()?;
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(ApiError::ApiError { status: 503, message: "Service unavailable".into() });
        }
        Ok(())
    }

    fn issue_certificate_locked(state: &mut MockState, course_id: Id, student_id: Id) {
        let exists = state
            .certificates
            .iter()
            .any(|c| c.course_id == course_id && c.student_id == student_id);
        if !exists {
            let id = state.next_id();
            state.certificates.push(Certificate {
                id,
                course_id,
                student_id,
                certificate_id: format!(
                    "APL{:03}{:04}{}",
                    course_id,
                    student_id,
                    Utc::now().format("%y%m%d")
                ),
                issued_at: Utc::now(),
                download_url: None,
            });
        }
    }
}

#[async_trait]
impl CourseApi for MockApi {
    async fn list_lectures(&self, course_id: Id) -> Result<Vec<Lecture>, ApiError> {
        self.enter_read()?;
        Ok(self.lock().lectures.iter().filter(|l| l.course_id == course_id).cloned().collect())
    }

    async fn list_progress(&self) -> Result<Vec<ProgressRecord>, ApiError> {
        self.enter_read()?;
        Ok(self.lock().progress.clone())
    }

    async fn update_progress(&self, update: &ProgressUpdate) -> Result<(), ApiError> {
        self.enter()?;
        self.progress_pushes.fetch_add(1, Ordering::SeqCst);
        if self.fail_progress_push.load(Ordering::SeqCst) {
            return Err(ApiError::ApiError { status: 502, message: "Bad gateway".into() });
        }

        let mut state = self.lock();
        if !state.lectures.iter().any(|l| l.id == update.video_lecture) {
            return Err(ApiError::ApiError {
                status: 404,
                message: "Video lecture not found".into(),
            });
        }
        let student_id = self.student_id;
        match state
            .progress
            .iter_mut()
            .find(|p| p.lecture_id == update.video_lecture && p.student_id == student_id)
        {
            Some(record) => {
                record.progress_percent = update.progress;
                record.watched |= update.watched;
            }
            None => state.progress.push(ProgressRecord {
                lecture_id: update.video_lecture,
                student_id,
                progress_percent: update.progress,
                watched: update.watched,
            }),
        }
        Ok(())
    }

    async fn list_assignments(&self, course_id: Id) -> Result<Vec<Assignment>, ApiError> {
        self.enter_read()?;
        Ok(self.lock().assignments.iter().filter(|a| a.course_id == course_id).cloned().collect())
    }

    async fn list_assignment_submissions(
        &self,
        assignment_id: Id,
    ) -> Result<Vec<AssignmentSubmission>, ApiError> {
        self.enter_read()?;
        Ok(self
            .lock()
            .assignment_submissions
            .iter()
            .filter(|s| s.assignment_id == assignment_id)
            .cloned()
            .collect())
    }

    async fn create_assignment_submission(
        &self,
        submission: NewAssignmentSubmission,
    ) -> Result<AssignmentSubmission, ApiError> {
        self.enter()?;
        let mut state = self.lock();
        let student_id = self.student_id;

        // one row per (assignment, student); a resubmission resets review state
        if let Some(existing) = state
            .assignment_submissions
            .iter_mut()
            .find(|s| s.assignment_id == submission.assignment_id && s.student_id == student_id)
        {
            existing.status = SubmissionStatus::Submitted;
            existing.score = None;
            existing.feedback = None;
            existing.submission_text = Some(submission.submission_text);
            return Ok(existing.clone());
        }

        let id = state.next_id();
        let created = AssignmentSubmission {
            id,
            assignment_id: submission.assignment_id,
            student_id,
            status: SubmissionStatus::Submitted,
            score: None,
            feedback: None,
            submission_text: Some(submission.submission_text),
        };
        state.assignment_submissions.push(created.clone());
        Ok(created)
    }

    async fn list_exams(&self, course_id: Id) -> Result<Vec<Exam>, ApiError> {
        self.enter_read()?;
        Ok(self.lock().exams.iter().filter(|e| e.course_id == course_id).cloned().collect())
    }

    async fn list_questions(&self, exam_id: Id) -> Result<Vec<Question>, ApiError> {
        self.enter_read()?;
        Ok(self
            .lock()
            .exams
            .iter()
            .find(|e| e.id == exam_id)
            .map(|e| e.questions.clone())
            .unwrap_or_default())
    }

    async fn list_exam_submissions(&self, exam_id: Id) -> Result<Vec<ExamSubmission>, ApiError> {
        self.enter_read()?;
        Ok(self.lock().exam_submissions.iter().filter(|s| s.exam_id == exam_id).cloned().collect())
    }

    async fn create_exam_submission(
        &self,
        submission: &NewExamSubmission,
    ) -> Result<ExamResult, ApiError> {
        self.enter()?;
        let mut state = self.lock();
        let Some(exam) = state.exams.iter().find(|e| e.id == submission.exam).cloned() else {
            return Err(ApiError::ApiError { status: 404, message: "Exam not found".into() });
        };
        if state
            .exam_submissions
            .iter()
            .any(|s| s.exam_id == exam.id && s.student_id == self.student_id)
        {
            return Err(ApiError::ApiError {
                status: 400,
                message: "Exam already attempted".into(),
            });
        }

        // every answered question with a choice or "true" text counts as correct
        let total = submission.answers.len() as u32;
        let correct = submission
            .answers
            .iter()
            .filter(|a| {
                a.selected_choice_id.is_some()
                    || a.answer_text.as_deref().is_some_and(|t| t.eq_ignore_ascii_case("true"))
            })
            .count() as u32;
        let score = if total > 0 { correct as f64 / total as f64 * 100.0 } else { 0.0 };
        let passed = score >= exam.passing_score as f64;

        let id = state.next_id();
        state.exam_submissions.push(ExamSubmission {
            id,
            exam_id: exam.id,
            student_id: self.student_id,
            score: Some(score),
            passed,
        });

        let issued = passed && self.issue_certificates.load(Ordering::SeqCst);
        if issued {
            Self::issue_certificate_locked(&mut state, exam.course_id, self.student_id);
        }

        Ok(ExamResult {
            score,
            passed,
            total_questions: Some(total),
            correct_answers: Some(correct),
            certificate_issued: Some(issued),
        })
    }

    async fn list_certificates(&self, course_id: Id) -> Result<Vec<Certificate>, ApiError> {
        self.enter_read()?;
        Ok(self.lock().certificates.iter().filter(|c| c.course_id == course_id).cloned().collect())
    }
}
