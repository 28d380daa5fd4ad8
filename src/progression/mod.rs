//! Course progression engine
//!
//! Tracks where a student stands in a course: which lectures are open, which
//! one is current, and how far the videos, assignment, exam and certificate
//! pipeline has advanced. All state comes from the server through the
//! [`SyncLayer`]; local writes are limited to optimistic progress updates.

pub mod error;
pub mod gating;
pub mod pipeline;
pub mod poll;
pub mod store;
pub mod sync;
pub mod unlock;

use std::time::Duration;

use serde::Serialize;

pub use error::ProgressionError;
pub use gating::{GateReason, GateViolation, GatingController, Navigation};
pub use pipeline::{
    AssignmentStage, CertificateStage, CompletionPipeline, ExamStage, ExamView, Stage,
};
pub use poll::PollHandle;
pub use store::ProgressStore;
pub use sync::{AssignmentStatus, ExamStatus, SyncLayer};
pub use unlock::{LectureState, is_accessible};

use crate::api::*;
use pipeline::PipelineInputs;

/// Tunables of the engine
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressionSettings {
    /// A report above this percentage marks the lecture watched
    pub watched_threshold_percent: f64,
    /// Playback reports are pushed once per step of this size
    pub progress_push_step_percent: f64,
    pub review_poll_interval: Duration,
    pub certificate_poll_interval: Duration,
}

impl Default for ProgressionSettings {
    fn default() -> Self {
        Self {
            watched_threshold_percent: 90.0,
            progress_push_step_percent: 25.0,
            review_poll_interval: Duration::from_secs(5),
            certificate_poll_interval: Duration::from_secs(10),
        }
    }
}

/// Snapshot of the student's position, recomputed on every call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseProgressionState {
    pub current_lecture_index: Option<usize>,
    /// Highest lecture order currently open
    pub unlocked_up_to: Option<u32>,
    pub lecture_states: Vec<LectureState>,
    pub stage: Stage,
    pub assignment_stage: AssignmentStage,
    pub exam_stage: ExamStage,
    pub certificate_stage: CertificateStage,
}

/// Watched-lecture totals
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressSummary {
    pub watched: usize,
    pub total: usize,
    pub percent_complete: f64,
}

/// One student's progression through one course
pub struct CourseProgression {
    course_id: Id,
    sync: SyncLayer,
    settings: ProgressionSettings,
    /// Fixed for the lifetime of this value
    lectures: Vec<Lecture>,
    store: ProgressStore,
    gating: GatingController,
    assignment: AssignmentStatus,
    exam: ExamStatus,
    /// Verdict of an attempt made in this session, until the server lists it
    exam_result: Option<ExamResult>,
    certificate: Option<Certificate>,
}

impl CourseProgression {
    /// Fetch everything needed to place the student in a course
    pub async fn load(
        sync: SyncLayer,
        course_id: Id,
        settings: ProgressionSettings,
    ) -> Result<Self, ProgressionError> {
        let lectures = sync.fetch_lectures(course_id).await?;
        let store = ProgressStore::new(
            course_id,
            sync.student_id(),
            settings.watched_threshold_percent,
            settings.progress_push_step_percent,
        );

        let mut progression = Self {
            course_id,
            sync,
            settings,
            lectures,
            store,
            gating: GatingController::default(),
            assignment: AssignmentStatus::default(),
            exam: ExamStatus::default(),
            exam_result: None,
            certificate: None,
        };
        progression.refresh().await?;
        progression.gating =
            GatingController::resume(&progression.lectures, progression.store.records());

        tracing::info!(
            "Loaded course {} with {} lectures at stage {}",
            course_id,
            progression.lectures.len(),
            progression.pipeline().stage
        );
        Ok(progression)
    }

    /// Re-fetch progress, assignment, exam and certificate state.
    ///
    /// Nothing is replaced unless every fetch succeeds.
    pub async fn refresh(&mut self) -> Result<(), ProgressionError> {
        let (progress, assignment, exam, certificate) = futures_util::try_join!(
            self.sync.fetch_progress(&self.lectures),
            self.sync.fetch_assignment_status(self.course_id),
            self.sync.fetch_exam_state(self.course_id),
            self.sync.fetch_certificate(self.course_id),
        )?;

        let before = self.pipeline().stage;
        self.store.merge(progress);
        self.assignment = assignment;
        self.exam = exam;
        if certificate.is_some() {
            self.certificate = certificate;
        }
        self.log_stage_change(before);
        Ok(())
    }

    fn log_stage_change(&self, before: Stage) {
        let after = self.pipeline().stage;
        if after != before {
            tracing::info!("Course {} moved from {} to {}", self.course_id, before, after);
        }
    }

    /// Course being tracked
    pub fn course_id(&self) -> Id {
        self.course_id
    }

    /// Engine settings
    pub fn settings(&self) -> &ProgressionSettings {
        &self.settings
    }

    /// Lectures ordered by `order`
    pub fn lectures(&self) -> &[Lecture] {
        &self.lectures
    }

    /// Progress cache
    pub fn progress(&self) -> &ProgressStore {
        &self.store
    }

    /// Last fetched assignment status
    pub fn assignment(&self) -> &AssignmentStatus {
        &self.assignment
    }

    /// Last fetched exam status
    pub fn exam(&self) -> &ExamStatus {
        &self.exam
    }

    /// Certificate, once issued
    pub fn certificate(&self) -> Option<&Certificate> {
        self.certificate.as_ref()
    }

    /// The lecture currently selected
    pub fn current_lecture(&self) -> Option<&Lecture> {
        self.gating.current(&self.lectures)
    }

    /// Derived pipeline position
    pub fn pipeline(&self) -> CompletionPipeline {
        CompletionPipeline::derive(PipelineInputs {
            lectures: &self.lectures,
            progress: self.store.records(),
            assignment: &self.assignment,
            exam: &self.exam,
            certificate: self.certificate.as_ref(),
        })
    }

    /// Full snapshot of the student's position
    pub fn state(&self) -> CourseProgressionState {
        let pipeline = self.pipeline();
        let progress = self.store.records();
        CourseProgressionState {
            current_lecture_index: (!self.lectures.is_empty()).then(|| self.gating.current_index()),
            unlocked_up_to: unlock::unlocked_up_to(&self.lectures, progress),
            lecture_states: self.gating.lecture_states(&self.lectures, progress),
            stage: pipeline.stage,
            assignment_stage: pipeline.assignment,
            exam_stage: pipeline.exam,
            certificate_stage: pipeline.certificate,
        }
    }

    /// Watched-lecture totals
    pub fn summary(&self) -> ProgressSummary {
        let total = self.lectures.len();
        let watched = self.store.watched_count(&self.lectures);
        let percent_complete = if total == 0 { 0.0 } else { watched as f64 / total as f64 * 100.0 };
        ProgressSummary { watched, total, percent_complete }
    }

    /// Whether the lecture at `index` may be opened
    pub fn is_lecture_accessible(&self, index: usize) -> bool {
        self.lectures
            .get(index)
            .is_some_and(|l| is_accessible(l, &self.lectures, self.store.records()))
    }

    /// Switch to the lecture at `index`
    pub fn select_lecture(&mut self, index: usize) -> Navigation {
        self.gating.select_lecture(index, &self.lectures, self.store.records())
    }

    /// Advance to the next lecture
    pub fn next(&mut self) -> Navigation {
        self.gating.next(&self.lectures, self.store.records())
    }

    /// Go back one lecture
    pub fn previous(&mut self) -> Navigation {
        self.gating.previous()
    }

    /// Record playback progress for an open lecture.
    ///
    /// The local write lands before this returns, so a following
    /// accessibility check already sees it even when the push failed.
    /// That includes an authentication failure: the local unlock is kept and
    /// the error answers `requires_reauth()`, after which callers must sign in
    /// again before relying on server state.
    pub async fn record_progress(
        &mut self,
        lecture_id: Id,
        percent: f64,
        watched: bool,
    ) -> Result<ProgressRecord, ProgressionError> {
        let Some(lecture) = self.lectures.iter().find(|l| l.id == lecture_id) else {
            return Err(ProgressionError::UnknownLecture(lecture_id));
        };
        if !is_accessible(lecture, &self.lectures, self.store.records()) {
            let blocking_lecture_id =
                unlock::blocking_lecture(lecture, &self.lectures, self.store.records());
            return Err(ProgressionError::LectureLocked { lecture_id, blocking_lecture_id });
        }

        let before = self.pipeline().stage;
        let result = self.store.record_progress(&self.sync, lecture_id, percent, watched).await;
        self.log_stage_change(before);
        result
    }

    /// Submit or resubmit the course assignment
    pub async fn submit_assignment(
        &mut self,
        text: impl Into<String>,
        file: Option<SubmissionFile>,
    ) -> Result<AssignmentSubmission, ProgressionError> {
        self.pipeline().ensure_can_submit_assignment()?;
        let assignment_id = self
            .assignment
            .assignment
            .as_ref()
            .map(|a| a.id)
            .ok_or(ProgressionError::NoAssignment)?;

        let submission = self.sync.submit_assignment(assignment_id, text, file).await?;
        self.assignment.submission = Some(submission.clone());
        Ok(submission)
    }

    /// Exam form, or the read-only result when an attempt exists
    pub fn exam_view(&self) -> ExamView {
        if self.exam.submission.is_none() {
            if let Some(result) = &self.exam_result {
                return ExamView::Result { score: Some(result.score), passed: result.passed };
            }
        }
        self.pipeline().exam_view(&self.exam)
    }

    /// Submit the single exam attempt
    pub async fn submit_exam(
        &mut self,
        answers: Vec<ExamAnswer>,
    ) -> Result<ExamResult, ProgressionError> {
        if let Some(result) = &self.exam_result {
            return Err(ProgressionError::ExamAlreadyTaken {
                score: Some(result.score),
                passed: result.passed,
            });
        }
        self.pipeline().ensure_can_take_exam()?;
        let exam_id = self.exam.exam.as_ref().map(|e| e.id).ok_or(ProgressionError::NoExam)?;

        let result = match self.sync.submit_exam(exam_id, answers).await {
            Ok(result) => result,
            Err(e) => {
                // a 400 usually means an attempt already exists; show it instead of the form
                if matches!(e, ApiError::ApiError { status: 400, .. }) {
                    if let Ok(submission) = self.sync.fetch_exam_status(exam_id).await {
                        self.exam.submission = submission;
                    }
                }
                return Err(e.into());
            }
        };
        self.exam_result = Some(result.clone());

        let before = self.pipeline().stage;
        match futures_util::try_join!(
            self.sync.fetch_exam_status(exam_id),
            self.sync.fetch_certificate(self.course_id),
        ) {
            Ok((submission, certificate)) => {
                self.exam.submission = submission;
                if certificate.is_some() {
                    self.certificate = certificate;
                }
            }
            Err(e) => tracing::warn!("Exam submitted but status refresh failed: {}", e),
        }
        self.log_stage_change(before);
        Ok(result)
    }

    /// Ask the server whether the certificate has been issued
    pub async fn refresh_certificate(&mut self) -> Result<Option<&Certificate>, ProgressionError> {
        let certificate = self.sync.fetch_certificate(self.course_id).await?;
        self.apply_certificate(certificate);
        Ok(self.certificate.as_ref())
    }

    /// Start polling the assignment review if it is pending
    pub fn watch_review(&self) -> Option<PollHandle<AssignmentStatus>> {
        self.assignment.status().is_pending_review().then(|| {
            self.sync.start_review_polling(self.course_id, self.settings.review_poll_interval)
        })
    }

    /// Take in an assignment status delivered by the review poller
    pub fn apply_assignment_status(&mut self, status: AssignmentStatus) {
        let before = self.pipeline().stage;
        if status.status() != self.assignment.status() {
            tracing::info!("Assignment review status is now {}", status.status().label());
        }
        self.assignment = status;
        self.log_stage_change(before);
    }

    /// Start polling for the certificate if the exam is passed but nothing is issued yet
    pub fn watch_certificate(&self) -> Option<PollHandle<Option<Certificate>>> {
        let interval = self.settings.certificate_poll_interval;
        (self.pipeline().certificate == CertificateStage::Pending)
            .then(|| self.sync.start_certificate_polling(self.course_id, interval))
    }

    /// Take in a certificate delivered by a fetch or the certificate poller
    pub fn apply_certificate(&mut self, certificate: Option<Certificate>) {
        if let Some(certificate) = certificate {
            if self.certificate.is_none() {
                tracing::info!("Certificate {} issued", certificate.certificate_id);
            }
            self.certificate = Some(certificate);
        }
    }
}
