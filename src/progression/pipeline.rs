//! Course completion pipeline: videos, then assignment, then exam, then certificate
//!
//! Every stage is derived from fetched server state alone, so reloading the
//! client in the middle of a course reconstructs the same position.

use std::fmt;

use serde::Serialize;

use super::error::ProgressionError;
use super::sync::{AssignmentStatus, ExamStatus};
use super::unlock::ProgressMap;
use crate::api::{Certificate, Exam, Lecture, SubmissionStatus};

/// Macro-stage of a course
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Stage {
    Videos,
    Assignment,
    Exam,
    Certificate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Videos => "Videos",
            Self::Assignment => "Assignment",
            Self::Exam => "Exam",
            Self::Certificate => "Certificate",
        };
        f.write_str(name)
    }
}

/// Assignment sub-state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AssignmentStage {
    /// Videos not finished yet
    Locked,
    /// Course has no assignment
    Unavailable,
    NotSubmitted,
    Submitted,
    UnderReview,
    Approved,
    /// Open for resubmission
    Rejected,
    /// Server reported a status this client does not know; treated as pending
    Unrecognized,
}

impl From<SubmissionStatus> for AssignmentStage {
    fn from(status: SubmissionStatus) -> Self {
        match status {
            SubmissionStatus::NotSubmitted => Self::NotSubmitted,
            SubmissionStatus::Submitted => Self::Submitted,
            SubmissionStatus::UnderReview => Self::UnderReview,
            SubmissionStatus::Approved => Self::Approved,
            SubmissionStatus::Rejected => Self::Rejected,
            SubmissionStatus::Unknown => Self::Unrecognized,
        }
    }
}

/// Exam sub-state
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum ExamStage {
    /// Assignment not approved yet
    Locked,
    /// Course has no exam
    Unavailable,
    /// Form may be shown
    Available,
    Passed { score: Option<f64> },
    /// Terminal; no retake
    Failed { score: Option<f64> },
}

/// Certificate sub-state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CertificateStage {
    Locked,
    /// Exam passed, waiting for the server to issue
    Pending,
    Issued,
}

/// What the exam view should show
#[derive(Debug, Clone, PartialEq)]
pub enum ExamView {
    /// Exam not reachable yet
    Locked { stage: Stage },
    /// Course has no exam
    Unavailable,
    /// Show the exam form
    Form(Exam),
    /// Read-only result of the single attempt
    Result { score: Option<f64>, passed: bool },
}

/// Server state the pipeline is derived from
#[derive(Debug, Clone, Copy)]
pub struct PipelineInputs<'a> {
    pub lectures: &'a [Lecture],
    pub progress: &'a ProgressMap,
    pub assignment: &'a AssignmentStatus,
    pub exam: &'a ExamStatus,
    pub certificate: Option<&'a Certificate>,
}

/// Derived position of the student in the course
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionPipeline {
    pub stage: Stage,
    pub videos_watched: usize,
    pub videos_total: usize,
    pub assignment: AssignmentStage,
    pub exam: ExamStage,
    pub certificate: CertificateStage,
}

impl CompletionPipeline {
    /// Derive the pipeline from fetched state
    pub fn derive(inputs: PipelineInputs<'_>) -> Self {
        let videos_total = inputs.lectures.len();
        let videos_watched = inputs
            .lectures
            .iter()
            .filter(|l| inputs.progress.get(&l.id).is_some_and(|r| r.watched))
            .count();
        // a course without lectures cannot be completed
        let videos_complete = videos_total > 0 && videos_watched == videos_total;

        let assignment = match (&inputs.assignment.assignment, videos_complete) {
            (_, false) => AssignmentStage::Locked,
            (None, true) => AssignmentStage::Unavailable,
            (Some(_), true) => inputs.assignment.status().into(),
        };

        let exam = match (&inputs.exam.exam, assignment) {
            (_, stage) if stage != AssignmentStage::Approved => ExamStage::Locked,
            (None, _) => ExamStage::Unavailable,
            (Some(_), _) => match &inputs.exam.submission {
                None => ExamStage::Available,
                Some(s) if s.passed => ExamStage::Passed { score: s.score },
                Some(s) => ExamStage::Failed { score: s.score },
            },
        };

        let certificate = match (inputs.certificate, exam) {
            (Some(_), _) => CertificateStage::Issued,
            (None, ExamStage::Passed { .. }) => CertificateStage::Pending,
            (None, _) => CertificateStage::Locked,
        };

        // an issued certificate is proof of completion on its own
        let stage = if certificate != CertificateStage::Locked {
            Stage::Certificate
        } else if !videos_complete {
            Stage::Videos
        } else if assignment != AssignmentStage::Approved {
            Stage::Assignment
        } else {
            Stage::Exam
        };

        Self { stage, videos_watched, videos_total, assignment, exam, certificate }
    }

    /// Certificate issued
    pub fn is_complete(&self) -> bool {
        self.certificate == CertificateStage::Issued
    }

    /// Check that an assignment (re)submission may be sent
    pub fn ensure_can_submit_assignment(&self) -> Result<(), ProgressionError> {
        match self.assignment {
            AssignmentStage::NotSubmitted | AssignmentStage::Rejected => Ok(()),
            AssignmentStage::Locked => {
                Err(ProgressionError::StageLocked { stage: Stage::Assignment })
            }
            AssignmentStage::Unavailable => Err(ProgressionError::NoAssignment),
            AssignmentStage::Submitted => {
                Err(ProgressionError::AssignmentPending { status: SubmissionStatus::Submitted })
            }
            AssignmentStage::UnderReview => {
                Err(ProgressionError::AssignmentPending { status: SubmissionStatus::UnderReview })
            }
            AssignmentStage::Unrecognized => {
                Err(ProgressionError::AssignmentPending { status: SubmissionStatus::Unknown })
            }
            AssignmentStage::Approved => Err(ProgressionError::AssignmentAlreadyApproved),
        }
    }

    /// Check that the exam may be attempted
    pub fn ensure_can_take_exam(&self) -> Result<(), ProgressionError> {
        match self.exam {
            ExamStage::Available => Ok(()),
            ExamStage::Locked => Err(ProgressionError::StageLocked { stage: Stage::Exam }),
            ExamStage::Unavailable => Err(ProgressionError::NoExam),
            ExamStage::Passed { score } => {
                Err(ProgressionError::ExamAlreadyTaken { score, passed: true })
            }
            ExamStage::Failed { score } => {
                Err(ProgressionError::ExamAlreadyTaken { score, passed: false })
            }
        }
    }

    /// Decide between the exam form and the read-only result.
    ///
    /// An existing attempt always wins, even if earlier stages look incomplete.
    pub fn exam_view(&self, exam: &ExamStatus) -> ExamView {
        if let Some(submission) = &exam.submission {
            return ExamView::Result { score: submission.score, passed: submission.passed };
        }
        match (self.exam, &exam.exam) {
            (ExamStage::Locked, _) => ExamView::Locked { stage: self.stage },
            (ExamStage::Available, Some(exam)) => ExamView::Form(exam.clone()),
            _ => ExamView::Unavailable,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::api::{Assignment, AssignmentSubmission, ExamSubmission, Id, ProgressRecord};

    struct Fixture {
        lectures: Vec<Lecture>,
        progress: ProgressMap,
        assignment: AssignmentStatus,
        exam: ExamStatus,
        certificate: Option<Certificate>,
    }

    impl Fixture {
        fn new(lecture_count: u32) -> Self {
            let lectures = (1..=lecture_count)
                .map(|order| Lecture {
                    id: 100 + order as Id,
                    course_id: 1,
                    title: format!("Part {}", order),
                    description: String::new(),
                    order,
                    video_reference: None,
                    duration_seconds: 60,
                })
                .collect();
            Self {
                lectures,
                progress: ProgressMap::new(),
                assignment: AssignmentStatus {
                    assignment: Some(Assignment {
                        id: 5,
                        course_id: 1,
                        title: "Essay".into(),
                        description: String::new(),
                        due_date: None,
                        max_score: 100,
                    }),
                    submission: None,
                },
                exam: ExamStatus {
                    exam: Some(Exam {
                        id: 9,
                        course_id: 1,
                        title: "Final".into(),
                        description: String::new(),
                        duration_minutes: 60,
                        passing_score: 70,
                        questions: vec![],
                    }),
                    submission: None,
                },
                certificate: None,
            }
        }

        fn watch_all(mut self) -> Self {
            for l in &self.lectures {
                let record = ProgressRecord {
                    lecture_id: l.id,
                    student_id: 4,
                    progress_percent: 100.0,
                    watched: true,
                };
                self.progress.insert(l.id, record);
            }
            self
        }

        fn assignment_status(mut self, status: SubmissionStatus) -> Self {
            self.assignment.submission = Some(AssignmentSubmission {
                id: 11,
                assignment_id: 5,
                student_id: 4,
                status,
                score: None,
                feedback: None,
                submission_text: None,
            });
            self
        }

        fn exam_taken(mut self, score: f64, passed: bool) -> Self {
            self.exam.submission = Some(ExamSubmission {
                id: 21,
                exam_id: 9,
                student_id: 4,
                score: Some(score),
                passed,
            });
            self
        }

        fn certificate(mut self) -> Self {
            self.certificate = Some(Certificate {
                id: 31,
                course_id: 1,
                student_id: 4,
                certificate_id: "APL0010004250101".into(),
                issued_at: Utc::now(),
                download_url: None,
            });
            self
        }

        fn derive(&self) -> CompletionPipeline {
            CompletionPipeline::derive(PipelineInputs {
                lectures: &self.lectures,
                progress: &self.progress,
                assignment: &self.assignment,
                exam: &self.exam,
                certificate: self.certificate.as_ref(),
            })
        }
    }

    #[test]
    fn unwatched_videos_lock_everything_after() {
        let pipeline = Fixture::new(3).derive();
        assert_eq!(pipeline.stage, Stage::Videos);
        assert_eq!(pipeline.assignment, AssignmentStage::Locked);
        assert_eq!(pipeline.exam, ExamStage::Locked);
        assert_eq!(pipeline.certificate, CertificateStage::Locked);
    }

    #[test]
    fn every_lecture_must_be_watched() {
        let mut fixture = Fixture::new(3).watch_all();
        fixture.progress.remove(&102);
        let pipeline = fixture.derive();
        assert_eq!(pipeline.stage, Stage::Videos);
        assert_eq!(pipeline.videos_watched, 2);
    }

    #[test]
    fn all_watched_without_submission_is_assignment_not_submitted() {
        let pipeline = Fixture::new(3).watch_all().derive();
        assert_eq!(pipeline.stage, Stage::Assignment);
        assert_eq!(pipeline.assignment, AssignmentStage::NotSubmitted);
        assert!(pipeline.ensure_can_submit_assignment().is_ok());
    }

    #[test]
    fn approved_assignment_without_exam_attempt_shows_form() {
        let fixture = Fixture::new(3).watch_all().assignment_status(SubmissionStatus::Approved);
        let pipeline = fixture.derive();
        assert_eq!(pipeline.stage, Stage::Exam);
        assert_eq!(pipeline.exam, ExamStage::Available);
        assert!(matches!(
            pipeline.exam_view(&fixture.exam),
            ExamView::Form(ref exam) if exam.id == 9
        ));
    }

    #[test]
    fn passed_exam_without_certificate_is_pending() {
        let pipeline = Fixture::new(3)
            .watch_all()
            .assignment_status(SubmissionStatus::Approved)
            .exam_taken(85.0, true)
            .derive();
        assert_eq!(pipeline.stage, Stage::Certificate);
        assert_eq!(pipeline.certificate, CertificateStage::Pending);
        assert!(!pipeline.is_complete());
    }

    #[test]
    fn existing_attempt_replaces_form_with_result() {
        let fixture = Fixture::new(3)
            .watch_all()
            .assignment_status(SubmissionStatus::Approved)
            .exam_taken(40.0, false);
        let pipeline = fixture.derive();

        assert_eq!(pipeline.exam, ExamStage::Failed { score: Some(40.0) });
        assert_eq!(
            pipeline.exam_view(&fixture.exam),
            ExamView::Result { score: Some(40.0), passed: false }
        );
        assert!(matches!(
            pipeline.ensure_can_take_exam(),
            Err(ProgressionError::ExamAlreadyTaken { passed: false, .. })
        ));
    }

    #[test]
    fn attempt_shown_even_when_assignment_state_is_behind() {
        let fixture = Fixture::new(2).watch_all().exam_taken(90.0, true);
        let pipeline = fixture.derive();
        assert_eq!(pipeline.exam, ExamStage::Locked);
        assert_eq!(
            pipeline.exam_view(&fixture.exam),
            ExamView::Result { score: Some(90.0), passed: true }
        );
    }

    #[test]
    fn rejected_assignment_allows_resubmission() {
        let pipeline =
            Fixture::new(1).watch_all().assignment_status(SubmissionStatus::Rejected).derive();
        assert_eq!(pipeline.assignment, AssignmentStage::Rejected);
        assert!(pipeline.ensure_can_submit_assignment().is_ok());
    }

    #[test]
    fn pending_or_approved_assignment_blocks_resubmission() {
        for (status, pending) in [
            (SubmissionStatus::Submitted, true),
            (SubmissionStatus::UnderReview, true),
            (SubmissionStatus::Unknown, true),
            (SubmissionStatus::Approved, false),
        ] {
            let pipeline = Fixture::new(1).watch_all().assignment_status(status).derive();
            let err = pipeline.ensure_can_submit_assignment().unwrap_err();
            assert_eq!(matches!(err, ProgressionError::AssignmentPending { .. }), pending);
            assert!(err.is_gating_violation());
        }
    }

    #[test]
    fn missing_assignment_or_exam_fails_closed() {
        let mut fixture = Fixture::new(1).watch_all();
        fixture.assignment.assignment = None;
        let pipeline = fixture.derive();
        assert_eq!(pipeline.assignment, AssignmentStage::Unavailable);
        assert_eq!(pipeline.exam, ExamStage::Locked);
        assert!(matches!(
            pipeline.ensure_can_submit_assignment(),
            Err(ProgressionError::NoAssignment)
        ));

        let mut fixture = Fixture::new(1).watch_all().assignment_status(SubmissionStatus::Approved);
        fixture.exam.exam = None;
        let pipeline = fixture.derive();
        assert_eq!(pipeline.exam, ExamStage::Unavailable);
        assert_eq!(pipeline.exam_view(&fixture.exam), ExamView::Unavailable);
    }

    #[test]
    fn empty_course_is_not_complete() {
        let pipeline = Fixture::new(0).derive();
        assert_eq!(pipeline.stage, Stage::Videos);
    }

    #[test]
    fn issued_certificate_completes_course() {
        let pipeline = Fixture::new(2)
            .watch_all()
            .assignment_status(SubmissionStatus::Approved)
            .exam_taken(88.0, true)
            .certificate()
            .derive();
        assert_eq!(pipeline.stage, Stage::Certificate);
        assert!(pipeline.is_complete());
    }

    #[test]
    fn stage_display_names() {
        assert_eq!(Stage::Assignment.to_string(), "Assignment");
        assert_eq!(
            ProgressionError::StageLocked { stage: Stage::Exam }.to_string(),
            "Exam is locked until the previous step is complete"
        );
    }
}
