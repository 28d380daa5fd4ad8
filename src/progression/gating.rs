//! Navigation between lectures
//!
//! The gating controller owns the "current lecture" and only moves it when
//! the unlock rules allow. A refused move is returned as a value, not raised
//! as an error.

use serde::Serialize;

use super::unlock::{self, LectureState, ProgressMap};
use crate::api::{Id, Lecture};

/// Why a navigation request was refused
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum GateReason {
    /// Previous lecture not watched yet
    PreviousIncomplete { blocking_lecture_id: Option<Id> },
    /// No lecture at the requested position
    OutOfRange,
}

/// A refused navigation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateViolation {
    pub target_index: usize,
    pub reason: GateReason,
}

impl GateViolation {
    /// Message for the student
    pub fn message(&self) -> &'static str {
        match self.reason {
            GateReason::PreviousIncomplete { .. } => "Complete the previous lecture first",
            GateReason::OutOfRange => "There is no lecture there",
        }
    }
}

/// Result of a navigation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Navigation {
    /// Current lecture changed
    Moved { index: usize },
    /// Already there, or at the start of the course
    Stayed { index: usize },
    Rejected(GateViolation),
}

/// Tracks and guards the current lecture
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatingController {
    current_index: usize,
}

impl GatingController {
    /// Start at the first accessible lecture that is not completed yet
    pub fn resume(lectures: &[Lecture], progress: &ProgressMap) -> Self {
        let current_index = lectures
            .iter()
            .position(|l| {
                unlock::is_accessible(l, lectures, progress)
                    && unlock::lecture_state(l, lectures, progress) != LectureState::Completed
            })
            .unwrap_or(0);
        Self { current_index }
    }

    /// Index of the current lecture
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// The current lecture, if the course has any
    pub fn current<'a>(&self, lectures: &'a [Lecture]) -> Option<&'a Lecture> {
        lectures.get(self.current_index)
    }

    /// Switch to `target_index` if that lecture is accessible
    pub fn select_lecture(
        &mut self,
        target_index: usize,
        lectures: &[Lecture],
        progress: &ProgressMap,
    ) -> Navigation {
        let Some(target) = lectures.get(target_index) else {
            return Navigation::Rejected(GateViolation {
                target_index,
                reason: GateReason::OutOfRange,
            });
        };

        if !unlock::is_accessible(target, lectures, progress) {
            let blocking_lecture_id = unlock::blocking_lecture(target, lectures, progress);
            tracing::debug!("Refused lecture {} (blocked by {:?})", target.id, blocking_lecture_id);
            return Navigation::Rejected(GateViolation {
                target_index,
                reason: GateReason::PreviousIncomplete { blocking_lecture_id },
            });
        }

        if target_index == self.current_index {
            return Navigation::Stayed { index: target_index };
        }
        self.current_index = target_index;
        Navigation::Moved { index: target_index }
    }

    /// Advance to the next lecture, subject to the same check as [`Self::select_lecture`]
    pub fn next(&mut self, lectures: &[Lecture], progress: &ProgressMap) -> Navigation {
        self.select_lecture(self.current_index + 1, lectures, progress)
    }

    /// Go back one lecture; reviewing earlier content is never gated
    pub fn previous(&mut self) -> Navigation {
        match self.current_index.checked_sub(1) {
            Some(index) => {
                self.current_index = index;
                Navigation::Moved { index }
            }
            None => Navigation::Stayed { index: 0 },
        }
    }

    /// State of every lecture, in order
    pub fn lecture_states(
        &self,
        lectures: &[Lecture],
        progress: &ProgressMap,
    ) -> Vec<LectureState> {
        lectures.iter().map(|l| unlock::lecture_state(l, lectures, progress)).collect()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::api::ProgressRecord;

    fn course(count: u32) -> Vec<Lecture> {
        (1..=count)
            .map(|order| Lecture {
                id: 100 + order as Id,
                course_id: 1,
                title: format!("Part {}", order),
                description: String::new(),
                order,
                video_reference: None,
                duration_seconds: 60,
            })
            .collect()
    }

    fn watched(ids: &[Id]) -> ProgressMap {
        ids.iter()
            .map(|&id| {
                let record = ProgressRecord {
                    lecture_id: id,
                    student_id: 4,
                    progress_percent: 100.0,
                    watched: true,
                };
                (id, record)
            })
            .collect()
    }

    #[test]
    fn locked_lecture_is_rejected_without_moving() {
        let lectures = course(3);
        let mut gating = GatingController::default();

        let nav = gating.select_lecture(2, &lectures, &ProgressMap::new());
        assert_eq!(
            nav,
            Navigation::Rejected(GateViolation {
                target_index: 2,
                reason: GateReason::PreviousIncomplete { blocking_lecture_id: Some(102) },
            })
        );
        assert_eq!(gating.current_index(), 0);
    }

    #[test]
    fn next_follows_unlock_rule() {
        let lectures = course(3);
        let mut gating = GatingController::default();

        assert!(matches!(gating.next(&lectures, &ProgressMap::new()), Navigation::Rejected(_)));
        assert_eq!(gating.next(&lectures, &watched(&[101])), Navigation::Moved { index: 1 });
        assert_eq!(gating.current(&lectures).map(|l| l.id), Some(102));
    }

    #[test]
    fn next_past_the_end_is_out_of_range() {
        let lectures = course(1);
        let mut gating = GatingController::default();
        let nav = gating.next(&lectures, &watched(&[101]));
        assert!(matches!(
            nav,
            Navigation::Rejected(GateViolation { reason: GateReason::OutOfRange, .. })
        ));
    }

    #[test]
    fn previous_is_never_gated() {
        let lectures = course(3);
        let progress = watched(&[101, 102]);
        let mut gating = GatingController::default();
        gating.select_lecture(2, &lectures, &progress);

        assert_eq!(gating.previous(), Navigation::Moved { index: 1 });
        assert_eq!(gating.previous(), Navigation::Moved { index: 0 });
        assert_eq!(gating.previous(), Navigation::Stayed { index: 0 });
    }

    #[test]
    fn resume_starts_at_first_unfinished_lecture() {
        let lectures = course(3);
        assert_eq!(GatingController::resume(&lectures, &watched(&[101])).current_index(), 1);
        let all_watched = watched(&[101, 102, 103]);
        assert_eq!(GatingController::resume(&lectures, &all_watched).current_index(), 0);
    }

    #[test]
    fn reselecting_current_lecture_stays() {
        let lectures = course(2);
        let mut gating = GatingController::default();
        assert_eq!(
            gating.select_lecture(0, &lectures, &ProgressMap::new()),
            Navigation::Stayed { index: 0 }
        );
    }

    #[test]
    fn violation_message_points_to_previous_lecture() {
        let violation = GateViolation {
            target_index: 1,
            reason: GateReason::PreviousIncomplete { blocking_lecture_id: Some(101) },
        };
        assert_eq!(violation.message(), "Complete the previous lecture first");
    }
}
