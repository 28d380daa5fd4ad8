//! Lecture accessibility
//!
//! Pure functions over the ordered lecture list and the progress map. Lecture
//! `k` opens once lecture `k - 1` is watched; anything missing or ambiguous
//! keeps a lecture closed.

use std::collections::HashMap;

use serde::Serialize;

use crate::api::{Id, Lecture, ProgressRecord};

/// Progress map keyed by lecture id
pub type ProgressMap = HashMap<Id, ProgressRecord>;

/// Per-lecture position in `Locked -> Unlocked -> InProgress -> Completed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum LectureState {
    Locked,
    Unlocked,
    InProgress,
    Completed,
}

impl LectureState {
    /// Short label for listings
    pub fn label(&self) -> &'static str {
        match self {
            Self::Locked => "locked",
            Self::Unlocked => "unlocked",
            Self::InProgress => "in progress",
            Self::Completed => "completed",
        }
    }
}

fn is_watched(lecture_id: Id, progress: &ProgressMap) -> bool {
    progress.get(&lecture_id).is_some_and(|record| record.watched)
}

/// Lowest order in the course; the head of the unlock chain
fn first_order(ordered_lectures: &[Lecture]) -> Option<u32> {
    ordered_lectures.iter().map(|l| l.order).min()
}

/// Lectures the given one waits on (normally exactly one)
pub fn predecessors<'a>(
    lecture: &Lecture,
    ordered_lectures: &'a [Lecture],
) -> impl Iterator<Item = &'a Lecture> {
    let wanted = lecture.order.checked_sub(1);
    ordered_lectures.iter().filter(move |l| Some(l.order) == wanted)
}

/// Whether `lecture` may be opened.
///
/// The first lecture of the course is always accessible. Any other lecture is
/// accessible only if a lecture with the preceding order exists and every
/// such lecture is watched.
pub fn is_accessible(
    lecture: &Lecture,
    ordered_lectures: &[Lecture],
    progress: &ProgressMap,
) -> bool {
    let Some(first) = first_order(ordered_lectures) else {
        return false;
    };
    if lecture.order == first {
        return true;
    }

    let mut found = false;
    for previous in predecessors(lecture, ordered_lectures) {
        if !is_watched(previous.id, progress) {
            return false;
        }
        found = true;
    }
    found
}

/// The unwatched lecture standing between `lecture` and accessibility
pub fn blocking_lecture(
    lecture: &Lecture,
    ordered_lectures: &[Lecture],
    progress: &ProgressMap,
) -> Option<Id> {
    predecessors(lecture, ordered_lectures)
        .find(|previous| !is_watched(previous.id, progress))
        .map(|previous| previous.id)
}

/// Current state of a lecture in its lifecycle
pub fn lecture_state(
    lecture: &Lecture,
    ordered_lectures: &[Lecture],
    progress: &ProgressMap,
) -> LectureState {
    match progress.get(&lecture.id) {
        Some(record) if record.watched => LectureState::Completed,
        _ if !is_accessible(lecture, ordered_lectures, progress) => LectureState::Locked,
        Some(_) => LectureState::InProgress,
        None => LectureState::Unlocked,
    }
}

/// Highest lecture order currently accessible
pub fn unlocked_up_to(ordered_lectures: &[Lecture], progress: &ProgressMap) -> Option<u32> {
    ordered_lectures
        .iter()
        .filter(|l| is_accessible(l, ordered_lectures, progress))
        .map(|l| l.order)
        .max()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn lecture(id: Id, order: u32) -> Lecture {
        Lecture {
            id,
            course_id: 1,
            title: format!("Lecture {}", order),
            description: String::new(),
            order,
            video_reference: None,
            duration_seconds: 600,
        }
    }

    fn course(count: u32) -> Vec<Lecture> {
        (1..=count).map(|order| lecture(100 + order as Id, order)).collect()
    }

    fn watched(lecture_id: Id) -> (Id, ProgressRecord) {
        (
            lecture_id,
            ProgressRecord { lecture_id, student_id: 4, progress_percent: 100.0, watched: true },
        )
    }

    fn partial(lecture_id: Id, percent: f64) -> ProgressRecord {
        ProgressRecord { lecture_id, student_id: 4, progress_percent: percent, watched: false }
    }

    fn accessibility(lectures: &[Lecture], progress: &ProgressMap) -> Vec<bool> {
        lectures.iter().map(|l| is_accessible(l, lectures, progress)).collect()
    }

    #[test]
    fn no_progress_opens_only_first_lecture() {
        let lectures = course(3);
        assert_eq!(accessibility(&lectures, &ProgressMap::new()), vec![true, false, false]);
    }

    #[test]
    fn watching_first_lecture_opens_second() {
        let lectures = course(3);
        let progress = ProgressMap::from([watched(101)]);
        assert_eq!(accessibility(&lectures, &progress), vec![true, true, false]);
    }

    #[test]
    fn partial_progress_does_not_unlock() {
        let lectures = course(2);
        let progress = ProgressMap::from([(101, partial(101, 80.0))]);
        assert!(!is_accessible(&lectures[1], &lectures, &progress));
        assert_eq!(lecture_state(&lectures[0], &lectures, &progress), LectureState::InProgress);
    }

    #[test]
    fn gap_in_order_fails_closed() {
        let lectures = vec![lecture(1, 1), lecture(3, 3)];
        let progress = ProgressMap::from([watched(1)]);
        assert!(!is_accessible(&lectures[1], &lectures, &progress));
        assert_eq!(blocking_lecture(&lectures[1], &lectures, &progress), None);
    }

    #[test]
    fn first_lecture_is_minimum_order() {
        let lectures = vec![lecture(10, 0), lecture(11, 1)];
        assert_eq!(accessibility(&lectures, &ProgressMap::new()), vec![true, false]);
    }

    #[test]
    fn empty_course_has_nothing_accessible() {
        assert!(!is_accessible(&lecture(1, 1), &[], &ProgressMap::new()));
    }

    #[test]
    fn blocking_lecture_names_unwatched_predecessor() {
        let lectures = course(3);
        let progress = ProgressMap::from([watched(101)]);
        assert_eq!(blocking_lecture(&lectures[2], &lectures, &progress), Some(102));
    }

    #[test]
    fn lecture_states_follow_lifecycle() {
        let lectures = course(4);
        let progress = ProgressMap::from([
            watched(101),
            (102, partial(102, 30.0)),
        ]);
        let states: Vec<_> =
            lectures.iter().map(|l| lecture_state(l, &lectures, &progress)).collect();
        assert_eq!(
            states,
            vec![
                LectureState::Completed,
                LectureState::InProgress,
                LectureState::Locked,
                LectureState::Locked
            ]
        );
        assert_eq!(unlocked_up_to(&lectures, &progress), Some(2));
    }

    proptest! {
        #[test]
        fn first_lecture_always_accessible(
            count in 1u32..8,
            watched_mask in proptest::collection::vec(any::<bool>(), 8),
        ) {
            let lectures = course(count);
            let progress: ProgressMap = lectures
                .iter()
                .zip(&watched_mask)
                .filter(|(_, w)| **w)
                .map(|(l, _)| watched(l.id))
                .collect();
            prop_assert!(is_accessible(&lectures[0], &lectures, &progress));
        }

        #[test]
        fn accessible_iff_predecessor_watched(
            count in 2u32..8,
            watched_mask in proptest::collection::vec(any::<bool>(), 8),
        ) {
            let lectures = course(count);
            let progress: ProgressMap = lectures
                .iter()
                .zip(&watched_mask)
                .filter(|(_, w)| **w)
                .map(|(l, _)| watched(l.id))
                .collect();
            for pair in lectures.windows(2) {
                let expected = progress.get(&pair[0].id).is_some_and(|r| r.watched);
                prop_assert_eq!(is_accessible(&pair[1], &lectures, &progress), expected);
            }
        }

        #[test]
        fn watching_more_never_locks_anything(
            count in 1u32..8,
            order in proptest::collection::vec(0usize..8, 0..16),
        ) {
            let lectures = course(count);
            let mut progress = ProgressMap::new();
            let mut before = accessibility(&lectures, &progress);
            for index in order {
                let Some(l) = lectures.get(index) else { continue };
                let (id, record) = watched(l.id);
                progress.insert(id, record);
                let after = accessibility(&lectures, &progress);
                for (was, now) in before.iter().zip(&after) {
                    prop_assert!(!was || *now);
                }
                before = after;
            }
        }
    }
}
