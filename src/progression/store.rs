//! Per-lecture progress cache for the signed-in student
//!
//! Holds the server's progress records as of the last fetch, merged with any
//! optimistic local writes. `watched` never goes back to false and the local
//! percentage only ever grows.

use std::collections::HashMap;

use super::error::ProgressionError;
use super::sync::SyncLayer;
use super::unlock::ProgressMap;
use crate::api::{Id, Lecture, ProgressRecord};

/// Decides which playback reports are worth sending to the server
#[derive(Debug, Clone, Default)]
pub struct ProgressThrottle {
    step_percent: f64,
    /// Last pushed (step bucket, watched) per lecture
    pushed: HashMap<Id, (u32, bool)>,
}

impl ProgressThrottle {
    /// Throttle that sends one report per `step_percent` of progress
    pub fn new(step_percent: f64) -> Self {
        Self { step_percent, pushed: HashMap::new() }
    }

    fn bucket(&self, percent: f64) -> u32 {
        if self.step_percent > 0.0 {
            (percent / self.step_percent).floor() as u32
        } else {
            // no throttling: every distinct hundredth of a percent is its own step
            (percent * 100.0).round() as u32
        }
    }

    /// Whether `record` crosses a new step or newly completes the lecture
    pub fn should_push(&self, record: &ProgressRecord) -> bool {
        match self.pushed.get(&record.lecture_id) {
            None => true,
            Some(&(bucket, watched)) => {
                (record.watched && !watched) || self.bucket(record.progress_percent) > bucket
            }
        }
    }

    /// Remember that `record` reached the server
    pub fn mark_pushed(&mut self, record: &ProgressRecord) {
        let bucket = self.bucket(record.progress_percent);
        self.pushed.insert(record.lecture_id, (bucket, record.watched));
    }
}

/// Cached progress for one student in one course
#[derive(Debug, Clone)]
pub struct ProgressStore {
    course_id: Id,
    student_id: Id,
    watched_threshold_percent: f64,
    records: ProgressMap,
    throttle: ProgressThrottle,
}

impl ProgressStore {
    /// Create an empty store
    pub fn new(
        course_id: Id,
        student_id: Id,
        watched_threshold_percent: f64,
        push_step_percent: f64,
    ) -> Self {
        Self {
            course_id,
            student_id,
            watched_threshold_percent,
            records: HashMap::new(),
            throttle: ProgressThrottle::new(push_step_percent),
        }
    }

    /// Course this store is scoped to
    pub fn course_id(&self) -> Id {
        self.course_id
    }

    /// Fetch the student's records for `lectures` and merge them in
    pub async fn load(
        &mut self,
        sync: &SyncLayer,
        lectures: &[Lecture],
    ) -> Result<(), ProgressionError> {
        let records = sync.fetch_progress(lectures).await?;
        self.merge(records);
        Ok(())
    }

    /// Merge server records into the cache.
    ///
    /// Records of other students are dropped even though the sync layer already
    /// filtered them. Server records already count as pushed.
    pub fn merge(&mut self, records: impl IntoIterator<Item = ProgressRecord>) {
        for record in records {
            if record.student_id != self.student_id {
                tracing::warn!(
                    "Dropping progress record for lecture {} owned by another student",
                    record.lecture_id
                );
                continue;
            }
            self.throttle.mark_pushed(&record);
            self.apply(record);
        }
    }

    fn apply(&mut self, incoming: ProgressRecord) -> ProgressRecord {
        let merged = match self.records.get(&incoming.lecture_id) {
            Some(existing) => ProgressRecord {
                progress_percent: existing.progress_percent.max(incoming.progress_percent),
                watched: existing.watched || incoming.watched,
                ..incoming
            },
            None => incoming,
        };
        self.records.insert(merged.lecture_id, merged.clone());
        merged
    }

    /// Optimistically write a playback report and return the resulting record
    pub fn record_local(&mut self, lecture_id: Id, percent: f64, watched: bool) -> ProgressRecord {
        let percent = if percent.is_nan() { 0.0 } else { percent.clamp(0.0, 100.0) };
        let watched = watched || percent > self.watched_threshold_percent;

        self.apply(ProgressRecord {
            lecture_id,
            student_id: self.student_id,
            progress_percent: percent,
            watched,
        })
    }

    /// Write locally, then push to the server when the throttle allows.
    ///
    /// A failed push keeps the local write and returns
    /// [`ProgressionError::ProgressNotSynced`]; there is no automatic retry,
    /// but the next report for the lecture is pushed again.
    pub async fn record_progress(
        &mut self,
        sync: &SyncLayer,
        lecture_id: Id,
        percent: f64,
        watched: bool,
    ) -> Result<ProgressRecord, ProgressionError> {
        let record = self.record_local(lecture_id, percent, watched);

        if !self.throttle.should_push(&record) {
            tracing::debug!(
                "Coalescing progress {:.0}% for lecture {}",
                record.progress_percent,
                lecture_id
            );
            return Ok(record);
        }

        match sync.push_progress(lecture_id, record.progress_percent, record.watched).await {
            Ok(()) => {
                self.throttle.mark_pushed(&record);
                Ok(record)
            }
            Err(source) => {
                tracing::warn!(
                    "Progress for lecture {} kept locally, sync failed: {}",
                    lecture_id,
                    source
                );
                Err(ProgressionError::ProgressNotSynced { record, source })
            }
        }
    }

    /// Record for a lecture, if any
    pub fn get(&self, lecture_id: Id) -> Option<&ProgressRecord> {
        self.records.get(&lecture_id)
    }

    /// Whether a lecture is watched
    pub fn is_watched(&self, lecture_id: Id) -> bool {
        self.records.get(&lecture_id).is_some_and(|r| r.watched)
    }

    /// All records keyed by lecture id
    pub fn records(&self) -> &ProgressMap {
        &self.records
    }

    /// Number of `lectures` marked watched
    pub fn watched_count(&self, lectures: &[Lecture]) -> usize {
        lectures.iter().filter(|l| self.is_watched(l.id)).count()
    }
}
