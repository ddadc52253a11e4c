//! Sequential drip-feed access policy.
//!
//! A unit opens once its predecessor is completed and at least one calendar
//! day (in the learner's offset) has passed since that completion. Completed
//! units always stay open for revisiting.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Lesson, LessonId, ProgressRecord};
use crate::time::calendar_day;

//
// ─── STATUS ───────────────────────────────────────────────────────────────────
//

/// Access state of a unit from the learner's viewpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnlockStatus {
    Available,
    /// Previous unit not completed yet.
    Locked,
    /// Previous unit completed today; opens tomorrow.
    DailyLocked,
}

impl UnlockStatus {
    #[must_use]
    pub fn is_available(self) -> bool {
        matches!(self, UnlockStatus::Available)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            UnlockStatus::Available => "available",
            UnlockStatus::Locked => "locked",
            UnlockStatus::DailyLocked => "daily_locked",
        }
    }
}

//
// ─── UNITS ────────────────────────────────────────────────────────────────────
//

/// Anything that sits in an ordered sequence gated by completion.
pub trait SequencedUnit {
    type Id: Copy + Eq + Hash;

    fn unit_id(&self) -> Self::Id;
}

impl SequencedUnit for Lesson {
    type Id = LessonId;

    fn unit_id(&self) -> LessonId {
        self.id()
    }
}

//
// ─── LEDGER ───────────────────────────────────────────────────────────────────
//

/// Completed set plus completion timestamps for one learner.
#[derive(Debug, Clone)]
pub struct CompletionLedger<Id> {
    completed: HashSet<Id>,
    completed_at: HashMap<Id, DateTime<Utc>>,
}

impl<Id> Default for CompletionLedger<Id> {
    fn default() -> Self {
        Self {
            completed: HashSet::new(),
            completed_at: HashMap::new(),
        }
    }
}

impl<Id: Copy + Eq + Hash> CompletionLedger<Id> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a completion. A missing timestamp keeps the unit completed
    /// without a day to compare against.
    pub fn record(&mut self, id: Id, at: Option<DateTime<Utc>>) {
        self.completed.insert(id);
        if let Some(at) = at {
            self.completed_at.entry(id).or_insert(at);
        }
    }

    #[must_use]
    pub fn is_completed(&self, id: Id) -> bool {
        self.completed.contains(&id)
    }

    #[must_use]
    pub fn completed_at(&self, id: Id) -> Option<DateTime<Utc>> {
        self.completed_at.get(&id).copied()
    }

    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }
}

impl CompletionLedger<LessonId> {
    /// Builds a ledger from stored progress, ignoring unfinished lessons.
    #[must_use]
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a ProgressRecord>) -> Self {
        let mut ledger = Self::new();
        for record in records.into_iter().filter(|r| r.completed()) {
            ledger.record(record.lesson_id(), record.completed_at());
        }
        ledger
    }
}

//
// ─── POLICY ───────────────────────────────────────────────────────────────────
//

/// Evaluates access for a unit sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LessonUnlockPolicy {
    offset: FixedOffset,
}

impl Default for LessonUnlockPolicy {
    fn default() -> Self {
        Self::utc()
    }
}

impl LessonUnlockPolicy {
    /// Policy that compares calendar days at the given UTC offset.
    #[must_use]
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    #[must_use]
    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    #[must_use]
    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Access state of `units[index]` at `now`.
    ///
    /// Out-of-range indices are `Locked`. A completed predecessor with no
    /// timestamp fails open to `Available`.
    #[must_use]
    pub fn status<U: SequencedUnit>(
        &self,
        units: &[U],
        ledger: &CompletionLedger<U::Id>,
        index: usize,
        now: DateTime<Utc>,
    ) -> UnlockStatus {
        let Some(unit) = units.get(index) else {
            return UnlockStatus::Locked;
        };
        if index == 0 || ledger.is_completed(unit.unit_id()) {
            return UnlockStatus::Available;
        }

        let previous = units[index - 1].unit_id();
        if !ledger.is_completed(previous) {
            return UnlockStatus::Locked;
        }

        match ledger.completed_at(previous) {
            Some(at) if calendar_day(at, self.offset) >= calendar_day(now, self.offset) => {
                UnlockStatus::DailyLocked
            }
            Some(_) | None => UnlockStatus::Available,
        }
    }

    /// Access state for every unit, in order.
    #[must_use]
    pub fn statuses<U: SequencedUnit>(
        &self,
        units: &[U],
        ledger: &CompletionLedger<U::Id>,
        now: DateTime<Utc>,
    ) -> Vec<UnlockStatus> {
        (0..units.len())
            .map(|index| self.status(units, ledger, index, now))
            .collect()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
