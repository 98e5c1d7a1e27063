//! Test counters shared by every task in the process
//!
//! One relaxed `AtomicU64` per (kind, outcome) pair. Tasks on different
//! worker threads increment the same `Arc<Counters>` without locking.

use std::sync::atomic::{AtomicU64, Ordering};
use strum::{AsRefStr, EnumCount, EnumIter, IntoEnumIterator};

/// What kind of file or test a count refers to
#[derive(AsRefStr, Clone, Copy, Debug, EnumCount, EnumIter, PartialEq, Eq, Hash)]
#[strum(serialize_all = "snake_case")]
pub enum TestKind {
    C2s,
    S2c,
    Meta,
    Test,
    Unknown,
}

/// How handling that file or test ended
#[derive(AsRefStr, Clone, Copy, Debug, EnumCount, EnumIter, PartialEq, Eq, Hash)]
#[strum(serialize_all = "snake_case")]
pub enum Outcome {
    Ok,
    BadFilename,
    TimestampCollision,
    NoMeta,
    #[strum(serialize = "no_meta_c2s_s2c")]
    NoMetaNoTests,
    #[strum(serialize = "no_tests")]
    MetaNoTests,
    #[strum(serialize = ">10MB")]
    Oversize,
    #[strum(serialize = "<16KB")]
    Undersize,
    #[strum(serialize = "4KB")]
    FourKb,
    SnaplogError,
    ValidationWarning,
    ValuesError,
    InsertError,
    UnknownSuffix,
    ReadError,
}

/// Lock-free counter table
#[derive(Debug)]
pub struct Counters {
    table: String,
    counts: [AtomicU64; TestKind::COUNT * Outcome::COUNT],
}

impl Counters {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            counts: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    /// Table label the counts are reported under
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn inc(&self, kind: TestKind, outcome: Outcome) {
        self.counts[Self::slot(kind, outcome)].fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, kind: TestKind, outcome: Outcome) -> u64 {
        self.counts[Self::slot(kind, outcome)].load(Ordering::Relaxed)
    }

    /// Sum of `outcome` across every kind
    pub fn total(&self, outcome: Outcome) -> u64 {
        TestKind::iter().map(|kind| self.get(kind, outcome)).sum()
    }

    /// Non-zero counters as (`kind`, `outcome`, count)
    pub fn summary(&self) -> Vec<(TestKind, Outcome, u64)> {
        TestKind::iter()
            .flat_map(|kind| Outcome::iter().map(move |outcome| (kind, outcome)))
            .filter_map(|(kind, outcome)| {
                let count = self.get(kind, outcome);
                (count > 0).then_some((kind, outcome, count))
            })
            .collect()
    }

    fn slot(kind: TestKind, outcome: Outcome) -> usize {
        kind as usize * Outcome::COUNT + outcome as usize
    }
}

impl Default for Counters {
    fn default() -> Self {
        Self::new("ndt")
    }
}
