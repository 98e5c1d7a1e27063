//! One archive's worth of files driven through a parser
//!
//! A task owns its source and its parser outright; tasks run in parallel,
//! but a single task is always processed by one thread.

use crate::metrics::{Outcome, TestKind};
use crate::parsers::NdtParser;
use crate::source::{FileSource, SourceError};

/// What happened to the files of one task
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TaskSummary {
    /// Files handed to the parser
    pub files: usize,
    /// Files the parser rejected, including data files that failed when
    /// their test was completed later
    pub failed: usize,
}

pub struct Task<S: FileSource> {
    name: String,
    source: S,
    parser: NdtParser,
}

impl<S: FileSource> Task<S> {
    pub fn new(name: impl Into<String>, source: S, parser: NdtParser) -> Self {
        Self {
            name: name.into(),
            source,
            parser,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parser(&self) -> &NdtParser {
        &self.parser
    }

    /// Feed every file to the parser, then flush.
    ///
    /// A read error ends the task early: the files already buffered are
    /// still finished and flushed before the error is returned.
    pub fn process_all_tests(&mut self) -> Result<TaskSummary, SourceError> {
        let mut summary = TaskSummary::default();

        let read_result = loop {
            match self.source.next_file() {
                Ok(Some(file)) => {
                    summary.files += 1;
                    if let Err(e) = self.parser.parse_and_insert(&file.name, file.data) {
                        summary.failed += 1;
                        tracing::warn!("{}: {}: {}", self.name, file.name, e);
                    }
                    summary.failed += self.parser.take_unreported_failures();
                }
                Ok(None) => break Ok(()),
                Err(e) => {
                    self.parser.counters().inc(TestKind::Unknown, Outcome::ReadError);
                    tracing::warn!("{}: aborting task: {}", self.name, e);
                    break Err(e);
                }
            }
        };

        if let Err(e) = self.parser.finish() {
            summary.failed += 1;
            tracing::warn!("{}: {}", self.name, e);
        }
        summary.failed += self.parser.take_unreported_failures();
        if let Err(e) = self.parser.flush() {
            tracing::warn!("{}: flush failed: {}", self.name, e);
        }

        tracing::info!(
            "{}: {} files, {} failed",
            self.name,
            summary.files,
            summary.failed
        );
        read_result.map(|()| summary)
    }
}
