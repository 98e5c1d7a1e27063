//! NDT test correlator
//!
//! An archive holds the files of many tests in lexical order, so all files
//! of one test (same filename timestamp) arrive together, but in no fixed
//! order: `c2s_snaplog`, `meta` and `s2c_snaplog`, each possibly also as a
//! `.gz` copy. The parser buffers the files of the current test and emits
//! one row per snapshot log once a meta record (real or placeholder) is
//! available. When the timestamp changes, whatever the previous test left
//! behind is flushed through anomaly handling.

use chrono::{SecondsFormat, Utc};
use std::sync::Arc;

use super::error::{DecodeError, ParseError};
use super::filename::{logical_name, TestInfo};
use super::meta::MetaRecord;
use super::schema::VariableSchema;
use super::snaplog::SnapshotLog;
use super::types::{FieldValue, OutputRow, ValueMap, ValueSink};
use crate::metrics::{Counters, Outcome, TestKind};
use crate::sink::RowSink;

/// `connection_spec.data_direction` values
pub const CLIENT_TO_SERVER: i64 = 0;
pub const SERVER_TO_CLIENT: i64 = 1;

pub const DEFAULT_MAX_SNAPSHOTS: usize = 2800;
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_SMALL_PAYLOAD_BYTES: usize = 16 * 1024;
pub const DEFAULT_SUSPICIOUS_PAYLOAD_BYTES: usize = 4096;

/// Direction of the throughput test a snapshot log belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    C2s,
    S2c,
}

impl Direction {
    pub fn kind(self) -> TestKind {
        match self {
            Direction::C2s => TestKind::C2s,
            Direction::S2c => TestKind::S2c,
        }
    }

    pub fn data_direction(self) -> i64 {
        match self {
            Direction::C2s => CLIENT_TO_SERVER,
            Direction::S2c => SERVER_TO_CLIENT,
        }
    }
}

/// Size and cost limits applied per data file
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParserLimits {
    /// Snapshots considered when picking the final one
    pub max_snapshots: usize,
    /// Payloads above this are rejected
    pub max_payload_bytes: usize,
    /// Payloads below this are counted as suspicious
    pub small_payload_bytes: usize,
    /// Exact payload size counted as suspicious
    pub suspicious_payload_bytes: usize,
}

impl Default for ParserLimits {
    fn default() -> Self {
        Self {
            max_snapshots: DEFAULT_MAX_SNAPSHOTS,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            small_payload_bytes: DEFAULT_SMALL_PAYLOAD_BYTES,
            suspicious_payload_bytes: DEFAULT_SUSPICIOUS_PAYLOAD_BYTES,
        }
    }
}

/// A buffered snapshot log
#[derive(Debug)]
struct FileRecord {
    filename: String,
    info: TestInfo,
    payload: Vec<u8>,
    /// A row was already attempted for this file
    processed: bool,
}

/// Files seen so far for the current timestamp
#[derive(Debug, Default)]
struct TestContext {
    timestamp: Option<String>,
    c2s: Option<FileRecord>,
    s2c: Option<FileRecord>,
    meta: Option<MetaRecord>,
}

impl TestContext {
    fn slot(&self, dir: Direction) -> &Option<FileRecord> {
        match dir {
            Direction::C2s => &self.c2s,
            Direction::S2c => &self.s2c,
        }
    }

    fn slot_mut(&mut self, dir: Direction) -> &mut Option<FileRecord> {
        match dir {
            Direction::C2s => &mut self.c2s,
            Direction::S2c => &mut self.s2c,
        }
    }

    fn is_pending(&self, dir: Direction) -> bool {
        self.slot(dir).as_ref().is_some_and(|record| !record.processed)
    }
}

/// Correlates the files of one task into rows.
///
/// Owned by a single task; only the schema, sink and counters are shared.
pub struct NdtParser {
    task_filename: String,
    schema: Arc<VariableSchema>,
    sink: Arc<dyn RowSink>,
    counters: Arc<Counters>,
    limits: ParserLimits,
    context: TestContext,
    /// Failed files whose error was not returned to any caller
    unreported_failures: usize,
}

impl NdtParser {
    pub fn new(
        task_filename: impl Into<String>,
        schema: Arc<VariableSchema>,
        sink: Arc<dyn RowSink>,
        counters: Arc<Counters>,
    ) -> Self {
        Self {
            task_filename: task_filename.into(),
            schema,
            sink,
            counters,
            limits: ParserLimits::default(),
            context: TestContext::default(),
            unreported_failures: 0,
        }
    }

    pub fn with_limits(mut self, limits: ParserLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn task_filename(&self) -> &str {
        &self.task_filename
    }

    pub fn limits(&self) -> &ParserLimits {
        &self.limits
    }

    pub fn counters(&self) -> &Arc<Counters> {
        &self.counters
    }

    /// Failed files since the last call that were not reported through a
    /// returned error: everything that failed at rollover, and any failure
    /// after the first when one call completed several files.
    pub fn take_unreported_failures(&mut self) -> usize {
        std::mem::take(&mut self.unreported_failures)
    }

    /// Route one archive file.
    ///
    /// Errors are scoped to this file (and any buffered file it completed);
    /// the caller moves on to the next file. Names that do not follow the
    /// test filename grammar are counted and skipped.
    pub fn parse_and_insert(&mut self, test_name: &str, content: Vec<u8>) -> Result<(), ParseError> {
        let info = match TestInfo::parse(test_name) {
            Ok(info) => info,
            Err(e) => {
                self.counters.inc(TestKind::Unknown, Outcome::BadFilename);
                tracing::warn!("{}", e);
                return Ok(());
            }
        };

        if self.context.timestamp.as_deref() != Some(info.time.as_str()) {
            if self.context.timestamp.is_some() {
                // Failures here belong to the previous test, not to this file
                let failed = self.handle_anomalies().len();
                self.unreported_failures += failed;
            }
            self.context = TestContext {
                timestamp: Some(info.time.clone()),
                ..TestContext::default()
            };
        }

        match info.suffix.as_str() {
            "c2s_snaplog" => self.buffer_test(Direction::C2s, test_name, info, content),
            "s2c_snaplog" => self.buffer_test(Direction::S2c, test_name, info, content),
            "meta" => {
                if self.context.meta.is_some() {
                    self.counters.inc(TestKind::Meta, Outcome::TimestampCollision);
                    tracing::warn!("Meta collision: {}", test_name);
                }
                self.context.meta = Some(MetaRecord::parse(test_name, &content));
                let failures = self.process_pending();
                self.report(failures)
            }
            "c2s_ndttrace" | "s2c_ndttrace" | "cputime" => {
                tracing::debug!("Skipping {}", test_name);
                Ok(())
            }
            other => {
                self.counters.inc(TestKind::Unknown, Outcome::UnknownSuffix);
                Err(ParseError::UnknownSuffix(other.to_string()))
            }
        }
    }

    /// Flush the last buffered test. Call once the archive is exhausted.
    pub fn finish(&mut self) -> Result<(), ParseError> {
        let failures = if self.context.timestamp.is_some() {
            self.handle_anomalies()
        } else {
            Vec::new()
        };
        self.context = TestContext::default();
        self.report(failures)
    }

    /// Flush the row sink
    pub fn flush(&self) -> Result<(), ParseError> {
        self.sink.flush()?;
        Ok(())
    }

    fn buffer_test(
        &mut self,
        dir: Direction,
        test_name: &str,
        info: TestInfo,
        content: Vec<u8>,
    ) -> Result<(), ParseError> {
        let compressed = info.compressed;
        let slot = self.context.slot_mut(dir);

        if let Some(existing) = slot.as_ref() {
            if logical_name(&existing.filename) == logical_name(test_name) {
                // Compressed and uncompressed copies of the same file
                if existing.processed || (existing.info.compressed && !compressed) {
                    tracing::debug!("Dropping duplicate copy {}", test_name);
                    return Ok(());
                }
            } else {
                self.counters.inc(dir.kind(), Outcome::TimestampCollision);
                tracing::warn!("Collision: {} and {}", existing.filename, test_name);
            }
        }

        *slot = Some(FileRecord {
            filename: test_name.to_string(),
            info,
            payload: content,
            processed: false,
        });

        // Uncompressed copies wait for a possible .gz copy
        if compressed && self.context.meta.is_some() {
            self.process_slot(dir)
        } else {
            Ok(())
        }
    }

    /// Return the first failure; the rest are only counted
    fn report(&mut self, failures: Vec<ParseError>) -> Result<(), ParseError> {
        let mut failures = failures.into_iter();
        let first = failures.next();
        self.unreported_failures += failures.count();
        first.map_or(Ok(()), Err)
    }

    /// Handle a test whose files did not all arrive
    fn handle_anomalies(&mut self) -> Vec<ParseError> {
        if self.context.meta.is_none() {
            self.context.meta = Some(MetaRecord::placeholder());
            let mut failures = Vec::new();
            for dir in [Direction::S2c, Direction::C2s] {
                if self.context.is_pending(dir) {
                    self.counters.inc(dir.kind(), Outcome::NoMeta);
                    failures.extend(self.process_slot(dir).err());
                }
            }
            if self.context.c2s.is_none() && self.context.s2c.is_none() {
                self.counters.inc(TestKind::Test, Outcome::NoMetaNoTests);
            }
            return failures;
        }

        if self.context.c2s.is_none() && self.context.s2c.is_none() {
            self.counters.inc(TestKind::Meta, Outcome::MetaNoTests);
            let meta_name = self.context.meta.as_ref().map_or("", |m| m.test_name.as_str());
            tracing::info!("No tests: {} {}", self.task_filename, meta_name);
            return Vec::new();
        }

        self.process_pending()
    }

    /// Process every buffered data file that has no row yet
    fn process_pending(&mut self) -> Vec<ParseError> {
        [Direction::C2s, Direction::S2c]
            .into_iter()
            .filter_map(|dir| self.process_slot(dir).err())
            .collect()
    }

    /// Turn the buffered file for `dir` into a row, at most once
    fn process_slot(&mut self, dir: Direction) -> Result<(), ParseError> {
        let Some(meta) = self.context.meta.clone() else {
            // Deferred until the meta file arrives
            return Ok(());
        };
        let Some(record) = self.context.slot_mut(dir).as_mut().filter(|r| !r.processed) else {
            return Ok(());
        };
        record.processed = true;
        let payload = std::mem::take(&mut record.payload);
        let filename = record.filename.clone();
        let info = record.info.clone();

        let row = self.process_test(&filename, &info, payload, &meta, dir)?;
        match self.sink.insert_row(row) {
            Ok(()) => {
                self.counters.inc(dir.kind(), Outcome::Ok);
                Ok(())
            }
            Err(e) => {
                self.counters.inc(dir.kind(), Outcome::InsertError);
                tracing::warn!("insert-err: {}: {}", filename, e);
                Err(e.into())
            }
        }
    }

    /// Decode one snapshot log into an output row
    fn process_test(
        &self,
        filename: &str,
        info: &TestInfo,
        payload: Vec<u8>,
        meta: &MetaRecord,
        dir: Direction,
    ) -> Result<OutputRow, ParseError> {
        let kind = dir.kind();
        let size = payload.len();

        if size > self.limits.max_payload_bytes {
            self.counters.inc(kind, Outcome::Oversize);
            tracing::warn!("Ignoring oversize snaplog: {}, {}", size, filename);
            return Err(ParseError::SizeLimit {
                size,
                limit: self.limits.max_payload_bytes,
            });
        }
        if size < self.limits.small_payload_bytes {
            self.counters.inc(kind, Outcome::Undersize);
            tracing::info!("Note: small snaplog: {}, {}", size, filename);
        }
        if size == self.limits.suspicious_payload_bytes {
            self.counters.inc(kind, Outcome::FourKb);
        }

        let log = SnapshotLog::parse(payload).map_err(|e| {
            self.counters.inc(kind, Outcome::SnaplogError);
            tracing::warn!("snaplog error: {} processing {} from {}", e, filename, self.task_filename);
            e
        })?;

        if let Err(warning) = log.validate_snapshots() {
            self.counters.inc(kind, Outcome::ValidationWarning);
            tracing::warn!("{}: {}", filename, warning);
        }

        let count = log.snapshot_count();
        let index = final_snapshot_index(count, self.limits.max_snapshots).ok_or_else(|| {
            self.counters.inc(kind, Outcome::SnaplogError);
            tracing::warn!("No snapshots in {} from {}", filename, self.task_filename);
            DecodeError::Index { index: 0, count }
        })?;

        let mut snap = ValueMap::new();
        let mut log_conn_spec = ValueMap::new();
        log.snapshot(index)
            .and_then(|snapshot| snapshot.values(&self.schema, &mut snap))
            .and_then(|()| log.connection_spec_values(&mut log_conn_spec))
            .map_err(|e| {
                self.counters.inc(kind, Outcome::ValuesError);
                tracing::warn!(
                    "Error decoding values in {}, when processing {}: {}",
                    filename,
                    self.task_filename,
                    e
                );
                e
            })?;

        let mut row = ValueMap::new();
        row.set_string("test_id", filename.to_string());
        row.set_string("task_filename", self.task_filename.clone());
        row.set_string(
            "log_time",
            info.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        );
        row.set_string(
            "parse_time",
            Utc::now().to_rfc3339_opts(SecondsFormat::AutoSi, true),
        );

        let entry = row.get_map_mut(&["web100_log_entry"]);
        entry.set_int64("version", log.format_version() as i64);
        entry.set_int64("log_time", log.log_time());
        entry.insert("connection_spec", FieldValue::Map(log_conn_spec));
        entry.insert("snap", FieldValue::Map(snap));

        let conn_spec = row.get_map_mut(&["connection_spec"]);
        meta.populate_conn_spec(conn_spec);
        conn_spec.set_int64("data_direction", dir.data_direction());

        let mut anomalies = ValueMap::new();
        if meta.is_placeholder() {
            anomalies.set_bool("no_meta", true);
        }
        if count > self.limits.max_snapshots {
            anomalies.set_int64("num_snaps", count as i64);
        }
        if !anomalies.is_empty() {
            row.insert("anomalies", FieldValue::Map(anomalies));
        }

        fix_values(&mut row);
        Ok(OutputRow::new(row))
    }
}

/// Index of the snapshot a row is built from: the last one, or the last
/// one within the first `max_snapshots`. `None` for an empty log.
pub fn final_snapshot_index(count: usize, max_snapshots: usize) -> Option<usize> {
    count.min(max_snapshots).checked_sub(1)
}

/// Post-processing of legacy row values.
///
/// Snapshot addresses override the log header's connection spec; the
/// top-level connection spec is only backfilled where meta left it empty.
pub fn fix_values(row: &mut ValueMap) {
    let entry = row.get_map_mut(&["web100_log_entry"]);
    entry.substitute_string(
        false,
        &["connection_spec", "local_ip"],
        &["snap", "LocalAddress"],
    );
    entry.substitute_string(
        false,
        &["connection_spec", "remote_ip"],
        &["snap", "RemAddress"],
    );
    entry.substitute_int64(
        false,
        &["connection_spec", "local_af"],
        &["snap", "LocalAddressType"],
    );

    row.substitute_string(
        true,
        &["connection_spec", "server_ip"],
        &["web100_log_entry", "connection_spec", "local_ip"],
    );
    row.substitute_int64(
        true,
        &["connection_spec", "server_af"],
        &["web100_log_entry", "connection_spec", "local_af"],
    );
    row.substitute_string(
        true,
        &["connection_spec", "client_ip"],
        &["web100_log_entry", "connection_spec", "remote_ip"],
    );
    // client_af comes from local_af as well
    row.substitute_int64(
        true,
        &["connection_spec", "client_af"],
        &["web100_log_entry", "connection_spec", "local_af"],
    );

    // Seconds + microseconds -> microseconds
    let snap = row.get_map_mut(&["web100_log_entry", "snap"]);
    if let Some(seconds) = snap.get_int64(&["StartTimeStamp"]) {
        let micros = snap.get_int64(&["StartTimeUsec"]).unwrap_or(0);
        snap.set_int64(
            "StartTimeStamp",
            seconds.saturating_mul(1_000_000).saturating_add(micros),
        );
    }
}
