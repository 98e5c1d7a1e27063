//! snaplog-etl - turns archived TCP snapshot logs into warehouse rows
//!
//! Each throughput test leaves up to three files in an archive: a
//! client-to-server snapshot log, a server-to-client snapshot log and a
//! textual meta sidecar. This library decodes the binary logs and correlates
//! the three files back into one row per data file.
//!
//! ## Module Structure
//!
//! - [`parsers`] - Snapshot log decoding and test correlation
//!   - `schema` - Variable definition table
//!   - `codec` - Per-type field decoding
//!   - `snaplog` - Log header, snapshot records, connection spec
//!   - `filename` - Test filename grammar
//!   - `meta` - Meta sidecar files
//!   - `ndt` - Per-task correlator and legacy fixups
//! - [`metrics`] - Counters shared by all tasks
//! - [`sink`] - Row sinks (JSON lines, in-memory)
//! - [`source`] - Archive file sources (tar, in-memory)
//! - [`task`] - One archive's worth of files driven through a correlator
//! - [`settings`] - Runtime configuration

pub mod metrics;
pub mod parsers;
pub mod settings;
pub mod sink;
pub mod source;
pub mod task;
