pub mod codec;
pub mod error;
pub mod filename;
pub mod meta;
pub mod ndt;
pub mod schema;
pub mod snaplog;
pub mod types;

pub use error::{DecodeError, ParseError, ValidationWarning};
pub use ndt::{Direction, NdtParser, ParserLimits};
pub use schema::{FieldDescriptor, VariableSchema};
pub use snaplog::{LogHeader, Snapshot, SnapshotLog};
pub use types::{FieldValue, OutputRow, ValueMap, ValueSink};
