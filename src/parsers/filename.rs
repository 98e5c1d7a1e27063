//! Test file name grammar
//!
//! `[yyyy/mm/dd/]yyyymmddThh:mm:ss.fffffffffZ_<address>.<suffix>[.gz]`
//!
//! Every file of one test shares the timestamp; the suffix says what the
//! file holds (`c2s_snaplog`, `s2c_snaplog`, `meta`, ...).

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

const DATE_DIR: &str = r"^(?P<dir>\d{4}/\d{2}/\d{2}/)?";
const DATE_FIELD: &str = r"(?P<date>\d{8})";
const TIME_FIELD: &str = r"(?P<time>[012]\d:[0-6]\d:\d{2}\.\d{1,10})";
const ADDRESS_FIELD: &str = r"(?P<address>.*)";
const SUFFIX_FIELD: &str = r"(?P<suffix>[a-z2].*)";

/// Trailing marker of a compressed copy
pub const GZ_SUFFIX: &str = ".gz";

static GZ_TEST_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"{DATE_DIR}{DATE_FIELD}T{TIME_FIELD}Z_{ADDRESS_FIELD}\.{SUFFIX_FIELD}\.gz$"
    ))
    .expect("Invalid regex pattern")
});

static TEST_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"{DATE_DIR}{DATE_FIELD}T{TIME_FIELD}Z_{ADDRESS_FIELD}\.{SUFFIX_FIELD}$"
    ))
    .expect("Invalid regex pattern")
});

static DATE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DATE_FIELD).expect("Invalid regex pattern"));
static TIME_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("T{TIME_FIELD}Z_")).expect("Invalid regex pattern"));
static SUFFIX_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"\.{SUFFIX_FIELD}$")).expect("Invalid regex pattern"));

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FilenameError {
    #[error("path should contain yyyymmddT: {0}")]
    MissingDate(String),

    #[error("path should contain Thh:mm:ss.ff...Z_: {0}")]
    MissingTime(String),

    #[error("path should end in .[a-z2].*: {0}")]
    MissingSuffix(String),

    #[error("invalid test path: {0}")]
    Invalid(String),
}

/// Fields of a valid test file name
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestInfo {
    /// Optional leading `yyyy/mm/dd/`
    pub date_dir: String,
    pub date: String,
    /// Time token; identical for every file of one test
    pub time: String,
    pub address: String,
    pub suffix: String,
    /// Name ended in `.gz`
    pub compressed: bool,
    pub timestamp: DateTime<Utc>,
}

impl TestInfo {
    /// Parse a test file name, trying the compressed form first
    pub fn parse(path: &str) -> Result<Self, FilenameError> {
        let (caps, compressed) = match GZ_TEST_FILE.captures(path) {
            Some(caps) => (caps, true),
            None => match TEST_FILE.captures(path) {
                Some(caps) => (caps, false),
                None => return Err(diagnose(path)),
            },
        };

        let field = |name: &str| caps.name(name).map_or("", |m| m.as_str()).to_string();
        let date = field("date");
        let time = field("time");
        let timestamp =
            parse_timestamp(&date, &time).ok_or_else(|| FilenameError::Invalid(path.to_string()))?;

        Ok(Self {
            date_dir: field("dir"),
            date,
            time,
            address: field("address"),
            suffix: field("suffix"),
            compressed,
            timestamp,
        })
    }
}

/// Name of a file with any trailing `.gz` removed
pub fn logical_name(name: &str) -> &str {
    name.strip_suffix(GZ_SUFFIX).unwrap_or(name)
}

/// Pick the most specific reason a name failed the grammar
fn diagnose(path: &str) -> FilenameError {
    if !DATE_TOKEN.is_match(path) {
        FilenameError::MissingDate(path.to_string())
    } else if !TIME_TOKEN.is_match(path) {
        FilenameError::MissingTime(path.to_string())
    } else if !SUFFIX_TOKEN.is_match(path) {
        FilenameError::MissingSuffix(path.to_string())
    } else {
        FilenameError::Invalid(path.to_string())
    }
}

/// `yyyymmdd` + `hh:mm:ss.f...` as UTC. Digits past nanoseconds are dropped.
fn parse_timestamp(date: &str, time: &str) -> Option<DateTime<Utc>> {
    let (hms, fraction) = time.split_once('.')?;
    let fraction = &fraction[..fraction.len().min(9)];
    let text = format!("{}T{}.{}", date, hms, fraction);
    NaiveDateTime::parse_from_str(&text, "%Y%m%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
