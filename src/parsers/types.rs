use serde::Serialize;
use std::collections::BTreeMap;

/// Capability decoders write their named values into.
///
/// Names are either flat (`"CurCwnd"`) or dotted paths
/// (`"connection_spec.server_ip"`). Writing a name twice keeps the last value.
pub trait ValueSink {
    fn set_int64(&mut self, name: &str, value: i64);
    fn set_string(&mut self, name: &str, value: String);
    fn set_bool(&mut self, name: &str, value: bool);
}

/// A single value in a row: scalar or nested record
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int64(i64),
    String(String),
    Bool(bool),
    Map(ValueMap),
}

impl FieldValue {
    pub fn as_int64(&self) -> Option<i64> {
        match self {
            FieldValue::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            FieldValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Turn this value into an empty map unless it already is one
    fn make_map(&mut self) -> &mut ValueMap {
        if !matches!(self, FieldValue::Map(_)) {
            *self = FieldValue::Map(ValueMap::new());
        }
        match self {
            FieldValue::Map(map) => map,
            _ => unreachable!("value was just replaced by a map"),
        }
    }
}

/// Nested name -> value mapping used to assemble output rows
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValueMap(BTreeMap<String, FieldValue>);

impl ValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Insert a value under a single (non-dotted) key
    pub fn insert(&mut self, key: &str, value: FieldValue) {
        self.0.insert(key.to_string(), value);
    }

    /// Look up a value by path segments
    pub fn get(&self, path: &[&str]) -> Option<&FieldValue> {
        let (last, parents) = path.split_last()?;
        let mut current = self;
        for key in parents {
            current = current.0.get(*key)?.as_map()?;
        }
        current.0.get(*last)
    }

    pub fn get_int64(&self, path: &[&str]) -> Option<i64> {
        self.get(path).and_then(FieldValue::as_int64)
    }

    pub fn get_string(&self, path: &[&str]) -> Option<&str> {
        self.get(path).and_then(FieldValue::as_str)
    }

    pub fn get_bool(&self, path: &[&str]) -> Option<bool> {
        self.get(path).and_then(FieldValue::as_bool)
    }

    pub fn get_map(&self, path: &[&str]) -> Option<&ValueMap> {
        self.get(path).and_then(FieldValue::as_map)
    }

    /// Mutable access to a nested map, creating it (and its parents) if needed.
    /// A scalar found on the way is replaced by an empty map.
    pub fn get_map_mut(&mut self, path: &[&str]) -> &mut ValueMap {
        let mut current = self;
        for key in path {
            current = current
                .0
                .entry((*key).to_string())
                .or_insert_with(|| FieldValue::Map(ValueMap::new()))
                .make_map();
        }
        current
    }

    /// Copy the string at `source` to `target`.
    ///
    /// Nothing happens when `source` is absent or not a string, or when
    /// `only_if_missing` is set and `target` already holds a value.
    pub fn substitute_string(&mut self, only_if_missing: bool, target: &[&str], source: &[&str]) {
        self.substitute(only_if_missing, target, source, |v| v.as_str().is_some());
    }

    /// Integer counterpart of [`ValueMap::substitute_string`]
    pub fn substitute_int64(&mut self, only_if_missing: bool, target: &[&str], source: &[&str]) {
        self.substitute(only_if_missing, target, source, |v| v.as_int64().is_some());
    }

    fn substitute(
        &mut self,
        only_if_missing: bool,
        target: &[&str],
        source: &[&str],
        accept: fn(&FieldValue) -> bool,
    ) {
        let Some((leaf, parents)) = target.split_last() else {
            return;
        };
        if only_if_missing && self.get(target).is_some() {
            return;
        }
        let Some(value) = self.get(source).filter(|v| accept(v)).cloned() else {
            return;
        };
        self.get_map_mut(parents).insert(leaf, value);
    }

    fn set_path(&mut self, path: &str, value: FieldValue) {
        match path.rsplit_once('.') {
            Some((parents, leaf)) => {
                let parents: Vec<&str> = parents.split('.').collect();
                self.get_map_mut(&parents).insert(leaf, value);
            }
            None => self.insert(path, value),
        }
    }
}

impl ValueSink for ValueMap {
    fn set_int64(&mut self, name: &str, value: i64) {
        self.set_path(name, FieldValue::Int64(value));
    }

    fn set_string(&mut self, name: &str, value: String) {
        self.set_path(name, FieldValue::String(value));
    }

    fn set_bool(&mut self, name: &str, value: bool) {
        self.set_path(name, FieldValue::Bool(value));
    }
}

/// One warehouse row, emitted per c2s or s2c data file
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct OutputRow(ValueMap);

impl OutputRow {
    pub fn new(fields: ValueMap) -> Self {
        Self(fields)
    }

    pub fn fields(&self) -> &ValueMap {
        &self.0
    }

    pub fn get_string(&self, path: &[&str]) -> Option<&str> {
        self.0.get_string(path)
    }

    pub fn get_int64(&self, path: &[&str]) -> Option<i64> {
        self.0.get_int64(path)
    }

    pub fn get_bool(&self, path: &[&str]) -> Option<bool> {
        self.0.get_bool(path)
    }

    /// The test_id (original data filename) of this row
    pub fn test_id(&self) -> Option<&str> {
        self.get_string(&["test_id"])
    }

    /// Whether the row was built against a placeholder meta record
    pub fn is_missing_meta(&self) -> bool {
        self.get_bool(&["anomalies", "no_meta"]).unwrap_or(false)
    }
}
