//! Core record contract for feed manager objects
//!
//! Every domain object declares its wire fields through [`Record::fields`].
//! Serialization to JSON and the diagnostic rendering are derived from that
//! list, so the only way a value reaches the wire is by being declared there.

pub mod feed;
pub mod ioc;
pub mod report;

use std::fmt;
use std::sync::{Arc, Weak};

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Number, Value};

use crate::client::FeedClient;
use crate::error::{FeedError, Result};
use crate::transport::Transport;

pub use feed::{Feed, FeedInfo, FeedInfoUpdate};
pub use ioc::{Ioc, MatchType, QueryIoc};
pub use report::{IocBlock, LegacyIocs, Report};

/// Longest rendered value in [`Record::describe`]
pub const DESCRIBE_WIDTH: usize = 50;

/// Shape of a single declared field
#[derive(Clone, Copy)]
pub enum FieldValue<'a> {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(&'a str),
    Record(&'a dyn Record),
    List(&'a [FieldValue<'a>]),
    /// A value with no wire representation, carrying its type name
    Opaque(&'static str),
}

impl<'a> FieldValue<'a> {
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            FieldValue::Null
                | FieldValue::Bool(_)
                | FieldValue::Int(_)
                | FieldValue::Float(_)
                | FieldValue::Str(_)
        )
    }

    pub fn is_record(&self) -> bool {
        matches!(self, FieldValue::Record(_))
    }

    /// Name of the value's kind, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "bool",
            FieldValue::Int(_) => "int",
            FieldValue::Float(_) => "float",
            FieldValue::Str(_) => "str",
            FieldValue::Record(record) => record.type_name(),
            FieldValue::List(_) => "list",
            FieldValue::Opaque(name) => *name,
        }
    }

    fn primitive_json(&self) -> Option<Value> {
        match *self {
            FieldValue::Null => Some(Value::Null),
            FieldValue::Bool(b) => Some(Value::Bool(b)),
            FieldValue::Int(i) => Some(Value::from(i)),
            FieldValue::Float(f) => Some(Value::from(f)),
            FieldValue::Str(s) => Some(Value::from(s)),
            _ => None,
        }
    }

    fn render(&self) -> String {
        match self {
            FieldValue::Null => "null".to_string(),
            FieldValue::Bool(b) => b.to_string(),
            FieldValue::Int(i) => i.to_string(),
            FieldValue::Float(f) => f.to_string(),
            FieldValue::Str(s) => s.to_string(),
            FieldValue::Record(record) => record.type_name().to_string(),
            FieldValue::List(items) => {
                let items: Vec<String> = items
                    .iter()
                    .map(|item| match item {
                        FieldValue::Str(s) => format!("{s:?}"),
                        other => other.render(),
                    })
                    .collect();
                format!("[{}]", items.join(", "))
            }
            FieldValue::Opaque(name) => format!("<{name}>"),
        }
    }
}

impl<'a> From<&'a str> for FieldValue<'a> {
    fn from(value: &'a str) -> Self {
        FieldValue::Str(value)
    }
}

impl<'a> From<&'a String> for FieldValue<'a> {
    fn from(value: &'a String) -> Self {
        FieldValue::Str(value)
    }
}

impl<'a> From<&'a Option<String>> for FieldValue<'a> {
    fn from(value: &'a Option<String>) -> Self {
        value.as_deref().map_or(FieldValue::Null, FieldValue::Str)
    }
}

impl From<i64> for FieldValue<'_> {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<&Number> for FieldValue<'_> {
    fn from(value: &Number) -> Self {
        match value.as_i64() {
            Some(int) => FieldValue::Int(int),
            None => value.as_f64().map_or(FieldValue::Null, FieldValue::Float),
        }
    }
}

/// Borrowed field list of one record.
///
/// Lists need somewhere to keep their element views, so `Fields` owns those
/// alongside the `(name, value)` pairs.
pub struct Fields<'a> {
    entries: Vec<(&'static str, Entry<'a>)>,
}

enum Entry<'a> {
    Value(FieldValue<'a>),
    List(Vec<FieldValue<'a>>),
}

impl<'a> Fields<'a> {
    pub fn new() -> Self {
        Self { entries: vec![] }
    }

    pub fn field(mut self, name: &'static str, value: impl Into<FieldValue<'a>>) -> Self {
        self.entries.push((name, Entry::Value(value.into())));
        self
    }

    pub fn record(mut self, name: &'static str, record: &'a dyn Record) -> Self {
        self.entries.push((name, Entry::Value(FieldValue::Record(record))));
        self
    }

    pub fn list(mut self, name: &'static str, items: Vec<FieldValue<'a>>) -> Self {
        self.entries.push((name, Entry::List(items)));
        self
    }

    pub fn strings(self, name: &'static str, items: &'a [String]) -> Self {
        self.list(name, items.iter().map(FieldValue::from).collect())
    }

    pub fn records<R: Record>(self, name: &'static str, items: &'a [R]) -> Self {
        self.list(
            name,
            items.iter().map(|r| FieldValue::Record(r as &dyn Record)).collect(),
        )
    }

    /// Iterate `(name, value)` pairs in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, FieldValue<'_>)> {
        self.entries.iter().map(|(name, entry)| {
            let value = match entry {
                Entry::Value(value) => *value,
                Entry::List(items) => FieldValue::List(items.as_slice()),
            };
            (*name, value)
        })
    }
}

impl Default for Fields<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Base contract shared by every feed manager object
pub trait Record: Send + Sync {
    /// Concrete type name shown in diagnostics
    fn type_name(&self) -> &'static str;

    /// Declared wire fields, in order
    fn fields(&self) -> Fields<'_>;

    /// Client this record was hydrated through
    fn client_link(&self) -> &ClientLink;

    /// Convert the declared fields into a JSON object.
    ///
    /// Fails with [`FeedError::UnsupportedFieldType`] when a field has no
    /// wire representation.
    fn serialize(&self) -> Result<Map<String, Value>> {
        let fields = self.fields();
        let mut blob = Map::new();
        for (name, value) in fields.iter() {
            blob.insert(name.to_string(), wire_value(name, &value)?);
        }
        Ok(blob)
    }

    /// Human-readable multi-line summary of the record
    fn describe(&self) -> String {
        let server = self
            .client_link()
            .server()
            .unwrap_or_else(|| "<detached>".to_string());
        let mut lines = vec![format!("{} object, bound to {}.", self.type_name(), server)];

        let fields = self.fields();
        for (name, value) in fields.iter() {
            lines.push(format!("    {:>20}: {}", name, truncate(&value.render())));
        }

        lines.join("\n")
    }
}

fn wire_value(field: &str, value: &FieldValue<'_>) -> Result<Value> {
    if let Some(json) = value.primitive_json() {
        return Ok(json);
    }

    match value {
        FieldValue::Record(record) => Ok(Value::Object(record.serialize()?)),
        FieldValue::List(items) => {
            if items.iter().all(FieldValue::is_record) {
                let mut out = Vec::with_capacity(items.len());
                for item in items.iter() {
                    if let FieldValue::Record(record) = item {
                        out.push(Value::Object(record.serialize()?));
                    }
                }
                Ok(Value::Array(out))
            } else if items.iter().all(FieldValue::is_primitive) {
                Ok(Value::Array(
                    items.iter().filter_map(FieldValue::primitive_json).collect(),
                ))
            } else {
                let leading_record = items.first().is_some_and(FieldValue::is_record);
                let offending = items
                    .iter()
                    .find(|item| {
                        if leading_record {
                            !item.is_record()
                        } else {
                            !item.is_primitive()
                        }
                    })
                    .map_or("list", FieldValue::kind);
                Err(unsupported(field, offending))
            }
        }
        other => Err(unsupported(field, other.kind())),
    }
}

fn unsupported(field: &str, type_name: &str) -> FeedError {
    FeedError::UnsupportedFieldType {
        field: field.to_string(),
        type_name: type_name.to_string(),
    }
}

fn truncate(value: &str) -> String {
    if value.chars().count() > DESCRIBE_WIDTH {
        let head: String = value.chars().take(DESCRIBE_WIDTH - 3).collect();
        format!("{head}...")
    } else {
        value.to_string()
    }
}

/// Records that can check their own invariants before a write.
///
/// Types must override [`Validatable::validate`]; the default signals a
/// missing implementation rather than bad data.
pub trait Validatable: Record {
    fn validate(&self) -> Result<()> {
        Err(FeedError::ValidationNotImplemented(self.type_name()))
    }
}

/// Validate every element of an owned collection
pub fn validate_all<V: Validatable>(items: &[V]) -> Result<()> {
    items.iter().try_for_each(Validatable::validate)
}

/// Run the declarative field checks of a record
pub(crate) fn check_fields<T: validator::Validate>(record: &'static str, value: &T) -> Result<()> {
    validator::Validate::validate(value).map_err(|e| FeedError::Validation {
        record,
        reason: e.to_string(),
    })
}

pub(crate) fn invalid(record: &'static str, reason: impl Into<String>) -> FeedError {
    FeedError::Validation {
        record,
        reason: reason.into(),
    }
}

/// Non-owning association from a record back to the client that created it.
///
/// Never serialized. Records built from caller data before a write start
/// out detached.
#[derive(Clone, Default)]
pub struct ClientLink(Option<Weak<dyn Transport>>);

impl ClientLink {
    pub fn detached() -> Self {
        Self(None)
    }

    pub(crate) fn new(transport: &Arc<dyn Transport>) -> Self {
        Self(Some(Arc::downgrade(transport)))
    }

    /// Client to run follow-up operations on, if it is still alive
    pub fn client(&self) -> Option<FeedClient> {
        self.0
            .as_ref()
            .and_then(Weak::upgrade)
            .map(FeedClient::from_transport)
    }

    pub(crate) fn require(&self, record: &'static str) -> Result<FeedClient> {
        self.client().ok_or(FeedError::Detached(record))
    }

    pub fn server(&self) -> Option<String> {
        self.0
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|transport| transport.server())
    }
}

impl fmt::Debug for ClientLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_ref().and_then(Weak::upgrade) {
            Some(_) => write!(f, "ClientLink(bound)"),
            None => write!(f, "ClientLink(detached)"),
        }
    }
}

/// Read `null` or a missing key as the type's default
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sample {
        link: ClientLink,
        name: String,
        count: i64,
        ratio: f64,
        tags: Vec<String>,
        children: Vec<Child>,
        mixed: bool,
        opaque: bool,
    }

    struct Child {
        link: ClientLink,
        label: String,
    }

    impl Record for Child {
        fn type_name(&self) -> &'static str {
            "Child"
        }

        fn fields(&self) -> Fields<'_> {
            Fields::new().field("label", &self.label)
        }

        fn client_link(&self) -> &ClientLink {
            &self.link
        }
    }

    impl Validatable for Child {}

    impl Record for Sample {
        fn type_name(&self) -> &'static str {
            "Sample"
        }

        fn fields(&self) -> Fields<'_> {
            let mut fields = Fields::new()
                .field("name", &self.name)
                .field("count", self.count)
                .field("ratio", FieldValue::Float(self.ratio))
                .field("missing", FieldValue::Null)
                .strings("tags", &self.tags)
                .records("children", &self.children);
            if let Some(child) = self.children.first() {
                fields = fields.record("first", child);
            }
            if self.mixed {
                let child: &dyn Record = &self.children[0];
                fields = fields.list("mixed", vec![FieldValue::Record(child), FieldValue::Str("x")]);
            }
            if self.opaque {
                fields = fields.field("socket", FieldValue::Opaque("TcpStream"));
            }
            fields
        }

        fn client_link(&self) -> &ClientLink {
            &self.link
        }
    }

    fn sample() -> Sample {
        Sample {
            link: ClientLink::detached(),
            name: "sample".to_string(),
            count: 3,
            ratio: 0.5,
            tags: vec!["a".to_string(), "b".to_string()],
            children: vec![Child {
                link: ClientLink::detached(),
                label: "one".to_string(),
            }],
            mixed: false,
            opaque: false,
        }
    }

    #[test]
    fn test_serialize_supported_shapes() {
        let blob = Value::Object(sample().serialize().unwrap());
        assert_eq!(
            blob,
            serde_json::json!({
                "name": "sample",
                "count": 3,
                "ratio": 0.5,
                "missing": null,
                "tags": ["a", "b"],
                "children": [{ "label": "one" }],
                "first": { "label": "one" },
            })
        );
    }

    #[test]
    fn test_empty_list_serializes_as_empty_array() {
        let mut s = sample();
        s.children.clear();
        let blob = s.serialize().unwrap();
        assert_eq!(blob["children"], serde_json::json!([]));
        assert!(!blob.contains_key("first"));
    }

    #[test]
    fn test_mixed_list_is_rejected() {
        let mut s = sample();
        s.mixed = true;
        match s.serialize() {
            Err(FeedError::UnsupportedFieldType { field, type_name }) => {
                assert_eq!(field, "mixed");
                assert_eq!(type_name, "str");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_opaque_field_is_rejected() {
        let mut s = sample();
        s.opaque = true;
        match s.serialize() {
            Err(FeedError::UnsupportedFieldType { field, type_name }) => {
                assert_eq!(field, "socket");
                assert_eq!(type_name, "TcpStream");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_nested_list_is_rejected() {
        let inner = [FieldValue::Str("a")];
        let nested = [FieldValue::List(&inner)];
        let err = wire_value("grid", &FieldValue::List(&nested)).unwrap_err();
        assert!(matches!(
            err,
            FeedError::UnsupportedFieldType { ref type_name, .. } if type_name == "list"
        ));
    }

    #[test]
    fn test_describe_layout() {
        let text = sample().describe();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Sample object, bound to <detached>.");
        assert_eq!(lines[1], format!("    {:>20}: sample", "name"));
        assert!(text.contains(r#"["a", "b"]"#));
        assert!(text.contains(&format!("    {:>20}: Child", "first")));
    }

    #[test]
    fn test_describe_truncates_long_values() {
        let mut s = sample();
        s.name = "x".repeat(120);
        let text = s.describe();
        let name_line = text.lines().nth(1).unwrap();
        let value = name_line.split(": ").nth(1).unwrap();
        assert_eq!(value.chars().count(), DESCRIBE_WIDTH);
        assert!(value.ends_with("..."));
        for line in text.lines().skip(1) {
            let (_, value) = line.split_once(": ").unwrap();
            assert!(value.chars().count() <= DESCRIBE_WIDTH);
        }
    }

    #[test]
    fn test_truncate_keeps_exact_width() {
        let fifty = "y".repeat(DESCRIBE_WIDTH);
        assert_eq!(truncate(&fifty), fifty);
        assert_eq!(truncate("ab"), "ab");
    }

    #[test]
    fn test_default_validate_signals_missing_override() {
        let s = sample();
        let child = &s.children[0];
        assert!(matches!(
            child.validate(),
            Err(FeedError::ValidationNotImplemented("Child"))
        ));
        assert!(validate_all(&s.children).is_err());
    }

    #[test]
    fn test_detached_link() {
        let link = ClientLink::detached();
        assert!(link.client().is_none());
        assert!(link.server().is_none());
        assert!(matches!(link.require("Sample"), Err(FeedError::Detached("Sample"))));
    }
}
