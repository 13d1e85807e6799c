//! Threat intelligence reports

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Number, Value};

use crate::error::{FeedError, Result};
use crate::models::{
    ClientLink, Fields, Ioc, QueryIoc, Record, Validatable, check_fields, invalid, null_as_default,
    validate_all,
};

/// Legacy `iocs` value of a report.
///
/// Usually an ordered list of indicator strings. Older feeds send a block
/// keyed by indicator kind instead; both forms are written back as read.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LegacyIocs {
    List(Vec<String>),
    #[serde(deserialize_with = "block_from_object")]
    Block(IocBlock),
}

impl Default for LegacyIocs {
    fn default() -> Self {
        LegacyIocs::List(vec![])
    }
}

impl LegacyIocs {
    fn bind(&mut self, client: &ClientLink) {
        if let LegacyIocs::Block(block) = self {
            block.bind(client);
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            LegacyIocs::List(values) => values.is_empty(),
            LegacyIocs::Block(block) => block.is_empty(),
        }
    }
}

/// Only a JSON object may become a block, never a positional list
fn block_from_object<'de, D>(deserializer: D) -> std::result::Result<IocBlock, D::Error>
where
    D: Deserializer<'de>,
{
    let object = Map::<String, Value>::deserialize(deserializer)?;
    serde_json::from_value(Value::Object(object)).map_err(D::Error::custom)
}

/// Keyed form of the legacy indicators
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IocBlock {
    #[serde(skip)]
    client: ClientLink,
    #[serde(default, deserialize_with = "null_as_default")]
    md5: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    sha256: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    ipv4: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    ipv6: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    dns: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    query: Vec<QueryIoc>,
}

impl IocBlock {
    fn bind(&mut self, client: &ClientLink) {
        self.client = client.clone();
        for query in &mut self.query {
            query.bind(client);
        }
    }

    pub fn md5(&self) -> &[String] {
        &self.md5
    }

    pub fn sha256(&self) -> &[String] {
        &self.sha256
    }

    pub fn ipv4(&self) -> &[String] {
        &self.ipv4
    }

    pub fn ipv6(&self) -> &[String] {
        &self.ipv6
    }

    pub fn dns(&self) -> &[String] {
        &self.dns
    }

    pub fn query(&self) -> &[QueryIoc] {
        &self.query
    }

    pub fn is_empty(&self) -> bool {
        self.md5.is_empty()
            && self.sha256.is_empty()
            && self.ipv4.is_empty()
            && self.ipv6.is_empty()
            && self.dns.is_empty()
            && self.query.is_empty()
    }
}

impl Record for IocBlock {
    fn type_name(&self) -> &'static str {
        "IOCs"
    }

    fn fields(&self) -> Fields<'_> {
        Fields::new()
            .strings("md5", &self.md5)
            .strings("sha256", &self.sha256)
            .strings("ipv4", &self.ipv4)
            .strings("ipv6", &self.ipv6)
            .strings("dns", &self.dns)
            .records("query", &self.query)
    }

    fn client_link(&self) -> &ClientLink {
        &self.client
    }
}

/// One threat intelligence finding within a feed
#[derive(Debug, Clone, Deserialize, validator::Validate)]
pub struct Report {
    #[serde(skip)]
    client: ClientLink,
    /// Feed the report was fetched from; not part of the wire form
    #[serde(skip)]
    feed_id: Option<String>,
    #[validate(length(min = 1))]
    id: String,
    timestamp: Number,
    #[validate(length(min = 1))]
    title: String,
    description: String,
    #[validate(range(min = 1, max = 10))]
    severity: i64,
    #[serde(default)]
    link: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    iocs: LegacyIocs,
    #[serde(default, deserialize_with = "null_as_default")]
    iocs_v2: Vec<Ioc>,
    #[serde(default)]
    visibility: Option<String>,
}

impl Report {
    /// Build a report from its JSON form
    pub fn from_value(client: ClientLink, value: Value) -> Result<Self> {
        let mut report: Report =
            serde_json::from_value(value).map_err(|e| FeedError::InvalidReport(e.to_string()))?;
        report.bind(&client);
        Ok(report)
    }

    /// Build a report that belongs to `feed_id`
    pub(crate) fn for_feed(client: ClientLink, feed_id: Option<&str>, value: Value) -> Result<Self> {
        let mut report = Self::from_value(client, value)?;
        report.feed_id = feed_id.map(str::to_string);
        Ok(report)
    }

    fn bind(&mut self, client: &ClientLink) {
        self.client = client.clone();
        self.iocs.bind(client);
        for ioc in &mut self.iocs_v2 {
            ioc.bind(client);
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn feed_id(&self) -> Option<&str> {
        self.feed_id.as_deref()
    }

    /// Timestamp exactly as the server sent it, whole or fractional seconds
    pub fn timestamp(&self) -> &Number {
        &self.timestamp
    }

    /// Timestamp as a UTC instant, if it names one
    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        if let Some(secs) = self.timestamp.as_i64() {
            return if secs < 0 { None } else { DateTime::from_timestamp(secs, 0) };
        }

        let secs = self.timestamp.as_f64()?;
        if !secs.is_finite() || secs < 0.0 || secs >= i64::MAX as f64 {
            return None;
        }
        DateTime::from_timestamp(secs.trunc() as i64, (secs.fract() * 1e9) as u32)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn severity(&self) -> i64 {
        self.severity
    }

    pub fn link(&self) -> Option<&str> {
        self.link.as_deref()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn iocs(&self) -> &LegacyIocs {
        &self.iocs
    }

    pub fn iocs_v2(&self) -> &[Ioc] {
        &self.iocs_v2
    }

    pub fn visibility(&self) -> Option<&str> {
        self.visibility.as_deref()
    }

    /// Delete this report from the feed it was fetched from
    pub async fn delete(&self) -> Result<()> {
        let feed_id = self.feed_id.as_deref().ok_or(FeedError::MissingId("Feed"))?;
        self.client
            .require(self.type_name())?
            .delete_report(feed_id, &self.id)
            .await
    }
}

impl Record for Report {
    fn type_name(&self) -> &'static str {
        "Report"
    }

    fn fields(&self) -> Fields<'_> {
        let fields = Fields::new()
            .field("id", &self.id)
            .field("timestamp", &self.timestamp)
            .field("title", &self.title)
            .field("description", &self.description)
            .field("severity", self.severity)
            .field("link", &self.link)
            .strings("tags", &self.tags);

        let fields = match &self.iocs {
            LegacyIocs::List(values) => fields.strings("iocs", values),
            LegacyIocs::Block(block) => fields.record("iocs", block),
        };

        fields
            .records("iocs_v2", &self.iocs_v2)
            .field("visibility", &self.visibility)
    }

    fn client_link(&self) -> &ClientLink {
        &self.client
    }
}

impl Validatable for Report {
    fn validate(&self) -> Result<()> {
        check_fields(self.type_name(), self)?;

        if self.timestamp_utc().is_none() {
            return Err(invalid(
                self.type_name(),
                format!("timestamp {} is not a valid unix time", self.timestamp),
            ));
        }

        validate_all(&self.iocs_v2)
    }
}
