//! Indicator records attached to reports

use serde::Deserialize;
use serde_json::Value;

use crate::error::{FeedError, Result};
use crate::models::{ClientLink, FieldValue, Fields, Record, Validatable, check_fields, invalid};

/// How an IOC's values are matched
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Equality,
    Regex,
    Query,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Equality => "equality",
            MatchType::Regex => "regex",
            MatchType::Query => "query",
        }
    }
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Indicator of compromise in the v2 format
#[derive(Debug, Clone, Deserialize, validator::Validate)]
pub struct Ioc {
    #[serde(skip)]
    client: ClientLink,
    #[validate(length(min = 1))]
    id: String,
    match_type: MatchType,
    #[validate(length(min = 1))]
    values: Vec<String>,
    #[serde(default)]
    field: Option<String>,
    #[serde(default)]
    link: Option<String>,
}

impl Ioc {
    /// Build an IOC from its JSON form
    pub fn from_value(client: ClientLink, value: Value) -> Result<Self> {
        let mut ioc: Ioc =
            serde_json::from_value(value).map_err(|e| FeedError::InvalidIoc(e.to_string()))?;
        ioc.bind(&client);
        Ok(ioc)
    }

    pub(crate) fn bind(&mut self, client: &ClientLink) {
        self.client = client.clone();
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn match_type(&self) -> MatchType {
        self.match_type
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    pub fn link(&self) -> Option<&str> {
        self.link.as_deref()
    }
}

impl Record for Ioc {
    fn type_name(&self) -> &'static str {
        "IOC"
    }

    fn fields(&self) -> Fields<'_> {
        Fields::new()
            .field("id", &self.id)
            .field("match_type", self.match_type.as_str())
            .strings("values", &self.values)
            .field("field", &self.field)
            .field("link", &self.link)
    }

    fn client_link(&self) -> &ClientLink {
        &self.client
    }
}

impl Validatable for Ioc {
    fn validate(&self) -> Result<()> {
        check_fields(self.type_name(), self)?;

        if self.match_type == MatchType::Regex {
            for value in &self.values {
                regex::Regex::new(value)
                    .map_err(|e| invalid(self.type_name(), format!("bad regex {value:?}: {e}")))?;
            }
        }

        Ok(())
    }
}

/// Query-style indicator used by the legacy `iocs` block
#[derive(Debug, Clone, Deserialize)]
pub struct QueryIoc {
    #[serde(skip)]
    client: ClientLink,
    search_query: String,
    #[serde(default)]
    index_type: Option<String>,
}

impl QueryIoc {
    pub fn from_value(client: ClientLink, value: Value) -> Result<Self> {
        let mut query: QueryIoc =
            serde_json::from_value(value).map_err(|e| FeedError::InvalidQueryIoc(e.to_string()))?;
        query.bind(&client);
        Ok(query)
    }

    pub(crate) fn bind(&mut self, client: &ClientLink) {
        self.client = client.clone();
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn index_type(&self) -> Option<&str> {
        self.index_type.as_deref()
    }
}

impl Record for QueryIoc {
    fn type_name(&self) -> &'static str {
        "QueryIOC"
    }

    fn fields(&self) -> Fields<'_> {
        Fields::new()
            .field("search_query", &self.search_query)
            .field("index_type", FieldValue::from(&self.index_type))
    }

    fn client_link(&self) -> &ClientLink {
        &self.client
    }
}
