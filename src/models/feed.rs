//! Feeds and their metadata

use serde::Deserialize;
use serde_json::Value;

use crate::error::{FeedError, Result};
use crate::models::{ClientLink, Fields, Record, Report, Validatable, check_fields, validate_all};

/// Metadata of one feed, independent of its reports
#[derive(Debug, Clone, Deserialize, validator::Validate)]
pub struct FeedInfo {
    #[serde(skip)]
    client: ClientLink,
    #[validate(length(min = 1))]
    name: String,
    #[validate(length(min = 1))]
    owner: String,
    #[validate(length(min = 1))]
    provider_url: String,
    #[validate(length(min = 1))]
    summary: String,
    #[validate(length(min = 1))]
    category: String,
    #[validate(length(min = 1))]
    access: String,
    #[serde(default)]
    id: Option<String>,
}

/// Partial change to a feed's metadata, applied by [`FeedInfo::update`]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedInfoUpdate {
    pub name: Option<String>,
    pub owner: Option<String>,
    pub provider_url: Option<String>,
    pub summary: Option<String>,
    pub category: Option<String>,
    pub access: Option<String>,
}

impl FeedInfoUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.owner.is_none()
            && self.provider_url.is_none()
            && self.summary.is_none()
            && self.category.is_none()
            && self.access.is_none()
    }
}

impl FeedInfo {
    /// Build feed metadata from its JSON form
    pub fn from_value(client: ClientLink, value: Value) -> Result<Self> {
        let mut info: FeedInfo =
            serde_json::from_value(value).map_err(|e| FeedError::InvalidFeedInfo(e.to_string()))?;
        info.client = client;
        Ok(info)
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn provider_url(&self) -> &str {
        &self.provider_url
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn access(&self) -> &str {
        &self.access
    }

    /// Server-assigned id, required by every follow-up call
    pub fn require_id(&self) -> Result<&str> {
        self.id.as_deref().ok_or(FeedError::MissingId(self.type_name()))
    }

    /// Copy of this record with `changes` applied
    pub fn merged(&self, changes: FeedInfoUpdate) -> FeedInfo {
        let mut next = self.clone();
        if let Some(name) = changes.name {
            next.name = name;
        }
        if let Some(owner) = changes.owner {
            next.owner = owner;
        }
        if let Some(provider_url) = changes.provider_url {
            next.provider_url = provider_url;
        }
        if let Some(summary) = changes.summary {
            next.summary = summary;
        }
        if let Some(category) = changes.category {
            next.category = category;
        }
        if let Some(access) = changes.access {
            next.access = access;
        }
        next
    }

    /// Delete this feed on the server
    pub async fn delete(&self) -> Result<()> {
        self.client.require(self.type_name())?.delete_feed(self).await
    }

    /// Fetch this feed's reports
    pub async fn reports(&self) -> Result<Vec<Report>> {
        let feed_id = self.require_id()?;
        self.client
            .require(self.type_name())?
            .feed_reports(feed_id)
            .await
    }

    /// Apply a partial update on the server.
    ///
    /// `self` is replaced by the server's answer on success and left
    /// untouched on any failure.
    pub async fn update(&mut self, changes: FeedInfoUpdate) -> Result<()> {
        let client = self.client.require(self.type_name())?;
        let candidate = self.merged(changes);
        candidate.validate()?;

        *self = client.update_feedinfo(&candidate).await?;
        Ok(())
    }
}

impl Record for FeedInfo {
    fn type_name(&self) -> &'static str {
        "FeedInfo"
    }

    fn fields(&self) -> Fields<'_> {
        Fields::new()
            .field("name", &self.name)
            .field("owner", &self.owner)
            .field("provider_url", &self.provider_url)
            .field("summary", &self.summary)
            .field("category", &self.category)
            .field("access", &self.access)
            .field("id", &self.id)
    }

    fn client_link(&self) -> &ClientLink {
        &self.client
    }
}

impl Validatable for FeedInfo {
    fn validate(&self) -> Result<()> {
        check_fields(self.type_name(), self)
    }
}

/// A feed together with all of its reports
#[derive(Debug, Clone)]
pub struct Feed {
    client: ClientLink,
    feedinfo: FeedInfo,
    reports: Vec<Report>,
}

impl Feed {
    /// Build a feed from raw metadata and report objects
    pub fn from_parts(client: ClientLink, feedinfo: Value, reports: Vec<Value>) -> Result<Self> {
        let feedinfo = FeedInfo::from_value(client.clone(), feedinfo)?;
        let reports = reports
            .into_iter()
            .map(|report| Report::for_feed(client.clone(), feedinfo.id(), report))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            client,
            feedinfo,
            reports,
        })
    }

    /// Build a feed from the `{feedinfo, reports}` object the API returns
    pub fn from_value(client: ClientLink, value: Value) -> Result<Self> {
        let Value::Object(mut object) = value else {
            return Err(FeedError::InvalidFeed("expected a JSON object".to_string()));
        };

        let feedinfo = object
            .remove("feedinfo")
            .ok_or_else(|| FeedError::InvalidFeed("missing field `feedinfo`".to_string()))?;
        let reports = match object.remove("reports") {
            None | Some(Value::Null) => vec![],
            Some(Value::Array(reports)) => reports,
            Some(_) => {
                return Err(FeedError::InvalidFeed("`reports` is not a list".to_string()));
            }
        };

        Self::from_parts(client, feedinfo, reports)
    }

    pub fn feedinfo(&self) -> &FeedInfo {
        &self.feedinfo
    }

    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    /// Delete this feed on the server
    pub async fn delete(&self) -> Result<()> {
        self.client.require(self.type_name())?.delete_feed(self).await
    }

    /// Replace the feed's full report set on the server.
    ///
    /// The new reports are built and validated before anything is sent.
    pub async fn replace(&mut self, reports: Vec<Value>) -> Result<()> {
        let client = self.client.require(self.type_name())?;
        let feed_id = self.feedinfo.require_id()?;

        let reports = reports
            .into_iter()
            .map(|report| Report::for_feed(self.client.clone(), Some(feed_id), report))
            .collect::<Result<Vec<_>>>()?;
        validate_all(&reports)?;

        client.replace_reports(feed_id, &reports).await?;
        self.reports = reports;
        Ok(())
    }
}

impl Record for Feed {
    fn type_name(&self) -> &'static str {
        "Feed"
    }

    fn fields(&self) -> Fields<'_> {
        Fields::new()
            .record("feedinfo", &self.feedinfo)
            .records("reports", &self.reports)
    }

    fn client_link(&self) -> &ClientLink {
        &self.client
    }
}

impl Validatable for Feed {
    fn validate(&self) -> Result<()> {
        self.feedinfo.validate()?;
        validate_all(&self.reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn info_value() -> Value {
        json!({
            "id": "f1",
            "name": "N",
            "owner": "O",
            "provider_url": "u",
            "summary": "s",
            "category": "c",
            "access": "private",
        })
    }

    fn report_value(id: &str) -> Value {
        json!({ "id": id, "timestamp": 0, "title": "t", "description": "d", "severity": 5 })
    }

    #[test]
    fn test_feedinfo_requires_name() {
        let mut value = info_value();
        value.as_object_mut().unwrap().remove("name");
        let err = FeedInfo::from_value(ClientLink::detached(), value).unwrap_err();
        assert!(matches!(err, FeedError::InvalidFeedInfo(ref msg) if msg.contains("name")));
    }

    #[test]
    fn test_feedinfo_id_is_optional() {
        let mut value = info_value();
        value.as_object_mut().unwrap().remove("id");
        let info = FeedInfo::from_value(ClientLink::detached(), value).unwrap();
        assert_eq!(info.id(), None);
        assert!(matches!(info.require_id(), Err(FeedError::MissingId("FeedInfo"))));
        assert_eq!(info.serialize().unwrap()["id"], Value::Null);
    }

    #[test]
    fn test_feedinfo_round_trip() {
        let info = FeedInfo::from_value(ClientLink::detached(), info_value()).unwrap();
        let first = info.serialize().unwrap();
        assert_eq!(Value::Object(first.clone()), info_value());

        let rebuilt = FeedInfo::from_value(ClientLink::detached(), Value::Object(first.clone())).unwrap();
        assert_eq!(rebuilt.serialize().unwrap(), first);
    }

    #[test]
    fn test_feedinfo_validation() {
        let info = FeedInfo::from_value(ClientLink::detached(), info_value()).unwrap();
        assert!(info.validate().is_ok());

        let mut value = info_value();
        value["owner"] = json!("");
        let info = FeedInfo::from_value(ClientLink::detached(), value).unwrap();
        assert!(matches!(info.validate(), Err(FeedError::Validation { record: "FeedInfo", .. })));
    }

    #[test]
    fn test_merged_only_touches_given_fields() {
        let info = FeedInfo::from_value(ClientLink::detached(), info_value()).unwrap();
        let next = info.merged(FeedInfoUpdate {
            summary: Some("new summary".to_string()),
            ..Default::default()
        });
        assert_eq!(next.summary(), "new summary");
        assert_eq!(next.name(), "N");
        assert_eq!(next.id(), Some("f1"));
        assert_eq!(info.summary(), "s");
        assert!(FeedInfoUpdate::default().is_empty());
    }

    #[test]
    fn test_feed_fans_out_parts() {
        let feed = Feed::from_parts(
            ClientLink::detached(),
            info_value(),
            vec![report_value("r1"), report_value("r2")],
        )
        .unwrap();
        assert_eq!(feed.feedinfo().id(), Some("f1"));
        assert_eq!(feed.reports().len(), 2);
        assert!(feed.reports().iter().all(|r| r.feed_id() == Some("f1")));

        let blob = feed.serialize().unwrap();
        assert_eq!(blob["feedinfo"]["name"], "N");
        assert_eq!(blob["reports"].as_array().unwrap().len(), 2);
        assert_eq!(blob["reports"][1]["id"], "r2");
        assert!(feed.validate().is_ok());
    }

    #[test]
    fn test_feed_construction_errors_are_scoped() {
        let mut bad_info = info_value();
        bad_info.as_object_mut().unwrap().remove("access");
        assert!(matches!(
            Feed::from_parts(ClientLink::detached(), bad_info, vec![]),
            Err(FeedError::InvalidFeedInfo(_))
        ));

        assert!(matches!(
            Feed::from_parts(ClientLink::detached(), info_value(), vec![json!({ "title": "t" })]),
            Err(FeedError::InvalidReport(_))
        ));
    }

    #[test]
    fn test_feed_validates_reports() {
        let mut report = report_value("r1");
        report["severity"] = json!(0);
        let feed = Feed::from_parts(ClientLink::detached(), info_value(), vec![report]).unwrap();
        assert!(matches!(feed.validate(), Err(FeedError::Validation { record: "Report", .. })));
    }

    #[test]
    fn test_feed_from_api_shape() {
        let feed = Feed::from_value(
            ClientLink::detached(),
            json!({ "feedinfo": info_value(), "reports": [report_value("r1")] }),
        )
        .unwrap();
        assert_eq!(feed.reports()[0].id(), "r1");

        let feed = Feed::from_value(ClientLink::detached(), json!({ "feedinfo": info_value() })).unwrap();
        assert!(feed.reports().is_empty());

        assert!(matches!(
            Feed::from_value(ClientLink::detached(), json!({ "reports": [] })),
            Err(FeedError::InvalidFeed(_))
        ));
        assert!(matches!(
            Feed::from_value(ClientLink::detached(), json!(["f1"])),
            Err(FeedError::InvalidFeed(_))
        ));
    }

    #[test]
    fn test_feed_round_trip() {
        let mut report = report_value("r1");
        report["tags"] = json!(["apt"]);
        report["iocs"] = json!(["1.2.3.4"]);
        report["iocs_v2"] = json!([{ "id": "i1", "match_type": "query", "values": ["process_name:evil.exe"] }]);
        let feed =
            Feed::from_parts(ClientLink::detached(), info_value(), vec![report, report_value("r2")])
                .unwrap();
        let first = feed.serialize().unwrap();

        let rebuilt = Feed::from_value(ClientLink::detached(), Value::Object(first.clone())).unwrap();
        assert_eq!(rebuilt.serialize().unwrap(), first);
        assert!(rebuilt.reports().iter().all(|r| r.feed_id() == Some("f1")));
    }

    #[tokio::test]
    async fn test_detached_feed_operations_fail() {
        let feed = Feed::from_parts(ClientLink::detached(), info_value(), vec![]).unwrap();
        assert!(matches!(feed.delete().await, Err(FeedError::Detached("Feed"))));
        assert!(matches!(
            feed.feedinfo().reports().await,
            Err(FeedError::Detached("FeedInfo"))
        ));

        let mut info = feed.feedinfo().clone();
        let err = info
            .update(FeedInfoUpdate {
                name: Some("renamed".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::Detached("FeedInfo")));
        assert_eq!(info.name(), "N");
    }
}
