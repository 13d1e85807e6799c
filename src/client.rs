//! Feed manager API client

use std::sync::Arc;

use serde_json::{Value, json};
use url::Url;

use crate::error::{FeedError, Result, TransportError};
use crate::models::{ClientLink, Feed, FeedInfo, Record, Report, Validatable};
use crate::transport::Transport;

const FEED_PATH: &str = "/threathunter/feedmgr/v1/feed";

/// Only the path of this URL is used; it anchors segment encoding
const FEED_URL: &str = "https://feedmgr.invalid/threathunter/feedmgr/v1/feed";

/// Reject ids that would address something other than a single resource
fn check_id(id: &str) -> Result<&str> {
    match id {
        "" | "." | ".." => Err(FeedError::InvalidId(id.to_string())),
        _ => Ok(id),
    }
}

/// Path below the feed collection, each segment percent-encoded on its own
fn feed_path(segments: &[&str]) -> Result<String> {
    for segment in segments {
        check_id(segment)?;
    }

    let mut url = Url::parse(FEED_URL).map_err(TransportError::from)?;
    if let Ok(mut path) = url.path_segments_mut() {
        path.extend(segments);
    }
    Ok(url.path().to_string())
}

/// Anything a feed id can be taken from when deleting a feed
#[derive(Debug, Clone, Copy)]
pub enum FeedTarget<'a> {
    Feed(&'a Feed),
    Info(&'a FeedInfo),
    Id(&'a str),
    /// A dynamic value of a kind that carries no feed id
    Unsupported(&'static str),
}

impl FeedTarget<'_> {
    /// Resolve the feed id, or explain why there is none
    pub fn feed_id(&self) -> Result<&str> {
        match *self {
            FeedTarget::Feed(feed) => feed.feedinfo().require_id(),
            FeedTarget::Info(info) => info.require_id(),
            FeedTarget::Id(id) => check_id(id),
            FeedTarget::Unsupported(kind) => Err(FeedError::BadIdentifierType(kind.to_string())),
        }
    }
}

impl<'a> From<&'a Feed> for FeedTarget<'a> {
    fn from(feed: &'a Feed) -> Self {
        FeedTarget::Feed(feed)
    }
}

impl<'a> From<&'a FeedInfo> for FeedTarget<'a> {
    fn from(info: &'a FeedInfo) -> Self {
        FeedTarget::Info(info)
    }
}

impl<'a> From<&'a str> for FeedTarget<'a> {
    fn from(id: &'a str) -> Self {
        FeedTarget::Id(id)
    }
}

impl<'a> From<&'a String> for FeedTarget<'a> {
    fn from(id: &'a String) -> Self {
        FeedTarget::Id(id)
    }
}

impl<'a> From<&'a Value> for FeedTarget<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::String(id) => FeedTarget::Id(id),
            Value::Null => FeedTarget::Unsupported("null"),
            Value::Bool(_) => FeedTarget::Unsupported("bool"),
            Value::Number(_) => FeedTarget::Unsupported("number"),
            Value::Array(_) => FeedTarget::Unsupported("array"),
            Value::Object(_) => FeedTarget::Unsupported("object"),
        }
    }
}

/// Client for the ThreatHunter feed manager API.
///
/// Cheap to clone; records hydrated by the client keep a weak link back to
/// it for follow-up calls.
#[derive(Clone)]
pub struct FeedClient {
    transport: Arc<dyn Transport>,
}

impl FeedClient {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::from_transport(Arc::new(transport))
    }

    pub fn from_transport(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub fn server(&self) -> String {
        self.transport.server()
    }

    fn link(&self) -> ClientLink {
        ClientLink::new(&self.transport)
    }

    /// List feeds visible to the caller
    pub async fn list_feeds(&self, include_public: bool) -> Result<Vec<FeedInfo>> {
        let query = vec![("include_public".to_string(), include_public.to_string())];
        let resp = self.transport.get_object(FEED_PATH, &query).await?;

        let feeds = results(FEED_PATH, resp)?
            .into_iter()
            .map(|feed| FeedInfo::from_value(self.link(), feed))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(count = feeds.len(), include_public, "Listed feeds");
        Ok(feeds)
    }

    /// Fetch one feed with all of its reports
    pub async fn get_feed(&self, feed_id: &str) -> Result<Feed> {
        let resp = self.transport.get_object(&feed_path(&[feed_id])?, &[]).await?;
        let feed = Feed::from_value(self.link(), resp)?;

        tracing::debug!(feed_id, reports = feed.reports().len(), "Fetched feed");
        Ok(feed)
    }

    /// Fetch the reports of a feed
    pub async fn feed_reports(&self, feed_id: &str) -> Result<Vec<Report>> {
        let path = feed_path(&[feed_id, "report"])?;
        let resp = self.transport.get_object(&path, &[]).await?;

        let reports = results(&path, resp)?
            .into_iter()
            .map(|report| Report::for_feed(self.link(), Some(feed_id), report))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(feed_id, count = reports.len(), "Fetched reports");
        Ok(reports)
    }

    /// Create a feed from raw metadata and reports.
    ///
    /// The feed is built, validated and serialized before the request is
    /// sent; any failure there means nothing reaches the server.
    pub async fn create_feed(&self, feedinfo: Value, reports: Vec<Value>) -> Result<FeedInfo> {
        let feed = Feed::from_parts(self.link(), feedinfo, reports)?;
        feed.validate()?;
        let body = Value::Object(feed.serialize()?);

        let resp = self.transport.post_object(FEED_PATH, &body).await?;
        let info = FeedInfo::from_value(self.link(), resp)?;

        tracing::info!(feed_id = info.id().unwrap_or_default(), name = info.name(), "Created feed");
        Ok(info)
    }

    /// Write a feed's metadata back to the server
    pub async fn update_feedinfo(&self, info: &FeedInfo) -> Result<FeedInfo> {
        let feed_id = info.require_id()?;
        let body = Value::Object(info.serialize()?);

        let resp = self
            .transport
            .put_object(&feed_path(&[feed_id, "feedinfo"])?, &body)
            .await?;

        tracing::debug!(feed_id, "Updated feed info");
        FeedInfo::from_value(self.link(), resp)
    }

    /// Replace every report of a feed
    pub async fn replace_reports(&self, feed_id: &str, reports: &[Report]) -> Result<()> {
        let reports = reports
            .iter()
            .map(|report| report.serialize().map(Value::Object))
            .collect::<Result<Vec<_>>>()?;
        let count = reports.len();
        let path = feed_path(&[feed_id, "report"])?;

        self.transport
            .post_object(&path, &json!({ "reports": reports }))
            .await?;

        tracing::debug!(feed_id, count, "Replaced reports");
        Ok(())
    }

    /// Delete a feed, given the feed itself, its metadata, or its id
    pub async fn delete_feed<'a>(&self, target: impl Into<FeedTarget<'a>>) -> Result<()> {
        let target = target.into();
        let feed_id = target.feed_id()?;

        self.transport.delete_object(&feed_path(&[feed_id])?).await?;

        tracing::info!(feed_id, "Deleted feed");
        Ok(())
    }

    /// Delete one report of a feed
    pub async fn delete_report(&self, feed_id: &str, report_id: &str) -> Result<()> {
        let path = feed_path(&[feed_id, "report", report_id])?;
        self.transport.delete_object(&path).await?;

        tracing::info!(feed_id, report_id, "Deleted report");
        Ok(())
    }
}

/// Pull the `results` list out of a list response
fn results(path: &str, resp: Value) -> Result<Vec<Value>> {
    match resp {
        Value::Object(mut object) => match object.remove("results") {
            None | Some(Value::Null) => Ok(vec![]),
            Some(Value::Array(items)) => Ok(items),
            Some(_) => Err(FeedError::UnexpectedResponse {
                path: path.to_string(),
                reason: "`results` is not a list".to_string(),
            }),
        },
        _ => Err(FeedError::UnexpectedResponse {
            path: path.to_string(),
            reason: "expected a JSON object".to_string(),
        }),
    }
}
