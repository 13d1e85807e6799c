//! feedmgr
//!
//! Client library for the ThreatHunter feed manager API: list, create,
//! update and delete threat intelligence feeds and their reports.
//!
//! ```no_run
//! use feedmgr::{FeedClient, HttpTransport, Record, TransportConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! tokio_test::block_on(async {
//!     let config = TransportConfig::new("https://defense.example.com", "SECRET/API-ID");
//!     let client = FeedClient::new(HttpTransport::new(&config)?);
//!
//!     for feed in client.list_feeds(false).await? {
//!         println!("{}", feed.describe());
//!     }
//!     Ok::<_, Box<dyn std::error::Error>>(())
//! })
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod transport;

pub use client::{FeedClient, FeedTarget};
pub use config::TransportConfig;
pub use error::{FeedError, Result, TransportError};
pub use models::{
    ClientLink, Feed, FeedInfo, FeedInfoUpdate, FieldValue, Fields, Ioc, IocBlock, LegacyIocs,
    MatchType, QueryIoc, Record, Report, Validatable,
};
pub use transport::{HttpTransport, Transport};
