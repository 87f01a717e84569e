//! Data sources that deliver raw trace rows
//!
//! The core never talks to storage directly. Everything upstream of the
//! normalizer goes through [`TraceSource`], which hands back [`RawRows`] for a
//! trace id and never interprets them.

mod http;
mod snapshot;
mod sqlite;

use async_trait::async_trait;

use crate::config::{SourceConfig, SourceKind};
use crate::error::{Error, Result};
use crate::models::{RawRows, TraceListing, TraceRow};
use crate::normalize::fields;

pub use http::HttpSource;
pub use snapshot::{SnapshotDocument, SnapshotFileSource};
pub use sqlite::SqliteSource;

/// Something that can list traces and fetch the rows of one of them
#[async_trait]
pub trait TraceSource: Send + Sync {
    /// All traces the source knows about, most recent first
    async fn list_traces(&self) -> Result<Vec<TraceListing>>;

    /// Every row belonging to `trace_id`.
    ///
    /// An unknown id is [`Error::NotFound`]; a known trace without any calls
    /// is an empty [`RawRows`] apart from the trace row.
    async fn fetch_trace(&self, trace_id: &str) -> Result<RawRows>;
}

/// Open the source described by `config`
pub async fn open(config: &SourceConfig) -> Result<Box<dyn TraceSource>> {
    match config.kind {
        SourceKind::Snapshot => {
            let path = config
                .path
                .as_deref()
                .ok_or_else(|| Error::config("snapshot source needs source.path"))?;
            Ok(Box::new(SnapshotFileSource::load(path).await?))
        }
        SourceKind::Sqlite => {
            let path = config
                .path
                .as_deref()
                .ok_or_else(|| Error::config("sqlite source needs source.path"))?;
            Ok(Box::new(SqliteSource::connect(path).await?))
        }
        SourceKind::Http => {
            let url = config
                .url
                .as_deref()
                .ok_or_else(|| Error::config("http source needs source.url"))?;
            Ok(Box::new(HttpSource::new(url, config.timeout_secs)?))
        }
    }
}

/// Listing entry for a trace row; rows without an id are skipped
pub(crate) fn listing(row: &TraceRow) -> Option<TraceListing> {
    Some(TraceListing {
        id: fields::raw_id(&row.id)?,
        name: row.name.clone(),
        start_time: fields::timestamp(&row.start_time),
        end_time: fields::timestamp(&row.end_time),
    })
}

/// Order listings most recent first, unstarted last, ties by id
pub(crate) fn sort_listings(listings: &mut [TraceListing]) {
    listings.sort_by(|a, b| {
        b.start_time
            .is_some()
            .cmp(&a.start_time.is_some())
            .then_with(|| b.start_time.cmp(&a.start_time))
            .then_with(|| a.id.cmp(&b.id))
    });
}
