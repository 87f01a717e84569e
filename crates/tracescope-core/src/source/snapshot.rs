//! JSON snapshot file source

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{listing, sort_listings, TraceSource};
use crate::error::{Error, Result};
use crate::models::{RawRows, TraceListing};
use crate::normalize::fields;

/// On-disk snapshot: one [`RawRows`] per trace
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDocument {
    /// Traces in the snapshot; each must carry its trace row
    #[serde(default)]
    pub traces: Vec<RawRows>,
}

/// Trace source backed by a snapshot document read into memory
#[derive(Debug, Clone)]
pub struct SnapshotFileSource {
    path: Option<PathBuf>,
    document: SnapshotDocument,
}

impl SnapshotFileSource {
    /// Read and parse a snapshot file
    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let document: SnapshotDocument = serde_json::from_slice(&bytes)?;
        info!(
            path = %path.display(),
            traces = document.traces.len(),
            "Loaded snapshot"
        );

        Ok(Self {
            path: Some(path.to_path_buf()),
            document,
        })
    }

    /// Serve an in-memory document
    pub fn from_document(document: SnapshotDocument) -> Self {
        Self {
            path: None,
            document,
        }
    }

    /// File the snapshot was read from, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn trace_id(rows: &RawRows) -> Option<String> {
        rows.trace.as_ref().and_then(|trace| fields::raw_id(&trace.id))
    }
}

#[async_trait]
impl TraceSource for SnapshotFileSource {
    async fn list_traces(&self) -> Result<Vec<TraceListing>> {
        let mut listings: Vec<TraceListing> = self
            .document
            .traces
            .iter()
            .filter_map(|rows| {
                let entry = rows.trace.as_ref().and_then(listing);
                if entry.is_none() {
                    warn!(rows = rows.len(), "Snapshot entry without trace id, skipping");
                }
                entry
            })
            .collect();
        sort_listings(&mut listings);
        Ok(listings)
    }

    async fn fetch_trace(&self, trace_id: &str) -> Result<RawRows> {
        let rows = self
            .document
            .traces
            .iter()
            .find(|rows| Self::trace_id(rows).as_deref() == Some(trace_id))
            .cloned()
            .ok_or_else(|| Error::not_found("trace", trace_id))?;

        debug!(trace_id, rows = rows.len(), "Fetched trace from snapshot");
        Ok(rows)
    }
}
