//! Configuration management for TraceScope
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `TRACESCOPE__<SECTION>__<KEY>` environment variables.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "TRACESCOPE";

/// Main configuration struct
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Data source configuration
    pub source: SourceConfig,

    /// Graph layout configuration
    pub graph: GraphLayoutConfig,

    /// Timeline configuration
    pub timeline: TimelineConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from defaults, a file and the environment.
    ///
    /// Without an explicit path, `config.toml` in the platform config
    /// directory is used when it exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        match path.map(Path::to_path_buf).or_else(default_config_file) {
            Some(file) => {
                debug!(path = %file.display(), "Loading configuration file");
                builder = builder.add_source(config::File::from(file).required(path.is_some()));
            }
            None => debug!("No configuration file, using defaults"),
        }

        let config: Self = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the layouts cannot work with
    pub fn validate(&self) -> Result<()> {
        let graph = &self.graph;
        if graph.node_width <= 0.0 || graph.node_height <= 0.0 {
            return Err(Error::config("graph node size must be positive"));
        }
        if graph.sibling_gap < 0.0 || graph.rank_gap < 0.0 || graph.padding < 0.0 {
            return Err(Error::config("graph gaps and padding must not be negative"));
        }
        if self.timeline.zoom_percent <= 0.0 {
            return Err(Error::config("timeline zoom must be positive"));
        }
        if self.timeline.min_width_pct < 0.0 {
            return Err(Error::config("timeline minimum width must not be negative"));
        }
        if let Some(window) = &self.timeline.window {
            if window.end < window.start {
                return Err(Error::config("timeline window ends before it starts"));
            }
        }
        Ok(())
    }
}

fn default_config_file() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "tracescope", "tracescope")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .filter(|file| file.exists())
}

/// Where trace rows come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// JSON snapshot file
    #[default]
    Snapshot,
    /// Embedded SQLite snapshot
    Sqlite,
    /// REST API
    Http,
}

/// Data source configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Kind of source
    pub kind: SourceKind,
    /// Snapshot file or SQLite database path
    pub path: Option<PathBuf>,
    /// REST API base URL
    pub url: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Snapshot,
            path: None,
            url: None,
            timeout_secs: 30,
        }
    }
}

/// Graph layout direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Ranks run downwards
    #[default]
    TopToBottom,
    /// Ranks run rightwards
    LeftToRight,
}

/// Graph layout configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphLayoutConfig {
    /// Layout direction
    pub direction: Direction,
    /// Node width in pixels
    pub node_width: f64,
    /// Node height in pixels
    pub node_height: f64,
    /// Gap between siblings in pixels
    pub sibling_gap: f64,
    /// Gap between ranks in pixels
    pub rank_gap: f64,
    /// Margin around the canvas in pixels
    pub padding: f64,
}

impl Default for GraphLayoutConfig {
    fn default() -> Self {
        Self {
            direction: Direction::TopToBottom,
            node_width: 180.0,
            node_height: 60.0,
            sibling_gap: 40.0,
            rank_gap: 80.0,
            padding: 20.0,
        }
    }
}

/// Absolute time window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Window start
    pub start: DateTime<Utc>,
    /// Window end
    pub end: DateTime<Utc>,
}

/// Timeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineConfig {
    /// Zoom in percent (100 fits the trace to the container)
    pub zoom_percent: f64,
    /// Number of gridline intervals
    pub tick_count: usize,
    /// Minimum segment width in percent of the span
    pub min_width_pct: f64,
    /// Only show segments overlapping this window
    pub window: Option<TimeWindow>,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            zoom_percent: 100.0,
            tick_count: 10,
            min_width_pct: 0.5,
            window: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[graph]\ndirection = \"left_to_right\"\nnode_width = 200.0\n\n[source]\nkind = \"sqlite\"\npath = \"/tmp/trace.db\""
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();

        assert_eq!(config.graph.direction, Direction::LeftToRight);
        assert_eq!(config.graph.node_width, 200.0);
        assert_eq!(config.graph.node_height, 60.0);
        assert_eq!(config.source.kind, SourceKind::Sqlite);
        assert_eq!(config.source.path, Some(PathBuf::from("/tmp/trace.db")));
        assert_eq!(config.timeline, TimelineConfig::default());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let err = Config::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.timeline.zoom_percent = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.graph.node_width = -1.0;
        assert!(config.validate().is_err());
    }
}
