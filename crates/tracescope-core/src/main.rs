//! TraceScope CLI
//!
//! Command-line front end for inspecting recorded agent traces.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use tracescope::config::{Direction, LoggingConfig};
use tracescope::layout::{TimelineLayout, TimelineScale};
use tracescope::models::{CallKind, CallTree, TraceListing};
use tracescope::search::{search, Viewport};
use tracescope::session::{LoadState, Session, TraceView};
use tracescope::source;
use tracescope::Config;

/// TraceScope - execution graph and timeline views for AI agent traces
#[derive(Parser)]
#[command(name = "tracescope")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "TRACESCOPE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum DirectionArg {
    /// Top to bottom
    #[value(alias = "top-to-bottom")]
    Tb,
    /// Left to right
    #[value(alias = "left-to-right")]
    Lr,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Tb => Direction::TopToBottom,
            DirectionArg::Lr => Direction::LeftToRight,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List traces available from the configured source
    Traces,

    /// Show the call hierarchy of a trace
    Tree {
        /// Trace ID
        trace_id: String,
    },

    /// Lay out a trace as an execution graph
    Graph {
        /// Trace ID
        trace_id: String,

        /// Layout direction (overrides the configuration)
        #[arg(long, value_enum)]
        direction: Option<DirectionArg>,
    },

    /// Project a trace onto a timeline
    Timeline {
        /// Trace ID
        trace_id: String,

        /// Zoom in percent (overrides the configuration)
        #[arg(long)]
        zoom: Option<f64>,

        /// Width of the rendered bars in characters
        #[arg(long, default_value = "60")]
        width: usize,
    },

    /// Show rollup statistics of a trace
    Stats {
        /// Trace ID
        trace_id: String,
    },

    /// Find the first call whose name or label matches a term
    Search {
        /// Trace ID
        trace_id: String,

        /// Case-insensitive search term
        term: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config.logging, cli.verbose);
    debug!(source = ?config.source.kind, "Configuration loaded");

    let format = cli.format;
    let result = match cli.command {
        Commands::Traces => run_traces(config, format).await,
        Commands::Tree { trace_id } => run_tree(config, &trace_id, format).await,
        Commands::Graph {
            trace_id,
            direction,
        } => run_graph(config, &trace_id, direction, format).await,
        Commands::Timeline {
            trace_id,
            zoom,
            width,
        } => run_timeline(config, &trace_id, zoom, width, format).await,
        Commands::Stats { trace_id } => run_stats(config, &trace_id, format).await,
        Commands::Search { trace_id, term } => run_search(config, &trace_id, &term, format).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(config: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { config.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if config.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Fetch a trace and build its views
async fn load_view(
    config: Config,
    trace_id: &str,
) -> anyhow::Result<Option<std::sync::Arc<TraceView>>> {
    let source = source::open(&config.source)
        .await
        .context("failed to open trace source")?;
    let session = Session::new(config);
    session.load(source.as_ref(), trace_id).await;

    match session.state() {
        LoadState::Ready(view) => Ok(Some(view)),
        LoadState::Empty { trace_id } => {
            info!(%trace_id, "Trace has no calls");
            Ok(None)
        }
        LoadState::Failed {
            trace_id,
            error,
            retryable,
        } => {
            let hint = if retryable { " (retry may help)" } else { "" };
            bail!("loading trace {trace_id} failed: {error}{hint}")
        }
        LoadState::Idle | LoadState::Loading { .. } => bail!("trace {trace_id} did not load"),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn human_seconds(seconds: Option<f64>) -> String {
    match seconds {
        Some(s) if s.is_finite() && s >= 0.0 => {
            let millis = (s * 1_000.0).round() as u64;
            if millis == 0 {
                "0s".to_string()
            } else {
                humantime::format_duration(Duration::from_millis(millis)).to_string()
            }
        }
        _ => "N/A".to_string(),
    }
}

async fn run_traces(config: Config, format: OutputFormat) -> anyhow::Result<()> {
    let source = source::open(&config.source)
        .await
        .context("failed to open trace source")?;
    let listings: Vec<TraceListing> = source.list_traces().await?;

    if format == OutputFormat::Json {
        return print_json(&listings);
    }

    if listings.is_empty() {
        println!("No traces found.");
        return Ok(());
    }
    println!("{:<24} {:<32} {:<26} {}", "ID", "NAME", "STARTED", "DURATION");
    for listing in &listings {
        let duration = match (listing.start_time, listing.end_time) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds() as f64 / 1_000.0),
            _ => None,
        };
        println!(
            "{:<24} {:<32} {:<26} {}",
            listing.id,
            listing.name.as_deref().unwrap_or("-"),
            listing
                .start_time
                .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
            human_seconds(duration),
        );
    }
    Ok(())
}

fn print_tree(node: &CallTree, depth: usize) {
    let call = &node.call;
    println!(
        "{:indent$}{} [{}] {}",
        "",
        call.label(),
        call.kind().label(),
        human_seconds(call.duration),
        indent = depth * 2
    );
    for child in &node.children {
        print_tree(child, depth + 1);
    }
}

async fn run_tree(config: Config, trace_id: &str, format: OutputFormat) -> anyhow::Result<()> {
    let Some(view) = load_view(config, trace_id).await? else {
        println!("Trace {trace_id} has no calls.");
        return Ok(());
    };

    if format == OutputFormat::Json {
        return print_json(&view.forest);
    }
    for root in &view.forest {
        print_tree(root, 0);
    }
    Ok(())
}

async fn run_graph(
    mut config: Config,
    trace_id: &str,
    direction: Option<DirectionArg>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    if let Some(direction) = direction {
        config.graph.direction = direction.into();
    }
    let Some(view) = load_view(config, trace_id).await? else {
        println!("Trace {trace_id} has no calls.");
        return Ok(());
    };

    let graph = &view.graph;
    if format == OutputFormat::Json {
        return print_json(graph);
    }

    println!(
        "{:?} layout, canvas {:.0}x{:.0}",
        graph.direction, graph.bounds.width, graph.bounds.height
    );
    for node in &graph.nodes {
        println!(
            "{:indent$}{:<40} x={:<8.1} y={:<8.1}",
            "",
            node.label,
            node.x,
            node.y,
            indent = node.depth * 2
        );
    }
    println!("{} edges", graph.edges.len());
    Ok(())
}

const LANE_WIDTH: usize = 12;

fn bar(scale: &TimelineScale, start_seconds: f64, width_pct: f64) -> String {
    let offset = scale.x_for(start_seconds).floor() as usize;
    let len = scale.width_for_pct(width_pct).round().max(1.0) as usize;
    format!("{}{}", " ".repeat(offset), "#".repeat(len))
}

fn print_timeline(timeline: &TimelineLayout, width: usize) {
    let scale = timeline.scale(width as f64);
    println!(
        "span {} at {}% zoom",
        human_seconds(Some(timeline.total_duration)),
        timeline.zoom_percent
    );

    let ticks: Vec<String> = timeline
        .ticks
        .iter()
        .map(|t| format!("{t:.1}s"))
        .collect();
    println!("ticks: {}", ticks.join(" "));

    for (row, lane) in timeline.rows.iter().enumerate() {
        println!("{lane}");
        for segment in timeline.segments.iter().filter(|s| s.row == row) {
            println!(
                "  {:<width$} |{}",
                truncate(&segment.name, LANE_WIDTH),
                bar(&scale, segment.start_seconds, segment.width_pct),
                width = LANE_WIDTH
            );
        }
    }

    if !timeline.unplaced.is_empty() {
        println!("not placed (no start time): {}", timeline.unplaced.join(", "));
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
        out.push('~');
        out
    }
}

async fn run_timeline(
    mut config: Config,
    trace_id: &str,
    zoom: Option<f64>,
    width: usize,
    format: OutputFormat,
) -> anyhow::Result<()> {
    if let Some(zoom) = zoom {
        if zoom <= 0.0 {
            bail!("zoom must be positive");
        }
        config.timeline.zoom_percent = zoom;
    }
    let Some(view) = load_view(config, trace_id).await? else {
        println!("Trace {trace_id} has no calls.");
        return Ok(());
    };

    if format == OutputFormat::Json {
        return print_json(&view.timeline);
    }
    print_timeline(&view.timeline, width);
    Ok(())
}

async fn run_stats(config: Config, trace_id: &str, format: OutputFormat) -> anyhow::Result<()> {
    let Some(view) = load_view(config, trace_id).await? else {
        println!("Trace {trace_id} has no calls.");
        return Ok(());
    };

    if format == OutputFormat::Json {
        return print_json(&view.summary);
    }

    let totals = &view.summary.totals;
    println!("Trace {trace_id}");
    println!("  Calls:        {}", totals.call_count);
    println!("  Agents:       {}", totals.agent_count);
    println!("  LLM calls:    {}", totals.llm_count);
    println!("  Tool calls:   {}", totals.tool_count);
    println!("  Interactions: {}", totals.interaction_count);
    println!("  Errors:       {}", totals.error_count);
    println!("  Duration:     {}", human_seconds(totals.total_duration));
    println!("  Tokens:       {}", totals.total_tokens);
    println!("  Cost:         ${:.4}", totals.total_cost);
    println!("  Avg LLM:      {}", human_seconds(view.summary.avg_llm_duration));
    println!("  Avg tool:     {}", human_seconds(view.summary.avg_tool_duration));
    if !view.summary.models.is_empty() {
        println!("  Models:       {}", view.summary.models.join(", "));
    }

    let agents = view
        .forest
        .iter()
        .flat_map(CallTree::iter)
        .filter(|node| node.call.kind() == CallKind::Agent);
    for agent in agents {
        if let Some(stats) = view.aggregates.get(&agent.call.id) {
            println!(
                "  {:<30} {} calls, {}, {} errors",
                agent.call.name,
                stats.call_count,
                human_seconds(stats.total_duration),
                stats.error_count
            );
        }
    }
    Ok(())
}

async fn run_search(
    config: Config,
    trace_id: &str,
    term: &str,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let Some(view) = load_view(config, trace_id).await? else {
        println!("Trace {trace_id} has no calls.");
        return Ok(());
    };

    let Some(node) = search(&view.graph, term) else {
        if format == OutputFormat::Json {
            return print_json(&serde_json::Value::Null);
        }
        println!("No call matches {term:?}.");
        return Ok(());
    };

    if format == OutputFormat::Json {
        return print_json(node);
    }

    let viewport = Viewport {
        width: view.graph.bounds.width,
        height: view.graph.bounds.height,
    };
    let transform = viewport.center_on(node, 1.0);
    println!("{} [{}] {}", node.id, node.kind.label(), node.label);
    println!(
        "  at x={:.1} y={:.1}; pan ({:.1}, {:.1}) to center",
        node.x, node.y, transform.x, transform.y
    );
    if let Some(call) = tracescope::models::find_in_forest(&view.forest, &node.id) {
        println!("  duration {}", human_seconds(call.call.duration));
    }
    Ok(())
}
