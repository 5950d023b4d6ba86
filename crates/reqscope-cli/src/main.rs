//! reqscope - request timeline reconstruction
//!
//! Loads captured instrumentation messages and prints the reconstructed
//! timeline, grouped log view or middleware tree of one request context.

mod render;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use reqscope_core::config::{ConfigLoader, ReqscopeConfig};
use reqscope_core::generator::{DemoConfig, DemoGenerator};
use reqscope_core::replay::{read_messages_from_file, write_messages_to_file};
use reqscope_core::{Agent, Category, CollectingDiagnostics, Message, MessageIndex, MessageStore};
use reqscope_correlate::ExpansionState;
use reqscope_timeline::{Segment, TimeWindow, TimelineEngine, TimelineFilters};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "reqscope")]
#[command(version)]
#[command(about = "Reconstruct request timelines from instrumentation messages", long_about = None)]
struct Cli {
    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output format (json, text)
    #[arg(short, long, default_value = "text", global = true)]
    format: String,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "REQSCOPE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the merged timeline of one request context
    Timeline {
        /// Input file (JSONL)
        #[arg(short, long)]
        input: PathBuf,

        /// Context to show (defaults to the only or first context)
        #[arg(long)]
        context: Option<String>,

        /// Hide an agent (server, browser)
        #[arg(long = "hide-agent", value_parser = parse_agent)]
        hide_agents: Vec<Agent>,

        /// Hide a category (request, middleware, web_service, data_store, page_load, log)
        #[arg(long = "hide-category", value_parser = parse_category)]
        hide_categories: Vec<Category>,

        /// Left edge of the time window, in ms
        #[arg(long)]
        min: Option<f64>,

        /// Right edge of the time window, in ms
        #[arg(long)]
        max: Option<f64>,

        /// Highlighted segment inside the window, as START:END in ms
        #[arg(long, value_parser = parse_segment)]
        segment: Option<Segment>,

        /// Show the capped overview instead of the full table
        #[arg(long)]
        overview: bool,
    },

    /// Show the grouped log view
    Logs {
        /// Input file (JSONL)
        #[arg(short, long)]
        input: PathBuf,

        /// Context to show (defaults to the only or first context)
        #[arg(long)]
        context: Option<String>,

        /// Expand a group or table by message id
        #[arg(long)]
        expand: Vec<String>,

        /// Collapse a group or table by message id
        #[arg(long)]
        collapse: Vec<String>,

        /// Include entries hidden by collapsed groups
        #[arg(long)]
        all: bool,
    },

    /// Show the middleware call tree
    Middleware {
        /// Input file (JSONL)
        #[arg(short, long)]
        input: PathBuf,

        /// Context to show (defaults to the only or first context)
        #[arg(long)]
        context: Option<String>,
    },

    /// Generate a synthetic request context
    Demo {
        /// Write the messages to a JSONL file instead of showing the timeline
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of data store operations
        #[arg(long, default_value = "3")]
        operations: usize,

        /// Browser delay before the request is sent, in ms
        #[arg(long, default_value = "30")]
        delay: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let format = OutputFormat::parse(&cli.format);

    // Load configuration file
    let config = load_config(cli.config.clone());

    // CLI verbose flag takes precedence, then config, then default
    let log_level = if cli.verbose > 0 {
        match cli.verbose {
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    } else {
        match config.logging.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN,
        }
    };
    init_logging(log_level, format)?;

    match cli.command {
        Commands::Timeline {
            input,
            context,
            hide_agents,
            hide_categories,
            min,
            max,
            segment,
            overview,
        } => {
            let window = TimeWindow {
                min_offset: min,
                max_offset: max,
                segment,
            };
            let filters = timeline_filters(&config, &hide_agents, &hide_categories, window);

            let index = load_context(&input, context.as_deref()).await?;
            timeline_command(index, &config, &filters, overview, format)
        }
        Commands::Logs {
            input,
            context,
            expand,
            collapse,
            all,
        } => {
            let mut expansion = ExpansionState::new();
            for id in expand {
                expansion.expand(id);
            }
            for id in collapse {
                expansion.collapse(id);
            }

            let index = load_context(&input, context.as_deref()).await?;
            logs_command(index, &config, &expansion, all, format)
        }
        Commands::Middleware { input, context } => {
            let index = load_context(&input, context.as_deref()).await?;
            middleware_command(index, &config, format)
        }
        Commands::Demo {
            output,
            operations,
            delay,
        } => demo_command(&config, output, operations, delay, format).await,
    }
}

/// Install the global subscriber; logs go to stderr so stdout stays parseable
fn init_logging(level: Level, format: OutputFormat) -> anyhow::Result<()> {
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        OutputFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        OutputFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
    }
    Ok(())
}

/// Load configuration from file/env, with fallback to defaults
fn load_config(cli_path: Option<PathBuf>) -> ReqscopeConfig {
    let loader = ConfigLoader::new().with_cli_path(cli_path);
    match loader.load() {
        Ok(config) => config,
        Err(e) => {
            // Logging is not installed yet
            eprintln!("Failed to load configuration: {}, using defaults", e);
            ReqscopeConfig::default()
        }
    }
}

/// Read a capture and pick one request context out of it
async fn load_context(input: &Path, context: Option<&str>) -> anyhow::Result<MessageIndex> {
    let messages = read_messages_from_file(input)
        .await
        .with_context(|| format!("Failed to load {}", input.display()))?;
    select_context(messages, context)
}

fn select_context(messages: Vec<Message>, context: Option<&str>) -> anyhow::Result<MessageIndex> {
    let store = MessageStore::from_messages(messages);
    if store.is_empty() {
        bail!("No messages found");
    }

    let ids: Vec<String> = store.context_ids().iter().map(|s| s.to_string()).collect();
    let wanted = match context {
        Some(id) => id.to_string(),
        None => {
            if ids.len() > 1 {
                warn!(
                    "Capture holds {} contexts, showing {} (use --context to pick)",
                    ids.len(),
                    ids[0]
                );
            }
            ids[0].clone()
        }
    };

    match store.into_contexts().find(|index| index.context_id() == wanted) {
        Some(index) => {
            info!("Showing context {} ({} messages)", wanted, index.len());
            Ok(index)
        }
        None => bail!("Context {} not found (available: {})", wanted, ids.join(", ")),
    }
}

fn engine_for(
    index: MessageIndex,
    config: &ReqscopeConfig,
) -> (TimelineEngine, Arc<CollectingDiagnostics>) {
    let diagnostics = Arc::new(CollectingDiagnostics::new());
    let engine = TimelineEngine::new(index)
        .with_settings(&config.timeline)
        .with_diagnostics(diagnostics.clone());
    (engine, diagnostics)
}

fn report_diagnostics(diagnostics: &CollectingDiagnostics) {
    if diagnostics.is_empty() {
        return;
    }
    warn!("{} malformed messages were skipped or defaulted", diagnostics.len());
    for entry in diagnostics.entries() {
        warn!(
            message_id = %entry.message_id,
            message_type = %entry.message_type,
            "{}",
            entry.detail
        );
    }
}

fn timeline_command(
    index: MessageIndex,
    config: &ReqscopeConfig,
    filters: &TimelineFilters,
    overview: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let (engine, diagnostics) = engine_for(index, config);

    match (format, overview) {
        (OutputFormat::Json, true) => {
            println!("{}", serde_json::to_string_pretty(&engine.overview())?);
        }
        (OutputFormat::Json, false) => {
            let selected = engine.selected_events(filters);
            let output = serde_json::json!({
                "context": engine.context_id(),
                "offsetFactor": engine.normalizer().factor(),
                "timeline": &*selected,
                "slowest": engine.slowest_event_ids(filters),
                "summary": engine.filter_summary(filters),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        (OutputFormat::Text, true) => {
            print!("{}", render::overview_text(&engine.overview()));
        }
        (OutputFormat::Text, false) => {
            let selected = engine.selected_events(filters);
            print!(
                "{}",
                render::timeline_text(
                    engine.context_id(),
                    &selected,
                    &engine.slowest_event_ids(filters),
                    &engine.filter_summary(filters),
                )
            );
        }
    }

    report_diagnostics(&diagnostics);
    Ok(())
}

fn logs_command(
    index: MessageIndex,
    config: &ReqscopeConfig,
    expansion: &ExpansionState,
    show_hidden: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let (engine, diagnostics) = engine_for(index, config);
    let entries = engine.logs(expansion);

    match format {
        OutputFormat::Json => {
            let output = render::logs_json(&entries, show_hidden);
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => print!("{}", render::logs_text(&entries, show_hidden)),
    }

    report_diagnostics(&diagnostics);
    Ok(())
}

fn middleware_command(
    index: MessageIndex,
    config: &ReqscopeConfig,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let (engine, diagnostics) = engine_for(index, config);
    let tree = engine.middleware();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&*tree)?),
        OutputFormat::Text => print!("{}", render::middleware_text(&tree)),
    }

    report_diagnostics(&diagnostics);
    Ok(())
}

async fn demo_command(
    config: &ReqscopeConfig,
    output: Option<PathBuf>,
    operations: usize,
    delay: f64,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let demo = DemoConfig {
        data_operations: operations,
        request_delay_ms: delay,
        ..Default::default()
    };
    let context_id = demo.context_id.clone();
    let messages = DemoGenerator::with_config(demo).generate();

    if let Some(path) = output {
        write_messages_to_file(&path, &messages).await?;
        println!(
            "Wrote {} messages for context {} to {}",
            messages.len(),
            context_id,
            path.display()
        );
        return Ok(());
    }

    let index = MessageIndex::from_messages(context_id, messages);
    let filters = timeline_filters(config, &[], &[], TimeWindow::default());
    timeline_command(index, config, &filters, false, format)
}

/// Filters from the config file, narrowed by command line flags
fn timeline_filters(
    config: &ReqscopeConfig,
    hide_agents: &[Agent],
    hide_categories: &[Category],
    window: TimeWindow,
) -> TimelineFilters {
    let mut filters = TimelineFilters::from_settings(&config.filters);
    for agent in hide_agents {
        filters.agent.set(*agent, false);
    }
    for category in hide_categories {
        filters.category.set(*category, false);
    }
    filters.time_window = window;
    filters
}

fn parse_agent(s: &str) -> Result<Agent, String> {
    Agent::parse(s).ok_or_else(|| format!("unknown agent: {}", s))
}

fn parse_category(s: &str) -> Result<Category, String> {
    Category::parse(s).ok_or_else(|| format!("unknown category: {}", s))
}

fn parse_segment(s: &str) -> Result<Segment, String> {
    let (start, end) = s
        .split_once(':')
        .ok_or_else(|| format!("expected START:END, got {}", s))?;
    let start: f64 = start
        .trim()
        .parse()
        .map_err(|_| format!("invalid segment start: {}", start))?;
    let end: f64 = end
        .trim()
        .parse()
        .map_err(|_| format!("invalid segment end: {}", end))?;
    Ok(Segment::new(start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use reqscope_core::messages::MessageType;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_segment() {
        assert_eq!(parse_segment("10:25").unwrap(), Segment::new(10.0, 25.0));
        assert_eq!(parse_segment("25 : 10").unwrap(), Segment::new(10.0, 25.0));
        assert!(parse_segment("10").is_err());
        assert!(parse_segment("a:b").is_err());
    }

    #[test]
    fn test_timeline_flags_parse() {
        let cli = Cli::try_parse_from([
            "reqscope",
            "timeline",
            "-i",
            "capture.jsonl",
            "--hide-agent",
            "browser",
            "--hide-category",
            "page-load",
            "--segment",
            "5:15",
        ])
        .unwrap();
        match cli.command {
            Commands::Timeline {
                hide_agents,
                hide_categories,
                segment,
                ..
            } => {
                assert_eq!(hide_agents, vec![Agent::Browser]);
                assert_eq!(hide_categories, vec![Category::PageLoad]);
                assert_eq!(segment, Some(Segment::new(5.0, 15.0)));
            }
            _ => panic!("expected timeline command"),
        }
        assert!(Cli::try_parse_from(["reqscope", "timeline", "-i", "x", "--hide-agent", "robot"]).is_err());
    }

    #[test]
    fn test_timeline_filters_start_from_config() {
        let mut config = ReqscopeConfig::default();
        config.filters.hidden_agents = vec!["browser".to_string()];

        let filters = timeline_filters(&config, &[], &[], TimeWindow::default());
        assert!(!filters.agent.is_shown(Agent::Browser));
        assert!(filters.agent.is_shown(Agent::Server));
        assert_eq!(filters.time_window, TimeWindow::default());

        let filters = timeline_filters(
            &config,
            &[Agent::Server],
            &[Category::Log],
            TimeWindow {
                min_offset: Some(5.0),
                max_offset: None,
                segment: None,
            },
        );
        assert!(!filters.agent.is_shown(Agent::Browser));
        assert!(!filters.agent.is_shown(Agent::Server));
        assert!(!filters.category.is_shown(Category::Log));
        assert_eq!(filters.time_window.min_offset, Some(5.0));
    }

    #[test]
    fn test_select_context() {
        let messages = vec![
            Message::new("a", 1, 0.0, Agent::Server, MessageType::WebRequest).with_context("ctx-a"),
            Message::new("b", 2, 0.0, Agent::Server, MessageType::WebRequest).with_context("ctx-b"),
        ];
        let index = select_context(messages.clone(), Some("ctx-b")).unwrap();
        assert_eq!(index.context_id(), "ctx-b");

        let index = select_context(messages.clone(), None).unwrap();
        assert_eq!(index.context_id(), "ctx-a");

        assert!(select_context(messages, Some("missing")).is_err());
        assert!(select_context(Vec::new(), None).is_err());
    }

    #[tokio::test]
    async fn test_load_context_from_demo_capture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.jsonl");
        let demo = DemoConfig {
            context_id: "demo".to_string(),
            ..Default::default()
        };
        write_messages_to_file(&path, &DemoGenerator::with_config(demo).generate())
            .await
            .unwrap();

        let index = load_context(&path, None).await.unwrap();
        assert_eq!(index.context_id(), "demo");

        let (engine, diagnostics) = engine_for(index, &ReqscopeConfig::default());
        let selected = engine.selected_events(&TimelineFilters::new());
        assert!(!selected.spans.is_empty());
        let text = render::timeline_text(
            engine.context_id(),
            &selected,
            &engine.slowest_event_ids(&TimelineFilters::new()),
            &engine.filter_summary(&TimelineFilters::new()),
        );
        assert!(text.contains("GET /orders/42"));
        assert!(diagnostics.is_empty());
    }

    #[tokio::test]
    async fn test_missing_capture_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_context(&dir.path().join("nope.jsonl"), None).await;
        assert!(result.is_err());
    }
}
