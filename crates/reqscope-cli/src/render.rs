//! Text and JSON rendering of reconstructed views

use reqscope_correlate::{LogEntry, LogKind, MiddlewareNode};
use reqscope_timeline::{FilterSummary, Overview, SelectedTimelineEvents, TimelineSpan};
use serde_json::json;
use std::collections::HashSet;
use std::fmt::Write;

const BAR_WIDTH: usize = 40;

/// Timeline as a table with a proportional bar per span
pub fn timeline_text(
    context_id: &str,
    selected: &SelectedTimelineEvents,
    slowest: &[String],
    summary: &FilterSummary,
) -> String {
    let mut out = String::new();
    let slowest: HashSet<&str> = slowest.iter().map(String::as_str).collect();

    let _ = writeln!(
        out,
        "Context {} - {} spans, {} point events, {:.1}..{:.1} ms",
        context_id,
        selected.spans.len(),
        selected.point_in_time_events.len(),
        selected.min_offset,
        selected.max_offset
    );
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:>4}  {:<12} {:<8} {:>9} {:>9}  {:<w$}  {}",
        "#",
        "CATEGORY",
        "AGENT",
        "OFFSET",
        "DURATION",
        "",
        "TITLE",
        w = BAR_WIDTH
    );

    for span in &selected.spans {
        let marker = if slowest.contains(span.event_id.as_str()) {
            "*"
        } else {
            " "
        };
        let duration = span
            .duration
            .map(|d| format!("{:.1}", d))
            .unwrap_or_else(|| "open".to_string());
        let _ = writeln!(
            out,
            "{:>4}{} {:<12} {:<8} {:>9.1} {:>9}  {}  {}",
            span.index,
            marker,
            span.category.as_str(),
            span.agent.as_str(),
            span.offset,
            duration,
            bar(span, selected.min_offset, selected.max_offset),
            span_title(span)
        );
    }

    if !selected.point_in_time_events.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Point events:");
        for point in &selected.point_in_time_events {
            let _ = writeln!(
                out,
                "  {:>9.1}  {:<13} {:<8} {}",
                point.offset,
                point.kind.as_str(),
                point.agent.as_str(),
                point.title
            );
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", summary_text(summary));
    if !slowest.is_empty() {
        let _ = writeln!(out, "* slowest events");
    }
    out
}

fn span_title(span: &TimelineSpan) -> String {
    match &span.subtitle {
        Some(subtitle) => format!("{} ({})", span.title, subtitle),
        None => span.title.clone(),
    }
}

fn bar(span: &TimelineSpan, min: f64, max: f64) -> String {
    let width = (max - min).max(1.0);
    let scale = |offset: f64| {
        (((offset - min) / width) * BAR_WIDTH as f64)
            .clamp(0.0, BAR_WIDTH as f64)
            .round() as usize
    };

    let start = scale(span.offset);
    let end = match span.duration {
        Some(_) => scale(span.end_offset()).max(start + 1).min(BAR_WIDTH),
        None => BAR_WIDTH,
    };
    let fill = if span.is_open() { '-' } else { '=' };

    let mut line = String::with_capacity(BAR_WIDTH);
    for i in 0..BAR_WIDTH {
        line.push(if i >= start && i < end { fill } else { ' ' });
    }
    line
}

fn summary_text(summary: &FilterSummary) -> String {
    let agents: Vec<String> = summary
        .agents
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();
    let categories: Vec<String> = summary
        .categories
        .iter()
        .filter(|(_, v)| **v > 0)
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();
    format!(
        "agents: {} | categories: {} | in window: {}/{}",
        agents.join(" "),
        categories.join(" "),
        summary.in_window,
        summary.total
    )
}

/// Capped overview as a compact list
pub fn overview_text(overview: &Overview) -> String {
    let mut out = String::new();
    for span in &overview.spans {
        let _ = writeln!(
            out,
            "{:>4}  {:>9.1}  {:>9}  {}",
            span.index,
            span.offset,
            span.duration
                .map(|d| format!("{:.1}", d))
                .unwrap_or_else(|| "open".to_string()),
            span_title(span)
        );
    }
    if overview.is_truncated {
        let _ = writeln!(out, "(truncated to the {} longest spans)", overview.spans.len());
    }
    out
}

/// Log view with group indentation
pub fn logs_text(entries: &[LogEntry], show_hidden: bool) -> String {
    let mut out = String::new();
    for entry in entries.iter().filter(|e| show_hidden || e.is_visible) {
        let indent = "  ".repeat(entry.depth);
        let marker = match entry.kind {
            LogKind::Group if entry.is_collapsed => "> ",
            LogKind::Group => "v ",
            _ => "",
        };
        let hidden = if entry.is_visible { "" } else { " (hidden)" };
        let _ = writeln!(
            out,
            "{:>9.1}  {:<5}  {}{}{}{}",
            entry.offset,
            level_label(entry),
            indent,
            marker,
            entry.text,
            hidden
        );

        if let (Some(table), Some(false)) = (&entry.table, entry.is_table_collapsed) {
            let _ = writeln!(out, "{:>18}{}  {}", "", indent, table);
        }

        // One connector per group this entry is the last visible child of
        for level in (0..entry.closed_groups().min(entry.depth)).map(|i| entry.depth - 1 - i) {
            let _ = writeln!(out, "{:>18}{}'-", "", "  ".repeat(level));
        }
    }
    out
}

fn level_label(entry: &LogEntry) -> &'static str {
    match entry.kind {
        LogKind::Write => entry.level.as_str(),
        LogKind::Group => "group",
        LogKind::Timestamp => "stamp",
        LogKind::TimerStart | LogKind::TimerEnd => "timer",
    }
}

pub fn logs_json(entries: &[LogEntry], show_hidden: bool) -> serde_json::Value {
    let entries: Vec<serde_json::Value> = entries
        .iter()
        .filter(|e| show_hidden || e.is_visible)
        .map(|e| {
            json!({
                "eventId": e.message.id,
                "offset": e.offset,
                "kind": e.kind,
                "level": e.level,
                "text": e.text,
                "depth": e.depth,
                "isVisible": e.is_visible,
                "isCollapsed": e.is_collapsed,
                "isEnding": e.closes_group(),
                "closedGroups": e.closed_groups(),
                "table": e.table,
                "isTableCollapsed": e.is_table_collapsed,
                "elapsed": e.elapsed,
            })
        })
        .collect();
    serde_json::Value::Array(entries)
}

/// Middleware call tree
pub fn middleware_text(nodes: &[MiddlewareNode]) -> String {
    let mut out = String::new();
    for node in nodes.iter().flat_map(MiddlewareNode::walk) {
        let duration = node
            .duration
            .map(|d| format!("{:.1} ms", d))
            .unwrap_or_else(|| "unfinished".to_string());
        let package = node
            .package_name
            .as_deref()
            .map(|p| format!(" [{}]", p))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "{:>9.1}  {}{}{}  {}",
            node.offset,
            "  ".repeat(node.depth),
            node.name,
            package,
            duration
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqscope_core::messages::MessageType;
    use reqscope_core::{Agent, Category, ClockNormalizer, CollectingDiagnostics, Message, MessageIndex};
    use reqscope_correlate::{reconstruct_logs, ExpansionState};

    fn log(id: &str, ordinal: u64, message_type: MessageType, payload: serde_json::Value) -> Message {
        Message::new(id, ordinal, ordinal as f64, Agent::Browser, message_type).with_payload(payload)
    }

    fn span(offset: f64, duration: Option<f64>) -> TimelineSpan {
        TimelineSpan::new("s", 1, offset, duration, Category::DataStore, Agent::Server, "find")
    }

    #[test]
    fn test_bar_placement() {
        let full = bar(&span(0.0, Some(100.0)), 0.0, 100.0);
        assert_eq!(full.len(), BAR_WIDTH);
        assert!(full.chars().all(|c| c == '='));

        let half = bar(&span(50.0, Some(50.0)), 0.0, 100.0);
        assert_eq!(half.find('='), Some(BAR_WIDTH / 2));

        let open = bar(&span(50.0, None), 0.0, 100.0);
        assert!(open.ends_with('-'));
    }

    #[test]
    fn test_zero_duration_still_visible() {
        let tiny = bar(&span(10.0, Some(0.0)), 0.0, 100.0);
        assert_eq!(tiny.matches('=').count(), 1);
    }

    #[test]
    fn test_logs_close_nested_groups_with_connectors() {
        let index = MessageIndex::from_messages(
            "ctx",
            vec![
                log("o", 1, MessageType::LogGroupBegin, json!({ "correlationId": "o", "label": "outer" })),
                log("i", 2, MessageType::LogGroupBegin, json!({ "correlationId": "i", "label": "inner" })),
                log("w", 3, MessageType::LogWrite, json!({ "message": "deep" })),
                log("ie", 4, MessageType::LogGroupEnd, json!({ "correlationId": "i" })),
                log("oe", 5, MessageType::LogGroupEnd, json!({ "correlationId": "o" })),
                log("after", 6, MessageType::LogWrite, json!({ "message": "after" })),
            ],
        );
        let entries = reconstruct_logs(
            &index,
            &ClockNormalizer::default(),
            &ExpansionState::new(),
            &CollectingDiagnostics::new(),
        );

        let text = logs_text(&entries, false);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[2].ends_with("deep"));
        assert_eq!(lines[3].trim_start(), "'-");
        assert_eq!(lines[4].trim_start(), "'-");
        assert!(lines[3].len() > lines[4].len());
        assert!(lines[5].ends_with("after"));

        let rows = logs_json(&entries, false);
        let deep = rows
            .as_array()
            .unwrap()
            .iter()
            .find(|r| r["eventId"] == "w")
            .unwrap();
        assert_eq!(deep["isEnding"], true);
        assert_eq!(deep["closedGroups"], 2);
    }

    #[test]
    fn test_subtitle_in_title() {
        let s = span(0.0, None).with_subtitle(Some("orders".to_string()));
        assert_eq!(span_title(&s), "find (orders)");
    }
}
