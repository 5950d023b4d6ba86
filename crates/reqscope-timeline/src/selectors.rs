//! Per-subsystem selectors
//!
//! Each selector turns one subsystem's messages into spans or point events on
//! the normalized timeline. Malformed payloads are reported and the message
//! falls back to default titles or an undefined duration.

use reqscope_core::error::PayloadError;
use reqscope_core::messages::{
    DataHttpRequestPayload, DataStoreBeginPayload, LogLevel, LogTimePayload,
    LogTimestampPayload, LogWritePayload, MessageType, MiddlewarePayload,
    NavigationTimingPayload, WebRequestPayload, WebResponsePayload,
};
use reqscope_core::{Agent, Category, ClockNormalizer, DiagnosticsSink, MessageLookup};
use reqscope_correlate::{correlate_all, correlate_types};

use crate::events::{PointInTimeEvent, PointKind, TimelineSpan};

/// Everything a selector needs from its context
pub struct SelectorContext<'a, L: MessageLookup> {
    pub index: &'a L,
    pub normalizer: ClockNormalizer,
    pub diagnostics: &'a dyn DiagnosticsSink,
}

impl<'a, L: MessageLookup> SelectorContext<'a, L> {
    pub fn new(index: &'a L, normalizer: ClockNormalizer, diagnostics: &'a dyn DiagnosticsSink) -> Self {
        Self {
            index,
            normalizer,
            diagnostics,
        }
    }
}

/// The HTTP request span, from `web-request` to `web-response`
pub fn request_spans<L: MessageLookup>(ctx: &SelectorContext<'_, L>) -> Vec<TimelineSpan> {
    let Some(request) = ctx
        .index
        .single_message_by_type(MessageType::WebRequest.as_str())
    else {
        return Vec::new();
    };

    let title = request
        .decode_or_report::<WebRequestPayload>(ctx.diagnostics)
        .map(|p| format!("{} {}", p.method, p.url))
        .unwrap_or_else(|| "request".to_string());

    let duration = ctx
        .index
        .single_message_by_type(MessageType::WebResponse.as_str())
        .and_then(|response| {
            let payload = response.decode_or_report::<WebResponsePayload>(ctx.diagnostics)?;
            match payload.timing {
                Some(timing) => Some(timing.duration()),
                None => {
                    ctx.diagnostics.report(&PayloadError::MissingField {
                        message_id: response.id.clone(),
                        message_type: response.primary_type().to_string(),
                        field: "timing",
                    });
                    None
                }
            }
        });

    vec![TimelineSpan::new(
        request.id.clone(),
        request.ordinal,
        ctx.normalizer.offset_of(request),
        duration,
        Category::Request,
        request.source(),
        title,
    )]
}

/// A point event for every `web-response`
pub fn response_points<L: MessageLookup>(ctx: &SelectorContext<'_, L>) -> Vec<PointInTimeEvent> {
    ctx.index
        .messages_by_type(MessageType::WebResponse.as_str())
        .iter()
        .map(|response| {
            let title = response
                .decode::<WebResponsePayload>()
                .ok()
                .and_then(|p| p.status_code)
                .map(|status| format!("response {}", status))
                .unwrap_or_else(|| "response".to_string());
            PointInTimeEvent::new(
                response.id.clone(),
                response.ordinal,
                ctx.normalizer.offset_of(response),
                Category::Request,
                response.source(),
                PointKind::Response,
                title,
            )
        })
        .collect()
}

/// One span per middleware invocation
pub fn middleware_spans<L: MessageLookup>(ctx: &SelectorContext<'_, L>) -> Vec<TimelineSpan> {
    correlate_types(
        ctx.index,
        MessageType::MiddlewareStart.as_str(),
        MessageType::MiddlewareEnd.as_str(),
    )
    .into_iter()
    .map(|pair| {
        let payload = pair
            .start
            .decode_or_report::<MiddlewarePayload>(ctx.diagnostics);
        let (title, package) = match payload {
            Some(p) => (p.name.unwrap_or_else(|| "anonymous".to_string()), p.package_name),
            None => ("anonymous".to_string(), None),
        };
        TimelineSpan::new(
            pair.start.id.clone(),
            pair.start.ordinal,
            ctx.normalizer.offset_of(&pair.start),
            pair.duration(&ctx.normalizer),
            Category::Middleware,
            pair.start.source(),
            title,
        )
        .with_subtitle(package)
    })
    .collect()
}

/// One span per outbound service exchange
pub fn web_service_spans<L: MessageLookup>(ctx: &SelectorContext<'_, L>) -> Vec<TimelineSpan> {
    correlate_types(
        ctx.index,
        MessageType::DataHttpRequest.as_str(),
        MessageType::DataHttpResponse.as_str(),
    )
    .into_iter()
    .map(|pair| {
        let title = pair
            .start
            .decode_or_report::<DataHttpRequestPayload>(ctx.diagnostics)
            .map(|p| format!("{} {}", p.method, p.url))
            .unwrap_or_else(|| "service call".to_string());
        TimelineSpan::new(
            pair.start.id.clone(),
            pair.start.ordinal,
            ctx.normalizer.offset_of(&pair.start),
            pair.duration(&ctx.normalizer),
            Category::WebService,
            pair.start.source(),
            title,
        )
    })
    .collect()
}

/// One span per data store operation
pub fn data_store_spans<L: MessageLookup>(ctx: &SelectorContext<'_, L>) -> Vec<TimelineSpan> {
    correlate_types(
        ctx.index,
        MessageType::DataStoreBegin.as_str(),
        MessageType::DataStoreEnd.as_str(),
    )
    .into_iter()
    .map(|pair| {
        let payload = pair
            .start
            .decode_or_report::<DataStoreBeginPayload>(ctx.diagnostics);
        let (title, subtitle) = match payload {
            Some(p) => (format!("{} {}", p.store, p.operation), p.target),
            None => ("data store".to_string(), None),
        };
        TimelineSpan::new(
            pair.start.id.clone(),
            pair.start.ordinal,
            ctx.normalizer.offset_of(&pair.start),
            pair.duration(&ctx.normalizer),
            Category::DataStore,
            pair.start.source(),
            title,
        )
        .with_subtitle(subtitle)
    })
    .collect()
}

/// Page load phases from browser navigation timing
///
/// Offsets are relative to `navigationStart`. A phase is skipped when either of
/// its bounds is missing or zero. Every phase shares the sort offset of the
/// earliest one so the phases stay together vertically.
pub fn page_load_spans<L: MessageLookup>(ctx: &SelectorContext<'_, L>) -> Vec<TimelineSpan> {
    let Some(message) = ctx
        .index
        .single_message_by_type(MessageType::BrowserNavigationTiming.as_str())
    else {
        return Vec::new();
    };
    let Some(timing) = message.decode_or_report::<NavigationTimingPayload>(ctx.diagnostics) else {
        return Vec::new();
    };
    let Some(navigation_start) = timing.navigation_start.filter(|v| *v != 0.0) else {
        return Vec::new();
    };

    let phases = [
        ("redirect", timing.redirect_start, timing.redirect_end),
        ("dns", timing.domain_lookup_start, timing.domain_lookup_end),
        ("connect", timing.connect_start, timing.connect_end),
        ("request", timing.request_start, timing.response_start),
        ("response", timing.response_start, timing.response_end),
        ("dom", timing.dom_loading, timing.dom_complete),
        ("load", timing.load_event_start, timing.load_event_end),
    ];

    let mut spans: Vec<TimelineSpan> = phases
        .into_iter()
        .filter_map(|(name, start, end)| {
            let start = start.filter(|v| *v != 0.0)?;
            let end = end.filter(|v| *v != 0.0)?;
            Some(TimelineSpan::new(
                format!("{}-{}", message.id, name),
                message.ordinal,
                start - navigation_start,
                Some((end - start).max(0.0)),
                Category::PageLoad,
                Agent::Browser,
                name,
            ))
        })
        .collect();

    let sort_offset = spans
        .iter()
        .map(|s| s.offset)
        .min_by(f64::total_cmp)
        .unwrap_or_default();
    for span in &mut spans {
        span.sort_offset = sort_offset;
    }
    spans
}

/// Debug timer spans, one per timer end
///
/// A timer read several times yields one span per read, all starting at the
/// timer's begin. A timer never read stays open.
pub fn debug_timer_spans<L: MessageLookup>(ctx: &SelectorContext<'_, L>) -> Vec<TimelineSpan> {
    let pairs = correlate_all(
        ctx.index.messages_by_type(MessageType::LogTimeBegin.as_str()),
        ctx.index.messages_by_type(MessageType::LogTimeEnd.as_str()),
    );

    let mut spans = Vec::new();
    for pair in pairs {
        let start = ctx.normalizer.offset_of(&pair.start);
        let label = pair
            .start
            .decode_or_report::<LogTimePayload>(ctx.diagnostics)
            .map(|p| p.label)
            .unwrap_or_default();

        if pair.ends.is_empty() {
            spans.push(TimelineSpan::new(
                pair.start.id.clone(),
                pair.start.ordinal,
                start,
                None,
                Category::Log,
                pair.start.source(),
                label,
            ));
            continue;
        }

        for end in &pair.ends {
            spans.push(TimelineSpan::new(
                end.id.clone(),
                end.ordinal,
                start,
                Some((ctx.normalizer.offset_of(end) - start).max(0.0)),
                Category::Log,
                pair.start.source(),
                label.clone(),
            ));
        }
    }
    spans
}

/// Point events for debug timestamps
pub fn timestamp_points<L: MessageLookup>(ctx: &SelectorContext<'_, L>) -> Vec<PointInTimeEvent> {
    ctx.index
        .messages_by_type(MessageType::LogTimestamp.as_str())
        .iter()
        .map(|message| {
            let label = message
                .decode_or_report::<LogTimestampPayload>(ctx.diagnostics)
                .map(|p| p.label)
                .unwrap_or_default();
            PointInTimeEvent::new(
                message.id.clone(),
                message.ordinal,
                ctx.normalizer.offset_of(message),
                Category::Log,
                message.source(),
                PointKind::Timestamp,
                label,
            )
        })
        .collect()
}

/// Point events for error-level log writes
pub fn console_error_points<L: MessageLookup>(
    ctx: &SelectorContext<'_, L>,
) -> Vec<PointInTimeEvent> {
    ctx.index
        .messages_by_type(MessageType::LogWrite.as_str())
        .iter()
        .filter_map(|message| {
            let payload = message.decode_or_report::<LogWritePayload>(ctx.diagnostics)?;
            (payload.level == LogLevel::Error).then(|| {
                PointInTimeEvent::new(
                    message.id.clone(),
                    message.ordinal,
                    ctx.normalizer.offset_of(message),
                    Category::Log,
                    message.source(),
                    PointKind::ConsoleError,
                    payload.message,
                )
            })
        })
        .collect()
}
