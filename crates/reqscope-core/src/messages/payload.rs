//! Typed payload shapes, one per message type tag

use serde::{Deserialize, Serialize};

/// `web-request`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebRequestPayload {
    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub method: String,
}

/// `web-response`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebResponsePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,

    /// Server-side timing of the exchange
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timing: Option<ResponseTiming>,
}

/// Server-side request timing, in server clock milliseconds
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseTiming {
    pub request_start: f64,
    pub response_end: f64,
}

impl ResponseTiming {
    pub fn duration(&self) -> f64 {
        (self.response_end - self.request_start).max(0.0)
    }
}

/// `middleware-start` / `middleware-end`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiddlewarePayload {
    pub correlation_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_name: Option<String>,
}

/// `data-http-request`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataHttpRequestPayload {
    pub correlation_id: String,

    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub method: String,
}

/// `data-http-response`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataHttpResponsePayload {
    pub correlation_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

/// `data-store-begin`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataStoreBeginPayload {
    pub correlation_id: String,

    /// Store kind, e.g. "mongodb" or "sql"
    #[serde(default)]
    pub store: String,

    #[serde(default)]
    pub operation: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

/// `data-store-end`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataStoreEndPayload {
    pub correlation_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_count: Option<u64>,
}

/// `browser-navigation-timing`
///
/// W3C navigation timing marks as absolute browser milliseconds. Marks the
/// browser did not reach are absent or zero.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NavigationTimingPayload {
    pub navigation_start: Option<f64>,
    pub redirect_start: Option<f64>,
    pub redirect_end: Option<f64>,
    pub fetch_start: Option<f64>,
    pub domain_lookup_start: Option<f64>,
    pub domain_lookup_end: Option<f64>,
    pub connect_start: Option<f64>,
    pub connect_end: Option<f64>,
    pub request_start: Option<f64>,
    pub response_start: Option<f64>,
    pub response_end: Option<f64>,
    pub dom_loading: Option<f64>,
    pub dom_interactive: Option<f64>,
    pub dom_content_loaded_event_start: Option<f64>,
    pub dom_content_loaded_event_end: Option<f64>,
    pub dom_complete: Option<f64>,
    pub load_event_start: Option<f64>,
    pub load_event_end: Option<f64>,
}

/// `log-write`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogWritePayload {
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub message: String,

    /// Structured table content (`console.table`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<serde_json::Value>,
}

/// Log severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    #[default]
    Log,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Log => "log",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// `log-group-begin`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogGroupBeginPayload {
    pub correlation_id: String,

    #[serde(default)]
    pub label: String,

    /// Opened with `console.groupCollapsed`
    #[serde(default)]
    pub is_collapsed: bool,
}

/// `log-group-end`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogGroupEndPayload {
    pub correlation_id: String,
}

/// `log-timestamp`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogTimestampPayload {
    #[serde(default)]
    pub label: String,
}

/// `log-time-begin` / `log-time-end`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogTimePayload {
    pub correlation_id: String,

    #[serde(default)]
    pub label: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigation_timing_partial() {
        let timing: NavigationTimingPayload = serde_json::from_value(serde_json::json!({
            "navigationStart": 100.0,
            "requestStart": 130.0
        }))
        .unwrap();
        assert_eq!(timing.navigation_start, Some(100.0));
        assert_eq!(timing.request_start, Some(130.0));
        assert!(timing.load_event_end.is_none());
    }

    #[test]
    fn test_response_timing_duration_clamped() {
        let timing = ResponseTiming {
            request_start: 20.0,
            response_end: 10.0,
        };
        assert_eq!(timing.duration(), 0.0);
    }

    #[test]
    fn test_log_write_defaults() {
        let payload: LogWritePayload =
            serde_json::from_value(serde_json::json!({ "message": "hi" })).unwrap();
        assert_eq!(payload.level, LogLevel::Log);
        assert!(payload.table.is_none());
    }

    #[test]
    fn test_group_begin_requires_correlation_id() {
        let result: Result<LogGroupBeginPayload, _> =
            serde_json::from_value(serde_json::json!({ "label": "g" }));
        assert!(result.is_err());
    }
}
