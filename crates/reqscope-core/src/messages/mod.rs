//! Instrumentation messages - the immutable input unit of every stage
//!
//! A message is produced once by the transport and never mutated. Its `types`
//! tag set identifies the payload shape; typed views of the payloads live in
//! [`payload`].

pub mod payload;

pub use payload::*;

use crate::diagnostics::DiagnosticsSink;
use crate::error::PayloadError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// One instrumentation message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Opaque message identity
    pub id: String,

    /// Global arrival sequence, strictly increasing per context
    pub ordinal: u64,

    /// Agent-local elapsed milliseconds since context start
    pub offset: f64,

    /// Originating agent
    #[serde(default)]
    pub agent: AgentInfo,

    /// Request context this message belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextRef>,

    /// Tag set identifying the payload shape
    #[serde(default)]
    pub types: Vec<String>,

    /// Subsystem-specific payload
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Message {
    /// Create a message with an empty payload
    pub fn new(
        id: impl Into<String>,
        ordinal: u64,
        offset: f64,
        agent: Agent,
        message_type: MessageType,
    ) -> Self {
        Self {
            id: id.into(),
            ordinal,
            offset,
            agent: AgentInfo { source: agent },
            context: None,
            types: vec![message_type.as_str().to_string()],
            payload: serde_json::Value::Null,
        }
    }

    /// Set the payload
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Set the owning context
    pub fn with_context(mut self, context_id: impl Into<String>) -> Self {
        self.context = Some(ContextRef {
            id: context_id.into(),
        });
        self
    }

    /// Add another type tag
    pub fn with_type(mut self, tag: impl Into<String>) -> Self {
        self.types.push(tag.into());
        self
    }

    /// Originating agent
    pub fn source(&self) -> Agent {
        self.agent.source
    }

    /// Whether the message carries the given type tag
    pub fn has_type(&self, tag: &str) -> bool {
        self.types.iter().any(|t| t == tag)
    }

    /// First known type tag, used when describing the message
    pub fn primary_type(&self) -> &str {
        self.types
            .iter()
            .find(|t| MessageType::parse(t).is_some())
            .or_else(|| self.types.first())
            .map(String::as_str)
            .unwrap_or("unknown")
    }

    /// Correlation identifier shared by a begin and its matching end
    pub fn correlation_id(&self) -> Option<&str> {
        self.payload.get("correlationId").and_then(|v| v.as_str())
    }

    /// Decode the payload into its typed shape
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, PayloadError> {
        if self.payload.is_null() {
            return Err(PayloadError::MissingField {
                message_id: self.id.clone(),
                message_type: self.primary_type().to_string(),
                field: "payload",
            });
        }
        serde_json::from_value(self.payload.clone()).map_err(|source| PayloadError::Invalid {
            message_id: self.id.clone(),
            message_type: self.primary_type().to_string(),
            source,
        })
    }

    /// Decode the payload, reporting failures to the diagnostics sink
    pub fn decode_or_report<T: DeserializeOwned>(
        &self,
        diagnostics: &dyn DiagnosticsSink,
    ) -> Option<T> {
        match self.decode() {
            Ok(payload) => Some(payload),
            Err(err) => {
                diagnostics.report(&err);
                None
            }
        }
    }

    /// Correlation identifier, reporting its absence to the diagnostics sink
    pub fn correlation_id_or_report(&self, diagnostics: &dyn DiagnosticsSink) -> Option<&str> {
        let id = self.correlation_id();
        if id.is_none() {
            diagnostics.report(&PayloadError::MissingField {
                message_id: self.id.clone(),
                message_type: self.primary_type().to_string(),
                field: "correlationId",
            });
        }
        id
    }
}

/// Agent block of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AgentInfo {
    /// Which agent produced the message
    #[serde(default)]
    pub source: Agent,
}

/// Originating instrumentation agent, each with its own clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Agent {
    Server,
    Browser,
    #[default]
    #[serde(other)]
    Other,
}

impl Agent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Agent::Server => "server",
            Agent::Browser => "browser",
            Agent::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "server" => Some(Agent::Server),
            "browser" => Some(Agent::Browser),
            "other" => Some(Agent::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to the request context a message belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextRef {
    pub id: String,
}

/// Message type tags understood by the reconstruction stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    // HTTP request/response
    WebRequest,
    WebResponse,
    // Middleware
    MiddlewareStart,
    MiddlewareEnd,
    // Service exchanges
    DataHttpRequest,
    DataHttpResponse,
    // Data store
    DataStoreBegin,
    DataStoreEnd,
    // Browser
    BrowserNavigationTiming,
    // Logs
    LogWrite,
    LogGroupBegin,
    LogGroupEnd,
    LogTimestamp,
    LogTimeBegin,
    LogTimeEnd,
}

impl MessageType {
    pub const ALL: [MessageType; 15] = [
        MessageType::WebRequest,
        MessageType::WebResponse,
        MessageType::MiddlewareStart,
        MessageType::MiddlewareEnd,
        MessageType::DataHttpRequest,
        MessageType::DataHttpResponse,
        MessageType::DataStoreBegin,
        MessageType::DataStoreEnd,
        MessageType::BrowserNavigationTiming,
        MessageType::LogWrite,
        MessageType::LogGroupBegin,
        MessageType::LogGroupEnd,
        MessageType::LogTimestamp,
        MessageType::LogTimeBegin,
        MessageType::LogTimeEnd,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::WebRequest => "web-request",
            MessageType::WebResponse => "web-response",
            MessageType::MiddlewareStart => "middleware-start",
            MessageType::MiddlewareEnd => "middleware-end",
            MessageType::DataHttpRequest => "data-http-request",
            MessageType::DataHttpResponse => "data-http-response",
            MessageType::DataStoreBegin => "data-store-begin",
            MessageType::DataStoreEnd => "data-store-end",
            MessageType::BrowserNavigationTiming => "browser-navigation-timing",
            MessageType::LogWrite => "log-write",
            MessageType::LogGroupBegin => "log-group-begin",
            MessageType::LogGroupEnd => "log-group-end",
            MessageType::LogTimestamp => "log-timestamp",
            MessageType::LogTimeBegin => "log-time-begin",
            MessageType::LogTimeEnd => "log-time-end",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == s)
    }

    /// Whether messages of this type belong to the log stream
    pub fn is_log(&self) -> bool {
        matches!(
            self,
            MessageType::LogWrite
                | MessageType::LogGroupBegin
                | MessageType::LogGroupEnd
                | MessageType::LogTimestamp
                | MessageType::LogTimeBegin
                | MessageType::LogTimeEnd
        )
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
