//! Demo message generator
//!
//! Generates a realistic request context (navigation timing, request/response,
//! nested middleware, data and service calls, grouped logs) for trying the
//! views without a live transport, and for tests.

use crate::messages::{Agent, Message, MessageType};
use serde_json::json;
use tracing::info;

/// Configuration for demo generation
#[derive(Debug, Clone)]
pub struct DemoConfig {
    /// Context id stamped on every message
    pub context_id: String,

    /// Request path
    pub url: String,

    /// Number of data store operations inside the handler
    pub data_operations: usize,

    /// Browser time between navigation start and request send, in ms
    pub request_delay_ms: f64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            context_id: ulid::Ulid::new().to_string(),
            url: "/orders/42".to_string(),
            data_operations: 3,
            request_delay_ms: 30.0,
        }
    }
}

/// Builds one synthetic request context
pub struct DemoGenerator {
    config: DemoConfig,
    messages: Vec<Message>,
}

impl DemoGenerator {
    pub fn new() -> Self {
        Self::with_config(DemoConfig::default())
    }

    pub fn with_config(config: DemoConfig) -> Self {
        Self {
            config,
            messages: Vec::new(),
        }
    }

    /// Generate the full context, ordered by ordinal
    pub fn generate(mut self) -> Vec<Message> {
        self.server_side();
        self.browser_side();
        info!(
            "Generated {} demo messages for context {}",
            self.messages.len(),
            self.config.context_id
        );
        self.messages
    }

    fn push(&mut self, offset: f64, agent: Agent, message_type: MessageType, payload: serde_json::Value) {
        let ordinal = self.messages.len() as u64 + 1;
        let message = Message::new(
            ulid::Ulid::new().to_string(),
            ordinal,
            offset,
            agent,
            message_type,
        )
        .with_payload(payload)
        .with_context(self.config.context_id.clone());
        self.messages.push(message);
    }

    fn server_side(&mut self) {
        let url = self.config.url.clone();
        self.push(
            0.0,
            Agent::Server,
            MessageType::WebRequest,
            json!({ "url": url, "method": "GET" }),
        );

        self.push(
            1.0,
            Agent::Server,
            MessageType::MiddlewareStart,
            json!({ "correlationId": "mw-1", "name": "logger", "packageName": "morgan" }),
        );
        self.push(
            2.0,
            Agent::Server,
            MessageType::MiddlewareStart,
            json!({ "correlationId": "mw-2", "name": "session", "packageName": "express-session" }),
        );
        self.push(
            6.0,
            Agent::Server,
            MessageType::MiddlewareEnd,
            json!({ "correlationId": "mw-2", "name": "session" }),
        );
        self.push(
            7.0,
            Agent::Server,
            MessageType::MiddlewareStart,
            json!({ "correlationId": "mw-3", "name": "ordersRouter", "packageName": "express" }),
        );

        self.push(
            8.0,
            Agent::Server,
            MessageType::LogGroupBegin,
            json!({ "correlationId": "grp-1", "label": "load order" }),
        );
        self.push(
            8.5,
            Agent::Server,
            MessageType::LogTimeBegin,
            json!({ "correlationId": "tm-1", "label": "db" }),
        );

        let mut offset = 9.0;
        for i in 0..self.config.data_operations {
            let correlation_id = format!("ds-{}", i + 1);
            let duration = 4.0 + (i as f64) * 3.0;
            self.push(
                offset,
                Agent::Server,
                MessageType::DataStoreBegin,
                json!({
                    "correlationId": correlation_id,
                    "store": "mongodb",
                    "operation": "find",
                    "target": "orders"
                }),
            );
            self.push(
                offset + duration,
                Agent::Server,
                MessageType::DataStoreEnd,
                json!({ "correlationId": correlation_id, "recordCount": i + 1 }),
            );
            offset += duration + 1.0;
        }

        self.push(
            offset,
            Agent::Server,
            MessageType::LogTimeEnd,
            json!({ "correlationId": "tm-1", "label": "db" }),
        );
        self.push(
            offset + 0.5,
            Agent::Server,
            MessageType::LogWrite,
            json!({
                "level": "info",
                "message": "order rows",
                "table": [{ "id": 42, "total": 19.99 }]
            }),
        );
        self.push(
            offset + 1.0,
            Agent::Server,
            MessageType::LogGroupEnd,
            json!({ "correlationId": "grp-1" }),
        );

        self.push(
            offset + 2.0,
            Agent::Server,
            MessageType::DataHttpRequest,
            json!({ "correlationId": "http-1", "url": "https://inventory.local/stock/42", "method": "GET" }),
        );
        self.push(
            offset + 14.0,
            Agent::Server,
            MessageType::DataHttpResponse,
            json!({ "correlationId": "http-1", "statusCode": 200 }),
        );
        self.push(
            offset + 15.0,
            Agent::Server,
            MessageType::LogTimestamp,
            json!({ "label": "render" }),
        );
        self.push(
            offset + 18.0,
            Agent::Server,
            MessageType::MiddlewareEnd,
            json!({ "correlationId": "mw-3", "name": "ordersRouter" }),
        );
        self.push(
            offset + 19.0,
            Agent::Server,
            MessageType::MiddlewareEnd,
            json!({ "correlationId": "mw-1", "name": "logger" }),
        );
        self.push(
            offset + 20.0,
            Agent::Server,
            MessageType::WebResponse,
            json!({
                "statusCode": 200,
                "timing": { "requestStart": 0.0, "responseEnd": offset + 20.0 }
            }),
        );
    }

    fn browser_side(&mut self) {
        let delay = self.config.request_delay_ms;
        let server_total = self
            .messages
            .last()
            .map(|m| m.offset)
            .unwrap_or_default();
        let navigation_start = 1_000.0;
        let request_start = navigation_start + delay;
        let response_start = request_start + server_total;

        self.push(
            0.0,
            Agent::Browser,
            MessageType::BrowserNavigationTiming,
            json!({
                "navigationStart": navigation_start,
                "fetchStart": navigation_start + 2.0,
                "domainLookupStart": navigation_start + 4.0,
                "domainLookupEnd": navigation_start + 10.0,
                "connectStart": navigation_start + 10.0,
                "connectEnd": navigation_start + delay - 2.0,
                "requestStart": request_start,
                "responseStart": response_start,
                "responseEnd": response_start + 5.0,
                "domLoading": response_start + 6.0,
                "domInteractive": response_start + 40.0,
                "domContentLoadedEventStart": response_start + 41.0,
                "domContentLoadedEventEnd": response_start + 44.0,
                "domComplete": response_start + 80.0,
                "loadEventStart": response_start + 81.0,
                "loadEventEnd": response_start + 84.0
            }),
        );

        let page_offset = delay + server_total + 50.0;
        self.push(
            page_offset,
            Agent::Browser,
            MessageType::LogGroupBegin,
            json!({ "correlationId": "grp-2", "label": "hydrate", "isCollapsed": true }),
        );
        self.push(
            page_offset + 1.0,
            Agent::Browser,
            MessageType::LogWrite,
            json!({ "level": "log", "message": "hydrating order view" }),
        );
        self.push(
            page_offset + 2.0,
            Agent::Browser,
            MessageType::LogGroupEnd,
            json!({ "correlationId": "grp-2" }),
        );
        self.push(
            page_offset + 3.0,
            Agent::Browser,
            MessageType::LogWrite,
            json!({ "level": "error", "message": "Uncaught TypeError: price is undefined" }),
        );
    }
}

impl Default for DemoGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{MessageLookup, MessageStore};

    #[test]
    fn test_generated_context_is_well_formed() {
        let config = DemoConfig {
            context_id: "demo".to_string(),
            ..Default::default()
        };
        let messages = DemoGenerator::with_config(config).generate();

        let ordinals: Vec<u64> = messages.iter().map(|m| m.ordinal).collect();
        assert!(ordinals.windows(2).all(|w| w[0] < w[1]));

        let store = MessageStore::from_messages(messages);
        let index = store.context("demo").unwrap();
        assert_eq!(index.messages_by_type("data-store-begin").len(), 3);
        assert_eq!(index.messages_by_type("data-store-end").len(), 3);
        assert_eq!(index.messages_by_type("middleware-start").len(), 3);
        assert!(index
            .single_message_by_type("browser-navigation-timing")
            .is_some());
    }

    #[test]
    fn test_data_operation_count_configurable() {
        let config = DemoConfig {
            data_operations: 0,
            ..Default::default()
        };
        let messages = DemoGenerator::with_config(config).generate();
        assert!(!messages.iter().any(|m| m.has_type("data-store-begin")));
    }
}
