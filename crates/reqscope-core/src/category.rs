//! Timeline event categories

use serde::{Deserialize, Serialize};

/// What kind of activity a timeline event represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// The HTTP request/response itself
    Request,
    /// Server middleware execution
    Middleware,
    /// Outbound service exchanges
    WebService,
    /// Data store operations
    DataStore,
    /// Browser page load phases
    PageLoad,
    /// Debug timers, timestamps and console errors
    Log,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Request,
        Category::Middleware,
        Category::WebService,
        Category::DataStore,
        Category::PageLoad,
        Category::Log,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Request => "request",
            Category::Middleware => "middleware",
            Category::WebService => "web_service",
            Category::DataStore => "data_store",
            Category::PageLoad => "page_load",
            Category::Log => "log",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.to_lowercase().replace('-', "_");
        Self::ALL.iter().copied().find(|c| c.as_str() == normalized)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_dashes_and_case() {
        assert_eq!(Category::parse("Data-Store"), Some(Category::DataStore));
        assert_eq!(Category::parse("page_load"), Some(Category::PageLoad));
        assert_eq!(Category::parse("styles"), None);
    }
}
