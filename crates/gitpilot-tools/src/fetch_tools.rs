use std::sync::Arc;

use async_trait::async_trait;
use gitpilot_agent_core::{AgentTool, ToolExecutionResult};
use gitpilot_ai::ToolDefinition;
use gitpilot_fetch::{ContentFetcher, FetchMode};
use serde_json::{json, Value};

use crate::{
    args::{optional_string, optional_usize, required_non_empty_string},
    envelope::{finish, ToolFailure},
};

const MAX_CONTENT_CHARS: usize = 1_000_000;

pub struct FetchUrlContentTool {
    fetcher: Arc<ContentFetcher>,
}

impl FetchUrlContentTool {
    pub fn new(fetcher: Arc<ContentFetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl AgentTool for FetchUrlContentTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "fetch_url_content".to_string(),
            description: "Fetch a web page and return its HTML markup or its visible text."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "url": { "type": "string", "description": "Absolute http(s) URL" },
                    "content_type": {
                        "type": "string",
                        "enum": ["html", "text"],
                        "description": "html for markup, text for visible text (default)"
                    },
                    "max_length": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Truncate the result to this many characters"
                    }
                },
                "required": ["url"],
                "additionalProperties": false
            }),
        }
    }

    async fn execute(&self, arguments: Value) -> ToolExecutionResult {
        let outcome = async {
            let url = required_non_empty_string(&arguments, "url")?;
            let mode = match optional_string(&arguments, "content_type")? {
                Some(raw) => FetchMode::parse(&raw).map_err(|error| ToolFailure::fetch(&url, &error))?,
                None => FetchMode::default(),
            };
            let max_length = optional_usize(&arguments, "max_length", MAX_CONTENT_CHARS)?;
            let content = self
                .fetcher
                .fetch(&url, mode, max_length)
                .await
                .map_err(|error| ToolFailure::fetch(&url, &error))?;
            Ok::<_, ToolFailure>(json!(content))
        }
        .await;
        finish("fetch_url_content", outcome)
    }
}

pub struct FetchImageUrlsTool {
    fetcher: Arc<ContentFetcher>,
}

impl FetchImageUrlsTool {
    pub fn new(fetcher: Arc<ContentFetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl AgentTool for FetchImageUrlsTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "fetch_image_urls".to_string(),
            description: "Fetch a web page and list the src attribute of every <img> tag, as written."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "url": { "type": "string", "description": "Absolute http(s) URL" }
                },
                "required": ["url"],
                "additionalProperties": false
            }),
        }
    }

    async fn execute(&self, arguments: Value) -> ToolExecutionResult {
        let outcome = async {
            let url = required_non_empty_string(&arguments, "url")?;
            let images = self
                .fetcher
                .extract_image_urls(&url)
                .await
                .map_err(|error| ToolFailure::fetch(&url, &error))?;
            Ok::<_, ToolFailure>(json!(images))
        }
        .await;
        finish("fetch_image_urls", outcome)
    }
}
