//! Messages exchanged with an embedding host
//!
//! Each message is a JSON object tagged by its `type` field, e.g.
//! `{"type": "search-by-zip", "zipCode": "10001"}`.

use serde::{Deserialize, Serialize};

use crate::models::SearchResult;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InboundMessage {
    #[serde(rename_all = "camelCase")]
    SearchByZip { zip_code: String },
}

impl InboundMessage {
    pub fn parse(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OutboundMessage {
    #[serde(rename_all = "camelCase")]
    SearchSystemReady { message: String, data_count: usize },
    #[serde(rename_all = "camelCase")]
    SearchResults {
        zip_code: String,
        count: usize,
        summary: String,
        results: Vec<SearchResult>,
    },
    #[serde(rename_all = "camelCase")]
    SearchError { zip_code: String, message: String },
}

impl OutboundMessage {
    pub fn ready(data_count: usize) -> Self {
        OutboundMessage::SearchSystemReady {
            message: "Search system is ready".to_string(),
            data_count,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
