//! Response cache keyed by a content hash of the request.
//!
//! Entries have no age-based expiry; the store is bounded by capacity only.

use moka::future::Cache;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::domain::models::{ModelRequest, ModelResponse};

/// Deterministic SHA-256 key over model, messages and tool schemas.
///
/// Sampling parameters are not part of the key. Tool schemas are sorted by
/// name and every JSON object is emitted with sorted keys, so the key does
/// not depend on registration order.
pub fn cache_key(request: &ModelRequest) -> String {
    let mut tools: Vec<Value> = request
        .tools
        .iter()
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.description,
                "input_schema": tool.input_schema,
            })
        })
        .collect();
    tools.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));

    let messages = serde_json::to_value(&request.messages).unwrap_or(Value::Null);
    let material = json!({
        "model": request.model,
        "messages": messages,
        "tools": tools,
    });

    let mut canonical = String::new();
    write_canonical(&material, &mut canonical);

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Bounded in-memory response store.
#[derive(Clone)]
pub struct ResponseCache {
    entries: Cache<String, Arc<ModelResponse>>,
}

impl ResponseCache {
    pub fn new(max_entries: u64) -> Self {
        Self {
            entries: Cache::builder().max_capacity(max_entries).build(),
        }
    }

    pub async fn get(&self, key: &str) -> Option<Arc<ModelResponse>> {
        self.entries.get(key).await
    }

    pub async fn insert(&self, key: String, response: ModelResponse) {
        self.entries.insert(key, Arc::new(response)).await;
    }

    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }

    pub fn clear(&self) {
        self.entries.invalidate_all();
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("entry_count", &self.entries.entry_count())
            .finish()
    }
}
