//! Document source: fetch a page's metadata and blocks from the Notion API.
//!
//! [`DocumentSource`] is the seam the exporter depends on; [`NotionClient`]
//! is the HTTP implementation. Decoding from the API's JSON into the typed
//! model lives in free functions so it can be tested without a server.
//!
//! Decoding never fails on content: unknown or malformed properties become
//! [`Property::Unrecognized`], unknown blocks and images without a URL
//! become [`Block::Unrecognized`], and text blocks missing their text keep
//! their kind with a placeholder run. Only a response that is not the expected
//! envelope at all (`results` missing, non-JSON body) is an error.

use crate::config::ExportConfig;
use crate::error::ExportError;
use crate::model::{plain_text, Block, Property, TextRun};
use crate::pipeline::blocks::NO_CONTENT;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Maximum page size the blocks endpoint accepts.
const PAGE_SIZE: u32 = 100;

/// Title used when the page metadata could not be fetched.
pub const PLACEHOLDER_TITLE: &str = "(untitled)";

/// Page title plus its non-title properties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageMeta {
    pub title: String,
    pub properties: Vec<(String, Property)>,
}

impl PageMeta {
    pub fn placeholder() -> Self {
        Self {
            title: PLACEHOLDER_TITLE.to_string(),
            properties: Vec::new(),
        }
    }
}

/// Supplies page metadata and the ordered top-level block list.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn page_meta(&self, page_id: &str) -> Result<PageMeta, ExportError>;

    /// All top-level blocks, following pagination to the end.
    async fn list_blocks(&self, page_id: &str) -> Result<Vec<Block>, ExportError>;
}

/// [`DocumentSource`] backed by the Notion REST API.
#[derive(Debug, Clone)]
pub struct NotionClient {
    client: reqwest::Client,
    api_base: String,
    token: String,
    notion_version: String,
    timeout_secs: u64,
}

impl NotionClient {
    pub fn new(config: &ExportConfig) -> Result<Self, ExportError> {
        let token = config
            .token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ExportError::MissingToken)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| ExportError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token,
            notion_version: config.notion_version.clone(),
            timeout_secs: config.api_timeout_secs,
        })
    }

    async fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
        page_id: &str,
    ) -> Result<Value, ExportError> {
        debug!("GET {} {:?}", url, query);

        let response = self
            .client
            .get(url)
            .query(query)
            .bearer_auth(&self.token)
            .header("Notion-Version", &self.notion_version)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ExportError::Timeout {
                        url: url.to_string(),
                        secs: self.timeout_secs,
                    }
                } else {
                    ExportError::Transport {
                        url: url.to_string(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or(body);
            return Err(match status {
                StatusCode::NOT_FOUND => ExportError::PageNotFound {
                    page_id: page_id.to_string(),
                },
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    ExportError::Unauthorized { detail: message }
                }
                _ => ExportError::Api {
                    status: status.as_u16(),
                    message,
                },
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ExportError::InvalidResponse {
                url: url.to_string(),
                detail: e.to_string(),
            })
    }
}

#[async_trait]
impl DocumentSource for NotionClient {
    async fn page_meta(&self, page_id: &str) -> Result<PageMeta, ExportError> {
        info!("Fetching page metadata: {}", page_id);
        let url = format!("{}/pages/{}", self.api_base, page_id);
        let page = self.get_json(&url, &[], page_id).await?;
        let meta = decode_page(&page);
        debug!("Page title: {:?}", meta.title);
        Ok(meta)
    }

    async fn list_blocks(&self, page_id: &str) -> Result<Vec<Block>, ExportError> {
        info!("Fetching blocks: {}", page_id);
        let url = format!("{}/blocks/{}/children", self.api_base, page_id);
        let mut blocks = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut query = vec![("page_size", PAGE_SIZE.to_string())];
            if let Some(ref c) = cursor {
                query.push(("start_cursor", c.clone()));
            }

            let body = self.get_json(&url, &query, page_id).await?;
            let results = body
                .get("results")
                .and_then(Value::as_array)
                .ok_or_else(|| ExportError::InvalidResponse {
                    url: url.clone(),
                    detail: "missing 'results' array".into(),
                })?;
            blocks.extend(results.iter().map(decode_block));

            if !body.get("has_more").and_then(Value::as_bool).unwrap_or(false) {
                break;
            }
            match body.get("next_cursor").and_then(Value::as_str) {
                Some(next) => cursor = Some(next.to_string()),
                None => {
                    warn!("Response reported more blocks but gave no cursor; stopping");
                    break;
                }
            }
        }

        info!("Fetched {} blocks", blocks.len());
        Ok(blocks)
    }
}

/// Accept a bare id, a dashed UUID, or a page URL; return the id part.
///
/// Page URLs end in `…-{32 hex chars}` (optionally followed by a query).
pub fn normalize_page_id(input: &str) -> String {
    let trimmed = input.trim();
    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        return trimmed.to_string();
    }
    let path = trimmed
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim_end_matches('/');
    let last = path.rsplit('/').next().unwrap_or_default();
    let candidate = last.rsplit('-').next().unwrap_or_default();
    if candidate.len() == 32 && candidate.chars().all(|c| c.is_ascii_hexdigit()) {
        candidate.to_string()
    } else {
        trimmed.to_string()
    }
}

// ── Decoding ─────────────────────────────────────────────────────────────

/// Decode a page object into its title and remaining properties.
pub fn decode_page(page: &Value) -> PageMeta {
    let mut meta = PageMeta::default();
    let Some(properties) = page.get("properties").and_then(Value::as_object) else {
        return meta;
    };

    for (name, value) in properties {
        if value.get("type").and_then(Value::as_str) == Some("title") {
            let runs = value
                .get("title")
                .map(decode_rich_text)
                .and_then(Result::ok)
                .unwrap_or_default();
            meta.title = plain_text(&runs);
        } else {
            meta.properties.push((name.clone(), decode_property(value)));
        }
    }
    meta
}

/// Decode one property value.
pub fn decode_property(value: &Value) -> Property {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    let payload = value.get(kind).unwrap_or(&Value::Null);

    let decoded = match kind {
        "rich_text" => decode_rich_text(payload).map(Property::RichText),
        "select" => nullable(payload, option_name).map(Property::Select),
        "multi_select" => payload
            .as_array()
            .ok_or_else(|| "multi_select is not a list".to_string())
            .and_then(|options| options.iter().map(option_name).collect::<Result<Vec<_>, _>>())
            .map(Property::MultiSelect),
        "date" => nullable(payload, |d| {
            d.get("start")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| "date has no start".to_string())
        })
        .map(Property::Date),
        "number" => nullable(payload, |n| {
            n.as_f64().ok_or_else(|| "number is not numeric".to_string())
        })
        .map(Property::Number),
        "checkbox" => payload
            .as_bool()
            .ok_or_else(|| "checkbox is not a boolean".to_string())
            .map(Property::Checkbox),
        "url" => nullable(payload, string_value).map(Property::Url),
        "email" => nullable(payload, string_value).map(Property::Email),
        "phone_number" => nullable(payload, string_value).map(Property::PhoneNumber),
        other => Err(format!("unsupported property type '{other}'")),
    };

    decoded.unwrap_or_else(|detail| Property::Unrecognized {
        kind: kind.to_string(),
        detail,
    })
}

/// Decode one block object.
pub fn decode_block(value: &Value) -> Block {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    let payload = value.get(&kind);
    let rich_text = payload
        .and_then(|p| p.get("rich_text"))
        .and_then(|r| decode_rich_text(r).ok());

    let unrecognized = |rich_text: Option<Vec<TextRun>>| Block::Unrecognized {
        kind: kind.clone(),
        rich_text,
    };

    match kind.as_str() {
        "divider" => Block::Divider,
        "image" => match payload.and_then(image_url) {
            Some(url) => Block::Image { url },
            None => unrecognized(None),
        },
        "paragraph" | "heading_1" | "heading_2" | "heading_3" | "bulleted_list_item"
        | "numbered_list_item" | "to_do" | "code" | "quote" => {
            // A text kind without a rich_text payload keeps its kind; only the
            // text is replaced.
            let rich_text = rich_text.unwrap_or_else(|| vec![TextRun::new(NO_CONTENT)]);
            match kind.as_str() {
                "paragraph" => Block::Paragraph { rich_text },
                "heading_1" => Block::Heading { level: 1, rich_text },
                "heading_2" => Block::Heading { level: 2, rich_text },
                "heading_3" => Block::Heading { level: 3, rich_text },
                "bulleted_list_item" => Block::BulletItem { rich_text },
                "numbered_list_item" => Block::NumberedItem { rich_text },
                "to_do" => Block::TodoItem {
                    rich_text,
                    checked: payload
                        .and_then(|p| p.get("checked"))
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                },
                "code" => Block::Code {
                    language: payload
                        .and_then(|p| p.get("language"))
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    rich_text,
                },
                _ => Block::Quote { rich_text },
            }
        }
        _ => unrecognized(rich_text),
    }
}

fn decode_rich_text(value: &Value) -> Result<Vec<TextRun>, String> {
    let runs = value
        .as_array()
        .ok_or_else(|| "rich text is not a list".to_string())?;
    Ok(runs
        .iter()
        .map(|run| {
            TextRun::new(
                run.get("plain_text")
                    .and_then(Value::as_str)
                    .unwrap_or_default(),
            )
        })
        .collect())
}

fn image_url(payload: &Value) -> Option<String> {
    let source = payload.get("type").and_then(Value::as_str)?;
    if source != "file" && source != "external" {
        return None;
    }
    payload
        .get(source)
        .and_then(|s| s.get("url"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn nullable<T>(
    value: &Value,
    decode: impl Fn(&Value) -> Result<T, String>,
) -> Result<Option<T>, String> {
    if value.is_null() {
        Ok(None)
    } else {
        decode(value).map(Some)
    }
}

fn option_name(option: &Value) -> Result<String, String> {
    option
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| "option has no name".to_string())
}

fn string_value(value: &Value) -> Result<String, String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| "value is not a string".to_string())
}
