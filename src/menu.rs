//! Menu parsing API (`POST /api/parse-html`).
//!
//! The front-end posts the raw HTML of legacy menu entries; this turns each
//! into a label and, for function entries, the code passed to `of_display`.

use std::sync::LazyLock;

use axum::body::Bytes;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use lol_html::{doc_text, HtmlRewriter, Settings};
use regex::Regex;
use serde::{Deserialize, Serialize};

static OF_DISPLAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"of_display\s*\(\s*['"]([^'"]+)['"]\s*\)"#).expect("valid of_display pattern")
});

#[derive(Debug, Clone, Deserialize)]
pub struct ParseHtmlRequest {
    #[serde(rename = "htmlElements", default)]
    pub html_elements: Vec<HtmlElement>,
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HtmlElement {
    pub html: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MenuItem {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParseHtmlResponse {
    pub items: Vec<MenuItem>,
}

/// Trimmed text nodes of `html`, joined by single spaces.
pub fn extract_text(html: &str) -> String {
    let mut nodes: Vec<String> = Vec::new();
    let mut current = String::new();

    let mut rewriter = HtmlRewriter::new(
        Settings {
            document_content_handlers: vec![doc_text!(|chunk| {
                current.push_str(chunk.as_str());
                if chunk.last_in_text_node() {
                    let text = html_escape::decode_html_entities(current.trim())
                        .trim()
                        .to_string();
                    if !text.is_empty() {
                        nodes.push(text);
                    }
                    current.clear();
                }
                Ok(())
            })],
            ..Settings::default()
        },
        |_: &[u8]| {},
    );

    let parsed = rewriter.write(html.as_bytes()).and_then(|()| rewriter.end());
    if let Err(e) = parsed {
        tracing::debug!(error = %e, "Menu fragment could not be parsed");
    }
    nodes.join(" ")
}

/// First argument of an `of_display('...')` call in `html`.
pub fn extract_code(html: &str) -> Option<String> {
    OF_DISPLAY
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn parse_items(request: &ParseHtmlRequest) -> Vec<MenuItem> {
    let is_function = request.kind == "function";
    request
        .html_elements
        .iter()
        .filter_map(|element| {
            let text = extract_text(&element.html);
            let code = if is_function {
                extract_code(&element.html)
            } else {
                None
            };
            let keep = !text.is_empty() && (request.kind == "category" || code.is_some());
            keep.then(|| MenuItem {
                text,
                code,
                kind: request.kind.clone(),
            })
        })
        .collect()
}

pub async fn parse_html_handler(body: Bytes) -> Response {
    let request: ParseHtmlRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected parse-html request");
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": "invalid request body" })),
            )
                .into_response();
        }
    };

    let items = parse_items(&request);
    tracing::debug!(
        kind = %request.kind,
        elements = request.html_elements.len(),
        items = items.len(),
        "Menu fragments parsed"
    );
    Json(ParseHtmlResponse { items }).into_response()
}
