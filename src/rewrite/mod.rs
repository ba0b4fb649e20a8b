//! Body rewriting subsystem.
//!
//! # Data Flow
//! ```text
//! HTML body
//!     → urls.rs      (literal origin substitution, idempotent)
//!     → document.rs  (lol_html: oncontextmenu, viewport, injection,
//!                     table labels via tables.rs)
//!     → rewritten HTML
//!
//! JS / CSS / JSON body
//!     → urls.rs only
//! ```
//!
//! # Design Decisions
//! - Bulk URL retargeting is a byte-level substitution, not a parse
//! - Anything that depends on document structure goes through the streaming
//!   rewriter instead of regexes
//! - A document the streaming pass rejects is still served, URL-rewritten

pub mod document;
pub mod tables;
pub mod urls;

pub use document::{DocumentShape, InjectionPayload};
pub use urls::UrlRewriter;

use crate::assets;
use crate::observability::metrics;
use crate::target::UpstreamTarget;

/// Applies every body transformation for one `UpstreamTarget`.
#[derive(Debug, Clone)]
pub struct BodyRewriter {
    urls: UrlRewriter,
    payload: InjectionPayload,
}

impl BodyRewriter {
    /// Rewriter injecting the bundled stylesheet and frameset helper script.
    pub fn new(target: &UpstreamTarget) -> Result<Self, regex::Error> {
        Self::with_payload(
            target,
            InjectionPayload::new(&assets::combined_css(), assets::INJECTED_JS),
        )
    }

    pub fn with_payload(
        target: &UpstreamTarget,
        payload: InjectionPayload,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            urls: UrlRewriter::new(target)?,
            payload,
        })
    }

    pub fn urls(&self) -> &UrlRewriter {
        &self.urls
    }

    /// Full HTML treatment. Apply at most once per response.
    pub fn rewrite_html(&self, body: &[u8]) -> Vec<u8> {
        let substituted = self.urls.substitute(body);
        match document::edit(&substituted, &self.payload) {
            Ok(edit) => {
                metrics::record_rewrite("html");
                if edit.labelled_cells > 0 {
                    metrics::record_rewrite("table");
                }
                tracing::debug!(
                    frameset = edit.shape.has_frameset,
                    has_head = edit.shape.has_head,
                    labelled_cells = edit.labelled_cells,
                    before = body.len(),
                    after = edit.html.len(),
                    "HTML rewritten"
                );
                edit.html
            }
            Err(e) => {
                tracing::warn!(error = %e, "HTML rewrite failed, serving URL-substituted body");
                metrics::record_rewrite("html_fallback");
                substituted.into_owned()
            }
        }
    }

    /// URL substitution only, for JavaScript, CSS and JSON.
    pub fn rewrite_text(&self, body: &[u8]) -> Vec<u8> {
        metrics::record_rewrite("text");
        self.urls.substitute(body).into_owned()
    }

    /// URL substitution for a single header value.
    pub fn rewrite_header(&self, value: &str) -> String {
        self.urls.substitute_str(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn rewriter() -> BodyRewriter {
        let target = UpstreamTarget::new(
            Url::parse("https://my.utaipei.edu.tw").unwrap(),
            Url::parse("http://127.0.0.1:8080").unwrap(),
        )
        .with_loopback_prefix("/utaipei");
        BodyRewriter::with_payload(&target, InjectionPayload::new("/*css*/", "/*js*/")).unwrap()
    }

    #[test]
    fn test_upstream_origin_fully_replaced() {
        let html = "<html><head></head><body>\
            <a href=\"https://my.utaipei.edu.tw/a\">a</a>\
            <form action='https://my.utaipei.edu.tw/b'></form>\
            <script>window.location=\"https://my.utaipei.edu.tw/c\";</script>\
            </body></html>";
        let out = String::from_utf8(rewriter().rewrite_html(html.as_bytes())).unwrap();
        assert_eq!(out.matches("my.utaipei.edu.tw").count(), 0);
        assert!(out.matches("http://127.0.0.1:8080").count() >= 3);
    }

    #[test]
    fn test_text_rewrite_skips_injection() {
        let js = b"var u = 'https://my.utaipei.edu.tw/x';";
        let out = String::from_utf8(rewriter().rewrite_text(js)).unwrap();
        assert_eq!(out, "var u = 'http://127.0.0.1:8080/x';");
    }

    #[test]
    fn test_header_rewrite() {
        assert_eq!(
            rewriter().rewrite_header("0; URL=https://my.utaipei.edu.tw/utaipei/index.jsp"),
            "0; URL=http://127.0.0.1:8080/utaipei/index.jsp"
        );
    }
}
