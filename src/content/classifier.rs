//! Response classification.
//!
//! # Responsibilities
//! - Decide whether a body is HTML, binary/static, or rewritable text
//! - Correct mislabelled font responses by sniffing magic bytes
//! - Keep API-style endpoints out of HTML injection
//!
//! # Design Decisions
//! - Substring checks on a lowercased Content-Type; parameters are ignored
//! - Text types (JS/CSS/JSON) win over the static-extension rule
//! - Verdicts are recomputed for every response, never cached

const FONT_EXTENSIONS: &[&str] = &[".ttf", ".woff", ".woff2", ".otf", ".eot"];

const STATIC_EXTENSIONS: &[&str] = &[
    ".ttf", ".otf", ".woff", ".woff2", ".eot", ".svg", ".png", ".jpg", ".jpeg", ".gif", ".ico",
    ".webp", ".css", ".js",
];

const BINARY_TYPE_MARKERS: &[&str] = &[
    "font",
    "image",
    "video",
    "audio",
    "application/octet-stream",
    "application/pdf",
];

const TEXT_TYPE_MARKERS: &[&str] = &["javascript", "css", "json"];

const WOFF_MAGIC: &[u8] = b"wOFF";
const WOFF2_MAGIC: &[u8] = b"wOF2";
const SFNT_MAGIC: &[u8] = &[0x00, 0x01, 0x00, 0x00];

/// How a response body must be treated.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContentVerdict {
    pub is_html: bool,
    pub is_binary: bool,
    pub is_text_rewritable: bool,
    /// Set when the upstream Content-Type was wrong for a sniffed font.
    pub corrected_content_type: Option<&'static str>,
}

impl ContentVerdict {
    /// HTML that may receive injected markup at `path`.
    pub fn should_inject(&self, path: &str) -> bool {
        self.is_html && !self.is_binary && !is_injection_excluded(path)
    }
}

/// Classify a response from its Content-Type, the request path and the body.
pub fn classify(content_type: &str, path: &str, body: &[u8]) -> ContentVerdict {
    let content_type = content_type.to_ascii_lowercase();
    let path = path.to_ascii_lowercase();
    let mut verdict = ContentVerdict::default();

    if has_extension(&path, FONT_EXTENSIONS) && !content_type.contains("font") {
        if let Some(corrected) = sniff_font(&path, body) {
            verdict.corrected_content_type = Some(corrected);
            verdict.is_binary = true;
        }
    }

    if BINARY_TYPE_MARKERS.iter().any(|m| content_type.contains(m))
        || has_extension(&path, STATIC_EXTENSIONS)
        || path.contains("/font")
    {
        verdict.is_binary = true;
    }

    if TEXT_TYPE_MARKERS.iter().any(|m| content_type.contains(m)) {
        verdict.is_binary = false;
        verdict.is_text_rewritable = true;
    }

    verdict.is_html = content_type.contains("text/html") && !verdict.is_binary;
    verdict
}

/// Paths whose HTML responses are API payloads and must not receive markup.
pub fn is_injection_excluded(path: &str) -> bool {
    let path = path.to_ascii_lowercase();
    path.ends_with("/favorite.jsp")
        || path.contains("_api.jsp")
        || path.contains("/api/")
        || path.contains("api.jsp")
}

/// Content-Type for a font path, by extension.
pub fn font_content_type(path: &str) -> Option<&'static str> {
    let path = path.to_ascii_lowercase();
    if path.ends_with(".ttf") {
        Some("font/ttf")
    } else if path.ends_with(".woff2") {
        Some("font/woff2")
    } else if path.ends_with(".woff") {
        Some("font/woff")
    } else if path.ends_with(".eot") {
        Some("application/vnd.ms-fontobject")
    } else if path.ends_with(".otf") {
        Some("font/otf")
    } else {
        None
    }
}

fn sniff_font(path: &str, body: &[u8]) -> Option<&'static str> {
    if body.starts_with(WOFF_MAGIC) || body.starts_with(WOFF2_MAGIC) {
        if path.ends_with(".woff2") {
            Some("font/woff2")
        } else {
            Some("font/woff")
        }
    } else if body.starts_with(SFNT_MAGIC) {
        Some("font/ttf")
    } else {
        None
    }
}

fn has_extension(path: &str, extensions: &[&str]) -> bool {
    extensions.iter().any(|ext| path.ends_with(ext))
}
