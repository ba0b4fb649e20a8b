//! Content classification subsystem.
//!
//! # Data Flow
//! ```text
//! upstream Content-Type + request path + first body bytes
//!     → classifier.rs
//!     → ContentVerdict { is_html, is_binary, is_text_rewritable, corrected type }
//!     → ResponseAssembler picks: HTML rewrite | text URL rewrite | passthrough
//! ```

pub mod classifier;

pub use classifier::{classify, font_content_type, is_injection_excluded, ContentVerdict};
