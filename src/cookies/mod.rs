//! Cookie handling subsystem.
//!
//! # Data Flow
//! ```text
//! upstream hop ──Set-Cookie──→ jar.rs (SharedCookieJar, replayed on later hops)
//!        │
//!        └──Set-Cookie of the final response
//!             → translate.rs (CookieTranslator, asks policy.rs about auth)
//!             → 1 or 2 outbound Set-Cookie headers
//! ```
//!
//! # Design Decisions
//! - The jar and the translator never talk to each other; the jar speaks to
//!   the upstream, the translator speaks to the browser
//! - Auth detection is an injected `AuthCookiePolicy`

pub mod jar;
pub mod policy;
pub mod translate;

pub use jar::SharedCookieJar;
pub use policy::{AuthCookiePolicy, KeywordAuthPolicy};
pub use translate::{
    same_site_for, CookieAttributeSet, CookieMode, CookieTranslator, SameSite, TranslatedCookie,
};
