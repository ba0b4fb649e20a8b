//! HTTP edge subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs   (Axum router, request ID + trace layers)
//!         ├─ GET /                 → 302 entry document
//!         ├─ /assets/img, /font    → ServeDir (long cache)
//!         ├─ POST /api/parse-html  → menu
//!         └─ relay prefixes
//!               → request.rs  (buffer body, strip alias prefix)
//!               → forward     (upstream hops)
//!               → response.rs (classify, rewrite, cookies, CORS, status)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeRequestUuid, RelayRoute, X_REQUEST_ID};
pub use response::{InboundContext, ResponseAssembler};
pub use server::{AppState, HttpServer, ServerError};
