//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → logging/metrics → build relay components → bind → serve
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     Broadcast → stop accepting → in-flight relays finish → exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then components, then the listener
//! - Graceful shutdown only; there is no reload

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
