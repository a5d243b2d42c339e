//! Histweave Engine
//!
//! Turns many repositories into one time-ordered event stream:
//!
//! ```text
//! repo A ── extract ── normalize ──┐
//! repo B ── extract ── normalize ──┼── merge ── output pipe
//! repo C ── extract ── normalize ──┘
//!          (one task per repository)
//! ```
//!
//! - **extract:** run the version-control and log-export tools into a raw log
//! - **normalize:** prefix paths with the repository label, consolidate old history
//! - **merge:** global string-order sort plus optional root markers
//! - **coordinator:** fan-out/fan-in with fail-fast error handling

pub mod coordinator;
pub mod extract;
pub mod merge;
pub mod normalize;

pub use coordinator::*;
pub use extract::*;
pub use merge::*;
pub use normalize::*;
