//! Histweave Output Pipe
//!
//! Delivers the merged event stream to its sink with backpressure and an
//! ordered shutdown.
//!
//! # Sinks
//!
//! ```text
//! events ──► stdout | file                          (--no-gource)
//! events ──► gource stdin                           (interactive window)
//! events ──► gource stdin ─► gource stdout ─► ffmpeg stdin ─► output.mp4
//!                             (OS-level pipe)
//! ```
//!
//! Every pipe moves through `Idle → Streaming → Draining → Closed`.

pub mod pipe;
pub mod process;

pub use pipe::*;
pub use process::*;
