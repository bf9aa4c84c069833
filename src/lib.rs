//! DOM Optimiser - page-builder markup pruning library
//!
//! This library rewrites a complete HTML page to drop structurally redundant
//! markup emitted by the Elementor page builder, without changing how the
//! page renders or breaking the hooks its styles and scripts rely on.
//!
//! # Architecture
//!
//! The library is structured into several modules:
//! - `parser`: HTML5 parsing and serialization using html5ever
//! - `charset`: Character encoding detection and transcoding for byte input
//! - `dom`: Tree primitives (selection, unwrap, detach) over the rcdom tree
//! - `safety`: The predicate gating every unwrap and flatten
//! - `scanner`: Inline script scan for IDs looked up by literal string
//! - `wrappers`, `ghost`, `comments`, `flatten`: the rewrite passes
//! - `optimiser`: Pass orchestration, options, timeout context and report
//! - `ffi`: C-compatible interface for host integration
//!
//! # Example
//!
//! ```rust
//! use dom_optimiser::DomOptimiser;
//!
//! let page = "<!DOCTYPE html><html><head><title>Landing page</title></head><body>\
//!             <div class=\"elementor-widget-container\"><h1>Welcome</h1></div>\
//!             </body></html>";
//! let html = DomOptimiser::new().process_or_passthrough(page);
//! assert!(html.contains("<body><h1>Welcome</h1></body>"));
//! ```
//!
//! # Safety
//!
//! All FFI functions are marked `unsafe` and document their pointer
//! contracts. Memory allocated by Rust must be freed by Rust via the
//! provided cleanup functions.

pub mod charset;
pub mod comments;
pub mod dom;
pub mod error;
pub mod ffi;
pub mod flatten;
pub mod ghost;
pub mod optimiser;
pub mod parser;
pub mod safety;
pub mod scanner;
pub mod wrappers;

pub use error::OptimiseError;
pub use ffi::{DomOptimiserOptions, DomOptimiserResult};
pub use optimiser::{
    DomOptimiser, OptimiseContext, OptimiseOutput, OptimiseReport, OptimiserOptions, Pass,
    SkipReason,
};
pub use parser::{parse_document_str, parse_html, serialize_document};
pub use safety::{PruneGuard, PruneVerdict};
