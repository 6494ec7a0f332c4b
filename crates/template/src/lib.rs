//! Template rendering for Talaria.
//!
//! The renderer is deliberately restricted: path lookup, conditionals, and
//! a whitelist of helper filters over a sandboxed, fuel-limited `MiniJinja`
//! environment. It is side-effect-free and never fails -- malformed input
//! degrades to the unrendered template.

pub mod engine;
pub mod flatten;

pub use engine::TemplateEngine;
pub use flatten::flatten_context;
