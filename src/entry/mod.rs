//! MRPE entry model and parsers
//!
//! Turns configuration directives and include-file lines into [`CheckEntry`]
//! values. Parse failures are returned as [`crate::error::MrpeError`] and the
//! callers log and drop the offending line.

mod check;
mod directive;
mod include;
mod tokenize;

pub use check::{CachingPolicy, CheckEntry};
pub use directive::{parse_directive_line, Directive, IncludeDirective};
pub use include::{is_valid_regular_file, parse_include_file};
pub use tokenize::{remove_quotes, tokenize};
