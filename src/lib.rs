//! MRPE: runs legacy check plugins and builds the `<<<mrpe>>>` agent section.

pub mod cache;
pub mod commands;
pub mod config;
pub mod entry;
pub mod error;
pub mod exec;
pub mod markers;
pub mod process;
pub mod provider;

pub use cache::{Clock, LineState, ManualClock, ResultCache, SystemClock};
pub use config::{AgentConfig, MrpeConfig};
pub use entry::{CachingPolicy, CheckEntry, Directive, IncludeDirective};
pub use error::{CacheError, LaunchError, MrpeError};
pub use provider::{MrpeProvider, SECTION_HEADER};
