//! Reaction log parsing, participant reconstruction and caching.
//!
//! # Overview
//!
//! - **Log parsing** (`parse`): raw `frame time x y z type` lines
//! - **Reconstruction** (`reconstruct`): reactant/partner/product ids from
//!   frame-to-frame id differences
//! - **Cache** (`cache`): reconstructed tables keyed by input content
//! - **Timeline** (`timeline`): per-frame lookup for playback

mod cache;
mod parse;
mod reconstruct;
mod timeline;

pub use cache::{CACHE_VERSION, CacheKey, CacheStatus, KeyParams, ReactionCache};
pub use parse::{load_reaction_log, parse_reaction_log};
pub use reconstruct::{Diagnostic, ReactionReconstructor, Reconstruction, Role};
pub use timeline::ReactionTimeline;
