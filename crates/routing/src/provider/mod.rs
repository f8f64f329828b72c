//! Provider-facing traits.
//!
//! Provider HTTP clients and the semantic search index live outside this
//! crate; they plug in through these traits.

mod capabilities;
mod semantic;
mod traits;

pub use capabilities::RateLimit;
pub use semantic::{SemanticHit, SemanticIndex};
pub use traits::{FetchParams, ProviderAdapter};
