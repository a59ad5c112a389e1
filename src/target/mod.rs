//! Target handling: normalization, template-marker guards, and crawl scoping
//!
//! A "target" is a normalized, fetchable location identifier. Everything the
//! crawler queues, visits, or records passes through [`normalize_target`]
//! first so that equality checks (visited set, queue dedup, canonical keys)
//! compare like with like.

pub mod normalize;
pub mod scope;

pub use normalize::{has_template_marker, normalize_target};
pub use scope::CrawlScope;
