//! Edge traversal and usage queries.
//!
//! - [`Walk`] / [`foreach_id`]: visit the outgoing edges of an object
//! - [`LinkWalker`]: state handed to per-type enumerators
//! - [`usage`]: who uses whom, and how many times

mod flags;
pub mod usage;
mod walker;

pub use flags::{UsageFlags, WalkControl, WalkFlags};
pub use walker::{foreach_id, foreach_subdata, LinkInfo, LinkWalker, Walk};
