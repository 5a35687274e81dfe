//! Causal forest for the convergent fact-record merge engine.
//!
//! Operations link to the operation they causally follow through their
//! `base`. The forest indexes those links (roots and a parent → children
//! index) and yields the canonical depth-first order the merge engine
//! replays. Supports incremental construction, duplicate suppression, and
//! detection of operations still waiting for their base.

pub mod error;
pub mod forest;
pub mod node;

pub use error::{ForestError, ForestResult};
pub use forest::CausalForest;
pub use node::ForestNode;
