//! Tracked-post reconciliation engine for the Waymark platform.
//!
//! Identifies, per topic, the first post written by a member of a tracked
//! group and maintains denormalized `{group, post_number}` annotations on
//! the topic and on every tracked post, so readers can jump from any point
//! in a thread to the next tracked post without scanning.
//!
//! The crate splits into four layers, leaf-first:
//!
//! - [`policy`]: the eligibility predicate and tracked-group projections
//! - [`store`]: persistence of the annotation records
//! - [`reconcile`]: the recompute-and-diff cycle that rebuilds annotations
//!   for one topic or the whole corpus
//! - [`dispatch`]: maps forum lifecycle events to reconciliation scopes
//!
//! Annotations are derived state: every run recomputes them from posts,
//! users and groups, writes only actual differences, and is idempotent.

pub mod dispatch;
pub mod error;
pub mod policy;
pub mod reconcile;
pub mod store;

pub use error::TrackerError;
pub use reconcile::{reconcile, ReconcileOutcome, ReconcileScope};
