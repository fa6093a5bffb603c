//! The executor boundary
//!
//! The aggregator never runs steps itself; it hands each merged batch
//! to an [`Executor`] supplied at construction.

use sequence::Element;

/// External collaborator that runs a merged sequence of steps
///
/// Invocation is fire-and-forget: the aggregator does not inspect the
/// executor's outcome, and executor failures are the embedder's concern.
pub trait Executor: Send + Sync {
    /// Run the merged sequence in order
    fn execute(&self, sequence: Vec<Element>);
}

impl<F> Executor for F
where
    F: Fn(Vec<Element>) + Send + Sync,
{
    fn execute(&self, sequence: Vec<Element>) {
        self(sequence)
    }
}
