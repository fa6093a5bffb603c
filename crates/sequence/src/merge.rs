//! Compatible-order merging of task sequences
//!
//! Combines any number of internally-ordered sequences into one total
//! order, or fails when two sequences disagree about the relative order
//! of steps they share. Callbacks collected from the inputs are folded
//! into a single fan-out callback appended as the final element.

use crate::element::{Callback, Element, Step};
use thiserror::Error;

/// Errors raised while merging sequences
#[derive(Debug, Error)]
pub enum MergeError {
    /// Two sequences disagree about the relative order of shared steps
    #[error("step '{step}' would reorder already-merged steps; sequence orders are incompatible")]
    OrderingConflict {
        /// The step whose placement backtracked
        step: Step,
    },

    /// A callback appeared before the end of its sequence
    #[error("callback at position {position} is not the final element of its sequence")]
    MisplacedCallback {
        /// Zero-based position of the offending callback
        position: usize,
    },

    /// An element is neither a recognizable step nor a callback
    #[error("invalid element: {reason}")]
    InvalidElement {
        /// What made the element unrecognizable
        reason: String,
    },
}

/// Merge sequences that have compatible ordering
///
/// Processes sequences in argument order. Within a sequence each step is
/// anchored immediately after the position where the previous step of
/// that sequence landed, so every input's internal order is preserved
/// without a full topological sort. A step that would have to move
/// backwards relative to an earlier anchor is an ordering conflict.
///
/// Callbacks are permitted only as the final element of a sequence, are
/// deduplicated by identity (fan-out callbacks from a previous merge are
/// flattened first), and come back as one trailing fan-out element that
/// invokes each of them once, in first-seen order.
///
/// Merging zero sequences yields an empty sequence; merging a sequence
/// with itself is idempotent.
pub fn merge(sequences: &[&[Element]]) -> Result<Vec<Element>, MergeError> {
    let mut steps: Vec<Step> = Vec::new();
    let mut callbacks: Vec<Callback> = Vec::new();

    for sequence in sequences {
        // Position in `steps` of the most recent match for this
        // sequence; None means "before position 0".
        let mut last_match: Option<usize> = None;

        for (i, element) in sequence.iter().enumerate() {
            match element {
                Element::Step(step) => {
                    match steps.iter().position(|s| s == step) {
                        // Not found: insert right after the last match,
                        // which makes the insertion the new last match.
                        None => {
                            let at = last_match.map_or(0, |m| m + 1);
                            steps.insert(at, step.clone());
                            last_match = Some(at);
                        }
                        // Found: backtracking is not allowed.
                        Some(index) => {
                            if last_match.is_some_and(|m| index < m) {
                                return Err(MergeError::OrderingConflict { step: step.clone() });
                            }
                            last_match = Some(index);
                        }
                    }
                }
                Element::Callback(callback) => {
                    if i + 1 != sequence.len() {
                        return Err(MergeError::MisplacedCallback { position: i });
                    }
                    for leaf in callback.leaves() {
                        if !callbacks.iter().any(|c| c.same_callback(&leaf)) {
                            callbacks.push(leaf);
                        }
                    }
                }
            }
        }
    }

    let mut results: Vec<Element> = steps.into_iter().map(Element::Step).collect();

    // One terminal element that invokes every collected callback.
    if !callbacks.is_empty() {
        results.push(Element::Callback(Callback::fan_out(callbacks)));
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn seq(names: &[&str]) -> Vec<Element> {
        names
            .iter()
            .map(|name| Element::step(*name).unwrap())
            .collect()
    }

    fn step_names(elements: &[Element]) -> Vec<String> {
        elements
            .iter()
            .filter_map(|e| e.as_step().map(|s| s.name().to_string()))
            .collect()
    }

    #[test]
    fn test_merge_nothing_is_empty() {
        assert!(merge(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_merge_overlapping_sequences() {
        let a = seq(&["clean", "build", "test"]);
        let b = seq(&["build", "test", "deploy"]);

        let merged = merge(&[&a, &b]).unwrap();
        assert_eq!(step_names(&merged), ["clean", "build", "test", "deploy"]);
    }

    #[test]
    fn test_merge_disjoint_sequences_keeps_each_order() {
        let a = seq(&["a1", "a2"]);
        let b = seq(&["b1", "b2"]);

        let merged = merge(&[&a, &b]).unwrap();
        let names = step_names(&merged);

        assert_eq!(names.len(), 4);
        let pos = |n: &str| names.iter().position(|x| x == n).unwrap();
        assert!(pos("a1") < pos("a2"));
        assert!(pos("b1") < pos("b2"));
    }

    #[test]
    fn test_merge_with_itself_is_idempotent() {
        let a = seq(&["clean", "build", "test"]);

        let once = merge(&[&a]).unwrap();
        let twice = merge(&[&a, &a]).unwrap();

        assert_eq!(step_names(&once), step_names(&twice));
        assert_eq!(step_names(&twice), ["clean", "build", "test"]);
    }

    #[test]
    fn test_merge_rejects_incompatible_order() {
        let a = seq(&["a", "b"]);
        let b = seq(&["b", "a"]);

        let err = merge(&[&a, &b]).unwrap_err();
        match err {
            MergeError::OrderingConflict { step } => assert_eq!(step.name(), "a"),
            other => panic!("expected ordering conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_merge_anchors_new_steps_after_last_match() {
        // "lint" is unknown to the merged order and must land right
        // after "build", where its sequence anchors it.
        let a = seq(&["clean", "build", "test"]);
        let b = seq(&["build", "lint", "test"]);

        let merged = merge(&[&a, &b]).unwrap();
        assert_eq!(step_names(&merged), ["clean", "build", "lint", "test"]);
    }

    #[test]
    fn test_callback_only_allowed_last() {
        let mut a = seq(&["a"]);
        a.insert(0, Element::callback(|| {}));

        let err = merge(&[&a]).unwrap_err();
        assert!(matches!(err, MergeError::MisplacedCallback { position: 0 }));
    }

    #[test]
    fn test_lone_callback_sequence_is_valid() {
        let a = vec![Element::callback(|| {})];
        let merged = merge(&[&a]).unwrap();

        assert_eq!(merged.len(), 1);
        assert!(merged[0].is_callback());
    }

    #[test]
    fn test_callbacks_aggregate_in_first_seen_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let first = {
            let order = order.clone();
            Callback::new(move || order.lock().unwrap().push(1))
        };
        let second = {
            let order = order.clone();
            Callback::new(move || order.lock().unwrap().push(2))
        };

        let mut a = seq(&["a"]);
        a.push(Element::Callback(first));
        let mut b = seq(&["a"]);
        b.push(Element::Callback(second));

        let merged = merge(&[&a, &b]).unwrap();
        assert_eq!(step_names(&merged), ["a"]);

        match merged.last().unwrap() {
            Element::Callback(cb) => cb.invoke(),
            other => panic!("expected trailing callback, got {other:?}"),
        }
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_callbacks_deduplicate_across_remerge() {
        // Merging the merged result again (as the aggregator does on
        // every enqueue) must not double-invoke a callback.
        let count = Arc::new(AtomicUsize::new(0));
        let done = {
            let count = count.clone();
            Callback::new(move || {
                count.fetch_add(1, Ordering::SeqCst);
            })
        };

        let mut a = seq(&["a"]);
        a.push(Element::Callback(done.clone()));

        let queue = merge(&[&a]).unwrap();
        let mut b = seq(&["a"]);
        b.push(Element::Callback(done));
        let queue = merge(&[&queue, &b]).unwrap();

        match queue.last().unwrap() {
            Element::Callback(cb) => cb.invoke(),
            other => panic!("expected trailing callback, got {other:?}"),
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_no_duplicate_steps_in_result() {
        let a = seq(&["a", "b"]);
        let b = seq(&["a", "b", "c"]);
        let c = seq(&["b", "c"]);

        let merged = merge(&[&a, &b, &c]).unwrap();
        assert_eq!(step_names(&merged), ["a", "b", "c"]);
    }
}
