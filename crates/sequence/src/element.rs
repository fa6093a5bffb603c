//! Elements of a task sequence
//!
//! A sequence is an ordered list of elements, each either a named step
//! (a unit of external work) or a completion callback. A callback, if
//! present, is only valid as the final element of its sequence.

use crate::merge::MergeError;
use std::fmt;
use std::sync::Arc;

/// A named unit of external work
///
/// Steps are opaque identifiers; this crate never runs them. Equality
/// is by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Step(String);

impl Step {
    /// Create a step from a name
    ///
    /// An empty or all-whitespace name is not a recognizable step and
    /// is rejected with [`MergeError::InvalidElement`].
    pub fn new(name: impl Into<String>) -> Result<Self, MergeError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(MergeError::InvalidElement {
                reason: "step name is empty".to_string(),
            });
        }
        Ok(Self(name))
    }

    /// The step's name
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A zero-argument completion hook supplied by a caller
///
/// Callbacks are compared by identity, not by value: two handles are
/// equal only if they were cloned from the same [`Callback::new`] (or
/// [`Callback::fan_out`]) allocation. Cloning is cheap (`Arc`).
#[derive(Clone)]
pub struct Callback(Arc<CallbackKind>);

enum CallbackKind {
    Single(Box<dyn Fn() + Send + Sync>),
    FanOut(Vec<Callback>),
}

impl Callback {
    /// Wrap a closure as a callback
    pub fn new(f: impl Fn() + Send + Sync + 'static) -> Self {
        Self(Arc::new(CallbackKind::Single(Box::new(f))))
    }

    /// Build a callback that invokes each of `callbacks` in order
    ///
    /// This is the synthetic terminal element the merger appends when
    /// any of its input sequences carried callbacks.
    pub fn fan_out(callbacks: Vec<Callback>) -> Self {
        Self(Arc::new(CallbackKind::FanOut(callbacks)))
    }

    /// Invoke the callback (each constituent once, in order)
    pub fn invoke(&self) {
        match &*self.0 {
            CallbackKind::Single(f) => f(),
            CallbackKind::FanOut(callbacks) => {
                for callback in callbacks {
                    callback.invoke();
                }
            }
        }
    }

    /// Whether two handles refer to the same callback
    pub fn same_callback(&self, other: &Callback) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Leaf callbacks in invocation order
    ///
    /// A single callback yields itself; a fan-out flattens to its
    /// constituents. The merger uses this to deduplicate callbacks
    /// carried over from an earlier merge, so no callback is ever
    /// invoked twice for one logical batch.
    pub(crate) fn leaves(&self) -> Vec<Callback> {
        match &*self.0 {
            CallbackKind::Single(_) => vec![self.clone()],
            CallbackKind::FanOut(callbacks) => {
                callbacks.iter().flat_map(|cb| cb.leaves()).collect()
            }
        }
    }
}

impl PartialEq for Callback {
    fn eq(&self, other: &Self) -> bool {
        self.same_callback(other)
    }
}

impl Eq for Callback {}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            CallbackKind::Single(_) => write!(f, "Callback"),
            CallbackKind::FanOut(callbacks) => {
                write!(f, "Callback::FanOut({})", callbacks.len())
            }
        }
    }
}

/// One element of a task sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    /// A named step
    Step(Step),
    /// A completion callback (valid only as the final element)
    Callback(Callback),
}

impl Element {
    /// Build a step element from a name
    pub fn step(name: impl Into<String>) -> Result<Self, MergeError> {
        Step::new(name).map(Element::Step)
    }

    /// Build a callback element from a closure
    pub fn callback(f: impl Fn() + Send + Sync + 'static) -> Self {
        Element::Callback(Callback::new(f))
    }

    /// The step, if this element is one
    pub fn as_step(&self) -> Option<&Step> {
        match self {
            Element::Step(step) => Some(step),
            Element::Callback(_) => None,
        }
    }

    /// Whether this element is a callback
    pub fn is_callback(&self) -> bool {
        matches!(self, Element::Callback(_))
    }
}

impl From<Step> for Element {
    fn from(step: Step) -> Self {
        Element::Step(step)
    }
}

impl From<Callback> for Element {
    fn from(callback: Callback) -> Self {
        Element::Callback(callback)
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Element::Step(step) => write!(f, "{}", step),
            Element::Callback(_) => write!(f, "<callback>"),
        }
    }
}
