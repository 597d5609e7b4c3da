//! Linear step validation shared by the assessment wizard and the submission flow.
//!
//! A flow is an ordered list of steps, each guarded by a completion predicate
//! over the flow's state. Navigation code asks the gate list whether the current
//! step is satisfied instead of re-deriving the rule per screen.

/// A step-completion predicate over some flow state `S`.
pub trait StepGate<S>: Send + Sync {
    /// Short label used in logs and validation messages.
    fn label(&self) -> &str;

    fn is_satisfied(&self, state: &S) -> bool;
}

/// Ordered list of step gates. Step `i` is complete when gate `i` is satisfied.
pub struct LinearSteps<S> {
    gates: Vec<Box<dyn StepGate<S>>>,
}

impl<S> LinearSteps<S> {
    pub fn new() -> Self {
        Self { gates: Vec::new() }
    }

    /// Appends a gate, builder style.
    pub fn then(mut self, gate: impl StepGate<S> + 'static) -> Self {
        self.gates.push(Box::new(gate));
        self
    }

    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    pub fn label(&self, step: usize) -> Option<&str> {
        self.gates.get(step).map(|g| g.label())
    }

    /// Out-of-range steps are never satisfied.
    pub fn is_satisfied(&self, step: usize, state: &S) -> bool {
        self.gates
            .get(step)
            .map(|g| g.is_satisfied(state))
            .unwrap_or(false)
    }

    /// Index of the first step whose gate does not hold, if any.
    pub fn first_unsatisfied(&self, state: &S) -> Option<usize> {
        self.gates.iter().position(|g| !g.is_satisfied(state))
    }

    pub fn all_satisfied(&self, state: &S) -> bool {
        self.first_unsatisfied(state).is_none()
    }
}

impl<S> Default for LinearSteps<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Gate backed by a plain function pointer, for steps with no captured data.
pub struct FnGate<S> {
    label: &'static str,
    check: fn(&S) -> bool,
}

impl<S> FnGate<S> {
    pub fn new(label: &'static str, check: fn(&S) -> bool) -> Self {
        Self { label, check }
    }
}

impl<S> StepGate<S> for FnGate<S> {
    fn label(&self) -> &str {
        self.label
    }

    fn is_satisfied(&self, state: &S) -> bool {
        (self.check)(state)
    }
}
