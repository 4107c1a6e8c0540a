use super::joint::JointAction;
use super::joint::JointState;
use crate::Probability;
use crate::model::bound::Bound;
use crate::model::value::Value;

/// One stochastic joint successor of a joint action: destination, immediate
/// joint reward, joint probability, and the summed future-return envelope of
/// the destination's local states.
#[derive(Clone, Debug)]
pub struct JointTransition<S: Ord> {
    pub to: JointState<S>,
    pub reward: Value,
    pub probability: Probability,
    pub bound: Bound,
}

impl<S: Clone + Ord> JointTransition<S> {
    /// Combine with a transition over a disjoint agent set.
    pub fn combine(&self, other: &Self) -> Self {
        Self {
            to: self.to.combine(&other.to),
            reward: self.reward.add(&other.reward),
            probability: self.probability * other.probability,
            bound: self.bound.add(&other.bound),
        }
    }
}

/// The record stored for each joint state reached during search: the best
/// joint action, its stochastic successors, and the expected value achieved.
/// The terminal sentinel carries only an empty value.
#[derive(Clone, Debug)]
pub struct Optimal<S: Ord, A: Ord> {
    pub action: Option<JointAction<A>>,
    pub transitions: Vec<JointTransition<S>>,
    pub value: Value,
}

impl<S: Clone + Ord, A: Clone + Ord> Optimal<S, A> {
    pub fn terminal(objectives: usize) -> Self {
        Self {
            action: None,
            transitions: Vec::new(),
            value: Value::zero(objectives),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.action.is_none()
    }

    /// Combine with the record of a disjoint component: merged joint action,
    /// pairwise-combined successors, summed value. A terminal side is the
    /// neutral element.
    pub fn combine(&self, other: &Self) -> Self {
        match (&self.action, &other.action) {
            (None, None) => Self {
                action: None,
                transitions: Vec::new(),
                value: self.value.add(&other.value),
            },
            (Some(_), None) => Self {
                action: self.action.clone(),
                transitions: self.transitions.clone(),
                value: self.value.add(&other.value),
            },
            (None, Some(_)) => Self {
                action: other.action.clone(),
                transitions: other.transitions.clone(),
                value: self.value.add(&other.value),
            },
            (Some(a), Some(b)) => Self {
                action: Some(a.combine(b)),
                transitions: self
                    .transitions
                    .iter()
                    .flat_map(|x| other.transitions.iter().map(move |y| x.combine(y)))
                    .collect(),
                value: self.value.add(&other.value),
            },
        }
    }
}
