use crate::AgentId;
use crate::Probability;
use crate::Time;
use crate::config::Heuristic;
use crate::crg::others::Others;
use crate::model::value::Objectives;
use crate::model::value::Value;
use crate::search::joint::JointState;
use std::collections::BTreeSet;
use std::fmt::Debug;
use std::hash::Hash;
use std::rc::Rc;

/// One agent's state at a point in time. The payload is opaque to the
/// solver; equality includes it, and distinct agents' states never compare
/// equal because the agent is part of the key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalState<S> {
    pub agent: AgentId,
    pub time: Time,
    pub state: S,
}

/// One step of one agent's state machine: `(from, action, to)` at `time`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalTransition<S, A> {
    pub agent: AgentId,
    pub time: Time,
    pub from: S,
    pub action: A,
    pub to: S,
}

impl<S: Clone, A> LocalTransition<S, A> {
    pub fn origin(&self) -> LocalState<S> {
        LocalState {
            agent: self.agent,
            time: self.time,
            state: self.from.clone(),
        }
    }
    pub fn destination(&self) -> LocalState<S> {
        LocalState {
            agent: self.agent,
            time: self.time + 1,
            state: self.to.clone(),
        }
    }
}

/// A reward function of the instance, private or shared. Carries the set of
/// agents it reads. Implementations decide how a local transition maps to a
/// value and when the function stops coupling agents.
pub trait Reward<S: Ord, A: Ord> {
    /// Short human-readable tag for debug dumps.
    fn label(&self) -> String;

    /// The agents this function reads.
    fn scope(&self) -> &BTreeSet<AgentId>;

    /// The function's contribution to a local transition of a scope agent,
    /// given the dependency and influence context chosen for the enclosing
    /// annotated transition.
    fn evaluate(
        &self,
        step: &LocalTransition<S, A>,
        depends: &Others<A>,
        influence: &Others<(S, S)>,
    ) -> Value;

    /// Is this function no longer influenced by any behavior reachable from
    /// the given local state? Must be monotone along reachability: once true
    /// in a state, true in every state reachable from it. Private rewards
    /// are trivially independent.
    fn local_cri(&self, agent: AgentId, state: &LocalState<S>) -> bool;

    /// Are `a` and `b` reward-independent through this function from the
    /// given joint state onward?
    fn cri(&self, a: AgentId, b: AgentId, joint: &JointState<S>) -> bool;

    /// Actions of `other` that could alter this function when `step` is
    /// taken. Empty means no action dependency.
    fn dependencies(&self, step: &LocalTransition<S, A>, other: AgentId) -> BTreeSet<A> {
        let _ = (step, other);
        BTreeSet::new()
    }

    /// State-influence tokens `(from, to)` of `other` that could alter this
    /// function when `step` is taken. Empty means no influence.
    fn influences(&self, step: &LocalTransition<S, A>, other: AgentId) -> BTreeSet<(S, S)> {
        let _ = (step, other);
        BTreeSet::new()
    }
}

/// The only seam between the solver and a concrete problem. The solver never
/// inspects domain state content; any type meeting these contracts plugs in.
///
/// Contracts the solver checks where it can:
/// - `actions` is empty iff the state is terminal;
/// - `probability` sums to 1 (± epsilon) over `outcomes(state, action)`;
/// - `terminal` is uniform in time across agents.
pub trait Domain {
    type State: Clone + Ord + Hash + Debug;
    type Action: Clone + Ord + Hash + Debug;

    /// Number of agents; IDs are dense `0..agents()`.
    fn agents(&self) -> usize;

    fn horizon(&self) -> Time;

    fn objectives(&self) -> Objectives;

    /// The factored initial joint state, over all agents at time zero.
    fn initial(&self) -> JointState<Self::State>;

    /// Every reward function of the instance: one private reward per agent
    /// plus one shared reward per rule.
    fn rewards(&self) -> Vec<Rc<dyn Reward<Self::State, Self::Action>>>;

    /// Assign each reward to exactly one owner agent. The default delegates
    /// to the configured heuristic; a domain may override it wholesale.
    fn assign(
        &self,
        rewards: &[Rc<dyn Reward<Self::State, Self::Action>>],
        heuristic: Heuristic,
    ) -> Vec<Vec<Rc<dyn Reward<Self::State, Self::Action>>>> {
        crate::model::assignment::assign(rewards, self.agents(), heuristic)
    }

    /// Domain-legal actions from this local state. Empty iff terminal.
    fn actions(&self, local: &LocalState<Self::State>) -> Vec<Self::Action>;

    /// All possible successor payloads of taking `action`; more than one
    /// expresses stochasticity.
    fn outcomes(&self, local: &LocalState<Self::State>, action: &Self::Action) -> Vec<Self::State>;

    /// Probability of this exact successor given `(from, action)`.
    fn probability(&self, step: &LocalTransition<Self::State, Self::Action>) -> Probability;

    /// Union over `rewards` of the actions of `other` that could alter them
    /// when `step` is taken.
    fn dependencies(
        &self,
        rewards: &[Rc<dyn Reward<Self::State, Self::Action>>],
        step: &LocalTransition<Self::State, Self::Action>,
        other: AgentId,
    ) -> BTreeSet<Self::Action> {
        rewards
            .iter()
            .flat_map(|r| r.dependencies(step, other))
            .collect()
    }

    /// Union over `rewards` of the state-influence tokens of `other` that
    /// could alter them when `step` is taken.
    fn influences(
        &self,
        rewards: &[Rc<dyn Reward<Self::State, Self::Action>>],
        step: &LocalTransition<Self::State, Self::Action>,
        other: AgentId,
    ) -> BTreeSet<(Self::State, Self::State)> {
        rewards
            .iter()
            .flat_map(|r| r.influences(step, other))
            .collect()
    }

    /// Domain terminality; the default is reaching the horizon.
    fn terminal(&self, local: &LocalState<Self::State>) -> bool {
        local.time >= self.horizon()
    }
}
