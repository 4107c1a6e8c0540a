use crate::AgentId;
use crate::Time;
use crate::domain::LocalState;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

/// A factored joint state: every agent's payload at a common time. May be
/// partial, covering only the agents of one coordination-graph component;
/// two joint states combine iff their agent sets are disjoint.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct JointState<S: Ord> {
    time: Time,
    locals: BTreeMap<AgentId, S>,
}

impl<S: Clone + Ord> JointState<S> {
    pub fn new(time: Time, locals: BTreeMap<AgentId, S>) -> Self {
        Self { time, locals }
    }

    pub fn time(&self) -> Time {
        self.time
    }
    pub fn len(&self) -> usize {
        self.locals.len()
    }
    pub fn is_empty(&self) -> bool {
        self.locals.is_empty()
    }

    pub fn agents(&self) -> BTreeSet<AgentId> {
        self.locals.keys().copied().collect()
    }

    pub fn get(&self, agent: AgentId) -> Option<&S> {
        self.locals.get(&agent)
    }

    pub fn contains(&self, agent: AgentId) -> bool {
        self.locals.contains_key(&agent)
    }

    pub fn local(&self, agent: AgentId) -> LocalState<S> {
        LocalState {
            agent,
            time: self.time,
            state: self.locals.get(&agent).expect("agent in scope").clone(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AgentId, &S)> {
        self.locals.iter()
    }

    /// The projection onto a subset of agents.
    pub fn restrict(&self, agents: &BTreeSet<AgentId>) -> Self {
        Self {
            time: self.time,
            locals: self
                .locals
                .iter()
                .filter(|(agent, _)| agents.contains(agent))
                .map(|(agent, state)| (*agent, state.clone()))
                .collect(),
        }
    }

    pub fn disjoint(&self, other: &Self) -> bool {
        self.locals.keys().all(|agent| !other.contains(*agent))
    }

    /// Disjoint union of two same-time joint states.
    pub fn combine(&self, other: &Self) -> Self {
        debug_assert!(self.time == other.time);
        debug_assert!(self.disjoint(other));
        let mut locals = self.locals.clone();
        locals.extend(other.locals.iter().map(|(a, s)| (*a, s.clone())));
        Self {
            time: self.time,
            locals,
        }
    }
}

impl<S: Ord + std::fmt::Debug> std::fmt::Display for JointState<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t{} {{", self.time)?;
        for (i, (agent, state)) in self.locals.iter().enumerate() {
            match i {
                0 => write!(f, "{}:{:?}", agent, state)?,
                _ => write!(f, " {}:{:?}", agent, state)?,
            }
        }
        write!(f, "}}")
    }
}

/// One local action per agent of a (possibly partial) joint state.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct JointAction<A: Ord>(BTreeMap<AgentId, A>);

impl<A: Clone + Ord> JointAction<A> {
    pub fn new(actions: BTreeMap<AgentId, A>) -> Self {
        Self(actions)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, agent: AgentId) -> Option<&A> {
        self.0.get(&agent)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AgentId, &A)> {
        self.0.iter()
    }

    pub fn actions(&self) -> &BTreeMap<AgentId, A> {
        &self.0
    }

    /// Disjoint union of two joint actions.
    pub fn combine(&self, other: &Self) -> Self {
        debug_assert!(self.0.keys().all(|agent| !other.0.contains_key(agent)));
        let mut actions = self.0.clone();
        actions.extend(other.0.iter().map(|(a, x)| (*a, x.clone())));
        Self(actions)
    }
}

impl<A: Ord + std::fmt::Debug> std::fmt::Display for JointAction<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<")?;
        for (i, (agent, action)) in self.0.iter().enumerate() {
            match i {
                0 => write!(f, "{}:{:?}", agent, action)?,
                _ => write!(f, " {}:{:?}", agent, action)?,
            }
        }
        write!(f, ">")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(time: Time, pairs: &[(AgentId, u8)]) -> JointState<u8> {
        JointState::new(time, pairs.iter().copied().collect())
    }

    #[test]
    fn restrict_projects_agents() {
        let joint = state(1, &[(0, 10), (1, 20), (2, 30)]);
        let part = joint.restrict(&BTreeSet::from([0, 2]));
        assert_eq!(part.agents(), BTreeSet::from([0, 2]));
        assert_eq!(part.get(0), Some(&10));
        assert_eq!(part.get(1), None);
    }

    #[test]
    fn combine_requires_disjoint_scopes() {
        let a = state(0, &[(0, 1)]);
        let b = state(0, &[(1, 2)]);
        assert!(a.disjoint(&b));
        let c = a.combine(&b);
        assert_eq!(c.len(), 2);
        assert!(!c.disjoint(&b));
    }
}
