use super::joint::JointAction;
use super::joint::JointState;
use super::transition::Optimal;
use crate::error::Result;
use crate::error::SolveError;
use crate::model::value::Objectives;
use crate::model::value::Value;
use std::collections::BTreeMap;

/// The solved policy: every reachable joint state mapped to its optimal
/// record, over the full agent set. Decoupled component records are
/// combined during reconstruction so queries never see partial states.
#[derive(Debug)]
pub struct Policy<S: Ord + std::fmt::Debug, A: Ord + std::fmt::Debug> {
    map: BTreeMap<JointState<S>, Optimal<S, A>>,
    value: Value,
    objectives: Objectives,
}

impl<S: Clone + Ord + std::fmt::Debug, A: Clone + Ord + std::fmt::Debug> Policy<S, A> {
    /// Walk the search map from the initial joint state down, combining the
    /// records of decoupled substates into full-scope records. Combination
    /// derives the decomposition of every combined successor, so the walk
    /// can resolve states the search itself only ever saw in parts.
    pub(crate) fn reconstruct(
        initial: &JointState<S>,
        visited: &BTreeMap<JointState<S>, Option<Optimal<S, A>>>,
        decoupled: &BTreeMap<JointState<S>, Vec<JointState<S>>>,
        objectives: Objectives,
    ) -> Result<Self> {
        let mut map = BTreeMap::new();
        let mut derived: BTreeMap<JointState<S>, Vec<JointState<S>>> = BTreeMap::new();
        let mut frontier = vec![initial.clone()];
        while let Some(state) = frontier.pop() {
            if map.contains_key(&state) {
                continue;
            }
            let record = Self::resolve(&state, visited, decoupled, &mut derived)?;
            for transition in &record.transitions {
                if !map.contains_key(&transition.to) {
                    frontier.push(transition.to.clone());
                }
            }
            map.insert(state, record);
        }
        let value = map
            .get(initial)
            .expect("initial state reconstructed")
            .value
            .clone();
        Ok(Self {
            map,
            value,
            objectives,
        })
    }

    /// A full-scope record for `state`: straight from the search map, or the
    /// combination of its decoupled (or derived) parts.
    fn resolve(
        state: &JointState<S>,
        visited: &BTreeMap<JointState<S>, Option<Optimal<S, A>>>,
        decoupled: &BTreeMap<JointState<S>, Vec<JointState<S>>>,
        derived: &mut BTreeMap<JointState<S>, Vec<JointState<S>>>,
    ) -> Result<Optimal<S, A>> {
        if let Some(entry) = visited.get(state) {
            return entry.clone().ok_or_else(|| {
                SolveError::Cache(format!("null record observed for {} after search", state))
            });
        }
        let parts = decoupled
            .get(state)
            .cloned()
            .or_else(|| derived.get(state).cloned())
            .ok_or_else(|| {
                SolveError::Cache(format!("state {} missing from the search map", state))
            })?;
        let mut combined: Option<Optimal<S, A>> = None;
        for part in &parts {
            let record = Self::resolve(part, visited, decoupled, derived)?;
            combined = Some(match combined {
                None => record,
                Some(sofar) => {
                    for x in &sofar.transitions {
                        for y in &record.transitions {
                            derived.insert(
                                x.to.combine(&y.to),
                                vec![x.to.clone(), y.to.clone()],
                            );
                        }
                    }
                    sofar.combine(&record)
                }
            });
        }
        combined.ok_or_else(|| {
            SolveError::Cache(format!("empty decomposition recorded for {}", state))
        })
    }

    /// The optimal joint action for a reachable, non-terminal joint state.
    pub fn query(&self, state: &JointState<S>) -> Result<&JointAction<A>> {
        self.map
            .get(state)
            .and_then(|record| record.action.as_ref())
            .ok_or(SolveError::Unsolved)
    }

    /// The full record for a reachable joint state.
    pub fn record(&self, state: &JointState<S>) -> Option<&Optimal<S, A>> {
        self.map.get(state)
    }

    pub fn expected_value(&self) -> &Value {
        &self.value
    }

    pub fn objectives(&self) -> &Objectives {
        &self.objectives
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&JointState<S>, &Optimal<S, A>)> {
        self.map.iter()
    }

    /// Human-readable dump, one block per time step (map order is already
    /// time-major).
    pub fn dump<W: std::io::Write>(&self, mut sink: W) -> std::io::Result<()> {
        let mut time = None;
        for (state, record) in &self.map {
            if time != Some(state.time()) {
                time = Some(state.time());
                writeln!(sink, "== t{} ==", state.time())?;
            }
            match &record.action {
                Some(action) => writeln!(sink, "{} -> {} value {}", state, action, record.value)?,
                None => writeln!(sink, "{} terminal", state)?,
            }
        }
        Ok(())
    }
}
