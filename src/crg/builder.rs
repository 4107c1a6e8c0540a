use super::graph::Crg;
use super::others::Others;
use super::transition::Annotated;
use crate::AgentId;
use crate::Deadline;
use crate::EPSILON;
use crate::domain::Domain;
use crate::domain::LocalState;
use crate::domain::LocalTransition;
use crate::domain::Reward;
use crate::error::Result;
use crate::error::SolveError;
use crate::model::bound::Bound;
use crate::model::value::Objectives;
use crate::model::value::Value;
use crate::search::stats::CrgStats;
use petgraph::graph::NodeIndex;
use std::collections::BTreeSet;
use std::rc::Rc;

/// Recursive construction of one agent's conditional return graph from its
/// initial local state. Each local state is visited at most once; its info
/// record and return bound are written exactly once.
pub struct Builder<'a, D: Domain> {
    domain: &'a D,
    agent: AgentId,
    objectives: Objectives,
    assigned: Vec<Rc<dyn Reward<D::State, D::Action>>>,
    involved: Vec<Rc<dyn Reward<D::State, D::Action>>>,
    deadline: Deadline,
    local_cri: bool,
    stats: CrgStats,
}

impl<'a, D: Domain> Builder<'a, D> {
    /// Build the CRG rooted at `start` and return it with its counters.
    pub fn build(
        domain: &'a D,
        agent: AgentId,
        assigned: Vec<Rc<dyn Reward<D::State, D::Action>>>,
        involved: Vec<Rc<dyn Reward<D::State, D::Action>>>,
        start: LocalState<D::State>,
        deadline: Deadline,
        local_cri: bool,
    ) -> Result<(Crg<D::State, D::Action>, CrgStats)> {
        let mut crg = Crg::new(agent, assigned.clone(), involved.clone());
        let mut builder = Self {
            domain,
            agent,
            objectives: domain.objectives(),
            assigned,
            involved,
            deadline,
            local_cri,
            stats: CrgStats::default(),
        };
        builder.explore(&mut crg, start)?;
        builder.stats.states = crg.states();
        Ok((crg, builder.stats))
    }

    /// Memoized recursion over local states.
    fn explore(
        &mut self,
        crg: &mut Crg<D::State, D::Action>,
        local: LocalState<D::State>,
    ) -> Result<Bound> {
        self.deadline.check()?;
        if let Some(ix) = crg.lookup(&local) {
            self.stats.duplicates += 1;
            return crg.bound(ix).cloned();
        }
        let ix = crg.insert(local.clone());
        if self.domain.terminal(&local) {
            return self.finish(crg, ix, &local);
        }
        if self.local_cri
            && self
                .involved
                .iter()
                .all(|reward| reward.local_cri(self.agent, &local))
        {
            return self.complete(crg, ix, local);
        }
        self.expand(crg, ix, local)
    }

    /// Terminal state: empty bound, no transitions.
    fn finish(
        &mut self,
        crg: &mut Crg<D::State, D::Action>,
        ix: NodeIndex,
        local: &LocalState<D::State>,
    ) -> Result<Bound> {
        if !self.domain.actions(local).is_empty() {
            return Err(SolveError::Adapter(format!(
                "available actions in terminal state {:?}",
                local
            )));
        }
        crg.set_terminal(ix);
        self.stats.terminal += 1;
        let bound = Bound::empty(self.objectives.len());
        crg.set_bound(ix, bound.clone())?;
        Ok(bound)
    }

    /// Normal expansion: every action, every outcome, every dependency and
    /// influence branch; the state bound envelopes the per-action sums.
    fn expand(
        &mut self,
        crg: &mut Crg<D::State, D::Action>,
        ix: NodeIndex,
        local: LocalState<D::State>,
    ) -> Result<Bound> {
        let actions = self.domain.actions(&local);
        if actions.is_empty() {
            return Err(SolveError::Adapter(format!(
                "no available actions in non-terminal state {:?}",
                local
            )));
        }
        let mut state_bound: Option<Bound> = None;
        for action in actions {
            let mut action_bound = Bound::empty(self.objectives.len());
            let mut closure = 0.;
            for to in self.domain.outcomes(&local, &action) {
                let step = LocalTransition {
                    agent: self.agent,
                    time: local.time,
                    from: local.state.clone(),
                    action: action.clone(),
                    to,
                };
                let p = self.domain.probability(&step);
                closure += p;
                let destination = step.destination();
                let future = self.explore(crg, destination.clone())?;
                let to_ix = crg.lookup(&destination).expect("successor just explored");
                let mut envelope: Option<Bound> = None;
                for (depends, influence) in self.branches(&step) {
                    let reward = self.reward(&step, &depends, &influence);
                    let point = Bound::point(reward.clone());
                    envelope = Some(match envelope {
                        Some(e) => e.update(&point),
                        None => point,
                    });
                    crg.connect(
                        ix,
                        to_ix,
                        Annotated {
                            action: action.clone(),
                            depends,
                            influence,
                            reward,
                            probability: p,
                        },
                    );
                    self.stats.transitions += 1;
                }
                let envelope = envelope.expect("at least one branch");
                action_bound = action_bound.add(&envelope.add(&future).scale(p));
            }
            if (closure - 1.).abs() > EPSILON {
                return Err(SolveError::Adapter(format!(
                    "outcome probabilities sum to {} for {:?} in {:?}",
                    closure, action, local
                )));
            }
            state_bound = Some(match state_bound {
                Some(b) => b.update(&action_bound),
                None => action_bound,
            });
        }
        let bound = state_bound.expect("at least one action");
        crg.set_bound(ix, bound.clone())?;
        Ok(bound)
    }

    /// All coherent dependency-and-influence contexts of one local step.
    /// Per scope agent, either one specific dependent item or the complement
    /// marker; agents with empty dependent sets contribute a single
    /// unannotated branch. Influence expansion nests inside dependency
    /// expansion.
    fn branches(
        &mut self,
        step: &LocalTransition<D::State, D::Action>,
    ) -> Vec<(Others<D::Action>, Others<(D::State, D::State)>)> {
        let scope = self
            .assigned
            .iter()
            .flat_map(|reward| reward.scope().iter().copied())
            .filter(|g| *g != self.agent)
            .collect::<BTreeSet<AgentId>>();
        let mut depends = vec![Others::none()];
        for g in &scope {
            let dependent = self.domain.dependencies(&self.assigned, step, *g);
            if dependent.is_empty() {
                continue;
            }
            self.stats.dependency_branches += dependent.len() + 1;
            depends = Self::fork(depends, *g, dependent);
        }
        let mut influence = vec![Others::none()];
        for g in &scope {
            let influent = self.domain.influences(&self.assigned, step, *g);
            if influent.is_empty() {
                continue;
            }
            self.stats.influence_branches += influent.len() + 1;
            influence = Self::fork(influence, *g, influent);
        }
        depends
            .into_iter()
            .flat_map(|d| influence.iter().cloned().map(move |i| (d.clone(), i)))
            .collect()
    }

    /// Extend every partial context with each explicit choice for `g`, plus
    /// the "anything else" complement branch.
    fn fork<T: Ord + Clone>(
        contexts: Vec<Others<T>>,
        g: AgentId,
        items: BTreeSet<T>,
    ) -> Vec<Others<T>> {
        let mut next = Vec::with_capacity(contexts.len() * (items.len() + 1));
        for context in contexts {
            for item in &items {
                let mut forked = context.clone();
                forked.include(g, item.clone());
                next.push(forked);
            }
            let mut complement = context;
            complement.exclude(g, items.clone());
            next.push(complement);
        }
        next
    }

    /// Total contribution of the owned rewards under one context.
    fn reward(
        &self,
        step: &LocalTransition<D::State, D::Action>,
        depends: &Others<D::Action>,
        influence: &Others<(D::State, D::State)>,
    ) -> Value {
        self.assigned
            .iter()
            .map(|reward| reward.evaluate(step, depends, influence))
            .fold(self.objectives.zero(), |acc, v| acc.add(&v))
    }

    /// Single-agent optimal completion from a locally independent state:
    /// evaluate every action context-free, keep only the maximizer's
    /// transitions (first encountered wins ties), store the exact value as a
    /// point bound. No dependency or influence expansion below here.
    fn complete(
        &mut self,
        crg: &mut Crg<D::State, D::Action>,
        ix: NodeIndex,
        local: LocalState<D::State>,
    ) -> Result<Bound> {
        crg.set_independent(ix);
        self.stats.independent += 1;
        let actions = self.domain.actions(&local);
        if actions.is_empty() {
            return Err(SolveError::Adapter(format!(
                "no available actions in non-terminal state {:?}",
                local
            )));
        }
        let mut best: Option<(D::Action, Vec<(NodeIndex, f64, Value)>, Value)> = None;
        for action in actions {
            let mut value = self.objectives.zero();
            let mut closure = 0.;
            let mut edges = Vec::new();
            for to in self.domain.outcomes(&local, &action) {
                let step = LocalTransition {
                    agent: self.agent,
                    time: local.time,
                    from: local.state.clone(),
                    action: action.clone(),
                    to,
                };
                let p = self.domain.probability(&step);
                closure += p;
                let destination = step.destination();
                let future = self.completed(crg, destination.clone())?;
                let to_ix = crg.lookup(&destination).expect("successor just completed");
                let reward = self.reward(&step, &Others::none(), &Others::none());
                value = value.add(&reward.add(&future).scale(p));
                edges.push((to_ix, p, reward));
            }
            if (closure - 1.).abs() > EPSILON {
                return Err(SolveError::Adapter(format!(
                    "outcome probabilities sum to {} for {:?} in {:?}",
                    closure, action, local
                )));
            }
            let better = match &best {
                None => true,
                Some((_, _, incumbent)) => {
                    self.objectives.total(&value) > self.objectives.total(incumbent)
                }
            };
            if better {
                best = Some((action, edges, value));
            }
        }
        let (action, edges, value) = best.expect("at least one action");
        for (to_ix, p, reward) in edges {
            crg.connect(
                ix,
                to_ix,
                Annotated {
                    action: action.clone(),
                    depends: Others::none(),
                    influence: Others::none(),
                    reward,
                    probability: p,
                },
            );
            self.stats.transitions += 1;
        }
        let bound = Bound::point(value);
        crg.set_bound(ix, bound.clone())?;
        Ok(bound)
    }

    /// Exact value of a state below an independent one. Cached entries here
    /// are terminal or independent themselves, so their bounds are exact.
    fn completed(
        &mut self,
        crg: &mut Crg<D::State, D::Action>,
        local: LocalState<D::State>,
    ) -> Result<Value> {
        self.deadline.check()?;
        if let Some(ix) = crg.lookup(&local) {
            self.stats.duplicates += 1;
            let bound = crg.bound(ix)?;
            if !bound.is_point() {
                return Err(SolveError::Cache(format!(
                    "inexact bound cached below an independent state at {:?}",
                    local
                )));
            }
            return Ok(bound.lower().clone());
        }
        let ix = crg.insert(local.clone());
        if self.domain.terminal(&local) {
            return self.finish(crg, ix, &local).map(|b| b.lower().clone());
        }
        self.complete(crg, ix, local).map(|b| b.lower().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Heuristic;
    use crate::model::assignment::assign;
    use crate::model::function::TimeFunction;
    use crate::mpp::domain::Mpp;
    use crate::mpp::instance::Crew;
    use crate::mpp::instance::Instance;
    use crate::mpp::task::Task;
    use std::collections::BTreeMap;

    fn delayed_instance() -> Instance {
        Instance {
            version: crate::mpp::instance::VERSION,
            horizon: 3,
            must_complete: false,
            delay_method: Default::default(),
            seed: 0,
            agents: vec![Crew {
                id: 0,
                tasks: vec![Task {
                    id: 0,
                    revenue: 100.,
                    cost: TimeFunction::Constant(10.),
                    duration: 2,
                    delay_probability: 0.3,
                    delay_duration: 1,
                }],
            }],
            shared_reward: None,
        }
    }

    fn build(domain: &Mpp, agent: AgentId, local_cri: bool) -> (Crg<crate::mpp::state::Progress, crate::mpp::action::Action>, CrgStats) {
        let rewards = domain.rewards();
        let owned = assign(&rewards, domain.agents(), Heuristic::Balanced);
        let involved = rewards
            .iter()
            .filter(|reward| reward.scope().contains(&agent))
            .cloned()
            .collect();
        Builder::build(
            domain,
            agent,
            owned[agent].clone(),
            involved,
            domain.initial().local(agent),
            Deadline::unbounded(),
            local_cri,
        )
        .unwrap()
    }

    #[test]
    fn probabilities_close_per_state_and_action() {
        let domain = delayed_instance().domain().unwrap();
        let (crg, _) = build(&domain, 0, false);
        for (_, ix) in crg.iter() {
            if crg.vertex(ix).terminal {
                continue;
            }
            let mut closure = BTreeMap::new();
            for (to, annotated) in crg.outgoing(ix) {
                closure
                    .entry(annotated.action)
                    .or_insert_with(BTreeMap::new)
                    .insert(to, annotated.probability);
            }
            assert!(!closure.is_empty());
            for (_, successors) in closure {
                let total: f64 = successors.values().sum();
                assert!((total - 1.).abs() < EPSILON);
            }
        }
    }

    #[test]
    fn root_bound_encloses_the_exact_return() {
        let domain = delayed_instance().domain().unwrap();
        let objectives = domain.objectives();
        let (crg, _) = build(&domain, 0, false);
        let bound = crg.bound(crg.root()).unwrap();
        assert!(objectives.total(bound.lower()) <= 77. + EPSILON);
        assert!(objectives.total(bound.upper()) >= 77. - EPSILON);
    }

    #[test]
    fn independent_completion_is_exact_and_greedy() {
        let domain = delayed_instance().domain().unwrap();
        let objectives = domain.objectives();
        let (crg, stats) = build(&domain, 0, true);
        // no shared rewards: the whole graph completes single-agent
        assert!(stats.independent > 0);
        let root = crg.bound(crg.root()).unwrap();
        assert!(root.is_point());
        assert!((objectives.total(root.lower()) - 77.).abs() < EPSILON);
        for (_, ix) in crg.iter() {
            let vertex = crg.vertex(ix);
            assert!(vertex.terminal || vertex.independent);
            assert!(vertex.bound.as_ref().unwrap().is_point());
            // only the retained optimum survives
            assert!(crg.actions(ix).len() <= 1);
        }
    }

    #[test]
    fn terminal_states_carry_empty_bounds() {
        let domain = delayed_instance().domain().unwrap();
        let (crg, stats) = build(&domain, 0, false);
        assert!(stats.terminal > 0);
        for (state, ix) in crg.iter() {
            let vertex = crg.vertex(ix);
            assert_eq!(vertex.terminal, state.time >= 3);
            if vertex.terminal {
                assert_eq!(vertex.bound, Some(Bound::empty(3)));
                assert_eq!(crg.outgoing(ix).count(), 0);
            }
        }
    }
}
