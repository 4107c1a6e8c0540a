use super::coordination::Coordination;
use super::joint::JointAction;
use super::joint::JointState;
use super::policy::Policy;
use super::stats::Statistics;
use super::transition::JointTransition;
use super::transition::Optimal;
use crate::AgentId;
use crate::Deadline;
use crate::EPSILON;
use crate::config::Config;
use crate::crg::builder::Builder;
use crate::crg::graph::Crg;
use crate::domain::Domain;
use crate::error::Result;
use crate::error::SolveError;
use crate::model::bound::Bound;
use crate::model::value::Objectives;
use crate::model::value::Value;
use petgraph::graph::NodeIndex;
use std::collections::BTreeMap;
use std::time::Instant;

/// A successful solve: the reconstructed policy plus everything we counted
/// along the way.
#[derive(Debug)]
pub struct Solution<S: Ord + std::fmt::Debug, A: Ord + std::fmt::Debug> {
    pub policy: Policy<S, A>,
    pub stats: Statistics,
}

/// Solve a problem instance end to end: assign rewards, build one CRG per
/// agent, run the decoupling depth-first search from the initial joint
/// state, and post-process the search map into a queryable policy.
pub fn solve<D: Domain>(domain: &D, config: &Config) -> Result<Solution<D::State, D::Action>> {
    let deadline = Deadline::after(config.max_runtime_ms);
    let objectives = domain.objectives();
    let mut stats = Statistics::default();

    let clock = Instant::now();
    let rewards = domain.rewards();
    let owned = domain.assign(&rewards, config.assignment);
    let initial = domain.initial();
    if initial.len() != domain.agents() {
        return Err(SolveError::Adapter(format!(
            "initial joint state covers {} of {} agents",
            initial.len(),
            domain.agents()
        )));
    }
    let mut crgs = Vec::with_capacity(domain.agents());
    for (agent, assigned) in owned.into_iter().enumerate() {
        let involved = rewards
            .iter()
            .filter(|reward| reward.scope().contains(&agent))
            .cloned()
            .collect();
        let (crg, counters) = Builder::build(
            domain,
            agent,
            assigned,
            involved,
            initial.local(agent),
            deadline,
            config.local_cri,
        )?;
        log::debug!(
            "crg {}: {} states, {} transitions, {} independent",
            agent,
            counters.states,
            counters.transitions,
            counters.independent,
        );
        crgs.push(crg);
        stats.crgs.push(counters);
    }
    stats.preprocessing = clock.elapsed();
    log::info!(
        "preprocessing done in {:?}: {} rewards over {} agents",
        stats.preprocessing,
        rewards.len(),
        domain.agents()
    );
    if let Some(dir) = &config.debug_dir {
        std::fs::create_dir_all(dir).ok();
        for crg in &crgs {
            std::fs::write(dir.join(format!("crg-{}.txt", crg.agent())), crg.to_string()).ok();
        }
    }

    let clock = Instant::now();
    let mut search: Search<'_, D> = Search {
        config,
        objectives: objectives.clone(),
        crgs,
        coordination: Coordination::new(domain.agents(), &rewards),
        visited: BTreeMap::new(),
        decoupled: BTreeMap::new(),
        deadline,
        stats,
        depth: 0,
    };
    search.decouple(&initial)?;
    search.stats.solving = clock.elapsed();
    log::info!(
        "search done in {:?}: {} states evaluated, {} joint actions",
        search.stats.solving,
        search.stats.evaluated,
        search.stats.joint_actions
    );

    let clock = Instant::now();
    let policy = Policy::reconstruct(&initial, &search.visited, &search.decoupled, objectives)?;
    search.stats.postprocessing = clock.elapsed();
    if let Some(dir) = &config.debug_dir {
        let mut dump = Vec::new();
        policy.dump(&mut dump).ok();
        std::fs::write(dir.join("policy.txt"), dump).ok();
    }
    log::info!("expected value {}", policy.expected_value());
    Ok(Solution {
        policy,
        stats: search.stats,
    })
}

/// One expanded joint action: its stochastic successors and the full
/// branch-and-bound envelope `sum p * (r + future)`.
struct Candidate<S: Ord, A: Ord> {
    action: JointAction<A>,
    transitions: Vec<JointTransition<S>>,
    bound: Bound,
}

/// The per-solve search state: CRGs, coordination graph, the write-once
/// search map with its in-progress placeholders, and the decoupling map
/// consumed by policy reconstruction.
struct Search<'a, D: Domain> {
    config: &'a Config,
    objectives: Objectives,
    crgs: Vec<Crg<D::State, D::Action>>,
    coordination: Coordination<D::State, D::Action>,
    visited: BTreeMap<JointState<D::State>, Option<Optimal<D::State, D::Action>>>,
    decoupled: BTreeMap<JointState<D::State>, Vec<JointState<D::State>>>,
    deadline: Deadline,
    stats: Statistics,
    depth: usize,
}

impl<'a, D: Domain> Search<'a, D> {
    /// Flag newly independent coordination edges, split the state into
    /// connected components, search each, and sum. Flags are restored on the
    /// way out regardless of outcome.
    fn decouple(&mut self, joint: &JointState<D::State>) -> Result<Value> {
        if !self.config.decouple_cri {
            return self.find_optimal(joint);
        }
        let flagged = self.coordination.update(joint);
        let result = self.split(joint);
        self.coordination.restore(flagged);
        result
    }

    fn split(&mut self, joint: &JointState<D::State>) -> Result<Value> {
        let components = self.coordination.components(&joint.agents());
        match components.len() {
            0 | 1 => self.find_optimal(joint),
            n => {
                self.stats.decoupled += 1;
                self.stats.components += n;
                let parts = components
                    .iter()
                    .map(|component| joint.restrict(component))
                    .collect::<Vec<JointState<D::State>>>();
                self.decoupled.insert(joint.clone(), parts.clone());
                let mut value = self.objectives.zero();
                for part in &parts {
                    value = value.add(&self.find_optimal(part)?);
                }
                Ok(value)
            }
        }
    }

    /// Depth-first optimal value of a (possibly partial) joint state, with
    /// branch-and-bound pruning and memoization.
    fn find_optimal(&mut self, joint: &JointState<D::State>) -> Result<Value> {
        self.deadline.check()?;
        match self.visited.get(joint) {
            Some(Some(optimal)) => {
                self.stats.revisited += 1;
                return Ok(optimal.value.clone());
            }
            Some(None) => {
                return Err(SolveError::Cache(format!(
                    "joint state re-entered while in progress: {}",
                    joint
                )));
            }
            None => {}
        }
        self.stats.evaluated += 1;
        self.stats.joint_agents += joint.len();

        let nodes = self.locate(joint)?;
        let terminal = nodes
            .iter()
            .filter(|(agent, ix)| self.crgs[**agent].vertex(**ix).terminal)
            .count();
        if terminal == nodes.len() {
            let optimal = Optimal::terminal(self.objectives.len());
            let value = optimal.value.clone();
            self.visited.insert(joint.clone(), Some(optimal));
            self.stats.terminal += 1;
            return Ok(value);
        }
        if terminal > 0 {
            return Err(SolveError::Adapter(format!(
                "agents disagree on terminality at {}",
                joint
            )));
        }
        self.visited.insert(joint.clone(), None);

        let mut candidates = self.expansions(joint, &nodes)?;
        let mut incumbent = f64::NEG_INFINITY;
        if self.config.pruning() {
            self.stats.prune_attempts += 1;
            incumbent = candidates
                .iter()
                .flatten()
                .map(|c| self.objectives.total(c.bound.lower()))
                .fold(f64::NEG_INFINITY, f64::max);
            for slot in candidates.iter_mut() {
                let doomed = slot
                    .as_ref()
                    .map(|c| self.objectives.total(c.bound.upper()) < incumbent - EPSILON)
                    .unwrap_or(false);
                if doomed {
                    *slot = None;
                    self.stats.pruned_outer += 1;
                }
            }
        }

        let bar = (self.depth == 0 && self.config.show_progress)
            .then(|| crate::progress(candidates.iter().flatten().count()));
        let mut best: Option<(Value, JointAction<D::Action>, Vec<JointTransition<D::State>>)> =
            None;
        for i in 0..candidates.len() {
            let Some(candidate) = candidates[i].take() else {
                continue;
            };
            let mut value = self.objectives.zero();
            for transition in &candidate.transitions {
                self.depth += 1;
                let future = self.decouple(&transition.to);
                self.depth -= 1;
                value = value.add(&transition.reward.add(&future?).scale(transition.probability));
            }
            if let Some(bar) = &bar {
                bar.inc(1);
            }
            let adopt = match &best {
                None => true,
                Some((champion, _, _)) => {
                    self.objectives.total(&value) > self.objectives.total(champion) + EPSILON
                }
            };
            if adopt {
                if self.config.bb_tightening {
                    let scalar = self.objectives.total(&value);
                    if incumbent - scalar < EPSILON {
                        incumbent = scalar;
                        for slot in candidates[i + 1..].iter_mut() {
                            let doomed = slot
                                .as_ref()
                                .map(|c| {
                                    self.objectives.total(c.bound.upper()) < incumbent - EPSILON
                                })
                                .unwrap_or(false);
                            if doomed {
                                *slot = None;
                                self.stats.pruned_inner += 1;
                            }
                        }
                    }
                }
                best = Some((value, candidate.action, candidate.transitions));
            }
        }
        if let Some(bar) = bar {
            bar.finish_and_clear();
        }

        let (value, action, transitions) = best.expect("at least one joint action survives");
        let optimal = Optimal {
            action: Some(action),
            transitions,
            value: value.clone(),
        };
        match self.visited.insert(joint.clone(), Some(optimal)) {
            Some(None) => Ok(value),
            _ => Err(SolveError::Cache(format!(
                "search record overwritten for {}",
                joint
            ))),
        }
    }

    /// The CRG node of every agent's current local state.
    fn locate(&self, joint: &JointState<D::State>) -> Result<BTreeMap<AgentId, NodeIndex>> {
        joint
            .agents()
            .into_iter()
            .map(|agent| {
                self.crgs[agent]
                    .lookup(&joint.local(agent))
                    .map(|ix| (agent, ix))
                    .ok_or_else(|| {
                        SolveError::Adapter(format!(
                            "local state of agent {} in {} is absent from its return graph",
                            agent, joint
                        ))
                    })
            })
            .collect()
    }

    /// Expand every joint action available from the state.
    fn expansions(
        &mut self,
        joint: &JointState<D::State>,
        nodes: &BTreeMap<AgentId, NodeIndex>,
    ) -> Result<Vec<Option<Candidate<D::State, D::Action>>>> {
        let choices = nodes
            .iter()
            .map(|(agent, ix)| {
                let actions = self.crgs[*agent]
                    .actions(*ix)
                    .into_iter()
                    .collect::<Vec<D::Action>>();
                match actions.is_empty() {
                    true => Err(SolveError::Adapter(format!(
                        "no actions for non-terminal agent {} at {}",
                        agent, joint
                    ))),
                    false => Ok((*agent, actions)),
                }
            })
            .collect::<Result<Vec<(AgentId, Vec<D::Action>)>>>()?;
        cartesian(&choices)
            .into_iter()
            .map(|assignment| {
                self.expand(joint, nodes, JointAction::new(assignment))
                    .map(Some)
            })
            .collect()
    }

    /// Expand one joint action: enumerate joint successors as the product of
    /// per-agent successors, match each agent's annotated transition, and
    /// accumulate joint reward, probability, and future bound. Successor
    /// probabilities must close to 1.
    fn expand(
        &mut self,
        joint: &JointState<D::State>,
        nodes: &BTreeMap<AgentId, NodeIndex>,
        action: JointAction<D::Action>,
    ) -> Result<Candidate<D::State, D::Action>> {
        self.stats.joint_actions += 1;
        let successors = nodes
            .iter()
            .map(|(agent, ix)| {
                let local = action.get(*agent).expect("agent in scope");
                let targets = self.crgs[*agent]
                    .successors(*ix, local)
                    .into_iter()
                    .collect::<Vec<NodeIndex>>();
                (*agent, targets)
            })
            .collect::<Vec<(AgentId, Vec<NodeIndex>)>>();
        let mut transitions = Vec::new();
        let mut closure = 0.;
        let mut bound = Bound::empty(self.objectives.len());
        for assignment in cartesian(&successors) {
            let to = JointState::new(
                joint.time() + 1,
                assignment
                    .iter()
                    .map(|(agent, ix)| (*agent, self.crgs[*agent].vertex(*ix).state.state.clone()))
                    .collect(),
            );
            let moves = assignment
                .keys()
                .map(|agent| {
                    let from = joint.get(*agent).expect("agent in scope").clone();
                    let into = to.get(*agent).expect("agent in scope").clone();
                    (*agent, (from, into))
                })
                .collect::<BTreeMap<AgentId, (D::State, D::State)>>();
            let mut reward = self.objectives.zero();
            let mut probability = 1.;
            let mut future = Bound::empty(self.objectives.len());
            for (agent, target) in &assignment {
                let crg = &self.crgs[*agent];
                let matched = crg.matching(
                    nodes[agent],
                    action.get(*agent).expect("agent in scope"),
                    *target,
                    action.actions(),
                    &moves,
                )?;
                reward = reward.add(&matched.reward);
                probability *= matched.probability;
                future = future.add(crg.bound(*target)?);
            }
            closure += probability;
            bound = bound.add(&Bound::point(reward.clone()).add(&future).scale(probability));
            transitions.push(JointTransition {
                to,
                reward,
                probability,
                bound: future,
            });
        }
        if (closure - 1.).abs() > EPSILON {
            return Err(SolveError::Adapter(format!(
                "Joint action probabilities should sum to 1: got {} for {} at {}",
                closure, action, joint
            )));
        }
        Ok(Candidate {
            action,
            transitions,
            bound,
        })
    }
}

/// Ordered Cartesian product over per-key option lists.
fn cartesian<K: Ord + Copy, V: Clone>(choices: &[(K, Vec<V>)]) -> Vec<BTreeMap<K, V>> {
    let mut product = vec![BTreeMap::new()];
    for (key, options) in choices {
        let mut next = Vec::with_capacity(product.len() * options.len());
        for partial in &product {
            for option in options {
                let mut extended = partial.clone();
                extended.insert(*key, option.clone());
                next.push(extended);
            }
        }
        product = next;
    }
    product
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Heuristic;
    use crate::domain::LocalState;
    use crate::domain::LocalTransition;
    use crate::domain::Reward;
    use crate::model::function::TimeFunction;
    use crate::mpp::action::Action;
    use crate::mpp::generator::Generator;
    use crate::mpp::instance::Crew;
    use crate::mpp::instance::Instance;
    use crate::mpp::instance::Rule;
    use crate::mpp::instance::SharedModel;
    use crate::mpp::task::Task;
    use std::rc::Rc;

    fn task(id: usize, revenue: f64, cost: f64, duration: usize) -> Task {
        Task {
            id,
            revenue,
            cost: TimeFunction::Constant(cost),
            duration,
            delay_probability: 0.,
            delay_duration: 0,
        }
    }

    fn instance(horizon: usize, crews: Vec<Vec<Task>>, rules: Vec<Rule>) -> Instance {
        Instance {
            version: crate::mpp::instance::VERSION,
            horizon,
            must_complete: false,
            delay_method: Default::default(),
            seed: 0,
            agents: crews
                .into_iter()
                .enumerate()
                .map(|(id, tasks)| Crew { id, tasks })
                .collect(),
            shared_reward: match rules.is_empty() {
                true => None,
                false => Some(SharedModel { rules }),
            },
        }
    }

    fn total(instance: &Instance, config: &Config) -> f64 {
        let domain = instance.domain().unwrap();
        let solution = solve(&domain, config).unwrap();
        domain.objectives().total(solution.policy.expected_value())
    }

    #[test]
    fn singleton_trivial() {
        let instance = instance(1, vec![vec![task(0, 5., 0., 1)]], vec![]);
        let domain = instance.domain().unwrap();
        let solution = solve(&domain, &Config::default()).unwrap();
        let value = domain.objectives().total(solution.policy.expected_value());
        assert!((value - 5.).abs() < EPSILON);
        let decisions = solution
            .policy
            .iter()
            .filter(|(_, record)| record.action.is_some())
            .collect::<Vec<_>>();
        assert_eq!(decisions.len(), 1);
        let (state, record) = decisions[0];
        assert_eq!(state, &domain.initial());
        assert_eq!(record.action.as_ref().unwrap().get(0), Some(&Action::Start(0)));
    }

    #[test]
    fn independent_agents_decouple() {
        let instance = instance(
            1,
            vec![vec![task(0, 3., 0., 1)], vec![task(0, 7., 0., 1)]],
            vec![],
        );
        let domain = instance.domain().unwrap();
        let solution = solve(&domain, &Config::default()).unwrap();
        let value = domain.objectives().total(solution.policy.expected_value());
        assert!((value - 10.).abs() < EPSILON);
        assert_eq!(solution.stats.decoupled, 1);
        assert_eq!(solution.stats.components, 2);
    }

    #[test]
    fn shared_penalty_avoids_the_bad_pair() {
        let instance = instance(
            1,
            vec![
                vec![task(0, 5., 0., 1), task(1, 0., 0., 1)],
                vec![task(0, 5., 0., 1), task(1, 0., 0., 1)],
            ],
            vec![Rule {
                actions: vec![(0, 0), (1, 0)],
                reward: TimeFunction::Constant(-8.),
                weight: 1.,
            }],
        );
        let domain = instance.domain().unwrap();
        let solution = solve(&domain, &Config::default()).unwrap();
        let value = domain.objectives().total(solution.policy.expected_value());
        assert!((value - 5.).abs() < EPSILON);
        let action = solution.policy.query(&domain.initial()).unwrap();
        let both = action.get(0) == Some(&Action::Start(0)) && action.get(1) == Some(&Action::Start(0));
        assert!(!both, "the penalized pair is never optimal");
    }

    #[test]
    fn stochastic_delay_discounts_expected_value() {
        let mut instance = instance(
            3,
            vec![vec![Task {
                id: 0,
                revenue: 100.,
                cost: TimeFunction::Constant(10.),
                duration: 2,
                delay_probability: 0.3,
                delay_duration: 1,
            }]],
            vec![],
        );
        instance.seed = 1;
        let value = total(&instance, &Config::default());
        assert!((value - 77.).abs() < EPSILON);
    }

    /// An adapter whose outcome probabilities sum to 0.9.
    struct Skewed;

    impl Domain for Skewed {
        type State = u8;
        type Action = u8;
        fn agents(&self) -> usize {
            1
        }
        fn horizon(&self) -> usize {
            1
        }
        fn objectives(&self) -> Objectives {
            Objectives::uniform(&["reward"])
        }
        fn initial(&self) -> JointState<u8> {
            JointState::new(0, [(0, 0)].into_iter().collect())
        }
        fn rewards(&self) -> Vec<Rc<dyn Reward<u8, u8>>> {
            Vec::new()
        }
        fn actions(&self, local: &LocalState<u8>) -> Vec<u8> {
            match local.time {
                0 => vec![0],
                _ => Vec::new(),
            }
        }
        fn outcomes(&self, _local: &LocalState<u8>, _action: &u8) -> Vec<u8> {
            vec![1, 2]
        }
        fn probability(&self, _step: &LocalTransition<u8, u8>) -> f64 {
            0.45
        }
    }

    #[test]
    fn probability_sum_violation_surfaces() {
        let error = solve(&Skewed, &Config::default()).unwrap_err();
        match error {
            SolveError::Adapter(context) => assert!(context.contains("sum")),
            other => panic!("expected an adapter violation, got {}", other),
        }
    }

    #[test]
    fn timeout_aborts_without_a_policy() {
        let instance = Generator {
            crews: 3,
            tasks: 4,
            interaction: 0.6,
            seed: 2,
            ..Generator::default()
        }
        .generate();
        let domain = instance.domain().unwrap();
        let config = Config {
            bb_pruning: false,
            bb_tightening: false,
            local_cri: false,
            decouple_cri: false,
            max_runtime_ms: 10,
            ..Config::default()
        };
        match solve(&domain, &config) {
            Err(SolveError::Timeout) => {}
            Err(other) => panic!("expected timeout, got {}", other),
            Ok(_) => panic!("expected timeout, got a policy"),
        }
    }

    #[test]
    fn value_invariant_under_configuration_and_assignment() {
        for seed in 0..4 {
            let instance = Generator {
                crews: 2,
                tasks: 2,
                interaction: 0.6,
                seed,
                ..Generator::default()
            }
            .generate();
            let baseline = total(
                &instance,
                &Config {
                    bb_pruning: false,
                    bb_tightening: false,
                    local_cri: false,
                    decouple_cri: false,
                    ..Config::default()
                },
            );
            for (pruning, tightening, local, decouple) in [
                (true, true, true, true),
                (true, false, false, false),
                (false, true, false, false),
                (false, false, true, false),
                (false, false, false, true),
            ] {
                let config = Config {
                    bb_pruning: pruning,
                    bb_tightening: tightening,
                    local_cri: local,
                    decouple_cri: decouple,
                    ..Config::default()
                };
                assert!((total(&instance, &config) - baseline).abs() < EPSILON);
            }
            for heuristic in [
                Heuristic::Balanced,
                Heuristic::LowestDegree,
                Heuristic::HighestDegree,
                Heuristic::Random(seed),
            ] {
                let config = Config {
                    assignment: heuristic,
                    ..Config::default()
                };
                assert!((total(&instance, &config) - baseline).abs() < EPSILON);
            }
        }
    }

    #[test]
    fn policy_is_closed_and_total() {
        let instance = Generator {
            crews: 2,
            tasks: 2,
            interaction: 0.6,
            seed: 5,
            ..Generator::default()
        }
        .generate();
        let domain = instance.domain().unwrap();
        let solution = solve(&domain, &Config::default()).unwrap();
        let policy = &solution.policy;
        let mut frontier = vec![domain.initial()];
        let mut seen = std::collections::BTreeSet::new();
        while let Some(state) = frontier.pop() {
            if !seen.insert(state.clone()) {
                continue;
            }
            let record = policy
                .record(&state)
                .expect("every reachable state is in the policy map");
            match &record.action {
                None => assert!(record.transitions.is_empty()),
                Some(_) => {
                    assert!(!record.transitions.is_empty());
                    assert!(policy.query(&state).is_ok());
                    let closure: f64 = record.transitions.iter().map(|t| t.probability).sum();
                    assert!((closure - 1.).abs() < EPSILON);
                    frontier.extend(record.transitions.iter().map(|t| t.to.clone()));
                }
            }
        }
        // an unreachable state is refused
        let unreachable = JointState::new(
            domain.horizon() + 1,
            domain.initial().iter().map(|(a, s)| (*a, s.clone())).collect(),
        );
        assert!(matches!(
            policy.query(&unreachable),
            Err(SolveError::Unsolved)
        ));
    }

    #[test]
    fn repeated_solves_agree() {
        let instance = Generator {
            crews: 2,
            tasks: 2,
            interaction: 0.4,
            seed: 9,
            ..Generator::default()
        }
        .generate();
        let first = total(&instance, &Config::default());
        let second = total(&instance, &Config::default());
        assert!((first - second).abs() < EPSILON);
    }
}
