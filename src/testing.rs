//! Test-only domains. `Relay` is deliberately tiny: two agents walking a
//! line, a private effort cost per move, and one shared bonus that pays out
//! when agent 0 moves in the same step that agent 1 steps off the origin.
//! The bonus couples the agents through *state influence* rather than action
//! dependency, which the bundled maintenance domain never does.

use crate::AgentId;
use crate::Probability;
use crate::Time;
use crate::crg::others::Others;
use crate::domain::Domain;
use crate::domain::LocalState;
use crate::domain::LocalTransition;
use crate::domain::Reward;
use crate::model::value::Objectives;
use crate::model::value::Value;
use crate::search::joint::JointState;
use std::collections::BTreeSet;
use std::rc::Rc;

pub const BONUS: usize = 0;
pub const EFFORT: usize = 1;

pub type Position = u8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Step {
    Move,
    Stay,
}

/// Private cost of moving.
pub struct Effort {
    scope: BTreeSet<AgentId>,
    cost: f64,
}

impl Reward<Position, Step> for Effort {
    fn label(&self) -> String {
        format!("effort{:?}", self.scope)
    }
    fn scope(&self) -> &BTreeSet<AgentId> {
        &self.scope
    }
    fn evaluate(
        &self,
        step: &LocalTransition<Position, Step>,
        _depends: &Others<Step>,
        _influence: &Others<(Position, Position)>,
    ) -> Value {
        let mut value = Value::zero(2);
        if step.action == Step::Move {
            value.accrue(EFFORT, -self.cost);
        }
        value
    }
    fn local_cri(&self, _agent: AgentId, _state: &LocalState<Position>) -> bool {
        true
    }
    fn cri(&self, _a: AgentId, _b: AgentId, _joint: &JointState<Position>) -> bool {
        true
    }
}

/// Shared bonus: agent 0 moves while agent 1 transitions off the origin.
/// Evaluates correctly from either owner's side: as an influence on agent
/// 1's state transition when agent 0 owns it, as a dependency on agent 0's
/// action when agent 1 does.
pub struct Handoff {
    scope: BTreeSet<AgentId>,
    bonus: f64,
    horizon: Time,
}

impl Reward<Position, Step> for Handoff {
    fn label(&self) -> String {
        "handoff".to_string()
    }
    fn scope(&self) -> &BTreeSet<AgentId> {
        &self.scope
    }
    fn evaluate(
        &self,
        step: &LocalTransition<Position, Step>,
        depends: &Others<Step>,
        influence: &Others<(Position, Position)>,
    ) -> Value {
        let mut value = Value::zero(2);
        let fires = match step.agent {
            0 => {
                step.action == Step::Move
                    && influence
                        .explicit(1)
                        .map(|tokens| tokens.contains(&(0, 1)))
                        .unwrap_or(false)
            }
            _ => {
                (step.from, step.to) == (0, 1)
                    && depends
                        .explicit(0)
                        .map(|chosen| chosen.contains(&Step::Move))
                        .unwrap_or(false)
            }
        };
        if fires {
            value.accrue(BONUS, self.bonus);
        }
        value
    }
    fn local_cri(&self, agent: AgentId, state: &LocalState<Position>) -> bool {
        match agent {
            // agent 0 can move any step before the horizon
            0 => state.time >= self.horizon,
            // agent 1 only matters while it still sits at the origin
            _ => state.state > 0 || state.time >= self.horizon,
        }
    }
    fn cri(&self, _a: AgentId, _b: AgentId, joint: &JointState<Position>) -> bool {
        joint
            .get(1)
            .map(|position| *position > 0)
            .unwrap_or(false)
            || joint.time() >= self.horizon
    }
    fn dependencies(
        &self,
        step: &LocalTransition<Position, Step>,
        other: AgentId,
    ) -> BTreeSet<Step> {
        match (step.agent, (step.from, step.to), other) {
            (1, (0, 1), 0) => BTreeSet::from([Step::Move]),
            _ => BTreeSet::new(),
        }
    }
    fn influences(
        &self,
        step: &LocalTransition<Position, Step>,
        other: AgentId,
    ) -> BTreeSet<(Position, Position)> {
        match (step.agent, step.action, other) {
            (0, Step::Move, 1) => BTreeSet::from([(0, 1)]),
            _ => BTreeSet::new(),
        }
    }
}

/// The two-agent relay domain.
pub struct Relay {
    pub horizon: Time,
    pub bonus: f64,
}

impl Default for Relay {
    fn default() -> Self {
        Self {
            horizon: 2,
            bonus: 10.,
        }
    }
}

impl Domain for Relay {
    type State = Position;
    type Action = Step;

    fn agents(&self) -> usize {
        2
    }
    fn horizon(&self) -> Time {
        self.horizon
    }
    fn objectives(&self) -> Objectives {
        Objectives::uniform(&["bonus", "effort"])
    }
    fn initial(&self) -> JointState<Position> {
        JointState::new(0, (0..2).map(|agent| (agent, 0)).collect())
    }
    fn rewards(&self) -> Vec<Rc<dyn Reward<Position, Step>>> {
        vec![
            Rc::new(Effort {
                scope: BTreeSet::from([0]),
                cost: 1.,
            }),
            Rc::new(Effort {
                scope: BTreeSet::from([1]),
                cost: 2.,
            }),
            Rc::new(Handoff {
                scope: BTreeSet::from([0, 1]),
                bonus: self.bonus,
                horizon: self.horizon,
            }),
        ]
    }
    fn actions(&self, local: &LocalState<Position>) -> Vec<Step> {
        match local.time >= self.horizon {
            true => Vec::new(),
            false => vec![Step::Move, Step::Stay],
        }
    }
    fn outcomes(&self, local: &LocalState<Position>, action: &Step) -> Vec<Position> {
        match action {
            Step::Move => vec![local.state + 1],
            Step::Stay => vec![local.state],
        }
    }
    fn probability(&self, _step: &LocalTransition<Position, Step>) -> Probability {
        1.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::config::Heuristic;
    use crate::model::assignment::assign;
    use crate::search::solve;

    #[test]
    fn relay_pays_one_synchronized_handoff() {
        let relay = Relay::default();
        let solution = solve(&relay, &Config::default()).unwrap();
        let objectives = relay.objectives();
        let value = objectives.total(solution.policy.expected_value());
        assert!((value - 7.).abs() < crate::EPSILON);
    }

    #[test]
    fn relay_expands_influence_branches() {
        let relay = Relay::default();
        let solution = solve(&relay, &Config::default()).unwrap();
        let branches: usize = solution
            .stats
            .crgs
            .iter()
            .map(|crg| crg.influence_branches)
            .sum();
        assert!(branches > 0);
    }

    #[test]
    fn relay_value_is_invariant_under_configuration() {
        let relay = Relay::default();
        let objectives = relay.objectives();
        let baseline = {
            let config = Config {
                bb_pruning: false,
                bb_tightening: false,
                local_cri: false,
                decouple_cri: false,
                ..Config::default()
            };
            objectives.total(solve(&relay, &config).unwrap().policy.expected_value())
        };
        for pruning in [false, true] {
            for tightening in [false, true] {
                for local in [false, true] {
                    for decouple in [false, true] {
                        let config = Config {
                            bb_pruning: pruning,
                            bb_tightening: tightening,
                            local_cri: local,
                            decouple_cri: decouple,
                            ..Config::default()
                        };
                        let value = objectives
                            .total(solve(&relay, &config).unwrap().policy.expected_value());
                        assert!((value - baseline).abs() < crate::EPSILON);
                    }
                }
            }
        }
    }

    #[test]
    fn assignment_respects_heuristics() {
        let relay = Relay::default();
        let rewards = relay.rewards();
        for heuristic in [
            Heuristic::Balanced,
            Heuristic::LowestDegree,
            Heuristic::HighestDegree,
            Heuristic::Random(13),
        ] {
            let owned = assign(&rewards, relay.agents(), heuristic);
            // every reward has exactly one owner within its scope
            assert_eq!(owned.iter().map(Vec::len).sum::<usize>(), rewards.len());
            // private efforts stay home
            assert!(owned[0].iter().any(|r| r.label() == "effort{0}"));
            assert!(owned[1].iter().any(|r| r.label() == "effort{1}"));
        }
    }
}
