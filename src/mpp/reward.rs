use super::COST;
use super::NETWORK;
use super::OBJECTIVES;
use super::REVENUE;
use super::action::Action;
use super::state::Progress;
use super::task::Task;
use super::task::TaskId;
use crate::AgentId;
use crate::Time;
use crate::crg::others::Others;
use crate::domain::LocalState;
use crate::domain::LocalTransition;
use crate::domain::Reward;
use crate::model::function::TimeFunction;
use crate::model::value::Value;
use crate::search::joint::JointState;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

/// A crew's private reward: every working step pays the task's cost, every
/// completion collects its revenue. Reads only its own agent, so it never
/// couples the search.
pub struct Upkeep {
    agent: AgentId,
    scope: BTreeSet<AgentId>,
    tasks: Vec<Task>,
    horizon: Time,
}

impl Upkeep {
    pub fn new(agent: AgentId, tasks: Vec<Task>, horizon: Time) -> Self {
        Self {
            agent,
            scope: BTreeSet::from([agent]),
            tasks,
            horizon,
        }
    }

    fn task(&self, id: TaskId) -> &Task {
        self.tasks
            .iter()
            .find(|task| task.id == id)
            .expect("task of this crew")
    }
}

impl Reward<Progress, Action> for Upkeep {
    fn label(&self) -> String {
        format!("upkeep[{}]", self.agent)
    }

    fn scope(&self) -> &BTreeSet<AgentId> {
        &self.scope
    }

    fn evaluate(
        &self,
        step: &LocalTransition<Progress, Action>,
        _depends: &Others<Action>,
        _influence: &Others<(Progress, Progress)>,
    ) -> Value {
        let mut value = Value::zero(OBJECTIVES.len());
        let working = match step.action {
            Action::Start(task) => Some(task),
            Action::Continue => step.from.busy().map(|(task, _)| task),
            Action::Idle => None,
        };
        if let Some(task) = working {
            value.accrue(COST, -self.task(task).cost.eval(step.time, self.horizon));
        }
        if let Some(task) = step.to.completed(&step.from) {
            value.accrue(REVENUE, self.task(task).revenue);
        }
        value
    }

    fn local_cri(&self, _agent: AgentId, _state: &LocalState<Progress>) -> bool {
        true
    }

    fn cri(&self, _a: AgentId, _b: AgentId, _joint: &JointState<Progress>) -> bool {
        true
    }
}

/// A shared network penalty: fires when every start-action of its rule is
/// executed concurrently. Couples exactly the agents whose tasks the rule
/// names; the coupling dies for good once any of them can no longer start
/// its rule task.
pub struct Congestion {
    index: usize,
    scope: BTreeSet<AgentId>,
    starts: BTreeMap<AgentId, TaskId>,
    function: TimeFunction,
    horizon: Time,
}

impl Congestion {
    /// `starts` is the rule's action set, one start per agent; `function` is
    /// already weighted.
    pub fn new(
        index: usize,
        starts: BTreeMap<AgentId, TaskId>,
        function: TimeFunction,
        horizon: Time,
    ) -> Self {
        Self {
            index,
            scope: starts.keys().copied().collect(),
            starts,
            function,
            horizon,
        }
    }

    /// Can `agent` ever start its rule task from this local state onward?
    /// Requires the task untouched and an idle step left before the horizon.
    fn startable(&self, agent: AgentId, local: &LocalState<Progress>) -> bool {
        let task = *self.starts.get(&agent).expect("agent in scope");
        let earliest = local.time + local.state.busy().map(|(_, r)| r).unwrap_or(0);
        local.state.startable(task) && earliest < self.horizon
    }
}

impl Reward<Progress, Action> for Congestion {
    fn label(&self) -> String {
        format!("congestion[{}]", self.index)
    }

    fn scope(&self) -> &BTreeSet<AgentId> {
        &self.scope
    }

    fn evaluate(
        &self,
        step: &LocalTransition<Progress, Action>,
        depends: &Others<Action>,
        _influence: &Others<(Progress, Progress)>,
    ) -> Value {
        let mut value = Value::zero(OBJECTIVES.len());
        let own = *self.starts.get(&step.agent).expect("agent in scope");
        let fires = step.action == Action::Start(own)
            && self
                .starts
                .iter()
                .filter(|(agent, _)| **agent != step.agent)
                .all(|(agent, task)| {
                    depends
                        .explicit(*agent)
                        .map(|chosen| chosen.contains(&Action::Start(*task)))
                        .unwrap_or(false)
                });
        if fires {
            value.accrue(NETWORK, self.function.eval(step.time, self.horizon));
        }
        value
    }

    fn local_cri(&self, agent: AgentId, state: &LocalState<Progress>) -> bool {
        !self.startable(agent, state)
    }

    fn cri(&self, _a: AgentId, _b: AgentId, joint: &JointState<Progress>) -> bool {
        // the rule needs every one of its starts; one dead start kills it
        self.scope
            .iter()
            .filter(|agent| joint.contains(**agent))
            .any(|agent| !self.startable(*agent, &joint.local(*agent)))
    }

    fn dependencies(
        &self,
        step: &LocalTransition<Progress, Action>,
        other: AgentId,
    ) -> BTreeSet<Action> {
        let own = *self.starts.get(&step.agent).expect("agent in scope");
        match (step.action == Action::Start(own), self.starts.get(&other)) {
            (true, Some(task)) => BTreeSet::from([Action::Start(*task)]),
            _ => BTreeSet::new(),
        }
    }
}
