use super::OBJECTIVES;
use super::action::Action;
use super::instance::Crew;
use super::reward::Congestion;
use super::reward::Upkeep;
use super::state::Progress;
use super::task::DelayMethod;
use super::task::Task;
use super::task::TaskId;
use crate::AgentId;
use crate::Probability;
use crate::Time;
use crate::domain::Domain;
use crate::domain::LocalState;
use crate::domain::LocalTransition;
use crate::domain::Reward;
use crate::model::rules::Rules;
use crate::model::value::Objectives;
use crate::search::joint::JointState;
use std::collections::BTreeMap;
use std::rc::Rc;

/// The maintenance-planning domain adapter. Built from a validated
/// instance; immutable for the lifetime of a solve.
pub struct Mpp {
    horizon: Time,
    must_complete: bool,
    delay_method: DelayMethod,
    crews: Vec<Crew>,
    rules: Rules<(AgentId, TaskId)>,
}

impl Mpp {
    pub(crate) fn new(
        horizon: Time,
        must_complete: bool,
        delay_method: DelayMethod,
        crews: Vec<Crew>,
        rules: Rules<(AgentId, TaskId)>,
    ) -> Self {
        Self {
            horizon,
            must_complete,
            delay_method,
            crews,
            rules,
        }
    }

    pub fn rules(&self) -> &Rules<(AgentId, TaskId)> {
        &self.rules
    }

    fn crew(&self, agent: AgentId) -> &Crew {
        &self.crews[agent]
    }

    fn task(&self, agent: AgentId, id: TaskId) -> &Task {
        self.crew(agent)
            .tasks
            .iter()
            .find(|task| task.id == id)
            .expect("task of this crew")
    }

    /// Worst-case steps of work left for a crew: the committed remainder of
    /// the busy task plus every untouched task at its delayed duration.
    fn workload(&self, agent: AgentId, progress: &Progress) -> Time {
        let committed = progress.busy().map(|(_, remaining)| remaining).unwrap_or(0);
        let pending = self
            .crew(agent)
            .tasks
            .iter()
            .filter(|task| progress.startable(task.id))
            .map(|task| match self.delay_method {
                DelayMethod::Never => task.duration,
                DelayMethod::AtStart => task.delayed(),
            })
            .sum::<Time>();
        committed + pending
    }
}

impl Domain for Mpp {
    type State = Progress;
    type Action = Action;

    fn agents(&self) -> usize {
        self.crews.len()
    }

    fn horizon(&self) -> Time {
        self.horizon
    }

    fn objectives(&self) -> Objectives {
        Objectives::uniform(&OBJECTIVES)
    }

    fn initial(&self) -> JointState<Progress> {
        JointState::new(
            0,
            self.crews
                .iter()
                .map(|crew| (crew.id, Progress::new()))
                .collect(),
        )
    }

    fn rewards(&self) -> Vec<Rc<dyn Reward<Progress, Action>>> {
        let mut rewards: Vec<Rc<dyn Reward<Progress, Action>>> = self
            .crews
            .iter()
            .map(|crew| {
                Rc::new(Upkeep::new(crew.id, crew.tasks.clone(), self.horizon))
                    as Rc<dyn Reward<Progress, Action>>
            })
            .collect();
        for (index, (actions, function)) in self.rules.iter().enumerate() {
            let starts = actions
                .iter()
                .map(|(agent, task)| (*agent, *task))
                .collect::<BTreeMap<AgentId, TaskId>>();
            rewards.push(Rc::new(Congestion::new(
                index,
                starts,
                function.clone(),
                self.horizon,
            )));
        }
        rewards
    }

    fn actions(&self, local: &LocalState<Progress>) -> Vec<Action> {
        if local.time >= self.horizon {
            return Vec::new();
        }
        match local.state.busy() {
            Some(_) => vec![Action::Continue],
            None => {
                let mut actions = self
                    .crew(local.agent)
                    .tasks
                    .iter()
                    .filter(|task| !local.state.is_done(task.id))
                    .map(|task| Action::Start(task.id))
                    .collect::<Vec<Action>>();
                let slack = local.time + 1 + self.workload(local.agent, &local.state)
                    <= self.horizon;
                if !self.must_complete || slack || actions.is_empty() {
                    actions.push(Action::Idle);
                }
                actions
            }
        }
    }

    fn outcomes(&self, local: &LocalState<Progress>, action: &Action) -> Vec<Progress> {
        match action {
            Action::Start(id) => self
                .task(local.agent, *id)
                .prospects(self.delay_method)
                .into_iter()
                .map(|(duration, _)| local.state.start(*id, duration))
                .collect(),
            Action::Continue => vec![local.state.advance()],
            Action::Idle => vec![local.state.clone()],
        }
    }

    fn probability(&self, step: &LocalTransition<Progress, Action>) -> Probability {
        match step.action {
            Action::Start(id) => self
                .task(step.agent, id)
                .prospects(self.delay_method)
                .into_iter()
                .find(|(duration, _)| step.to == step.from.start(id, *duration))
                .map(|(_, p)| p)
                .unwrap_or(0.),
            Action::Continue | Action::Idle => 1.,
        }
    }
}
