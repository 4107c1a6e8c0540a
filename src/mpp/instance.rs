use super::domain::Mpp;
use super::task::DelayMethod;
use super::task::Task;
use super::task::TaskId;
use crate::AgentId;
use crate::Time;
use crate::model::function::TimeFunction;
use crate::model::rules::Rules;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;

/// Current instance format version. Readers accept anything up to this and
/// fill defaults for fields introduced along the way: v1 carried horizon,
/// agents, tasks, and the shared reward; v2 added `must_complete` and
/// `delay_method`.
pub const VERSION: u32 = 2;

fn current_version() -> u32 {
    VERSION
}
fn unit_weight() -> f64 {
    1.
}

/// One agent of the instance: a dense ID and the tasks it owns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Crew {
    pub id: AgentId,
    pub tasks: Vec<Task>,
}

/// One shared rule: a set of start-actions `(agent, task)` of distinct
/// agents mapped to a weighted time-dependent reward.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub actions: Vec<(AgentId, TaskId)>,
    pub reward: TimeFunction,
    #[serde(default = "unit_weight")]
    pub weight: f64,
}

/// The optional shared-reward model of an instance.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SharedModel {
    pub rules: Vec<Rule>,
}

/// A maintenance-planning problem instance as serialized to disk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    #[serde(default = "current_version")]
    pub version: u32,
    pub horizon: Time,
    #[serde(default)]
    pub must_complete: bool,
    #[serde(default)]
    pub delay_method: DelayMethod,
    #[serde(default)]
    pub seed: u64,
    pub agents: Vec<Crew>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_reward: Option<SharedModel>,
}

/// The root wrapper of the file format.
#[derive(Serialize, Deserialize)]
struct File {
    instance: Instance,
}

impl Instance {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let file: File = serde_json::from_str(json)?;
        let instance = file.instance;
        anyhow::ensure!(
            instance.version <= VERSION,
            "instance version {} is newer than supported {}",
            instance.version,
            VERSION
        );
        instance.validate()?;
        Ok(instance)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&File {
            instance: self.clone(),
        })
        .expect("serializable instance")
    }

    pub fn read(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        Ok(std::fs::write(path, self.to_json())?)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for (position, crew) in self.agents.iter().enumerate() {
            anyhow::ensure!(
                crew.id == position,
                "crew IDs must be dense and ordered, found {} at {}",
                crew.id,
                position
            );
            let mut ids = BTreeSet::new();
            for task in &crew.tasks {
                anyhow::ensure!(ids.insert(task.id), "duplicate task {} of crew {}", task.id, crew.id);
                anyhow::ensure!(task.duration >= 1, "zero duration task {} of crew {}", task.id, crew.id);
                anyhow::ensure!(
                    (0. ..=1.).contains(&task.delay_probability),
                    "delay probability {} out of range for task {} of crew {}",
                    task.delay_probability,
                    task.id,
                    crew.id
                );
            }
            if self.must_complete {
                let worst = crew
                    .tasks
                    .iter()
                    .map(|task| match self.delay_method {
                        DelayMethod::Never => task.duration,
                        DelayMethod::AtStart => task.delayed(),
                    })
                    .sum::<Time>();
                anyhow::ensure!(
                    worst <= self.horizon,
                    "infeasible: crew {} needs up to {} steps within horizon {}",
                    crew.id,
                    worst,
                    self.horizon
                );
            }
        }
        for rule in self.shared_reward.iter().flat_map(|model| &model.rules) {
            anyhow::ensure!(rule.actions.len() >= 2, "rule with fewer than two actions");
            let agents = rule
                .actions
                .iter()
                .map(|(agent, _)| *agent)
                .collect::<BTreeSet<AgentId>>();
            anyhow::ensure!(
                agents.len() == rule.actions.len(),
                "rule lists two actions of one agent"
            );
            for (agent, task) in &rule.actions {
                let crew = self
                    .agents
                    .get(*agent)
                    .ok_or_else(|| anyhow::anyhow!("rule names unknown agent {}", agent))?;
                anyhow::ensure!(
                    crew.tasks.iter().any(|t| t.id == *task),
                    "rule names unknown task {} of agent {}",
                    task,
                    agent
                );
            }
        }
        Ok(())
    }

    /// Build the domain adapter. Duplicate rule action-sets are no-ops, as
    /// the rule container specifies.
    pub fn domain(&self) -> anyhow::Result<Mpp> {
        self.validate()?;
        let mut rules = Rules::new();
        for rule in self.shared_reward.iter().flat_map(|model| &model.rules) {
            let actions = rule.actions.iter().copied().collect::<BTreeSet<(AgentId, TaskId)>>();
            if !rules.add(actions, rule.reward.weighted(rule.weight)) {
                log::warn!("dropping duplicate shared rule {:?}", rule.actions);
            }
        }
        Ok(Mpp::new(
            self.horizon,
            self.must_complete,
            self.delay_method,
            self.agents.clone(),
            rules,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> Instance {
        Instance {
            version: VERSION,
            horizon: 3,
            must_complete: false,
            delay_method: DelayMethod::AtStart,
            seed: 7,
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

    #[test]
    fn round_trips_through_json() {
        let instance = minimal();
        let back = Instance::from_json(&instance.to_json()).unwrap();
        assert_eq!(instance, back);
    }

    #[test]
    fn rejects_future_versions() {
        let mut instance = minimal();
        instance.version = VERSION + 1;
        assert!(Instance::from_json(&instance.to_json()).is_err());
    }

    #[test]
    fn old_versions_get_defaults() {
        let json = r#"{"instance":{"version":1,"horizon":2,"agents":[
            {"id":0,"tasks":[{"id":0,"revenue":5.0,"cost":"constant;0","duration":1}]}
        ]}}"#;
        let instance = Instance::from_json(json).unwrap();
        assert!(!instance.must_complete);
        assert_eq!(instance.delay_method, DelayMethod::AtStart);
        assert_eq!(instance.seed, 0);
        assert_eq!(instance.agents[0].tasks[0].delay_probability, 0.);
        assert_eq!(instance.agents[0].tasks[0].delay_duration, 0);
    }

    #[test]
    fn rejects_infeasible_must_complete() {
        let mut instance = minimal();
        instance.must_complete = true;
        instance.horizon = 2;
        assert!(instance.validate().is_err());
        instance.horizon = 3;
        assert!(instance.validate().is_ok());
    }

    #[test]
    fn rejects_bad_rules() {
        let mut instance = minimal();
        instance.shared_reward = Some(SharedModel {
            rules: vec![Rule {
                actions: vec![(0, 0), (1, 0)],
                reward: TimeFunction::Constant(-8.),
                weight: 1.,
            }],
        });
        assert!(instance.validate().is_err());
    }
}
