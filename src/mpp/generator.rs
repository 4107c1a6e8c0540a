use super::instance::Crew;
use super::instance::Instance;
use super::instance::Rule;
use super::instance::SharedModel;
use super::task::DelayMethod;
use super::task::Task;
use crate::Arbitrary;
use crate::Time;
use crate::model::function::TimeFunction;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;

/// Seeded random instance generation. Horizons are sized to the worst-case
/// workload, so generated instances are always feasible under
/// `must_complete`.
#[derive(Clone, Debug)]
pub struct Generator {
    pub crews: usize,
    pub tasks: usize,
    /// Zero means: worst-case workload plus one step of slack.
    pub horizon: Time,
    /// Probability of a shared rule per cross-crew task pair.
    pub interaction: f64,
    pub must_complete: bool,
    pub seed: u64,
}

impl Default for Generator {
    fn default() -> Self {
        Self {
            crews: 3,
            tasks: 2,
            horizon: 0,
            interaction: 0.3,
            must_complete: false,
            seed: 0,
        }
    }
}

impl Generator {
    pub fn generate(&self) -> Instance {
        let mut rng = SmallRng::seed_from_u64(self.seed);
        let agents = (0..self.crews)
            .map(|id| Crew {
                id,
                tasks: (0..self.tasks).map(|task| self.task(task, &mut rng)).collect(),
            })
            .collect::<Vec<Crew>>();
        let horizon = match self.horizon {
            0 => {
                1 + agents
                    .iter()
                    .map(|crew| crew.tasks.iter().map(Task::delayed).sum::<Time>())
                    .max()
                    .unwrap_or(0)
            }
            fixed => fixed,
        };
        let mut rules = Vec::new();
        for a in 0..self.crews {
            for b in a + 1..self.crews {
                for x in 0..self.tasks {
                    for y in 0..self.tasks {
                        if rng.random_bool(self.interaction) {
                            rules.push(Rule {
                                actions: vec![(a, x), (b, y)],
                                reward: TimeFunction::Constant(
                                    -(rng.random_range(5..25) as f64),
                                ),
                                weight: 1.,
                            });
                        }
                    }
                }
            }
        }
        Instance {
            version: super::instance::VERSION,
            horizon,
            must_complete: self.must_complete,
            delay_method: DelayMethod::AtStart,
            seed: self.seed,
            agents,
            shared_reward: match rules.is_empty() {
                true => None,
                false => Some(SharedModel { rules }),
            },
        }
    }

    fn task(&self, id: usize, rng: &mut SmallRng) -> Task {
        let delayed = rng.random_bool(0.5);
        Task {
            id,
            revenue: rng.random_range(20..120) as f64,
            cost: match rng.random_bool(0.5) {
                true => TimeFunction::Constant(rng.random_range(1..8) as f64),
                false => TimeFunction::Linear {
                    a: rng.random_range(1..3) as f64,
                    b: rng.random_range(0..5) as f64,
                },
            },
            duration: rng.random_range(1..=2),
            delay_probability: match delayed {
                true => rng.random_range(1..5) as f64 / 10.,
                false => 0.,
            },
            delay_duration: match delayed {
                true => 1,
                false => 0,
            },
        }
    }
}

impl Arbitrary for Instance {
    fn random() -> Self {
        Generator {
            seed: rand::random(),
            ..Generator::default()
        }
        .generate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_instances_validate() {
        for seed in 0..16 {
            let instance = Generator {
                seed,
                must_complete: seed % 2 == 0,
                ..Generator::default()
            }
            .generate();
            assert!(instance.validate().is_ok());
            assert!(instance.domain().is_ok());
        }
    }

    #[test]
    fn same_seed_same_instance() {
        let a = Generator::default().generate();
        let b = Generator::default().generate();
        assert_eq!(a, b);
    }
}
