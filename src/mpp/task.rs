use crate::Probability;
use crate::Time;
use crate::Utility;
use crate::model::function::TimeFunction;
use serde::Deserialize;
use serde::Serialize;

pub type TaskId = usize;

/// How task delays are drawn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayMethod {
    /// The delay is resolved stochastically on the start transition.
    #[default]
    AtStart,
    /// Delays are ignored; every task runs its nominal duration.
    Never,
}

/// One unit of work a crew can schedule: occupies the crew for `duration`
/// steps (or `duration + delay_duration` when the delay strikes), pays the
/// time-dependent cost every working step, and earns the revenue on the
/// completion transition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub revenue: Utility,
    pub cost: TimeFunction,
    pub duration: Time,
    #[serde(default)]
    pub delay_probability: Probability,
    #[serde(default)]
    pub delay_duration: Time,
}

impl Task {
    /// Worst-case duration with the delay realized.
    pub fn delayed(&self) -> Time {
        self.duration + self.delay_duration
    }

    /// The possible total durations with their probabilities under the given
    /// delay method. Degenerate delay parameters collapse to one outcome.
    pub fn prospects(&self, method: DelayMethod) -> Vec<(Time, Probability)> {
        match method {
            DelayMethod::Never => vec![(self.duration, 1.)],
            DelayMethod::AtStart => {
                if self.delay_duration == 0 || self.delay_probability <= crate::EPSILON {
                    vec![(self.duration, 1.)]
                } else if self.delay_probability >= 1. - crate::EPSILON {
                    vec![(self.delayed(), 1.)]
                } else {
                    vec![
                        (self.duration, 1. - self.delay_probability),
                        (self.delayed(), self.delay_probability),
                    ]
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(duration: Time, dp: Probability, dd: Time) -> Task {
        Task {
            id: 0,
            revenue: 100.,
            cost: TimeFunction::Constant(10.),
            duration,
            delay_probability: dp,
            delay_duration: dd,
        }
    }

    #[test]
    fn prospects_close_to_one() {
        for t in [task(2, 0.3, 1), task(1, 0., 0), task(3, 1., 2), task(2, 0.5, 0)] {
            for method in [DelayMethod::AtStart, DelayMethod::Never] {
                let total: Probability = t.prospects(method).iter().map(|(_, p)| p).sum();
                assert!((total - 1.).abs() < crate::EPSILON);
            }
        }
    }

    #[test]
    fn never_ignores_delays() {
        assert_eq!(task(2, 0.9, 3).prospects(DelayMethod::Never), vec![(2, 1.)]);
    }

    #[test]
    fn certain_delay_collapses() {
        assert_eq!(task(2, 1., 3).prospects(DelayMethod::AtStart), vec![(5, 1.)]);
    }
}
