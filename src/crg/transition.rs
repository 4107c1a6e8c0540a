use super::others::Others;
use crate::Probability;
use crate::model::value::Value;

/// One annotated local transition: a local action and successor together
/// with the joint context it applies to. The dependency collection ranges
/// over other agents' actions, the influence collection over their state
/// transitions. Reward is the total contribution of the owner's rewards
/// under exactly this context; probability is strictly the local transition
/// probability, identical across contexts.
#[derive(Clone, Debug)]
pub struct Annotated<S: Ord, A: Ord> {
    pub action: A,
    pub depends: Others<A>,
    pub influence: Others<(S, S)>,
    pub reward: Value,
    pub probability: Probability,
}

impl<S: Ord + std::fmt::Debug, A: Ord + std::fmt::Debug> std::fmt::Display for Annotated<S, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?} p={:.4} r={} dep[{}] inf[{}]",
            self.action, self.probability, self.reward, self.depends, self.influence
        )
    }
}
