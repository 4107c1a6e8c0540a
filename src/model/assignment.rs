use crate::AgentId;
use crate::config::Heuristic;
use crate::domain::Reward;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::rc::Rc;

/// Assign every reward to exactly one owner agent. Private rewards go to
/// their unique scope member; shared rewards follow the heuristic. Rewards
/// are processed in creation order and ties break toward the lowest agent
/// ID, so the assignment is reproducible.
pub fn assign<S: Ord, A: Ord>(
    rewards: &[Rc<dyn Reward<S, A>>],
    agents: usize,
    heuristic: Heuristic,
) -> Vec<Vec<Rc<dyn Reward<S, A>>>> {
    let mut owned: Vec<Vec<Rc<dyn Reward<S, A>>>> = vec![Vec::new(); agents];
    let degrees = degrees(rewards, agents);
    let mut rng = match heuristic {
        Heuristic::Random(seed) => Some(SmallRng::seed_from_u64(seed)),
        _ => None,
    };
    for reward in rewards {
        let scope = reward.scope();
        assert!(!scope.is_empty(), "reward with empty scope");
        let owner = match scope.len() {
            1 => *scope.first().expect("nonempty scope"),
            _ => match heuristic {
                Heuristic::Balanced => argbest(scope, |a| owned[a].len(), false),
                Heuristic::LowestDegree => argbest(scope, |a| degrees[a], false),
                Heuristic::HighestDegree => argbest(scope, |a| degrees[a], true),
                Heuristic::Random(_) => {
                    let members = scope.iter().copied().collect::<Vec<AgentId>>();
                    let rng = rng.as_mut().expect("seeded generator");
                    members[rng.random_range(0..members.len())]
                }
            },
        };
        owned[owner].push(Rc::clone(reward));
    }
    owned
}

/// Coordination-graph degree per agent: for each shared reward containing
/// the agent, scope size minus one.
fn degrees<S: Ord, A: Ord>(rewards: &[Rc<dyn Reward<S, A>>], agents: usize) -> Vec<usize> {
    let mut degrees = vec![0; agents];
    for reward in rewards.iter().filter(|r| r.scope().len() >= 2) {
        for agent in reward.scope() {
            degrees[*agent] += reward.scope().len() - 1;
        }
    }
    degrees
}

/// First (lowest-ID) scope member minimizing, or maximizing, the key.
fn argbest(
    scope: &std::collections::BTreeSet<AgentId>,
    key: impl Fn(AgentId) -> usize,
    maximize: bool,
) -> AgentId {
    scope
        .iter()
        .copied()
        .reduce(|best, next| {
            let better = match maximize {
                false => key(next) < key(best),
                true => key(next) > key(best),
            };
            if better { next } else { best }
        })
        .expect("nonempty scope")
}
