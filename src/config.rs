use std::path::PathBuf;

/// Which agent owns each shared reward. Ownership is purely a performance
/// lever: the policy value is invariant under any assignment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Heuristic {
    /// Owner with the fewest currently-assigned rewards within the scope.
    Balanced,
    /// Owner with the minimum coordination-graph degree.
    LowestDegree,
    /// Owner with the maximum coordination-graph degree.
    HighestDegree,
    /// Owner drawn uniformly from the scope with the seeded generator.
    Random(u64),
}

impl Default for Heuristic {
    fn default() -> Self {
        Self::Balanced
    }
}

impl TryFrom<&str> for Heuristic {
    type Error = anyhow::Error;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.trim().split_once(':') {
            None => match s.trim() {
                "balanced" => Ok(Self::Balanced),
                "lowest-degree" => Ok(Self::LowestDegree),
                "highest-degree" => Ok(Self::HighestDegree),
                other => Err(anyhow::anyhow!("unknown assignment heuristic: {}", other)),
            },
            Some(("random", seed)) => Ok(Self::Random(seed.parse()?)),
            Some((other, _)) => Err(anyhow::anyhow!("unknown assignment heuristic: {}", other)),
        }
    }
}

impl std::fmt::Display for Heuristic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Balanced => write!(f, "balanced"),
            Self::LowestDegree => write!(f, "lowest-degree"),
            Self::HighestDegree => write!(f, "highest-degree"),
            Self::Random(seed) => write!(f, "random:{}", seed),
        }
    }
}

/// Solver configuration. Every toggle preserves the computed policy value;
/// only the amount of work done to reach it changes.
#[derive(Clone, Debug)]
pub struct Config {
    /// Remove joint actions whose upper bound falls below the best known
    /// lower bound before the inner iteration.
    pub bb_pruning: bool,
    /// Re-prune the remaining joint actions with the running best as the new
    /// threshold. Implies `bb_pruning`.
    pub bb_tightening: bool,
    /// Complete a subtree single-agent the instant its state becomes locally
    /// reward-independent.
    pub local_cri: bool,
    /// Split the search into coordination-graph components as rewards die.
    pub decouple_cri: bool,
    /// Emit a progress bar over the top-level joint-action iteration.
    pub show_progress: bool,
    /// Shared-reward ownership heuristic.
    pub assignment: Heuristic,
    /// Cooperative timeout budget in milliseconds; `-1` means unbounded.
    pub max_runtime_ms: i64,
    /// If set, one human-readable dump per CRG and one for the final policy.
    pub debug_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bb_pruning: true,
            bb_tightening: true,
            local_cri: true,
            decouple_cri: true,
            show_progress: false,
            assignment: Heuristic::default(),
            max_runtime_ms: -1,
            debug_dir: None,
        }
    }
}

impl Config {
    /// Outer pruning runs whenever either branch-and-bound toggle is on.
    pub fn pruning(&self) -> bool {
        self.bb_pruning || self.bb_tightening
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_parses_round_trip() {
        for h in [
            Heuristic::Balanced,
            Heuristic::LowestDegree,
            Heuristic::HighestDegree,
            Heuristic::Random(42),
        ] {
            assert_eq!(h, Heuristic::try_from(h.to_string().as_str()).unwrap());
        }
    }

    #[test]
    fn heuristic_rejects_unknown() {
        assert!(Heuristic::try_from("greedy").is_err());
        assert!(Heuristic::try_from("random:x").is_err());
    }
}
