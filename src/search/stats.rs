use std::time::Duration;

/// Construction counters of one conditional return graph.
#[derive(Clone, Debug, Default)]
pub struct CrgStats {
    pub states: usize,
    pub transitions: usize,
    pub terminal: usize,
    pub independent: usize,
    pub duplicates: usize,
    pub dependency_branches: usize,
    pub influence_branches: usize,
}

/// Everything the solver counts. Wall-clock per phase, search work, and the
/// per-CRG construction counters.
#[derive(Clone, Debug, Default)]
pub struct Statistics {
    pub preprocessing: Duration,
    pub solving: Duration,
    pub postprocessing: Duration,

    /// Joint states expanded.
    pub evaluated: usize,
    /// Joint states answered from the search map.
    pub revisited: usize,
    /// Terminal joint states reached.
    pub terminal: usize,
    /// Joint actions expanded.
    pub joint_actions: usize,
    /// States on which outer pruning was attempted.
    pub prune_attempts: usize,
    /// Joint actions removed by outer pruning.
    pub pruned_outer: usize,
    /// Joint actions removed by inner tightening.
    pub pruned_inner: usize,
    /// States split into independent components.
    pub decoupled: usize,
    /// Total components across all splits.
    pub components: usize,
    /// Total agent count across all evaluated joint states.
    pub joint_agents: usize,

    pub crgs: Vec<CrgStats>,
}

impl Statistics {
    pub fn average_split(&self) -> f64 {
        match self.decoupled {
            0 => 0.,
            n => self.components as f64 / n as f64,
        }
    }

    pub fn average_size(&self) -> f64 {
        match self.evaluated {
            0 => 0.,
            n => self.joint_agents as f64 / n as f64,
        }
    }
}

impl std::fmt::Display for Statistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "preprocessing       {:>12.3?}", self.preprocessing)?;
        writeln!(f, "solving             {:>12.3?}", self.solving)?;
        writeln!(f, "postprocessing      {:>12.3?}", self.postprocessing)?;
        writeln!(f, "states evaluated    {:>12}", self.evaluated)?;
        writeln!(f, "states revisited    {:>12}", self.revisited)?;
        writeln!(f, "states terminal     {:>12}", self.terminal)?;
        writeln!(f, "joint actions       {:>12}", self.joint_actions)?;
        writeln!(f, "prune attempts      {:>12}", self.prune_attempts)?;
        writeln!(f, "pruned outer        {:>12}", self.pruned_outer)?;
        writeln!(f, "pruned inner        {:>12}", self.pruned_inner)?;
        writeln!(f, "states decoupled    {:>12}", self.decoupled)?;
        writeln!(f, "average split       {:>12.2}", self.average_split())?;
        writeln!(f, "average state size  {:>12.2}", self.average_size())?;
        for (agent, crg) in self.crgs.iter().enumerate() {
            writeln!(
                f,
                "crg {:<3} states {:>6} transitions {:>7} terminal {:>5} independent {:>5} duplicates {:>6} dep branches {:>7} inf branches {:>7}",
                agent,
                crg.states,
                crg.transitions,
                crg.terminal,
                crg.independent,
                crg.duplicates,
                crg.dependency_branches,
                crg.influence_branches,
            )?;
        }
        Ok(())
    }
}
