use thiserror::Error;

/// Failure taxonomy of a solve. Nothing is retried: the search is
/// deterministic and a failed solve is fatal for that invocation. A caller
/// can distinguish "ran out of budget" from "bug" by matching on the kind.
#[derive(Error, Debug)]
pub enum SolveError {
    /// The cooperative wall-clock budget was exceeded.
    #[error("solve exceeded its time budget")]
    Timeout,

    /// The domain adapter broke its contract: non-normalized outcome
    /// probabilities, available actions in a terminal state, or an annotated
    /// transition that no joint context matches.
    #[error("domain adapter violation: {0}")]
    Adapter(String),

    /// A realized joint action led into a state the domain cannot complete.
    #[error("infeasible state: {0}")]
    Infeasible(String),

    /// Write-once or null-sentinel discipline of a solver cache was breached.
    /// Indicates a programming error in the solver or the adapter.
    #[error("cache violation: {0}")]
    Cache(String),

    /// A policy was queried on a state outside the reachable set.
    #[error("no optimal action for state")]
    Unsolved,
}

pub type Result<T> = std::result::Result<T, SolveError>;
