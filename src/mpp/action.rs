use super::task::TaskId;

/// What a crew does with one time step. A busy crew can only continue; an
/// idle crew starts an unfinished task or sits the step out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Action {
    Start(TaskId),
    Continue,
    Idle,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start(task) => write!(f, "start({})", task),
            Self::Continue => write!(f, "continue"),
            Self::Idle => write!(f, "idle"),
        }
    }
}
