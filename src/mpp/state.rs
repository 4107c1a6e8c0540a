use super::task::TaskId;
use crate::Time;
use std::collections::BTreeSet;

/// A crew's local payload: which tasks are finished, and the task currently
/// occupying it with the number of work steps still required. The remaining
/// count is always at least one; completion folds into `done` immediately.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Progress {
    done: BTreeSet<TaskId>,
    busy: Option<(TaskId, Time)>,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn done(&self) -> &BTreeSet<TaskId> {
        &self.done
    }
    pub fn busy(&self) -> Option<(TaskId, Time)> {
        self.busy
    }
    pub fn is_done(&self, task: TaskId) -> bool {
        self.done.contains(&task)
    }
    pub fn is_idle(&self) -> bool {
        self.busy.is_none()
    }

    /// Can this task ever be started from here on? Started and finished
    /// tasks cannot restart.
    pub fn startable(&self, task: TaskId) -> bool {
        !self.is_done(task) && self.busy.map(|(t, _)| t != task).unwrap_or(true)
    }

    /// The first working step of a task with the given resolved total
    /// duration.
    pub fn start(&self, task: TaskId, duration: Time) -> Self {
        debug_assert!(self.is_idle());
        debug_assert!(!self.is_done(task));
        debug_assert!(duration >= 1);
        match duration - 1 {
            0 => Self {
                done: self.done.iter().copied().chain([task]).collect(),
                busy: None,
            },
            remaining => Self {
                done: self.done.clone(),
                busy: Some((task, remaining)),
            },
        }
    }

    /// One more working step of the occupying task.
    pub fn advance(&self) -> Self {
        let (task, remaining) = self.busy.expect("a busy crew");
        match remaining - 1 {
            0 => Self {
                done: self.done.iter().copied().chain([task]).collect(),
                busy: None,
            },
            remaining => Self {
                done: self.done.clone(),
                busy: Some((task, remaining)),
            },
        }
    }

    /// The task that finished between `prior` and this state, if any.
    pub fn completed(&self, prior: &Self) -> Option<TaskId> {
        self.done.difference(&prior.done).next().copied()
    }
}

impl std::fmt::Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "done{:?}", self.done)?;
        match self.busy {
            Some((task, remaining)) => write!(f, " busy({},{})", task, remaining),
            None => write!(f, " idle"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_duration_completes_at_start() {
        let p = Progress::new().start(3, 1);
        assert!(p.is_done(3));
        assert!(p.is_idle());
    }

    #[test]
    fn longer_tasks_occupy_then_complete() {
        let p = Progress::new().start(0, 3);
        assert_eq!(p.busy(), Some((0, 2)));
        let p = p.advance();
        assert_eq!(p.busy(), Some((0, 1)));
        let p = p.advance();
        assert!(p.is_done(0));
        assert!(p.is_idle());
    }

    #[test]
    fn completion_is_observable_per_step() {
        let before = Progress::new().start(0, 2);
        let after = before.advance();
        assert_eq!(after.completed(&before), Some(0));
        assert_eq!(before.completed(&before), None);
    }

    #[test]
    fn started_tasks_are_not_startable() {
        let p = Progress::new().start(0, 3);
        assert!(!p.startable(0));
        assert!(p.startable(1));
        assert!(!p.advance().advance().startable(0));
    }
}
