use super::function::TimeFunction;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

/// Shared-reward rules: each maps a *set* of local actions (its scope) to a
/// time-dependent reward function, already weighted. A rule fires whenever
/// its whole action set is concurrently executed; subsets of the executing
/// joint action count, exact matching does not apply.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Rules<K: Ord> {
    rules: BTreeMap<BTreeSet<K>, TimeFunction>,
    widest: usize,
}

impl<K: Ord + Clone> Rules<K> {
    pub fn new() -> Self {
        Self {
            rules: BTreeMap::new(),
            widest: 0,
        }
    }

    /// Insert a rule. Returns false (a no-op) when the action set is
    /// already present.
    pub fn add(&mut self, actions: BTreeSet<K>, function: TimeFunction) -> bool {
        if self.rules.contains_key(&actions) {
            false
        } else {
            self.widest = self.widest.max(actions.len());
            self.rules.insert(actions, function);
            true
        }
    }

    /// The maximum rule cardinality seen so far.
    pub fn widest(&self) -> usize {
        self.widest
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BTreeSet<K>, &TimeFunction)> {
        self.rules.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_action_set_is_a_noop() {
        let mut rules = Rules::new();
        let scope = BTreeSet::from([(0, 0), (1, 0)]);
        assert!(rules.add(scope.clone(), TimeFunction::Constant(-8.)));
        assert!(!rules.add(scope, TimeFunction::Constant(-99.)));
        assert_eq!(rules.len(), 1);
        let (_, f) = rules.iter().next().unwrap();
        assert_eq!(f, &TimeFunction::Constant(-8.));
    }

    #[test]
    fn tracks_widest_cardinality() {
        let mut rules = Rules::new();
        rules.add(BTreeSet::from([(0, 0)]), TimeFunction::Constant(1.));
        rules.add(
            BTreeSet::from([(0, 0), (1, 1), (2, 0)]),
            TimeFunction::Constant(1.),
        );
        assert_eq!(rules.widest(), 3);
    }
}
