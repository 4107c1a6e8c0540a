use crate::AgentId;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

/// A factored collection over other agents' items (actions, or state
/// transitions): per agent, an explicit inclusion set and/or a complement
/// marker "this agent, anything *not* in the following set".
///
/// `x` of agent `g` matches iff `x` is explicitly included for `g`, or `g`
/// carries a complement entry that does not list `x`.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Others<T: Ord> {
    included: BTreeMap<AgentId, BTreeSet<T>>,
    excluded: BTreeMap<AgentId, BTreeSet<T>>,
}

impl<T: Ord + Clone> Others<T> {
    /// The unconstrained collection: matches nothing, constrains nobody.
    pub fn none() -> Self {
        Self {
            included: BTreeMap::new(),
            excluded: BTreeMap::new(),
        }
    }

    pub fn include(&mut self, agent: AgentId, item: T) {
        self.included.entry(agent).or_default().insert(item);
    }

    /// Install the complement marker for `agent`: any item outside `items`
    /// matches.
    pub fn exclude(&mut self, agent: AgentId, items: BTreeSet<T>) {
        self.excluded.entry(agent).or_default().extend(items);
    }

    pub fn matches(&self, agent: AgentId, item: &T) -> bool {
        self.included
            .get(&agent)
            .map(|set| set.contains(item))
            .unwrap_or(false)
            || self
                .excluded
                .get(&agent)
                .map(|set| !set.contains(item))
                .unwrap_or(false)
    }

    /// Does this collection say anything about `agent` at all?
    pub fn constrains(&self, agent: AgentId) -> bool {
        self.included.contains_key(&agent) || self.excluded.contains_key(&agent)
    }

    /// The explicitly included items for `agent`, if any.
    pub fn explicit(&self, agent: AgentId) -> Option<&BTreeSet<T>> {
        self.included.get(&agent)
    }

    pub fn has_other(&self, agent: AgentId) -> bool {
        self.excluded.contains_key(&agent)
    }

    /// Every agent this collection constrains.
    pub fn agents(&self) -> BTreeSet<AgentId> {
        self.included
            .keys()
            .chain(self.excluded.keys())
            .copied()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.included.is_empty() && self.excluded.is_empty()
    }
}

impl<T: Ord + std::fmt::Debug> std::fmt::Display for Others<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (agent, set) in &self.included {
            write!(f, " {}∈{:?}", agent, set)?;
        }
        for (agent, set) in &self.excluded {
            write!(f, " {}∉{:?}", agent, set)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn included_items_match() {
        let mut others = Others::none();
        others.include(2, "a");
        assert!(others.matches(2, &"a"));
        assert!(!others.matches(2, &"b"));
        assert!(!others.matches(3, &"a"));
    }

    #[test]
    fn complement_matches_everything_outside() {
        let mut others = Others::none();
        others.exclude(1, BTreeSet::from(["a", "b"]));
        assert!(!others.matches(1, &"a"));
        assert!(!others.matches(1, &"b"));
        assert!(others.matches(1, &"c"));
    }

    #[test]
    fn unconstrained_agent_matches_nothing() {
        let others: Others<&str> = Others::none();
        assert!(!others.matches(0, &"a"));
        assert!(!others.constrains(0));
    }

    #[test]
    fn inclusion_wins_over_complement() {
        let mut others = Others::none();
        others.include(1, "a");
        others.exclude(1, BTreeSet::from(["a", "b"]));
        assert!(others.matches(1, &"a"));
        assert!(!others.matches(1, &"b"));
        assert!(others.matches(1, &"c"));
    }
}
