use std::collections::BTreeSet;

/// Additions and removals that turn a prior membership set into the desired
/// one. Ordering of the remote collections is irrelevant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    pub additions: BTreeSet<String>,
    pub removals: BTreeSet<String>,
}

impl Delta {
    /// `prior: None` is treated as the empty set.
    pub fn between(prior: Option<&BTreeSet<String>>, desired: &BTreeSet<String>) -> Self {
        let empty = BTreeSet::new();
        let prior = prior.unwrap_or(&empty);
        Self {
            additions: desired.difference(prior).cloned().collect(),
            removals: prior.difference(desired).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }
}
