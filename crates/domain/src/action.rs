//! Action sets and the reconciliation diff between stored and desired grants.

use std::collections::BTreeSet;

use grantry_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Deduplicated, order-independent set of action names.
///
/// Serialized as a sorted list of strings. Deserialization applies the same
/// checks as [`ActionSet::new`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ActionSet(BTreeSet<String>);

impl ActionSet {
    /// Builds a validated action set, dropping duplicates.
    ///
    /// Blank action names are rejected.
    pub fn new<I, S>(actions: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = BTreeSet::new();
        for action in actions {
            let action = action.into();
            if action.trim().is_empty() {
                return Err(AppError::Validation(
                    "action must not be empty or whitespace".to_owned(),
                ));
            }
            set.insert(action);
        }

        Ok(Self(set))
    }

    /// Builds a set from values already persisted by the store.
    #[must_use]
    pub fn from_stored<I>(actions: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self(actions.into_iter().collect())
    }

    /// Returns whether no action is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of distinct actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether the set contains the action.
    #[must_use]
    pub fn contains(&self, action: &str) -> bool {
        self.0.contains(action)
    }

    /// Returns whether every action of `required` is contained in this set.
    #[must_use]
    pub fn is_superset(&self, required: &ActionSet) -> bool {
        self.0.is_superset(&required.0)
    }

    /// Iterates actions in lexical order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Adds an action to the set.
    pub fn insert(&mut self, action: impl Into<String>) {
        self.0.insert(action.into());
    }

    /// Returns the actions as an owned, sorted vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl TryFrom<Vec<String>> for ActionSet {
    type Error = AppError;

    fn try_from(actions: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(actions)
    }
}

impl From<ActionSet> for Vec<String> {
    fn from(actions: ActionSet) -> Self {
        actions.0.into_iter().collect()
    }
}

impl FromIterator<String> for ActionSet {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        Self::from_stored(iter)
    }
}

/// Minimal row changes moving stored actions to a desired set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionDiff {
    /// Actions that must be inserted.
    pub to_add: Vec<String>,
    /// Actions that must be deleted.
    pub to_remove: Vec<String>,
}

impl PermissionDiff {
    /// Computes `desired - current` and `current - desired`.
    #[must_use]
    pub fn between(current: &ActionSet, desired: &ActionSet) -> Self {
        Self {
            to_add: desired.0.difference(&current.0).cloned().collect(),
            to_remove: current.0.difference(&desired.0).cloned().collect(),
        }
    }

    /// Returns whether the stored state already matches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}
