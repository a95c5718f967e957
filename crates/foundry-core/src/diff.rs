//! Parameter diff between two snapshots
//!
//! Parameters are matched on their composite key, never on the bare name.
//! A parameter whose instance flag flipped shows up under both keys; when
//! the name is unambiguous on both sides the pair is folded back into a
//! single modification.

use foundry_model::{DataType, FamilySnapshot, ParamKey, ParamSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One independent reason a parameter counts as modified
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParamChange {
    Formula {
        before: Option<String>,
        after: Option<String>,
    },
    /// Number of types whose value changed
    Values { changed_types: usize },
    InstanceFlag { before: bool, after: bool },
    PropertiesGroup { before: String, after: String },
    DataType { before: DataType, after: DataType },
}

/// Parameter present on both sides with at least one change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifiedParam {
    pub name: String,
    /// Instance flag after the run
    pub is_instance: bool,
    pub changes: Vec<ParamChange>,
}

/// Added, removed and modified parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamDiff {
    pub family_name: String,
    pub added: Vec<ParamSnapshot>,
    pub removed: Vec<ParamSnapshot>,
    pub modified: Vec<ModifiedParam>,
}

impl ParamDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    /// Compare the parameter sections of two snapshots
    #[must_use]
    pub fn between(pre: &FamilySnapshot, post: &FamilySnapshot) -> Self {
        let before: BTreeMap<ParamKey, &ParamSnapshot> =
            pre.params().iter().map(|p| (p.key(), p)).collect();
        let after: BTreeMap<ParamKey, &ParamSnapshot> =
            post.params().iter().map(|p| (p.key(), p)).collect();

        let mut removed: Vec<&ParamSnapshot> = before
            .iter()
            .filter(|(key, _)| !after.contains_key(*key))
            .map(|(_, p)| *p)
            .collect();
        let mut added: Vec<&ParamSnapshot> = after
            .iter()
            .filter(|(key, _)| !before.contains_key(*key))
            .map(|(_, p)| *p)
            .collect();

        let mut modified: Vec<ModifiedParam> = before
            .iter()
            .filter_map(|(key, old)| after.get(key).map(|new| (*old, *new)))
            .filter_map(|(old, new)| {
                let changes = changes(old, new);
                (!changes.is_empty()).then(|| ModifiedParam {
                    name: new.name.clone(),
                    is_instance: new.is_instance,
                    changes,
                })
            })
            .collect();

        for name in flipped_names(&removed, &added) {
            let (Some(ri), Some(ai)) = (
                removed.iter().position(|p| p.name == name),
                added.iter().position(|p| p.name == name),
            ) else {
                continue;
            };
            let old = removed.remove(ri);
            let new = added.remove(ai);
            modified.push(ModifiedParam {
                name: new.name.clone(),
                is_instance: new.is_instance,
                changes: changes(old, new),
            });
        }
        modified.sort_by(|a, b| (&a.name, a.is_instance).cmp(&(&b.name, b.is_instance)));

        Self {
            family_name: post.family_name.clone(),
            added: added.into_iter().cloned().collect(),
            removed: removed.into_iter().cloned().collect(),
            modified,
        }
    }
}

/// Names appearing exactly once among removed and once among added
fn flipped_names(removed: &[&ParamSnapshot], added: &[&ParamSnapshot]) -> Vec<String> {
    let once = |list: &[&ParamSnapshot]| -> BTreeSet<String> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for p in list {
            *counts.entry(p.name.as_str()).or_default() += 1;
        }
        counts
            .into_iter()
            .filter(|(_, n)| *n == 1)
            .map(|(name, _)| name.to_string())
            .collect()
    };
    once(removed).intersection(&once(added)).cloned().collect()
}

fn changed_types(old: &ParamSnapshot, new: &ParamSnapshot) -> usize {
    let types: BTreeSet<&String> = old
        .values_per_type
        .keys()
        .chain(new.values_per_type.keys())
        .collect();
    types
        .into_iter()
        .filter(|t| {
            old.values_per_type.get(*t).cloned().flatten()
                != new.values_per_type.get(*t).cloned().flatten()
        })
        .count()
}

fn changes(old: &ParamSnapshot, new: &ParamSnapshot) -> Vec<ParamChange> {
    let mut out = Vec::new();
    if old.formula != new.formula {
        out.push(ParamChange::Formula {
            before: old.formula.clone(),
            after: new.formula.clone(),
        });
    }
    let changed = changed_types(old, new);
    if changed > 0 {
        out.push(ParamChange::Values {
            changed_types: changed,
        });
    }
    if old.is_instance != new.is_instance {
        out.push(ParamChange::InstanceFlag {
            before: old.is_instance,
            after: new.is_instance,
        });
    }
    if old.properties_group != new.properties_group {
        out.push(ParamChange::PropertiesGroup {
            before: old.properties_group.clone(),
            after: new.properties_group.clone(),
        });
    }
    if old.data_type != new.data_type {
        out.push(ParamChange::DataType {
            before: old.data_type,
            after: new.data_type,
        });
    }
    out
}
