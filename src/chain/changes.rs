//! Proposed mapping mutations and the registry that batches them
//!
//! Contributors never mutate the mapping set directly: they submit small
//! tagged change records into a [`ChangeRegistry`], and the whole batch is
//! applied at once after the contributor pass completes. This keeps every
//! contributor reading one consistent snapshot.

use crate::common::{Error, Result};
use crate::mapping::{MappingSet, MemberRef};

/// One proposed mutation against a mapping set
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Change {
    /// Remove a class mapping (and everything it owns) by full obf name
    RemoveClassMapping { target: String },
    /// Remove a method or field mapping
    RemoveMemberMapping { target: MemberRef },
    /// Remove one parameter mapping from a method
    RemoveParameterMapping { target: MemberRef, index: u16 },
    /// Create or rename a class mapping
    AddClassMapping { target: String, deobf_name: String },
    /// Create or rename a member mapping
    AddMemberMapping {
        target: MemberRef,
        deobf_name: String,
    },
    /// Create a parameter mapping on a method
    AddParameterMapping {
        target: MemberRef,
        index: u16,
        name: String,
    },
}

impl Change {
    /// Removals apply before additions so that a batch which drops a class
    /// and re-adds a member under it behaves the same in any submit order.
    fn apply_rank(&self) -> u8 {
        match self {
            Change::RemoveClassMapping { .. } => 0,
            Change::RemoveMemberMapping { .. } => 1,
            Change::RemoveParameterMapping { .. } => 2,
            Change::AddClassMapping { .. } => 3,
            Change::AddMemberMapping { .. } => 4,
            Change::AddParameterMapping { .. } => 5,
        }
    }
}

/// Collects proposed changes from all contributors in one link
#[derive(Debug, Default)]
pub struct ChangeRegistry {
    changes: Vec<Change>,
}

impl ChangeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit(&mut self, change: Change) {
        self.changes.push(change);
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Produce the deterministic application batch: sorted, deduplicated,
    /// with conflicting renames of one target rejected.
    pub fn into_batch(self) -> Result<Vec<Change>> {
        let mut changes = self.changes;
        changes.sort_by(|a, b| a.apply_rank().cmp(&b.apply_rank()).then_with(|| a.cmp(b)));
        changes.dedup();

        for pair in changes.windows(2) {
            let conflict = match (&pair[0], &pair[1]) {
                (
                    Change::AddClassMapping { target: a, .. },
                    Change::AddClassMapping { target: b, .. },
                ) => a == b,
                (
                    Change::AddMemberMapping { target: a, .. },
                    Change::AddMemberMapping { target: b, .. },
                ) => a == b,
                (
                    Change::AddParameterMapping {
                        target: a,
                        index: ia,
                        ..
                    },
                    Change::AddParameterMapping {
                        target: b,
                        index: ib,
                        ..
                    },
                ) => a == b && ia == ib,
                _ => false,
            };
            if conflict {
                return Err(Error::contributor_execution(
                    "<registry>",
                    format!("conflicting changes for one target: {:?} vs {:?}", pair[0], pair[1]),
                ));
            }
        }
        Ok(changes)
    }
}

/// Apply one change to a mapping set
pub fn apply_change(set: &mut MappingSet, change: &Change) {
    match change {
        Change::RemoveClassMapping { target } => {
            set.remove_class(target);
        }
        Change::RemoveMemberMapping { target } => {
            if let Some(class) = set.get_class_mut(&target.class_name) {
                if target.is_method() {
                    let descriptor = target.descriptor.as_deref().unwrap_or_default();
                    class.remove_method(&target.name, descriptor);
                } else {
                    class.remove_field_named(&target.name, target.descriptor.as_deref());
                }
            }
        }
        Change::RemoveParameterMapping { target, index } => {
            if let Some(class) = set.get_class_mut(&target.class_name) {
                if let Some(descriptor) = target.descriptor.as_deref() {
                    if let Some((_, method)) = class
                        .methods_mut()
                        .find(|(k, _)| k.name == target.name && k.descriptor == descriptor)
                    {
                        method.parameters.remove(index);
                    }
                }
            }
        }
        Change::AddClassMapping { target, deobf_name } => {
            set.get_or_create_class(target).deobf_name = Some(deobf_name.clone());
        }
        Change::AddMemberMapping { target, deobf_name } => {
            let class = set.get_or_create_class(&target.class_name);
            if target.is_method() {
                let descriptor = target.descriptor.as_deref().unwrap_or_default();
                class.get_or_create_method(&target.name, descriptor).deobf_name =
                    Some(deobf_name.clone());
            } else {
                class
                    .get_or_create_field(crate::mapping::FieldKey::new(
                        &target.name,
                        target.descriptor.clone(),
                    ))
                    .deobf_name = Some(deobf_name.clone());
            }
        }
        Change::AddParameterMapping {
            target,
            index,
            name,
        } => {
            if let Some(descriptor) = target.descriptor.as_deref() {
                let class = set.get_or_create_class(&target.class_name);
                class
                    .get_or_create_method(&target.name, descriptor)
                    .parameters
                    .insert(*index, name.clone());
            }
        }
    }
}
