//! Mapping set composition: reverse, merge, filter, field-mapping copy
//!
//! Composition never mutates its inputs; every operation returns a new set.

use crate::classpath::descriptor::remap_descriptor;
use crate::common::consts::escape_reserved_field_name;
use crate::common::{Error, Result};

use super::{ClassMapping, FieldKey, FieldMapping, MappingSet, MethodKey, MethodMapping};

/// A single entity inside a mapping set, as seen by [`MappingSet::filter`]
pub enum MappingEntity<'a> {
    Class(&'a ClassMapping),
    Method(&'a MethodKey, &'a MethodMapping),
    Field(&'a FieldKey, &'a FieldMapping),
    Parameter { index: u16, name: &'a str },
}

impl MappingSet {
    /// Swap each entity's source and target names. Structural nesting
    /// (inner classes, parameters) is preserved, and descriptors are
    /// rewritten into the target namespace so that member keys stay valid.
    ///
    /// `reverse(reverse(m)) == m` for any mapping set `m`.
    pub fn reverse(&self) -> MappingSet {
        let mut out = MappingSet::new();
        for class in self.top_level_classes() {
            out.insert_top_level(reverse_class(class, self));
        }
        out
    }

    /// Merge `other` onto `self`.
    ///
    /// Entities are joined through `self`'s effective target name against
    /// `other`'s source name (which collapses to a same-name join when
    /// `self` carries no rename). For a joined entity the target name from
    /// `self` wins when present, otherwise `other`'s is taken; entities
    /// present in only one input are carried through unchanged. This grafts
    /// per-member rename data from one source onto a name-pair skeleton
    /// from another.
    pub fn merge(&self, other: &MappingSet) -> MappingSet {
        let mut out = MappingSet::new();
        let mut joined = Vec::new();
        for class in self.top_level_classes() {
            let join_key = class.effective_deobf_name();
            let with = other.get_top_level(join_key);
            if with.is_some() {
                joined.push(join_key.to_string());
            }
            out.insert_top_level(merge_class(class, with, self));
        }
        for class in other.top_level_classes() {
            if joined.iter().any(|j| j == class.obf_name())
                || self.get_top_level(class.obf_name()).is_some()
            {
                continue;
            }
            out.insert_top_level(class.clone());
        }
        out
    }

    /// Derived set containing only the entities for which `predicate`
    /// holds. Dropping a class drops everything it owns.
    pub fn filter(&self, predicate: &dyn Fn(&MappingEntity<'_>) -> bool) -> MappingSet {
        let mut out = MappingSet::new();
        for class in self.top_level_classes() {
            if let Some(filtered) = filter_class(class, predicate) {
                out.insert_top_level(filtered);
            }
        }
        out
    }
}

fn reverse_class(class: &ClassMapping, set: &MappingSet) -> ClassMapping {
    let mut out = ClassMapping::new(class.effective_deobf_name());
    out.deobf_name = class.deobf_name.as_ref().map(|_| class.obf_name().to_string());

    for inner in class.inner_classes() {
        let reversed = reverse_class(inner, set);
        let name = reversed.obf_name().to_string();
        *out.get_or_create_inner(&name) = reversed;
    }
    for (key, method) in class.methods() {
        let name = method.deobf_name.as_deref().unwrap_or(&key.name);
        let descriptor = remap_descriptor(&key.descriptor, |c| set.full_deobf_name(c));
        let reversed = MethodMapping {
            deobf_name: method.deobf_name.as_ref().map(|_| key.name.clone()),
            parameters: method.parameters.clone(),
        };
        out.insert_method(MethodKey::new(name, descriptor), reversed);
    }
    for (key, field) in class.fields() {
        let name = field.deobf_name.as_deref().unwrap_or(&key.name);
        let ty = key
            .ty
            .as_deref()
            .map(|t| remap_descriptor(t, |c| set.full_deobf_name(c)));
        out.insert_field(
            FieldKey::new(name, ty),
            FieldMapping {
                deobf_name: field.deobf_name.as_ref().map(|_| key.name.clone()),
            },
        );
    }
    out
}

fn merge_class(class: &ClassMapping, with: Option<&ClassMapping>, set: &MappingSet) -> ClassMapping {
    let mut out = ClassMapping::new(class.obf_name());
    out.deobf_name = class
        .deobf_name
        .clone()
        .or_else(|| with.and_then(|w| w.deobf_name.clone()));

    for inner in class.inner_classes() {
        let with_inner = with.and_then(|w| w.get_inner(inner.effective_deobf_name()));
        let merged = merge_class(inner, with_inner, set);
        let name = merged.obf_name().to_string();
        *out.get_or_create_inner(&name) = merged;
    }
    if let Some(with) = with {
        for inner in with.inner_classes() {
            if out.get_inner(inner.obf_name()).is_none() {
                *out.get_or_create_inner(inner.obf_name()) = inner.clone();
            }
        }
    }

    for (key, method) in class.methods() {
        let join_name = method.deobf_name.as_deref().unwrap_or(&key.name);
        let join_desc = remap_descriptor(&key.descriptor, |c| set.full_deobf_name(c));
        let counterpart = with.and_then(|w| w.get_method(join_name, &join_desc));
        let mut merged = method.clone();
        if merged.deobf_name.is_none() {
            merged.deobf_name = counterpart.and_then(|m| m.deobf_name.clone());
        }
        if let Some(counterpart) = counterpart {
            for (idx, name) in &counterpart.parameters {
                merged
                    .parameters
                    .entry(*idx)
                    .or_insert_with(|| name.clone());
            }
        }
        out.insert_method(key.clone(), merged);
    }

    for (key, field) in class.fields() {
        let join_name = field.deobf_name.as_deref().unwrap_or(&key.name);
        let counterpart = with.and_then(|w| w.get_field_by_name(join_name).map(|(_, f)| f));
        let mut merged = field.clone();
        if merged.deobf_name.is_none() {
            merged.deobf_name = counterpart.and_then(|f| f.deobf_name.clone());
        }
        out.insert_field(key.clone(), merged);
    }
    if let Some(with) = with {
        for (key, field) in with.fields() {
            if out.get_field(key).is_none() && out.get_field_by_name(&key.name).is_none() {
                out.insert_field(key.clone(), field.clone());
            }
        }
    }
    out
}

fn filter_class(
    class: &ClassMapping,
    predicate: &dyn Fn(&MappingEntity<'_>) -> bool,
) -> Option<ClassMapping> {
    if !predicate(&MappingEntity::Class(class)) {
        return None;
    }
    let mut out = ClassMapping::new(class.obf_name());
    out.deobf_name = class.deobf_name.clone();

    for inner in class.inner_classes() {
        if let Some(filtered) = filter_class(inner, predicate) {
            let name = filtered.obf_name().to_string();
            *out.get_or_create_inner(&name) = filtered;
        }
    }
    for (key, method) in class.methods() {
        if !predicate(&MappingEntity::Method(key, method)) {
            continue;
        }
        let mut kept = method.clone();
        kept.parameters.retain(|index, name| {
            predicate(&MappingEntity::Parameter {
                index: *index,
                name,
            })
        });
        out.insert_method(key.clone(), kept);
    }
    for (key, field) in class.fields() {
        if predicate(&MappingEntity::Field(key, field)) {
            out.insert_field(key.clone(), field.clone());
        }
    }
    Some(out)
}

/// Copy field mappings from `fields` onto the class/method skeleton of
/// `base`, producing a new set.
///
/// Every class of `base` must have a counterpart in `fields` (keyed by the
/// same obfuscated name); a missing counterpart is a fatal lookup failure,
/// because silently skipping it would produce an inconsistent output set.
/// Obfuscated field names that collide with reserved source identifiers are
/// escaped with a trailing underscore; the deobfuscated side is untouched.
pub fn copy_field_mappings(base: &MappingSet, fields: &MappingSet) -> Result<MappingSet> {
    let mut out = MappingSet::new();
    for class in base.top_level_classes() {
        let field_class = fields.get_top_level(class.obf_name()).ok_or_else(|| {
            Error::field_ambiguity(class.obf_name(), "no matching class in field mapping source")
        })?;
        out.insert_top_level(copy_class_field_mappings(class, field_class)?);
    }
    Ok(out)
}

fn copy_class_field_mappings(
    base: &ClassMapping,
    field_class: &ClassMapping,
) -> Result<ClassMapping> {
    let mut out = ClassMapping::new(base.obf_name());
    out.deobf_name = base.deobf_name.clone();

    for inner in base.inner_classes() {
        let field_inner = field_class.get_inner(inner.obf_name()).ok_or_else(|| {
            Error::field_ambiguity(inner.obf_name(), "no matching inner class in field mapping source")
        })?;
        let copied = copy_class_field_mappings(inner, field_inner)?;
        let name = copied.obf_name().to_string();
        *out.get_or_create_inner(&name) = copied;
    }

    for (key, method) in base.methods() {
        out.insert_method(key.clone(), method.clone());
    }

    for (key, field) in field_class.fields() {
        match escape_reserved_field_name(&key.name) {
            Some(escaped) => out.insert_field(FieldKey::new(escaped, key.ty.clone()), field.clone()),
            None => out.insert_field(key.clone(), field.clone()),
        }
    }
    Ok(out)
}
