//! Multi-namespace mapping graph: classes, members, parameters
//!
//! A [`MappingSet`] is anchored to one (source, target) namespace pair.
//! Top-level classes are keyed by their full obfuscated name; inner classes
//! are owned by their outer class and keyed by the simple name after the
//! last `$` separator. A class with no explicit deobfuscated name has an
//! implicit mapping equal to its own name.

pub mod compose;
pub mod tiny;

use std::collections::BTreeMap;

/// Key identifying a method uniquely within its owning class
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MethodKey {
    pub name: String,
    pub descriptor: String,
}

impl MethodKey {
    pub fn new(name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }
}

/// Key identifying a field within its owning class.
///
/// The type signature is optional: some mapping sources omit it, and
/// bytecode allows field name reuse across types in some contexts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldKey {
    pub name: String,
    pub ty: Option<String>,
}

impl FieldKey {
    pub fn new(name: impl Into<String>, ty: Option<String>) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Denormalized (owning class, member name, descriptor) key used to address
/// a member across the mapping set and the classpath index without holding
/// a live ownership link.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemberRef {
    /// Full obfuscated name of the owning class
    pub class_name: String,
    pub name: String,
    pub descriptor: Option<String>,
}

impl MemberRef {
    pub fn method(
        class_name: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            name: name.into(),
            descriptor: Some(descriptor.into()),
        }
    }

    pub fn field(
        class_name: impl Into<String>,
        name: impl Into<String>,
        ty: Option<String>,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            name: name.into(),
            descriptor: ty,
        }
    }

    /// Method references carry a method descriptor, which always starts
    /// with `(`; anything else is a field reference.
    pub fn is_method(&self) -> bool {
        self.descriptor
            .as_deref()
            .map_or(false, |d| d.starts_with('('))
    }
}

/// Mapping for a single method: obfuscated key, optional deobfuscated name,
/// and owned parameter mappings keyed by index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodMapping {
    pub deobf_name: Option<String>,
    /// Parameter index to deobfuscated name; indices are unique per method
    pub parameters: BTreeMap<u16, String>,
}

/// Mapping for a single field
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMapping {
    pub deobf_name: Option<String>,
}

/// Mapping for one class: an optional rename plus owned member and inner
/// class mappings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMapping {
    /// Full obfuscated name for top-level classes, simple name for inner ones
    obf_name: String,
    /// Full deobfuscated name for top-level classes, simple name for inner
    /// ones; `None` means "no rename"
    pub deobf_name: Option<String>,
    inner: BTreeMap<String, ClassMapping>,
    methods: BTreeMap<MethodKey, MethodMapping>,
    fields: BTreeMap<FieldKey, FieldMapping>,
}

impl ClassMapping {
    pub fn new(obf_name: impl Into<String>) -> Self {
        Self {
            obf_name: obf_name.into(),
            deobf_name: None,
            inner: BTreeMap::new(),
            methods: BTreeMap::new(),
            fields: BTreeMap::new(),
        }
    }

    pub fn obf_name(&self) -> &str {
        &self.obf_name
    }

    /// The deobfuscated name, falling back to the obfuscated name when the
    /// class is not renamed
    pub fn effective_deobf_name(&self) -> &str {
        self.deobf_name.as_deref().unwrap_or(&self.obf_name)
    }

    pub fn inner_classes(&self) -> impl Iterator<Item = &ClassMapping> {
        self.inner.values()
    }

    pub fn inner_classes_mut(&mut self) -> impl Iterator<Item = &mut ClassMapping> {
        self.inner.values_mut()
    }

    pub fn get_inner(&self, simple_name: &str) -> Option<&ClassMapping> {
        self.inner.get(simple_name)
    }

    pub fn get_inner_mut(&mut self, simple_name: &str) -> Option<&mut ClassMapping> {
        self.inner.get_mut(simple_name)
    }

    pub fn get_or_create_inner(&mut self, simple_name: &str) -> &mut ClassMapping {
        self.inner
            .entry(simple_name.to_string())
            .or_insert_with(|| ClassMapping::new(simple_name))
    }

    pub fn remove_inner(&mut self, simple_name: &str) -> Option<ClassMapping> {
        self.inner.remove(simple_name)
    }

    pub fn methods(&self) -> impl Iterator<Item = (&MethodKey, &MethodMapping)> {
        self.methods.iter()
    }

    pub fn methods_mut(&mut self) -> impl Iterator<Item = (&MethodKey, &mut MethodMapping)> {
        self.methods.iter_mut()
    }

    pub fn get_method(&self, name: &str, descriptor: &str) -> Option<&MethodMapping> {
        self.methods.get(&MethodKey::new(name, descriptor))
    }

    pub fn get_or_create_method(&mut self, name: &str, descriptor: &str) -> &mut MethodMapping {
        self.methods
            .entry(MethodKey::new(name, descriptor))
            .or_default()
    }

    pub fn insert_method(&mut self, key: MethodKey, mapping: MethodMapping) {
        self.methods.insert(key, mapping);
    }

    pub fn remove_method(&mut self, name: &str, descriptor: &str) -> Option<MethodMapping> {
        self.methods.remove(&MethodKey::new(name, descriptor))
    }

    pub fn fields(&self) -> impl Iterator<Item = (&FieldKey, &FieldMapping)> {
        self.fields.iter()
    }

    pub fn get_field(&self, key: &FieldKey) -> Option<&FieldMapping> {
        self.fields.get(key)
    }

    /// Look up a field mapping by name alone, ignoring the type signature
    pub fn get_field_by_name(&self, name: &str) -> Option<(&FieldKey, &FieldMapping)> {
        self.fields.iter().find(|(k, _)| k.name == name)
    }

    pub fn get_or_create_field(&mut self, key: FieldKey) -> &mut FieldMapping {
        self.fields.entry(key).or_default()
    }

    pub fn insert_field(&mut self, key: FieldKey, mapping: FieldMapping) {
        self.fields.insert(key, mapping);
    }

    /// Remove a field mapping by name; when `ty` is given only a matching
    /// signature (or a signature-less entry) is removed.
    pub fn remove_field_named(&mut self, name: &str, ty: Option<&str>) -> Option<FieldMapping> {
        let key = self
            .fields
            .keys()
            .find(|k| {
                k.name == name
                    && match (ty, k.ty.as_deref()) {
                        (Some(a), Some(b)) => a == b,
                        _ => true,
                    }
            })?
            .clone();
        self.fields.remove(&key)
    }

    /// True when the mapping carries no information at all
    pub fn is_empty(&self) -> bool {
        self.deobf_name.is_none()
            && self.inner.is_empty()
            && self.methods.is_empty()
            && self.fields.is_empty()
    }
}

/// The full graph of per-class/member/parameter name mappings for one
/// namespace pair.
///
/// Top-level classes are kept in sorted order so that serialization and
/// contributor iteration are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingSet {
    classes: BTreeMap<String, ClassMapping>,
}

impl MappingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn top_level_classes(&self) -> impl Iterator<Item = &ClassMapping> {
        self.classes.values()
    }

    pub fn top_level_classes_mut(&mut self) -> impl Iterator<Item = &mut ClassMapping> {
        self.classes.values_mut()
    }

    pub fn get_top_level(&self, name: &str) -> Option<&ClassMapping> {
        self.classes.get(name)
    }

    pub fn insert_top_level(&mut self, mapping: ClassMapping) {
        self.classes.insert(mapping.obf_name.clone(), mapping);
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Resolve a class mapping by full obfuscated name.
    ///
    /// A direct top-level hit wins; otherwise the name is split at the last
    /// `$` and resolved through the outer class, recursively.
    pub fn get_class(&self, full_name: &str) -> Option<&ClassMapping> {
        if let Some(found) = self.classes.get(full_name) {
            return Some(found);
        }
        let idx = full_name.rfind('$')?;
        let outer = self.get_class(&full_name[..idx])?;
        outer.get_inner(&full_name[idx + 1..])
    }

    pub fn get_class_mut(&mut self, full_name: &str) -> Option<&mut ClassMapping> {
        if self.classes.contains_key(full_name) {
            return self.classes.get_mut(full_name);
        }
        let idx = full_name.rfind('$')?;
        let (outer_name, inner_name) = (full_name[..idx].to_string(), &full_name[idx + 1..]);
        self.get_class_mut(&outer_name)?.get_inner_mut(inner_name)
    }

    /// Resolve or create a class mapping by full obfuscated name, creating
    /// unmapped intermediate outer classes as needed.
    pub fn get_or_create_class(&mut self, full_name: &str) -> &mut ClassMapping {
        if self.classes.contains_key(full_name) || !full_name.contains('$') {
            return self
                .classes
                .entry(full_name.to_string())
                .or_insert_with(|| ClassMapping::new(full_name));
        }
        let idx = full_name.rfind('$').unwrap();
        let (outer_name, inner_name) = (full_name[..idx].to_string(), full_name[idx + 1..].to_string());
        self.get_or_create_class(&outer_name)
            .get_or_create_inner(&inner_name)
    }

    /// Remove a class mapping (and everything it owns) by full name
    pub fn remove_class(&mut self, full_name: &str) -> Option<ClassMapping> {
        if self.classes.contains_key(full_name) {
            return self.classes.remove(full_name);
        }
        let idx = full_name.rfind('$')?;
        let (outer_name, inner_name) = (full_name[..idx].to_string(), &full_name[idx + 1..]);
        self.get_class_mut(&outer_name)?.remove_inner(inner_name)
    }

    /// Compute the full deobfuscated name of a class, walking the same path
    /// from the root as [`MappingSet::get_class`]. Unmapped segments fall
    /// back to their obfuscated names.
    pub fn full_deobf_name(&self, full_name: &str) -> Option<String> {
        if let Some(found) = self.classes.get(full_name) {
            return Some(found.effective_deobf_name().to_string());
        }
        let idx = full_name.rfind('$')?;
        let outer = self.full_deobf_name(&full_name[..idx])?;
        let inner_name = &full_name[idx + 1..];
        let inner_deobf = self
            .get_class(&full_name[..idx])
            .and_then(|c| c.get_inner(inner_name))
            .map(|c| c.effective_deobf_name().to_string())
            .unwrap_or_else(|| inner_name.to_string());
        Some(format!("{}${}", outer, inner_deobf))
    }

    /// Depth-first listing of every class mapping with its full obfuscated
    /// name, top-level classes in sorted order.
    pub fn all_classes(&self) -> Vec<(String, &ClassMapping)> {
        let mut out = Vec::new();
        for class in self.classes.values() {
            collect_classes(class.obf_name.clone(), class, &mut out);
        }
        out
    }
}

fn collect_classes<'a>(
    full_name: String,
    class: &'a ClassMapping,
    out: &mut Vec<(String, &'a ClassMapping)>,
) {
    out.push((full_name.clone(), class));
    for inner in class.inner_classes() {
        collect_classes(format!("{}${}", full_name, inner.obf_name), inner, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_class_resolution() {
        let mut set = MappingSet::new();
        set.get_or_create_class("a$b$c").deobf_name = Some("Inner".to_string());

        assert!(set.get_class("a").is_some());
        assert!(set.get_class("a$b").is_some());
        assert_eq!(
            set.get_class("a$b$c").unwrap().deobf_name.as_deref(),
            Some("Inner")
        );
        assert!(set.get_class("a$b$d").is_none());
    }

    #[test]
    fn test_full_deobf_name_falls_back_to_obf() {
        let mut set = MappingSet::new();
        set.get_or_create_class("a").deobf_name = Some("com/x/Foo".to_string());
        set.get_or_create_class("a$b");

        assert_eq!(set.full_deobf_name("a").as_deref(), Some("com/x/Foo"));
        assert_eq!(set.full_deobf_name("a$b").as_deref(), Some("com/x/Foo$b"));
        assert_eq!(set.full_deobf_name("q"), None);
    }

    #[test]
    fn test_remove_class_detaches_subtree() {
        let mut set = MappingSet::new();
        set.get_or_create_class("a$b").deobf_name = Some("B".to_string());

        assert!(set.remove_class("a$b").is_some());
        assert!(set.get_class("a$b").is_none());
        assert!(set.get_class("a").is_some());
    }

    #[test]
    fn test_field_lookup_by_name_ignores_type() {
        let mut class = ClassMapping::new("a");
        class
            .get_or_create_field(FieldKey::new("x", Some("I".to_string())))
            .deobf_name = Some("count".to_string());

        let (key, mapping) = class.get_field_by_name("x").unwrap();
        assert_eq!(key.ty.as_deref(), Some("I"));
        assert_eq!(mapping.deobf_name.as_deref(), Some("count"));
        assert!(class.get_field_by_name("y").is_none());
    }

    #[test]
    fn test_member_ref_kind() {
        assert!(MemberRef::method("a", "m", "()V").is_method());
        assert!(!MemberRef::field("a", "x", Some("I".to_string())).is_method());
        assert!(!MemberRef::field("a", "x", None).is_method());
    }
}
