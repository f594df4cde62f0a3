//! Change contributors: the rules of the reobfuscation pipeline
//!
//! Each contributor is a pure function of (current class, its mapping, the
//! hydrated classpath context) that proposes changes into a registry. The
//! contributor set is a closed enum dispatched by the chain executor; the
//! execution order of the pipeline is fixed:
//!
//! 1. [`Contributor::RemoveUnusedMappings`]
//! 2. [`Contributor::RemoveAllParameterMappings`] and
//!    [`Contributor::RemoveObfSpigotMappings`]
//! 3. [`Contributor::PropagateOuterClassMappings`]
//! 4. [`Contributor::PropagateMappingsUp`]
//! 5. [`Contributor::CopyMappingsDown`]

use crate::classpath::{ClassData, ClasspathIndex, MethodData};
use crate::common::Result;
use crate::hydrate::HydrationOverlay;
use crate::mapping::{ClassMapping, MappingSet, MemberRef};

use super::changes::{Change, ChangeRegistry};

/// Read-only context shared by all contributors in one link
pub struct ChainContext<'a> {
    pub index: &'a ClasspathIndex,
    pub hydration: &'a HydrationOverlay,
    /// The snapshot every contributor in the link reads
    pub mappings: &'a MappingSet,
}

/// The closed set of mapping-graph mutation rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contributor {
    /// Drop mappings for entities absent from the hydrated classpath
    RemoveUnusedMappings,
    /// Drop all parameter mappings; reobfuscated output never needs them
    RemoveAllParameterMappings,
    /// Drop class mappings whose full deobfuscated name has no package
    /// separator: an unqualified name means "pass-through, not actually
    /// renamed" and must not leak into the final set
    RemoveObfSpigotMappings,
    /// Synthesize simple-name mappings for inner classes orphaned by an
    /// outer-class rename
    PropagateOuterClassMappings,
    /// Push member renames to the topmost declaration of the override
    /// family (and across hydrated bridge/super-constructor links)
    PropagateMappingsUp,
    /// Pull member renames back down onto every overriding sibling; a
    /// member whose name disagrees with its resolved ancestor (or bridge
    /// target) is realigned so an override family ends with one name
    CopyMappingsDown,
}

impl Contributor {
    pub fn name(&self) -> &'static str {
        match self {
            Contributor::RemoveUnusedMappings => "RemoveUnusedMappings",
            Contributor::RemoveAllParameterMappings => "RemoveAllParameterMappings",
            Contributor::RemoveObfSpigotMappings => "RemoveObfSpigotMappings",
            Contributor::PropagateOuterClassMappings => "PropagateOuterClassMappings",
            Contributor::PropagateMappingsUp => "PropagateMappingsUp",
            Contributor::CopyMappingsDown => "CopyMappingsDown",
        }
    }

    /// Inspect one class and submit proposed changes.
    ///
    /// `class_data` is `None` for mapping entries with no classpath class;
    /// `mapping` is `None` for classpath classes with no mapping entry.
    pub fn contribute(
        &self,
        class_data: Option<&ClassData>,
        class_name: &str,
        mapping: Option<&ClassMapping>,
        ctx: &ChainContext<'_>,
        registry: &mut ChangeRegistry,
    ) -> Result<()> {
        match self {
            Contributor::RemoveUnusedMappings => {
                remove_unused(class_data, class_name, mapping, registry)
            }
            Contributor::RemoveAllParameterMappings => {
                remove_all_parameters(class_name, mapping, registry)
            }
            Contributor::RemoveObfSpigotMappings => {
                remove_obf_spigot(class_name, mapping, ctx, registry)
            }
            Contributor::PropagateOuterClassMappings => {
                propagate_outer_class(class_data, mapping, ctx, registry)
            }
            Contributor::PropagateMappingsUp => {
                propagate_up(class_data, class_name, mapping, ctx, registry)
            }
            Contributor::CopyMappingsDown => copy_down(class_data, class_name, ctx, registry),
        }
        Ok(())
    }
}

fn remove_unused(
    class_data: Option<&ClassData>,
    class_name: &str,
    mapping: Option<&ClassMapping>,
    registry: &mut ChangeRegistry,
) {
    let Some(mapping) = mapping else {
        return;
    };
    let Some(class_data) = class_data else {
        // stale entry from a previous run
        registry.submit(Change::RemoveClassMapping {
            target: class_name.to_string(),
        });
        return;
    };
    for (key, method) in mapping.methods() {
        match class_data.find_method(&key.name, &key.descriptor) {
            None => registry.submit(Change::RemoveMemberMapping {
                target: MemberRef::method(class_name, &key.name, &key.descriptor),
            }),
            Some(data) => {
                let arity = crate::classpath::descriptor::parameter_count(&data.descriptor);
                for index in method.parameters.keys() {
                    if *index as usize >= arity {
                        registry.submit(Change::RemoveParameterMapping {
                            target: MemberRef::method(class_name, &key.name, &key.descriptor),
                            index: *index,
                        });
                    }
                }
            }
        }
    }
    for (key, _) in mapping.fields() {
        if class_data.find_field(&key.name, key.ty.as_deref()).is_none() {
            registry.submit(Change::RemoveMemberMapping {
                target: MemberRef::field(class_name, &key.name, key.ty.clone()),
            });
        }
    }
}

fn remove_all_parameters(
    class_name: &str,
    mapping: Option<&ClassMapping>,
    registry: &mut ChangeRegistry,
) {
    let Some(mapping) = mapping else {
        return;
    };
    for (key, method) in mapping.methods() {
        for index in method.parameters.keys() {
            registry.submit(Change::RemoveParameterMapping {
                target: MemberRef::method(class_name, &key.name, &key.descriptor),
                index: *index,
            });
        }
    }
}

fn remove_obf_spigot(
    class_name: &str,
    mapping: Option<&ClassMapping>,
    ctx: &ChainContext<'_>,
    registry: &mut ChangeRegistry,
) {
    if mapping.is_none() {
        return;
    }
    // "no package separator in the full deobfuscated name" is the fixed
    // heuristic for a pass-through name; reproduced exactly.
    let full_deobf = ctx
        .mappings
        .full_deobf_name(class_name)
        .unwrap_or_else(|| class_name.to_string());
    if !full_deobf.contains('/') {
        registry.submit(Change::RemoveClassMapping {
            target: class_name.to_string(),
        });
    }
}

fn propagate_outer_class(
    class_data: Option<&ClassData>,
    mapping: Option<&ClassMapping>,
    ctx: &ChainContext<'_>,
    registry: &mut ChangeRegistry,
) {
    let Some(class_data) = class_data else {
        return;
    };
    if mapping.is_some() {
        return;
    }
    let simple_name = class_data
        .name
        .rsplit('$')
        .next()
        .unwrap_or(&class_data.name);
    let Some(outer) = class_data.outer_class.as_deref() else {
        return;
    };
    let Some(outer_mapping) = ctx.mappings.get_class(outer) else {
        return;
    };
    if outer_mapping
        .inner_classes()
        .any(|inner| inner.effective_deobf_name() == simple_name)
    {
        return;
    }
    registry.submit(Change::AddClassMapping {
        target: class_data.name.clone(),
        deobf_name: simple_name.to_string(),
    });
}

fn propagate_up(
    class_data: Option<&ClassData>,
    class_name: &str,
    mapping: Option<&ClassMapping>,
    ctx: &ChainContext<'_>,
    registry: &mut ChangeRegistry,
) {
    let (Some(class_data), Some(mapping)) = (class_data, mapping) else {
        return;
    };
    for (key, method) in mapping.methods() {
        let member = MemberRef::method(class_name, &key.name, &key.descriptor);

        if key.name == crate::common::consts::CONSTRUCTOR_METHOD_NAME {
            // constructor parameter names flow up the hydrated
            // super-constructor link
            if method.parameters.is_empty() {
                continue;
            }
            let Some(super_ctor) = ctx.hydration.super_constructor(&member) else {
                continue;
            };
            let super_params = ctx
                .mappings
                .get_class(&super_ctor.class_name)
                .and_then(|c| {
                    c.get_method(&super_ctor.name, super_ctor.descriptor.as_deref().unwrap_or(""))
                })
                .map(|m| m.parameters.clone())
                .unwrap_or_default();
            for (index, name) in &method.parameters {
                if !super_params.contains_key(index) {
                    registry.submit(Change::AddParameterMapping {
                        target: super_ctor.clone(),
                        index: *index,
                        name: name.clone(),
                    });
                }
            }
            continue;
        }

        let Some(deobf) = method.deobf_name.as_deref() else {
            continue;
        };
        let Some(data) = class_data.find_method(&key.name, &key.descriptor) else {
            continue;
        };
        if !participates_in_overriding(data) {
            continue;
        }

        // the rename must land on every topmost declaration of the family
        for top in topmost_declarations(ctx.index, class_data, &key.name, &key.descriptor) {
            if top == class_name {
                continue;
            }
            let already_named = ctx
                .mappings
                .get_class(&top)
                .and_then(|c| c.get_method(&key.name, &key.descriptor))
                .and_then(|m| m.deobf_name.as_deref())
                .is_some();
            if !already_named {
                registry.submit(Change::AddMemberMapping {
                    target: MemberRef::method(&top, &key.name, &key.descriptor),
                    deobf_name: deobf.to_string(),
                });
            }
        }

        // a named bridge pushes its name onto the hydrated target
        if let Some(target) = ctx.hydration.bridge_target(&member) {
            let named = ctx
                .mappings
                .get_class(&target.class_name)
                .and_then(|c| {
                    c.get_method(&target.name, target.descriptor.as_deref().unwrap_or(""))
                })
                .and_then(|m| m.deobf_name.as_deref())
                .is_some();
            if !named {
                registry.submit(Change::AddMemberMapping {
                    target: target.clone(),
                    deobf_name: deobf.to_string(),
                });
            }
        }
    }
}

fn copy_down(
    class_data: Option<&ClassData>,
    class_name: &str,
    ctx: &ChainContext<'_>,
    registry: &mut ChangeRegistry,
) {
    let Some(class_data) = class_data else {
        return;
    };
    for method in &class_data.methods {
        let current = ctx
            .mappings
            .get_class(class_name)
            .and_then(|c| c.get_method(&method.name, &method.descriptor))
            .and_then(|m| m.deobf_name.clone());
        let member = MemberRef::method(class_name, &method.name, &method.descriptor);

        // a bridge follows its hydrated target's name, whether the bridge
        // is unnamed or disagrees
        if let Some(target) = ctx.hydration.bridge_target(&member) {
            let target_name = ctx
                .mappings
                .get_class(&target.class_name)
                .and_then(|c| {
                    c.get_method(&target.name, target.descriptor.as_deref().unwrap_or(""))
                })
                .and_then(|m| m.deobf_name.clone());
            if let Some(deobf) = target_name {
                if current.as_deref() != Some(deobf.as_str()) {
                    registry.submit(Change::AddMemberMapping {
                        target: member,
                        deobf_name: deobf,
                    });
                }
                continue;
            }
        }

        if !participates_in_overriding(method) {
            continue;
        }
        // the nearest mapped ancestor in the override family is
        // authoritative; a child naming the member differently is realigned
        for ancestor in ctx.index.ancestors(class_data) {
            if ancestor.find_method(&method.name, &method.descriptor).is_none() {
                continue;
            }
            let inherited = ctx
                .mappings
                .get_class(&ancestor.name)
                .and_then(|c| c.get_method(&method.name, &method.descriptor))
                .and_then(|m| m.deobf_name.clone());
            if let Some(deobf) = inherited {
                if current.as_deref() != Some(deobf.as_str()) {
                    registry.submit(Change::AddMemberMapping {
                        target: MemberRef::method(class_name, &method.name, &method.descriptor),
                        deobf_name: deobf,
                    });
                }
                break;
            }
        }
    }
}

/// Static, private, and constructor members never participate in the
/// polymorphic override contract.
fn participates_in_overriding(method: &MethodData) -> bool {
    !method.is_static() && !method.is_private() && !method.is_constructor()
}

/// All topmost classes in the hierarchy of `class` that declare the given
/// method: declarations none of whose own ancestors declare it.
fn topmost_declarations(
    index: &ClasspathIndex,
    class: &ClassData,
    name: &str,
    descriptor: &str,
) -> Vec<String> {
    let mut declaring: Vec<&ClassData> = index
        .ancestors(class)
        .into_iter()
        .filter(|c| c.find_method(name, descriptor).is_some())
        .collect();
    declaring.push(class);

    let mut out: Vec<String> = declaring
        .iter()
        .filter(|candidate| {
            !index
                .ancestors(candidate)
                .iter()
                .any(|a| a.find_method(name, descriptor).is_some())
        })
        .map(|c| c.name.clone())
        .collect();
    out.sort();
    out.dedup();
    out
}
