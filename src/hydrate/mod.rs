//! Hydration: derived relationships the raw classfile metadata cannot express
//!
//! Two relationship kinds are derived over the classpath index and stored
//! in a separate overlay keyed by member reference, leaving the raw facts
//! untouched:
//!
//! - bridge method to target method: the compiler-synthesized type-erasure
//!   overload and the real implementation it forwards to must keep their
//!   names in sync;
//! - constructor to super-constructor: which immediate-superclass
//!   constructor a constructor invokes, used to propagate constructor
//!   parameter names upward.
//!
//! Hydration is a pure derivation: running it twice over the same index
//! yields identical overlays.

use std::collections::HashMap;

use crate::classpath::descriptor::parameter_count;
use crate::classpath::{ClassData, ClasspathIndex, MethodData};
use crate::common::consts::CONSTRUCTOR_METHOD_NAME;
use crate::mapping::MemberRef;

/// Read-only overlay of derived relationship edges
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HydrationOverlay {
    bridge_targets: HashMap<MemberRef, MemberRef>,
    super_ctors: HashMap<MemberRef, MemberRef>,
}

impl HydrationOverlay {
    /// The method a bridge forwards to, if the member is a hydrated bridge
    pub fn bridge_target(&self, bridge: &MemberRef) -> Option<&MemberRef> {
        self.bridge_targets.get(bridge)
    }

    /// The immediate-superclass constructor this constructor invokes
    pub fn super_constructor(&self, ctor: &MemberRef) -> Option<&MemberRef> {
        self.super_ctors.get(ctor)
    }
}

/// Derive bridge and super-constructor links for every class in the index.
pub fn hydrate(index: &ClasspathIndex) -> HydrationOverlay {
    let mut overlay = HydrationOverlay::default();
    for class in index.primary_classes() {
        for method in &class.methods {
            if method.is_bridge() {
                if let Some(target) = resolve_bridge_target(class, method, index) {
                    let bridge = MemberRef::method(&class.name, &method.name, &method.descriptor);
                    overlay.bridge_targets.insert(bridge, target);
                }
            }
            if method.is_constructor() {
                if let Some(target) = resolve_super_constructor(class, method) {
                    let ctor = MemberRef::method(&class.name, &method.name, &method.descriptor);
                    overlay.super_ctors.insert(ctor, target);
                }
            }
        }
    }
    overlay
}

/// A bridge forwards to the one same-name, same-arity method it invokes.
/// The invocation target is normalized to the class that actually declares
/// the method, so mapping lookups land on the declaration.
fn resolve_bridge_target(
    class: &ClassData,
    bridge: &MethodData,
    index: &ClasspathIndex,
) -> Option<MemberRef> {
    let arity = parameter_count(&bridge.descriptor);
    let invoked = bridge.invocations.iter().find(|inv| {
        inv.name == bridge.name
            && inv.name != CONSTRUCTOR_METHOD_NAME
            && inv.descriptor.as_deref() != Some(bridge.descriptor.as_str())
            && inv
                .descriptor
                .as_deref()
                .map_or(false, |d| parameter_count(d) == arity)
    })?;
    let descriptor = invoked.descriptor.as_deref()?;
    let declaring = declaring_class(index, &invoked.class_name, &invoked.name, descriptor)
        .unwrap_or(invoked.class_name.as_str());
    Some(MemberRef::method(declaring, &invoked.name, descriptor))
}

/// Walk up from `start` to the nearest class declaring the method
fn declaring_class<'a>(
    index: &'a ClasspathIndex,
    start: &str,
    name: &str,
    descriptor: &str,
) -> Option<&'a str> {
    let class = index.get(start)?;
    if class.find_method(name, descriptor).is_some() {
        return Some(&class.name);
    }
    index
        .ancestors(class)
        .into_iter()
        .find(|c| c.find_method(name, descriptor).is_some())
        .map(|c| c.name.as_str())
}

/// The first `<init>` invocation against the immediate superclass is the
/// super-constructor call; `this(...)` delegation stays within the class
/// and produces no link.
fn resolve_super_constructor(class: &ClassData, ctor: &MethodData) -> Option<MemberRef> {
    let super_name = class.super_name.as_deref()?;
    ctor.invocations
        .iter()
        .find(|inv| inv.name == CONSTRUCTOR_METHOD_NAME && inv.class_name == super_name)
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::consts::access_flags::{ACC_BRIDGE, ACC_SYNTHETIC};

    fn method(name: &str, descriptor: &str, flags: u16, invocations: Vec<MemberRef>) -> MethodData {
        MethodData {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            access_flags: flags,
            invocations,
        }
    }

    fn bridge_fixture() -> ClasspathIndex {
        // class b implements Comparable-like i; bridge compareTo(Object)
        // forwards to compareTo(b).
        let mut b = ClassData::synthetic("b", Some("java/lang/Object"));
        b.methods.push(method(
            "compareTo",
            "(Ljava/lang/Object;)I",
            ACC_BRIDGE | ACC_SYNTHETIC,
            vec![MemberRef::method("b", "compareTo", "(Lb;)I")],
        ));
        b.methods.push(method("compareTo", "(Lb;)I", 0, vec![]));
        b.methods.push(method(
            "<init>",
            "()V",
            0,
            vec![MemberRef::method("java/lang/Object", "<init>", "()V")],
        ));
        ClasspathIndex::from_class_data(
            vec![b],
            vec![ClassData::synthetic("java/lang/Object", None)],
        )
    }

    #[test]
    fn test_bridge_hydration() {
        let index = bridge_fixture();
        let overlay = hydrate(&index);

        let bridge = MemberRef::method("b", "compareTo", "(Ljava/lang/Object;)I");
        let target = MemberRef::method("b", "compareTo", "(Lb;)I");
        assert_eq!(overlay.bridge_target(&bridge), Some(&target));
    }

    #[test]
    fn test_super_constructor_hydration() {
        let index = bridge_fixture();
        let overlay = hydrate(&index);

        let ctor = MemberRef::method("b", "<init>", "()V");
        let super_ctor = MemberRef::method("java/lang/Object", "<init>", "()V");
        assert_eq!(overlay.super_constructor(&ctor), Some(&super_ctor));
    }

    #[test]
    fn test_hydration_is_idempotent() {
        let index = bridge_fixture();
        assert_eq!(hydrate(&index), hydrate(&index));
    }

    #[test]
    fn test_bridge_target_normalized_to_declaring_class() {
        // The bridge in `sub` invokes through `sub`, but the target is
        // declared on `base`.
        let mut sub = ClassData::synthetic("sub", Some("base"));
        sub.methods.push(method(
            "get",
            "()Ljava/lang/Object;",
            ACC_BRIDGE | ACC_SYNTHETIC,
            vec![MemberRef::method("sub", "get", "()Lbase;")],
        ));
        let mut base = ClassData::synthetic("base", Some("java/lang/Object"));
        base.methods.push(method("get", "()Lbase;", 0, vec![]));

        let index = ClasspathIndex::from_class_data(
            vec![sub, base],
            vec![ClassData::synthetic("java/lang/Object", None)],
        );
        let overlay = hydrate(&index);
        let bridge = MemberRef::method("sub", "get", "()Ljava/lang/Object;");
        assert_eq!(
            overlay.bridge_target(&bridge),
            Some(&MemberRef::method("base", "get", "()Lbase;"))
        );
    }
}
