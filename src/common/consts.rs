//! Shared constants: namespace tags, classfile definitions, reserved identifiers

use std::collections::HashSet;
use std::sync::OnceLock;

/// Namespace tag for the original obfuscated names
pub const OBF_NAMESPACE: &str = "official";

/// Namespace tag for the intermediate community mapping space
pub const SPIGOT_NAMESPACE: &str = "spigot";

/// Namespace tag for the public deobfuscated names
pub const DEOBF_NAMESPACE: &str = "mojang+yarn";

/// Header of a Java class file (magic number)
pub const MAGIC: u32 = 0xCAFEBABE;

/// Name of a constructor
pub const CONSTRUCTOR_METHOD_NAME: &str = "<init>";

/// Name of a static initializer
pub const STATIC_INITIALIZER_METHOD_NAME: &str = "<clinit>";

/// JVM access flags used by the classpath index
pub mod access_flags {
    pub const ACC_PUBLIC: u16 = 0x0001;
    pub const ACC_PRIVATE: u16 = 0x0002;
    pub const ACC_PROTECTED: u16 = 0x0004;
    pub const ACC_STATIC: u16 = 0x0008;
    pub const ACC_FINAL: u16 = 0x0010;
    pub const ACC_BRIDGE: u16 = 0x0040;
    pub const ACC_NATIVE: u16 = 0x0100;
    pub const ACC_INTERFACE: u16 = 0x0200;
    pub const ACC_ABSTRACT: u16 = 0x0400;
    pub const ACC_SYNTHETIC: u16 = 0x1000;
    pub const ACC_ANNOTATION: u16 = 0x2000;
    pub const ACC_ENUM: u16 = 0x4000;
    pub const ACC_MODULE: u16 = 0x8000;
}

/// Obfuscated field names that collide with reserved identifiers in the
/// decompiled-source staging format. The list is open for extension.
static RESERVED_FIELD_NAMES: OnceLock<HashSet<&'static str>> = OnceLock::new();

fn reserved_field_names() -> &'static HashSet<&'static str> {
    RESERVED_FIELD_NAMES.get_or_init(|| ["if", "do"].into_iter().collect())
}

/// Escape an obfuscated field name if it is a reserved identifier.
///
/// Returns the escaped replacement (`if` becomes `if_`), or `None` when the
/// name needs no escaping. Only the obfuscated side of a field mapping is
/// ever escaped; the deobfuscated name is left untouched.
pub fn escape_reserved_field_name(name: &str) -> Option<String> {
    if reserved_field_names().contains(name) {
        Some(format!("{}_", name))
    } else {
        None
    }
}
