//! End-to-end reobfuscation mapping generation
//!
//! Composes the three input mapping sets, builds and hydrates the classpath
//! index from the input binary and baseline runtime, runs the contributor
//! chain, and writes the final deobf-to-intermediate mapping file. The
//! output file is written only after the whole chain has completed; any
//! failure leaves no output artifact behind.

use std::path::PathBuf;

use crate::chain::{ChangeChain, CompletionManager, Contributor};
use crate::classpath::{BuildOptions, ClasspathIndex, ProviderRoot};
use crate::common::consts::{DEOBF_NAMESPACE, OBF_NAMESPACE, SPIGOT_NAMESPACE};
use crate::common::Result;
use crate::hydrate::hydrate;
use crate::mapping::compose::{copy_field_mappings, MappingEntity};
use crate::mapping::{tiny, MappingSet};

/// Input and output locations for one reobfuscation run
#[derive(Debug, Clone)]
pub struct ReobfInputs {
    /// Intermediate-to-deobf mapping file (spigot -> mojang)
    pub input_mappings: PathBuf,
    /// Obf-to-intermediate mapping file (official -> spigot)
    pub notch_to_spigot_mappings: PathBuf,
    /// Field-rename source mapping file (official -> mojang)
    pub source_mappings: PathBuf,
    /// The compiled binary to be reobfuscated
    pub input_jar: PathBuf,
    /// Baseline runtime roots, used only for supertype resolution
    pub runtime_roots: Vec<PathBuf>,
    /// Where the final deobf-to-intermediate mapping file is written
    pub output_mappings: PathBuf,
}

/// Generate the reobfuscation mapping file.
///
/// The mapping set under construction is exclusively owned by this run;
/// concurrent runs must build their own sets and indexes.
pub fn generate_reobf_mappings(inputs: &ReobfInputs) -> Result<()> {
    log::debug!("reobf: reading mapping inputs");
    let base_mappings = tiny::read_mapping_file(
        &inputs.input_mappings,
        SPIGOT_NAMESPACE,
        DEOBF_NAMESPACE,
    )?;
    let notch_to_spigot = tiny::read_mapping_file(
        &inputs.notch_to_spigot_mappings,
        OBF_NAMESPACE,
        SPIGOT_NAMESPACE,
    )?;
    let field_mappings =
        tiny::read_mapping_file(&inputs.source_mappings, OBF_NAMESPACE, DEOBF_NAMESPACE)?;

    let output_mappings = compose_output_mappings(&base_mappings, &notch_to_spigot, &field_mappings)?;

    // Classpath build, hydration, and the chain run inside this scope; the
    // container handles are released on every exit path when it unwinds.
    let cleaned = {
        let options = BuildOptions {
            // serial scan keeps propagation results reproducible
            parallelism: 1,
            require_full_classpath: false,
        };
        let primary = [ProviderRoot::from_path(&inputs.input_jar)];
        let context: Vec<ProviderRoot> = inputs
            .runtime_roots
            .iter()
            .map(|p| ProviderRoot::from_path(p))
            .collect();
        let index = ClasspathIndex::build(&primary, &context, &options)?;
        let overlay = hydrate(&index);
        let completion = CompletionManager::create(&index, &overlay);

        ChangeChain::create()
            .add_link(vec![Contributor::RemoveUnusedMappings])
            .add_link(vec![
                Contributor::RemoveAllParameterMappings,
                Contributor::RemoveObfSpigotMappings,
            ])
            .add_link(vec![Contributor::PropagateOuterClassMappings])
            .add_link(vec![Contributor::PropagateMappingsUp])
            .add_link(vec![Contributor::CopyMappingsDown])
            .apply_chain(output_mappings, &completion)?
    };

    log::debug!("reobf: writing output mappings");
    tiny::write_mapping_file(
        &cleaned,
        &inputs.output_mappings,
        DEOBF_NAMESPACE,
        SPIGOT_NAMESPACE,
    )
}

/// Build the working set: graft field renames from the composition source
/// onto the base skeleton, then flip the whole set into the deobf-first
/// orientation the chain operates in.
fn compose_output_mappings(
    base_mappings: &MappingSet,
    notch_to_spigot: &MappingSet,
    field_mappings: &MappingSet,
) -> Result<MappingSet> {
    let spigot_skeleton = notch_to_spigot
        .filter(&|entity| !matches!(entity, MappingEntity::Field(_, _)))
        .reverse();
    let spigot_field_mappings = spigot_skeleton.merge(field_mappings);
    Ok(copy_field_mappings(base_mappings, &spigot_field_mappings)?.reverse())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::FieldKey;

    #[test]
    fn test_compose_output_mappings_grafts_fields() {
        // base: spigot -> mojang, classes and methods only
        let mut base = MappingSet::new();
        let class = base.get_or_create_class("SpigotFoo");
        class.deobf_name = Some("com/x/Foo".to_string());
        class.get_or_create_method("m", "()V").deobf_name = Some("doThing".to_string());

        // official -> spigot
        let mut notch_to_spigot = MappingSet::new();
        notch_to_spigot.get_or_create_class("nt").deobf_name = Some("SpigotFoo".to_string());

        // official -> mojang, carrying the field rename
        let mut fields = MappingSet::new();
        let fc = fields.get_or_create_class("nt");
        fc.deobf_name = Some("com/x/Foo".to_string());
        fc.get_or_create_field(FieldKey::new("if", Some("I".to_string())))
            .deobf_name = Some("flag".to_string());

        let out = compose_output_mappings(&base, &notch_to_spigot, &fields).unwrap();

        // reversed: keyed by mojang names, targeting spigot names
        let class = out.get_class("com/x/Foo").unwrap();
        assert_eq!(class.deobf_name.as_deref(), Some("SpigotFoo"));
        let (_, field) = class.get_field_by_name("flag").unwrap();
        assert_eq!(field.deobf_name.as_deref(), Some("if_"));
        let method = class.get_method("doThing", "()V").unwrap();
        assert_eq!(method.deobf_name.as_deref(), Some("m"));
    }
}
