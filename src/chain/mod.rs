//! Change chain: ordered contributor links applied over mapping snapshots
//!
//! A link is one or more contributors run against the same mapping-set
//! snapshot; their proposals are unioned into one registry and applied as a
//! single atomic batch, producing the next snapshot. Links execute exactly
//! once each, in the configured order; a completion pass runs after every
//! batch application. Any contributor fault aborts the whole run before
//! output is written.

pub mod changes;
pub mod contributors;

use crate::classpath::ClasspathIndex;
use crate::common::{Error, Result};
use crate::hydrate::HydrationOverlay;
use crate::mapping::MappingSet;

pub use changes::{Change, ChangeRegistry};
pub use contributors::{ChainContext, Contributor};

/// Ordered sequence of contributor links
#[derive(Debug, Default)]
pub struct ChangeChain {
    links: Vec<Vec<Contributor>>,
}

impl ChangeChain {
    pub fn create() -> Self {
        Self::default()
    }

    pub fn add_link(mut self, contributors: impl Into<Vec<Contributor>>) -> Self {
        self.links.push(contributors.into());
        self
    }

    /// Run every link once, in order, folding each applied batch into the
    /// next snapshot. Returns the final mapping set.
    pub fn apply_chain(
        &self,
        mut mappings: MappingSet,
        completion: &CompletionManager<'_>,
    ) -> Result<MappingSet> {
        for link in &self.links {
            let batch = completion.run_link(link, &mappings)?;
            log::debug!(
                "chain link [{}]: {} changes",
                link.iter().map(Contributor::name).collect::<Vec<_>>().join(", "),
                batch.len()
            );
            for change in &batch {
                changes::apply_change(&mut mappings, change);
            }
            completion.complete(&mut mappings);
        }
        Ok(mappings)
    }
}

/// Drives contributor passes over (classpath ∪ mapping) classes and runs
/// the post-batch completion hook.
pub struct CompletionManager<'a> {
    index: &'a ClasspathIndex,
    hydration: &'a HydrationOverlay,
}

impl<'a> CompletionManager<'a> {
    pub fn create(index: &'a ClasspathIndex, hydration: &'a HydrationOverlay) -> Self {
        Self { index, hydration }
    }

    /// Run all contributors of one link against a snapshot and produce the
    /// unioned, validated change batch.
    fn run_link(&self, link: &[Contributor], mappings: &MappingSet) -> Result<Vec<Change>> {
        let ctx = ChainContext {
            index: self.index,
            hydration: self.hydration,
            mappings,
        };
        let mut registry = ChangeRegistry::new();
        for contributor in link {
            // every classpath class, with its mapping when one exists
            for class in self.index.primary_classes() {
                contributor
                    .contribute(
                        Some(class),
                        &class.name,
                        mappings.get_class(&class.name),
                        &ctx,
                        &mut registry,
                    )
                    .map_err(|e| wrap_contributor_error(contributor, &class.name, e))?;
            }
            // mapping entries with no classpath class behind them
            for (full_name, mapping) in mappings.all_classes() {
                if self.index.get(&full_name).is_some() {
                    continue;
                }
                contributor
                    .contribute(None, &full_name, Some(mapping), &ctx, &mut registry)
                    .map_err(|e| wrap_contributor_error(contributor, &full_name, e))?;
            }
        }
        registry.into_batch()
    }

    /// Post-batch housekeeping: drop class mappings that no longer carry
    /// any information, bottom-up.
    fn complete(&self, mappings: &mut MappingSet) {
        let mut empty: Vec<String> = Vec::new();
        loop {
            empty.clear();
            for (full_name, class) in mappings.all_classes() {
                if class.is_empty() {
                    empty.push(full_name);
                }
            }
            if empty.is_empty() {
                return;
            }
            // innermost first so that emptied parents go on the next sweep
            empty.sort_by_key(|n| std::cmp::Reverse(n.len()));
            for name in &empty {
                mappings.remove_class(name);
            }
        }
    }
}

fn wrap_contributor_error(contributor: &Contributor, class: &str, err: Error) -> Error {
    match err {
        already @ Error::ContributorExecution { .. } => already,
        other => Error::contributor_execution(
            contributor.name(),
            format!("while inspecting {}: {}", class, other),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classpath::ClassData;
    use crate::hydrate::hydrate;
    use crate::mapping::FieldKey;

    #[test]
    fn test_chain_removes_stale_and_prunes_empty() {
        let index = ClasspathIndex::from_class_data(
            vec![ClassData::synthetic("a", Some("java/lang/Object"))],
            vec![ClassData::synthetic("java/lang/Object", None)],
        );
        let overlay = hydrate(&index);
        let completion = CompletionManager::create(&index, &overlay);

        let mut mappings = MappingSet::new();
        mappings.get_or_create_class("a").deobf_name = Some("com/x/Foo".to_string());
        mappings.get_or_create_class("gone").deobf_name = Some("com/x/Gone".to_string());
        // a field the classpath does not know: its removal empties the class
        mappings
            .get_or_create_class("b")
            .get_or_create_field(FieldKey::new("x", Some("I".to_string())))
            .deobf_name = Some("y".to_string());

        let chain = ChangeChain::create().add_link(vec![Contributor::RemoveUnusedMappings]);
        let out = chain.apply_chain(mappings, &completion).unwrap();

        assert!(out.get_class("a").is_some());
        assert!(out.get_class("gone").is_none());
        assert!(out.get_class("b").is_none());
    }

    #[test]
    fn test_all_link_contributors_share_one_snapshot() {
        // RemoveObfSpigotMappings sees the class mapping even though
        // RemoveUnusedMappings in the same link proposes removing it: both
        // read the same snapshot, the batch applies afterwards.
        let index = ClasspathIndex::from_class_data(vec![], vec![]);
        let overlay = hydrate(&index);
        let completion = CompletionManager::create(&index, &overlay);

        let mut mappings = MappingSet::new();
        mappings.get_or_create_class("a").deobf_name = Some("NoPackage".to_string());

        let chain = ChangeChain::create().add_link(vec![
            Contributor::RemoveUnusedMappings,
            Contributor::RemoveObfSpigotMappings,
        ]);
        let out = chain.apply_chain(mappings, &completion).unwrap();
        assert!(out.is_empty());
    }
}
