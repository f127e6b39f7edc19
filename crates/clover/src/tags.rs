//! Resolution of tag identifiers to tag names.
//!
//! Tags live in the relational store, not in the search index, so relevance
//! queries first turn the caller's tag ids into names through a [`TagResolver`].

use ahash::AHashMap as HashMap;
use itertools::Itertools;

use crate::document::{Tag, TagId};

/// Looks up tag records by identifier.
///
/// Implementations return the tags that exist for the given ids in any order;
/// unknown ids are skipped. Failures are passed back to the caller untouched.
pub trait TagResolver: Send + Sync {
    fn resolve(&self, ids: &[TagId]) -> anyhow::Result<Vec<Tag>>;
}

impl<F> TagResolver for F
where
    F: Fn(&[TagId]) -> anyhow::Result<Vec<Tag>> + Send + Sync,
{
    fn resolve(&self, ids: &[TagId]) -> anyhow::Result<Vec<Tag>> {
        self(ids)
    }
}

/// Tag table held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTagResolver {
    tags: HashMap<TagId, String>,
}

impl InMemoryTagResolver {
    pub fn new(tags: impl IntoIterator<Item = Tag>) -> Self {
        Self {
            tags: tags.into_iter().map(|t| (t.id, t.name)).collect(),
        }
    }

    pub fn insert(&mut self, tag: Tag) {
        self.tags.insert(tag.id, tag.name);
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl TagResolver for InMemoryTagResolver {
    fn resolve(&self, ids: &[TagId]) -> anyhow::Result<Vec<Tag>> {
        Ok(ids
            .iter()
            .unique()
            .filter_map(|id| self.tags.get(id).map(|name| Tag::new(*id, name.clone())))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_resolver_skips_unknown_ids() {
        let resolver = InMemoryTagResolver::new([Tag::new(1, "cozy"), Tag::new(2, "spicy")]);
        let tags = resolver.resolve(&[2, 99, 1]).unwrap();
        assert_eq!(tags, vec![Tag::new(2, "spicy"), Tag::new(1, "cozy")]);
        assert_eq!(resolver.len(), 2);
    }

    #[test]
    fn test_in_memory_resolver_returns_each_tag_once() {
        let resolver = InMemoryTagResolver::new([Tag::new(1, "cozy"), Tag::new(2, "spicy")]);
        let tags = resolver.resolve(&[1, 2, 1, 1]).unwrap();
        assert_eq!(tags, vec![Tag::new(1, "cozy"), Tag::new(2, "spicy")]);
    }

    #[test]
    fn test_closure_resolver_propagates_errors() {
        let failing = |_: &[TagId]| -> anyhow::Result<Vec<Tag>> {
            Err(anyhow::anyhow!("tag store unavailable"))
        };
        let err = failing.resolve(&[1]).unwrap_err();
        assert_eq!(err.to_string(), "tag store unavailable");
    }
}
