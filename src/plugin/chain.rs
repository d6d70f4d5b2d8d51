//! Resolver Chain
//!
//! Ordered list of resolvers consulted for every import. The list is never
//! mutated in place: install and evict publish a complete replacement through
//! an RCU swap, so a concurrent lookup sees either the old or the new chain.

use std::sync::Arc;
use arc_swap::ArcSwap;
use log::{debug, info};
use crate::content::Snapshot;
use super::importer::{RepoImporter, Resolver, ResolverIdentity};

pub struct ResolverChain {
    entries: ArcSwap<Vec<Arc<dyn Resolver>>>,
}

impl ResolverChain {
    pub fn new() -> Self {
        Self {
            entries: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Evict every entry with the same identity, then append `resolver` (lowest priority)
    pub fn install(&self, resolver: Arc<dyn Resolver>) {
        let identity = resolver.identity();
        let previous = self.entries.rcu(|current| {
            let mut next: Vec<Arc<dyn Resolver>> = current
                .iter()
                .filter(|entry| entry.identity() != identity)
                .cloned()
                .collect();
            next.push(Arc::clone(&resolver));
            next
        });
        let replaced = previous.iter().filter(|entry| entry.identity() == identity).count();
        debug!("Installed resolver {} (replaced {}, chain length {})", identity, replaced, self.len());
    }

    /// Remove every entry with `identity`; returns true when something was removed
    pub fn evict(&self, identity: &ResolverIdentity) -> bool {
        let previous = self.entries.rcu(|current| {
            current
                .iter()
                .filter(|entry| &entry.identity() != identity)
                .cloned()
                .collect::<Vec<_>>()
        });
        let removed = previous.iter().any(|entry| &entry.identity() == identity);
        if removed {
            debug!("Evicted resolver {}", identity);
        }
        removed
    }

    /// First resolver, in chain order, that claims `fullname`
    pub fn find(&self, fullname: &str) -> Option<Arc<dyn Resolver>> {
        self.entries.load().iter().find(|entry| entry.claims(fullname)).cloned()
    }

    pub fn identities(&self) -> Vec<ResolverIdentity> {
        self.entries.load().iter().map(|entry| entry.identity()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ResolverChain {
    fn default() -> Self {
        Self::new()
    }
}

/// Point the repository importer for `namespace` at `snapshot`.
///
/// Safe to call on every load pass: the previous importer for the namespace is
/// evicted, so the chain never grows across reloads.
pub fn install_repo_importer(
    chain: &ResolverChain,
    namespace: &str,
    snapshot: Arc<Snapshot>,
    plugin_root: &str,
) -> Arc<RepoImporter> {
    let importer = Arc::new(RepoImporter::new(namespace, snapshot, plugin_root));
    info!(
        "Repository importer for {} serving {} modules at {}",
        namespace,
        importer.index().len(),
        importer.index().revision()
    );
    chain.install(Arc::clone(&importer) as Arc<dyn Resolver>);
    importer
}
