//! Parent chain resolution and the reverse dependency index
//!
//! Readiness is transitive: a record is Ready only when every Layer from its
//! reference up to the root exists. Each reconciliation walks the chain with
//! a fresh read per hop, so a stale ancestor never yields Ready.
//!
//! The [`DependencyIndex`] maps a Layer name to the records currently
//! referencing it. The runner uses it to re-enqueue dependents when that
//! Layer changes, instead of waiting out the requeue interval.

use std::collections::{BTreeSet, HashSet};

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::crd::Layer;
use crate::store::{ObjectKey, ResourceStore};

/// Outcome of walking a parent chain
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChainResolution {
    /// Every Layer in the chain exists; `depth` is the number of hops walked
    Resolved {
        /// Hops from the reference to the root
        depth: usize,
    },
    /// A Layer in the chain could not be read
    Missing {
        /// Name of the first unresolvable Layer
        name: String,
        /// True when it is the record's own reference rather than an ancestor
        direct: bool,
    },
    /// The chain loops back on itself
    Cycle {
        /// First Layer seen twice
        name: String,
    },
    /// The chain is longer than the configured limit
    TooDeep {
        /// Configured limit
        limit: usize,
    },
}

/// Walk the chain starting at `reference`
///
/// `origin` is the name of the Layer being reconciled, if the record is a
/// Layer, so a chain leading back to it is reported as a cycle. Fetch errors
/// are treated as the Layer being absent.
pub async fn resolve_chain(
    layers: &dyn ResourceStore<Layer>,
    origin: Option<&str>,
    reference: Option<&str>,
    max_depth: usize,
) -> ChainResolution {
    let mut seen: HashSet<String> = origin.map(str::to_string).into_iter().collect();
    let mut next = reference.filter(|r| !r.is_empty()).map(str::to_string);
    let mut depth = 0;

    while let Some(name) = next.take() {
        if seen.contains(&name) {
            return ChainResolution::Cycle { name };
        }
        if depth >= max_depth {
            return ChainResolution::TooDeep { limit: max_depth };
        }

        let layer = match layers.get(&ObjectKey::cluster(&name)).await {
            Ok(Some(layer)) => layer,
            Ok(None) => {
                return ChainResolution::Missing {
                    direct: depth == 0,
                    name,
                }
            }
            Err(e) => {
                warn!(layer = %name, error = %e, "failed to read Layer in chain, treating as missing");
                return ChainResolution::Missing {
                    direct: depth == 0,
                    name,
                };
            }
        };

        depth += 1;
        if layer.spec.has_parent() {
            next = Some(layer.spec.parent.clone());
        }
        seen.insert(name);
    }

    ChainResolution::Resolved { depth }
}

/// Reverse index from a referenced Layer to the records that reference it
#[derive(Debug, Default)]
pub struct DependencyIndex {
    dependents: DashMap<String, BTreeSet<ObjectKey>>,
    references: DashMap<ObjectKey, String>,
}

impl DependencyIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `dependent` references `layer`, replacing any previous
    /// reference. `None` or an empty name drops the dependent.
    pub fn track(&self, dependent: &ObjectKey, layer: Option<&str>) {
        let layer = layer.filter(|l| !l.is_empty());
        if let Some(current) = self.references.get(dependent) {
            if Some(current.as_str()) == layer {
                return;
            }
        }

        self.forget(dependent);
        if let Some(layer) = layer {
            debug!(dependent = %dependent, layer = %layer, "tracking dependency");
            self.references.insert(dependent.clone(), layer.to_string());
            self.dependents
                .entry(layer.to_string())
                .or_default()
                .insert(dependent.clone());
        }
    }

    /// Drop `dependent` from the index
    pub fn forget(&self, dependent: &ObjectKey) {
        let Some((_, layer)) = self.references.remove(dependent) else {
            return;
        };
        if let Some(mut set) = self.dependents.get_mut(&layer) {
            set.remove(dependent);
        }
        self.dependents.remove_if(&layer, |_, set| set.is_empty());
    }

    /// Records currently referencing `layer`
    pub fn dependents_of(&self, layer: &str) -> Vec<ObjectKey> {
        self.dependents
            .get(layer)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// The Layer `dependent` currently references, if tracked
    pub fn reference_of(&self, dependent: &ObjectKey) -> Option<String> {
        self.references.get(dependent).map(|r| r.value().clone())
    }
}
