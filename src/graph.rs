//! Inheritance graph over source types and Blueprint assets.
//!
//! Parent links are textual names: C++ and AngelScript types point at
//! their base class, Blueprints point at `parent_class` (recorded by
//! the asset parser WITHOUT the UE type prefix). The traversal
//! therefore consults both the prefixed and stripped form of every
//! frontier name, which is what stitches `BP_Hero -> Actor` onto
//! `AActor`'s subtree.

use crate::fuzzy::prefix::stripped_or_self;
use crate::types::{AssetRecord, TypeRecord};
use ahash::{AHashMap, AHashSet};
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

/// Parent/children adjacency with memoized transitive closure.
#[derive(Default)]
pub struct InheritanceGraph {
    /// parent name -> child names (multi-valued)
    children: AHashMap<String, Vec<String>>,
    /// child name -> parent name
    parent: AHashMap<String, String>,
    /// Memoized descendant sets per root, cleared on ingest.
    closure: RwLock<AHashMap<String, Arc<Vec<String>>>>,
}

impl InheritanceGraph {
    /// Builds the adjacency maps from current index contents.
    ///
    /// Sources: every type with a parent and an inheritable kind, and
    /// every Blueprint asset (non-null `asset_class` + `parent_class`).
    pub fn build<'a>(
        types: impl Iterator<Item = &'a TypeRecord>,
        assets: impl Iterator<Item = &'a AssetRecord>,
    ) -> Self {
        let mut graph = Self::default();

        for t in types {
            if !t.kind.is_inheritable() {
                continue;
            }
            if let Some(parent) = &t.parent {
                graph.link(parent.clone(), t.name.clone());
            }
        }

        for a in assets {
            if !a.is_blueprint() {
                continue;
            }
            if let Some(parent) = &a.parent_class {
                graph.link(parent.clone(), a.name.clone());
            }
        }

        graph
    }

    fn link(&mut self, parent: String, child: String) {
        self.children.entry(parent.clone()).or_default().push(child.clone());
        self.parent.insert(child, parent);
    }

    /// Direct children of a name, both prefixed and stripped forms.
    #[must_use]
    pub fn direct_children(&self, name: &str) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        if let Some(children) = self.children.get(name) {
            out.extend(children.iter().map(String::as_str));
        }
        let stripped = stripped_or_self(name);
        if stripped != name {
            if let Some(children) = self.children.get(stripped) {
                out.extend(children.iter().map(String::as_str));
            }
        }
        out
    }

    #[must_use]
    pub fn parent_of(&self, name: &str) -> Option<&str> {
        self.parent
            .get(name)
            .or_else(|| self.parent.get(stripped_or_self(name)))
            .map(String::as_str)
    }

    /// Whether the root name appears anywhere in the graph.
    #[must_use]
    pub fn knows(&self, name: &str) -> bool {
        self.children.contains_key(name)
            || self.parent.contains_key(name)
            || self.children.contains_key(stripped_or_self(name))
            || self.parent.contains_key(stripped_or_self(name))
    }

    /// All names reachable from a root, memoized per root.
    ///
    /// Breadth-first over `children`; each frontier name is expanded
    /// through both its literal and prefix-stripped variants so asset
    /// parents recorded un-prefixed still union in their subtrees.
    #[must_use]
    pub fn descendants(&self, root: &str) -> Arc<Vec<String>> {
        if let Ok(cache) = self.closure.read() {
            if let Some(hit) = cache.get(root) {
                return Arc::clone(hit);
            }
        }

        let mut visited: AHashSet<&str> = AHashSet::new();
        let mut order: Vec<String> = Vec::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(root);
        visited.insert(root);

        while let Some(current) = queue.pop_front() {
            for child in self.direct_children(current) {
                if visited.insert(child) {
                    order.push(child.to_string());
                    queue.push_back(child);
                }
            }
        }

        let result = Arc::new(order);
        if let Ok(mut cache) = self.closure.write() {
            cache.insert(root.to_string(), Arc::clone(&result));
        }
        result
    }

    /// Ancestor chain of a name, nearest first. Cycle-guarded.
    #[must_use]
    pub fn ancestors(&self, name: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut seen: AHashSet<&str> = AHashSet::new();
        let mut current = name;
        seen.insert(current);
        while let Some(parent) = self.parent_of(current) {
            if !seen.insert(parent) {
                break;
            }
            out.push(parent.to_string());
            current = parent;
        }
        out
    }

    /// Whether `name` transitively inherits from `ancestor`, matching
    /// either the literal or stripped form.
    #[must_use]
    pub fn inherits_from(&self, name: &str, ancestor: &str) -> bool {
        let stripped_ancestor = stripped_or_self(ancestor);
        self.ancestors(name)
            .iter()
            .any(|a| a == ancestor || stripped_or_self(a) == stripped_ancestor)
    }

    /// Clears the memoized closure. Called on every ingest batch.
    pub fn invalidate(&self) {
        if let Ok(mut cache) = self.closure.write() {
            cache.clear();
        }
    }

    /// Computes per-name inheritance depths by BFS from the roots.
    ///
    /// A root is a name that occurs as a parent but has no parent of
    /// its own. Names reachable from several roots keep their first
    /// (shortest) distance. Ties across languages are first-writer-wins
    /// since the graph joins on bare name equality.
    #[must_use]
    pub fn compute_depths(&self) -> AHashMap<String, u32> {
        let mut depths: AHashMap<String, u32> = AHashMap::new();
        let mut queue: VecDeque<(&str, u32)> = VecDeque::new();

        for parent in self.children.keys() {
            if !self.has_parent_any_variant(parent) {
                depths.insert(parent.clone(), 0);
                queue.push_back((parent, 0));
            }
        }

        while let Some((current, depth)) = queue.pop_front() {
            for child in self.direct_children(current) {
                if !depths.contains_key(child) {
                    depths.insert(child.to_string(), depth + 1);
                    queue.push_back((child, depth + 1));
                }
            }
        }

        depths
    }

    /// Root detection must see through stripped asset-parent aliases:
    /// `Character` is not a root when `ACharacter` has a parent.
    fn has_parent_any_variant(&self, name: &str) -> bool {
        if self.parent_of(name).is_some() {
            return true;
        }
        crate::fuzzy::prefix::UE_PREFIXES
            .iter()
            .any(|p| self.parent.contains_key(&format!("{p}{name}")))
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.parent.len()
    }
}
