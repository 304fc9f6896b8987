//! User plane path computation
//!
//! A forwarding path runs from an AN source to an anchor UPF. The DFS
//! finder returns the first path it discovers, exploring neighbors in
//! adjacency order (deterministic with respect to insertion) and pruning
//! subtrees whose UPF does not support the requested slice. Computed
//! paths are cached per selection key — and per destination IP for the
//! pinned-destination variant — until a node on them is deleted.

use std::collections::{HashSet, VecDeque};

use crate::error::UserPlaneError;
use crate::node::SelectionParams;
use crate::topology::{UserPlaneContext, UserPlaneTopology};

impl UserPlaneTopology {
    /// First DFS path from `src` to `dst` honoring the slice gate. The
    /// destination is compared by node name; non-supporting neighbors are
    /// marked visited on rejection so they are never re-entered.
    pub fn path_between(
        &self,
        src: &str,
        dst: &str,
        selection: &SelectionParams,
    ) -> Option<Vec<String>> {
        let mut visited = HashSet::new();
        self.dfs(src, dst, selection, &mut visited)
    }

    fn dfs(
        &self,
        cur: &str,
        dst: &str,
        selection: &SelectionParams,
        visited: &mut HashSet<String>,
    ) -> Option<Vec<String>> {
        visited.insert(cur.to_string());

        if cur == dst {
            return Some(vec![cur.to_string()]);
        }

        let node = self.node(cur)?;
        for neighbor in &node.neighbors {
            if visited.contains(neighbor) {
                continue;
            }
            let traversable = self
                .node(neighbor)
                .map(|n| n.supports_snssai(&selection.snssai))
                .unwrap_or(false);
            if !traversable {
                visited.insert(neighbor.clone());
                continue;
            }
            if let Some(tail) = self.dfs(neighbor, dst, selection, visited) {
                let mut path = Vec::with_capacity(tail.len() + 1);
                path.push(cur.to_string());
                path.extend(tail);
                return Some(path);
            }
        }
        None
    }

    /// UPFs whose service descriptor matches the full (S-NSSAI, DNN,
    /// DNAI) triplet, sorted by name.
    pub fn select_match_upf(&self, selection: &SelectionParams) -> Vec<String> {
        let mut matches: Vec<String> = self
            .upf_names()
            .filter(|name| {
                self.node(name)
                    .and_then(|node| node.upf.as_ref())
                    .map(|upf| upf.serves(selection))
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        matches.sort();
        matches
    }

    /// Cache lookup only; never computes.
    pub fn default_path_cached(&self, selection: &SelectionParams) -> Option<Vec<String>> {
        self.default_path.get(&selection.selection_key()).cloned()
    }

    /// Default path for a selection: cached, or computed towards the
    /// first matching UPF and cached. The AN source is stripped from the
    /// head before caching. `None` when there is no AN, no candidate or
    /// no connecting path.
    pub fn generate_default_path(&mut self, selection: &SelectionParams) -> Option<Vec<String>> {
        let key = selection.selection_key();
        if let Some(path) = self.default_path.get(&key) {
            return Some(path.clone());
        }

        let source = match self.path_source() {
            Some(source) => source.clone(),
            None => {
                log::error!("there is no AN node in the user plane topology");
                return None;
            }
        };
        let candidates = self.select_match_upf(selection);
        let dst = match candidates.first() {
            Some(dst) => dst.clone(),
            None => {
                log::error!(
                    "cannot find UPF serving DNN[{}] S-NSSAI[sst:{} sd:{}] DNAI[{}]",
                    selection.dnn,
                    selection.snssai.sst,
                    selection.snssai.sd,
                    selection.dnai
                );
                return None;
            }
        };

        let path = strip_an_head(&source, self.path_between(&source, &dst, selection)?);
        self.default_path.insert(key, path.clone());
        Some(path)
    }

    /// Cache lookup for the pinned-destination variant.
    pub fn default_path_to_upf_cached(
        &self,
        selection: &SelectionParams,
        dst: &str,
    ) -> Option<Vec<String>> {
        let dest_key = self.path_dest_key(dst)?;
        self.default_path_to_upf
            .get(&selection.selection_key())?
            .get(&dest_key)
            .cloned()
    }

    /// Default path pinned to a specific destination UPF, cached per
    /// (selection key, destination IP).
    pub fn generate_default_path_to_upf(
        &mut self,
        selection: &SelectionParams,
        dst: &str,
    ) -> Option<Vec<String>> {
        let key = selection.selection_key();
        let dest_key = self.path_dest_key(dst)?;
        if let Some(path) = self.default_path_to_upf.get(&key).and_then(|m| m.get(&dest_key)) {
            return Some(path.clone());
        }

        let source = match self.path_source() {
            Some(source) => source.clone(),
            None => {
                log::error!("there is no AN node in the user plane topology");
                return None;
            }
        };

        let path = strip_an_head(&source, self.path_between(&source, dst, selection)?);
        self.default_path_to_upf
            .entry(key)
            .or_default()
            .insert(dest_key, path.clone());
        Some(path)
    }

    /// Destination cache key: the resolved UPF IP, or the node name for
    /// FQDN UPFs which carry no IP key.
    fn path_dest_key(&self, dst: &str) -> Option<String> {
        let node = self.node(dst)?;
        Some(node.resolved_ip().unwrap_or_else(|| dst.to_string()))
    }

    /// BFS anchor enumeration. Starting at `src`, only neighbors serving
    /// the full selection triplet are entered; a dequeued UPF that finds
    /// no undiscovered serving neighbor on its own frontier is an anchor.
    /// Interior nodes whose successors were all discovered earlier
    /// therefore count as anchors too. Returned in BFS-completion order.
    pub fn anchor_upfs(&self, src: &str, selection: &SelectionParams) -> Vec<String> {
        let mut anchors = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<String> = VecDeque::new();
        queue.push_back(src.to_string());

        while let Some(name) = queue.pop_front() {
            if !visited.insert(name.clone()) {
                continue;
            }
            let node = match self.node(&name) {
                Some(node) => node,
                None => continue,
            };

            let mut found_new = false;
            for neighbor in &node.neighbors {
                if visited.contains(neighbor) {
                    continue;
                }
                let serves = self
                    .node(neighbor)
                    .and_then(|n| n.upf.as_ref())
                    .map(|upf| upf.serves(selection))
                    .unwrap_or(false);
                if serves {
                    queue.push_back(neighbor.clone());
                    found_new = true;
                }
            }

            if !found_new && node.is_upf() {
                anchors.push(name);
            }
        }
        anchors
    }
}

fn strip_an_head(source: &str, mut path: Vec<String>) -> Vec<String> {
    if path.first().map(|head| head == source).unwrap_or(false) {
        path.remove(0);
    }
    path
}

// ============================================================================
// Data path
// ============================================================================

/// One hop of a data path; `prev`/`next` index into [`DataPath::nodes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPathNode {
    pub upf_name: String,
    pub prev: Option<usize>,
    pub next: Option<usize>,
}

/// Doubly-linked forwarding chain built from a computed path. Links are
/// arena indices rather than references, so the session layer can walk
/// both directions without touching the topology lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPath {
    pub nodes: Vec<DataPathNode>,
}

impl DataPath {
    /// Build from a node-name path. The head gets `prev = None`, the tail
    /// `next = None`; anything shorter than two hops is refused.
    pub fn from_path(path: &[String]) -> Result<Self, UserPlaneError> {
        if path.len() < 2 {
            return Err(UserPlaneError::PathTooShort(path.len()));
        }
        let last = path.len() - 1;
        let nodes = path
            .iter()
            .enumerate()
            .map(|(i, name)| DataPathNode {
                upf_name: name.clone(),
                prev: (i > 0).then(|| i - 1),
                next: (i < last).then(|| i + 1),
            })
            .collect();
        Ok(Self { nodes })
    }

    pub fn first(&self) -> Option<&DataPathNode> {
        self.nodes.first()
    }

    pub fn last(&self) -> Option<&DataPathNode> {
        self.nodes.last()
    }
}

// ============================================================================
// Context-level access (read fast path, write on cache miss)
// ============================================================================

impl UserPlaneContext {
    /// Cached default path for a selection, computing and caching it on
    /// miss. The miss path upgrades to the write lock because cache
    /// population mutates the store.
    pub fn default_path(&self, selection: &SelectionParams) -> Option<Vec<String>> {
        if let Some(path) = self.read().default_path_cached(selection) {
            return Some(path);
        }
        self.write().generate_default_path(selection)
    }

    /// Cached default path pinned to a destination UPF.
    pub fn default_path_to_upf(
        &self,
        selection: &SelectionParams,
        dst: &str,
    ) -> Option<Vec<String>> {
        if let Some(path) = self.read().default_path_to_upf_cached(selection, dst) {
            return Some(path);
        }
        self.write().generate_default_path_to_upf(selection, dst)
    }
}
