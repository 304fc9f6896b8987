//! User plane topology store
//!
//! Holds the undirected AN/UPF graph together with every secondary index
//! the rest of the core relies on: the UPF and AN name sets, the resolved
//! IP to name map, the UUID maps and the two default path caches. The
//! whole store sits behind a single reader/writer lock
//! ([`UserPlaneContext`]); collaborators such as PFCP association or
//! session release are always invoked outside that lock.

use std::collections::{HashMap, HashSet, VecDeque};
use std::net::IpAddr;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use uuid::Uuid;

use crate::config::{
    DnnUpfInfoConfig, InterfaceUpfInfoConfig, SnssaiConfig, SnssaiUpfInfoConfig, UeIpPoolConfig,
    UpLinkConfig, UpNodeConfig, UserPlaneConfig,
};
use crate::error::UserPlaneError;
use crate::ip_pool::UeIpPool;
use crate::node::{
    DnnUpfInfo, InterfaceUpfInfo, Snssai, SnssaiUpfInfo, UpInterfaceKind, UpNode, UpNodeKind, Upf,
    UpfStatus,
};
use crate::node_id::NodeId;

/// Identity of a UPF removed from the topology, handed to the session
/// collaborator for resource release.
#[derive(Debug, Clone)]
pub struct RemovedUpf {
    pub name: String,
    pub uuid: Uuid,
    pub node_id: NodeId,
}

/// A UPF that still needs a PFCP association after a config merge.
#[derive(Debug, Clone)]
pub struct PendingAssociation {
    pub name: String,
    pub node_id: NodeId,
}

/// Indexed user plane graph. All mutation goes through the methods below
/// so the indices and the graph can never drift apart.
#[derive(Debug)]
pub struct UserPlaneTopology {
    /// Every node by configured name
    nodes: HashMap<String, UpNode>,
    /// Names of UPF nodes
    upfs: HashSet<String>,
    /// Names of AN nodes
    ans: HashSet<String>,
    /// Resolved IP -> node name; FQDN nodes never appear here
    ip_to_name: HashMap<String, String>,
    /// UPF name -> UUID
    name_to_uuid: HashMap<String, Uuid>,
    /// Resolved UPF IP -> UUID
    ip_to_uuid: HashMap<String, Uuid>,
    /// Selection key -> default path (node names, AN stripped)
    pub(crate) default_path: HashMap<String, Vec<String>>,
    /// Selection key -> destination UPF IP -> path
    pub(crate) default_path_to_upf: HashMap<String, HashMap<String, Vec<String>>>,
}

impl UserPlaneTopology {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            upfs: HashSet::new(),
            ans: HashSet::new(),
            ip_to_name: HashMap::new(),
            name_to_uuid: HashMap::new(),
            ip_to_uuid: HashMap::new(),
            default_path: HashMap::new(),
            default_path_to_upf: HashMap::new(),
        }
    }

    /// Build the topology from its declarative form. Pool overlap across
    /// any two UPFs and malformed node declarations are fatal.
    pub fn from_config(config: &UserPlaneConfig) -> Result<Self, UserPlaneError> {
        config.validate()?;

        let mut topology = Self::new();
        let mut built: Vec<(String, UpNode)> = Vec::new();
        for (name, node_config) in &config.up_nodes {
            built.push((name.clone(), build_up_node(name, node_config)?));
        }

        check_pool_overlap(
            built
                .iter()
                .flat_map(|(_, node)| node.upf.iter())
                .flat_map(|upf| upf.pools()),
        )?;

        for (name, node) in built {
            topology.insert_node(name, node);
        }
        topology.wire_links(&config.links);

        Ok(topology)
    }

    // ------------------------------------------------------------------
    // Runtime mutation
    // ------------------------------------------------------------------

    /// Merge nodes out of a posted configuration. Re-declared names are
    /// warned about and skipped; the pool disjointness invariant is
    /// re-checked against the merged pool set before anything is
    /// inserted, so a rejected merge leaves the store untouched.
    pub fn add_nodes_from_config(
        &mut self,
        config: &UserPlaneConfig,
    ) -> Result<(), UserPlaneError> {
        config.validate()?;

        let mut built: Vec<(String, UpNode)> = Vec::new();
        for (name, node_config) in &config.up_nodes {
            if self.nodes.contains_key(name) {
                log::warn!("node [{name}] already exists, skipping");
                continue;
            }
            built.push((name.clone(), build_up_node(name, node_config)?));
        }

        check_pool_overlap(
            self.nodes
                .values()
                .chain(built.iter().map(|(_, node)| node))
                .flat_map(|node| node.upf.iter())
                .flat_map(|upf| upf.pools()),
        )?;

        for (name, node) in built {
            log::info!("adding node [{name}] to the user plane topology");
            self.insert_node(name, node);
        }
        Ok(())
    }

    /// Wire links out of a posted configuration; unknown endpoints and
    /// duplicate edges are warnings.
    pub fn add_links_from_config(&mut self, config: &UserPlaneConfig) {
        self.wire_links(&config.links);
    }

    /// Remove a node: all indices, every incident edge and every cached
    /// path containing it. Returns the removed UPF identity (if the node
    /// was a UPF) so the caller can hand it to the session collaborator.
    pub fn delete_node(&mut self, name: &str) -> Result<Option<RemovedUpf>, UserPlaneError> {
        let node = self
            .nodes
            .remove(name)
            .ok_or_else(|| UserPlaneError::UnknownNode(name.to_string()))?;
        log::info!("deleting node [{name}] from the user plane topology");

        let resolved_ip = node.resolved_ip();
        if let Some(ip) = &resolved_ip {
            self.ip_to_name.remove(ip);
            self.ip_to_uuid.remove(ip);
        }

        let removed = match node.kind {
            UpNodeKind::An => {
                self.ans.remove(name);
                None
            }
            UpNodeKind::Upf => {
                self.upfs.remove(name);
                self.name_to_uuid.remove(name);
                node.upf.map(|upf| RemovedUpf {
                    name: name.to_string(),
                    uuid: upf.uuid,
                    node_id: upf.node_id,
                })
            }
        };

        for (other_name, other) in self.nodes.iter_mut() {
            if let Some(pos) = other.neighbors.iter().position(|n| n == name) {
                log::info!("deleting link [{other_name}] <=> [{name}]");
                other.neighbors.remove(pos);
            }
        }

        self.invalidate_paths_containing(name);
        Ok(removed)
    }

    /// Drop one undirected edge; missing nodes or a missing edge are
    /// warnings.
    pub fn delete_link(&mut self, a: &str, b: &str) {
        if !self.nodes.contains_key(a) || !self.nodes.contains_key(b) {
            log::warn!("one of link edges does not exist, UPLink [{a}] <=> [{b}] not removed");
            return;
        }
        let mut removed = false;
        if let Some(node) = self.nodes.get_mut(a) {
            if let Some(pos) = node.neighbors.iter().position(|n| n == b) {
                node.neighbors.remove(pos);
                removed = true;
            }
        }
        if let Some(node) = self.nodes.get_mut(b) {
            if let Some(pos) = node.neighbors.iter().position(|n| n == a) {
                node.neighbors.remove(pos);
                removed = true;
            }
        }
        if !removed {
            log::warn!("UPLink [{a}] <=> [{b}] does not exist");
        }
    }

    fn insert_node(&mut self, name: String, node: UpNode) {
        if let Some(ip) = node.resolved_ip() {
            self.ip_to_name.insert(ip.clone(), name.clone());
            if let Some(upf) = &node.upf {
                self.ip_to_uuid.insert(ip, upf.uuid);
            }
        }
        match node.kind {
            UpNodeKind::An => {
                self.ans.insert(name.clone());
            }
            UpNodeKind::Upf => {
                self.upfs.insert(name.clone());
                if let Some(upf) = &node.upf {
                    self.name_to_uuid.insert(name.clone(), upf.uuid);
                }
            }
        }
        self.nodes.insert(name, node);
    }

    fn wire_links(&mut self, links: &[UpLinkConfig]) {
        for link in links {
            let (a, b) = (&link.a, &link.b);
            if a == b {
                log::warn!("self link [{a}] <=> [{b}] not established");
                continue;
            }
            if !self.nodes.contains_key(a) || !self.nodes.contains_key(b) {
                log::warn!("one of link edges does not exist, UPLink [{a}] <=> [{b}] not established");
                continue;
            }
            let already = self.nodes[a].neighbors.iter().any(|n| n == b)
                || self.nodes[b].neighbors.iter().any(|n| n == a);
            if already {
                log::warn!("link edge already exists, UPLink [{a}] <=> [{b}] not established");
                continue;
            }
            if let Some(node) = self.nodes.get_mut(a) {
                node.neighbors.push(b.clone());
            }
            if let Some(node) = self.nodes.get_mut(b) {
                node.neighbors.push(a.clone());
            }
        }
    }

    fn invalidate_paths_containing(&mut self, name: &str) {
        self.default_path.retain(|key, path| {
            let keep = !path.iter().any(|n| n == name);
            if !keep {
                log::info!("invalidating cached default path for [{key}]");
            }
            keep
        });
        for (key, by_dest) in self.default_path_to_upf.iter_mut() {
            by_dest.retain(|dest, path| {
                let keep = !path.iter().any(|n| n == name);
                if !keep {
                    log::info!("invalidating cached path to UPF [{dest}] for [{key}]");
                }
                keep
            });
        }
        self.default_path_to_upf.retain(|_, by_dest| !by_dest.is_empty());
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    pub fn node(&self, name: &str) -> Option<&UpNode> {
        self.nodes.get(name)
    }

    pub fn node_mut(&mut self, name: &str) -> Option<&mut UpNode> {
        self.nodes.get_mut(name)
    }

    pub fn node_names(&self) -> impl Iterator<Item = &String> {
        self.nodes.keys()
    }

    pub fn upf_names(&self) -> impl Iterator<Item = &String> {
        self.upfs.iter()
    }

    pub fn an_names(&self) -> impl Iterator<Item = &String> {
        self.ans.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Name registered under a resolved node IP.
    pub fn name_by_ip(&self, ip: &str) -> Option<&String> {
        self.ip_to_name.get(ip)
    }

    pub fn uuid_by_name(&self, name: &str) -> Option<Uuid> {
        self.name_to_uuid.get(name).copied()
    }

    pub fn uuid_by_ip(&self, ip: &str) -> Option<Uuid> {
        self.ip_to_uuid.get(ip).copied()
    }

    /// Resolve an admin node reference, which may be a configured name or
    /// a resolved node IP.
    pub fn resolve_node_ref(&self, node_ref: &str) -> Option<String> {
        if self.nodes.contains_key(node_ref) {
            return Some(node_ref.to_string());
        }
        self.ip_to_name.get(node_ref).cloned()
    }

    /// Any AN node, the common source of user plane paths.
    pub fn path_source(&self) -> Option<&String> {
        self.ans.iter().next()
    }

    pub fn set_upf_status(&mut self, name: &str, status: UpfStatus) -> bool {
        match self.nodes.get_mut(name).and_then(|node| node.upf.as_mut()) {
            Some(upf) => {
                log::debug!("UPF [{name}] status {:?} -> {status:?}", upf.status);
                upf.status = status;
                true
            }
            None => false,
        }
    }

    /// UPFs currently in the given association status.
    pub fn upfs_with_status(&self, status: UpfStatus) -> Vec<PendingAssociation> {
        let mut pending: Vec<PendingAssociation> = self
            .upfs
            .iter()
            .filter_map(|name| {
                let upf = self.nodes.get(name)?.upf.as_ref()?;
                (upf.status == status).then(|| PendingAssociation {
                    name: name.clone(),
                    node_id: upf.node_id.clone(),
                })
            })
            .collect();
        pending.sort_by(|a, b| a.name.cmp(&b.name));
        pending
    }

    // ------------------------------------------------------------------
    // Serialization back to the declarative form
    // ------------------------------------------------------------------

    pub fn to_config(&self) -> UserPlaneConfig {
        UserPlaneConfig {
            up_nodes: self.nodes_to_config(),
            links: self.links_to_config(),
        }
    }

    /// Direct dump of every node.
    pub fn nodes_to_config(&self) -> HashMap<String, UpNodeConfig> {
        let mut out = HashMap::new();
        for (name, node) in &self.nodes {
            let config = match node.kind {
                UpNodeKind::An => UpNodeConfig {
                    node_type: "AN".to_string(),
                    an_ip: node.an_ip.map(|ip| ip.to_string()),
                    ..Default::default()
                },
                UpNodeKind::Upf => match &node.upf {
                    Some(upf) => upf_to_config(upf),
                    None => continue,
                },
            };
            out.insert(name.clone(), config);
        }
        out
    }

    /// Edge dump via BFS from an AN source so every edge appears exactly
    /// once, in discovery order. Edges with an endpoint that has no
    /// IP-indexed name (FQDN nodes) are skipped.
    pub fn links_to_config(&self) -> Vec<UpLinkConfig> {
        let mut links = Vec::new();
        let source = match self.path_source() {
            Some(source) => source.clone(),
            None => {
                log::error!("no AN node in the user plane topology");
                return links;
            }
        };

        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<String> = VecDeque::new();
        queue.push_back(source);
        while let Some(name) = queue.pop_front() {
            if !visited.insert(name.clone()) {
                continue;
            }
            let node = match self.nodes.get(&name) {
                Some(node) => node,
                None => continue,
            };
            for neighbor in &node.neighbors {
                if visited.contains(neighbor) {
                    continue;
                }
                queue.push_back(neighbor.clone());
                let named = node
                    .resolved_ip()
                    .and_then(|ip| self.ip_to_name.get(&ip))
                    .zip(
                        self.nodes
                            .get(neighbor)
                            .and_then(|n| n.resolved_ip())
                            .and_then(|ip| self.ip_to_name.get(&ip)),
                    );
                match named {
                    Some((a, b)) => links.push(UpLinkConfig { a: a.clone(), b: b.clone() }),
                    None => {
                        log::warn!("skipping link [{name}] <=> [{neighbor}]: endpoint has no IP-indexed name");
                    }
                }
            }
        }
        links
    }
}

impl Default for UserPlaneTopology {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Construction helpers
// ============================================================================

fn build_up_node(name: &str, config: &UpNodeConfig) -> Result<UpNode, UserPlaneError> {
    match config.node_type.as_str() {
        "AN" => {
            let an_ip = match config.an_ip.as_deref() {
                Some(text) => match text.parse::<IpAddr>() {
                    Ok(ip) => Some(ip),
                    Err(_) => {
                        log::warn!("AN node [{name}] has unparseable anIP {text:?}");
                        None
                    }
                },
                None => None,
            };
            Ok(UpNode::new_an(an_ip))
        }
        "UPF" => {
            let node_id_text = config.node_id.as_deref().unwrap_or("");
            let node_id = NodeId::parse(node_id_text);
            let interfaces = config
                .interfaces
                .iter()
                .map(|iface| build_interface(name, iface))
                .collect::<Result<Vec<_>, _>>()?;
            let mut upf = Upf::new(node_id, interfaces);
            for snssai_info in &config.snssai_upf_infos {
                upf.snssai_infos.push(build_snssai_info(snssai_info)?);
            }
            Ok(UpNode::new_upf(upf))
        }
        other => Err(UserPlaneError::ConfigInvalid(format!(
            "node [{name}] has invalid type {other:?}"
        ))),
    }
}

fn build_interface(
    name: &str,
    config: &InterfaceUpfInfoConfig,
) -> Result<InterfaceUpfInfo, UserPlaneError> {
    let kind = match config.interface_type.as_str() {
        "N3" => UpInterfaceKind::N3,
        "N9" => UpInterfaceKind::N9,
        other => {
            return Err(UserPlaneError::ConfigInvalid(format!(
                "node [{name}] has invalid interfaceType {other:?}"
            )));
        }
    };
    Ok(InterfaceUpfInfo::new(kind, &config.endpoints, &config.network_instance))
}

fn build_snssai_info(config: &SnssaiUpfInfoConfig) -> Result<SnssaiUpfInfo, UserPlaneError> {
    let mut dnn_list = Vec::new();
    for dnn_config in &config.dnn_upf_info_list {
        let mut pools = Vec::new();
        for pool in &dnn_config.pools {
            pools.push(UeIpPool::new(&pool.cidr)?);
        }
        dnn_list.push(DnnUpfInfo {
            dnn: dnn_config.dnn.clone(),
            dnai_list: dnn_config.dnai_list.clone(),
            pdu_session_types: dnn_config.pdu_session_types.clone(),
            ue_ip_pools: pools,
        });
    }
    Ok(SnssaiUpfInfo {
        snssai: Snssai {
            sst: config.snssai.sst as u8,
            sd: config.snssai.sd.clone(),
        },
        dnn_list,
    })
}

fn check_pool_overlap<'a, I>(pools: I) -> Result<(), UserPlaneError>
where
    I: Iterator<Item = &'a UeIpPool>,
{
    let pools: Vec<&UeIpPool> = pools.collect();
    for i in 0..pools.len() {
        for j in i + 1..pools.len() {
            if pools[i].is_joint(pools[j]) {
                return Err(UserPlaneError::PoolOverlap {
                    a: pools[i].cidr(),
                    b: pools[j].cidr(),
                });
            }
        }
    }
    Ok(())
}

fn upf_to_config(upf: &Upf) -> UpNodeConfig {
    UpNodeConfig {
        node_type: "UPF".to_string(),
        node_id: Some(upf.node_id.to_string()),
        an_ip: None,
        snssai_upf_infos: upf
            .snssai_infos
            .iter()
            .map(|info| SnssaiUpfInfoConfig {
                snssai: SnssaiConfig {
                    sst: info.snssai.sst as i64,
                    sd: info.snssai.sd.clone(),
                },
                dnn_upf_info_list: info
                    .dnn_list
                    .iter()
                    .map(|dnn| DnnUpfInfoConfig {
                        dnn: dnn.dnn.clone(),
                        dnai_list: dnn.dnai_list.clone(),
                        pdu_session_types: dnn.pdu_session_types.clone(),
                        pools: dnn
                            .ue_ip_pools
                            .iter()
                            .map(|pool| UeIpPoolConfig { cidr: pool.cidr() })
                            .collect(),
                    })
                    .collect(),
            })
            .collect(),
        interfaces: upf
            .interfaces
            .iter()
            .map(|iface| InterfaceUpfInfoConfig {
                interface_type: iface.kind.as_str().to_string(),
                endpoints: iface.endpoint_strings(),
                network_instance: iface.network_instance.clone(),
            })
            .collect(),
    }
}

// ============================================================================
// Shared context
// ============================================================================

/// The topology behind its single reader/writer lock. Cached path
/// lookups, serialization and anchor enumeration take the read side;
/// every mutation, cache population and UE IP allocation takes the write
/// side.
pub struct UserPlaneContext {
    topology: RwLock<UserPlaneTopology>,
}

impl UserPlaneContext {
    pub fn new(topology: UserPlaneTopology) -> Self {
        Self { topology: RwLock::new(topology) }
    }

    pub fn from_config(config: &UserPlaneConfig) -> Result<Self, UserPlaneError> {
        Ok(Self::new(UserPlaneTopology::from_config(config)?))
    }

    /// A poisoned lock means a panic happened mid-operation; the indices
    /// are rebuilt on the next mutation, so readers keep going.
    pub fn read(&self) -> RwLockReadGuard<'_, UserPlaneTopology> {
        self.topology.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, UserPlaneTopology> {
        self.topology.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn to_config(&self) -> UserPlaneConfig {
        self.read().to_config()
    }

    pub fn set_upf_status(&self, name: &str, status: UpfStatus) -> bool {
        self.write().set_upf_status(name, status)
    }
}
