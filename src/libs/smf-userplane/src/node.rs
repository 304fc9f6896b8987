//! User plane graph vertices
//!
//! An [`UpNode`] is either an access network entry point (AN) or a user
//! plane function (UPF). UPF nodes carry the service descriptor used by
//! path selection: which (S-NSSAI, DNN, DNAI) combinations they serve,
//! their UE IP pools, their N3/N9 interfaces and the PFCP association
//! status maintained by the association collaborator.

use std::net::{IpAddr, Ipv4Addr};

use uuid::Uuid;

use crate::ip_pool::UeIpPool;
use crate::node_id::NodeId;

// ============================================================================
// S-NSSAI / selection parameters
// ============================================================================

/// Single Network Slice Selection Assistance Information.
///
/// `sd` is kept in its 6-hex-digit configuration form; two slices are the
/// same slice iff both fields match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Snssai {
    pub sst: u8,
    pub sd: String,
}

/// The (DNN, S-NSSAI, DNAI) triplet a PDU session establishment asks the
/// user plane to serve. Its canonical string form keys the path caches.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectionParams {
    pub dnn: String,
    pub snssai: Snssai,
    pub dnai: String,
}

impl SelectionParams {
    /// Canonical cache key.
    pub fn selection_key(&self) -> String {
        format!(
            "dnn:{} sst:{} sd:{} dnai:{}",
            self.dnn, self.snssai.sst, self.snssai.sd, self.dnai
        )
    }
}

// ============================================================================
// UPF service descriptor
// ============================================================================

/// PFCP association status of a UPF, written by the association
/// collaborator and only ever read by selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpfStatus {
    #[default]
    NotAssociated,
    Associating,
    AssociatedSetUpSuccess,
    AssociatedSetUpFailed,
}

/// Per-DNN service information within one slice.
#[derive(Debug)]
pub struct DnnUpfInfo {
    pub dnn: String,
    pub dnai_list: Vec<String>,
    pub pdu_session_types: Vec<String>,
    pub ue_ip_pools: Vec<UeIpPool>,
}

impl DnnUpfInfo {
    /// An empty requested DNAI matches only DNN entries that declare no
    /// DNAI localization of their own.
    pub fn contains_dnai(&self, dnai: &str) -> bool {
        if dnai.is_empty() {
            return self.dnai_list.is_empty();
        }
        self.dnai_list.iter().any(|d| d == dnai)
    }
}

/// Service information for one S-NSSAI on one UPF.
#[derive(Debug)]
pub struct SnssaiUpfInfo {
    pub snssai: Snssai,
    pub dnn_list: Vec<DnnUpfInfo>,
}

/// N3 terminates the access side, N9 interconnects UPFs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpInterfaceKind {
    N3,
    N9,
}

impl UpInterfaceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpInterfaceKind::N3 => "N3",
            UpInterfaceKind::N9 => "N9",
        }
    }
}

/// One user plane interface of a UPF. Endpoints come from configuration
/// as a mixed list of IPv4 literals and at most one FQDN.
#[derive(Debug)]
pub struct InterfaceUpfInfo {
    pub kind: UpInterfaceKind,
    pub ipv4_endpoints: Vec<Ipv4Addr>,
    pub endpoint_fqdn: Option<String>,
    pub network_instance: String,
}

impl InterfaceUpfInfo {
    pub fn new(kind: UpInterfaceKind, endpoints: &[String], network_instance: &str) -> Self {
        let mut ipv4_endpoints = Vec::new();
        let mut endpoint_fqdn = None;
        for endpoint in endpoints {
            match endpoint.parse::<Ipv4Addr>() {
                Ok(addr) => ipv4_endpoints.push(addr),
                Err(_) => endpoint_fqdn = Some(endpoint.clone()),
            }
        }
        Self {
            kind,
            ipv4_endpoints,
            endpoint_fqdn,
            network_instance: network_instance.to_string(),
        }
    }

    /// Endpoints back in configuration order: FQDN first, then addresses.
    pub fn endpoint_strings(&self) -> Vec<String> {
        let mut endpoints = Vec::new();
        if let Some(fqdn) = &self.endpoint_fqdn {
            endpoints.push(fqdn.clone());
        }
        endpoints.extend(self.ipv4_endpoints.iter().map(|a| a.to_string()));
        endpoints
    }
}

/// UPF service descriptor attached to a UPF vertex.
#[derive(Debug)]
pub struct Upf {
    pub node_id: NodeId,
    /// Stable identifier assigned at construction
    pub uuid: Uuid,
    pub status: UpfStatus,
    pub snssai_infos: Vec<SnssaiUpfInfo>,
    pub interfaces: Vec<InterfaceUpfInfo>,
}

impl Upf {
    pub fn new(node_id: NodeId, interfaces: Vec<InterfaceUpfInfo>) -> Self {
        Self {
            node_id,
            uuid: Uuid::new_v4(),
            status: UpfStatus::NotAssociated,
            snssai_infos: Vec::new(),
            interfaces,
        }
    }

    /// True when any slice entry matches; used as the DFS traversal gate.
    pub fn supports_snssai(&self, snssai: &Snssai) -> bool {
        self.snssai_infos.iter().any(|info| &info.snssai == snssai)
    }

    /// Full (S-NSSAI, DNN, DNAI) service match.
    pub fn serves(&self, selection: &SelectionParams) -> bool {
        self.dnn_info(selection).is_some()
    }

    pub fn dnn_info(&self, selection: &SelectionParams) -> Option<&DnnUpfInfo> {
        self.snssai_infos
            .iter()
            .filter(|info| info.snssai == selection.snssai)
            .flat_map(|info| info.dnn_list.iter())
            .find(|dnn| dnn.dnn == selection.dnn && dnn.contains_dnai(&selection.dnai))
    }

    pub fn dnn_info_mut(&mut self, selection: &SelectionParams) -> Option<&mut DnnUpfInfo> {
        self.snssai_infos
            .iter_mut()
            .filter(|info| info.snssai == selection.snssai)
            .flat_map(|info| info.dnn_list.iter_mut())
            .find(|dnn| dnn.dnn == selection.dnn && dnn.contains_dnai(&selection.dnai))
    }

    /// Pool on this UPF whose subnet contains `addr`, for release.
    pub fn pool_containing_mut(&mut self, addr: Ipv4Addr) -> Option<&mut UeIpPool> {
        self.snssai_infos
            .iter_mut()
            .flat_map(|info| info.dnn_list.iter_mut())
            .flat_map(|dnn| dnn.ue_ip_pools.iter_mut())
            .find(|pool| pool.contains(addr))
    }

    pub fn pools(&self) -> impl Iterator<Item = &UeIpPool> {
        self.snssai_infos
            .iter()
            .flat_map(|info| info.dnn_list.iter())
            .flat_map(|dnn| dnn.ue_ip_pools.iter())
    }

    pub fn interfaces_by_kind(&self, kind: UpInterfaceKind) -> impl Iterator<Item = &InterfaceUpfInfo> {
        self.interfaces.iter().filter(move |i| i.kind == kind)
    }
}

// ============================================================================
// Graph vertex
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpNodeKind {
    An,
    Upf,
}

/// Vertex of the undirected user plane graph. Adjacency is a list of
/// neighbor node names: names are the stable handles of this graph, so
/// path equality and cache invalidation compare names, never node
/// contents.
#[derive(Debug)]
pub struct UpNode {
    pub kind: UpNodeKind,
    /// AN only
    pub an_ip: Option<IpAddr>,
    /// UPF only
    pub upf: Option<Upf>,
    /// Insertion-ordered adjacency, no self-loops, no duplicates
    pub neighbors: Vec<String>,
}

impl UpNode {
    pub fn new_an(an_ip: Option<IpAddr>) -> Self {
        Self {
            kind: UpNodeKind::An,
            an_ip,
            upf: None,
            neighbors: Vec::new(),
        }
    }

    pub fn new_upf(upf: Upf) -> Self {
        Self {
            kind: UpNodeKind::Upf,
            an_ip: None,
            upf: Some(upf),
            neighbors: Vec::new(),
        }
    }

    pub fn is_an(&self) -> bool {
        self.kind == UpNodeKind::An
    }

    pub fn is_upf(&self) -> bool {
        self.kind == UpNodeKind::Upf
    }

    /// Canonical textual IP of this node, the key of the IP-indexed
    /// lookups. `None` for FQDN UPFs and ANs without an address.
    pub fn resolved_ip(&self) -> Option<String> {
        match self.kind {
            UpNodeKind::An => self.an_ip.map(|ip| ip.to_string()),
            UpNodeKind::Upf => self.upf.as_ref().and_then(|upf| upf.node_id.resolved_ip()),
        }
    }

    /// Traversal gate of the path finder. Only UPF neighbors that support
    /// the requested slice are traversable; the AN source enters a path
    /// as the starting point, never as a gated neighbor.
    pub fn supports_snssai(&self, snssai: &Snssai) -> bool {
        self.upf
            .as_ref()
            .map(|upf| upf.supports_snssai(snssai))
            .unwrap_or(false)
    }
}
