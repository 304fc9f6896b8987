//! Declarative user plane configuration
//!
//! One schema serves both the YAML configuration file and the JSON bodies
//! of the admin API: a map of named nodes plus an undirected link list.
//! `validate` covers the fatal class of configuration errors; pool
//! disjointness is checked later at build time where all pools of all
//! UPFs are in hand.

use std::collections::HashMap;

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

use crate::error::UserPlaneError;

/// Top-level configuration file wrapper.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "userPlaneInformation")]
    pub user_plane_information: UserPlaneConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), UserPlaneError> {
        self.user_plane_information.validate()
    }
}

/// The user plane topology in declarative form. Identical whether it is
/// loaded from file or posted at runtime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPlaneConfig {
    #[serde(rename = "upNodes")]
    pub up_nodes: HashMap<String, UpNodeConfig>,
    #[serde(default)]
    pub links: Vec<UpLinkConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpNodeConfig {
    #[serde(rename = "type")]
    pub node_type: String,
    /// UPF only: IPv4, IPv6 or FQDN
    #[serde(rename = "nodeID", default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    /// AN only
    #[serde(rename = "anIP", default, skip_serializing_if = "Option::is_none")]
    pub an_ip: Option<String>,
    #[serde(rename = "sNssaiUpfInfos", default, skip_serializing_if = "Vec::is_empty")]
    pub snssai_upf_infos: Vec<SnssaiUpfInfoConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<InterfaceUpfInfoConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnssaiConfig {
    /// Slice/service type; the wire form is wider than u8 so the range
    /// check can reject out-of-range values instead of failing to parse
    pub sst: i64,
    #[serde(default)]
    pub sd: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnssaiUpfInfoConfig {
    #[serde(rename = "sNssai")]
    pub snssai: SnssaiConfig,
    #[serde(rename = "dnnUpfInfoList", default)]
    pub dnn_upf_info_list: Vec<DnnUpfInfoConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DnnUpfInfoConfig {
    pub dnn: String,
    #[serde(rename = "dnaiList", default, skip_serializing_if = "Vec::is_empty")]
    pub dnai_list: Vec<String>,
    #[serde(rename = "pduSessionTypes", default, skip_serializing_if = "Vec::is_empty")]
    pub pdu_session_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pools: Vec<UeIpPoolConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UeIpPoolConfig {
    pub cidr: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterfaceUpfInfoConfig {
    #[serde(rename = "interfaceType")]
    pub interface_type: String,
    #[serde(default)]
    pub endpoints: Vec<String>,
    #[serde(rename = "networkInstance", default)]
    pub network_instance: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpLinkConfig {
    #[serde(rename = "A")]
    pub a: String,
    #[serde(rename = "B")]
    pub b: String,
}

impl UserPlaneConfig {
    /// Reject every fatal-class configuration error: unknown node or
    /// interface types, a UPF without a node ID, S-NSSAI fields out of
    /// shape, unparseable or non-IPv4 pool CIDRs.
    pub fn validate(&self) -> Result<(), UserPlaneError> {
        for (name, node) in &self.up_nodes {
            match node.node_type.as_str() {
                "AN" => {}
                "UPF" => {
                    if node.node_id.as_deref().unwrap_or("").is_empty() {
                        return Err(UserPlaneError::ConfigInvalid(format!(
                            "UPF node [{name}] has no nodeID"
                        )));
                    }
                }
                other => {
                    return Err(UserPlaneError::ConfigInvalid(format!(
                        "node [{name}] has invalid type {other:?}, should be AN or UPF"
                    )));
                }
            }

            for snssai_info in &node.snssai_upf_infos {
                validate_snssai(name, &snssai_info.snssai)?;
                for dnn_info in &snssai_info.dnn_upf_info_list {
                    if dnn_info.dnn.is_empty() {
                        return Err(UserPlaneError::ConfigInvalid(format!(
                            "node [{name}] has a DNN entry with an empty dnn"
                        )));
                    }
                    for pool in &dnn_info.pools {
                        validate_pool_cidr(name, &pool.cidr)?;
                    }
                }
            }

            for iface in &node.interfaces {
                if iface.interface_type != "N3" && iface.interface_type != "N9" {
                    return Err(UserPlaneError::ConfigInvalid(format!(
                        "node [{name}] has invalid interfaceType {:?}, should be N3 or N9",
                        iface.interface_type
                    )));
                }
            }
        }
        Ok(())
    }
}

fn validate_snssai(name: &str, snssai: &SnssaiConfig) -> Result<(), UserPlaneError> {
    if !(0..=255).contains(&snssai.sst) {
        return Err(UserPlaneError::ConfigInvalid(format!(
            "node [{name}] has invalid sNssai.sst {}, should be in range 0~255",
            snssai.sst
        )));
    }
    if snssai.sd.len() != 6 || !snssai.sd.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(UserPlaneError::ConfigInvalid(format!(
            "node [{name}] has invalid sNssai.sd {:?}, should be 6 hex digits",
            snssai.sd
        )));
    }
    Ok(())
}

fn validate_pool_cidr(name: &str, cidr: &str) -> Result<(), UserPlaneError> {
    match cidr.parse::<IpNetwork>() {
        Ok(IpNetwork::V4(_)) => Ok(()),
        Ok(IpNetwork::V6(_)) => Err(UserPlaneError::ConfigInvalid(format!(
            "node [{name}] declares IPv6 UE IP pool {cidr}, only IPv4 pools are supported"
        ))),
        Err(e) => Err(UserPlaneError::ConfigInvalid(format!(
            "node [{name}] has invalid pool CIDR {cidr}: {e}"
        ))),
    }
}
