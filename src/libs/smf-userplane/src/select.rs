//! Anchor UPF selection and UE IP allocation
//!
//! Selection enumerates anchor candidates under the read lock, then
//! upgrades to the write lock for pool allocation. Equivalent anchors are
//! sorted by name and rotated by a uniformly random offset so load
//! spreads across them; the same rotation is applied to a UPF's pools.
//! Only UPFs whose PFCP association has completed successfully are
//! eligible — the selector reads that status but never writes it.

use std::net::Ipv4Addr;

use rand::Rng;

use crate::node::{SelectionParams, UpfStatus};
use crate::topology::UserPlaneContext;

impl UserPlaneContext {
    /// Pick an anchor UPF serving `selection` and allocate a UE IP from
    /// one of its pools. `None` when no AN exists, no candidate serves
    /// the selection, or every eligible pool is dry — all normal
    /// outcomes for the session layer to handle.
    pub fn select_upf_and_alloc_ue_ip(
        &self,
        selection: &SelectionParams,
    ) -> Option<(String, Ipv4Addr)> {
        let mut candidates = {
            let topology = self.read();
            let source = match topology.path_source() {
                Some(source) => source.clone(),
                None => {
                    log::warn!("cannot select UPF: no AN node in the user plane topology");
                    return None;
                }
            };
            topology.anchor_upfs(&source, selection)
        };
        if candidates.is_empty() {
            log::warn!(
                "cannot find UPF serving DNN[{}] S-NSSAI[sst:{} sd:{}] DNAI[{}]",
                selection.dnn,
                selection.snssai.sst,
                selection.snssai.sd,
                selection.dnai
            );
            return None;
        }

        candidates.sort();
        let offset = rand::rng().random_range(0..candidates.len());
        candidates.rotate_left(offset);

        // write side: pool allocation mutates, and candidates may have
        // been deleted between the two locks
        let mut topology = self.write();
        for name in candidates {
            let upf = match topology.node_mut(&name).and_then(|node| node.upf.as_mut()) {
                Some(upf) => upf,
                None => continue,
            };
            if upf.status != UpfStatus::AssociatedSetUpSuccess {
                log::info!("PFCP association not yet established with [{name}], skipping");
                continue;
            }
            let dnn_info = match upf.dnn_info_mut(selection) {
                Some(dnn_info) => dnn_info,
                None => continue,
            };
            let pool_count = dnn_info.ue_ip_pools.len();
            if pool_count == 0 {
                continue;
            }
            let pool_offset = rand::rng().random_range(0..pool_count);
            for i in 0..pool_count {
                let pool = &mut dnn_info.ue_ip_pools[(pool_offset + i) % pool_count];
                if let Some(addr) = pool.allocate() {
                    log::info!("selected UPF [{name}] with UE IP {addr}");
                    return Some((name, addr));
                }
                log::debug!("pool {} is empty, trying next pool", pool.subnet());
            }
            log::debug!("all pools on [{name}] are empty, trying next UPF");
        }

        log::warn!(
            "UE IP pools exhausted for DNN[{}] S-NSSAI[sst:{} sd:{}] DNAI[{}]",
            selection.dnn,
            selection.snssai.sst,
            selection.snssai.sd,
            selection.dnai
        );
        None
    }

    /// Return a UE IP to the pool on `upf_name` whose subnet contains it.
    /// A missing UPF or pool is warned about and ignored.
    pub fn release_ue_ip(&self, upf_name: &str, addr: Ipv4Addr) {
        let mut topology = self.write();
        let pool = topology
            .node_mut(upf_name)
            .and_then(|node| node.upf.as_mut())
            .and_then(|upf| upf.pool_containing_mut(addr));
        match pool {
            Some(pool) => {
                pool.release(addr);
            }
            None => {
                log::warn!("failed to release UE IP {addr}: no pool on UPF [{upf_name}] contains it");
            }
        }
    }
}
