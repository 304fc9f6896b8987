//! External admin surface
//!
//! The operations behind `/upi/v1/upNodesLinks`, kept free of any HTTP
//! machinery: an external HTTP collaborator deserializes request bodies
//! into [`UserPlaneConfig`] and maps [`UserPlaneError`] onto status
//! codes via [`http_status`]. PFCP association and session release are
//! collaborator traits and are always invoked after the topology lock
//! has been dropped.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::config::UserPlaneConfig;
use crate::error::UserPlaneError;
use crate::node::UpfStatus;
use crate::topology::{PendingAssociation, RemovedUpf, UserPlaneContext};

/// PFCP association collaborator. Called once for every UPF that is
/// still `NotAssociated` after a merge; implementations typically spawn
/// a retry task and stop retrying when `cancel` flips.
pub trait UpfAssociator: Send + Sync {
    fn associate(&self, upf: PendingAssociation, cancel: Arc<AtomicBool>);
}

/// Session collaborator notified when a UPF leaves the topology so its
/// PDU sessions and leases can be torn down.
pub trait SessionReleaser: Send + Sync {
    fn release_all(&self, upf: &RemovedUpf);
}

/// GET `/upi/v1/upNodesLinks`: snapshot of the topology in declarative
/// form.
pub fn get_up_nodes_links(ctx: &UserPlaneContext) -> UserPlaneConfig {
    ctx.to_config()
}

/// POST `/upi/v1/upNodesLinks`: merge nodes and links, then kick off
/// PFCP association for every UPF that still needs one.
pub fn post_up_nodes_links(
    ctx: &UserPlaneContext,
    config: &UserPlaneConfig,
    associator: &dyn UpfAssociator,
    cancel: Arc<AtomicBool>,
) -> Result<(), UserPlaneError> {
    {
        let mut topology = ctx.write();
        topology.add_nodes_from_config(config)?;
        topology.add_links_from_config(config);
    }

    let pending = ctx.read().upfs_with_status(UpfStatus::NotAssociated);
    for upf in pending {
        associator.associate(upf, cancel.clone());
    }
    Ok(())
}

/// DELETE `/upi/v1/upNodesLinks/{nodeRef}`: remove a node addressed by
/// name or resolved IP, then hand the removed UPF to the session
/// collaborator.
pub fn delete_up_node(
    ctx: &UserPlaneContext,
    node_ref: &str,
    releaser: &dyn SessionReleaser,
) -> Result<(), UserPlaneError> {
    let removed = {
        let mut topology = ctx.write();
        let name = topology
            .resolve_node_ref(node_ref)
            .ok_or_else(|| UserPlaneError::UnknownNode(node_ref.to_string()))?;
        topology.delete_node(&name)?
    };

    if let Some(upf) = removed {
        releaser.release_all(&upf);
    }
    Ok(())
}

/// Status code the HTTP collaborator should answer with.
pub fn http_status(err: &UserPlaneError) -> u16 {
    match err {
        UserPlaneError::ConfigInvalid(_) | UserPlaneError::PoolOverlap { .. } => 400,
        UserPlaneError::UnknownNode(_) => 404,
        UserPlaneError::PathTooShort(_) => 500,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;

    use crate::topology::tests::{config_from_yaml, linear_topology};

    #[derive(Default)]
    struct RecordingAssociator {
        calls: Mutex<Vec<String>>,
    }

    impl UpfAssociator for RecordingAssociator {
        fn associate(&self, upf: PendingAssociation, cancel: Arc<AtomicBool>) {
            assert!(!cancel.load(Ordering::Relaxed));
            self.calls.lock().unwrap().push(upf.name);
        }
    }

    #[derive(Default)]
    struct RecordingReleaser {
        released: Mutex<Vec<String>>,
    }

    impl SessionReleaser for RecordingReleaser {
        fn release_all(&self, upf: &RemovedUpf) {
            self.released.lock().unwrap().push(upf.name.clone());
        }
    }

    #[test]
    fn test_get_returns_declarative_snapshot() {
        let ctx = UserPlaneContext::new(linear_topology());
        let config = get_up_nodes_links(&ctx);
        assert_eq!(config.up_nodes.len(), 3);
        assert_eq!(config.links.len(), 2);
    }

    #[test]
    fn test_post_merges_and_associates_new_upfs() {
        let ctx = UserPlaneContext::new(linear_topology());
        // UPF1 is already associated, UPF2 still is not
        ctx.set_upf_status("UPF1", UpfStatus::AssociatedSetUpSuccess);

        let addition = config_from_yaml(
            r#"
upNodes:
  UPF3:
    type: "UPF"
    nodeID: "10.8.0.9"
links:
  - { A: UPF2, B: UPF3 }
"#,
        );
        let associator = RecordingAssociator::default();
        post_up_nodes_links(&ctx, &addition, &associator, Arc::new(AtomicBool::new(false)))
            .unwrap();

        let calls = associator.calls.lock().unwrap();
        assert_eq!(*calls, vec!["UPF2".to_string(), "UPF3".to_string()]);

        let topology = ctx.read();
        assert!(topology.node("UPF3").is_some());
        assert_eq!(topology.node("UPF2").unwrap().neighbors, vec!["UPF1", "UPF3"]);
    }

    #[test]
    fn test_post_rejects_overlapping_pools() {
        let ctx = UserPlaneContext::new(linear_topology());
        let addition = config_from_yaml(
            r#"
upNodes:
  UPF3:
    type: "UPF"
    nodeID: "10.8.0.9"
    sNssaiUpfInfos:
      - sNssai: { sst: 1, sd: "010203" }
        dnnUpfInfoList:
          - dnn: "internet"
            pools: [ { cidr: "10.60.0.0/25" } ]
"#,
        );
        let associator = RecordingAssociator::default();
        let err = post_up_nodes_links(&ctx, &addition, &associator, Arc::new(AtomicBool::new(false)))
            .unwrap_err();
        assert_eq!(http_status(&err), 400);
        assert!(ctx.read().node("UPF3").is_none());
        assert!(associator.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_delete_by_name_releases_sessions() {
        let ctx = UserPlaneContext::new(linear_topology());
        let releaser = RecordingReleaser::default();

        delete_up_node(&ctx, "UPF1", &releaser).unwrap();
        assert_eq!(*releaser.released.lock().unwrap(), vec!["UPF1".to_string()]);
        assert!(ctx.read().node("UPF1").is_none());
    }

    #[test]
    fn test_delete_by_ip_and_an_delete() {
        let ctx = UserPlaneContext::new(linear_topology());
        let releaser = RecordingReleaser::default();

        delete_up_node(&ctx, "10.8.0.8", &releaser).unwrap();
        assert!(ctx.read().node("UPF2").is_none());

        // deleting an AN releases no UPF sessions
        delete_up_node(&ctx, "gNB1", &releaser).unwrap();
        assert_eq!(*releaser.released.lock().unwrap(), vec!["UPF2".to_string()]);
    }

    #[test]
    fn test_delete_unknown_ref_is_not_found() {
        let ctx = UserPlaneContext::new(linear_topology());
        let releaser = RecordingReleaser::default();

        let err = delete_up_node(&ctx, "UPF9", &releaser).unwrap_err();
        assert_eq!(http_status(&err), 404);
        assert!(releaser.released.lock().unwrap().is_empty());
    }
}
