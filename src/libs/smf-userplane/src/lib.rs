//! SMF user plane core
//!
//! The user plane topology and UE IP allocation core of a 5G Session
//! Management Function. It keeps an undirected graph of access network
//! nodes and UPFs, computes and caches forwarding paths for a requested
//! (S-NSSAI, DNN, DNAI) triplet, and leases UE IPv4 addresses out of
//! per-(UPF, DNN) CIDR pools with lazy reuse.
//!
//! # Architecture
//!
//! - `pool` / `ip_pool`: lazy-reuse range allocator and its CIDR wrapper
//! - `node` / `node_id`: graph vertices and PFCP node identities
//! - `topology`: the indexed graph store behind one reader/writer lock
//! - `path`: DFS path finder, BFS anchor enumeration, path caches
//! - `select`: rotational anchor selection and UE IP lease/release
//! - `config` / `upi`: declarative form and the admin surface consumed
//!   by an external HTTP collaborator
//!
//! PFCP signaling, HTTP routing and session state live in collaborators;
//! this crate only exposes the traits they implement and the status
//! fields they maintain.

pub mod config;
pub mod error;
pub mod ip_pool;
pub mod node;
pub mod node_id;
pub mod path;
pub mod pool;
pub mod select;
pub mod topology;
pub mod upi;

#[cfg(test)]
mod property_tests;

pub use config::{Config, UserPlaneConfig};
pub use error::UserPlaneError;
pub use node::{SelectionParams, Snssai, UpfStatus};
pub use node_id::NodeId;
pub use path::{DataPath, DataPathNode};
pub use topology::{PendingAssociation, RemovedUpf, UserPlaneContext, UserPlaneTopology};
pub use upi::{SessionReleaser, UpfAssociator};
