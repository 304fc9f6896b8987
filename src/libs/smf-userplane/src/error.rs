//! Error taxonomy for the user plane core
//!
//! Only conditions that must stop a build or be reported across the admin
//! boundary are errors. Exhausted pools, missing ANs and unreachable UPFs
//! are normal selection outcomes and surface as `None`; skipped links and
//! duplicate declarations are warnings logged at the point of rejection.

use thiserror::Error;

/// Fatal / boundary-visible errors of the user plane core.
#[derive(Error, Debug)]
pub enum UserPlaneError {
    /// Malformed declarative configuration: bad CIDR, S-NSSAI out of
    /// range, unknown node or interface type. Fatal at build, 400 at POST.
    #[error("invalid user plane configuration: {0}")]
    ConfigInvalid(String),

    /// Two UE IP pools cover overlapping address ranges. Fatal at build,
    /// 400 at POST.
    #[error("overlapping UE IP pools: {a} and {b}")]
    PoolOverlap { a: String, b: String },

    /// A node reference (name or resolved IP) matched nothing. 404 at the
    /// admin boundary.
    #[error("unknown user plane node: {0}")]
    UnknownNode(String),

    /// A data path needs at least an anchor and one more hop.
    #[error("data path needs at least two nodes, got {0}")]
    PathTooShort(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = UserPlaneError::PoolOverlap {
            a: "10.60.0.0/24".to_string(),
            b: "10.60.0.128/25".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "overlapping UE IP pools: 10.60.0.0/24 and 10.60.0.128/25"
        );
    }
}
