//! Property-based tests for the allocator and the shared topology
//!
//! The allocator properties mirror the invariants the rest of the core
//! leans on: no double allocation, capacity conservation, and dump runs
//! that exactly cover the free values. The thread test exercises the
//! single-lock discipline end to end.

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use proptest::prelude::*;

    use crate::ip_pool::UeIpPool;
    use crate::node::{SelectionParams, Snssai, UpfStatus};
    use crate::pool::LazyReusePool;
    use crate::topology::{UserPlaneContext, UserPlaneTopology};

    // ========================================================================
    // Strategies
    // ========================================================================

    #[derive(Debug, Clone)]
    enum PoolOp {
        Allocate,
        /// Index into the currently-held values
        Free(usize),
    }

    fn pool_op_strategy() -> impl Strategy<Value = PoolOp> {
        prop_oneof![
            3 => Just(PoolOp::Allocate),
            1 => (0..16usize).prop_map(PoolOp::Free),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Values handed out concurrently held are always distinct and
        /// in range.
        #[test]
        fn prop_no_double_allocation(
            first in 0..1000u32,
            span in 0..200u32,
            ops in prop::collection::vec(pool_op_strategy(), 0..200)
        ) {
            let last = first + span;
            let mut pool = LazyReusePool::new(first, last).unwrap();
            let mut held: Vec<u32> = Vec::new();

            for op in ops {
                match op {
                    PoolOp::Allocate => {
                        if let Some(v) = pool.allocate() {
                            prop_assert!(v >= first && v <= last);
                            prop_assert!(!held.contains(&v), "value {v} handed out twice");
                            held.push(v);
                        } else {
                            prop_assert_eq!(held.len() as u64, pool.total());
                        }
                    }
                    PoolOp::Free(i) => {
                        if !held.is_empty() {
                            let v = held.remove(i % held.len());
                            prop_assert!(pool.free(v));
                            prop_assert!(!pool.free(v), "double free of {v} accepted");
                        }
                    }
                }
                prop_assert_eq!(pool.used(), held.len() as u64);
                prop_assert_eq!(pool.used() + pool.available(), pool.total());
            }
        }

        /// The dump runs are sorted, disjoint, within range, and cover
        /// exactly the free values.
        #[test]
        fn prop_dump_covers_free_values(
            first in 0..1000u32,
            span in 0..100u32,
            ops in prop::collection::vec(pool_op_strategy(), 0..150)
        ) {
            let last = first + span;
            let mut pool = LazyReusePool::new(first, last).unwrap();
            let mut held: Vec<u32> = Vec::new();
            for op in ops {
                match op {
                    PoolOp::Allocate => {
                        if let Some(v) = pool.allocate() {
                            held.push(v);
                        }
                    }
                    PoolOp::Free(i) => {
                        if !held.is_empty() {
                            let v = held.remove(i % held.len());
                            pool.free(v);
                        }
                    }
                }
            }

            let runs = pool.dump();
            let mut covered = 0u64;
            let mut prev_end: Option<u32> = None;
            for (a, b) in &runs {
                prop_assert!(a <= b);
                prop_assert!(*a >= first && *b <= last);
                if let Some(end) = prev_end {
                    prop_assert!(*a > end + 1, "adjacent runs should be merged");
                }
                prev_end = Some(*b);
                covered += (*b - *a) as u64 + 1;
            }
            prop_assert_eq!(covered, pool.available());
            for v in &held {
                prop_assert!(
                    !runs.iter().any(|(a, b)| v >= a && v <= b),
                    "held value {} dumped as free", v
                );
            }
        }

        /// Draining a pool and releasing everything restores full
        /// capacity, and the next drain hands out the same value set.
        #[test]
        fn prop_full_release_restores_capacity(first in 0..500u32, span in 0..64u32) {
            let mut pool = LazyReusePool::new(first, first + span).unwrap();
            let drained: HashSet<u32> = std::iter::from_fn(|| pool.allocate()).collect();
            prop_assert_eq!(drained.len() as u64, pool.total());
            for v in &drained {
                prop_assert!(pool.free(*v));
            }
            prop_assert_eq!(pool.available(), pool.total());
            let again: HashSet<u32> = std::iter::from_fn(|| pool.allocate()).collect();
            prop_assert_eq!(again, drained);
        }

        /// Interval overlap is symmetric and matches the closed-interval
        /// definition.
        #[test]
        fn prop_is_joint_symmetric(
            a_first in 0..2000u32, a_span in 0..200u32,
            b_first in 0..2000u32, b_span in 0..200u32
        ) {
            let a = LazyReusePool::new(a_first, a_first + a_span).unwrap();
            let b = LazyReusePool::new(b_first, b_first + b_span).unwrap();
            let expected =
                a_first.max(b_first) <= (a_first + a_span).min(b_first + b_span);
            prop_assert_eq!(a.is_joint(&b), expected);
            prop_assert_eq!(b.is_joint(&a), expected);
        }

        /// Every address a UE IP pool hands out lies in its subnet and is
        /// unique until released.
        #[test]
        fn prop_ue_ip_pool_addresses_in_subnet(host in 0..24u8, prefix in 24..31u8) {
            let cidr = format!("10.{host}.0.0/{prefix}");
            let mut pool = UeIpPool::new(&cidr).unwrap();
            let mut seen = HashSet::new();
            while let Some(addr) = pool.allocate() {
                prop_assert!(pool.contains(addr));
                prop_assert!(seen.insert(addr), "duplicate address {}", addr);
            }
            prop_assert_eq!(seen.len() as u64, 2u64.pow(32 - prefix as u32) - 2);
        }
    }

    // ========================================================================
    // Concurrency smoke test
    // ========================================================================

    /// Parallel selections on one shared context never hand out the same
    /// address twice.
    #[test]
    fn test_concurrent_allocations_are_distinct() {
        let yaml = r#"
upNodes:
  gNB1:
    type: "AN"
    anIP: "192.168.179.1"
  UPF1:
    type: "UPF"
    nodeID: "10.8.0.7"
    sNssaiUpfInfos:
      - sNssai: { sst: 1, sd: "010203" }
        dnnUpfInfoList:
          - dnn: "internet"
            pools: [ { cidr: "10.60.0.0/24" } ]
  UPF2:
    type: "UPF"
    nodeID: "10.8.0.8"
    sNssaiUpfInfos:
      - sNssai: { sst: 1, sd: "010203" }
        dnnUpfInfoList:
          - dnn: "internet"
            pools: [ { cidr: "10.61.0.0/24" } ]
links:
  - { A: gNB1, B: UPF1 }
  - { A: gNB1, B: UPF2 }
"#;
        let config = serde_yaml::from_str(yaml).unwrap();
        let ctx = Arc::new(UserPlaneContext::new(
            UserPlaneTopology::from_config(&config).unwrap(),
        ));
        ctx.set_upf_status("UPF1", UpfStatus::AssociatedSetUpSuccess);
        ctx.set_upf_status("UPF2", UpfStatus::AssociatedSetUpSuccess);

        let selection = SelectionParams {
            dnn: "internet".to_string(),
            snssai: Snssai { sst: 1, sd: "010203".to_string() },
            dnai: String::new(),
        };

        let mut handles = Vec::new();
        for _ in 0..8 {
            let ctx = Arc::clone(&ctx);
            let selection = selection.clone();
            handles.push(std::thread::spawn(move || {
                let mut leased = Vec::new();
                for _ in 0..30 {
                    if let Some(lease) = ctx.select_upf_and_alloc_ue_ip(&selection) {
                        leased.push(lease);
                    }
                }
                leased
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.join().unwrap());
        }
        assert_eq!(all.len(), 8 * 30);
        let distinct: HashSet<_> = all.iter().map(|(_, addr)| *addr).collect();
        assert_eq!(distinct.len(), all.len(), "duplicate UE IP handed out");
    }
}
