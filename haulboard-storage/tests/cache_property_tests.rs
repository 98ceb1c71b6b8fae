use std::collections::HashMap;
use std::time::Duration;

use haulboard_core::{BackendError, HaulError};
use haulboard_storage::ReadThroughCache;
use proptest::prelude::*;
use tokio::runtime::Runtime;

const TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
enum Op {
    Set(u8, u32),
    Invalidate(u8),
    Clear,
    Fetch(u8, u32),
    FailedFetch(u8),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..4, any::<u32>()).prop_map(|(k, v)| Op::Set(k, v)),
        (0u8..4).prop_map(Op::Invalidate),
        Just(Op::Clear),
        (0u8..4, any::<u32>()).prop_map(|(k, v)| Op::Fetch(k, v)),
        (0u8..4).prop_map(Op::FailedFetch),
    ]
}

fn test_runtime() -> Result<Runtime, TestCaseError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

fn key(k: u8) -> String {
    format!("k{}", k)
}

proptest! {
    /// Within the TTL the cache behaves like a map, and a fetch runs only
    /// when the key is absent.
    #[test]
    fn cache_matches_map_model(ops in prop::collection::vec(arb_op(), 1..40)) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let cache: ReadThroughCache<u32> = ReadThroughCache::new();
            let mut model: HashMap<String, u32> = HashMap::new();

            for op in ops {
                match op {
                    Op::Set(k, v) => {
                        cache.set(&key(k), v).await;
                        model.insert(key(k), v);
                    }
                    Op::Invalidate(k) => {
                        cache.invalidate(&key(k)).await;
                        model.remove(&key(k));
                    }
                    Op::Clear => {
                        cache.clear().await;
                        model.clear();
                    }
                    Op::Fetch(k, v) => {
                        let read = cache
                            .get_or_fetch(&key(k), TTL, || async move { Ok(v) })
                            .await
                            .map_err(|e| TestCaseError::fail(e.to_string()))?;
                        let expected = *model.entry(key(k)).or_insert(v);
                        prop_assert_eq!(read.into_value(), expected);
                    }
                    Op::FailedFetch(k) => {
                        let result = cache
                            .get_or_fetch(&key(k), TTL, || async {
                                Err(HaulError::Backend(BackendError::Unavailable {
                                    capability: "rpc".to_string(),
                                }))
                            })
                            .await;
                        prop_assert_eq!(result.is_ok(), model.contains_key(&key(k)));
                    }
                }
            }

            for k in 0u8..4 {
                prop_assert_eq!(cache.get(&key(k), TTL).await, model.get(&key(k)).copied());
            }
            prop_assert_eq!(cache.stats().await.entry_count, model.len() as u64);
            Ok(())
        })?;
    }

    /// A fill ticket taken before a write never overwrites that write.
    #[test]
    fn stale_ticket_never_overwrites(first in any::<u32>(), second in any::<u32>(), invalidate in any::<bool>()) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let cache: ReadThroughCache<u32> = ReadThroughCache::new();
            let ticket = cache.ticket("operators:list").await;
            if invalidate {
                cache.invalidate("operators:list").await;
            } else {
                cache.set("operators:list", first).await;
            }
            prop_assert!(!cache.set_if_current(&ticket, second).await);

            let expected = if invalidate { None } else { Some(first) };
            prop_assert_eq!(cache.get("operators:list", TTL).await, expected);
            prop_assert_eq!(cache.stats().await.rejected_fills, 1);
            Ok(())
        })?;
    }
}
