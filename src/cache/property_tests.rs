//! Property-Based Tests for Cache Module
//!
//! Uses proptest to verify store invariants across arbitrary operation
//! sequences.

use proptest::prelude::*;
use std::collections::HashSet;
use std::time::Duration;

use crate::cache::TtlStore;

// == Test Configuration ==
const TEST_MAX_ENTRIES: usize = 100;
const TEST_MAX_COST: usize = 1024 * 1024;
const HOUR: Duration = Duration::from_secs(3600);

// == Strategies ==
/// Generates valid cache keys (non-empty, within length limit)
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9_:]{1,64}".prop_map(|s| s)
}

/// Generates cache values of modest size
fn valid_value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{1,256}".prop_map(|s| s)
}

#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: String },
    Get { key: String },
    Remove { key: String },
    Invalidate { pattern: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (valid_key_strategy(), valid_value_strategy())
            .prop_map(|(key, value)| CacheOp::Set { key, value }),
        valid_key_strategy().prop_map(|key| CacheOp::Get { key }),
        valid_key_strategy().prop_map(|key| CacheOp::Remove { key }),
        "[a-z]{1,3}".prop_map(|pattern| CacheOp::Invalidate { pattern }),
    ]
}

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Hit and miss counters match what callers observed.
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..50)) {
        let store: TtlStore<String> = TtlStore::new(TEST_MAX_ENTRIES, TEST_MAX_COST);
        let mut expected_hits: u64 = 0;
        let mut expected_misses: u64 = 0;

        for op in ops {
            match op {
                CacheOp::Set { key, value } => {
                    let _ = store.set(key, value, HOUR);
                }
                CacheOp::Get { key } => match store.get(&key) {
                    Some(_) => expected_hits += 1,
                    None => expected_misses += 1,
                },
                CacheOp::Remove { key } => {
                    store.remove(&key);
                }
                CacheOp::Invalidate { pattern } => {
                    store.invalidate_matching(&pattern);
                }
            }
        }

        let stats = store.statistics();
        prop_assert_eq!(stats.hits, expected_hits, "Hits mismatch");
        prop_assert_eq!(stats.misses, expected_misses, "Misses mismatch");
        prop_assert_eq!(stats.entry_count, store.len(), "Entry count mismatch");
    }

    // Storing V1 then V2 under one key leaves exactly V2.
    #[test]
    fn prop_overwrite_semantics(
        key in valid_key_strategy(),
        value1 in valid_value_strategy(),
        value2 in valid_value_strategy()
    ) {
        let store: TtlStore<String> = TtlStore::new(TEST_MAX_ENTRIES, TEST_MAX_COST);

        store.set(key.clone(), value1, HOUR).unwrap();
        store.set(key.clone(), value2.clone(), HOUR).unwrap();

        prop_assert_eq!(store.get(&key), Some(value2.clone()));
        prop_assert_eq!(store.len(), 1);
        prop_assert_eq!(store.total_cost(), key.len() + value2.len());
    }

    // Entry count never exceeds the limit once a set completes.
    #[test]
    fn prop_capacity_enforcement(
        entries in prop::collection::vec(
            (valid_key_strategy(), valid_value_strategy()),
            1..200
        )
    ) {
        let max_entries = 50;
        let store: TtlStore<String> = TtlStore::new(max_entries, TEST_MAX_COST);

        for (key, value) in entries {
            let _ = store.set(key, value, HOUR);
            prop_assert!(
                store.len() <= max_entries,
                "Cache size {} exceeds max {}",
                store.len(),
                max_entries
            );
        }
    }

    // Total cost never exceeds the limit once a set completes.
    #[test]
    fn prop_cost_enforcement(
        entries in prop::collection::vec(
            (valid_key_strategy(), valid_value_strategy()),
            1..100
        )
    ) {
        let max_cost = 2048;
        let store: TtlStore<String> = TtlStore::new(TEST_MAX_ENTRIES, max_cost);

        for (key, value) in entries {
            let _ = store.set(key, value, HOUR);
            prop_assert!(store.total_cost() <= max_cost);
        }
    }

    // Invalidation removes exactly the keys containing the pattern.
    #[test]
    fn prop_invalidate_matching_exact(
        keys in prop::collection::hash_set(valid_key_strategy(), 1..40),
        pattern in "[a-z]{1,2}"
    ) {
        let store: TtlStore<String> = TtlStore::new(TEST_MAX_ENTRIES, TEST_MAX_COST);
        for key in &keys {
            store.set(key.clone(), "v".to_string(), HOUR).unwrap();
        }

        let expected_removed = keys.iter().filter(|k| k.contains(&pattern)).count();
        prop_assert_eq!(store.invalidate_matching(&pattern), expected_removed);

        for key in &keys {
            prop_assert_eq!(store.contains(key), !key.contains(&pattern));
        }
    }

    // A touched key is never the next eviction candidate.
    #[test]
    fn prop_lru_access_tracking(
        keys in prop::collection::vec(valid_key_strategy(), 3..8),
        new_key in valid_key_strategy(),
        new_value in valid_value_strategy()
    ) {
        let mut seen = HashSet::new();
        let unique_keys: Vec<String> =
            keys.into_iter().filter(|k| seen.insert(k.clone())).collect();

        prop_assume!(unique_keys.len() >= 3);
        prop_assume!(!unique_keys.contains(&new_key));

        let capacity = unique_keys.len();
        let store: TtlStore<String> = TtlStore::new(capacity, TEST_MAX_COST);

        for key in &unique_keys {
            store.set(key.clone(), format!("value_{}", key), HOUR).unwrap();
        }

        let accessed_key = unique_keys[0].clone();
        let _ = store.get(&accessed_key);
        let expected_evicted = unique_keys[1].clone();

        store.set(new_key.clone(), new_value, HOUR).unwrap();

        prop_assert!(store.len() <= capacity);
        prop_assert!(store.contains(&accessed_key), "Accessed key should survive");
        prop_assert!(!store.contains(&expected_evicted), "Oldest key should be evicted");
        prop_assert!(store.contains(&new_key), "New key should exist");
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    // Reads return the value while age <= ttl and a miss afterwards, no
    // matter how many reads happen in between.
    #[test]
    fn prop_ttl_correctness(
        key in valid_key_strategy(),
        value in valid_value_strategy(),
        ttl_secs in 1u64..120,
        reads in 1usize..5
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let store: TtlStore<String> = TtlStore::new(TEST_MAX_ENTRIES, TEST_MAX_COST);
            store.set(key.clone(), value.clone(), Duration::from_secs(ttl_secs)).unwrap();

            tokio::time::advance(Duration::from_secs(ttl_secs)).await;
            for _ in 0..reads {
                prop_assert_eq!(store.get(&key), Some(value.clone()));
            }

            tokio::time::advance(Duration::from_millis(1)).await;
            for _ in 0..reads {
                prop_assert_eq!(store.get(&key), None);
            }
            prop_assert!(store.is_empty());
            Ok(())
        })?;
    }
}

// == Additional Unit Tests for Edge Cases ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MAX_KEY_LENGTH;

    #[test]
    fn test_key_length_boundary() {
        let store: TtlStore<String> = TtlStore::new(TEST_MAX_ENTRIES, TEST_MAX_COST);

        assert!(store.set("x".repeat(MAX_KEY_LENGTH), "v".to_string(), HOUR).is_ok());
        assert!(store.set("x".repeat(MAX_KEY_LENGTH + 1), "v".to_string(), HOUR).is_err());
    }

    #[test]
    fn test_capacity_of_one() {
        let store: TtlStore<String> = TtlStore::new(1, TEST_MAX_COST);
        store.set("a", "1".to_string(), HOUR).unwrap();
        store.set("b", "2".to_string(), HOUR).unwrap();

        assert_eq!(store.len(), 1);
        assert!(store.contains("b"));
    }
}
