//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check key determinism, index consistency and
//! invalidation behavior over generated inputs.

use proptest::prelude::*;
use serde_json::{json, Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::cache::{build_key, Cache, Hooks, OperationPolicy, Policy, ReferenceIndex};

// == Strategies ==
/// Generates argument maps with distinct keys
fn args_strategy() -> impl Strategy<Value = Vec<(String, i64)>> {
    prop::collection::btree_map("[a-z]{1,8}", any::<i64>(), 0..8)
        .prop_map(|m| m.into_iter().collect())
}

fn tag_strategy() -> impl Strategy<Value = String> {
    "(user|group|users|groups):[0-9]{1,2}"
}

/// Generates a sequence of index operations for testing
#[derive(Debug, Clone)]
enum IndexOp {
    Record { key: String, tags: BTreeSet<String> },
    Remove { key: String },
}

fn index_op_strategy() -> impl Strategy<Value = IndexOp> {
    let key = "k[0-9]";
    prop_oneof![
        (key, prop::collection::btree_set(tag_strategy(), 1..4))
            .prop_map(|(key, tags)| IndexOp::Record { key, tags }),
        key.prop_map(|key| IndexOp::Remove { key }),
    ]
}

fn object(pairs: impl Iterator<Item = (String, i64)>) -> Value {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert(k, json!(v));
    }
    Value::Object(map)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // **Property 1: Key Determinism**
    // *For any* arguments, the key does not depend on field insertion order.
    #[test]
    fn prop_key_ignores_field_order(pairs in args_strategy()) {
        let forward = object(pairs.clone().into_iter());
        let backward = object(pairs.into_iter().rev());

        let a = build_key("user", &forward).unwrap();
        let b = build_key("user", &backward).unwrap();
        prop_assert_eq!(a, b);
    }

    // **Property 2: Key Separation**
    // *For any* arguments, different operations never share a key.
    #[test]
    fn prop_key_separates_operations(pairs in args_strategy()) {
        let args = object(pairs.into_iter());
        prop_assert_ne!(build_key("user", &args).unwrap(), build_key("users", &args).unwrap());
    }

    // **Property 3: Index Consistency**
    // *For any* sequence of records and removals, every tag maps back to a key
    // that carries it, and the index matches a simple model.
    #[test]
    fn prop_index_matches_model(ops in prop::collection::vec(index_op_strategy(), 1..60)) {
        let index = ReferenceIndex::new();
        let mut model: HashMap<String, BTreeSet<String>> = HashMap::new();

        for (revision, op) in ops.into_iter().enumerate() {
            match op {
                IndexOp::Record { key, tags } => {
                    index.record(&key, tags.clone(), revision as u64);
                    model.insert(key, tags);
                }
                IndexOp::Remove { key } => {
                    index.remove(&key);
                    model.remove(&key);
                }
            }
        }

        prop_assert!(index.is_consistent());
        prop_assert_eq!(index.len(), model.len());
        for (key, tags) in &model {
            let recorded = index.tags_for(key);
            prop_assert_eq!(recorded.as_ref(), Some(tags));
            for tag in tags {
                prop_assert!(index.lookup_keys_for_tag(tag).contains(key));
            }
        }
    }

    // **Property 4: Invalidation Idempotence**
    // *For any* set of cached ids, invalidating the same tags twice removes
    // nothing the second time, and the next read recomputes.
    #[test]
    fn prop_invalidate_is_idempotent(
        ids in prop::collection::btree_set(0u32..20, 1..10),
        targets in prop::collection::btree_set(0u32..20, 1..5),
    ) {
        let policy = Policy::new().query(
            "user",
            OperationPolicy::new(|args, _| Some(vec![format!("user:{}", args["id"])])),
        );
        let cache = Cache::builder().policy(policy).hooks(Hooks::silent()).build();
        let calls = Arc::new(AtomicUsize::new(0));

        let (first, second, recomputed) = runtime().block_on(async {
            for &id in &ids {
                let calls = calls.clone();
                cache
                    .resolve("user", &json!({"id": id}), move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(json!({"id": id}))
                    })
                    .await
                    .unwrap();
            }

            let tags: Vec<String> = targets.iter().map(|id| format!("user:{id}")).collect();
            let first = cache.invalidate(&tags).await.unwrap();
            let second = cache.invalidate(&tags).await.unwrap();

            let before = calls.load(Ordering::SeqCst);
            for &id in &ids {
                let calls = calls.clone();
                cache
                    .resolve("user", &json!({"id": id}), move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(json!({"id": id}))
                    })
                    .await
                    .unwrap();
            }
            (first, second, calls.load(Ordering::SeqCst) - before)
        });

        let expected = ids.intersection(&targets).count();
        prop_assert_eq!(first, expected);
        prop_assert_eq!(second, 0);
        prop_assert_eq!(recomputed, expected);
        prop_assert!(cache.default_namespace().index().is_consistent());
    }
}
