use super::*;

use proptest::prelude::*;
use std::collections::BTreeSet;

/// Structural checks that must hold for every built or loaded index.
fn validate_trie(t: &TrieIndex) {
    let num_nodes = t.num_nodes();
    assert_eq!(t.louds.len(), 2 * num_nodes + 1, "louds length");
    assert_eq!(t.louds.num_ones(), num_nodes, "one 1-bit per node");
    assert_eq!(t.terminals.len(), num_nodes);
    assert_eq!(t.links.len(), num_nodes);
    assert_eq!(t.tail_starts.len(), t.links.num_ones());
    assert_eq!(t.tail_lens.len(), t.links.num_ones());
    for (start, len) in t.tail_starts.iter().zip(t.tail_lens.iter()) {
        assert!(len > 0 && start + len <= t.tail.len() as u64, "tail range");
    }
    if !t.is_path_compressed() {
        assert_eq!(t.links.num_ones(), 0, "uncompressed trie has no tail");
    }

    for node in 0..num_nodes {
        let start = t.louds.select0(node) + 1;
        let end = t.louds.select0(node + 1);
        let first = start - node - 1;
        let labels = &t.labels[first..first + (end - start)];
        assert!(
            labels.windows(2).all(|w| w[0] < w[1]),
            "siblings of node {node} must be sorted"
        );
        for child in first..first + labels.len() {
            assert!(child > node, "child {child} must follow parent {node}");
        }
    }
}

/// A freshly built compressed trie has no non-terminal single-child chains.
fn assert_chains_collapsed(t: &TrieIndex) {
    if !t.is_path_compressed() {
        return;
    }
    for node in 1..t.num_nodes() {
        let fanout = t.louds.select0(node + 1) - t.louds.select0(node) - 1;
        assert!(
            t.terminals.get(node) || fanout != 1,
            "uncollapsed chain at node {node}"
        );
    }
}

fn key_strategy() -> impl Strategy<Value = Vec<u8>> + Clone {
    // A small alphabet forces shared prefixes and deep chains.
    prop::collection::vec(prop_oneof![Just(0u8), Just(b'a'), Just(b'b'), any::<u8>()], 0..=12)
}

fn keys_strategy() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(key_strategy(), 0..=300)
}

fn config_strategy() -> impl Strategy<Value = Config> {
    (any::<bool>(), any::<bool>()).prop_map(|(ids, compress)| {
        Config::default()
            .with_key_ids(ids)
            .with_path_compression(compress)
    })
}

fn build(keys: &[Vec<u8>], config: Config) -> TrieIndex {
    let keyset: Keyset = keys.iter().collect();
    Builder::new(config).build(&keyset).unwrap()
}

#[derive(Clone, Debug)]
enum Query {
    Lookup(Vec<u8>),
    Predict(Vec<u8>),
    CommonPrefix(Vec<u8>),
    Restore(u32),
}

fn query_strategy() -> impl Strategy<Value = Query> {
    let key = key_strategy();
    prop_oneof![
        key.clone().prop_map(Query::Lookup),
        prop::collection::vec(prop_oneof![Just(b'a'), Just(b'b')], 0..=3).prop_map(Query::Predict),
        key.prop_map(Query::CommonPrefix),
        (0u32..400).prop_map(Query::Restore),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence_with_btreeset(
        keys in keys_strategy(),
        config in config_strategy(),
        queries in prop::collection::vec(query_strategy(), 0..=64),
    ) {
        let t = build(&keys, config.clone());
        let set: BTreeSet<Vec<u8>> = keys.iter().cloned().collect();
        let sorted: Vec<Vec<u8>> = set.iter().cloned().collect();
        validate_trie(&t);
        assert_chains_collapsed(&t);
        prop_assert_eq!(t.num_keys(), set.len());

        let mut agent = Agent::new();
        for q in queries {
            match q {
                Query::Lookup(key) => {
                    agent.set_query(&key);
                    let found = t.lookup(&mut agent);
                    prop_assert_eq!(found, set.contains(&key));
                    if found {
                        prop_assert_eq!(agent.key(), key.as_slice());
                        if config.enable_key_ids {
                            let rank = sorted.binary_search(&key).unwrap();
                            prop_assert_eq!(agent.id().unwrap() as usize, rank);
                        }
                    }
                }
                Query::Predict(prefix) => {
                    agent.set_query(&prefix);
                    let mut got = Vec::new();
                    while t.predictive_search(&mut agent) {
                        got.push(agent.key().to_vec());
                    }
                    prop_assert!(!t.predictive_search(&mut agent));
                    let expected: Vec<Vec<u8>> = set
                        .range(prefix.clone()..)
                        .take_while(|k| k.starts_with(&prefix))
                        .cloned()
                        .collect();
                    prop_assert_eq!(got, expected);
                }
                Query::CommonPrefix(query) => {
                    agent.set_query(&query);
                    let mut got = Vec::new();
                    while t.common_prefix_search(&mut agent) {
                        got.push(agent.key().to_vec());
                    }
                    let expected: Vec<Vec<u8>> = (0..=query.len())
                        .map(|n| query[..n].to_vec())
                        .filter(|p| set.contains(p))
                        .collect();
                    prop_assert_eq!(got, expected);
                }
                Query::Restore(id) => {
                    if config.enable_key_ids {
                        let got = t.restore(id).unwrap();
                        prop_assert_eq!(got.as_ref(), sorted.get(id as usize));
                    } else {
                        prop_assert!(t.restore(id).is_err());
                    }
                }
            }
        }

        let all: Vec<(Vec<u8>, Option<u32>)> = t.iter().collect();
        let expected: Vec<(Vec<u8>, Option<u32>)> = sorted
            .iter()
            .enumerate()
            .map(|(i, k)| (k.clone(), config.enable_key_ids.then_some(i as u32)))
            .collect();
        prop_assert_eq!(all, expected);
    }

    #[test]
    fn prop_serialized_round_trip(keys in keys_strategy(), config in config_strategy()) {
        let t = build(&keys, config);
        let bytes = t.to_bytes();
        prop_assert_eq!(bytes.len(), t.io_size());

        let loaded = TrieIndex::from_bytes(&bytes).unwrap();
        validate_trie(&loaded);
        prop_assert_eq!(loaded.to_bytes(), bytes);
        prop_assert_eq!(loaded.iter().collect::<Vec<_>>(), t.iter().collect::<Vec<_>>());
    }

    #[test]
    fn prop_corrupted_bytes_never_panic(
        keys in keys_strategy(),
        flips in prop::collection::vec((any::<prop::sample::Index>(), any::<u8>()), 1..=4),
    ) {
        let t = build(&keys, Config::default());
        let mut bytes = t.to_bytes();
        for (at, xor) in flips {
            let i = at.index(bytes.len());
            bytes[i] ^= xor;
        }
        // Either rejected, or a structurally valid index that answers queries.
        if let Ok(loaded) = TrieIndex::from_bytes(&bytes) {
            validate_trie(&loaded);
            for (key, id) in loaded.iter() {
                prop_assert!(loaded.contains(&key));
                if let Some(id) = id {
                    prop_assert_eq!(loaded.restore(id).unwrap(), Some(key));
                }
            }
        }
    }
}

fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    fn rec<T: Clone>(items: &[T], used: &mut [bool], out: &mut Vec<T>, f: &mut impl FnMut(Vec<T>)) {
        if out.len() == items.len() {
            f(out.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            out.push(items[i].clone());
            rec(items, used, out, f);
            out.pop();
            used[i] = false;
        }
    }

    let mut used = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    rec(items, &mut used, &mut out, &mut f);
}

#[test]
fn exhaustive_insert_order_small_set() {
    let keys: Vec<Vec<u8>> = vec![
        b"a".to_vec(),
        b"b".to_vec(),
        b"".to_vec(),
        b"aa".to_vec(),
        b"ab".to_vec(),
        b"ba".to_vec(),
    ];
    let reference = build(&keys, Config::default()).to_bytes();

    for_each_permutation(&keys, |perm| {
        let t = build(&perm, Config::default());
        validate_trie(&t);
        assert_eq!(t.to_bytes(), reference, "build must not depend on push order");
    });
}
