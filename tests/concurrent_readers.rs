//! One shared index, many readers with their own agents.

use std::sync::Arc;
use std::thread;

use succinct_trie::{Agent, Builder, Config, Keyset, TrieIndex};

fn url_keys(n: usize) -> Vec<String> {
    let domains = ["example.com", "test.org", "demo.net", "sample.io"];
    let paths = ["users", "posts", "comments", "api/v1", "api/v2"];
    (0..n)
        .map(|i| {
            let domain = domains[i % domains.len()];
            let path = paths[(i / domains.len()) % paths.len()];
            let id = i / (domains.len() * paths.len());
            format!("{domain}/{path}/{id}")
        })
        .collect()
}

#[test]
fn shared_index_answers_every_thread() {
    let keys = url_keys(5_000);
    let keyset: Keyset = keys.iter().collect();
    let trie = Arc::new(Builder::new(Config::default()).build(&keyset).unwrap());

    let mut sorted = keys.clone();
    sorted.sort();
    let sorted = Arc::new(sorted);

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let trie = Arc::clone(&trie);
            let sorted = Arc::clone(&sorted);
            thread::spawn(move || {
                let mut agent = Agent::new();
                for (id, key) in sorted.iter().enumerate().skip(t).step_by(8) {
                    agent.set_query(key);
                    assert!(trie.lookup(&mut agent), "{key}");
                    assert_eq!(agent.id().unwrap() as usize, id);

                    agent.set_query_id(id as u32);
                    assert!(trie.reverse_lookup(&mut agent).unwrap());
                    assert_eq!(agent.key(), key.as_bytes());
                }

                agent.set_query("test.org/posts/");
                let mut n = 0;
                while trie.predictive_search(&mut agent) {
                    assert!(agent.key().starts_with(b"test.org/posts/"));
                    n += 1;
                }
                n
            })
        })
        .collect();

    let expected = sorted
        .iter()
        .filter(|k| k.starts_with("test.org/posts/"))
        .count();
    for h in handles {
        assert_eq!(h.join().unwrap(), expected);
    }
}

#[test]
fn loaded_index_is_shareable() {
    let trie = TrieIndex::build(url_keys(1_000)).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("urls.trie");
    trie.save(&path).unwrap();

    let loaded = Arc::new(TrieIndex::load_mapped(&path).unwrap());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let loaded = Arc::clone(&loaded);
            thread::spawn(move || loaded.iter().count())
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap(), trie.num_keys());
    }
}
