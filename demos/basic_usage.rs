//! Basic usage of the succinct trie.
//!
//! Run with `RUST_LOG=debug` to see build and load events.

use succinct_trie::{Agent, Builder, Config, Keyset, TrieIndex};

fn main() -> succinct_trie::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let mut keyset = Keyset::new();
    keyset.push("apple");
    keyset.push("orange");

    let trie = Builder::new(Config::default()).build(&keyset)?;
    let mut agent = Agent::new();

    println!("=== Lookup ===\n");
    for query in ["apple", "banana", "orange"] {
        agent.set_query(query);
        if trie.lookup(&mut agent) {
            println!("{query}: found, id {}", agent.id()?);
        } else {
            println!("{query}: not found");
        }
    }

    println!("\n=== Predictive search ===\n");
    agent.set_query("");
    while trie.predictive_search(&mut agent) {
        println!("{} (id {})", String::from_utf8_lossy(agent.key()), agent.id()?);
    }

    println!("\n=== Common-prefix search ===\n");
    let words = TrieIndex::build(["a", "app", "apple", "applesauce", "b"])?;
    for (key, id) in words.common_prefix_iter("applesauces") {
        println!("{} (id {:?})", String::from_utf8_lossy(&key), id);
    }

    println!("\n=== Save / load ===\n");
    let path = std::env::temp_dir().join("succinct_trie_demo.trie");
    words.save(&path)?;
    let loaded = TrieIndex::load(&path)?;
    println!(
        "{} keys, {} nodes, {} bytes on disk",
        loaded.num_keys(),
        loaded.num_nodes(),
        loaded.io_size()
    );
    println!("id 2 -> {:?}", loaded.restore(2)?.map(String::from_utf8));
    std::fs::remove_file(&path)?;

    Ok(())
}
