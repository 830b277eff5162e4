//! Hierarchical size aggregation by key prefix.
//!
//! Keys are split on any of the configured separators and each segment
//! becomes one level of the tree. Every node's value is the total serialized
//! size of the keys below it.
//!
//! ```text
//! user:1:name  40 ─┐
//! user:1:age   10 ─┼─> root 80 ── user 60 ── 1 50 ── name 40
//! user:2       10 ─┘                │                └─ age 10
//! session      20 ──────────────────┤        2 10
//!                                   └─ session 20
//! ```

use std::collections::BTreeMap;

use anyhow::Result;
use filter::{Record, RecordHandler};
use serde::Serialize;

pub const DEFAULT_SEPARATOR: &str = ":";

/// One node in the d3 flame graph shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlameNode {
    pub name: String,
    pub value: u64,
    #[serde(serialize_with = "children_as_list")]
    pub children: BTreeMap<String, FlameNode>,
}

fn children_as_list<S: serde::Serializer>(
    children: &BTreeMap<String, FlameNode>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(children.values())
}

impl FlameNode {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

pub struct FlameTree {
    separators: Vec<String>,
    root: FlameNode,
    keys: u64,
}

impl FlameTree {
    /// Empty separators (or an empty list) fall back to `:`.
    pub fn new(separators: Vec<String>) -> Self {
        let mut separators: Vec<String> = separators.into_iter().filter(|s| !s.is_empty()).collect();
        if separators.is_empty() {
            separators.push(DEFAULT_SEPARATOR.to_string());
        }
        Self {
            separators,
            root: FlameNode::named("root"),
            keys: 0,
        }
    }

    #[must_use]
    pub fn separators(&self) -> &[String] {
        &self.separators
    }

    /// Number of keys added.
    #[must_use]
    pub fn keys(&self) -> u64 {
        self.keys
    }

    /// Splits `key` on every occurrence of any separator. At each position
    /// the longest matching separator wins.
    #[must_use]
    pub fn split<'k>(&self, key: &'k str) -> Vec<&'k str> {
        let mut segments = Vec::new();
        let mut start = 0;
        let mut i = 0;
        while i < key.len() {
            let matched = self
                .separators
                .iter()
                .filter(|sep| key[i..].starts_with(sep.as_str()))
                .map(|sep| sep.len())
                .max();
            match matched {
                Some(len) => {
                    segments.push(&key[start..i]);
                    i += len;
                    start = i;
                }
                None => i += key[i..].chars().next().map_or(1, char::len_utf8),
            }
        }
        segments.push(&key[start..]);
        segments
    }

    /// Adds `size` to the root and to every node on the key's path.
    pub fn add(&mut self, key: &str, size: u64) {
        let path = self.split(key);
        self.keys += 1;
        let mut node = &mut self.root;
        node.value += size;
        for segment in path {
            node = node
                .children
                .entry(segment.to_string())
                .or_insert_with(|| FlameNode::named(segment));
            node.value += size;
        }
    }

    #[must_use]
    pub fn root(&self) -> &FlameNode {
        &self.root
    }

    /// Node reached by following `path` from the root.
    #[must_use]
    pub fn node(&self, path: &[&str]) -> Option<&FlameNode> {
        path.iter()
            .try_fold(&self.root, |node, segment| node.children.get(*segment))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.root)
    }
}

impl Default for FlameTree {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl RecordHandler for FlameTree {
    fn on_record(&mut self, record: Record) -> Result<()> {
        let key = record.key_lossy();
        self.add(&key, record.size.unwrap_or(0));
        Ok(())
    }
}
