//! Order statistics over a sliding window.
//!
//! [`OrderStatTree`] is an arena-backed treap with subtree sizes, giving O(log n)
//! expected insert, remove and rank queries. Duplicate values are kept apart by an
//! insertion sequence number; node priorities are derived from that sequence number
//! so the tree shape, and everything computed from it, is deterministic.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

type Key = (OrderedFloat<f64>, u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Node {
    key: Key,
    priority: u64,
    left: Option<usize>,
    right: Option<usize>,
    size: usize,
}

/// splitmix64 finalizer.
fn mix(seq: u64) -> u64 {
    let mut z = seq.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Multiset of f64 values supporting rank queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderStatTree {
    nodes: Vec<Node>,
    free: Vec<usize>,
    root: Option<usize>,
    next_seq: u64,
}

impl OrderStatTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.size(self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Insert a value. The returned sequence number identifies it for removal.
    pub fn insert(&mut self, value: f64) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        let key = (OrderedFloat(value), seq);
        let node = Node {
            key,
            priority: mix(seq),
            left: None,
            right: None,
            size: 1,
        };
        let idx = match self.free.pop() {
            Some(i) => {
                self.nodes[i] = node;
                i
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };
        let (l, r) = self.split(self.root, key);
        let l = self.merge(l, Some(idx));
        self.root = self.merge(l, r);
        seq
    }

    /// Remove the value inserted with `seq`. Returns whether it was present.
    pub fn remove(&mut self, value: f64, seq: u64) -> bool {
        let key = (OrderedFloat(value), seq);
        let (l, r) = self.split(self.root, key);
        let (mid, r) = self.split(r, (key.0, seq.saturating_add(1)));
        let found = mid.is_some();
        if let Some(i) = mid {
            self.free.push(i);
        }
        self.root = self.merge(l, r);
        found
    }

    /// Number of stored values strictly below `value`.
    pub fn count_less(&self, value: f64) -> usize {
        self.count_where(|k| k.0 .0 < value)
    }

    /// Number of stored values at or below `value`.
    pub fn count_less_equal(&self, value: f64) -> usize {
        self.count_where(|k| k.0 .0 <= value)
    }

    /// The k-th smallest value (0-based).
    pub fn select(&self, mut k: usize) -> Option<f64> {
        let mut cur = self.root;
        while let Some(i) = cur {
            let node = &self.nodes[i];
            let left = self.size(node.left);
            if k < left {
                cur = node.left;
            } else if k == left {
                return Some(node.key.0 .0);
            } else {
                k -= left + 1;
                cur = node.right;
            }
        }
        None
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.root = None;
    }

    /// Count nodes whose key satisfies a predicate that is monotone in key order.
    fn count_where(&self, below: impl Fn(&Key) -> bool) -> usize {
        let mut count = 0;
        let mut cur = self.root;
        while let Some(i) = cur {
            let node = &self.nodes[i];
            if below(&node.key) {
                count += self.size(node.left) + 1;
                cur = node.right;
            } else {
                cur = node.left;
            }
        }
        count
    }

    fn size(&self, t: Option<usize>) -> usize {
        t.map_or(0, |i| self.nodes[i].size)
    }

    fn update(&mut self, i: usize) {
        let size = 1 + self.size(self.nodes[i].left) + self.size(self.nodes[i].right);
        self.nodes[i].size = size;
    }

    /// Split into (keys < key, keys >= key).
    fn split(&mut self, t: Option<usize>, key: Key) -> (Option<usize>, Option<usize>) {
        let Some(i) = t else {
            return (None, None);
        };
        if self.nodes[i].key < key {
            let (l, r) = self.split(self.nodes[i].right, key);
            self.nodes[i].right = l;
            self.update(i);
            (Some(i), r)
        } else {
            let (l, r) = self.split(self.nodes[i].left, key);
            self.nodes[i].left = r;
            self.update(i);
            (l, Some(i))
        }
    }

    /// Merge two treaps where every key in `a` is below every key in `b`.
    fn merge(&mut self, a: Option<usize>, b: Option<usize>) -> Option<usize> {
        match (a, b) {
            (None, t) | (t, None) => t,
            (Some(i), Some(j)) => {
                if self.nodes[i].priority > self.nodes[j].priority {
                    let right = self.merge(self.nodes[i].right, b);
                    self.nodes[i].right = right;
                    self.update(i);
                    Some(i)
                } else {
                    let left = self.merge(a, self.nodes[j].left);
                    self.nodes[j].left = left;
                    self.update(j);
                    Some(j)
                }
            }
        }
    }
}

/// Percentile rank of the newest value within the last `window` values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollingPercentile {
    window: usize,
    values: VecDeque<(f64, u64)>,
    tree: OrderStatTree,
}

impl RollingPercentile {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            values: VecDeque::with_capacity(window + 1),
            tree: OrderStatTree::new(),
        }
    }

    /// Add a value and return its average-rank percentile in (0, 1] once the window
    /// is full. Ties share the mean of the ranks they span.
    pub fn update(&mut self, value: f64) -> Option<f64> {
        let seq = self.tree.insert(value);
        self.values.push_back((value, seq));
        if self.values.len() > self.window {
            if let Some((old, old_seq)) = self.values.pop_front() {
                self.tree.remove(old, old_seq);
            }
        }
        if !self.is_ready() {
            return None;
        }
        let less = self.tree.count_less(value);
        let equal = self.tree.count_less_equal(value) - less;
        let rank = less as f64 + (equal as f64 + 1.0) / 2.0;
        Some(rank / self.values.len() as f64)
    }

    pub fn is_ready(&self) -> bool {
        self.values.len() >= self.window
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Median of the window.
    pub fn median(&self) -> Option<f64> {
        self.tree.select(self.values.len().checked_sub(1)? / 2)
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.tree.clear();
    }
}
