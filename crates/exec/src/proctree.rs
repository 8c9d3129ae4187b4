//! Process-tree enumeration for timeout kills.
//!
//! The supervisor cannot signal grandchildren through the child handle, so
//! on timeout it walks the kernel's children relation and signals every PID
//! it finds. The walk is behind a trait with one production implementation
//! (procfs) and a scripted fake for tests; on hosts without procfs the walk
//! returns nothing and only the root PID is signalled.

use std::collections::BTreeSet;

/// Source of the direct-children relation between processes.
pub trait ProcessHierarchy: Send + Sync {
    /// Direct children of `pid`. Missing or unreadable data yields an empty
    /// list, never an error.
    fn children(&self, pid: i64) -> Vec<i64>;
}

/// Production implementation reading `/proc/<pid>/task/<pid>/children`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcFs;

impl ProcessHierarchy for ProcFs {
    fn children(&self, pid: i64) -> Vec<i64> {
        let path = format!("/proc/{pid}/task/{pid}/children");

        match std::fs::read_to_string(path) {
            Ok(content) => content
                .split_whitespace()
                .filter_map(|token| token.parse().ok())
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

/// Every PID in the tree rooted at `root`, root included.
pub fn collect_tree(hierarchy: &dyn ProcessHierarchy, root: i64) -> BTreeSet<i64> {
    let mut result = BTreeSet::new();
    let mut stack = vec![root];

    while let Some(pid) = stack.pop() {
        if !result.insert(pid) {
            // Already visited; a recycled or cyclic PID must not loop us.
            continue;
        }
        stack.extend(hierarchy.children(pid));
    }

    result
}
