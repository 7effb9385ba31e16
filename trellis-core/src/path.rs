//! Key-path segmentation.
//!
//! A key path addresses nested children: `"user.address.city"` walks three
//! keys, and `"items[3].name"` is the bracket spelling of
//! `"items.3.name"`. [`Node::get`](crate::Node::get) peels one segment at a
//! time with [`split_first`] and recurses on the tail.
//!
//! Splits are memoized in a global bounded cache, because the same handful
//! of paths (from templates, bindings, repeated lookups) get resolved over
//! and over. Past the size limit new paths are simply parsed each time;
//! nothing is evicted.

use std::sync::OnceLock;

use dashmap::DashMap;

/// (key start, key end, tail start) byte offsets into the path.
type Split = (usize, usize, Option<usize>);

const CACHE_LIMIT: usize = 1024;

static SPLIT_CACHE: OnceLock<DashMap<String, Split>> = OnceLock::new();

/// First key of the path.
pub fn first_key(path: &str) -> &str {
    split_first(path).0
}

/// Everything after the first key, or `None` for a single-segment path.
pub fn tail_path(path: &str) -> Option<&str> {
    split_first(path).1
}

/// Split a path into its first key and remaining tail.
///
/// Both pieces borrow from the input; only the cache entry allocates, and
/// only once per distinct path.
pub fn split_first(path: &str) -> (&str, Option<&str>) {
    let (start, end, tail) = split_indices(path);
    (&path[start..end], tail.map(|t| &path[t..]))
}

fn split_indices(path: &str) -> Split {
    let cache = SPLIT_CACHE.get_or_init(DashMap::new);
    if let Some(hit) = cache.get(path) {
        return *hit;
    }
    let split = compute_split(path);
    if cache.len() < CACHE_LIMIT {
        cache.insert(path.to_owned(), split);
    }
    split
}

fn compute_split(path: &str) -> Split {
    debug_assert!(!path.is_empty(), "empty key path");
    if path.is_empty() {
        return (0, 0, None);
    }

    let bytes = path.as_bytes();

    // Bracket segment: the key is the bracket's interior, the tail starts
    // past the closing bracket (skipping a joining dot).
    if bytes[0] == b'[' {
        return match path.find(']') {
            Some(close) => {
                let mut tail = close + 1;
                if bytes.get(tail) == Some(&b'.') {
                    tail += 1;
                }
                let tail = (tail < path.len()).then_some(tail);
                (1, close, tail)
            }
            None => (1, path.len(), None),
        };
    }

    // Plain segment: runs to the first dot (consumed) or bracket (kept for
    // the next segment).
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'.' {
            let tail = (i + 1 < path.len()).then_some(i + 1);
            return (0, i, tail);
        }
        if b == b'[' {
            return (0, i, Some(i));
        }
    }
    (0, path.len(), None)
}
