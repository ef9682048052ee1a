//! Process-wide, monotonic interning pool for normalized path components.
//!
//! A lazily-initialized `OnceLock`-guarded registry (the same idiom used
//! for the `BYTE_PATH` connection hook in [`crate::session`]) rather
//! than a per-`Path` allocation: every `parent`/`name` byte string that
//! is ever produced by [`crate::path`]'s normalizer passes through here
//! first, so two structurally equal `Path`s always share the same
//! `Arc<[u8]>` allocation and compare in O(1).

use std::collections::HashSet;
use std::sync::{Arc, Mutex, OnceLock};

fn pool() -> &'static Mutex<HashSet<Arc<[u8]>>> {
    static POOL: OnceLock<Mutex<HashSet<Arc<[u8]>>>> = OnceLock::new();
    POOL.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Return the canonical `Arc<[u8]>` for `bytes`, inserting it into the
/// pool if this is the first time these bytes have been seen.
pub fn intern(bytes: &[u8]) -> Arc<[u8]> {
    let mut pool = pool().lock().unwrap_or_else(|e| e.into_inner());
    if let Some(existing) = pool.get(bytes) {
        return Arc::clone(existing);
    }
    let arc: Arc<[u8]> = Arc::from(bytes);
    pool.insert(Arc::clone(&arc));
    arc
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn equal_bytes_share_one_allocation() {
        let a = intern(b"Books");
        let b = intern(b"Books");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn distinct_bytes_are_distinct() {
        let a = intern(b"Books");
        let b = intern(b"books");
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
