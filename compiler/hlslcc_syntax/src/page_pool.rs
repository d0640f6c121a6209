//! Process-wide pool of arena pages.
//!
//! Syntax-tree arenas allocate their storage in fixed-capacity pages. When an
//! arena is dropped its pages are cleared and handed back here, so a build
//! that compiles thousands of shaders reuses the same few allocations.
//!
//! The pool is the only mutable state shared between concurrent
//! compilations. It is guarded by one `parking_lot::Mutex`, taken only
//! around whole-page acquire/release and never per node.

use parking_lot::Mutex;

/// Nodes per page.
pub const PAGE_LEN: usize = 256;

/// Upper bound on idle pages kept per pool.
const MAX_POOLED_PAGES: usize = 64;

/// A freelist of page buffers for one node type.
pub struct PagePool<T> {
    free: Mutex<Vec<Vec<T>>>,
}

impl<T> PagePool<T> {
    pub const fn new() -> Self {
        PagePool {
            free: parking_lot::const_mutex(Vec::new()),
        }
    }

    /// Take an empty page with capacity for `PAGE_LEN` nodes.
    pub fn acquire(&self) -> Vec<T> {
        let recycled = self.free.lock().pop();
        recycled.unwrap_or_else(|| Vec::with_capacity(PAGE_LEN))
    }

    /// Return a page. Its nodes are dropped before the lock is taken.
    pub fn release(&self, mut page: Vec<T>) {
        page.clear();
        if page.capacity() < PAGE_LEN {
            return;
        }
        let mut free = self.free.lock();
        if free.len() < MAX_POOLED_PAGES {
            free.push(page);
        }
    }

    /// Number of idle pages.
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }
}

impl<T> Default for PagePool<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Append-only vector stored in pooled pages.
///
/// Pages never reallocate, so a node's address is stable for the life of the
/// vector. Indices are dense and assigned in push order.
pub struct PagedVec<T: 'static> {
    pages: Vec<Vec<T>>,
    len: usize,
    pool: &'static PagePool<T>,
}

impl<T: 'static> PagedVec<T> {
    pub fn new(pool: &'static PagePool<T>) -> Self {
        PagedVec {
            pages: Vec::new(),
            len: 0,
            pool,
        }
    }

    /// Append and return the new element's index.
    pub fn push(&mut self, value: T) -> usize {
        let needs_page = self.pages.last().map_or(true, |p| p.len() == PAGE_LEN);
        if needs_page {
            self.pages.push(self.pool.acquire());
        }
        if let Some(page) = self.pages.last_mut() {
            page.push(value);
        }
        self.len += 1;
        self.len - 1
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.pages.get(index / PAGE_LEN)?.get(index % PAGE_LEN)
    }

    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.pages.get_mut(index / PAGE_LEN)?.get_mut(index % PAGE_LEN)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.pages.iter().flatten()
    }
}

impl<T: 'static> Drop for PagedVec<T> {
    fn drop(&mut self) {
        for page in self.pages.drain(..) {
            self.pool.release(page);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static TEST_POOL: PagePool<u64> = PagePool::new();

    /// Pages survive the arena that used them and are reused by the next.
    #[test]
    fn pages_are_recycled() {
        {
            let mut v = PagedVec::new(&TEST_POOL);
            for i in 0..(PAGE_LEN as u64 * 2 + 3) {
                v.push(i);
            }
            assert_eq!(v.len(), PAGE_LEN * 2 + 3);
            assert_eq!(v.get(PAGE_LEN + 1), Some(&(PAGE_LEN as u64 + 1)));
            assert_eq!(v.get(PAGE_LEN * 3), None);
        }
        assert!(TEST_POOL.idle() >= 3);

        let idle_before = TEST_POOL.idle();
        let mut v = PagedVec::new(&TEST_POOL);
        v.push(7);
        assert_eq!(TEST_POOL.idle(), idle_before - 1);
        assert_eq!(v.iter().copied().collect::<Vec<_>>(), vec![7]);
    }
}
