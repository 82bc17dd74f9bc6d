use parking_lot::Mutex;

/// Counters describing how a [`Pool`] has been used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Acquisitions that had to build a fresh value.
    pub allocations: u64,
    /// Acquisitions served from the free list.
    pub reuses: u64,
    /// Values handed back and kept for reuse.
    pub releases: u64,
    /// Values handed back while the free list was full, and dropped.
    pub discarded: u64,
}

struct PoolInner<T> {
    free: Vec<T>,
    stats: PoolStats,
}

/// Bounded free list of reusable buffers.
///
/// At most `retain` released values are kept; anything beyond that is freed.
pub struct Pool<T> {
    inner: Mutex<PoolInner<T>>,
    retain: usize,
}

impl<T> Pool<T> {
    pub fn new(retain: usize) -> Self {
        Self {
            inner: Mutex::new(PoolInner {
                free: Vec::with_capacity(retain),
                stats: PoolStats::default(),
            }),
            retain,
        }
    }

    /// Takes a free value, or builds one with `make` when the list is empty.
    pub fn acquire(&self, make: impl FnOnce() -> T) -> T {
        self.acquire_where(|_| true, make)
    }

    /// Takes the most recently released value accepted by `fits`, or builds
    /// one with `make`. Values that do not fit stay in the list.
    pub fn acquire_where(&self, fits: impl Fn(&T) -> bool, make: impl FnOnce() -> T) -> T {
        let mut inner = self.inner.lock();
        if let Some(index) = inner.free.iter().rposition(fits) {
            inner.stats.reuses += 1;
            return inner.free.swap_remove(index);
        }
        inner.stats.allocations += 1;
        drop(inner);
        log::debug!("pool miss for {}", core::any::type_name::<T>());
        make()
    }

    pub fn release(&self, value: T) {
        let mut inner = self.inner.lock();
        if inner.free.len() < self.retain {
            inner.free.push(value);
            inner.stats.releases += 1;
        } else {
            inner.stats.discarded += 1;
            drop(inner);
            drop(value);
        }
    }

    pub fn retain(&self) -> usize {
        self.retain
    }

    /// Number of values currently waiting for reuse.
    pub fn idle(&self) -> usize {
        self.inner.lock().free.len()
    }

    pub fn stats(&self) -> PoolStats {
        self.inner.lock().stats
    }
}

impl<T> core::fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Pool")
            .field("retain", &self.retain)
            .field("idle", &inner.free.len())
            .field("stats", &inner.stats)
            .finish()
    }
}
