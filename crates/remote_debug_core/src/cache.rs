//! Page-granular read-through cache over the target's address space.
//!
//! One mutex covers the whole "check, fetch on miss, populate, slice"
//! sequence, so concurrent readers never fetch the same page twice and never
//! observe a half-populated page.

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;

use crate::error::{DebuggerError, TransportError};
use crate::types::ReadResult;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub resident_pages: usize,
}

struct Page {
    data: Vec<u8>,
    last_used: u64,
}

#[derive(Default)]
struct CacheState {
    pages: HashMap<u64, Page>,
    // last-use tick -> page base, oldest first
    lru: BTreeMap<u64, u64>,
    tick: u64,
    hits: u64,
    misses: u64,
}

impl CacheState {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn touch(&mut self, base: u64) -> Option<&[u8]> {
        let tick = self.next_tick();
        let page = self.pages.get_mut(&base)?;
        self.lru.remove(&page.last_used);
        page.last_used = tick;
        self.lru.insert(tick, base);
        Some(&page.data)
    }

    fn insert(&mut self, base: u64, data: Vec<u8>, max_pages: usize) {
        while self.pages.len() >= max_pages {
            let Some((_, victim)) = self.lru.pop_first() else {
                break;
            };
            self.pages.remove(&victim);
            tracing::trace!("Evicted cache page base={:#x}", victim);
        }

        let tick = self.next_tick();
        self.lru.insert(tick, base);
        self.pages.insert(
            base,
            Page {
                data,
                last_used: tick,
            },
        );
    }
}

pub struct PageCache {
    page_size: u64,
    max_pages: usize,
    state: Mutex<CacheState>,
}

impl PageCache {
    /// `budget_bytes / page_size` pages of `page_size` bytes each.
    pub fn new(page_size: u64, budget_bytes: u64) -> Self {
        assert!(page_size > 0, "page size must be non-zero");
        let max_pages = (budget_bytes / page_size) as usize;
        tracing::debug!(
            "Page cache: page_size={} pages={} budget={}",
            page_size,
            max_pages,
            budget_bytes
        );
        Self {
            page_size,
            max_pages,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn is_enabled(&self) -> bool {
        self.max_pages > 0
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            resident_pages: state.pages.len(),
        }
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.pages.clear();
        state.lru.clear();
    }

    /// Whether the page containing `address` is resident.
    pub fn contains(&self, address: u64) -> bool {
        let base = address - address % self.page_size;
        self.state.lock().pages.contains_key(&base)
    }

    /// Reads `count` bytes at `address`, fetching missing pages through
    /// `fetch(base, len)`. Pages the target cannot read are never stored.
    pub fn read<F>(&self, address: u64, count: u64, fetch: F) -> Result<Vec<u8>>
    where
        F: Fn(u64, u64) -> Result<ReadResult>,
    {
        if count == 0 {
            return Ok(Vec::new());
        }
        // Inclusive, so a read may end exactly at the top of the address space.
        let last = address.checked_add(count - 1).ok_or_else(|| {
            DebuggerError::target(format!(
                "read of {count} bytes at {address:#x} wraps the address space"
            ))
        })?;

        if !self.is_enabled() {
            return read_exact(&fetch, address, count);
        }

        // `count` is caller-controlled; grow page by page.
        let mut out = Vec::with_capacity(count.min(self.page_size) as usize);
        let mut state = self.state.lock();
        let mut cursor = address;

        loop {
            let base = cursor - cursor % self.page_size;
            let offset = (cursor - base) as usize;
            let take = (self.page_size - offset as u64).min((last - cursor).saturating_add(1));

            if let Some(page) = state.touch(base) {
                out.extend_from_slice(&page[offset..offset + take as usize]);
                state.hits += 1;
            } else {
                state.misses += 1;
                match fetch(base, self.page_size)? {
                    ReadResult::Data(data) => {
                        check_length(base, self.page_size, &data)?;
                        out.extend_from_slice(&data[offset..offset + take as usize]);
                        state.insert(base, data, self.max_pages);
                        tracing::trace!("Cached page base={:#x}", base);
                    }
                    ReadResult::Failure { address: bad } => {
                        tracing::trace!("Page base={:#x} unreadable from {:#x}", base, bad);
                        if take == self.page_size {
                            return Err(DebuggerError::UnmappedAddress { address: bad });
                        }
                        // Part of the page may still be readable; ask for just
                        // the slice, without caching it.
                        out.extend_from_slice(&read_exact(&fetch, cursor, take)?);
                    }
                }
            }

            match cursor.checked_add(take) {
                Some(next) if next <= last => cursor = next,
                _ => break,
            }
        }

        Ok(out)
    }
}

fn check_length(address: u64, expected: u64, data: &[u8]) -> Result<()> {
    if data.len() as u64 != expected {
        return Err(TransportError::InvalidResponse(format!(
            "read at {address:#x} returned {} bytes, expected {expected}",
            data.len()
        ))
        .into());
    }
    Ok(())
}

fn read_exact<F>(fetch: &F, address: u64, count: u64) -> Result<Vec<u8>>
where
    F: Fn(u64, u64) -> Result<ReadResult>,
{
    match fetch(address, count)? {
        ReadResult::Data(data) => {
            check_length(address, count, &data)?;
            Ok(data)
        }
        ReadResult::Failure { address } => Err(DebuggerError::UnmappedAddress { address }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::ops::Range;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn mapped_read(
        mapped: Range<u64>,
        address: u64,
        count: u64,
        calls: &RefCell<Vec<(u64, u64)>>,
    ) -> Result<ReadResult> {
        calls.borrow_mut().push((address, count));
        if let Some(bad) = (address..address + count).find(|a| !mapped.contains(a)) {
            return Ok(ReadResult::failure(bad));
        }
        Ok(ReadResult::Data(
            (address..address + count).map(|a| a as u8).collect(),
        ))
    }

    /// Memory mapped at [0x1000, 0x3000); byte value is the low address byte.
    fn backing(address: u64, count: u64, calls: &RefCell<Vec<(u64, u64)>>) -> Result<ReadResult> {
        mapped_read(0x1000..0x3000, address, count, calls)
    }

    #[test]
    fn test_repeated_reads_hit_the_cache() {
        let cache = PageCache::new(0x100, 0x1000);
        let calls = RefCell::new(Vec::new());
        let fetch = |a, n| backing(a, n, &calls);

        let first = cache.read(0x1010, 0x20, fetch).unwrap();
        let second = cache.read(0x1010, 0x20, fetch).unwrap();

        assert_eq!(first, second);
        assert_eq!(first[0], 0x10);
        assert_eq!(calls.borrow().as_slice(), &[(0x1000, 0x100)]);
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.resident_pages), (1, 1, 1));
    }

    #[test]
    fn test_reads_spanning_pages_are_stitched() {
        let cache = PageCache::new(0x100, 0x1000);
        let calls = RefCell::new(Vec::new());

        let bytes = cache.read(0x10F8, 0x10, |a, n| backing(a, n, &calls)).unwrap();

        let expected: Vec<u8> = (0x10F8_u64..0x1108).map(|a| a as u8).collect();
        assert_eq!(bytes, expected);
        assert_eq!(calls.borrow().as_slice(), &[(0x1000, 0x100), (0x1100, 0x100)]);
    }

    #[test]
    fn test_unmapped_page_is_not_cached() {
        let cache = PageCache::new(0x100, 0x1000);
        let calls = RefCell::new(Vec::new());

        let err = cache.read(0x3000, 8, |a, n| backing(a, n, &calls)).unwrap_err();
        assert!(matches!(err, DebuggerError::UnmappedAddress { address: 0x3000 }));
        assert!(!cache.contains(0x3000));
        assert_eq!(cache.stats().resident_pages, 0);
    }

    #[test]
    fn test_partially_readable_page_falls_back_to_exact_read() {
        let cache = PageCache::new(0x100, 0x1000);
        let calls = RefCell::new(Vec::new());
        let fetch = |a, n| mapped_read(0x1080..0x1200, a, n, &calls);

        let bytes = cache.read(0x1090, 0x10, fetch).unwrap();
        assert_eq!(bytes[0], 0x90);
        assert_eq!(calls.borrow().as_slice(), &[(0x1000, 0x100), (0x1090, 0x10)]);
        assert!(!cache.contains(0x1000));

        let err = cache.read(0x1078, 0x10, fetch).unwrap_err();
        assert!(matches!(err, DebuggerError::UnmappedAddress { address: 0x1078 }));
        assert!(!cache.contains(0x1000));
    }

    #[test]
    fn test_lru_eviction_keeps_budget() {
        let cache = PageCache::new(0x100, 0x200);
        let calls = RefCell::new(Vec::new());
        let fetch = |a, n| backing(a, n, &calls);

        cache.read(0x1000, 1, fetch).unwrap();
        cache.read(0x1100, 1, fetch).unwrap();
        cache.read(0x1000, 1, fetch).unwrap();
        cache.read(0x1200, 1, fetch).unwrap();

        assert!(cache.contains(0x1000));
        assert!(!cache.contains(0x1100));
        assert!(cache.contains(0x1200));
        assert_eq!(cache.stats().resident_pages, 2);
    }

    #[test]
    fn test_disabled_cache_reads_through() {
        let cache = PageCache::new(0x100, 0);
        let calls = RefCell::new(Vec::new());
        let fetch = |a, n| backing(a, n, &calls);

        cache.read(0x1000, 4, fetch).unwrap();
        cache.read(0x1000, 4, fetch).unwrap();
        assert_eq!(calls.borrow().as_slice(), &[(0x1000, 4), (0x1000, 4)]);
    }

    #[test]
    fn test_short_page_is_invalid_response() {
        let cache = PageCache::new(0x100, 0x1000);
        let err = cache
            .read(0x1000, 4, |_, _| Ok(ReadResult::Data(vec![0; 4])))
            .unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    fn test_huge_count_fails_at_first_unmapped_page() {
        let cache = PageCache::new(0x100, 0x10000);
        let calls = RefCell::new(Vec::new());

        let err = cache.read(0x1000, 1 << 62, |a, n| backing(a, n, &calls)).unwrap_err();
        assert!(matches!(err, DebuggerError::UnmappedAddress { address: 0x3000 }));
        assert_eq!(calls.borrow().len(), 0x21);
        assert_eq!(cache.stats().resident_pages, 0x20);
    }

    #[test]
    fn test_read_may_end_at_top_of_address_space() {
        let cache = PageCache::new(0x100, 0x1000);
        let calls = RefCell::new(Vec::new());
        let fetch = |a: u64, n: u64| -> Result<ReadResult> {
            calls.borrow_mut().push((a, n));
            Ok(ReadResult::Data(vec![0xAB; n as usize]))
        };

        assert_eq!(cache.read(0xFFFF_FFFF_FFFF_FFF8, 8, fetch).unwrap(), vec![0xAB; 8]);
        assert_eq!(cache.read(0xFFFF_FFFF_FFFF_FF00, 0x100, fetch).unwrap().len(), 0x100);
        assert_eq!(calls.borrow().as_slice(), &[(0xFFFF_FFFF_FFFF_FF00, 0x100)]);

        let err = cache.read(u64::MAX, 2, fetch).unwrap_err();
        assert!(matches!(err, DebuggerError::Target { .. }));
    }

    #[test]
    fn test_concurrent_readers_fetch_a_cold_page_once() {
        let cache = PageCache::new(0x100, 0x1000);
        let fetches = AtomicUsize::new(0);
        let fetch = |a: u64, n: u64| -> Result<ReadResult> {
            fetches.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            Ok(ReadResult::Data((a..a + n).map(|b| b as u8).collect()))
        };

        let results: Vec<Vec<u8>> = std::thread::scope(|s| {
            let readers: Vec<_> = (0..8)
                .map(|_| s.spawn(|| cache.read(0x1010, 0x10, fetch).unwrap()))
                .collect();
            readers.into_iter().map(|r| r.join().unwrap()).collect()
        });

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        let expected: Vec<u8> = (0x10_u8..0x20).collect();
        assert!(results.iter().all(|bytes| *bytes == expected));
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (7, 1));
    }

    #[test]
    fn test_clear_drops_pages() {
        let cache = PageCache::new(0x100, 0x1000);
        let calls = RefCell::new(Vec::new());
        cache.read(0x1000, 4, |a, n| backing(a, n, &calls)).unwrap();
        cache.clear();
        assert!(!cache.contains(0x1000));
    }
}
