//! # Pool Allocator
//!
//! Chunked free-list allocator for fixed-size blocks.
//!
//! Allocation and construction are separate steps: a block is first
//! reserved, then a value is constructed into it. Destructing a value keeps
//! the block reserved, so the owner can construct into the same memory
//! again later without going back to the allocator.

/// State of one block in the pool.
enum Block<T> {
    /// On the free list.
    Free,
    /// Handed out. `None` until a value is constructed into it.
    Reserved(Option<T>),
}

/// A pool allocator for fixed-size objects, growing one chunk at a time.
///
/// Blocks are never moved once reserved: a [`PoolHandle`] stays valid until
/// it is passed to [`PoolAllocator::free`].
///
/// # Thread Safety
///
/// This pool is NOT thread-safe. It is owned by exactly one component
/// storage, which is mutated by the single tick writer.
///
/// # Example
///
/// ```rust,ignore
/// let mut pool: PoolAllocator<Transform> = PoolAllocator::new(256);
///
/// let handle = pool.allocate();
/// pool.construct(handle, Transform::default());
///
/// // Destruct but keep the block for the next construct.
/// pool.destruct(handle);
///
/// // Give the block back.
/// pool.free(handle);
/// ```
pub struct PoolAllocator<T> {
    /// Block storage, `chunk_size` blocks per chunk.
    blocks: Vec<Block<T>>,
    /// Free list - indices of available blocks.
    free_list: Vec<usize>,
    /// Number of blocks reserved per growth step.
    chunk_size: usize,
    /// Number of reserved blocks.
    allocated_count: usize,
    /// Number of reserved blocks holding a constructed value.
    live_count: usize,
}

/// Handle to a reserved block in a pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PoolHandle {
    /// Index into the pool.
    index: usize,
}

impl PoolHandle {
    /// Returns the block index inside the pool.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.index
    }
}

impl<T> PoolAllocator<T> {
    /// Creates an empty pool. No chunk is reserved until the first allocation.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` - Number of blocks reserved each time the pool grows
    ///
    /// # Panics
    ///
    /// Panics if `chunk_size` is zero.
    #[must_use]
    pub fn new(chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "Chunk size must be greater than zero");

        Self {
            blocks: Vec::new(),
            free_list: Vec::new(),
            chunk_size,
            allocated_count: 0,
            live_count: 0,
        }
    }

    /// Creates a pool with enough whole chunks to hold `capacity` blocks.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_size` is zero.
    #[must_use]
    pub fn with_capacity(chunk_size: usize, capacity: usize) -> Self {
        let mut pool = Self::new(chunk_size);
        while pool.capacity() < capacity {
            pool.grow();
        }
        pool
    }

    /// Returns the total number of blocks across all chunks.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.blocks.len()
    }

    /// Returns the number of blocks reserved per chunk.
    #[inline]
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Returns the number of chunks reserved so far.
    #[inline]
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.blocks.len() / self.chunk_size
    }

    /// Returns the number of reserved blocks.
    #[inline]
    #[must_use]
    pub const fn allocated_count(&self) -> usize {
        self.allocated_count
    }

    /// Returns the number of blocks holding a constructed value.
    #[inline]
    #[must_use]
    pub const fn live_count(&self) -> usize {
        self.live_count
    }

    /// Returns the number of free blocks.
    #[inline]
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.capacity() - self.allocated_count
    }

    /// Reserves a block, growing the pool by one chunk if none is free.
    ///
    /// The block holds no value until [`PoolAllocator::construct`] is called.
    pub fn allocate(&mut self) -> PoolHandle {
        if self.free_list.is_empty() {
            self.grow();
        }
        // grow() always leaves at least one free index behind
        let index = self.free_list.pop().unwrap_or_default();

        self.blocks[index] = Block::Reserved(None);
        self.allocated_count += 1;

        PoolHandle { index }
    }

    /// Constructs `value` in place inside a reserved block.
    ///
    /// # Panics
    ///
    /// Panics if the block is not reserved, or already holds a value.
    pub fn construct(&mut self, handle: PoolHandle, value: T) -> &mut T {
        match &mut self.blocks[handle.index] {
            Block::Reserved(slot) => {
                assert!(slot.is_none(), "construct into an occupied block {}", handle.index);
                self.live_count += 1;
                slot.insert(value)
            }
            Block::Free => panic!("construct into free block {}", handle.index),
        }
    }

    /// Destructs the value in a block, keeping the block reserved.
    ///
    /// Returns the value, or `None` if nothing was constructed there.
    pub fn destruct(&mut self, handle: PoolHandle) -> Option<T> {
        match self.blocks.get_mut(handle.index) {
            Some(Block::Reserved(slot)) => {
                let value = slot.take();
                if value.is_some() {
                    self.live_count -= 1;
                }
                value
            }
            _ => None,
        }
    }

    /// Destructs any value in the block and returns the block to the free list.
    ///
    /// Returns the value that was still constructed, if any.
    pub fn free(&mut self, handle: PoolHandle) -> Option<T> {
        let block = self.blocks.get_mut(handle.index)?;
        let Block::Reserved(value) = std::mem::replace(block, Block::Free) else {
            return None;
        };

        self.allocated_count -= 1;
        if value.is_some() {
            self.live_count -= 1;
        }
        self.free_list.push(handle.index);

        value
    }

    /// Returns `true` if the block holds a constructed value.
    #[inline]
    #[must_use]
    pub fn is_constructed(&self, handle: PoolHandle) -> bool {
        matches!(self.blocks.get(handle.index), Some(Block::Reserved(Some(_))))
    }

    /// Gets a reference to a constructed value.
    #[inline]
    #[must_use]
    pub fn get(&self, handle: PoolHandle) -> Option<&T> {
        match self.blocks.get(handle.index)? {
            Block::Reserved(slot) => slot.as_ref(),
            Block::Free => None,
        }
    }

    /// Gets a mutable reference to a constructed value.
    #[inline]
    pub fn get_mut(&mut self, handle: PoolHandle) -> Option<&mut T> {
        match self.blocks.get_mut(handle.index)? {
            Block::Reserved(slot) => slot.as_mut(),
            Block::Free => None,
        }
    }

    /// Drops every value and frees every block. Chunks stay reserved.
    pub fn clear(&mut self) {
        for block in &mut self.blocks {
            *block = Block::Free;
        }
        self.free_list.clear();
        self.free_list.extend((0..self.blocks.len()).rev());
        self.allocated_count = 0;
        self.live_count = 0;
    }

    /// Iterates over all constructed values.
    pub fn iter(&self) -> impl Iterator<Item = (PoolHandle, &T)> {
        self.blocks.iter().enumerate().filter_map(|(index, block)| match block {
            Block::Reserved(Some(value)) => Some((PoolHandle { index }, value)),
            _ => None,
        })
    }

    /// Reserves one more chunk and pushes its blocks onto the free list.
    fn grow(&mut self) {
        let start = self.blocks.len();
        let end = start + self.chunk_size;

        self.blocks.reserve_exact(self.chunk_size);
        self.blocks.extend((start..end).map(|_| Block::Free));

        // Lowest index on top so blocks are handed out in address order.
        self.free_list.extend((start..end).rev());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_grows_by_chunk() {
        let mut pool: PoolAllocator<u32> = PoolAllocator::new(4);
        assert_eq!(pool.capacity(), 0);

        let h = pool.allocate();
        assert_eq!(pool.capacity(), 4);
        assert_eq!(pool.chunk_count(), 1);
        assert_eq!(h.index(), 0);

        for _ in 0..4 {
            let _ = pool.allocate();
        }
        assert_eq!(pool.chunk_count(), 2);
        assert_eq!(pool.allocated_count(), 5);
    }

    #[test]
    fn test_pool_construct_destruct_keeps_block() {
        let mut pool: PoolAllocator<String> = PoolAllocator::new(8);

        let h = pool.allocate();
        pool.construct(h, "first".to_string());
        assert!(pool.is_constructed(h));
        assert_eq!(pool.live_count(), 1);

        let old = pool.destruct(h);
        assert_eq!(old.as_deref(), Some("first"));
        assert!(!pool.is_constructed(h));
        assert_eq!(pool.allocated_count(), 1);
        assert_eq!(pool.live_count(), 0);

        pool.construct(h, "second".to_string());
        assert_eq!(pool.get(h).map(String::as_str), Some("second"));
        assert_eq!(pool.allocated_count(), 1);
    }

    #[test]
    fn test_pool_free_reuses_block() {
        let mut pool: PoolAllocator<u32> = PoolAllocator::new(1);

        let h1 = pool.allocate();
        pool.construct(h1, 1);
        assert_eq!(pool.free(h1), Some(1));

        let h2 = pool.allocate();
        assert_eq!(h1, h2);
        assert_eq!(pool.capacity(), 1);
        assert!(pool.get(h2).is_none());
    }

    #[test]
    fn test_pool_double_free_is_ignored() {
        let mut pool: PoolAllocator<u32> = PoolAllocator::new(2);
        let h = pool.allocate();
        assert!(pool.free(h).is_none());
        assert!(pool.free(h).is_none());
        assert_eq!(pool.free_count(), 2);
    }

    #[test]
    #[should_panic(expected = "occupied")]
    fn test_pool_construct_twice_panics() {
        let mut pool: PoolAllocator<u32> = PoolAllocator::new(2);
        let h = pool.allocate();
        pool.construct(h, 1);
        pool.construct(h, 2);
    }

    #[test]
    fn test_pool_clear_keeps_chunks() {
        let mut pool: PoolAllocator<u32> = PoolAllocator::with_capacity(4, 6);
        assert_eq!(pool.capacity(), 8);

        let h = pool.allocate();
        pool.construct(h, 9);
        pool.clear();

        assert_eq!(pool.capacity(), 8);
        assert_eq!(pool.allocated_count(), 0);
        assert_eq!(pool.live_count(), 0);
        assert_eq!(pool.iter().count(), 0);
    }
}
