//! Aligned slab allocator for tile cell buffers.
//!
//! Memory is requested from the system in superblocks, each one sliced into
//! `superblock_len` sub-blocks of `sub_block_size` bytes whose start addresses
//! are multiples of `TILE_ALIGN`. Every superblock counts its issued
//! sub-blocks; once the count drops to zero the superblock is handed back to
//! the system, except when it is the only one left.

use std::alloc::{self, Layout};
use std::fmt;
use std::ptr::NonNull;

/// Alignment (in bytes) of every buffer the slab hands out.
pub const TILE_ALIGN: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct SuperblockId(u32);

/// A zeroed, `TILE_ALIGN`-aligned sub-block issued by a [`SlabAllocator`].
///
/// The handle is the only way to reach its memory and is consumed by
/// [`SlabAllocator::free`], so an issued sub-block never has two owners.
pub struct AlignedBuffer {
    ptr: NonNull<u8>,
    len: usize,
    superblock: SuperblockId,
    slot: u32,
}

// SAFETY: the handle is the unique owner of its sub-block until it is returned
// to the slab, and the slab never touches issued memory.
unsafe impl Send for AlignedBuffer {}
unsafe impl Sync for AlignedBuffer {}

impl AlignedBuffer {
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline(always)]
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    #[inline(always)]
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: `ptr..ptr+len` lies inside a live superblock. Superblocks with
        // issued sub-blocks are never deallocated (see `Drop for SlabAllocator`).
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    #[inline(always)]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above, and `&mut self` guarantees exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl fmt::Debug for AlignedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlignedBuffer")
            .field("ptr", &format_args!("{:#x}", self.ptr.as_ptr() as usize))
            .field("len", &self.len)
            .field("superblock", &self.superblock.0)
            .field("slot", &self.slot)
            .finish()
    }
}

struct Superblock {
    id: SuperblockId,
    /// Start of the raw system allocation.
    base: NonNull<u8>,
    /// First `TILE_ALIGN` boundary at or after `base`.
    aligned: NonNull<u8>,
    layout: Layout,
    refcount: usize,
    /// One bit per sub-block, set while the sub-block is issued.
    issued_bits: Vec<u64>,
}

impl Superblock {
    #[inline(always)]
    fn is_issued(&self, slot: usize) -> bool {
        (self.issued_bits[slot >> 6] >> (slot & 63)) & 1 == 1
    }

    #[inline(always)]
    fn set_issued(&mut self, slot: usize, issued: bool) {
        let bit = 1u64 << (slot & 63);
        if issued {
            self.issued_bits[slot >> 6] |= bit;
        } else {
            self.issued_bits[slot >> 6] &= !bit;
        }
    }
}

/// Fixed-size, aligned buffer pool backed by reference-counted superblocks.
///
/// Not synchronised: `allocate` and `free` take `&mut self`.
pub struct SlabAllocator {
    sub_block_size: usize,
    superblock_len: usize,
    superblocks: Vec<Superblock>,
    free_list: Vec<(SuperblockId, u32)>,
    next_id: u32,
    issued: usize,
}

// SAFETY: the slab exclusively owns its superblocks; moving it to another
// thread moves that ownership with it.
unsafe impl Send for SlabAllocator {}

impl SlabAllocator {
    /// Create an empty slab. No memory is reserved until the first `allocate`.
    ///
    /// Panics unless `sub_block_size` is a positive multiple of `TILE_ALIGN`
    /// and `superblock_len` is positive.
    pub fn new(sub_block_size: usize, superblock_len: usize) -> Self {
        assert!(
            sub_block_size > 0 && sub_block_size % TILE_ALIGN == 0,
            "sub-block size {sub_block_size} must be a positive multiple of {TILE_ALIGN}"
        );
        assert!(superblock_len > 0, "superblock length must be positive");
        assert!(
            superblock_len <= u32::MAX as usize,
            "superblock length {superblock_len} exceeds slot index range"
        );
        Self {
            sub_block_size,
            superblock_len,
            superblocks: Vec::new(),
            free_list: Vec::new(),
            next_id: 0,
            issued: 0,
        }
    }

    #[inline]
    pub fn sub_block_size(&self) -> usize {
        self.sub_block_size
    }

    #[inline]
    pub fn superblock_count(&self) -> usize {
        self.superblocks.len()
    }

    /// Number of buffers currently issued.
    #[inline]
    pub fn issued(&self) -> usize {
        self.issued
    }

    #[inline]
    pub fn free_len(&self) -> usize {
        self.free_list.len()
    }

    /// Hand out a zeroed sub-block, slicing a fresh superblock if none is free.
    pub fn allocate(&mut self) -> AlignedBuffer {
        let (id, slot) = match self.free_list.pop() {
            Some(entry) => entry,
            None => self.grow(),
        };
        let size = self.sub_block_size;
        let sb = self.superblock_mut(id);
        debug_assert!(!sb.is_issued(slot as usize));
        sb.set_issued(slot as usize, true);
        sb.refcount += 1;
        // SAFETY: `slot < superblock_len`, so the sub-block lies inside the
        // superblock's aligned region.
        let ptr = unsafe { sb.aligned.add(slot as usize * size) };
        // Recycled sub-blocks still carry the previous owner's cells.
        unsafe {
            std::ptr::write_bytes(ptr.as_ptr(), 0, size);
        }
        self.issued += 1;
        AlignedBuffer {
            ptr,
            len: size,
            superblock: id,
            slot,
        }
    }

    /// Return a buffer to the pool.
    ///
    /// Panics if the buffer was not issued by this slab.
    pub fn free(&mut self, buffer: AlignedBuffer) {
        let addr = buffer.ptr.as_ptr() as usize;
        let size = self.sub_block_size;
        let Some(pos) = self
            .superblocks
            .iter()
            .position(|sb| sb.id == buffer.superblock)
        else {
            panic!("freed buffer {addr:#x} was not issued by this slab");
        };

        let slot = buffer.slot as usize;
        let sb = &mut self.superblocks[pos];
        let expected = sb.aligned.as_ptr() as usize + slot * size;
        assert!(
            slot < self.superblock_len && expected == addr && sb.is_issued(slot),
            "freed buffer {addr:#x} was not issued by this slab"
        );
        sb.set_issued(slot, false);
        sb.refcount -= 1;
        self.issued -= 1;

        if sb.refcount == 0 && self.superblocks.len() > 1 {
            self.release_superblock(pos);
        } else {
            self.free_list.push((buffer.superblock, buffer.slot));
        }
    }

    fn superblock_mut(&mut self, id: SuperblockId) -> &mut Superblock {
        self.superblocks
            .iter_mut()
            .find(|sb| sb.id == id)
            .unwrap_or_else(|| panic!("slab free list references unknown superblock {}", id.0))
    }

    /// Allocate and slice a new superblock. Returns the first slot; the rest go
    /// on the free list so that subsequent pops walk upward through memory.
    fn grow(&mut self) -> (SuperblockId, u32) {
        let length = self
            .sub_block_size
            .checked_mul(self.superblock_len)
            .and_then(|len| len.checked_add(TILE_ALIGN - 1))
            .unwrap_or_else(|| panic!("superblock size overflows usize"));
        let layout = Layout::from_size_align(length, 1)
            .unwrap_or_else(|err| panic!("invalid superblock layout: {err}"));

        // SAFETY: `layout` has non-zero size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let Some(base) = NonNull::new(raw) else {
            alloc::handle_alloc_error(layout);
        };
        let misalign = base.as_ptr() as usize & (TILE_ALIGN - 1);
        let offset = (TILE_ALIGN - misalign) & (TILE_ALIGN - 1);
        // SAFETY: `offset < TILE_ALIGN` and the allocation was padded by
        // `TILE_ALIGN - 1` bytes.
        let aligned = unsafe { base.add(offset) };
        debug_assert_eq!(aligned.as_ptr() as usize % TILE_ALIGN, 0);

        let id = SuperblockId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.superblocks.push(Superblock {
            id,
            base,
            aligned,
            layout,
            refcount: 0,
            issued_bits: vec![0; self.superblock_len.div_ceil(64)],
        });
        self.free_list
            .extend((1..self.superblock_len as u32).rev().map(|slot| (id, slot)));
        log::debug!(
            "slab: allocated superblock {} ({} x {} bytes, {} live)",
            id.0,
            self.superblock_len,
            self.sub_block_size,
            self.superblocks.len()
        );
        (id, 0)
    }

    fn release_superblock(&mut self, pos: usize) {
        let sb = self.superblocks.swap_remove(pos);
        debug_assert_eq!(sb.refcount, 0);
        self.free_list.retain(|&(id, _)| id != sb.id);
        // SAFETY: `base` came from `alloc_zeroed(layout)` and nothing issued
        // from this superblock is still alive.
        unsafe { alloc::dealloc(sb.base.as_ptr(), sb.layout) };
        log::debug!(
            "slab: released superblock {} ({} live)",
            sb.id.0,
            self.superblocks.len()
        );
    }
}

impl Drop for SlabAllocator {
    fn drop(&mut self) {
        for sb in self.superblocks.drain(..) {
            if sb.refcount != 0 {
                log::warn!(
                    "slab dropped with {} buffers still issued from superblock {}; leaking it",
                    sb.refcount,
                    sb.id.0
                );
                continue;
            }
            // SAFETY: see `release_superblock`.
            unsafe { alloc::dealloc(sb.base.as_ptr(), sb.layout) };
        }
    }
}
