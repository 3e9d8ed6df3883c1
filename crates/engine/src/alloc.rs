////////////////////////////////////////////////////////////////////////////////
// This file is part of "Zend Compat", a version-stable compatibility         //
// layer over the Zend engine's macro surface.                                //
//                                                                            //
// This work is proprietary software with source-available code.              //
//                                                                            //
// To copy, use, distribute, or contribute to this work, you must agree to    //
// the terms of the General License Agreement distributed with this work.     //
//                                                                            //
// The agreement grants a Basic Commercial License, allowing you to use       //
// this work in non-commercial and limited commercial products with a total   //
// gross revenue cap. To remove this commercial limit for one of your         //
// products, you must acquire a Full Commercial License.                      //
//                                                                            //
// If you contribute to the source code, documentation, or related materials, //
// you must grant me an exclusive license to these contributions.             //
// Contributions are governed by the "Contributions" section of the General   //
// License Agreement.                                                         //
//                                                                            //
// Copying the work in parts is strictly forbidden, except as permitted       //
// under the General License Agreement.                                       //
//                                                                            //
// If you do not or cannot agree to the terms of this Agreement,              //
// do not use this work.                                                      //
//                                                                            //
// This work is provided "as is", without any warranties, express or implied, //
// except where such disclaimers are legally invalid.                         //
//                                                                            //
// Copyright (c) 2024 Ilya Lakhin (Илья Александрович Лахин).                 //
// All rights reserved.                                                       //
////////////////////////////////////////////////////////////////////////////////

//! The host's memory manager.
//!
//! Every block handed out by [emalloc] and friends is registered in a
//! per-thread registry, so releasing a block twice, or releasing memory the
//! manager never handed out, is detected and treated as a fatal error.
//! The registry also provides the accounting used by leak checks.

use std::{
    alloc::{alloc, alloc_zeroed, dealloc, realloc, Layout},
    cell::RefCell,
    ffi::c_void,
    ptr::null_mut,
};

use ahash::AHashMap;
use log::trace;

use crate::report::system_panic;

const ALIGNMENT: usize = 16;

thread_local! {
    static HEAP: RefCell<Heap> = RefCell::new(Heap::default());
}

/// A snapshot of the memory manager counters of the current thread.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// The number of live request-bound (non-persistent) blocks.
    pub request_blocks: usize,

    /// The total size of the live request-bound blocks in bytes.
    pub request_bytes: usize,

    /// The number of live persistent blocks.
    pub persistent_blocks: usize,

    /// The total size of the live persistent blocks in bytes.
    pub persistent_bytes: usize,

    /// The number of allocations served since the thread started.
    pub allocations: usize,
}

#[derive(Default)]
struct Heap {
    blocks: AHashMap<usize, Block>,
    stats: HeapStats,
}

#[derive(Clone, Copy)]
struct Block {
    size: usize,
    persistent: bool,
}

impl Heap {
    fn register(&mut self, address: usize, size: usize, persistent: bool) {
        if self
            .blocks
            .insert(address, Block { size, persistent })
            .is_some()
        {
            system_panic!("Memory block {address:#x} registered twice.");
        }

        self.stats.allocations += 1;

        match persistent {
            true => {
                self.stats.persistent_blocks += 1;
                self.stats.persistent_bytes += size;
            }

            false => {
                self.stats.request_blocks += 1;
                self.stats.request_bytes += size;
            }
        }
    }

    fn deregister(&mut self, address: usize) -> Block {
        let Some(block) = self.blocks.remove(&address) else {
            system_panic!("Attempt to free unknown or already released memory block {address:#x}.");
        };

        match block.persistent {
            true => {
                self.stats.persistent_blocks -= 1;
                self.stats.persistent_bytes -= block.size;
            }

            false => {
                self.stats.request_blocks -= 1;
                self.stats.request_bytes -= block.size;
            }
        }

        block
    }
}

#[inline(always)]
fn layout_of(size: usize) -> Layout {
    match Layout::from_size_align(size.max(1), ALIGNMENT) {
        Ok(layout) => layout,
        Err(_) => system_panic!("Possible integer overflow in memory allocation ({size})."),
    }
}

/// Allocates `size` bytes of request-bound memory.
///
/// The content of the block is uninitialized.
#[inline(always)]
pub fn emalloc(size: usize) -> *mut c_void {
    pemalloc(size, false)
}

/// Allocates `size` bytes, either request-bound or persistent.
pub fn pemalloc(size: usize, persistent: bool) -> *mut c_void {
    let layout = layout_of(size);

    // Safety: Layout size is non-zero.
    let block = unsafe { alloc(layout) };

    if block.is_null() {
        system_panic!("Out of memory (tried to allocate {size} bytes).");
    }

    HEAP.with_borrow_mut(|heap| heap.register(block as usize, size, persistent));

    block as *mut c_void
}

/// Allocates a zero-filled array of `nmemb` items of `size` bytes each.
pub fn ecalloc(nmemb: usize, size: usize) -> *mut c_void {
    pecalloc(nmemb, size, false)
}

pub fn pecalloc(nmemb: usize, size: usize, persistent: bool) -> *mut c_void {
    let Some(total) = nmemb.checked_mul(size) else {
        system_panic!("Possible integer overflow in memory allocation ({nmemb} * {size}).");
    };

    let layout = layout_of(total);

    // Safety: Layout size is non-zero.
    let block = unsafe { alloc_zeroed(layout) };

    if block.is_null() {
        system_panic!("Out of memory (tried to allocate {total} bytes).");
    }

    HEAP.with_borrow_mut(|heap| heap.register(block as usize, total, persistent));

    block as *mut c_void
}

/// Resizes a block previously returned by this memory manager.
///
/// A null `ptr` behaves like [pemalloc]. The block keeps its persistence.
///
/// # Safety
///
/// `ptr` is null or a live block of this thread's memory manager.
pub unsafe fn erealloc(ptr: *mut c_void, size: usize) -> *mut c_void {
    if ptr.is_null() {
        return emalloc(size);
    }

    let block = HEAP.with_borrow_mut(|heap| heap.deregister(ptr as usize));

    // Safety: The block was allocated with the same layout rules.
    let resized = unsafe { realloc(ptr as *mut u8, layout_of(block.size), size.max(1)) };

    if resized.is_null() {
        system_panic!("Out of memory (tried to allocate {size} bytes).");
    }

    HEAP.with_borrow_mut(|heap| heap.register(resized as usize, size, block.persistent));

    resized as *mut c_void
}

/// Releases a block previously returned by this memory manager.
///
/// Releasing a null pointer is a no-op. Releasing an unknown or already
/// released block is fatal.
///
/// # Safety
///
/// The block must not be used after the call.
pub unsafe fn efree(ptr: *mut c_void) {
    if ptr.is_null() {
        return;
    }

    let block = HEAP.with_borrow_mut(|heap| heap.deregister(ptr as usize));

    trace!("efree {ptr:p} ({} bytes)", block.size);

    // Safety: The block was registered, so it was allocated with this layout.
    unsafe { dealloc(ptr as *mut u8, layout_of(block.size)) }
}

/// Same as [efree]. The persistence of a block is tracked by the memory
/// manager, the flag is accepted for signature compatibility only.
///
/// # Safety
///
/// See [efree].
#[inline(always)]
pub unsafe fn pefree(ptr: *mut c_void, _persistent: bool) {
    unsafe { efree(ptr) }
}

/// Returns the counters of the current thread's memory manager.
#[inline]
pub fn heap_stats() -> HeapStats {
    HEAP.with_borrow(|heap| heap.stats)
}

/// Returns true if `ptr` is the start of a live block.
#[inline]
pub fn is_live_block(ptr: *const c_void) -> bool {
    HEAP.with_borrow(|heap| heap.blocks.contains_key(&(ptr as usize)))
}

/// Returns the requested size of a live block.
pub fn block_size(ptr: *const c_void) -> Option<usize> {
    HEAP.with_borrow(|heap| heap.blocks.get(&(ptr as usize)).map(|block| block.size))
}

pub(crate) fn request_block_addresses() -> Vec<usize> {
    HEAP.with_borrow(|heap| {
        heap.blocks
            .iter()
            .filter(|(_, block)| !block.persistent)
            .map(|(address, _)| *address)
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_accounting() {
        let before = heap_stats();

        let first = emalloc(10);
        let second = pemalloc(20, true);

        let during = heap_stats();

        assert_eq!(during.request_blocks, before.request_blocks + 1);
        assert_eq!(during.request_bytes, before.request_bytes + 10);
        assert_eq!(during.persistent_blocks, before.persistent_blocks + 1);
        assert!(is_live_block(first));
        assert_eq!(block_size(second), Some(20));

        unsafe {
            efree(first);
            pefree(second, true);
        }

        let after = heap_stats();

        assert_eq!(after.request_blocks, before.request_blocks);
        assert_eq!(after.persistent_blocks, before.persistent_blocks);
        assert!(!is_live_block(first));
    }

    #[test]
    fn test_ecalloc_zeroes() {
        let block = ecalloc(4, 8) as *mut u8;

        let bytes = unsafe { std::slice::from_raw_parts(block, 32) };
        assert!(bytes.iter().all(|byte| *byte == 0));

        unsafe { efree(block as *mut c_void) }
    }

    #[test]
    fn test_erealloc_keeps_content() {
        let block = emalloc(4) as *mut u8;

        unsafe {
            block.copy_from_nonoverlapping(b"abcd".as_ptr(), 4);

            let block = erealloc(block as *mut c_void, 64) as *mut u8;

            assert_eq!(std::slice::from_raw_parts(block, 4), b"abcd");
            assert_eq!(block_size(block as *const c_void), Some(64));

            efree(block as *mut c_void);
        }
    }

    #[test]
    #[should_panic(expected = "already released")]
    fn test_double_free_is_fatal() {
        let block = emalloc(8);

        unsafe {
            efree(block);
            efree(block);
        }
    }

    #[test]
    fn test_null_free_is_noop() {
        let before = heap_stats();
        unsafe { efree(null_mut()) }
        assert_eq!(heap_stats(), before);
    }
}
