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

use std::{
    cell::RefCell,
    ffi::{c_char, c_void},
    mem::offset_of,
    ptr::{addr_of_mut, copy_nonoverlapping},
    slice::from_raw_parts,
};

use ahash::AHashMap;
use log::trace;

use crate::{
    alloc::{pefree, pemalloc},
    types::{ZendRefcounted, ZendUlong, IS_STRING, IS_STR_INTERNED, IS_STR_PERSISTENT},
};

/// A reference-counted, length-prefixed, null-terminated host string.
///
/// The bytes follow the header in the same allocation.
#[repr(C)]
pub struct ZendString {
    pub gc: ZendRefcounted,
    pub h: ZendUlong,
    pub len: usize,
    pub val: [c_char; 1],
}

thread_local! {
    static INTERNED: RefCell<AHashMap<Box<[u8]>, *mut ZendString>> = RefCell::new(AHashMap::new());
}

#[inline(always)]
const fn zend_string_struct_size(len: usize) -> usize {
    offset_of!(ZendString, val) + len + 1
}

/// Returns a pointer to the first byte of the string.
///
/// # Safety
///
/// `s` points to a live string.
#[inline(always)]
pub unsafe fn zstr_val(s: *mut ZendString) -> *mut c_char {
    unsafe { addr_of_mut!((*s).val) as *mut c_char }
}

/// # Safety
///
/// `s` points to a live string.
#[inline(always)]
pub unsafe fn zstr_len(s: *const ZendString) -> usize {
    unsafe { (*s).len }
}

/// Returns the string content without the trailing null byte.
///
/// # Safety
///
/// `s` points to a live string, and the string outlives `'a`.
#[inline(always)]
pub unsafe fn zstr_bytes<'a>(s: *const ZendString) -> &'a [u8] {
    unsafe { from_raw_parts(zstr_val(s as *mut ZendString) as *const u8, (*s).len) }
}

/// # Safety
///
/// `s` points to a live string.
#[inline(always)]
pub unsafe fn zstr_is_interned(s: *const ZendString) -> bool {
    unsafe { (*s).gc.type_info & IS_STR_INTERNED != 0 }
}

/// Allocates a string of `len` bytes with uninitialized content.
///
/// The terminating null byte is not written.
pub fn zend_string_alloc(len: usize, persistent: bool) -> *mut ZendString {
    let string = pemalloc(zend_string_struct_size(len), persistent) as *mut ZendString;

    let flags = match persistent {
        true => IS_STR_PERSISTENT,
        false => 0,
    };

    // Safety: The block is large enough for the header.
    unsafe {
        addr_of_mut!((*string).gc).write(ZendRefcounted::new(IS_STRING, flags));
        addr_of_mut!((*string).h).write(0);
        addr_of_mut!((*string).len).write(len);
    }

    string
}

/// Creates a new string holding a copy of `len` bytes at `str`.
///
/// # Safety
///
/// `str` points to at least `len` readable bytes.
pub unsafe fn zend_string_init(str: *const c_char, len: usize, persistent: bool) -> *mut ZendString {
    let string = zend_string_alloc(len, persistent);

    unsafe {
        let val = zstr_val(string);
        copy_nonoverlapping(str, val, len);
        val.add(len).write(0);
    }

    string
}

/// A safe convenience wrapper over [zend_string_init].
#[inline]
pub fn zend_string_from_bytes(bytes: &[u8], persistent: bool) -> *mut ZendString {
    // Safety: The slice provides `len` readable bytes.
    unsafe { zend_string_init(bytes.as_ptr() as *const c_char, bytes.len(), persistent) }
}

/// Returns a new reference to `s`.
///
/// # Safety
///
/// `s` points to a live string.
#[inline]
pub unsafe fn zend_string_copy(s: *mut ZendString) -> *mut ZendString {
    unsafe {
        if !zstr_is_interned(s) {
            (*s).gc.refcount += 1;
        }
    }

    s
}

/// Returns an independent copy of `s`, unless `s` is interned.
///
/// # Safety
///
/// `s` points to a live string.
pub unsafe fn zend_string_dup(s: *mut ZendString, persistent: bool) -> *mut ZendString {
    unsafe {
        if zstr_is_interned(s) {
            return s;
        }

        zend_string_init(zstr_val(s), (*s).len, persistent)
    }
}

/// Returns the number of references to `s`. Interned strings always report 1.
///
/// # Safety
///
/// `s` points to a live string.
#[inline]
pub unsafe fn zend_string_refcount(s: *const ZendString) -> u32 {
    unsafe {
        match zstr_is_interned(s) {
            true => 1,
            false => (*s).gc.refcount,
        }
    }
}

/// Drops one reference to `s`, releasing the string when no references
/// remain. Interned strings are not affected.
///
/// # Safety
///
/// `s` points to a live string and the caller owns the dropped reference.
pub unsafe fn zend_string_release(s: *mut ZendString) {
    unsafe {
        if zstr_is_interned(s) {
            return;
        }

        (*s).gc.refcount -= 1;

        if (*s).gc.refcount == 0 {
            let persistent = (*s).gc.type_info & IS_STR_PERSISTENT != 0;
            pefree(s as *mut c_void, persistent);
        }
    }
}

/// Same as [zend_string_release], with the persistence provided by the
/// caller.
///
/// Available on hosts 7.3 and newer.
///
/// # Safety
///
/// See [zend_string_release].
pub unsafe fn zend_string_release_ex(s: *mut ZendString, persistent: bool) {
    unsafe {
        if zstr_is_interned(s) {
            return;
        }

        (*s).gc.refcount -= 1;

        if (*s).gc.refcount == 0 {
            pefree(s as *mut c_void, persistent);
        }
    }
}

/// Computes the DJB "times 33" hash of `bytes` with the high bit set, so a
/// computed hash is never zero.
pub fn zend_inline_hash_func(bytes: &[u8]) -> ZendUlong {
    let mut hash: ZendUlong = 5381;

    for byte in bytes {
        hash = hash.wrapping_mul(33).wrapping_add(*byte as ZendUlong);
    }

    hash | 0x8000_0000_0000_0000
}

/// Returns the cached hash of `s`, computing it on first use.
///
/// # Safety
///
/// `s` points to a live string.
pub unsafe fn zend_string_hash_val(s: *mut ZendString) -> ZendUlong {
    unsafe {
        if (*s).h == 0 {
            (*s).h = zend_inline_hash_func(zstr_bytes(s));
        }

        (*s).h
    }
}

/// # Safety
///
/// Both pointers refer to live strings.
pub unsafe fn zend_string_equals(first: *const ZendString, second: *const ZendString) -> bool {
    unsafe { first == second || zstr_bytes(first) == zstr_bytes(second) }
}

/// Returns a lowercased copy of `s`, or a new reference to `s` when it is
/// already lowercase.
///
/// # Safety
///
/// `s` points to a live string.
pub unsafe fn zend_string_tolower(s: *mut ZendString) -> *mut ZendString {
    unsafe {
        let bytes = zstr_bytes(s);

        if !bytes.iter().any(u8::is_ascii_uppercase) {
            return zend_string_copy(s);
        }

        zend_string_from_bytes(&bytes.to_ascii_lowercase(), false)
    }
}

/// Interns `str`.
///
/// Ownership of `str` is consumed. If an equal string is interned already,
/// `str` is released and the existing string is returned. Otherwise a
/// persistent interned copy is created and `str` is released.
///
/// # Safety
///
/// `str` points to a live string owned by the caller.
pub unsafe fn zend_new_interned_string(str: *mut ZendString) -> *mut ZendString {
    unsafe {
        if zstr_is_interned(str) {
            return str;
        }

        let interned = intern_bytes(zstr_bytes(str));

        zend_string_release(str);

        interned
    }
}

/// Returns the interned string with the given content, creating it when
/// necessary.
///
/// Available on hosts 7.3 and newer.
///
/// # Safety
///
/// `str` points to at least `len` readable bytes.
pub unsafe fn zend_string_init_interned(
    str: *const c_char,
    len: usize,
    _persistent: bool,
) -> *mut ZendString {
    unsafe { intern_bytes(from_raw_parts(str as *const u8, len)) }
}

/// Returns the interned empty string.
#[inline]
pub fn zend_empty_string() -> *mut ZendString {
    intern_bytes(b"")
}

/// Returns the number of strings interned on this thread.
pub fn interned_strings_count() -> usize {
    INTERNED.with_borrow(|interned| interned.len())
}

fn intern_bytes(bytes: &[u8]) -> *mut ZendString {
    if let Some(existing) = INTERNED.with_borrow(|interned| interned.get(bytes).copied()) {
        return existing;
    }

    let string = zend_string_from_bytes(bytes, true);

    // Safety: The string was just created.
    unsafe {
        (*string).gc.type_info |= IS_STR_INTERNED;
        let _ = zend_string_hash_val(string);
    }

    trace!("interned {:?}", String::from_utf8_lossy(bytes));

    INTERNED.with_borrow_mut(|interned| interned.insert(bytes.into(), string));

    string
}

pub(crate) fn interned_strings_shutdown() -> usize {
    let strings = INTERNED.with_borrow_mut(std::mem::take);
    let count = strings.len();

    for (_, string) in strings {
        // Safety: Interned strings are persistent allocations owned by the table.
        unsafe { pefree(string as *mut c_void, true) }
    }

    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::{heap_stats, is_live_block};

    #[test]
    fn test_string_init_is_null_terminated() {
        let string = zend_string_from_bytes(b"hello", false);

        unsafe {
            assert_eq!(zstr_len(string), 5);
            assert_eq!(zstr_bytes(string), b"hello");
            assert_eq!(*zstr_val(string).add(5), 0);
            assert_eq!(zend_string_refcount(string), 1);

            zend_string_release(string);
        }
    }

    #[test]
    fn test_string_refcounting() {
        let before = heap_stats();
        let string = zend_string_from_bytes(b"shared", false);

        unsafe {
            let copy = zend_string_copy(string);
            assert_eq!(copy, string);
            assert_eq!(zend_string_refcount(string), 2);

            zend_string_release(copy);
            assert_eq!(zend_string_refcount(string), 1);
            assert!(is_live_block(string as *const c_void));

            zend_string_release(string);
        }

        assert_eq!(heap_stats().request_blocks, before.request_blocks);
    }

    #[test]
    fn test_interning_deduplicates() {
        let first = zend_string_from_bytes(b"Interned", false);
        let second = zend_string_from_bytes(b"Interned", false);

        unsafe {
            let first = zend_new_interned_string(first);
            let second = zend_new_interned_string(second);

            assert_eq!(first, second);
            assert!(zstr_is_interned(first));
            assert_eq!(zend_string_refcount(first), 1);

            let third = zend_string_init_interned(b"Interned".as_ptr() as *const c_char, 8, true);
            assert_eq!(third, first);

            zend_string_release(first);
            assert!(is_live_block(first as *const c_void));
        }
    }

    #[test]
    fn test_tolower() {
        let string = zend_string_from_bytes(b"FooBar", false);

        unsafe {
            let lower = zend_string_tolower(string);
            assert_eq!(zstr_bytes(lower), b"foobar");

            zend_string_release(lower);
            zend_string_release(string);
        }
    }

    #[test]
    fn test_hash_is_cached_and_nonzero() {
        let string = zend_string_from_bytes(b"", false);

        unsafe {
            let hash = zend_string_hash_val(string);
            assert_ne!(hash, 0);
            assert_eq!((*string).h, hash);

            zend_string_release(string);
        }
    }
}
