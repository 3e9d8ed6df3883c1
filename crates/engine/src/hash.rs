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
    ffi::{c_char, c_void},
    mem::size_of,
    ptr::{addr_of_mut, null_mut},
    slice::{from_raw_parts, from_raw_parts_mut},
};

use ahash::AHashMap;

use crate::{
    alloc::{emalloc, erealloc, pefree, pemalloc},
    string::{zend_string_from_bytes, zend_string_hash_val, zend_string_release, zstr_bytes, ZendString},
    types::{
        ZendLong, ZendRefcounted, ZendResultCode, ZendUlong, Zval, FAILURE, GC_PERSISTENT,
        IS_ARRAY, IS_INDIRECT, IS_PTR, IS_UNDEF, SUCCESS, ZEND_LONG_MAX,
    },
    values::{zval_ptr_dtor, DtorFunc},
};

pub const HT_MIN_SIZE: u32 = 8;

/// One slot of a hash table. Deleted slots keep their position with an
/// `IS_UNDEF` value until the table runs out of slots and is compacted.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct Bucket {
    pub val: Zval,
    pub h: ZendUlong,
    pub key: *mut ZendString,
}

/// The host's ordered map with textual and integer keys.
#[repr(C)]
pub struct ZendArray {
    pub gc: ZendRefcounted,
    pub flags: u32,
    pub n_table_size: u32,
    pub ar_data: *mut Bucket,
    pub n_num_used: u32,
    pub n_num_of_elements: u32,
    pub n_next_free_element: ZendLong,
    pub p_destructor: Option<DtorFunc>,
    index: *mut HashIndex,
}

pub type HashTable = ZendArray;

#[derive(Default)]
struct HashIndex {
    slots: AHashMap<HashKey, u32>,
}

#[derive(Clone, PartialEq, Eq, Hash)]
enum HashKey {
    Str(Box<[u8]>),
    Num(ZendUlong),
}

#[derive(Clone, Copy)]
enum KeyRef<'a> {
    Str(&'a [u8]),
    Num(ZendUlong),
}

impl<'a> KeyRef<'a> {
    #[inline(always)]
    fn into_key(self) -> HashKey {
        match self {
            Self::Str(bytes) => HashKey::Str(bytes.into()),
            Self::Num(h) => HashKey::Num(h),
        }
    }
}

/// Initializes a hash table in place.
///
/// The bucket storage is allocated lazily on first insertion.
///
/// # Safety
///
/// `ht` points to writable memory of at least `size_of::<HashTable>()` bytes.
pub unsafe fn _zend_hash_init(
    ht: *mut HashTable,
    n_size: u32,
    p_destructor: Option<DtorFunc>,
    persistent: bool,
) {
    let flags = match persistent {
        true => GC_PERSISTENT,
        false => 0,
    };

    unsafe {
        ht.write(HashTable {
            gc: ZendRefcounted::new(IS_ARRAY, flags),
            flags: 0,
            n_table_size: n_size.max(HT_MIN_SIZE).next_power_of_two(),
            ar_data: null_mut(),
            n_num_used: 0,
            n_num_of_elements: 0,
            n_next_free_element: 0,
            p_destructor,
            index: Box::into_raw(Box::<HashIndex>::default()),
        });
    }
}

/// Allocates and initializes a request-bound array whose values are
/// destroyed with [zval_ptr_dtor].
///
/// Available on hosts 7.3 and newer.
pub fn _zend_new_array(size: u32) -> *mut HashTable {
    let ht = emalloc(size_of::<HashTable>()) as *mut HashTable;

    // Safety: The block has the size of a HashTable.
    unsafe { _zend_hash_init(ht, size, Some(zval_ptr_dtor), false) };

    ht
}

/// Available on hosts 7.3 and newer.
#[inline(always)]
pub fn zend_new_array(size: u32) -> *mut HashTable {
    _zend_new_array(size)
}

/// Allocates and initializes a persistent table without a value destructor.
pub(crate) fn new_persistent_table(size: u32) -> *mut HashTable {
    let ht = pemalloc(size_of::<HashTable>(), true) as *mut HashTable;

    // Safety: The block has the size of a HashTable.
    unsafe { _zend_hash_init(ht, size, None, true) };

    ht
}

/// # Safety
///
/// `ht` points to an initialized table.
#[inline(always)]
pub unsafe fn zend_hash_num_elements(ht: *const HashTable) -> u32 {
    unsafe { (*ht).n_num_of_elements }
}

/// # Safety
///
/// `ht` points to an initialized table.
#[inline(always)]
pub unsafe fn zend_array_count(ht: *const HashTable) -> u32 {
    unsafe { zend_hash_num_elements(ht) }
}

/// Returns all used buckets of the table in insertion order, including the
/// deleted ones.
///
/// # Safety
///
/// `ht` points to an initialized table, and the table is not modified while
/// the slice is alive.
#[inline]
pub unsafe fn zend_hash_buckets<'a>(ht: *const HashTable) -> &'a [Bucket] {
    unsafe {
        if (*ht).ar_data.is_null() {
            return &[];
        }

        from_raw_parts((*ht).ar_data, (*ht).n_num_used as usize)
    }
}

unsafe fn buckets_mut<'a>(ht: *mut HashTable) -> &'a mut [Bucket] {
    unsafe {
        if (*ht).ar_data.is_null() {
            return &mut [];
        }

        from_raw_parts_mut((*ht).ar_data, (*ht).n_num_used as usize)
    }
}

#[inline(always)]
unsafe fn index<'a>(ht: *const HashTable) -> &'a mut HashIndex {
    unsafe { &mut *(*ht).index }
}

unsafe fn lookup(ht: *const HashTable, key: KeyRef<'_>) -> Option<u32> {
    unsafe {
        let slots = &index(ht).slots;

        match key {
            KeyRef::Str(bytes) => slots.get(&HashKey::Str(bytes.into())).copied(),
            KeyRef::Num(h) => slots.get(&HashKey::Num(h)).copied(),
        }
    }
}

unsafe fn find_bucket(ht: *const HashTable, key: KeyRef<'_>) -> *mut Bucket {
    unsafe {
        match lookup(ht, key) {
            Some(slot) => (*ht).ar_data.add(slot as usize),
            None => null_mut(),
        }
    }
}

// Moves the live buckets to the front of the storage in insertion order and
// remaps the index. Pointers into the old bucket positions are invalidated.
unsafe fn compact(ht: *mut HashTable) {
    unsafe {
        let used = (*ht).n_num_used as usize;
        let data = (*ht).ar_data;
        let slots = &mut index(ht).slots;

        let mut live = vec![false; used];

        for slot in slots.values() {
            live[*slot as usize] = true;
        }

        let mut remap = vec![0u32; used];
        let mut target = 0u32;

        for (source, live) in live.into_iter().enumerate() {
            if !live {
                continue;
            }

            if source != target as usize {
                data.add(target as usize).write(data.add(source).read());
            }

            remap[source] = target;
            target += 1;
        }

        for slot in slots.values_mut() {
            *slot = remap[*slot as usize];
        }

        (*ht).n_num_used = target;
    }
}

unsafe fn reserve_slot(ht: *mut HashTable) -> *mut Bucket {
    unsafe {
        let persistent = (*ht).gc.is_persistent();

        if (*ht).ar_data.is_null() {
            let bytes = (*ht).n_table_size as usize * size_of::<Bucket>();
            (*ht).ar_data = pemalloc(bytes, persistent) as *mut Bucket;
        } else if (*ht).n_num_used == (*ht).n_table_size {
            let elements = (*ht).n_num_of_elements;

            if (*ht).n_num_used > elements + (elements >> 5) {
                compact(ht);
            }
        }

        if (*ht).n_num_used == (*ht).n_table_size {
            (*ht).n_table_size *= 2;
            let bytes = (*ht).n_table_size as usize * size_of::<Bucket>();
            (*ht).ar_data = erealloc((*ht).ar_data as *mut c_void, bytes) as *mut Bucket;
        }

        let slot = (*ht).ar_data.add((*ht).n_num_used as usize);

        (*ht).n_num_used += 1;
        (*ht).n_num_of_elements += 1;

        slot
    }
}

unsafe fn add_new(ht: *mut HashTable, key: KeyRef<'_>, data: *const Zval) -> *mut Zval {
    unsafe {
        let bucket = reserve_slot(ht);
        let position = (*ht).n_num_used - 1;

        let (h, key_string) = match key {
            KeyRef::Str(bytes) => {
                let string = zend_string_from_bytes(bytes, (*ht).gc.is_persistent());
                (zend_string_hash_val(string), string)
            }

            KeyRef::Num(h) => {
                let h_signed = h as ZendLong;

                if h_signed >= (*ht).n_next_free_element {
                    (*ht).n_next_free_element = match h_signed < ZEND_LONG_MAX {
                        true => h_signed + 1,
                        false => ZEND_LONG_MAX,
                    };
                }

                (h, null_mut())
            }
        };

        bucket.write(Bucket {
            val: *data,
            h,
            key: key_string,
        });

        let _ = index(ht).slots.insert(key.into_key(), position);

        addr_of_mut!((*bucket).val)
    }
}

unsafe fn update(ht: *mut HashTable, key: KeyRef<'_>, data: *const Zval) -> *mut Zval {
    unsafe {
        let bucket = find_bucket(ht, key);

        if bucket.is_null() {
            return add_new(ht, key, data);
        }

        let val = addr_of_mut!((*bucket).val);

        if let Some(destructor) = (*ht).p_destructor {
            destructor(val);
        }

        val.write(*data);

        val
    }
}

unsafe fn delete(ht: *mut HashTable, key: KeyRef<'_>) -> ZendResultCode {
    unsafe {
        let slot = match key {
            KeyRef::Str(bytes) => index(ht).slots.remove(&HashKey::Str(bytes.into())),
            KeyRef::Num(h) => index(ht).slots.remove(&HashKey::Num(h)),
        };

        let Some(slot) = slot else {
            return FAILURE;
        };

        let bucket = (*ht).ar_data.add(slot as usize);
        let mut val = (*bucket).val;

        (*bucket).val = Zval::undef();
        (*ht).n_num_of_elements -= 1;

        if !(*bucket).key.is_null() {
            zend_string_release((*bucket).key);
            (*bucket).key = null_mut();
        }

        if let Some(destructor) = (*ht).p_destructor {
            destructor(&mut val);
        }

        SUCCESS
    }
}

#[inline(always)]
unsafe fn str_key<'a>(key: *const c_char, len: usize) -> KeyRef<'a> {
    unsafe { KeyRef::Str(from_raw_parts(key as *const u8, len)) }
}

/// Inserts or replaces the value stored under a textual key.
///
/// The value is moved into the table by value; the caller's reference is
/// consumed. A replaced value is destroyed with the table's destructor.
///
/// # Safety
///
/// `ht` points to an initialized table, `key` to `len` readable bytes and
/// `data` to an initialized value.
pub unsafe fn zend_hash_str_update(
    ht: *mut HashTable,
    key: *const c_char,
    len: usize,
    data: *mut Zval,
) -> *mut Zval {
    unsafe { update(ht, str_key(key, len), data) }
}

/// Same as [zend_hash_str_update] for an integer key.
///
/// # Safety
///
/// See [zend_hash_str_update].
pub unsafe fn zend_hash_index_update(ht: *mut HashTable, h: ZendUlong, data: *mut Zval) -> *mut Zval {
    unsafe { update(ht, KeyRef::Num(h), data) }
}

/// Appends a value under the next free integer key.
///
/// Returns null if the next key would overflow.
///
/// # Safety
///
/// See [zend_hash_str_update].
pub unsafe fn zend_hash_next_index_insert(ht: *mut HashTable, data: *mut Zval) -> *mut Zval {
    unsafe {
        let h = (*ht).n_next_free_element;

        if h == ZEND_LONG_MAX || lookup(ht, KeyRef::Num(h as ZendUlong)).is_some() {
            return null_mut();
        }

        add_new(ht, KeyRef::Num(h as ZendUlong), data)
    }
}

/// Returns the value stored under a textual key, or null.
///
/// # Safety
///
/// `ht` points to an initialized table and `key` to `len` readable bytes.
pub unsafe fn zend_hash_str_find(ht: *const HashTable, key: *const c_char, len: usize) -> *mut Zval {
    unsafe {
        let bucket = find_bucket(ht, str_key(key, len));

        match bucket.is_null() {
            true => null_mut(),
            false => addr_of_mut!((*bucket).val),
        }
    }
}

/// Same as [zend_hash_str_find], following an `IS_INDIRECT` slot to the
/// value it points to. An indirect slot pointing to an undefined value is
/// reported as missing.
///
/// # Safety
///
/// See [zend_hash_str_find].
pub unsafe fn zend_hash_str_find_ind(ht: *const HashTable, key: *const c_char, len: usize) -> *mut Zval {
    unsafe {
        let zv = zend_hash_str_find(ht, key, len);

        if zv.is_null() || (*zv).ty() != IS_INDIRECT {
            return zv;
        }

        let target = (*zv).value.zv;

        match (*target).ty() == IS_UNDEF {
            true => null_mut(),
            false => target,
        }
    }
}

/// # Safety
///
/// `ht` points to an initialized table.
pub unsafe fn zend_hash_index_find(ht: *const HashTable, h: ZendUlong) -> *mut Zval {
    unsafe {
        let bucket = find_bucket(ht, KeyRef::Num(h));

        match bucket.is_null() {
            true => null_mut(),
            false => addr_of_mut!((*bucket).val),
        }
    }
}

/// Returns the pointer payload stored under a textual key, or null.
///
/// # Safety
///
/// See [zend_hash_str_find]. The stored value, if any, is an `IS_PTR` box.
pub unsafe fn zend_hash_str_find_ptr(ht: *const HashTable, key: *const c_char, len: usize) -> *mut c_void {
    unsafe {
        let zv = zend_hash_str_find(ht, key, len);

        match zv.is_null() || (*zv).ty() != IS_PTR {
            true => null_mut(),
            false => (*zv).value.ptr,
        }
    }
}

/// Stores a pointer payload under a textual key.
///
/// # Safety
///
/// See [zend_hash_str_update].
pub unsafe fn zend_hash_str_update_ptr(
    ht: *mut HashTable,
    key: *const c_char,
    len: usize,
    ptr: *mut c_void,
) -> *mut c_void {
    let mut zv = Zval::undef();
    zv.value.ptr = ptr;
    zv.type_info = IS_PTR as u32;

    unsafe {
        let _ = zend_hash_str_update(ht, key, len, &mut zv);
    }

    ptr
}

/// # Safety
///
/// See [zend_hash_str_find].
#[inline]
pub unsafe fn zend_hash_str_exists(ht: *const HashTable, key: *const c_char, len: usize) -> bool {
    unsafe { lookup(ht, str_key(key, len)).is_some() }
}

/// # Safety
///
/// `ht` points to an initialized table.
#[inline]
pub unsafe fn zend_hash_index_exists(ht: *const HashTable, h: ZendUlong) -> bool {
    unsafe { lookup(ht, KeyRef::Num(h)).is_some() }
}

/// Deletes the entry stored under a textual key, destroying its value.
///
/// # Safety
///
/// See [zend_hash_str_find].
pub unsafe fn zend_hash_str_del(ht: *mut HashTable, key: *const c_char, len: usize) -> ZendResultCode {
    unsafe { delete(ht, str_key(key, len)) }
}

/// # Safety
///
/// `ht` points to an initialized table.
pub unsafe fn zend_hash_index_del(ht: *mut HashTable, h: ZendUlong) -> ZendResultCode {
    unsafe { delete(ht, KeyRef::Num(h)) }
}

/// Creates a request-bound copy of `source`.
///
/// Every value gets a new reference; indirect slots are copied by the value
/// they point to, and undefined slots are skipped.
///
/// # Safety
///
/// `source` points to an initialized table.
pub unsafe fn zend_array_dup(source: *const HashTable) -> *mut HashTable {
    unsafe {
        let target = _zend_new_array(zend_hash_num_elements(source));

        for bucket in zend_hash_buckets(source) {
            let mut val = &bucket.val as *const Zval;

            if (*val).ty() == IS_INDIRECT {
                val = (*val).value.zv;
            }

            if (*val).ty() == IS_UNDEF {
                continue;
            }

            let mut copy = *val;

            if copy.is_refcounted() {
                (*copy.value.counted).refcount += 1;
            }

            match bucket.key.is_null() {
                true => add_new(target, KeyRef::Num(bucket.h), &mut copy),
                false => add_new(target, KeyRef::Str(zstr_bytes(bucket.key)), &mut copy),
            };
        }

        (*target).n_next_free_element = (*source).n_next_free_element;

        target
    }
}

/// Destroys the content of the table without releasing the table itself.
///
/// # Safety
///
/// `ht` points to an initialized table that is not used afterwards.
pub unsafe fn zend_hash_destroy(ht: *mut HashTable) {
    unsafe {
        let destructor = (*ht).p_destructor;

        for bucket in buckets_mut(ht) {
            if bucket.val.ty() == IS_UNDEF {
                continue;
            }

            if let Some(destructor) = destructor {
                destructor(&mut bucket.val);
            }

            if !bucket.key.is_null() {
                zend_string_release(bucket.key);
            }
        }

        if !(*ht).ar_data.is_null() {
            pefree((*ht).ar_data as *mut c_void, (*ht).gc.is_persistent());
        }

        drop(Box::from_raw((*ht).index));

        (*ht).ar_data = null_mut();
        (*ht).index = null_mut();
        (*ht).n_num_used = 0;
        (*ht).n_num_of_elements = 0;
    }
}

/// Destroys the content of the table and releases the table.
///
/// # Safety
///
/// `ht` points to an initialized table that was allocated by the host
/// memory manager and that is not used afterwards.
pub unsafe fn zend_array_destroy(ht: *mut HashTable) {
    unsafe {
        let persistent = (*ht).gc.is_persistent();

        zend_hash_destroy(ht);

        pefree(ht as *mut c_void, persistent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        alloc::heap_stats,
        string::zend_string_refcount,
        types::{IS_LONG, IS_STRING_EX},
    };

    fn long(value: ZendLong) -> Zval {
        let mut zv = Zval::undef();
        zv.value.lval = value;
        zv.type_info = IS_LONG as u32;
        zv
    }

    unsafe fn str_update(ht: *mut HashTable, key: &str, mut zv: Zval) -> *mut Zval {
        unsafe { zend_hash_str_update(ht, key.as_ptr() as *const c_char, key.len(), &mut zv) }
    }

    unsafe fn str_find(ht: *const HashTable, key: &str) -> *mut Zval {
        unsafe { zend_hash_str_find(ht, key.as_ptr() as *const c_char, key.len()) }
    }

    #[test]
    fn test_find_update_delete() {
        let before = heap_stats();
        let ht = zend_new_array(0);

        unsafe {
            let _ = str_update(ht, "foo", long(1));
            let _ = str_update(ht, "bar", long(2));
            let _ = str_update(ht, "foo", long(3));

            assert_eq!(zend_hash_num_elements(ht), 2);
            assert_eq!((*str_find(ht, "foo")).value.lval, 3);
            assert!(str_find(ht, "baz").is_null());

            assert_eq!(zend_hash_str_del(ht, "foo".as_ptr() as *const c_char, 3), SUCCESS);
            assert_eq!(zend_hash_str_del(ht, "foo".as_ptr() as *const c_char, 3), FAILURE);
            assert!(str_find(ht, "foo").is_null());
            assert_eq!(zend_hash_num_elements(ht), 1);

            zend_array_destroy(ht);
        }

        assert_eq!(heap_stats().request_blocks, before.request_blocks);
    }

    #[test]
    fn test_next_index_follows_largest_key() {
        let ht = zend_new_array(0);

        unsafe {
            let _ = zend_hash_index_update(ht, 10, &mut long(1));
            let _ = zend_hash_next_index_insert(ht, &mut long(2));

            assert_eq!((*zend_hash_index_find(ht, 11)).value.lval, 2);
            assert!(zend_hash_index_exists(ht, 10));
            assert!(!zend_hash_index_exists(ht, 12));

            zend_array_destroy(ht);
        }
    }

    #[test]
    fn test_growth_keeps_order() {
        let ht = zend_new_array(0);

        unsafe {
            for value in 0..100 {
                let _ = zend_hash_next_index_insert(ht, &mut long(value));
            }

            let values = zend_hash_buckets(ht)
                .iter()
                .map(|bucket| bucket.val.value.lval)
                .collect::<Vec<_>>();

            assert_eq!(values, (0..100).collect::<Vec<_>>());

            zend_array_destroy(ht);
        }
    }

    #[test]
    fn test_churn_reuses_slots() {
        let before = heap_stats();
        let ht = zend_new_array(0);

        unsafe {
            let _ = str_update(ht, "kept", long(-1));

            for value in 0..10_000 {
                let _ = str_update(ht, "k", long(value));
                assert_eq!(zend_hash_str_del(ht, "k".as_ptr() as *const c_char, 1), SUCCESS);
            }

            let _ = str_update(ht, "last", long(7));

            assert!((*ht).n_table_size <= HT_MIN_SIZE);
            assert!((*ht).n_num_used <= HT_MIN_SIZE);
            assert_eq!(zend_hash_num_elements(ht), 2);
            assert_eq!((*str_find(ht, "kept")).value.lval, -1);
            assert_eq!((*str_find(ht, "last")).value.lval, 7);
            assert!(str_find(ht, "k").is_null());

            let values = zend_hash_buckets(ht)
                .iter()
                .filter(|bucket| bucket.val.ty() != IS_UNDEF)
                .map(|bucket| bucket.val.value.lval)
                .collect::<Vec<_>>();

            assert_eq!(values, [-1, 7]);

            zend_array_destroy(ht);
        }

        assert_eq!(heap_stats().request_blocks, before.request_blocks);
    }

    #[test]
    fn test_dup_adds_references() {
        let ht = zend_new_array(0);
        let string = zend_string_from_bytes(b"value", false);

        unsafe {
            let mut zv = Zval::undef();
            zv.value.str_ = string;
            zv.type_info = IS_STRING_EX;

            let _ = zend_hash_str_update(ht, "key".as_ptr() as *const c_char, 3, &mut zv);

            let copy = zend_array_dup(ht);

            assert_eq!(zend_string_refcount(string), 2);
            assert_eq!((*str_find(copy, "key")).value.str_, string);

            zend_array_destroy(copy);
            assert_eq!(zend_string_refcount(string), 1);

            zend_array_destroy(ht);
        }
    }
}
