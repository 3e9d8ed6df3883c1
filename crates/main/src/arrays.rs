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

use std::ffi::{c_char, c_void};

use zend_compat_engine::{
    hash::{
        zend_array_count,
        zend_array_destroy,
        zend_array_dup,
        zend_hash_buckets,
        zend_hash_index_del,
        zend_hash_index_exists,
        zend_hash_index_find,
        zend_hash_index_update,
        zend_hash_next_index_insert,
        zend_hash_str_del,
        zend_hash_str_exists,
        zend_hash_str_find,
        zend_hash_str_find_ind,
        zend_hash_str_find_ptr,
        zend_hash_str_update,
        HashTable,
    },
    separate_array,
    string::{zstr_len, zstr_val},
    types::{ZendResultCode, ZendUlong, Zval, IS_INDIRECT, IS_UNDEF},
    z_try_addref_p,
};

use crate::abi::{Active, CompatDefinition};

/// Allocates a new empty array. Divergent.
#[no_mangle]
pub unsafe extern "C" fn phper_zend_new_array(size: u32) -> *mut HashTable {
    unsafe { Active::zend_new_array(size) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_zend_array_dup(source: *mut HashTable) -> *mut HashTable {
    unsafe { zend_array_dup(source) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_zend_array_destroy(ht: *mut HashTable) {
    unsafe { zend_array_destroy(ht) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_zend_array_count(ht: *mut HashTable) -> u32 {
    unsafe { zend_array_count(ht) }
}

/// Stores `data` under a textual key, moving the caller's reference into
/// the table.
#[no_mangle]
pub unsafe extern "C" fn phper_zend_hash_str_update(
    ht: *mut HashTable,
    key: *const c_char,
    len: usize,
    data: *mut Zval,
) -> *mut Zval {
    unsafe { zend_hash_str_update(ht, key, len, data) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_zend_hash_index_update(ht: *mut HashTable, h: ZendUlong, data: *mut Zval) -> *mut Zval {
    unsafe { zend_hash_index_update(ht, h, data) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_zend_hash_next_index_insert(ht: *mut HashTable, data: *mut Zval) -> *mut Zval {
    unsafe { zend_hash_next_index_insert(ht, data) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_zend_hash_str_find(ht: *const HashTable, key: *const c_char, len: usize) -> *mut Zval {
    unsafe { zend_hash_str_find(ht, key, len) }
}

/// Same as [phper_zend_hash_str_find], returning the value an indirect slot
/// points to. This is how object properties are read through
/// [phper_z_obj_ht_p](crate::phper_z_obj_ht_p).
#[no_mangle]
pub unsafe extern "C" fn phper_zend_hash_str_find_ind(
    ht: *const HashTable,
    key: *const c_char,
    len: usize,
) -> *mut Zval {
    unsafe { zend_hash_str_find_ind(ht, key, len) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_zend_hash_index_find(ht: *const HashTable, h: ZendUlong) -> *mut Zval {
    unsafe { zend_hash_index_find(ht, h) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_zend_hash_str_find_ptr(
    ht: *const HashTable,
    key: *const c_char,
    len: usize,
) -> *mut c_void {
    unsafe { zend_hash_str_find_ptr(ht, key, len) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_zend_hash_str_exists(ht: *const HashTable, key: *const c_char, len: usize) -> bool {
    unsafe { zend_hash_str_exists(ht, key, len) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_zend_hash_index_exists(ht: *const HashTable, h: ZendUlong) -> bool {
    unsafe { zend_hash_index_exists(ht, h) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_zend_hash_str_del(ht: *mut HashTable, key: *const c_char, len: usize) -> ZendResultCode {
    unsafe { zend_hash_str_del(ht, key, len) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_zend_hash_index_del(ht: *mut HashTable, h: ZendUlong) -> ZendResultCode {
    unsafe { zend_hash_index_del(ht, h) }
}

/// Copies every entry of `source` into `target`, replacing entries with
/// equal keys. Indirect slots are followed, undefined slots are skipped.
/// Every copied value gets a new reference.
#[no_mangle]
pub unsafe extern "C" fn phper_zend_hash_merge_with_key(target: *mut HashTable, source: *const HashTable) {
    unsafe {
        for bucket in zend_hash_buckets(source) {
            let mut val = &bucket.val as *const Zval;

            if (*val).ty() == IS_INDIRECT {
                val = (*val).value.zv;
            }

            if (*val).ty() == IS_UNDEF {
                continue;
            }

            let mut copy = *val;
            z_try_addref_p!(&mut copy);

            match bucket.key.is_null() {
                true => zend_hash_index_update(target, bucket.h, &mut copy),
                false => zend_hash_str_update(target, zstr_val(bucket.key), zstr_len(bucket.key), &mut copy),
            };
        }
    }
}

/// Makes the array payload of `zv` exclusively owned.
#[no_mangle]
pub unsafe extern "C" fn phper_separate_array(zv: *mut Zval) {
    unsafe { separate_array!(zv) }
}

#[cfg(test)]
mod tests {
    use std::ptr::{null, null_mut};

    use zend_compat_engine::{
        alloc::heap_stats,
        object::{
            init_class_entry_ex,
            object_init_ex,
            zend_declare_property,
            zend_register_internal_class_ex,
            zend_std_get_properties,
            ZendClassEntry,
        },
        string::zstr_bytes,
        types::{IS_LONG, IS_STRING, SUCCESS},
        values::zval_ptr_dtor,
        z_lval_p,
        zval_arr,
        zval_copy,
        zval_long,
        zval_stringl,
    };

    use super::*;

    #[test]
    fn test_round_trip() {
        unsafe {
            let ht = phper_zend_new_array(0);

            let mut value = Zval::undef();
            zval_stringl!(&mut value, c"value".as_ptr(), 5);
            assert!(!phper_zend_hash_str_update(ht, c"key".as_ptr(), 3, &mut value).is_null());

            let found = phper_zend_hash_str_find(ht, c"key".as_ptr(), 3);
            assert!(!found.is_null());
            assert_eq!((*found).ty(), IS_STRING);
            assert_eq!(zstr_bytes(crate::phper_z_str_p(found)), b"value");
            assert!(phper_zend_hash_str_exists(ht, c"key".as_ptr(), 3));

            zval_long!(&mut value, 5);
            phper_zend_hash_index_update(ht, 10, &mut value);
            zval_long!(&mut value, 6);
            phper_zend_hash_next_index_insert(ht, &mut value);

            assert_eq!(z_lval_p!(phper_zend_hash_index_find(ht, 11)), 6);
            assert!(phper_zend_hash_index_exists(ht, 10));
            assert_eq!(phper_zend_array_count(ht), 3);

            assert_eq!(phper_zend_hash_str_del(ht, c"key".as_ptr(), 3), SUCCESS);
            assert!(phper_zend_hash_str_find(ht, c"key".as_ptr(), 3).is_null());
            assert_ne!(phper_zend_hash_str_del(ht, c"key".as_ptr(), 3), SUCCESS);

            assert_eq!(phper_zend_hash_index_del(ht, 10), SUCCESS);
            assert!(phper_zend_hash_index_find(ht, 10).is_null());
            assert_eq!(phper_zend_array_count(ht), 1);

            phper_zend_array_destroy(ht);

            assert_eq!(heap_stats().request_blocks, 0);
        }
    }

    #[test]
    fn test_dup_and_separate() {
        unsafe {
            let ht = phper_zend_new_array(0);

            let mut value = Zval::undef();
            zval_stringl!(&mut value, c"shared".as_ptr(), 6);
            phper_zend_hash_str_update(ht, c"s".as_ptr(), 1, &mut value);

            let dup = phper_zend_array_dup(ht);
            assert_ne!(dup, ht);
            assert_eq!(phper_zend_array_count(dup), 1);
            assert_eq!(
                (*phper_zend_hash_str_find(dup, c"s".as_ptr(), 1)).value.str_,
                (*phper_zend_hash_str_find(ht, c"s".as_ptr(), 1)).value.str_,
            );

            phper_zend_array_destroy(dup);

            let mut first = Zval::undef();
            zval_arr!(&mut first, ht);

            let mut second = Zval::undef();
            zval_copy!(&mut second, &first);

            phper_separate_array(&mut second);
            assert_ne!(second.value.arr, first.value.arr);
            assert_eq!((*first.value.arr).gc.refcount, 1);

            zval_ptr_dtor(&mut first);
            zval_ptr_dtor(&mut second);

            assert_eq!(heap_stats().request_blocks, 0);
        }
    }

    #[test]
    fn test_merge_with_key() {
        unsafe {
            let mut ce = ZendClassEntry::default();
            init_class_entry_ex(&mut ce, c"Point".as_ptr(), 5, null());
            let ce = zend_register_internal_class_ex(&mut ce, null_mut());

            let mut default = Zval::undef();
            zval_long!(&mut default, 1);
            zend_declare_property(ce, c"x".as_ptr(), 1, &mut default);
            zval_long!(&mut default, 2);
            zend_declare_property(ce, c"y".as_ptr(), 1, &mut default);

            let mut object = Zval::undef();
            assert_eq!(object_init_ex(&mut object, ce), SUCCESS);

            let target = phper_zend_new_array(0);

            let mut value = Zval::undef();
            zval_long!(&mut value, 100);
            phper_zend_hash_str_update(target, c"x".as_ptr(), 1, &mut value);
            phper_zend_hash_index_update(target, 0, &mut value);

            phper_zend_hash_merge_with_key(target, zend_std_get_properties(object.value.obj));

            assert_eq!(phper_zend_array_count(target), 3);
            assert_eq!(z_lval_p!(phper_zend_hash_str_find(target, c"x".as_ptr(), 1)), 1);
            assert_eq!(z_lval_p!(phper_zend_hash_str_find(target, c"y".as_ptr(), 1)), 2);
            assert_eq!((*phper_zend_hash_index_find(target, 0)).ty(), IS_LONG);

            phper_zend_array_destroy(target);
            zval_ptr_dtor(&mut object);

            assert_eq!(heap_stats().request_blocks, 0);
        }
    }

    #[test]
    fn test_object_property_lookup() {
        unsafe {
            let mut ce = ZendClassEntry::default();
            init_class_entry_ex(&mut ce, c"Box3".as_ptr(), 4, null());
            let ce = zend_register_internal_class_ex(&mut ce, null_mut());

            let mut default = Zval::undef();
            zval_long!(&mut default, 12);
            zend_declare_property(ce, c"depth".as_ptr(), 5, &mut default);

            let mut object = Zval::undef();
            assert_eq!(object_init_ex(&mut object, ce), SUCCESS);

            let properties = crate::phper_z_obj_ht_p(&object);

            let raw = phper_zend_hash_str_find(properties, c"depth".as_ptr(), 5);
            assert_eq!((*raw).ty(), IS_INDIRECT);

            let depth = phper_zend_hash_str_find_ind(properties, c"depth".as_ptr(), 5);
            assert_eq!((*depth).ty(), IS_LONG);
            assert_eq!(z_lval_p!(depth), 12);
            assert_eq!(crate::phper_zval_get_long(depth), 12);

            assert!(phper_zend_hash_str_find_ind(properties, c"width".as_ptr(), 5).is_null());

            let mut value = Zval::undef();
            zval_long!(&mut value, 3);
            phper_zend_hash_str_update(properties, c"plain".as_ptr(), 5, &mut value);
            assert_eq!(z_lval_p!(phper_zend_hash_str_find_ind(properties, c"plain".as_ptr(), 5)), 3);

            zval_ptr_dtor(&mut object);

            assert_eq!(heap_stats().request_blocks, 0);
        }
    }
}
