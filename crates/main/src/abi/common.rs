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

//! Bodies shared by several variants.

use std::ffi::c_char;

use log::trace;
#[cfg(any(test, feature = "all-abis", zend_compat_abi = "7.2", zend_compat_abi = "7.3"))]
use zend_compat_engine::arginfo::ZendInternalArgInfo7x;
use zend_compat_engine::{
    function::ZendFunction,
    legacy::_call_user_function_ex,
    string::{zend_string_alloc, zend_string_from_bytes, zstr_bytes, zstr_val, ZendString},
    types::{Zval, SUCCESS},
};

/// Builds the qualified name of a function on hosts without
/// `get_function_or_method_name`.
pub(super) unsafe fn synthesize_function_name(func: *const ZendFunction) -> *mut ZendString {
    unsafe {
        let name = (*func).function_name;

        if name.is_null() {
            trace!("function name synthesized: main");

            return zend_string_from_bytes(b"main", false);
        }

        let scope = (*func).scope;

        if scope.is_null() || (*scope).name.is_null() {
            trace!("function name synthesized: {:?}", String::from_utf8_lossy(zstr_bytes(name)));

            return zend_string_from_bytes(zstr_bytes(name), false);
        }

        let scope_name = zstr_bytes((*scope).name);
        let method_name = zstr_bytes(name);
        let len = scope_name.len() + 2 + method_name.len();

        let result = zend_string_alloc(len, false);
        let target = zstr_val(result) as *mut u8;

        target.copy_from_nonoverlapping(scope_name.as_ptr(), scope_name.len());
        target.add(scope_name.len()).copy_from_nonoverlapping(b"::".as_ptr(), 2);
        target
            .add(scope_name.len() + 2)
            .copy_from_nonoverlapping(method_name.as_ptr(), method_name.len());
        target.add(len).write(0);

        trace!(
            "function name synthesized: {:?}",
            String::from_utf8_lossy(zstr_bytes(result)),
        );

        result
    }
}

/// Allocates and initializes a request-bound array on hosts without
/// `zend_new_array`.
#[cfg(any(test, feature = "all-abis", zend_compat_abi = "7.0", zend_compat_abi = "7.2"))]
pub(super) unsafe fn allocate_array(size: u32) -> *mut zend_compat_engine::hash::HashTable {
    use std::mem::size_of;

    use zend_compat_engine::{
        alloc::emalloc,
        hash::{_zend_hash_init, HashTable},
        values::zval_ptr_dtor,
    };

    unsafe {
        let ht = emalloc(size_of::<HashTable>()) as *mut HashTable;

        _zend_hash_init(ht, size, Some(zval_ptr_dtor), false);

        trace!("array allocated manually ({size} slots)");

        ht
    }
}

/// Allocates zeroed object storage on hosts without `zend_object_alloc`.
#[cfg(any(test, feature = "all-abis", zend_compat_abi = "7.0", zend_compat_abi = "7.2"))]
pub(super) unsafe fn allocate_object(
    obj_size: usize,
    ce: *mut zend_compat_engine::object::ZendClassEntry,
) -> *mut std::ffi::c_void {
    use zend_compat_engine::{alloc::ecalloc, object::zend_object_properties_size};

    unsafe {
        let properties_size = zend_object_properties_size(ce);

        trace!("object allocated manually ({obj_size} + {properties_size} bytes)");

        ecalloc(1, obj_size + properties_size)
    }
}

/// Interns a string on hosts without `zend_string_init_interned`.
#[cfg(any(test, feature = "all-abis", zend_compat_abi = "7.0", zend_compat_abi = "7.2"))]
pub(super) unsafe fn intern_string(str: *const c_char, len: usize, persistent: bool) -> *mut ZendString {
    use zend_compat_engine::string::{zend_new_interned_string, zend_string_init};

    unsafe { zend_new_interned_string(zend_string_init(str, len, persistent)) }
}

/// Calls a function through the 7.x calling convention.
pub(super) unsafe fn call_function_ex(
    object: *mut Zval,
    function_name: *mut Zval,
    retval_ptr: *mut Zval,
    param_count: u32,
    params: *mut Zval,
) -> bool {
    unsafe { _call_user_function_ex(object, function_name, retval_ptr, param_count, params, 1) == SUCCESS }
}

/// Builds a 7.2 to 7.4 argument record.
#[cfg(any(test, feature = "all-abis", zend_compat_abi = "7.2", zend_compat_abi = "7.3"))]
#[inline(always)]
pub(super) const fn legacy_record<const CODE_SHIFT: u32>(
    name: *const c_char,
    pass_by_ref: bool,
    type_code: u8,
    allow_null: bool,
) -> ZendInternalArgInfo7x<CODE_SHIFT> {
    ZendInternalArgInfo7x {
        name,
        type_: ZendInternalArgInfo7x::<CODE_SHIFT>::encode_type(type_code, allow_null),
        pass_by_reference: pass_by_ref as u8,
        is_variadic: 0,
    }
}
