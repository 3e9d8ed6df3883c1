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

//! Primitives that only exist on older hosts.
//!
//! Newer hosts replaced each of them with the primitive noted in its
//! documentation.

use std::{ffi::c_char, mem::size_of};

use crate::{
    alloc::emalloc,
    execute::_call_user_function_impl,
    function::{ZendFunction, ZendFunctionEntry},
    hash::{_zend_hash_init, HashTable},
    object::{instanceof_function, ZendClassEntry, ZEND_ACC_INTERFACE},
    string::{zend_new_interned_string, zend_string_init},
    types::{ZendResultCode, Zval, IS_ARRAY_EX, SUCCESS},
    values::zval_ptr_dtor,
};

/// Stores a new empty array of `size` preallocated slots into `arg`.
///
/// Available on hosts older than 7.3. Newer hosts expand `array_init` into
/// [zend_new_array](crate::hash::zend_new_array).
///
/// # Safety
///
/// `arg` points to writable value storage.
pub unsafe fn _array_init(arg: *mut Zval, size: u32) -> ZendResultCode {
    unsafe {
        let ht = emalloc(size_of::<HashTable>()) as *mut HashTable;

        _zend_hash_init(ht, size, Some(zval_ptr_dtor), false);

        let mut zv = Zval::undef();
        zv.value.arr = ht;
        zv.type_info = IS_ARRAY_EX;

        arg.write(zv);

        SUCCESS
    }
}

/// Same as [instanceof_function]. With `interfaces_only` set, only the
/// interfaces implemented by `instance_ce` are considered.
///
/// Available on hosts older than 8.0.
///
/// # Safety
///
/// Both pointers refer to initialized class entries.
pub unsafe fn instanceof_function_ex(
    instance_ce: *const ZendClassEntry,
    ce: *const ZendClassEntry,
    interfaces_only: bool,
) -> bool {
    unsafe {
        if interfaces_only && (*ce).ce_flags & ZEND_ACC_INTERFACE == 0 {
            return false;
        }

        instanceof_function(instance_ce, ce)
    }
}

/// The call dispatcher of hosts older than 8.0.
///
/// `no_separation` is accepted for signature compatibility. Arguments are
/// always passed by value.
///
/// # Safety
///
/// See [_call_user_function_impl].
pub unsafe fn _call_user_function_ex(
    object: *mut Zval,
    function_name: *mut Zval,
    retval_ptr: *mut Zval,
    param_count: u32,
    params: *mut Zval,
    _no_separation: i32,
) -> ZendResultCode {
    unsafe {
        _call_user_function_impl(
            object,
            function_name,
            retval_ptr,
            param_count,
            params,
            std::ptr::null_mut(),
        )
    }
}

/// Initializes a class entry in place together with its overload handlers.
///
/// Available on hosts older than 7.3, where the plain class entry
/// initializer expands to this one with null handlers.
///
/// # Safety
///
/// `ce` points to writable memory, `name` to `len` readable bytes, and
/// `functions` is null or points to a terminated entry list.
pub unsafe fn init_overloaded_class_entry_ex(
    ce: *mut ZendClassEntry,
    name: *const c_char,
    len: usize,
    functions: *const ZendFunctionEntry,
    handle_fcall: *mut ZendFunction,
    handle_propget: *mut ZendFunction,
    handle_propset: *mut ZendFunction,
) {
    unsafe {
        ce.write(ZendClassEntry::default());
        (*ce).name = zend_new_interned_string(zend_string_init(name, len, true));
        (*ce).builtin_functions = functions;
        (*ce).__call = handle_fcall;
        (*ce).__get = handle_propget;
        (*ce).__set = handle_propset;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        hash::{zend_array_destroy, zend_hash_num_elements},
        object::{init_class_entry_ex, zend_register_internal_class_ex, zend_register_internal_interface},
        string::{zstr_bytes, zstr_is_interned},
        types::IS_ARRAY,
    };
    use std::ptr::{null, null_mut};

    #[test]
    fn test_array_init() {
        unsafe {
            let mut zv = Zval::undef();

            assert_eq!(_array_init(&mut zv, 0), SUCCESS);
            assert_eq!(zv.ty(), IS_ARRAY);
            assert_eq!(zend_hash_num_elements(zv.value.arr), 0);

            zend_array_destroy(zv.value.arr);
        }
    }

    #[test]
    fn test_overloaded_class_entry() {
        unsafe {
            let mut ce = ZendClassEntry::default();

            init_overloaded_class_entry_ex(&mut ce, c"Overloaded".as_ptr(), 10, null(), null_mut(), null_mut(), null_mut());

            assert!(zstr_is_interned(ce.name));
            assert_eq!(zstr_bytes(ce.name), b"Overloaded");
            assert!(ce.__call.is_null());
        }
    }

    #[test]
    fn test_instanceof_interfaces_only() {
        unsafe {
            let mut interface = ZendClassEntry::default();
            init_class_entry_ex(&mut interface, c"LegacyIface".as_ptr(), 11, null());
            let interface = zend_register_internal_interface(&mut interface);

            let mut class = ZendClassEntry::default();
            init_class_entry_ex(&mut class, c"LegacyImpl".as_ptr(), 10, null());
            let class = zend_register_internal_class_ex(&mut class, null_mut());
            crate::object::zend_class_implements(class, &[interface]);

            let mut child = ZendClassEntry::default();
            init_class_entry_ex(&mut child, c"LegacyChild".as_ptr(), 11, null());
            let child = zend_register_internal_class_ex(&mut child, class);

            assert!(instanceof_function_ex(child, interface, true));
            assert!(!instanceof_function_ex(child, class, true));
            assert!(instanceof_function_ex(child, class, false));
        }
    }
}
