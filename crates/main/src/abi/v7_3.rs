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

//! Hosts 7.3 and 7.4.

use std::ffi::{c_char, c_void};

use zend_compat_engine::{
    array_init,
    arginfo::ZendInternalArgInfo73,
    function::{ZendFunction, ZendFunctionEntry},
    hash::{zend_new_array, HashTable},
    init_class_entry_ex,
    legacy::instanceof_function_ex,
    object::{zend_object_alloc, ZendClassEntry},
    string::{zend_string_init_interned, zend_string_release_ex, zstr_is_interned, ZendString},
    types::{Zval, IS_STR_PERSISTENT},
};

use crate::abi::{common, CompatDefinition};

pub struct Definition;

impl CompatDefinition for Definition {
    const ABI: &'static str = "7.3";

    type ArgInfo = ZendInternalArgInfo73;

    #[inline]
    unsafe fn zend_new_array(size: u32) -> *mut HashTable {
        zend_new_array(size)
    }

    #[inline]
    unsafe fn array_init(arg: *mut Zval) {
        unsafe { array_init!(arg) }
    }

    #[inline]
    unsafe fn zend_string_init_interned(str: *const c_char, len: usize, persistent: bool) -> *mut ZendString {
        unsafe { zend_string_init_interned(str, len, persistent) }
    }

    #[inline]
    unsafe fn zend_string_release(s: *mut ZendString) {
        unsafe {
            let persistent = !zstr_is_interned(s) && (*s).gc.type_info & IS_STR_PERSISTENT != 0;

            zend_string_release_ex(s, persistent)
        }
    }

    #[inline]
    unsafe fn zend_object_alloc(obj_size: usize, ce: *mut ZendClassEntry) -> *mut c_void {
        unsafe { zend_object_alloc(obj_size, ce) }
    }

    #[inline]
    unsafe fn instanceof_function(instance_ce: *const ZendClassEntry, ce: *const ZendClassEntry) -> bool {
        unsafe { instanceof_function_ex(instance_ce, ce, false) }
    }

    #[inline]
    unsafe fn init_class_entry_ex(
        ce: *mut ZendClassEntry,
        name: *const c_char,
        len: usize,
        functions: *const ZendFunctionEntry,
    ) {
        unsafe { init_class_entry_ex!(ce, name, len, functions) }
    }

    #[inline]
    unsafe fn get_function_or_method_name(func: *const ZendFunction) -> *mut ZendString {
        unsafe { common::synthesize_function_name(func) }
    }

    #[inline]
    unsafe fn call_user_function(
        _function_table: *mut HashTable,
        object: *mut Zval,
        function_name: *mut Zval,
        retval_ptr: *mut Zval,
        param_count: u32,
        params: *mut Zval,
    ) -> bool {
        unsafe { common::call_function_ex(object, function_name, retval_ptr, param_count, params) }
    }

    #[inline]
    fn zend_begin_arg_info_ex(return_reference: bool, required_num_args: usize) -> Self::ArgInfo {
        common::legacy_record(required_num_args as *const c_char, return_reference, 0, false)
    }

    #[inline]
    fn zend_arg_info(pass_by_ref: bool, name: *const c_char) -> Self::ArgInfo {
        common::legacy_record(name, pass_by_ref, 0, false)
    }

    #[inline]
    fn zend_arg_info_with_type(
        pass_by_ref: bool,
        name: *const c_char,
        type_code: u8,
        allow_null: bool,
        _default_value: *const c_char,
    ) -> Self::ArgInfo {
        common::legacy_record(name, pass_by_ref, type_code, allow_null)
    }
}
