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
    ffi::{c_char, c_void, CStr},
    mem::size_of,
    ptr::{null, null_mut},
};

use log::{trace, warn};

use crate::{
    alloc::{pefree, pemalloc},
    arginfo::{required_num_args, ZendInternalArgInfo},
    execute::ZendExecuteData,
    globals::eg_function_table,
    hash::{
        zend_hash_buckets, zend_hash_destroy, zend_hash_num_elements, zend_hash_str_exists,
        zend_hash_str_find_ptr, zend_hash_str_update_ptr, HashTable,
    },
    object::ZendClassEntry,
    string::{zend_string_from_bytes, zend_string_init_interned, zstr_bytes, ZendString},
    types::{ZendResultCode, Zval, FAILURE, IS_PTR, SUCCESS},
};

pub const ZEND_INTERNAL_FUNCTION: u8 = 1;

pub const ZEND_ACC_PUBLIC: u32 = 1 << 0;
pub const ZEND_ACC_STATIC: u32 = 1 << 4;

/// The native handler of an internal function.
pub type ZifHandler = unsafe extern "C" fn(execute_data: *mut ZendExecuteData, return_value: *mut Zval);

/// One entry of a function or method list. A list ends with
/// [ZendFunctionEntry::end].
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct ZendFunctionEntry {
    pub fname: *const c_char,
    pub handler: Option<ZifHandler>,
    pub arg_info: *const ZendInternalArgInfo,
    pub num_args: u32,
    pub flags: u32,
}

impl ZendFunctionEntry {
    #[inline(always)]
    pub const fn end() -> Self {
        Self {
            fname: null(),
            handler: None,
            arg_info: null(),
            num_args: 0,
            flags: 0,
        }
    }
}

/// A registered function or method.
#[repr(C)]
pub struct ZendFunction {
    pub type_: u8,
    pub fn_flags: u32,
    pub function_name: *mut ZendString,
    pub scope: *mut ZendClassEntry,
    pub num_args: u32,
    pub required_num_args: u32,
    pub arg_info: *const ZendInternalArgInfo,
    pub handler: Option<ZifHandler>,
}

/// Registers a list of functions into `function_table`, or into the global
/// function table when `function_table` is null. Names are matched
/// case-insensitively.
///
/// Returns `FAILURE` if any entry duplicates an existing name. The
/// duplicates are skipped, the other entries stay registered.
///
/// # Safety
///
/// `functions` points to an entry list terminated by
/// [ZendFunctionEntry::end], `scope` is null or points to a class entry,
/// and `function_table` is null or points to a persistent table.
pub unsafe fn zend_register_functions(
    scope: *mut ZendClassEntry,
    functions: *const ZendFunctionEntry,
    function_table: *mut HashTable,
) -> ZendResultCode {
    let function_table = match function_table.is_null() {
        true => eg_function_table(),
        false => function_table,
    };

    let mut result = SUCCESS;
    let mut entry = functions;

    unsafe {
        while !(*entry).fname.is_null() {
            let name = CStr::from_ptr((*entry).fname).to_bytes();
            let key = name.to_ascii_lowercase();

            if zend_hash_str_exists(function_table, key.as_ptr() as *const c_char, key.len()) {
                warn!(
                    "Function registration failed - duplicate name - {}",
                    String::from_utf8_lossy(name),
                );

                result = FAILURE;
                entry = entry.add(1);
                continue;
            }

            let arg_info = (*entry).arg_info;

            let function = pemalloc(size_of::<ZendFunction>(), true) as *mut ZendFunction;

            function.write(ZendFunction {
                type_: ZEND_INTERNAL_FUNCTION,
                fn_flags: match (*entry).flags {
                    0 => ZEND_ACC_PUBLIC,
                    flags => flags,
                },
                function_name: zend_string_init_interned((*entry).fname, name.len(), true),
                scope,
                num_args: (*entry).num_args,
                required_num_args: required_num_args(arg_info as *const c_void),
                arg_info: match arg_info.is_null() {
                    true => null(),
                    false => arg_info.add(1),
                },
                handler: (*entry).handler,
            });

            let _ = zend_hash_str_update_ptr(
                function_table,
                key.as_ptr() as *const c_char,
                key.len(),
                function as *mut c_void,
            );

            trace!("registered function {:?}", String::from_utf8_lossy(name));

            entry = entry.add(1);
        }
    }

    result
}

/// Looks up a function of `function_table` by case-insensitive name.
///
/// # Safety
///
/// `function_table` points to a function table and `name` to `len`
/// readable bytes.
pub unsafe fn zend_hash_find_function(
    function_table: *const HashTable,
    name: *const c_char,
    len: usize,
) -> *mut ZendFunction {
    unsafe {
        let key = std::slice::from_raw_parts(name as *const u8, len).to_ascii_lowercase();

        zend_hash_str_find_ptr(function_table, key.as_ptr() as *const c_char, key.len()) as *mut ZendFunction
    }
}

/// Returns the qualified name of a function: `Scope::name` for methods,
/// the bare name for plain functions or for a scope without a name, and
/// `main` when `func` has no name.
///
/// The result is always a new request-bound string owned by the caller.
///
/// Available on hosts 8.0 and newer.
///
/// # Safety
///
/// `func` points to a live function record.
pub unsafe fn get_function_or_method_name(func: *const ZendFunction) -> *mut ZendString {
    unsafe {
        let name = (*func).function_name;

        if name.is_null() {
            return zend_string_from_bytes(b"main", false);
        }

        let scope = (*func).scope;

        if scope.is_null() || (*scope).name.is_null() {
            return zend_string_from_bytes(zstr_bytes(name), false);
        }

        let qualified = [zstr_bytes((*scope).name), b"::", zstr_bytes(name)].concat();

        zend_string_from_bytes(&qualified, false)
    }
}

pub(crate) unsafe fn destroy_function_table(ht: *mut HashTable) -> usize {
    unsafe {
        let count = zend_hash_num_elements(ht) as usize;

        for bucket in zend_hash_buckets(ht) {
            if bucket.val.ty() != IS_PTR {
                continue;
            }

            pefree(bucket.val.value.ptr, true);
        }

        zend_hash_destroy(ht);
        pefree(ht as *mut c_void, true);

        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        arginfo::ZendType,
        hash::new_persistent_table,
        object::{init_class_entry_ex, zend_register_internal_class_ex},
        string::{zend_string_release, zstr_val},
    };

    unsafe extern "C" fn noop(_execute_data: *mut ZendExecuteData, _return_value: *mut Zval) {}

    #[test]
    fn test_register_functions() {
        let arg_info = [
            ZendInternalArgInfo {
                name: 1usize as *const c_char,
                type_: ZendType::none(0),
                default_value: null(),
            },
            ZendInternalArgInfo {
                name: c"value".as_ptr(),
                type_: ZendType::none(0),
                default_value: null(),
            },
        ];

        let functions = [
            ZendFunctionEntry {
                fname: c"Register_Me".as_ptr(),
                handler: Some(noop),
                arg_info: arg_info.as_ptr(),
                num_args: 1,
                flags: 0,
            },
            ZendFunctionEntry::end(),
        ];

        unsafe {
            let table = new_persistent_table(8);

            assert_eq!(zend_register_functions(null_mut(), functions.as_ptr(), table), SUCCESS);
            assert_eq!(zend_register_functions(null_mut(), functions.as_ptr(), table), FAILURE);

            let function = zend_hash_find_function(table, c"register_me".as_ptr(), 11);

            assert!(!function.is_null());
            assert_eq!((*function).num_args, 1);
            assert_eq!((*function).required_num_args, 1);
            assert_eq!(zstr_bytes((*function).function_name), b"Register_Me");
            assert_eq!((*function).arg_info, arg_info.as_ptr().add(1));

            assert_eq!(destroy_function_table(table), 1);
        }
    }

    #[test]
    fn test_qualified_names() {
        let methods = [
            ZendFunctionEntry {
                fname: c"bar".as_ptr(),
                handler: Some(noop),
                arg_info: null(),
                num_args: 0,
                flags: 0,
            },
            ZendFunctionEntry::end(),
        ];

        unsafe {
            let mut ce = ZendClassEntry::default();
            init_class_entry_ex(&mut ce, c"QualifiedFoo".as_ptr(), 12, methods.as_ptr());
            let ce = zend_register_internal_class_ex(&mut ce, null_mut());

            let method = zend_hash_find_function((*ce).function_table, c"bar".as_ptr(), 3);
            let name = get_function_or_method_name(method);
            assert_eq!(zstr_bytes(name), b"QualifiedFoo::bar");
            assert_eq!(*zstr_val(name).add(17), 0);
            zend_string_release(name);

            let mut function = ZendFunction {
                type_: ZEND_INTERNAL_FUNCTION,
                fn_flags: 0,
                function_name: zend_string_from_bytes(b"baz", false),
                scope: null_mut(),
                num_args: 0,
                required_num_args: 0,
                arg_info: null(),
                handler: None,
            };

            let name = get_function_or_method_name(&function);
            assert_eq!(zstr_bytes(name), b"baz");
            assert_ne!(name, function.function_name);
            zend_string_release(name);
            zend_string_release(function.function_name);

            function.function_name = null_mut();

            let name = get_function_or_method_name(&function);
            assert_eq!(zstr_bytes(name), b"main");
            zend_string_release(name);
        }
    }
}
