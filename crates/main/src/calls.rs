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

use zend_compat_engine::{
    execute::ZendExecuteData,
    function::ZendFunction,
    get_this,
    hash::HashTable,
    types::Zval,
    zend_call_arg,
    zend_call_num_args,
};

use crate::abi::{Active, CompatDefinition};

/// Calls the function named by `function_name` with `param_count` values
/// of `params`, storing the result in `retval_ptr`.
///
/// With a non-null `object`, the name refers to a method of that object.
/// The `function_table` is ignored and may be null. Returns false if the
/// callee cannot be resolved. Divergent.
#[no_mangle]
pub unsafe extern "C" fn phper_call_user_function(
    function_table: *mut HashTable,
    object: *mut Zval,
    function_name: *mut Zval,
    retval_ptr: *mut Zval,
    param_count: u32,
    params: *mut Zval,
) -> bool {
    unsafe { Active::call_user_function(function_table, object, function_name, retval_ptr, param_count, params) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_zend_call_num_args(execute_data: *const ZendExecuteData) -> u32 {
    unsafe { zend_call_num_args!(execute_data) }
}

/// Returns the passed argument `index`, counted from one.
#[no_mangle]
pub unsafe extern "C" fn phper_execute_data_call_arg(execute_data: *mut ZendExecuteData, index: usize) -> *mut Zval {
    unsafe { zend_call_arg!(execute_data, index) }
}

/// Returns the called object of a method call, or null.
#[no_mangle]
pub unsafe extern "C" fn phper_get_this(execute_data: *mut ZendExecuteData) -> *mut Zval {
    unsafe { get_this!(execute_data) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_execute_data_func(execute_data: *const ZendExecuteData) -> *mut ZendFunction {
    unsafe { (*execute_data).func }
}

#[cfg(test)]
mod tests {
    use std::ptr::{null, null_mut};

    use zend_compat_engine::{
        alloc::heap_stats,
        function::{zend_register_functions, ZendFunctionEntry},
        object::{init_class_entry_ex, object_init_ex, zend_register_internal_class_ex, ZendClassEntry},
        string::zstr_bytes,
        types::{IS_LONG, IS_STRING, IS_UNDEF, SUCCESS},
        values::{zval_get_long, zval_ptr_dtor},
        z_lval_p,
        zval_long,
        zval_str,
        zval_stringl,
    };

    use super::*;

    unsafe extern "C" fn describe(execute_data: *mut ZendExecuteData, return_value: *mut Zval) {
        unsafe {
            let mut total = 0;

            for index in 1..=phper_zend_call_num_args(execute_data) as usize {
                total += zval_get_long(phper_execute_data_call_arg(execute_data, index));
            }

            if !phper_get_this(execute_data).is_null() {
                total += 1000;
            }

            zval_long!(return_value, total);
        }
    }

    unsafe extern "C" fn own_name(execute_data: *mut ZendExecuteData, return_value: *mut Zval) {
        unsafe {
            let func = phper_execute_data_func(execute_data);
            zval_str!(return_value, Active::get_function_or_method_name(func));
        }
    }

    #[test]
    fn test_function_call() {
        let functions = [
            ZendFunctionEntry {
                fname: c"describe".as_ptr(),
                handler: Some(describe),
                arg_info: null(),
                num_args: 0,
                flags: 0,
            },
            ZendFunctionEntry {
                fname: c"own_name".as_ptr(),
                handler: Some(own_name),
                arg_info: null(),
                num_args: 0,
                flags: 0,
            },
            ZendFunctionEntry::end(),
        ];

        unsafe {
            assert_eq!(zend_register_functions(null_mut(), functions.as_ptr(), null_mut()), SUCCESS);

            let mut name = Zval::undef();
            zval_stringl!(&mut name, c"describe".as_ptr(), 8);

            let mut params = [Zval::undef(), Zval::undef(), Zval::undef()];
            zval_long!(&mut params[0], 1);
            zval_long!(&mut params[1], 2);
            zval_stringl!(&mut params[2], c"39".as_ptr(), 2);

            let mut retval = Zval::undef();

            assert!(phper_call_user_function(
                null_mut(),
                null_mut(),
                &mut name,
                &mut retval,
                3,
                params.as_mut_ptr(),
            ));

            assert_eq!(retval.ty(), IS_LONG);
            assert_eq!(z_lval_p!(&retval), 42);

            zval_ptr_dtor(&mut name);
            zval_stringl!(&mut name, c"own_name".as_ptr(), 8);

            assert!(phper_call_user_function(
                null_mut(),
                null_mut(),
                &mut name,
                &mut retval,
                0,
                null_mut(),
            ));

            assert_eq!(retval.ty(), IS_STRING);
            assert_eq!(zstr_bytes(retval.value.str_), b"own_name");

            zval_ptr_dtor(&mut retval);
            zval_ptr_dtor(&mut name);
            zval_ptr_dtor(&mut params[2]);

            assert_eq!(heap_stats().request_blocks, 0);
        }
    }

    #[test]
    fn test_method_call() {
        let methods = [
            ZendFunctionEntry {
                fname: c"describe".as_ptr(),
                handler: Some(describe),
                arg_info: null(),
                num_args: 0,
                flags: 0,
            },
            ZendFunctionEntry {
                fname: c"ownName".as_ptr(),
                handler: Some(own_name),
                arg_info: null(),
                num_args: 0,
                flags: 0,
            },
            ZendFunctionEntry::end(),
        ];

        unsafe {
            let mut ce = ZendClassEntry::default();
            init_class_entry_ex(&mut ce, c"Reporter".as_ptr(), 8, methods.as_ptr());
            let ce = zend_register_internal_class_ex(&mut ce, null_mut());

            let mut object = Zval::undef();
            assert_eq!(object_init_ex(&mut object, ce), SUCCESS);

            let mut name = Zval::undef();
            zval_stringl!(&mut name, c"DESCRIBE".as_ptr(), 8);

            let mut params = [Zval::undef()];
            zval_long!(&mut params[0], 7);

            let mut retval = Zval::undef();

            assert!(phper_call_user_function(
                null_mut(),
                &mut object,
                &mut name,
                &mut retval,
                1,
                params.as_mut_ptr(),
            ));

            assert_eq!(z_lval_p!(&retval), 1007);

            zval_ptr_dtor(&mut name);
            zval_stringl!(&mut name, c"ownName".as_ptr(), 7);

            assert!(phper_call_user_function(
                null_mut(),
                &mut object,
                &mut name,
                &mut retval,
                0,
                null_mut(),
            ));

            assert_eq!(zstr_bytes(retval.value.str_), b"Reporter::ownName");

            zval_ptr_dtor(&mut retval);
            zval_ptr_dtor(&mut name);
            zval_ptr_dtor(&mut object);

            assert_eq!(heap_stats().request_blocks, 0);
        }
    }

    #[test]
    fn test_unresolved_call() {
        unsafe {
            let mut name = Zval::undef();
            zval_stringl!(&mut name, c"missing_function".as_ptr(), 16);

            let mut retval = Zval::undef();
            zval_long!(&mut retval, 5);

            assert!(!phper_call_user_function(
                null_mut(),
                null_mut(),
                &mut name,
                &mut retval,
                0,
                null_mut(),
            ));

            assert_eq!(retval.ty(), IS_UNDEF);

            zval_ptr_dtor(&mut name);

            assert_eq!(heap_stats().request_blocks, 0);
        }
    }
}
