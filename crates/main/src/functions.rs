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

use std::ffi::c_char;

use zend_compat_engine::{function::ZendFunction, string::ZendString, ZEND_MODULE_BUILD_ID};

use crate::abi::{Active, ActiveArgInfo, CompatDefinition};

/// Returns the qualified name of `func`: `Scope::name` for methods, the
/// bare name for plain functions, or `main` for a function without a name.
/// The result is a new string owned by the caller. Divergent.
#[no_mangle]
pub unsafe extern "C" fn phper_get_function_or_method_name(func: *const ZendFunction) -> *mut ZendString {
    unsafe { Active::get_function_or_method_name(func) }
}

/// Builds the leading record of an argument list in the host's native
/// layout. Divergent.
#[no_mangle]
pub unsafe extern "C" fn phper_zend_begin_arg_info_ex(return_reference: bool, required_num_args: usize) -> ActiveArgInfo {
    Active::zend_begin_arg_info_ex(return_reference, required_num_args)
}

/// Builds an untyped argument record in the host's native layout.
/// Divergent.
#[no_mangle]
pub unsafe extern "C" fn phper_zend_arg_info(pass_by_ref: bool, name: *const c_char) -> ActiveArgInfo {
    Active::zend_arg_info(pass_by_ref, name)
}

/// Builds a typed argument record in the host's native layout. Hosts older
/// than 8.0 drop the `default_value` text. Divergent.
#[no_mangle]
pub unsafe extern "C" fn phper_zend_arg_info_with_type(
    pass_by_ref: bool,
    name: *const c_char,
    type_code: u8,
    allow_null: bool,
    default_value: *const c_char,
) -> ActiveArgInfo {
    Active::zend_arg_info_with_type(pass_by_ref, name, type_code, allow_null, default_value)
}

#[no_mangle]
pub unsafe extern "C" fn phper_get_function_num_args(func: *const ZendFunction) -> u32 {
    unsafe { (*func).num_args }
}

#[no_mangle]
pub unsafe extern "C" fn phper_get_function_required_num_args(func: *const ZendFunction) -> u32 {
    unsafe { (*func).required_num_args }
}

/// Returns the build id of the host as a static null-terminated string.
#[no_mangle]
pub unsafe extern "C" fn phper_get_zend_module_build_id() -> *const c_char {
    ZEND_MODULE_BUILD_ID.as_ptr()
}
