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
    function::ZendFunction,
    hash::HashTable,
    object::ZendObject,
    resource::ZendResource,
    string::ZendString,
    types::{ZendLong, Zval},
    values::{convert_to_long, convert_to_string, i_zval_ptr_dtor_nogc, zval_get_long, zval_get_string, zval_ptr_dtor},
    z_addref_p,
    z_arr_p,
    z_dval_p,
    z_lval_p,
    z_obj_p,
    z_objprop_p,
    z_ptr_p,
    z_refcount_p,
    z_refcounted_p,
    z_res_p,
    z_str_p,
    z_strlen_p,
    z_strval_p,
    z_type_info_p,
    z_type_p,
    zval_arr,
    zval_bool,
    zval_copy,
    zval_copy_value,
    zval_double,
    zval_dup,
    zval_false,
    zval_func,
    zval_interned_str,
    zval_long,
    zval_new_arr,
    zval_null,
    zval_obj,
    zval_ptr,
    zval_res,
    zval_str,
    zval_str_copy,
    zval_string,
    zval_stringl,
    zval_true,
    zval_zval,
};

use crate::abi::{Active, CompatDefinition};

/// Stores a new string with the content of the null-terminated `s`.
#[no_mangle]
pub unsafe extern "C" fn phper_zval_string(zv: *mut Zval, s: *const c_char) {
    unsafe { zval_string!(zv, s) }
}

/// Stores a new string with the content of `s[..len]`.
#[no_mangle]
pub unsafe extern "C" fn phper_zval_stringl(zv: *mut Zval, s: *const c_char, len: usize) {
    unsafe { zval_stringl!(zv, s, len) }
}

/// Stores the string handle `s`. The reference owned by the caller moves
/// into `zv`.
#[no_mangle]
pub unsafe extern "C" fn phper_zval_str(zv: *mut Zval, s: *mut ZendString) {
    unsafe { zval_str!(zv, s) }
}

/// Stores a new reference to the string `s`. The caller keeps its own
/// reference.
#[no_mangle]
pub unsafe extern "C" fn phper_zval_str_copy(zv: *mut Zval, s: *mut ZendString) {
    unsafe { zval_str_copy!(zv, s) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_zval_interned_str(zv: *mut Zval, s: *mut ZendString) {
    unsafe { zval_interned_str!(zv, s) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_zval_long(zv: *mut Zval, l: ZendLong) {
    unsafe { zval_long!(zv, l) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_zval_double(zv: *mut Zval, d: f64) {
    unsafe { zval_double!(zv, d) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_zval_null(zv: *mut Zval) {
    unsafe { zval_null!(zv) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_zval_true(zv: *mut Zval) {
    unsafe { zval_true!(zv) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_zval_false(zv: *mut Zval) {
    unsafe { zval_false!(zv) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_zval_bool(zv: *mut Zval, b: bool) {
    unsafe { zval_bool!(zv, b) }
}

/// Stores the array `arr`. The reference owned by the caller moves into
/// `zv`.
#[no_mangle]
pub unsafe extern "C" fn phper_zval_arr(zv: *mut Zval, arr: *mut HashTable) {
    unsafe { zval_arr!(zv, arr) }
}

/// Stores a new empty array.
#[no_mangle]
pub unsafe extern "C" fn phper_zval_new_arr(zv: *mut Zval) {
    unsafe { zval_new_arr!(zv) }
}

/// Stores a new empty array. Divergent.
#[no_mangle]
pub unsafe extern "C" fn phper_array_init(arg: *mut Zval) {
    unsafe { Active::array_init(arg) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_zval_obj(zv: *mut Zval, obj: *mut ZendObject) {
    unsafe { zval_obj!(zv, obj) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_zval_res(zv: *mut Zval, res: *mut ZendResource) {
    unsafe { zval_res!(zv, res) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_zval_ptr(zv: *mut Zval, ptr: *mut c_void) {
    unsafe { zval_ptr!(zv, ptr) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_zval_func(zv: *mut Zval, func: *mut ZendFunction) {
    unsafe { zval_func!(zv, func) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_zval_get_type(zv: *const Zval) -> u8 {
    unsafe { z_type_p!(zv) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_z_type_info_p(zv: *const Zval) -> u32 {
    unsafe { z_type_info_p!(zv) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_z_lval_p(zv: *const Zval) -> ZendLong {
    unsafe { z_lval_p!(zv) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_z_dval_p(zv: *const Zval) -> f64 {
    unsafe { z_dval_p!(zv) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_z_str_p(zv: *const Zval) -> *mut ZendString {
    unsafe { z_str_p!(zv) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_z_strval_p(zv: *const Zval) -> *mut c_char {
    unsafe { z_strval_p!(zv) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_z_strlen_p(zv: *const Zval) -> usize {
    unsafe { z_strlen_p!(zv) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_z_arr_p(zv: *const Zval) -> *mut HashTable {
    unsafe { z_arr_p!(zv) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_z_obj_p(zv: *const Zval) -> *mut ZendObject {
    unsafe { z_obj_p!(zv) }
}

/// Returns the property table of an object value, building it on first
/// use.
#[no_mangle]
pub unsafe extern "C" fn phper_z_obj_ht_p(zv: *const Zval) -> *mut HashTable {
    unsafe { z_objprop_p!(zv) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_z_res_p(zv: *const Zval) -> *mut ZendResource {
    unsafe { z_res_p!(zv) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_z_ptr_p(zv: *const Zval) -> *mut c_void {
    unsafe { z_ptr_p!(zv) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_z_refcounted_p(zv: *const Zval) -> bool {
    unsafe { z_refcounted_p!(zv) }
}

/// Returns the reference counter of a refcounted value.
#[no_mangle]
pub unsafe extern "C" fn phper_z_refcount_p(zv: *const Zval) -> u32 {
    unsafe { z_refcount_p!(zv) }
}

/// Adds a reference to a refcounted value and returns the new counter.
#[no_mangle]
pub unsafe extern "C" fn phper_z_addref_p(zv: *mut Zval) -> u32 {
    unsafe { z_addref_p!(zv) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_zval_get_long(op: *const Zval) -> ZendLong {
    unsafe { zval_get_long(op) }
}

/// Returns the string form of a value as a new string owned by the caller.
#[no_mangle]
pub unsafe extern "C" fn phper_zval_get_string(op: *const Zval) -> *mut ZendString {
    unsafe { zval_get_string(op) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_convert_to_long(op: *mut Zval) {
    unsafe { convert_to_long(op) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_convert_to_string(op: *mut Zval) {
    unsafe { convert_to_string(op) }
}

/// Stores `zv` into `z`.
///
/// With `copy` set and `dtor` unset, `z` receives a new reference and the
/// caller keeps the reference held by `zv`. Otherwise the reference moves
/// to `z`, and `zv` must not be released afterwards.
#[no_mangle]
pub unsafe extern "C" fn phper_zval_zval(z: *mut Zval, zv: *mut Zval, copy: bool, dtor: bool) {
    unsafe { zval_zval!(z, zv, copy, dtor) }
}

/// Copies `v` into `z`. Arrays are duplicated, other payloads get a new
/// reference.
#[no_mangle]
pub unsafe extern "C" fn phper_zval_dup(z: *mut Zval, v: *const Zval) {
    unsafe { zval_dup!(z, v) }
}

/// Copies `v` into `z` and adds a reference to the payload.
#[no_mangle]
pub unsafe extern "C" fn phper_zval_copy(z: *mut Zval, v: *const Zval) {
    unsafe { zval_copy!(z, v) }
}

/// Copies `v` into `z` without touching reference counters.
#[no_mangle]
pub unsafe extern "C" fn phper_zval_copy_value(z: *mut Zval, v: *const Zval) {
    unsafe { zval_copy_value!(z, v) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_zval_ptr_dtor(zv: *mut Zval) {
    unsafe { zval_ptr_dtor(zv) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_zval_ptr_dtor_nogc(zv: *mut Zval) {
    unsafe { i_zval_ptr_dtor_nogc(zv) }
}
