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

//! Call frames and function calls.
//!
//! A frame is a [ZendExecuteData] header followed by the passed arguments,
//! starting at value slot [ZEND_CALL_FRAME_SLOT].

use std::{
    ffi::{c_char, c_void},
    mem::size_of,
    ptr::{addr_of_mut, null_mut},
};

use log::warn;

use crate::{
    alloc::{efree, emalloc},
    function::{zend_hash_find_function, ZendFunction, ZEND_ACC_STATIC},
    globals::{current_execute_data, eg_function_table, set_current_execute_data},
    hash::{zend_hash_num_elements, HashTable},
    object::{zend_lookup_class, ZendClassEntry, ZendObject},
    string::zstr_bytes,
    types::{ZendResultCode, Zval, FAILURE, IS_NULL, IS_OBJECT, IS_OBJECT_EX, IS_STRING, SUCCESS},
    values::zval_ptr_dtor,
};

/// An active call frame.
#[repr(C)]
pub struct ZendExecuteData {
    pub func: *mut ZendFunction,

    /// The called object, or undefined for plain calls. The `u2` word holds
    /// the number of passed arguments.
    pub this: Zval,

    pub return_value: *mut Zval,
    pub prev_execute_data: *mut ZendExecuteData,
}

/// The value slot of the first argument, counted from the frame start.
pub const ZEND_CALL_FRAME_SLOT: usize = size_of::<ZendExecuteData>().div_ceil(size_of::<Zval>());

/// A call request for [zend_call_function].
#[repr(C)]
pub struct ZendFcallInfo {
    pub size: usize,
    pub function_name: Zval,
    pub retval: *mut Zval,
    pub params: *mut Zval,
    pub object: *mut ZendObject,
    pub param_count: u32,
    pub named_params: *mut HashTable,
}

/// # Safety
///
/// `execute_data` points to an active frame.
#[inline(always)]
pub unsafe fn zend_call_num_args(execute_data: *const ZendExecuteData) -> u32 {
    unsafe { (*execute_data).this.u2 }
}

/// Returns the value slot `n` of a frame, counted from zero.
///
/// # Safety
///
/// `execute_data` points to an active frame.
#[inline(always)]
pub unsafe fn zend_call_var_num(execute_data: *mut ZendExecuteData, n: usize) -> *mut Zval {
    unsafe { (execute_data as *mut Zval).add(ZEND_CALL_FRAME_SLOT + n) }
}

/// Returns the passed argument `n`, counted from one.
///
/// # Safety
///
/// `execute_data` points to an active frame and `n` is within the passed
/// arguments.
#[inline(always)]
pub unsafe fn zend_call_arg(execute_data: *mut ZendExecuteData, n: usize) -> *mut Zval {
    unsafe { zend_call_var_num(execute_data, n - 1) }
}

/// Returns the called object of a method call, or null.
///
/// # Safety
///
/// `execute_data` points to an active frame.
#[inline]
pub unsafe fn get_this(execute_data: *mut ZendExecuteData) -> *mut Zval {
    unsafe {
        match (*execute_data).this.ty() == IS_OBJECT {
            true => addr_of_mut!((*execute_data).this),
            false => null_mut(),
        }
    }
}

unsafe fn push_call_frame(
    func: *mut ZendFunction,
    object: *mut ZendObject,
    params: *const Zval,
    param_count: u32,
) -> *mut ZendExecuteData {
    unsafe {
        let slots = ZEND_CALL_FRAME_SLOT + param_count as usize;
        let frame = emalloc(slots * size_of::<Zval>()) as *mut ZendExecuteData;

        let mut this = Zval::undef();

        if !object.is_null() {
            this.value.obj = object;
            this.type_info = IS_OBJECT_EX;
        }

        this.u2 = param_count;

        frame.write(ZendExecuteData {
            func,
            this,
            return_value: null_mut(),
            prev_execute_data: current_execute_data(),
        });

        for index in 0..param_count as usize {
            let arg = *params.add(index);

            if arg.is_refcounted() {
                (*arg.value.counted).refcount += 1;
            }

            zend_call_var_num(frame, index).write(arg);
        }

        frame
    }
}

unsafe fn free_call_frame(frame: *mut ZendExecuteData) {
    unsafe {
        for index in 0..zend_call_num_args(frame) as usize {
            zval_ptr_dtor(zend_call_var_num(frame, index));
        }

        efree(frame as *mut c_void);
    }
}

unsafe fn find_method(mut ce: *mut ZendClassEntry, name: &[u8]) -> *mut ZendFunction {
    unsafe {
        while !ce.is_null() {
            let method = zend_hash_find_function((*ce).function_table, name.as_ptr() as *const c_char, name.len());

            if !method.is_null() {
                return method;
            }

            ce = (*ce).parent;
        }

        null_mut()
    }
}

unsafe fn resolve(fci: *const ZendFcallInfo) -> Option<(*mut ZendFunction, *mut ZendObject)> {
    unsafe {
        if (*fci).function_name.ty() != IS_STRING {
            return None;
        }

        let name = zstr_bytes((*fci).function_name.value.str_);
        let object = (*fci).object;

        if !object.is_null() {
            let method = find_method((*object).ce, name);

            return match method.is_null() {
                true => None,
                false => Some((method, object)),
            };
        }

        if let Some(separator) = name.windows(2).position(|window| window == b"::") {
            let class = &name[..separator];
            let ce = zend_lookup_class(class.as_ptr() as *const c_char, class.len());

            if ce.is_null() {
                return None;
            }

            let method = find_method(ce, &name[separator + 2..]);

            return match method.is_null() || (*method).fn_flags & ZEND_ACC_STATIC == 0 {
                true => None,
                false => Some((method, null_mut())),
            };
        }

        let function = zend_hash_find_function(eg_function_table(), name.as_ptr() as *const c_char, name.len());

        match function.is_null() {
            true => None,
            false => Some((function, null_mut())),
        }
    }
}

/// Calls a function or method by name.
///
/// The callee is looked up among the methods of `fci.object` when it is
/// set, as a static method for `Class::method` names, or among the global
/// functions otherwise. The arguments are passed by value, the callee
/// receives its own references. `fci.retval` is set to null before the
/// call.
///
/// Returns `FAILURE` and leaves `fci.retval` undefined if the callee cannot
/// be resolved, or if named parameters are passed.
///
/// # Safety
///
/// `fci` points to an initialized call request whose `params` hold
/// `param_count` initialized values.
pub unsafe fn zend_call_function(fci: *mut ZendFcallInfo) -> ZendResultCode {
    unsafe {
        let retval = (*fci).retval;

        retval.write(Zval::undef());

        let named_params = (*fci).named_params;

        if !named_params.is_null() && zend_hash_num_elements(named_params) > 0 {
            warn!("Named parameters are not supported by internal calls");
            return FAILURE;
        }

        let Some((func, object)) = resolve(fci) else {
            let name: &[u8] = match (*fci).function_name.ty() == IS_STRING {
                true => zstr_bytes((*fci).function_name.value.str_),
                false => b"(non-string)",
            };

            warn!("Invalid callback {}", String::from_utf8_lossy(name));
            return FAILURE;
        };

        let Some(handler) = (*func).handler else {
            return FAILURE;
        };

        let frame = push_call_frame(func, object, (*fci).params, (*fci).param_count);

        (*frame).return_value = retval;
        (*retval).type_info = IS_NULL as u32;

        set_current_execute_data(frame);

        handler(frame, retval);

        set_current_execute_data((*frame).prev_execute_data);

        free_call_frame(frame);

        SUCCESS
    }
}

/// Calls `function_name` on `object`, or as a plain function when `object`
/// is null or not an object.
///
/// Available on hosts 8.0 and newer.
///
/// # Safety
///
/// `function_name` points to a string value, `retval_ptr` to writable value
/// storage, and `params` to `param_count` initialized values.
pub unsafe fn _call_user_function_impl(
    object: *mut Zval,
    function_name: *mut Zval,
    retval_ptr: *mut Zval,
    param_count: u32,
    params: *mut Zval,
    named_params: *mut HashTable,
) -> ZendResultCode {
    unsafe {
        let mut fci = ZendFcallInfo {
            size: size_of::<ZendFcallInfo>(),
            function_name: *function_name,
            retval: retval_ptr,
            params,
            object: match !object.is_null() && (*object).ty() == IS_OBJECT {
                true => (*object).value.obj,
                false => null_mut(),
            },
            param_count,
            named_params,
        };

        zend_call_function(&mut fci)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        alloc::heap_stats,
        function::{zend_register_functions, ZendFunctionEntry},
        hash::zend_new_array,
        object::{init_class_entry_ex, object_init_ex, zend_register_internal_class_ex},
        string::{zend_string_from_bytes, zend_string_refcount},
        types::{IS_LONG, IS_STRING_EX, IS_UNDEF},
        values::zval_get_long,
    };
    use std::ptr::null;

    unsafe extern "C" fn sum(execute_data: *mut ZendExecuteData, return_value: *mut Zval) {
        unsafe {
            let mut total = 0;

            for n in 1..=zend_call_num_args(execute_data) as usize {
                total += zval_get_long(zend_call_arg(execute_data, n));
            }

            (*return_value).value.lval = total;
            (*return_value).type_info = IS_LONG as u32;
        }
    }

    unsafe extern "C" fn this_handle(execute_data: *mut ZendExecuteData, return_value: *mut Zval) {
        unsafe {
            let this = get_this(execute_data);

            (*return_value).value.lval = match this.is_null() {
                true => -1,
                false => (*(*this).value.obj).handle as i64,
            };

            (*return_value).type_info = IS_LONG as u32;
        }
    }

    fn string(bytes: &[u8]) -> Zval {
        let mut zv = Zval::undef();
        zv.value.str_ = zend_string_from_bytes(bytes, false);
        zv.type_info = IS_STRING_EX;
        zv
    }

    fn long(value: i64) -> Zval {
        let mut zv = Zval::undef();
        zv.value.lval = value;
        zv.type_info = IS_LONG as u32;
        zv
    }

    #[test]
    fn test_frame_layout() {
        assert!(ZEND_CALL_FRAME_SLOT * size_of::<Zval>() >= size_of::<ZendExecuteData>());
    }

    #[test]
    fn test_call_global_function() {
        let functions = [
            ZendFunctionEntry {
                fname: c"execute_test_sum".as_ptr(),
                handler: Some(sum),
                arg_info: null(),
                num_args: 0,
                flags: 0,
            },
            ZendFunctionEntry::end(),
        ];

        let before = heap_stats();

        unsafe {
            let _ = zend_register_functions(null_mut(), functions.as_ptr(), null_mut());

            let mut name = string(b"Execute_Test_Sum");
            let mut params = [long(2), long(3), string(b"37")];
            let mut retval = Zval::undef();

            let result = _call_user_function_impl(
                null_mut(),
                &mut name,
                &mut retval,
                3,
                params.as_mut_ptr(),
                null_mut(),
            );

            assert_eq!(result, SUCCESS);
            assert_eq!(retval.ty(), IS_LONG);
            assert_eq!(retval.value.lval, 42);
            assert_eq!(zend_string_refcount(params[2].value.str_), 1);
            assert!(current_execute_data().is_null());

            zval_ptr_dtor(&mut params[2]);
            zval_ptr_dtor(&mut name);
        }

        assert_eq!(heap_stats().request_blocks, before.request_blocks);
    }

    #[test]
    fn test_call_method_sees_this() {
        let methods = [
            ZendFunctionEntry {
                fname: c"handle".as_ptr(),
                handler: Some(this_handle),
                arg_info: null(),
                num_args: 0,
                flags: 0,
            },
            ZendFunctionEntry::end(),
        ];

        unsafe {
            let mut ce = ZendClassEntry::default();
            init_class_entry_ex(&mut ce, c"ExecuteThis".as_ptr(), 11, methods.as_ptr());
            let ce = zend_register_internal_class_ex(&mut ce, null_mut());

            let mut object = Zval::undef();
            assert_eq!(object_init_ex(&mut object, ce), SUCCESS);

            let mut name = string(b"handle");
            let mut retval = Zval::undef();

            let result = _call_user_function_impl(&mut object, &mut name, &mut retval, 0, null_mut(), null_mut());

            assert_eq!(result, SUCCESS);
            assert_eq!(retval.value.lval, (*object.value.obj).handle as i64);

            zval_ptr_dtor(&mut name);
            zval_ptr_dtor(&mut object);
        }
    }

    #[test]
    fn test_unknown_function_fails() {
        unsafe {
            let mut name = string(b"execute_test_missing");
            let mut retval = long(1);

            let result = _call_user_function_impl(null_mut(), &mut name, &mut retval, 0, null_mut(), null_mut());

            assert_eq!(result, FAILURE);
            assert_eq!(retval.ty(), IS_UNDEF);

            zval_ptr_dtor(&mut name);
        }
    }

    #[test]
    fn test_named_params_are_rejected() {
        unsafe {
            let named = zend_new_array(0);
            let mut value = long(1);
            let _ = crate::hash::zend_hash_str_update(named, c"x".as_ptr(), 1, &mut value);

            let mut name = string(b"strlen");
            let mut retval = Zval::undef();

            let result = _call_user_function_impl(null_mut(), &mut name, &mut retval, 0, null_mut(), named);
            assert_eq!(result, FAILURE);

            zval_ptr_dtor(&mut name);
            crate::hash::zend_array_destroy(named);
        }
    }
}
