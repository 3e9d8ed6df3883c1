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

//! The host's value, string, frame and registration macros.
//!
//! Every macro expands to raw pointer operations and must be used inside an
//! `unsafe` context with pointers that satisfy the documented
//! preconditions of the primitives it expands to.

#[macro_export]
macro_rules! z_type_p {
    ($zv:expr) => {
        (*$zv).ty()
    };
}

#[macro_export]
macro_rules! z_type_info_p {
    ($zv:expr) => {
        (*$zv).type_info
    };
}

#[macro_export]
macro_rules! z_lval_p {
    ($zv:expr) => {
        (*$zv).value.lval
    };
}

#[macro_export]
macro_rules! z_dval_p {
    ($zv:expr) => {
        (*$zv).value.dval
    };
}

#[macro_export]
macro_rules! z_str_p {
    ($zv:expr) => {
        (*$zv).value.str_
    };
}

#[macro_export]
macro_rules! z_strval_p {
    ($zv:expr) => {
        $crate::string::zstr_val($crate::z_str_p!($zv))
    };
}

#[macro_export]
macro_rules! z_strlen_p {
    ($zv:expr) => {
        $crate::string::zstr_len($crate::z_str_p!($zv))
    };
}

#[macro_export]
macro_rules! z_arr_p {
    ($zv:expr) => {
        (*$zv).value.arr
    };
}

#[macro_export]
macro_rules! z_obj_p {
    ($zv:expr) => {
        (*$zv).value.obj
    };
}

/// The property table of an object value.
#[macro_export]
macro_rules! z_objprop_p {
    ($zv:expr) => {
        $crate::object::zend_std_get_properties($crate::z_obj_p!($zv))
    };
}

#[macro_export]
macro_rules! z_res_p {
    ($zv:expr) => {
        (*$zv).value.res
    };
}

#[macro_export]
macro_rules! z_ptr_p {
    ($zv:expr) => {
        (*$zv).value.ptr
    };
}

#[macro_export]
macro_rules! z_counted_p {
    ($zv:expr) => {
        (*$zv).value.counted
    };
}

#[macro_export]
macro_rules! z_refcounted_p {
    ($zv:expr) => {
        (*$zv).is_refcounted()
    };
}

#[macro_export]
macro_rules! gc_refcount {
    ($p:expr) => {
        (*$p).gc.refcount
    };
}

#[macro_export]
macro_rules! gc_addref {
    ($p:expr) => {{
        (*$p).gc.refcount += 1;
        (*$p).gc.refcount
    }};
}

#[macro_export]
macro_rules! gc_delref {
    ($p:expr) => {{
        (*$p).gc.refcount -= 1;
        (*$p).gc.refcount
    }};
}

#[macro_export]
macro_rules! z_refcount_p {
    ($zv:expr) => {
        (*$crate::z_counted_p!($zv)).refcount
    };
}

#[macro_export]
macro_rules! z_addref_p {
    ($zv:expr) => {{
        let counted = $crate::z_counted_p!($zv);
        (*counted).refcount += 1;
        (*counted).refcount
    }};
}

#[macro_export]
macro_rules! z_try_addref_p {
    ($zv:expr) => {{
        let zv: *mut $crate::types::Zval = $zv;

        if (*zv).is_refcounted() {
            (*(*zv).value.counted).refcount += 1;
        }
    }};
}

#[macro_export]
macro_rules! zval_undef {
    ($zv:expr) => {
        (*$zv).type_info = $crate::types::IS_UNDEF as u32
    };
}

#[macro_export]
macro_rules! zval_null {
    ($zv:expr) => {
        (*$zv).type_info = $crate::types::IS_NULL as u32
    };
}

#[macro_export]
macro_rules! zval_false {
    ($zv:expr) => {
        (*$zv).type_info = $crate::types::IS_FALSE as u32
    };
}

#[macro_export]
macro_rules! zval_true {
    ($zv:expr) => {
        (*$zv).type_info = $crate::types::IS_TRUE as u32
    };
}

#[macro_export]
macro_rules! zval_bool {
    ($zv:expr, $b:expr) => {
        (*$zv).type_info = match $b {
            true => $crate::types::IS_TRUE as u32,
            false => $crate::types::IS_FALSE as u32,
        }
    };
}

#[macro_export]
macro_rules! zval_long {
    ($zv:expr, $l:expr) => {{
        let zv: *mut $crate::types::Zval = $zv;
        (*zv).value.lval = $l;
        (*zv).type_info = $crate::types::IS_LONG as u32;
    }};
}

#[macro_export]
macro_rules! zval_double {
    ($zv:expr, $d:expr) => {{
        let zv: *mut $crate::types::Zval = $zv;
        (*zv).value.dval = $d;
        (*zv).type_info = $crate::types::IS_DOUBLE as u32;
    }};
}

/// Stores a string handle, keeping the interned flag of the string.
#[macro_export]
macro_rules! zval_str {
    ($zv:expr, $s:expr) => {{
        let zv: *mut $crate::types::Zval = $zv;
        let s: *mut $crate::string::ZendString = $s;
        (*zv).value.str_ = s;
        (*zv).type_info = match $crate::string::zstr_is_interned(s) {
            true => $crate::types::IS_INTERNED_STRING_EX,
            false => $crate::types::IS_STRING_EX,
        };
    }};
}

#[macro_export]
macro_rules! zval_new_str {
    ($zv:expr, $s:expr) => {{
        let zv: *mut $crate::types::Zval = $zv;
        (*zv).value.str_ = $s;
        (*zv).type_info = $crate::types::IS_STRING_EX;
    }};
}

#[macro_export]
macro_rules! zval_interned_str {
    ($zv:expr, $s:expr) => {{
        let zv: *mut $crate::types::Zval = $zv;
        (*zv).value.str_ = $s;
        (*zv).type_info = $crate::types::IS_INTERNED_STRING_EX;
    }};
}

/// Stores a new reference to a string.
#[macro_export]
macro_rules! zval_str_copy {
    ($zv:expr, $s:expr) => {{
        let s: *mut $crate::string::ZendString = $s;
        $crate::zval_str!($zv, $crate::string::zend_string_copy(s));
    }};
}

#[macro_export]
macro_rules! zval_stringl {
    ($zv:expr, $s:expr, $len:expr) => {
        $crate::zval_new_str!($zv, $crate::string::zend_string_init($s, $len, false))
    };
}

#[macro_export]
macro_rules! zval_string {
    ($zv:expr, $s:expr) => {{
        let s: *const ::std::ffi::c_char = $s;
        $crate::zval_stringl!($zv, s, ::std::ffi::CStr::from_ptr(s).to_bytes().len());
    }};
}

#[macro_export]
macro_rules! zval_arr {
    ($zv:expr, $a:expr) => {{
        let zv: *mut $crate::types::Zval = $zv;
        (*zv).value.arr = $a;
        (*zv).type_info = $crate::types::IS_ARRAY_EX;
    }};
}

/// Stores a new empty array.
#[macro_export]
macro_rules! zval_new_arr {
    ($zv:expr) => {
        $crate::zval_arr!($zv, $crate::hash::_zend_new_array(0))
    };
}

/// The array initializer of hosts 7.3 and newer.
#[macro_export]
macro_rules! array_init {
    ($zv:expr) => {
        $crate::zval_arr!($zv, $crate::hash::zend_new_array(0))
    };
}

#[macro_export]
macro_rules! zval_obj {
    ($zv:expr, $o:expr) => {{
        let zv: *mut $crate::types::Zval = $zv;
        (*zv).value.obj = $o;
        (*zv).type_info = $crate::types::IS_OBJECT_EX;
    }};
}

#[macro_export]
macro_rules! zval_res {
    ($zv:expr, $r:expr) => {{
        let zv: *mut $crate::types::Zval = $zv;
        (*zv).value.res = $r;
        (*zv).type_info = $crate::types::IS_RESOURCE_EX;
    }};
}

#[macro_export]
macro_rules! zval_ptr {
    ($zv:expr, $p:expr) => {{
        let zv: *mut $crate::types::Zval = $zv;
        (*zv).value.ptr = $p;
        (*zv).type_info = $crate::types::IS_PTR as u32;
    }};
}

#[macro_export]
macro_rules! zval_func {
    ($zv:expr, $f:expr) => {{
        let zv: *mut $crate::types::Zval = $zv;
        (*zv).value.func = $f;
        (*zv).type_info = $crate::types::IS_PTR as u32;
    }};
}

#[macro_export]
macro_rules! zval_indirect {
    ($zv:expr, $target:expr) => {{
        let zv: *mut $crate::types::Zval = $zv;
        (*zv).value.zv = $target;
        (*zv).type_info = $crate::types::IS_INDIRECT as u32;
    }};
}

/// Copies the payload and the type without touching reference counters.
#[macro_export]
macro_rules! zval_copy_value {
    ($z:expr, $v:expr) => {{
        let z: *mut $crate::types::Zval = $z;
        let v: *const $crate::types::Zval = $v;
        (*z).value = (*v).value;
        (*z).type_info = (*v).type_info;
    }};
}

/// Copies a value and adds a reference to its payload.
#[macro_export]
macro_rules! zval_copy {
    ($z:expr, $v:expr) => {{
        let z: *mut $crate::types::Zval = $z;
        $crate::zval_copy_value!(z, $v);
        $crate::z_try_addref_p!(z);
    }};
}

/// Copies a value. Arrays are duplicated, other payloads get a new
/// reference.
#[macro_export]
macro_rules! zval_dup {
    ($z:expr, $v:expr) => {{
        let z: *mut $crate::types::Zval = $z;
        let v: *const $crate::types::Zval = $v;

        match (*v).ty() == $crate::types::IS_ARRAY {
            true => $crate::zval_arr!(z, $crate::hash::zend_array_dup((*v).value.arr)),
            false => $crate::zval_copy!(z, v),
        }
    }};
}

/// Stores `zv` into `z`.
///
/// With `copy` set and `dtor` unset, `z` receives a new reference. In every
/// other case the reference held by `zv` moves to `z`.
#[macro_export]
macro_rules! zval_zval {
    ($z:expr, $zv:expr, $copy:expr, $dtor:expr) => {{
        let z: *mut $crate::types::Zval = $z;
        let zv: *mut $crate::types::Zval = $zv;

        match $copy && !$dtor {
            true => $crate::zval_copy!(z, zv),
            false => $crate::zval_copy_value!(z, zv),
        }
    }};
}

/// Makes the string payload of `zv` exclusively owned, copying it when it
/// is interned or shared.
#[macro_export]
macro_rules! separate_string {
    ($zv:expr) => {{
        let zv: *mut $crate::types::Zval = $zv;
        let s = (*zv).value.str_;

        if !(*zv).is_refcounted() || (*s).gc.refcount > 1 {
            if (*zv).is_refcounted() {
                (*s).gc.refcount -= 1;
            }

            $crate::zval_new_str!(
                zv,
                $crate::string::zend_string_init(
                    $crate::string::zstr_val(s),
                    $crate::string::zstr_len(s),
                    false,
                )
            );
        }
    }};
}

/// Makes the array payload of `zv` exclusively owned, duplicating it when
/// it is shared.
#[macro_export]
macro_rules! separate_array {
    ($zv:expr) => {{
        let zv: *mut $crate::types::Zval = $zv;
        let arr = (*zv).value.arr;

        if (*arr).gc.refcount > 1 {
            if !(*arr).gc.is_immutable() {
                (*arr).gc.refcount -= 1;
            }

            $crate::zval_arr!(zv, $crate::hash::zend_array_dup(arr));
        }
    }};
}

#[macro_export]
macro_rules! zend_call_num_args {
    ($ex:expr) => {
        $crate::execute::zend_call_num_args($ex)
    };
}

#[macro_export]
macro_rules! zend_call_arg {
    ($ex:expr, $n:expr) => {
        $crate::execute::zend_call_arg($ex, $n)
    };
}

#[macro_export]
macro_rules! get_this {
    ($ex:expr) => {
        $crate::execute::get_this($ex)
    };
}

/// The class entry initializer of hosts 7.3 and newer.
#[macro_export]
macro_rules! init_class_entry_ex {
    ($ce:expr, $name:expr, $len:expr, $functions:expr) => {
        $crate::object::init_class_entry_ex($ce, $name, $len, $functions)
    };
}

/// The class entry initializer of hosts older than 7.3.
#[macro_export]
macro_rules! init_overloaded_class_entry_ex {
    ($ce:expr, $name:expr, $len:expr, $functions:expr, $call:expr, $get:expr, $set:expr) => {
        $crate::legacy::init_overloaded_class_entry_ex($ce, $name, $len, $functions, $call, $get, $set)
    };
}

/// The first record of an 8.0+ argument list.
#[macro_export]
macro_rules! zend_begin_arg_info_ex {
    ($return_reference:expr, $required_num_args:expr) => {
        $crate::arginfo::ZendInternalArgInfo {
            name: $required_num_args as usize as *const ::std::ffi::c_char,
            type_: $crate::arginfo::ZendType::none($crate::arginfo::_zend_arg_info_flags(
                $return_reference,
                false,
            )),
            default_value: ::std::ptr::null(),
        }
    };
}

/// An untyped 8.0+ argument record.
#[macro_export]
macro_rules! zend_arg_info {
    ($pass_by_ref:expr, $name:expr) => {
        $crate::arginfo::ZendInternalArgInfo {
            name: $name,
            type_: $crate::arginfo::ZendType::none($crate::arginfo::_zend_arg_info_flags($pass_by_ref, false)),
            default_value: ::std::ptr::null(),
        }
    };
}

/// A typed 8.0+ argument record with an optional default value text.
#[macro_export]
macro_rules! zend_arg_type_info_with_default_value {
    ($pass_by_ref:expr, $name:expr, $type_code:expr, $allow_null:expr, $default:expr) => {
        $crate::arginfo::ZendInternalArgInfo {
            name: $name,
            type_: $crate::arginfo::zend_type_init_code(
                $type_code,
                $allow_null,
                $crate::arginfo::_zend_arg_info_flags($pass_by_ref, false),
            ),
            default_value: $default,
        }
    };
}

#[macro_export]
macro_rules! zend_fe_end {
    () => {
        $crate::function::ZendFunctionEntry::end()
    };
}

#[cfg(test)]
mod tests {
    use std::ffi::c_char;

    use crate::{
        alloc::heap_stats,
        hash::zend_hash_next_index_insert,
        string::{zend_string_from_bytes, zend_string_init_interned, zend_string_refcount, zstr_bytes},
        types::{Zval, IS_ARRAY, IS_LONG, IS_STRING},
        values::zval_ptr_dtor,
    };

    #[test]
    fn test_scalar_constructors() {
        let mut zv = Zval::undef();
        let zv = &mut zv as *mut Zval;

        unsafe {
            zval_long!(zv, 42);
            assert_eq!(z_type_p!(zv), IS_LONG);
            assert_eq!(z_lval_p!(zv), 42);

            zval_double!(zv, 1.5);
            assert_eq!(z_dval_p!(zv), 1.5);

            zval_bool!(zv, true);
            assert_eq!(z_type_info_p!(zv), crate::types::IS_TRUE as u32);

            zval_null!(zv);
            assert!(!z_refcounted_p!(zv));
        }
    }

    #[test]
    fn test_string_copy_and_dtor() {
        let before = heap_stats();

        unsafe {
            let mut first = Zval::undef();
            let mut second = Zval::undef();

            zval_stringl!(&mut first, b"abc".as_ptr() as *const c_char, 3);
            zval_copy!(&mut second, &first);

            assert_eq!(z_refcount_p!(&mut first), 2);
            assert_eq!(zstr_bytes(z_str_p!(&mut second)), b"abc");

            zval_ptr_dtor(&mut second);
            assert_eq!(z_refcount_p!(&mut first), 1);

            zval_ptr_dtor(&mut first);
        }

        assert_eq!(heap_stats().request_blocks, before.request_blocks);
    }

    #[test]
    fn test_interned_string_box() {
        unsafe {
            let interned = zend_string_init_interned(b"const".as_ptr() as *const c_char, 5, true);
            let mut zv = Zval::undef();

            zval_str!(&mut zv, interned);
            assert_eq!(z_type_p!(&mut zv), IS_STRING);
            assert!(!z_refcounted_p!(&mut zv));

            separate_string!(&mut zv);
            assert!(z_refcounted_p!(&mut zv));
            assert_ne!(z_str_p!(&mut zv), interned);
            assert_eq!(zend_string_refcount(z_str_p!(&mut zv)), 1);

            zval_ptr_dtor(&mut zv);
        }
    }

    #[test]
    fn test_separate_shared_array() {
        let before = heap_stats();

        unsafe {
            let mut first = Zval::undef();
            array_init!(&mut first);

            let mut item = Zval::undef();
            zval_new_str!(&mut item, zend_string_from_bytes(b"x", false));
            let _ = zend_hash_next_index_insert(z_arr_p!(&mut first), &mut item);

            let mut second = Zval::undef();
            zval_copy!(&mut second, &first);
            assert_eq!(z_refcount_p!(&mut first), 2);

            separate_array!(&mut second);
            assert_ne!(z_arr_p!(&mut first), z_arr_p!(&mut second));
            assert_eq!(z_refcount_p!(&mut first), 1);
            assert_eq!(z_type_p!(&mut second), IS_ARRAY);

            zval_ptr_dtor(&mut first);
            zval_ptr_dtor(&mut second);
        }

        assert_eq!(heap_stats().request_blocks, before.request_blocks);
    }

    #[test]
    fn test_zval_zval_moves_or_copies() {
        let before = heap_stats();

        unsafe {
            let mut source = Zval::undef();
            let mut target = Zval::undef();
            array_init!(&mut source);

            zval_zval!(&mut target, &mut source, false, true);
            assert_eq!(z_arr_p!(&mut target), z_arr_p!(&mut source));
            assert_eq!(z_refcount_p!(&mut target), 1);

            let mut copy = Zval::undef();
            zval_zval!(&mut copy, &mut target, true, false);
            assert_eq!(z_arr_p!(&mut copy), z_arr_p!(&mut target));
            assert_eq!(z_refcount_p!(&mut target), 2);

            zval_ptr_dtor(&mut copy);
            zval_ptr_dtor(&mut target);
        }

        assert_eq!(heap_stats().request_blocks, before.request_blocks);
    }
}
