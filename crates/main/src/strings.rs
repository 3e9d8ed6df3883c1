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

use zend_compat_engine::{
    separate_string,
    string::{
        zend_new_interned_string,
        zend_string_alloc,
        zend_string_copy,
        zend_string_dup,
        zend_string_init,
        zend_string_refcount,
        zstr_len,
        zstr_val,
        ZendString,
    },
    types::Zval,
};

use crate::abi::{Active, CompatDefinition};

#[no_mangle]
pub unsafe extern "C" fn phper_zend_string_init(str: *const c_char, len: usize, persistent: bool) -> *mut ZendString {
    unsafe { zend_string_init(str, len, persistent) }
}

/// Allocates a string of `len` bytes. The content and the null terminator
/// are left to the caller.
#[no_mangle]
pub unsafe extern "C" fn phper_zend_string_alloc(len: usize, persistent: bool) -> *mut ZendString {
    zend_string_alloc(len, persistent)
}

/// Interns `s`, consuming the caller's reference.
#[no_mangle]
pub unsafe extern "C" fn phper_zend_new_interned_string(s: *mut ZendString) -> *mut ZendString {
    unsafe { zend_new_interned_string(s) }
}

/// Divergent.
#[no_mangle]
pub unsafe extern "C" fn phper_zend_string_init_interned(
    str: *const c_char,
    len: usize,
    persistent: bool,
) -> *mut ZendString {
    unsafe { Active::zend_string_init_interned(str, len, persistent) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_zend_string_copy(s: *mut ZendString) -> *mut ZendString {
    unsafe { zend_string_copy(s) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_zend_string_dup(s: *mut ZendString, persistent: bool) -> *mut ZendString {
    unsafe { zend_string_dup(s, persistent) }
}

/// Divergent.
#[no_mangle]
pub unsafe extern "C" fn phper_zend_string_release(s: *mut ZendString) {
    unsafe { Active::zend_string_release(s) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_zend_string_refcount(s: *const ZendString) -> u32 {
    unsafe { zend_string_refcount(s) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_zstr_len(s: *const ZendString) -> usize {
    unsafe { zstr_len(s) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_zstr_val(s: *mut ZendString) -> *mut c_char {
    unsafe { zstr_val(s) }
}

/// Makes the string payload of `zv` exclusively owned.
#[no_mangle]
pub unsafe extern "C" fn phper_separate_string(zv: *mut Zval) {
    unsafe { separate_string!(zv) }
}

#[cfg(test)]
mod tests {
    use zend_compat_engine::{
        alloc::heap_stats,
        string::{zstr_bytes, zstr_is_interned},
        values::zval_ptr_dtor,
        zval_copy,
        zval_str,
    };

    use super::*;

    #[test]
    fn test_string_lifecycle() {
        unsafe {
            let s = phper_zend_string_init(c"text".as_ptr(), 4, false);
            assert_eq!(phper_zstr_len(s), 4);
            assert_eq!(phper_zend_string_refcount(s), 1);

            let copy = phper_zend_string_copy(s);
            assert_eq!(copy, s);
            assert_eq!(phper_zend_string_refcount(s), 2);

            let dup = phper_zend_string_dup(s, false);
            assert_ne!(dup, s);
            assert_eq!(zstr_bytes(dup), b"text");

            phper_zend_string_release(dup);
            phper_zend_string_release(copy);
            phper_zend_string_release(s);

            let allocated = phper_zend_string_alloc(3, false);
            phper_zstr_val(allocated).copy_from_nonoverlapping(c"abc".as_ptr(), 4);
            assert_eq!(zstr_bytes(allocated), b"abc");
            assert_eq!(phper_zstr_len(allocated), 3);
            phper_zend_string_release(allocated);

            assert_eq!(heap_stats().request_blocks, 0);
        }
    }

    #[test]
    fn test_interning() {
        unsafe {
            let interned = phper_zend_new_interned_string(phper_zend_string_init(c"key".as_ptr(), 3, false));
            assert!(zstr_is_interned(interned));
            assert_eq!(phper_zend_string_refcount(interned), 1);

            let again = phper_zend_string_init_interned(c"key".as_ptr(), 3, false);
            assert_eq!(again, interned);

            phper_zend_string_release(interned);
            assert_eq!(zstr_bytes(again), b"key");

            assert_eq!(heap_stats().request_blocks, 0);
        }
    }

    #[test]
    fn test_separate_string() {
        unsafe {
            let mut first = Zval::undef();
            zval_str!(&mut first, phper_zend_string_init_interned(c"shared".as_ptr(), 6, true));

            phper_separate_string(&mut first);
            assert!(!zstr_is_interned(first.value.str_));
            assert_eq!(zstr_bytes(first.value.str_), b"shared");

            let mut second = Zval::undef();
            zval_copy!(&mut second, &first);

            phper_separate_string(&mut second);
            assert_ne!(first.value.str_, second.value.str_);
            assert_eq!(phper_zend_string_refcount(first.value.str_), 1);

            let before = second.value.str_;
            phper_separate_string(&mut second);
            assert_eq!(second.value.str_, before);

            zval_ptr_dtor(&mut first);
            zval_ptr_dtor(&mut second);

            assert_eq!(heap_stats().request_blocks, 0);
        }
    }
}
