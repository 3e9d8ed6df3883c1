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

use std::ffi::c_void;

use log::warn;

use crate::{
    alloc::efree,
    globals::gc_add_possible_root,
    hash::{zend_array_destroy, zend_hash_num_elements, HashTable},
    object::{zend_objects_store_del, ZendObject},
    report::debug_unreachable,
    string::{
        zend_empty_string, zend_string_copy, zend_string_from_bytes, zend_string_release, zstr_bytes,
        ZendString,
    },
    types::{
        ZendLong, ZendRefcounted, Zval, GC_IMMUTABLE, IS_ARRAY, IS_DOUBLE, IS_FALSE, IS_LONG,
        IS_NULL, IS_OBJECT, IS_RESOURCE, IS_STRING, IS_STRING_EX, IS_TRUE, IS_UNDEF,
    },
};

/// A value destructor as stored in hash tables.
pub type DtorFunc = unsafe extern "C" fn(zv: *mut Zval);

/// Destroys a reference-counted allocation whose counter dropped to zero.
///
/// # Safety
///
/// `counted` points to a live allocation with no remaining references.
pub unsafe fn rc_dtor_func(counted: *mut ZendRefcounted) {
    unsafe {
        match (*counted).ty() {
            IS_STRING => {
                (*counted).refcount = 1;
                zend_string_release(counted as *mut ZendString);
            }

            IS_ARRAY => zend_array_destroy(counted as *mut HashTable),

            IS_OBJECT => zend_objects_store_del(counted as *mut ZendObject),

            IS_RESOURCE => efree(counted as *mut c_void),

            ty => debug_unreachable!("Reference-counted allocation of unexpected type {ty}."),
        }
    }
}

#[inline(always)]
unsafe fn release(zv: *mut Zval, check_root: bool) {
    unsafe {
        if !(*zv).is_refcounted() {
            return;
        }

        let counted = (*zv).value.counted;

        if (*counted).type_info & GC_IMMUTABLE != 0 {
            return;
        }

        (*counted).refcount -= 1;

        if (*counted).refcount == 0 {
            rc_dtor_func(counted);
            return;
        }

        if check_root && (*zv).is_collectable() {
            gc_add_possible_root();
        }
    }
}

/// Drops the reference held by `zv`. A collectable value that survives the
/// release is buffered as a possible cycle root.
///
/// # Safety
///
/// `zv` points to an initialized value owned by the caller. The value must
/// not be used afterwards.
pub unsafe extern "C" fn zval_ptr_dtor(zv: *mut Zval) {
    unsafe { release(zv, true) }
}

/// Same as [zval_ptr_dtor], without buffering possible cycle roots.
///
/// # Safety
///
/// See [zval_ptr_dtor].
#[inline]
pub unsafe fn i_zval_ptr_dtor_nogc(zv: *mut Zval) {
    unsafe { release(zv, false) }
}

/// Converts a value to an integer using the host's loose conversion rules.
///
/// # Safety
///
/// `op` points to an initialized value.
pub unsafe fn zval_get_long(op: *const Zval) -> ZendLong {
    unsafe {
        match (*op).ty() {
            IS_UNDEF | IS_NULL | IS_FALSE => 0,
            IS_TRUE => 1,
            IS_LONG => (*op).value.lval,
            IS_DOUBLE => zend_dval_to_lval((*op).value.dval),
            IS_STRING => zend_strtol(zstr_bytes((*op).value.str_)),
            IS_ARRAY => (zend_hash_num_elements((*op).value.arr) > 0) as ZendLong,
            IS_OBJECT => 1,
            IS_RESOURCE => (*(*op).value.res).handle,
            _ => 0,
        }
    }
}

/// Converts a value to a string using the host's loose conversion rules.
///
/// Always returns a new reference owned by the caller.
///
/// # Safety
///
/// `op` points to an initialized value.
pub unsafe fn zval_get_string(op: *const Zval) -> *mut ZendString {
    unsafe {
        match (*op).ty() {
            IS_UNDEF | IS_NULL | IS_FALSE => zend_empty_string(),
            IS_TRUE => zend_string_from_bytes(b"1", false),
            IS_LONG => zend_string_from_bytes((*op).value.lval.to_string().as_bytes(), false),
            IS_DOUBLE => zend_string_from_bytes(zend_double_to_str((*op).value.dval, 14).as_bytes(), false),
            IS_STRING => zend_string_copy((*op).value.str_),

            IS_ARRAY => {
                warn!("Array to string conversion");
                zend_string_from_bytes(b"Array", false)
            }

            IS_OBJECT => {
                let ce = (*(*op).value.obj).ce;
                warn!(
                    "Object of class {} could not be converted to string",
                    String::from_utf8_lossy(zstr_bytes((*ce).name)),
                );
                zend_empty_string()
            }

            IS_RESOURCE => {
                let handle = (*(*op).value.res).handle;
                zend_string_from_bytes(format!("Resource id #{handle}").as_bytes(), false)
            }

            _ => zend_empty_string(),
        }
    }
}

/// Replaces the value with its integer conversion.
///
/// # Safety
///
/// `op` points to an initialized value owned by the caller.
pub unsafe fn convert_to_long(op: *mut Zval) {
    unsafe {
        if (*op).ty() == IS_LONG {
            return;
        }

        let lval = zval_get_long(op);
        zval_ptr_dtor(op);

        (*op).value.lval = lval;
        (*op).type_info = IS_LONG as u32;
    }
}

/// Replaces the value with its string conversion.
///
/// # Safety
///
/// `op` points to an initialized value owned by the caller.
pub unsafe fn convert_to_string(op: *mut Zval) {
    unsafe {
        if (*op).ty() == IS_STRING {
            return;
        }

        let string = zval_get_string(op);
        zval_ptr_dtor(op);

        (*op).value.str_ = string;
        (*op).type_info = match (*string).gc.type_info & GC_IMMUTABLE != 0 {
            true => IS_STRING as u32,
            false => IS_STRING_EX,
        };
    }
}

/// Converts a float to an integer. Values out of the integer range,
/// infinities and NaN convert to zero.
pub fn zend_dval_to_lval(dval: f64) -> ZendLong {
    if !dval.is_finite() || dval >= ZendLong::MAX as f64 || dval < ZendLong::MIN as f64 {
        return 0;
    }

    dval as ZendLong
}

/// Parses the leading numeric prefix of a string.
///
/// Leading whitespace is skipped. A float prefix (`"1.5"`, `"1e3"`) is
/// truncated toward zero. A string without a numeric prefix converts to zero.
pub fn zend_strtol(bytes: &[u8]) -> ZendLong {
    let start = bytes
        .iter()
        .position(|byte| !matches!(*byte, b' ' | b'\t' | b'\n' | b'\r' | b'\x0b' | b'\x0c'))
        .unwrap_or(bytes.len());

    let bytes = &bytes[start..];

    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }

    let digits_start = end;

    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }

    if end == digits_start {
        return 0;
    }

    let integer_end = end;

    if bytes.get(end) == Some(&b'.') {
        end += 1;

        while bytes.get(end).is_some_and(u8::is_ascii_digit) {
            end += 1;
        }
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exponent_end = end + 1;

        if matches!(bytes.get(exponent_end), Some(b'+' | b'-')) {
            exponent_end += 1;
        }

        let exponent_digits = exponent_end;

        while bytes.get(exponent_end).is_some_and(u8::is_ascii_digit) {
            exponent_end += 1;
        }

        if exponent_end > exponent_digits {
            end = exponent_end;
        }
    }

    // The prefix consists of ASCII characters only.
    let prefix = std::str::from_utf8(&bytes[..end]).unwrap_or("0");

    if end == integer_end {
        if let Ok(lval) = prefix.parse::<ZendLong>() {
            return lval;
        }
    }

    zend_dval_to_lval(prefix.parse::<f64>().unwrap_or(0.0))
}

/// Formats a float the way the host's `%.*G` conversion does.
pub fn zend_double_to_str(dval: f64, precision: usize) -> String {
    if dval.is_nan() {
        return String::from("NAN");
    }

    if dval.is_infinite() {
        return match dval > 0.0 {
            true => String::from("INF"),
            false => String::from("-INF"),
        };
    }

    if dval == 0.0 {
        return match dval.is_sign_negative() {
            true => String::from("-0"),
            false => String::from("0"),
        };
    }

    let precision = precision.max(1);
    let scientific = format!("{:.*e}", precision - 1, dval);

    let (mantissa, exponent) = match scientific.split_once('e') {
        Some(parts) => parts,
        None => return scientific,
    };

    let exponent = exponent.parse::<i32>().unwrap_or(0);

    if exponent < -4 || exponent >= precision as i32 {
        let mut mantissa = trim_fraction(mantissa).to_string();

        if !mantissa.contains('.') {
            mantissa.push_str(".0");
        }

        let sign = match exponent < 0 {
            true => '-',
            false => '+',
        };

        return format!("{mantissa}E{sign}{}", exponent.abs());
    }

    let decimals = (precision as i32 - 1 - exponent).max(0) as usize;

    trim_fraction(&format!("{:.*}", decimals, dval)).to_string()
}

fn trim_fraction(number: &str) -> &str {
    match number.contains('.') {
        true => number.trim_end_matches('0').trim_end_matches('.'),
        false => number,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strtol() {
        assert_eq!(zend_strtol(b"42"), 42);
        assert_eq!(zend_strtol(b"  -17abc"), -17);
        assert_eq!(zend_strtol(b"1.9"), 1);
        assert_eq!(zend_strtol(b"1e3"), 1000);
        assert_eq!(zend_strtol(b"abc"), 0);
        assert_eq!(zend_strtol(b""), 0);
        assert_eq!(zend_strtol(b"-"), 0);
    }

    #[test]
    fn test_double_to_str() {
        assert_eq!(zend_double_to_str(1.5, 14), "1.5");
        assert_eq!(zend_double_to_str(0.1 + 0.2, 14), "0.3");
        assert_eq!(zend_double_to_str(100.0, 14), "100");
        assert_eq!(zend_double_to_str(-0.25, 14), "-0.25");
        assert_eq!(zend_double_to_str(1e20, 14), "1.0E+20");
        assert_eq!(zend_double_to_str(1.5e-7, 14), "1.5E-7");
        assert_eq!(zend_double_to_str(f64::INFINITY, 14), "INF");
        assert_eq!(zend_double_to_str(f64::NAN, 14), "NAN");
    }

    #[test]
    fn test_dval_to_lval() {
        assert_eq!(zend_dval_to_lval(3.99), 3);
        assert_eq!(zend_dval_to_lval(-3.99), -3);
        assert_eq!(zend_dval_to_lval(1e100), 0);
        assert_eq!(zend_dval_to_lval(f64::NAN), 0);
    }
}
