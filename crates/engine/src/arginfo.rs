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

//! Argument descriptor records.
//!
//! A function's argument list is an array of records. The first record
//! describes the function itself: its `name` field holds the number of
//! required arguments cast to a pointer, and its flags describe the return
//! value. Every following record describes one argument.
//!
//! The record layout changed twice across host versions, so all three
//! layouts are provided.

use std::ffi::{c_char, c_void};

use crate::types::{IS_MIXED, IS_NULL, _IS_BOOL};

/// The 8.0+ type declaration: an optional class name and a type mask.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct ZendType {
    pub ptr: *mut c_void,
    pub type_mask: u32,
}

/// The argument record of hosts 8.0 and newer.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct ZendInternalArgInfo {
    pub name: *const c_char,
    pub type_: ZendType,
    pub default_value: *const c_char,
}

/// The argument record of hosts 7.2 to 7.4.
///
/// The type declaration is one word: the type code shifted by `CODE_SHIFT`
/// with the nullable flag in bit zero. 7.2 shifts by one bit, 7.3 and 7.4
/// by two.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct ZendInternalArgInfo7x<const CODE_SHIFT: u32> {
    pub name: *const c_char,
    pub type_: usize,
    pub pass_by_reference: u8,
    pub is_variadic: u8,
}

pub type ZendInternalArgInfo72 = ZendInternalArgInfo7x<1>;
pub type ZendInternalArgInfo73 = ZendInternalArgInfo7x<2>;

impl<const CODE_SHIFT: u32> ZendInternalArgInfo7x<CODE_SHIFT> {
    /// Encodes a type code and the nullable flag into a type word.
    #[inline(always)]
    pub const fn encode_type(code: u8, allow_null: bool) -> usize {
        ((code as usize) << CODE_SHIFT) | allow_null as usize
    }

    #[inline(always)]
    pub const fn type_code(&self) -> u8 {
        (self.type_ >> CODE_SHIFT) as u8
    }

    #[inline(always)]
    pub const fn allow_null(&self) -> bool {
        self.type_ & 1 != 0
    }
}

/// The argument record of hosts 7.0 and 7.1.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct ZendInternalArgInfo70 {
    pub name: *const c_char,
    pub class_name: *const c_char,
    pub type_hint: u8,
    pub pass_by_reference: u8,
    pub allow_null: u8,
    pub is_variadic: u8,
}

pub const _ZEND_TYPE_EXTRA_FLAGS_SHIFT: u32 = 25;
pub const _ZEND_SEND_MODE_SHIFT: u32 = _ZEND_TYPE_EXTRA_FLAGS_SHIFT;
pub const _ZEND_SEND_MODE_MASK: u32 = 3 << _ZEND_SEND_MODE_SHIFT;
pub const _ZEND_IS_VARIADIC_BIT: u32 = 1 << (_ZEND_TYPE_EXTRA_FLAGS_SHIFT + 2);

pub const MAY_BE_NULL: u32 = 1 << IS_NULL;
pub const MAY_BE_FALSE: u32 = 1 << 2;
pub const MAY_BE_TRUE: u32 = 1 << 3;
pub const MAY_BE_BOOL: u32 = MAY_BE_FALSE | MAY_BE_TRUE;
pub const MAY_BE_ANY: u32 = 0x3fe;

pub const _ZEND_TYPE_NULLABLE_BIT: u32 = MAY_BE_NULL;

/// Builds the extra flags of an 8.0+ type mask.
#[inline(always)]
pub const fn _zend_arg_info_flags(pass_by_ref: bool, is_variadic: bool) -> u32 {
    let variadic = match is_variadic {
        true => _ZEND_IS_VARIADIC_BIT,
        false => 0,
    };

    ((pass_by_ref as u32) << _ZEND_SEND_MODE_SHIFT) | variadic
}

/// Builds an 8.0+ type mask from a type code. Code zero declares no type.
#[inline]
pub const fn zend_type_init_code(code: u8, allow_null: bool, extra_flags: u32) -> ZendType {
    let mask = match code {
        0 => 0,
        _IS_BOOL => MAY_BE_BOOL,
        IS_MIXED => MAY_BE_ANY,
        code => 1 << code,
    };

    let nullable = match allow_null {
        true => _ZEND_TYPE_NULLABLE_BIT,
        false => 0,
    };

    ZendType {
        ptr: std::ptr::null_mut(),
        type_mask: mask | nullable | extra_flags,
    }
}

impl ZendType {
    #[inline(always)]
    pub const fn none(extra_flags: u32) -> Self {
        Self {
            ptr: std::ptr::null_mut(),
            type_mask: extra_flags,
        }
    }

    #[inline(always)]
    pub const fn pass_by_reference(&self) -> bool {
        (self.type_mask & _ZEND_SEND_MODE_MASK) >> _ZEND_SEND_MODE_SHIFT != 0
    }

    #[inline(always)]
    pub const fn allow_null(&self) -> bool {
        self.type_mask & _ZEND_TYPE_NULLABLE_BIT != 0
    }

    /// Returns the single type code of the mask, or zero.
    pub const fn type_code(&self) -> u8 {
        let mask = self.type_mask & MAY_BE_ANY & !MAY_BE_NULL;

        if mask == 0 {
            return 0;
        }

        if mask == MAY_BE_ANY & !MAY_BE_NULL {
            return IS_MIXED;
        }

        if mask == MAY_BE_BOOL {
            return _IS_BOOL;
        }

        mask.trailing_zeros() as u8
    }
}

/// Reads the required argument count from the first record of an argument
/// list of any layout.
///
/// # Safety
///
/// `arg_info` is null or points to the first record of an argument list.
#[inline]
pub unsafe fn required_num_args(arg_info: *const c_void) -> u32 {
    if arg_info.is_null() {
        return 0;
    }

    // Every layout starts with the `name` field.
    unsafe { *(arg_info as *const *const c_char) as usize as u32 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IS_LONG, IS_STRING};

    #[test]
    fn test_type_mask_round_trip() {
        let ty = zend_type_init_code(IS_LONG, true, _zend_arg_info_flags(true, false));

        assert!(ty.pass_by_reference());
        assert!(ty.allow_null());
        assert_eq!(ty.type_code(), IS_LONG);

        let ty = zend_type_init_code(_IS_BOOL, false, 0);
        assert_eq!(ty.type_code(), _IS_BOOL);
        assert!(!ty.allow_null());

        let ty = zend_type_init_code(IS_MIXED, false, 0);
        assert_eq!(ty.type_code(), IS_MIXED);

        assert_eq!(ZendType::none(_zend_arg_info_flags(false, true)).type_code(), 0);
    }

    #[test]
    fn test_legacy_type_word() {
        let word = ZendInternalArgInfo72::encode_type(IS_STRING, true);
        assert_eq!(word, (IS_STRING as usize) << 1 | 1);

        let word = ZendInternalArgInfo73::encode_type(IS_STRING, false);
        assert_eq!(word, (IS_STRING as usize) << 2);

        let record = ZendInternalArgInfo73 {
            name: std::ptr::null(),
            type_: word,
            pass_by_reference: 0,
            is_variadic: 0,
        };

        assert_eq!(record.type_code(), IS_STRING);
        assert!(!record.allow_null());
    }

    #[test]
    fn test_required_num_args() {
        let records = [ZendInternalArgInfo70 {
            name: 3usize as *const c_char,
            class_name: std::ptr::null(),
            type_hint: 0,
            pass_by_reference: 0,
            allow_null: 0,
            is_variadic: 0,
        }];

        unsafe {
            assert_eq!(required_num_args(records.as_ptr() as *const c_void), 3);
            assert_eq!(required_num_args(std::ptr::null()), 0);
        }
    }
}
