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
    ffi::c_void,
    fmt::{Debug, Formatter},
};

use crate::{
    function::ZendFunction,
    hash::HashTable,
    object::{ZendClassEntry, ZendObject},
    resource::ZendResource,
    string::ZendString,
};

pub type ZendLong = i64;
pub type ZendUlong = u64;
pub type ZendUchar = u8;

/// A status code returned by fallible host primitives.
pub type ZendResultCode = i32;

pub const SUCCESS: ZendResultCode = 0;
pub const FAILURE: ZendResultCode = -1;

pub const ZEND_LONG_MAX: ZendLong = ZendLong::MAX;
pub const ZEND_LONG_MIN: ZendLong = ZendLong::MIN;

// Value-box type tags.
pub const IS_UNDEF: u8 = 0;
pub const IS_NULL: u8 = 1;
pub const IS_FALSE: u8 = 2;
pub const IS_TRUE: u8 = 3;
pub const IS_LONG: u8 = 4;
pub const IS_DOUBLE: u8 = 5;
pub const IS_STRING: u8 = 6;
pub const IS_ARRAY: u8 = 7;
pub const IS_OBJECT: u8 = 8;
pub const IS_RESOURCE: u8 = 9;
pub const IS_REFERENCE: u8 = 10;
pub const IS_INDIRECT: u8 = 12;
pub const IS_PTR: u8 = 13;

// Pseudo-types that only appear in type declarations. They intentionally
// share codes with internal value-box tags.
pub const IS_CALLABLE: u8 = 12;
pub const IS_ITERABLE: u8 = 13;
pub const IS_VOID: u8 = 14;
pub const IS_STATIC: u8 = 15;
pub const IS_MIXED: u8 = 16;
pub const _IS_BOOL: u8 = 18;

pub const Z_TYPE_MASK: u32 = 0xff;
pub const Z_TYPE_FLAGS_SHIFT: u32 = 8;

pub const IS_TYPE_REFCOUNTED: u32 = 1 << 0;
pub const IS_TYPE_COLLECTABLE: u32 = 1 << 1;

pub const IS_INTERNED_STRING_EX: u32 = IS_STRING as u32;
pub const IS_STRING_EX: u32 = IS_STRING as u32 | (IS_TYPE_REFCOUNTED << Z_TYPE_FLAGS_SHIFT);
pub const IS_ARRAY_EX: u32 =
    IS_ARRAY as u32 | ((IS_TYPE_REFCOUNTED | IS_TYPE_COLLECTABLE) << Z_TYPE_FLAGS_SHIFT);
pub const IS_OBJECT_EX: u32 =
    IS_OBJECT as u32 | ((IS_TYPE_REFCOUNTED | IS_TYPE_COLLECTABLE) << Z_TYPE_FLAGS_SHIFT);
pub const IS_RESOURCE_EX: u32 = IS_RESOURCE as u32 | (IS_TYPE_REFCOUNTED << Z_TYPE_FLAGS_SHIFT);

// Header flags of the reference-counted allocations.
pub const GC_TYPE_MASK: u32 = 0x0000_000f;
pub const GC_NOT_COLLECTABLE: u32 = 1 << 4;
pub const GC_PROTECTED: u32 = 1 << 5;
pub const GC_IMMUTABLE: u32 = 1 << 6;
pub const GC_PERSISTENT: u32 = 1 << 7;

pub const IS_STR_INTERNED: u32 = GC_IMMUTABLE;
pub const IS_STR_PERSISTENT: u32 = GC_PERSISTENT;
pub const IS_ARRAY_IMMUTABLE: u32 = GC_IMMUTABLE;

/// The common header of every reference-counted host allocation.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ZendRefcounted {
    pub refcount: u32,
    pub type_info: u32,
}

impl ZendRefcounted {
    #[inline(always)]
    pub const fn new(ty: u8, flags: u32) -> Self {
        Self {
            refcount: 1,
            type_info: ty as u32 | flags,
        }
    }

    #[inline(always)]
    pub const fn ty(&self) -> u8 {
        (self.type_info & GC_TYPE_MASK) as u8
    }

    #[inline(always)]
    pub const fn flags(&self) -> u32 {
        self.type_info & !GC_TYPE_MASK
    }

    #[inline(always)]
    pub const fn is_immutable(&self) -> bool {
        self.type_info & GC_IMMUTABLE != 0
    }

    #[inline(always)]
    pub const fn is_persistent(&self) -> bool {
        self.type_info & GC_PERSISTENT != 0
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union ZendValue {
    pub lval: ZendLong,
    pub dval: f64,
    pub counted: *mut ZendRefcounted,
    pub str_: *mut ZendString,
    pub arr: *mut HashTable,
    pub obj: *mut ZendObject,
    pub res: *mut ZendResource,
    pub zv: *mut Zval,
    pub ptr: *mut c_void,
    pub ce: *mut ZendClassEntry,
    pub func: *mut ZendFunction,
}

/// The host's value box: a payload word plus a type tag.
///
/// The `u2` word is free for the owner's use. Call frames store the number
/// of passed arguments there, hash tables leave it untouched.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct Zval {
    pub value: ZendValue,
    pub type_info: u32,
    pub u2: u32,
}

impl Default for Zval {
    #[inline(always)]
    fn default() -> Self {
        Self::undef()
    }
}

impl Debug for Zval {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        let mut debug = formatter.debug_struct("Zval");

        debug.field("type", &self.ty());

        // Safety: The union field read is selected by the type tag.
        unsafe {
            match self.ty() {
                IS_LONG => debug.field("lval", &self.value.lval),
                IS_DOUBLE => debug.field("dval", &self.value.dval),
                IS_UNDEF | IS_NULL | IS_FALSE | IS_TRUE => &mut debug,
                _ => debug.field("ptr", &self.value.ptr),
            };
        }

        debug.finish()
    }
}

impl Zval {
    #[inline(always)]
    pub const fn undef() -> Self {
        Self {
            value: ZendValue { lval: 0 },
            type_info: IS_UNDEF as u32,
            u2: 0,
        }
    }

    #[inline(always)]
    pub const fn ty(&self) -> u8 {
        (self.type_info & Z_TYPE_MASK) as u8
    }

    #[inline(always)]
    pub const fn type_flags(&self) -> u32 {
        (self.type_info >> Z_TYPE_FLAGS_SHIFT) & Z_TYPE_MASK
    }

    #[inline(always)]
    pub const fn is_refcounted(&self) -> bool {
        self.type_flags() & IS_TYPE_REFCOUNTED != 0
    }

    #[inline(always)]
    pub const fn is_collectable(&self) -> bool {
        self.type_flags() & IS_TYPE_COLLECTABLE != 0
    }
}
