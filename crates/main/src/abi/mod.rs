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

//! Implementation variants of the divergent operations.
//!
//! Every variant implements [CompatDefinition] for a range of host
//! versions:
//!
//! | Variant | Hosts     |
//! |---------|-----------|
//! | `7.0`   | 7.0, 7.1  |
//! | `7.2`   | 7.2       |
//! | `7.3`   | 7.3, 7.4  |
//! | `8.0`   | 8.x       |
//!
//! The build script selects one variant through the `zend_compat_abi` cfg
//! flag, and the selected variant is re-exported as [Active]. The
//! `all-abis` feature compiles the remaining variants too.

use std::ffi::{c_char, c_void};

use zend_compat_engine::{
    arginfo::{ZendInternalArgInfo, ZendInternalArgInfo70, ZendInternalArgInfo7x},
    function::{ZendFunction, ZendFunctionEntry},
    hash::HashTable,
    object::ZendClassEntry,
    string::ZendString,
    types::Zval,
};

#[cfg(any(test, feature = "all-abis", not(zend_compat_abi = "8.0")))]
mod common;

#[cfg(any(test, feature = "all-abis", zend_compat_abi = "7.0"))]
pub mod v7_0;

#[cfg(any(test, feature = "all-abis", zend_compat_abi = "7.2"))]
pub mod v7_2;

#[cfg(any(test, feature = "all-abis", zend_compat_abi = "7.3"))]
pub mod v7_3;

#[cfg(any(test, feature = "all-abis", zend_compat_abi = "8.0"))]
pub mod v8_0;

#[cfg(zend_compat_abi = "7.0")]
pub use v7_0::Definition as Active;

#[cfg(zend_compat_abi = "7.2")]
pub use v7_2::Definition as Active;

#[cfg(zend_compat_abi = "7.3")]
pub use v7_3::Definition as Active;

#[cfg(zend_compat_abi = "8.0")]
pub use v8_0::Definition as Active;

#[cfg(not(any(
    zend_compat_abi = "7.0",
    zend_compat_abi = "7.2",
    zend_compat_abi = "7.3",
    zend_compat_abi = "8.0",
)))]
compile_error!(
    "No host variant selected. Build this crate through its build script, \
    which sets the zend_compat_abi cfg flag."
);

/// The argument record type of the [Active] variant.
pub type ActiveArgInfo = <Active as CompatDefinition>::ArgInfo;

/// The operations whose implementation differs between host versions.
///
/// Every method has the same observable contract in every variant. The
/// variants differ in which host primitives they use, and in the memory
/// layout of [CompatDefinition::ArgInfo].
pub trait CompatDefinition {
    /// The variant name, as used by the `zend_compat_abi` cfg flag.
    const ABI: &'static str;

    /// The host's native argument descriptor record.
    type ArgInfo: ArgInfoRecord + Copy;

    /// Allocates a new empty array able to hold `size` elements without
    /// growing. The array owns its values.
    unsafe fn zend_new_array(size: u32) -> *mut HashTable;

    /// Stores a new empty array into `arg`.
    unsafe fn array_init(arg: *mut Zval);

    /// Returns the interned string with the content of `str[..len]`,
    /// interning it first if needed.
    unsafe fn zend_string_init_interned(str: *const c_char, len: usize, persistent: bool) -> *mut ZendString;

    /// Drops one reference to `s`, releasing it with the last reference.
    unsafe fn zend_string_release(s: *mut ZendString);

    /// Allocates the storage of an object of class `ce` whose native
    /// wrapper is `obj_size` bytes long, including the trailing property
    /// slots. The first `obj_size` bytes of the block are zero.
    unsafe fn zend_object_alloc(obj_size: usize, ce: *mut ZendClassEntry) -> *mut c_void;

    /// Returns true if `instance_ce` is `ce`, extends it, or implements it.
    unsafe fn instanceof_function(instance_ce: *const ZendClassEntry, ce: *const ZendClassEntry) -> bool;

    /// Initializes the class entry `ce` with the name `name[..len]` and the
    /// method list `functions`.
    unsafe fn init_class_entry_ex(
        ce: *mut ZendClassEntry,
        name: *const c_char,
        len: usize,
        functions: *const ZendFunctionEntry,
    );

    /// Returns the qualified name of `func`: `Scope::name`, the bare name,
    /// or `main`. The result is a new string owned by the caller.
    unsafe fn get_function_or_method_name(func: *const ZendFunction) -> *mut ZendString;

    /// Calls the function named by `function_name`, a method of `object`
    /// when `object` is not null. Returns true on success.
    ///
    /// The `function_table` is accepted for signature stability and is
    /// ignored by every variant.
    unsafe fn call_user_function(
        function_table: *mut HashTable,
        object: *mut Zval,
        function_name: *mut Zval,
        retval_ptr: *mut Zval,
        param_count: u32,
        params: *mut Zval,
    ) -> bool;

    /// Builds the leading record of an argument list.
    fn zend_begin_arg_info_ex(return_reference: bool, required_num_args: usize) -> Self::ArgInfo;

    /// Builds an untyped argument record.
    fn zend_arg_info(pass_by_ref: bool, name: *const c_char) -> Self::ArgInfo;

    /// Builds a typed argument record. A zero `type_code` declares no type.
    /// The `default_value` text is kept by hosts 8.0 and newer only.
    fn zend_arg_info_with_type(
        pass_by_ref: bool,
        name: *const c_char,
        type_code: u8,
        allow_null: bool,
        default_value: *const c_char,
    ) -> Self::ArgInfo;
}

/// Read access to an argument descriptor record of any layout.
pub trait ArgInfoRecord {
    /// The argument name, or the required argument count of a leading
    /// record cast to a pointer.
    fn name(&self) -> *const c_char;

    /// Interprets the record as a leading record.
    #[inline(always)]
    fn required_num_args(&self) -> usize {
        self.name() as usize
    }

    /// Whether the argument, or the return value of a leading record, is
    /// passed by reference.
    fn pass_by_reference(&self) -> bool;

    fn allow_null(&self) -> bool;

    /// The declared type code, zero when no type is declared.
    fn type_code(&self) -> u8;

    fn default_value(&self) -> *const c_char;
}

impl ArgInfoRecord for ZendInternalArgInfo {
    #[inline(always)]
    fn name(&self) -> *const c_char {
        self.name
    }

    #[inline(always)]
    fn pass_by_reference(&self) -> bool {
        self.type_.pass_by_reference()
    }

    #[inline(always)]
    fn allow_null(&self) -> bool {
        self.type_.allow_null()
    }

    #[inline(always)]
    fn type_code(&self) -> u8 {
        self.type_.type_code()
    }

    #[inline(always)]
    fn default_value(&self) -> *const c_char {
        self.default_value
    }
}

impl<const CODE_SHIFT: u32> ArgInfoRecord for ZendInternalArgInfo7x<CODE_SHIFT> {
    #[inline(always)]
    fn name(&self) -> *const c_char {
        self.name
    }

    #[inline(always)]
    fn pass_by_reference(&self) -> bool {
        self.pass_by_reference != 0
    }

    #[inline(always)]
    fn allow_null(&self) -> bool {
        ZendInternalArgInfo7x::<CODE_SHIFT>::allow_null(self)
    }

    #[inline(always)]
    fn type_code(&self) -> u8 {
        ZendInternalArgInfo7x::<CODE_SHIFT>::type_code(self)
    }

    #[inline(always)]
    fn default_value(&self) -> *const c_char {
        std::ptr::null()
    }
}

impl ArgInfoRecord for ZendInternalArgInfo70 {
    #[inline(always)]
    fn name(&self) -> *const c_char {
        self.name
    }

    #[inline(always)]
    fn pass_by_reference(&self) -> bool {
        self.pass_by_reference != 0
    }

    #[inline(always)]
    fn allow_null(&self) -> bool {
        self.allow_null != 0
    }

    #[inline(always)]
    fn type_code(&self) -> u8 {
        self.type_hint
    }

    #[inline(always)]
    fn default_value(&self) -> *const c_char {
        std::ptr::null()
    }
}
