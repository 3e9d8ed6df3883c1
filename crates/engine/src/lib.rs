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

//! A reference implementation of the Zend host runtime.
//!
//! The crate provides the host primitives the compatibility layer is built
//! on: the memory manager, strings, hash tables, value boxes, objects and
//! classes, function records and call frames. It reproduces the host's
//! `#[repr(C)]` data layouts and its reference-counting rules, and it keeps
//! its implicit globals per thread, so every thread is an independent host
//! instance.
//!
//! Primitives that only exist on some host versions are documented with the
//! versions that provide them. The reference host provides all of them.
//!
//! The host's macros are exported as `macro_rules!` macros named after the
//! original macros in snake case, for example [zval_long] or
//! [zend_call_arg].

#![allow(clippy::missing_safety_doc)]

pub mod alloc;
pub mod arginfo;
pub mod execute;
pub mod function;
pub mod globals;
pub mod hash;
pub mod legacy;
mod macros;
pub mod object;
mod report;
pub mod resource;
pub mod string;
pub mod types;
pub mod values;

pub const PHP_MAJOR_VERSION: u64 = 8;
pub const PHP_MINOR_VERSION: u64 = 1;
pub const PHP_RELEASE_VERSION: u64 = 0;
pub const PHP_VERSION: &str = "8.1.0";
pub const PHP_VERSION_ID: u64 = 80100;

pub const ZEND_DEBUG: bool = false;
pub const ZTS: bool = false;

/// The build id that extension modules must match to be loadable.
pub const ZEND_MODULE_BUILD_ID: &std::ffi::CStr = c"API20210902,NTS";
