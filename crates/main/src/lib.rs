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

//! Version-stable functions over the Zend host's macro surface.
//!
//! The host exposes much of its API as C preprocessor macros and inline
//! functions, and the shape of that API differs between host versions.
//! This crate lowers every such construct into an ordinary exported
//! function with one stable signature: `phper_zval_long`,
//! `phper_zend_new_array`, `phper_call_user_function`, and so on. Foreign
//! bindings can link against the `phper_*` symbols without knowing which
//! host version they run on.
//!
//! The host version is detected at build time (see the `zend-compat-build`
//! crate), and exactly one implementation variant is compiled into the
//! crate. The variant is exposed as [abi::Active]. Functions marked as
//! divergent in their documentation dispatch through it, every other
//! function is a one-to-one lowering identical on all supported hosts.
//!
//! All exported functions are `unsafe`: they operate on raw host handles
//! and inherit the preconditions of the host primitives they wrap.

#![allow(clippy::missing_safety_doc)]

pub mod abi;
mod arrays;
mod calls;
mod functions;
mod memory;
mod objects;
mod strings;
mod values;

pub use crate::{
    abi::{Active, ActiveArgInfo, ArgInfoRecord, CompatDefinition},
    arrays::*,
    calls::*,
    functions::*,
    memory::*,
    objects::*,
    strings::*,
    values::*,
};

/// The implementation variant selected for the host this crate was built
/// against, for example `"8.0"`.
pub const ACTIVE_ABI: &str = <Active as CompatDefinition>::ABI;
