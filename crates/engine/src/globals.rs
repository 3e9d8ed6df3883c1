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

//! Implicit host state.
//!
//! The host keeps one set of globals per thread. Every accessor borrows the
//! state for the duration of the call only.

use std::{cell::Cell, ptr::null_mut};

use log::{debug, warn};

use crate::{
    alloc::{heap_stats, request_block_addresses, HeapStats},
    execute::ZendExecuteData,
    function::destroy_function_table,
    hash::{new_persistent_table, HashTable},
    object::destroy_class_table,
    string::interned_strings_shutdown,
};

struct ExecutorGlobals {
    function_table: Cell<*mut HashTable>,
    class_table: Cell<*mut HashTable>,
    current_execute_data: Cell<*mut ZendExecuteData>,
    next_object_handle: Cell<u32>,
    live_objects: Cell<u32>,
    next_resource_handle: Cell<i64>,
    gc_possible_roots: Cell<usize>,
}

impl ExecutorGlobals {
    const fn new() -> Self {
        Self {
            function_table: Cell::new(null_mut()),
            class_table: Cell::new(null_mut()),
            current_execute_data: Cell::new(null_mut()),
            next_object_handle: Cell::new(1),
            live_objects: Cell::new(0),
            next_resource_handle: Cell::new(1),
            gc_possible_roots: Cell::new(0),
        }
    }
}

thread_local! {
    static EG: ExecutorGlobals = const { ExecutorGlobals::new() };
}

/// Returns the global function table, creating it on first use.
pub fn eg_function_table() -> *mut HashTable {
    EG.with(|globals| {
        if globals.function_table.get().is_null() {
            globals.function_table.set(new_persistent_table(64));
        }

        globals.function_table.get()
    })
}

/// Returns the global class table, creating it on first use.
///
/// Keys are lowercase class names, values are `IS_PTR` boxes of class
/// entries.
pub fn cg_class_table() -> *mut HashTable {
    EG.with(|globals| {
        if globals.class_table.get().is_null() {
            globals.class_table.set(new_persistent_table(64));
        }

        globals.class_table.get()
    })
}

/// Returns the active call frame, or null outside of a function call.
#[inline]
pub fn current_execute_data() -> *mut ZendExecuteData {
    EG.with(|globals| globals.current_execute_data.get())
}

#[inline]
pub(crate) fn set_current_execute_data(execute_data: *mut ZendExecuteData) {
    EG.with(|globals| globals.current_execute_data.set(execute_data))
}

pub(crate) fn objects_store_put() -> u32 {
    EG.with(|globals| {
        let handle = globals.next_object_handle.get();

        globals.next_object_handle.set(handle + 1);
        globals.live_objects.set(globals.live_objects.get() + 1);

        handle
    })
}

pub(crate) fn objects_store_del() {
    EG.with(|globals| globals.live_objects.set(globals.live_objects.get().saturating_sub(1)))
}

/// Returns the number of objects that are not released yet.
#[inline]
pub fn live_objects() -> u32 {
    EG.with(|globals| globals.live_objects.get())
}

pub(crate) fn next_resource_handle() -> i64 {
    EG.with(|globals| {
        let handle = globals.next_resource_handle.get();
        globals.next_resource_handle.set(handle + 1);
        handle
    })
}

#[inline]
pub(crate) fn gc_add_possible_root() {
    EG.with(|globals| globals.gc_possible_roots.set(globals.gc_possible_roots.get() + 1))
}

/// Returns the number of times a collectable value survived a release and
/// was buffered as a possible cycle root.
#[inline]
pub fn gc_possible_roots() -> usize {
    EG.with(|globals| globals.gc_possible_roots.get())
}

/// Tears down the host state of the current thread: registered classes and
/// functions, and interned strings.
///
/// Returns the memory manager counters after the teardown. Request-bound
/// blocks that are still alive at this point are leaks of the caller and
/// are reported through the log.
pub fn zend_engine_shutdown() -> HeapStats {
    let (class_table, function_table) = EG.with(|globals| {
        (
            globals.class_table.replace(null_mut()),
            globals.function_table.replace(null_mut()),
        )
    });

    let classes = match class_table.is_null() {
        true => 0,
        // Safety: The table was created by `cg_class_table` and is detached now.
        false => unsafe { destroy_class_table(class_table) },
    };

    let functions = match function_table.is_null() {
        true => 0,
        // Safety: The table was created by `eg_function_table` and is detached now.
        false => unsafe { destroy_function_table(function_table) },
    };

    let strings = interned_strings_shutdown();

    EG.with(|globals| {
        globals.current_execute_data.set(null_mut());
        globals.gc_possible_roots.set(0);
    });

    let stats = heap_stats();

    debug!("engine shutdown: {classes} classes, {functions} functions, {strings} interned strings released");

    if stats.request_blocks > 0 {
        warn!(
            "{} request blocks ({} bytes) leaked: {:x?}",
            stats.request_blocks,
            stats.request_bytes,
            request_block_addresses(),
        );
    }

    stats
}
