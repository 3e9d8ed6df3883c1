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

//! Classes and objects.
//!
//! An object is a [ZendObject] header followed by its declared property
//! slots. Extension objects embed the header at the end of their own
//! struct and report the header's offset through [ZendObjectHandlers], so
//! the host can release the whole block from a header pointer.

use std::{
    ffi::{c_char, c_void},
    mem::size_of,
    ptr::{addr_of_mut, null, null_mut, write_bytes},
};

use log::trace;

use crate::{
    alloc::{efree, emalloc, pefree, pemalloc},
    function::{destroy_function_table, zend_register_functions, ZendFunction, ZendFunctionEntry},
    globals::{cg_class_table, objects_store_del, objects_store_put},
    hash::{
        new_persistent_table, zend_array_destroy, zend_hash_buckets, zend_hash_destroy,
        zend_hash_num_elements, zend_hash_str_find, zend_hash_str_find_ptr,
        zend_hash_str_update, zend_hash_str_update_ptr, zend_new_array, HashTable,
    },
    string::{zend_string_init_interned, zend_string_release, zend_string_tolower, zstr_bytes, ZendString},
    types::{
        ZendRefcounted, ZendResultCode, Zval, FAILURE, IS_INDIRECT, IS_LONG, IS_NULL, IS_OBJECT,
        IS_OBJECT_EX, IS_UNDEF, SUCCESS,
    },
    values::zval_ptr_dtor,
};

pub const ZEND_INTERNAL_CLASS: u8 = 1;

pub const ZEND_ACC_INTERFACE: u32 = 1 << 0;
pub const ZEND_ACC_ABSTRACT: u32 = 1 << 6;

/// A custom object constructor of a class.
pub type CreateObjectFn = unsafe extern "C" fn(ce: *mut ZendClassEntry) -> *mut ZendObject;

/// Releases the storage of an object whose last reference was dropped.
pub type FreeObjFn = unsafe extern "C" fn(object: *mut ZendObject);

/// A class definition.
#[repr(C)]
pub struct ZendClassEntry {
    pub type_: u8,
    pub name: *mut ZendString,
    pub parent: *mut ZendClassEntry,
    pub refcount: i32,
    pub ce_flags: u32,

    pub default_properties_count: i32,
    pub default_properties_table: *mut Zval,

    /// Declared property names mapped to `IS_LONG` slot numbers.
    pub properties_info: *mut HashTable,

    /// Lowercase method names mapped to `IS_PTR` function records.
    pub function_table: *mut HashTable,

    pub create_object: Option<CreateObjectFn>,

    pub num_interfaces: u32,
    pub interfaces: *mut *mut ZendClassEntry,

    pub builtin_functions: *const ZendFunctionEntry,

    /// Overload handlers of hosts older than 7.3.
    pub __call: *mut ZendFunction,
    pub __get: *mut ZendFunction,
    pub __set: *mut ZendFunction,
}

impl Default for ZendClassEntry {
    fn default() -> Self {
        Self {
            type_: 0,
            name: null_mut(),
            parent: null_mut(),
            refcount: 0,
            ce_flags: 0,
            default_properties_count: 0,
            default_properties_table: null_mut(),
            properties_info: null_mut(),
            function_table: null_mut(),
            create_object: None,
            num_interfaces: 0,
            interfaces: null_mut(),
            builtin_functions: null(),
            __call: null_mut(),
            __get: null_mut(),
            __set: null_mut(),
        }
    }
}

/// The per-class object handlers.
#[repr(C)]
pub struct ZendObjectHandlers {
    /// The offset of the [ZendObject] header inside the allocated block.
    pub offset: i32,
    pub free_obj: Option<FreeObjFn>,
}

pub static STD_OBJECT_HANDLERS: ZendObjectHandlers = ZendObjectHandlers {
    offset: 0,
    free_obj: Some(zend_object_std_dtor),
};

/// The common header of every object.
///
/// The declared property slots follow the header in the same allocation.
#[repr(C)]
pub struct ZendObject {
    pub gc: ZendRefcounted,
    pub handle: u32,
    pub ce: *mut ZendClassEntry,
    pub handlers: *const ZendObjectHandlers,
    pub properties: *mut HashTable,
    pub properties_table: [Zval; 0],
}

#[inline(always)]
unsafe fn properties_table(object: *mut ZendObject) -> *mut Zval {
    unsafe { addr_of_mut!((*object).properties_table) as *mut Zval }
}

#[inline(always)]
unsafe fn properties_count(ce: *const ZendClassEntry) -> usize {
    unsafe { usize::try_from((*ce).default_properties_count).unwrap_or(0) }
}

/// Returns the size of the property slots that trail an object of class
/// `ce`.
///
/// # Safety
///
/// `ce` points to an initialized class entry.
#[inline]
pub unsafe fn zend_object_properties_size(ce: *const ZendClassEntry) -> usize {
    unsafe { size_of::<Zval>() * properties_count(ce) }
}

/// Allocates a block for an object of `obj_size` bytes plus the property
/// slots of `ce`. The first `obj_size` bytes are zeroed.
///
/// Available on hosts 7.3 and newer.
///
/// # Safety
///
/// `ce` points to an initialized class entry.
pub unsafe fn zend_object_alloc(obj_size: usize, ce: *const ZendClassEntry) -> *mut c_void {
    unsafe {
        let block = emalloc(obj_size + zend_object_properties_size(ce));
        write_bytes(block as *mut u8, 0, obj_size);
        block
    }
}

/// Initializes the object header and registers the object in the object
/// store. Property slots are left untouched.
///
/// # Safety
///
/// `object` points to writable header memory and `ce` to an initialized
/// class entry.
pub unsafe fn zend_object_std_init(object: *mut ZendObject, ce: *mut ZendClassEntry) {
    unsafe {
        addr_of_mut!((*object).gc).write(ZendRefcounted::new(IS_OBJECT, 0));
        addr_of_mut!((*object).handle).write(objects_store_put());
        addr_of_mut!((*object).ce).write(ce);
        addr_of_mut!((*object).handlers).write(&STD_OBJECT_HANDLERS);
        addr_of_mut!((*object).properties).write(null_mut());
    }
}

/// Fills the property slots with new references to the class defaults.
///
/// # Safety
///
/// `object` was initialized for class `ce` and its block covers the
/// property slots of `ce`.
pub unsafe fn object_properties_init(object: *mut ZendObject, ce: *mut ZendClassEntry) {
    unsafe {
        let table = properties_table(object);

        for slot in 0..properties_count(ce) {
            let default = *(*ce).default_properties_table.add(slot);

            if default.is_refcounted() {
                (*default.value.counted).refcount += 1;
            }

            table.add(slot).write(default);
        }
    }
}

/// Builds the property table of an object. Declared properties are
/// inserted as `IS_INDIRECT` entries pointing into the property slots.
///
/// # Safety
///
/// `object` points to a live object whose property table is not built yet.
pub unsafe fn rebuild_object_properties(object: *mut ZendObject) {
    unsafe {
        let ce = (*object).ce;
        let table = properties_table(object);
        let properties = zend_new_array(properties_count(ce) as u32);

        if !(*ce).properties_info.is_null() {
            for bucket in zend_hash_buckets((*ce).properties_info) {
                if bucket.val.ty() != IS_LONG || bucket.key.is_null() {
                    continue;
                }

                let name = zstr_bytes(bucket.key);

                let mut indirect = Zval::undef();
                indirect.value.zv = table.add(bucket.val.value.lval as usize);
                indirect.type_info = IS_INDIRECT as u32;

                let _ = zend_hash_str_update(
                    properties,
                    name.as_ptr() as *const c_char,
                    name.len(),
                    &mut indirect,
                );
            }
        }

        (*object).properties = properties;
    }
}

/// Returns the property table of an object, building it on first use.
///
/// # Safety
///
/// `object` points to a live object.
pub unsafe fn zend_std_get_properties(object: *mut ZendObject) -> *mut HashTable {
    unsafe {
        if (*object).properties.is_null() {
            rebuild_object_properties(object);
        }

        (*object).properties
    }
}

/// Creates a standard object of class `ce` with uninitialized property
/// slots.
///
/// # Safety
///
/// `ce` points to an initialized class entry.
pub unsafe fn zend_objects_new(ce: *mut ZendClassEntry) -> *mut ZendObject {
    unsafe {
        let object = zend_object_alloc(size_of::<ZendObject>(), ce) as *mut ZendObject;
        zend_object_std_init(object, ce);
        object
    }
}

/// Instantiates class `ce` into `arg`.
///
/// Uses the class's `create_object` constructor when present. Abstract
/// classes and interfaces cannot be instantiated: `arg` is set to null and
/// the call fails.
///
/// # Safety
///
/// `arg` points to writable value storage and `ce` to an initialized class
/// entry.
pub unsafe fn object_init_ex(arg: *mut Zval, ce: *mut ZendClassEntry) -> ZendResultCode {
    unsafe {
        if (*ce).ce_flags & (ZEND_ACC_INTERFACE | ZEND_ACC_ABSTRACT) != 0 {
            arg.write(Zval::undef());
            (*arg).type_info = IS_NULL as u32;
            return FAILURE;
        }

        let object = match (*ce).create_object {
            Some(create_object) => create_object(ce),

            None => {
                let object = zend_objects_new(ce);
                object_properties_init(object, ce);
                object
            }
        };

        let mut zv = Zval::undef();
        zv.value.obj = object;
        zv.type_info = IS_OBJECT_EX;

        arg.write(zv);

        SUCCESS
    }
}

/// Destroys the property slots and the property table of an object.
///
/// This is the `free_obj` handler of standard objects.
///
/// # Safety
///
/// `object` points to an object without remaining references.
pub unsafe extern "C" fn zend_object_std_dtor(object: *mut ZendObject) {
    unsafe {
        let properties = (*object).properties;

        if !properties.is_null() {
            (*object).properties = null_mut();
            zend_array_destroy(properties);
        }

        let table = properties_table(object);

        for slot in 0..properties_count((*object).ce) {
            let zv = table.add(slot);

            if (*zv).ty() != IS_UNDEF {
                zval_ptr_dtor(zv);
                (*zv).type_info = IS_UNDEF as u32;
            }
        }
    }
}

/// Releases an object whose reference counter dropped to zero.
///
/// # Safety
///
/// `object` points to an object without remaining references.
pub unsafe fn zend_objects_store_del(object: *mut ZendObject) {
    unsafe {
        let handlers = match (*object).handlers.is_null() {
            true => &STD_OBJECT_HANDLERS,
            false => &*(*object).handlers,
        };

        match handlers.free_obj {
            Some(free_obj) => free_obj(object),
            None => zend_object_std_dtor(object),
        }

        objects_store_del();

        let block = (object as *mut u8).offset(-(handlers.offset as isize));

        efree(block as *mut c_void);
    }
}

/// Drops one reference to `object`, releasing it when no references remain.
///
/// # Safety
///
/// `object` points to a live object and the caller owns the dropped
/// reference.
pub unsafe fn zend_object_release(object: *mut ZendObject) {
    unsafe {
        (*object).gc.refcount -= 1;

        if (*object).gc.refcount == 0 {
            zend_objects_store_del(object);
        }
    }
}

/// Returns true if `instance_ce` is `ce`, derives from `ce`, or implements
/// `ce`.
///
/// Available on hosts 8.0 and newer.
///
/// # Safety
///
/// Both pointers refer to initialized class entries.
#[inline]
pub unsafe fn instanceof_function(instance_ce: *const ZendClassEntry, ce: *const ZendClassEntry) -> bool {
    unsafe { instance_ce == ce || instanceof_function_slow(instance_ce, ce) }
}

/// The out-of-line part of [instanceof_function].
///
/// # Safety
///
/// See [instanceof_function].
pub unsafe fn instanceof_function_slow(instance_ce: *const ZendClassEntry, ce: *const ZendClassEntry) -> bool {
    unsafe {
        if (*ce).ce_flags & ZEND_ACC_INTERFACE != 0 {
            let mut current = instance_ce;

            while !current.is_null() {
                if implements_directly(current, ce) {
                    return true;
                }

                current = (*current).parent;
            }

            return false;
        }

        let mut current = (*instance_ce).parent as *const ZendClassEntry;

        while !current.is_null() {
            if current == ce {
                return true;
            }

            current = (*current).parent;
        }

        false
    }
}

unsafe fn implements_directly(class: *const ZendClassEntry, interface: *const ZendClassEntry) -> bool {
    unsafe {
        for index in 0..(*class).num_interfaces as usize {
            let implemented = *(*class).interfaces.add(index);

            if implemented as *const ZendClassEntry == interface
                || instanceof_function(implemented, interface)
            {
                return true;
            }
        }

        false
    }
}

/// Declares that `class` implements the given interfaces.
///
/// # Safety
///
/// `class` points to a registered class and `interfaces` to registered
/// interfaces.
pub unsafe fn zend_class_implements(class: *mut ZendClassEntry, interfaces: &[*mut ZendClassEntry]) {
    unsafe {
        let previous = (*class).num_interfaces as usize;
        let total = previous + interfaces.len();

        let table = pemalloc(total * size_of::<*mut ZendClassEntry>(), true) as *mut *mut ZendClassEntry;

        for index in 0..previous {
            table.add(index).write(*(*class).interfaces.add(index));
        }

        for (index, interface) in interfaces.iter().enumerate() {
            table.add(previous + index).write(*interface);
        }

        if !(*class).interfaces.is_null() {
            pefree((*class).interfaces as *mut c_void, true);
        }

        (*class).interfaces = table;
        (*class).num_interfaces = total as u32;
    }
}

/// Initializes a class entry in place: interns the name and attaches the
/// method list.
///
/// Available on hosts 7.3 and newer.
///
/// # Safety
///
/// `ce` points to writable memory, `name` to `len` readable bytes, and
/// `functions` is null or points to an entry list terminated by
/// [ZendFunctionEntry::end].
pub unsafe fn init_class_entry_ex(
    ce: *mut ZendClassEntry,
    name: *const c_char,
    len: usize,
    functions: *const ZendFunctionEntry,
) {
    unsafe {
        ce.write(ZendClassEntry::default());
        (*ce).name = zend_string_init_interned(name, len, true);
        (*ce).builtin_functions = functions;
    }
}

/// Registers an internal class built by [init_class_entry_ex].
///
/// The class entry is copied into persistent storage owned by the class
/// table, the builtin functions become its methods, and the declared
/// properties of `parent` are inherited. Returns null if a class with the
/// same case-insensitive name exists already.
///
/// # Safety
///
/// `class_entry` points to an initialized class entry, and `parent` is null
/// or points to a registered class.
pub unsafe fn zend_register_internal_class_ex(
    class_entry: *mut ZendClassEntry,
    parent: *mut ZendClassEntry,
) -> *mut ZendClassEntry {
    unsafe {
        let lowercase = zend_string_tolower((*class_entry).name);
        let key = zstr_bytes(lowercase);
        let class_table = cg_class_table();

        if !zend_hash_str_find(class_table, key.as_ptr() as *const c_char, key.len()).is_null() {
            zend_string_release(lowercase);
            return null_mut();
        }

        let ce = pemalloc(size_of::<ZendClassEntry>(), true) as *mut ZendClassEntry;

        ce.write(ZendClassEntry {
            type_: ZEND_INTERNAL_CLASS,
            refcount: 1,
            properties_info: new_persistent_table(8),
            function_table: new_persistent_table(8),
            ..ZendClassEntry::default()
        });

        (*ce).name = (*class_entry).name;
        (*ce).ce_flags = (*class_entry).ce_flags;
        (*ce).create_object = (*class_entry).create_object;
        (*ce).builtin_functions = (*class_entry).builtin_functions;
        (*ce).__call = (*class_entry).__call;
        (*ce).__get = (*class_entry).__get;
        (*ce).__set = (*class_entry).__set;

        if !(*ce).builtin_functions.is_null() {
            let _ = zend_register_functions(ce, (*ce).builtin_functions, (*ce).function_table);
        }

        if !parent.is_null() {
            inherit(ce, parent);
        }

        let _ = zend_hash_str_update_ptr(class_table, key.as_ptr() as *const c_char, key.len(), ce as *mut c_void);

        trace!("registered class {:?}", String::from_utf8_lossy(zstr_bytes((*ce).name)));

        zend_string_release(lowercase);

        ce
    }
}

unsafe fn inherit(ce: *mut ZendClassEntry, parent: *mut ZendClassEntry) {
    unsafe {
        (*ce).parent = parent;

        if (*ce).create_object.is_none() {
            (*ce).create_object = (*parent).create_object;
        }

        for bucket in zend_hash_buckets((*parent).properties_info) {
            if bucket.key.is_null() || bucket.val.ty() != IS_LONG {
                continue;
            }

            let default = *default_slot(parent, bucket.val.value.lval as usize);

            if default.is_refcounted() {
                (*default.value.counted).refcount += 1;
            }

            declare(ce, zstr_bytes(bucket.key), default);
        }
    }
}

/// Registers an interface built by [init_class_entry_ex].
///
/// # Safety
///
/// See [zend_register_internal_class_ex].
pub unsafe fn zend_register_internal_interface(class_entry: *mut ZendClassEntry) -> *mut ZendClassEntry {
    unsafe {
        (*class_entry).ce_flags |= ZEND_ACC_INTERFACE;
        zend_register_internal_class_ex(class_entry, null_mut())
    }
}

/// Looks up a registered class by case-insensitive name.
///
/// # Safety
///
/// `name` points to `len` readable bytes.
pub unsafe fn zend_lookup_class(name: *const c_char, len: usize) -> *mut ZendClassEntry {
    unsafe {
        let lowercase = std::slice::from_raw_parts(name as *const u8, len).to_ascii_lowercase();

        zend_hash_str_find_ptr(cg_class_table(), lowercase.as_ptr() as *const c_char, lowercase.len())
            as *mut ZendClassEntry
    }
}

/// Declares a property with a default value on a registered class.
///
/// The default value is moved into the class. Redeclaring a property
/// replaces its default.
///
/// # Safety
///
/// `ce` points to a registered class, `name` to `len` readable bytes and
/// `default` to a persistent or non-refcounted value.
pub unsafe fn zend_declare_property(
    ce: *mut ZendClassEntry,
    name: *const c_char,
    len: usize,
    default: *mut Zval,
) -> ZendResultCode {
    unsafe {
        let name = std::slice::from_raw_parts(name as *const u8, len);

        declare(ce, name, *default);

        SUCCESS
    }
}

unsafe fn declare(ce: *mut ZendClassEntry, name: &[u8], default: Zval) {
    unsafe {
        let existing = zend_hash_str_find((*ce).properties_info, name.as_ptr() as *const c_char, name.len());

        if !existing.is_null() {
            let slot = default_slot(ce, (*existing).value.lval as usize);

            zval_ptr_dtor(slot);
            slot.write(default);

            return;
        }

        let slot = properties_count(ce);
        let bytes = (slot + 1) * size_of::<Zval>();

        let table = pemalloc(bytes, true) as *mut Zval;

        for index in 0..slot {
            table.add(index).write(*(*ce).default_properties_table.add(index));
        }

        table.add(slot).write(default);

        if !(*ce).default_properties_table.is_null() {
            pefree((*ce).default_properties_table as *mut c_void, true);
        }

        (*ce).default_properties_table = table;
        (*ce).default_properties_count += 1;

        let mut info = Zval::undef();
        info.value.lval = slot as i64;
        info.type_info = IS_LONG as u32;

        let _ = zend_hash_str_update((*ce).properties_info, name.as_ptr() as *const c_char, name.len(), &mut info);
    }
}

#[inline(always)]
unsafe fn default_slot(ce: *mut ZendClassEntry, slot: usize) -> *mut Zval {
    unsafe { (*ce).default_properties_table.add(slot) }
}

unsafe fn destroy_class(ce: *mut ZendClassEntry) {
    unsafe {
        for slot in 0..properties_count(ce) {
            zval_ptr_dtor(default_slot(ce, slot));
        }

        if !(*ce).default_properties_table.is_null() {
            pefree((*ce).default_properties_table as *mut c_void, true);
        }

        if !(*ce).interfaces.is_null() {
            pefree((*ce).interfaces as *mut c_void, true);
        }

        zend_hash_destroy((*ce).properties_info);
        pefree((*ce).properties_info as *mut c_void, true);

        let _ = destroy_function_table((*ce).function_table);

        pefree(ce as *mut c_void, true);
    }
}

pub(crate) unsafe fn destroy_class_table(ht: *mut HashTable) -> usize {
    unsafe {
        let count = zend_hash_num_elements(ht) as usize;

        for bucket in zend_hash_buckets(ht) {
            if bucket.val.ty() == IS_UNDEF {
                continue;
            }

            destroy_class(bucket.val.value.ce);
        }

        zend_hash_destroy(ht);
        pefree(ht as *mut c_void, true);

        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        alloc::{block_size, heap_stats},
        globals::live_objects,
        string::{zend_string_from_bytes, zend_string_refcount},
        types::IS_STRING_EX,
        values::zval_get_long,
    };

    unsafe fn register(name: &str) -> *mut ZendClassEntry {
        unsafe {
            let mut ce = ZendClassEntry::default();
            init_class_entry_ex(&mut ce, name.as_ptr() as *const c_char, name.len(), null());
            zend_register_internal_class_ex(&mut ce, null_mut())
        }
    }

    fn long(value: i64) -> Zval {
        let mut zv = Zval::undef();
        zv.value.lval = value;
        zv.type_info = IS_LONG as u32;
        zv
    }

    #[test]
    fn test_object_alloc_zeroes_prefix() {
        unsafe {
            let ce = register("ObjectAllocPrefix");
            let _ = zend_declare_property(ce, "a".as_ptr() as *const c_char, 1, &mut long(1));
            let _ = zend_declare_property(ce, "b".as_ptr() as *const c_char, 1, &mut long(2));

            let block = zend_object_alloc(40, ce);

            assert_eq!(block_size(block), Some(40 + 2 * size_of::<Zval>()));
            assert!(std::slice::from_raw_parts(block as *const u8, 40).iter().all(|byte| *byte == 0));

            efree(block);
        }
    }

    #[test]
    fn test_object_lifecycle() {
        let before = heap_stats();
        let objects = live_objects();

        unsafe {
            let ce = register("ObjectLifecycle");

            let name = zend_string_from_bytes(b"default", true);
            let mut default = Zval::undef();
            default.value.str_ = name;
            default.type_info = IS_STRING_EX;
            let _ = zend_declare_property(ce, "title".as_ptr() as *const c_char, 5, &mut default);

            let mut zv = Zval::undef();
            assert_eq!(object_init_ex(&mut zv, ce), SUCCESS);
            assert_eq!(live_objects(), objects + 1);

            let object = zv.value.obj;
            assert_eq!(zend_string_refcount(name), 2);

            let properties = zend_std_get_properties(object);
            let title = zend_hash_str_find(properties, "title".as_ptr() as *const c_char, 5);
            assert_eq!((*title).ty(), IS_INDIRECT);
            assert_eq!((*(*title).value.zv).value.str_, name);

            zval_ptr_dtor(&mut zv);

            assert_eq!(live_objects(), objects);
            assert_eq!(zend_string_refcount(name), 1);
        }

        assert_eq!(heap_stats().request_blocks, before.request_blocks);
    }

    #[test]
    fn test_abstract_class_is_not_instantiable() {
        unsafe {
            let mut ce = ZendClassEntry::default();
            init_class_entry_ex(&mut ce, "AbstractThing".as_ptr() as *const c_char, 13, null());
            ce.ce_flags |= ZEND_ACC_ABSTRACT;
            let ce = zend_register_internal_class_ex(&mut ce, null_mut());

            let mut zv = long(5);
            assert_eq!(object_init_ex(&mut zv, ce), FAILURE);
            assert_eq!(zv.ty(), IS_NULL);
        }
    }

    #[test]
    fn test_instanceof_walks_parents_and_interfaces() {
        unsafe {
            let mut interface = ZendClassEntry::default();
            init_class_entry_ex(&mut interface, "Countable2".as_ptr() as *const c_char, 10, null());
            let interface = zend_register_internal_interface(&mut interface);

            let base = register("InstanceBase");
            zend_class_implements(base, &[interface]);

            let mut child = ZendClassEntry::default();
            init_class_entry_ex(&mut child, "InstanceChild".as_ptr() as *const c_char, 13, null());
            let child = zend_register_internal_class_ex(&mut child, base);

            let other = register("InstanceOther");

            assert!(instanceof_function(child, child));
            assert!(instanceof_function(child, base));
            assert!(instanceof_function(child, interface));
            assert!(!instanceof_function(base, child));
            assert!(!instanceof_function(other, base));
            assert!(!instanceof_function(other, interface));
        }
    }

    #[test]
    fn test_class_lookup_is_case_insensitive() {
        unsafe {
            let ce = register("LookupMe");

            assert_eq!(zend_lookup_class("lookupme".as_ptr() as *const c_char, 8), ce);
            assert_eq!(zend_lookup_class("LOOKUPME".as_ptr() as *const c_char, 8), ce);
            assert!(zend_lookup_class("Missing".as_ptr() as *const c_char, 7).is_null());

            let mut duplicate = ZendClassEntry::default();
            init_class_entry_ex(&mut duplicate, "lookupMe".as_ptr() as *const c_char, 8, null());
            assert!(zend_register_internal_class_ex(&mut duplicate, null_mut()).is_null());
        }
    }

    #[test]
    fn test_properties_are_inherited() {
        unsafe {
            let base = register("PropertyBase");
            let _ = zend_declare_property(base, "x".as_ptr() as *const c_char, 1, &mut long(7));

            let mut child = ZendClassEntry::default();
            init_class_entry_ex(&mut child, "PropertyChild".as_ptr() as *const c_char, 13, null());
            let child = zend_register_internal_class_ex(&mut child, base);

            assert_eq!((*child).default_properties_count, 1);

            let mut zv = Zval::undef();
            assert_eq!(object_init_ex(&mut zv, child), SUCCESS);

            let x = zend_hash_str_find(zend_std_get_properties(zv.value.obj), "x".as_ptr() as *const c_char, 1);
            assert_eq!(zval_get_long((*x).value.zv), 7);

            zval_ptr_dtor(&mut zv);
        }
    }
}
