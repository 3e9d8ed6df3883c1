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
    ffi::{c_char, c_void, CStr},
    ptr::addr_of_mut,
};

use zend_compat_engine::{
    function::ZendFunctionEntry,
    object::{
        object_init_ex,
        object_properties_init,
        zend_object_properties_size,
        zend_object_release,
        zend_object_std_init,
        CreateObjectFn,
        ZendClassEntry,
        ZendObject,
    },
    types::{ZendResultCode, Zval},
};

use crate::abi::{Active, CompatDefinition};

#[no_mangle]
pub unsafe extern "C" fn phper_zend_object_properties_size(ce: *mut ZendClassEntry) -> usize {
    unsafe { zend_object_properties_size(ce) }
}

/// Allocates the storage of an object whose native wrapper is `obj_size`
/// bytes long. The block also covers the trailing property slots of `ce`,
/// and its first `obj_size` bytes are zero. Divergent.
#[no_mangle]
pub unsafe extern "C" fn phper_zend_object_alloc(obj_size: usize, ce: *mut ZendClassEntry) -> *mut c_void {
    unsafe { Active::zend_object_alloc(obj_size, ce) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_zend_object_std_init(object: *mut ZendObject, ce: *mut ZendClassEntry) {
    unsafe { zend_object_std_init(object, ce) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_object_properties_init(object: *mut ZendObject, ce: *mut ZendClassEntry) {
    unsafe { object_properties_init(object, ce) }
}

/// Instantiates `ce` into `arg`. Fails for abstract classes and
/// interfaces, leaving null in `arg`.
#[no_mangle]
pub unsafe extern "C" fn phper_object_init_ex(arg: *mut Zval, ce: *mut ZendClassEntry) -> ZendResultCode {
    unsafe { object_init_ex(arg, ce) }
}

/// Divergent.
#[no_mangle]
pub unsafe extern "C" fn phper_instanceof_function(
    instance_ce: *const ZendClassEntry,
    ce: *const ZendClassEntry,
) -> bool {
    unsafe { Active::instanceof_function(instance_ce, ce) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_get_parent_class(ce: *mut ZendClassEntry) -> *mut ZendClassEntry {
    unsafe { (*ce).parent }
}

/// Returns the address of the custom instantiation hook of `ce`. The hook
/// is read and installed through the returned slot.
#[no_mangle]
pub unsafe extern "C" fn phper_get_create_object(ce: *mut ZendClassEntry) -> *mut Option<CreateObjectFn> {
    unsafe { addr_of_mut!((*ce).create_object) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_zend_object_release(object: *mut ZendObject) {
    unsafe { zend_object_release(object) }
}

#[no_mangle]
pub unsafe extern "C" fn phper_zend_object_refcount(object: *mut ZendObject) -> u32 {
    unsafe { (*object).gc.refcount }
}

/// Initializes `ce` with the name `class_name[..class_name_len]`.
/// Divergent.
#[no_mangle]
pub unsafe extern "C" fn phper_init_class_entry_ex(
    ce: *mut ZendClassEntry,
    class_name: *const c_char,
    class_name_len: usize,
    functions: *const ZendFunctionEntry,
) {
    unsafe { Active::init_class_entry_ex(ce, class_name, class_name_len, functions) }
}

/// Same as [phper_init_class_entry_ex] for a null-terminated class name.
#[no_mangle]
pub unsafe extern "C" fn phper_init_class_entry(
    ce: *mut ZendClassEntry,
    class_name: *const c_char,
    functions: *const ZendFunctionEntry,
) {
    unsafe {
        let len = CStr::from_ptr(class_name).to_bytes().len();

        Active::init_class_entry_ex(ce, class_name, len, functions)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::Cell,
        mem::{offset_of, size_of},
        ptr::{null, null_mut},
    };

    use zend_compat_engine::{
        alloc::{block_size, heap_stats},
        globals::live_objects,
        object::{
            zend_declare_property,
            zend_object_std_dtor,
            zend_register_internal_class_ex,
            ZendObjectHandlers,
            ZEND_ACC_ABSTRACT,
        },
        string::zstr_bytes,
        types::{IS_NULL, IS_OBJECT, FAILURE, SUCCESS},
        values::zval_ptr_dtor,
        z_obj_p,
        zval_long,
    };

    use super::*;

    #[repr(C)]
    struct Counter {
        hits: u64,
        label: *mut c_char,
        object: ZendObject,
    }

    static COUNTER_HANDLERS: ZendObjectHandlers = ZendObjectHandlers {
        offset: offset_of!(Counter, object) as i32,
        free_obj: Some(zend_object_std_dtor),
    };

    thread_local! {
        static COUNTERS_CREATED: Cell<u32> = const { Cell::new(0) };
    }

    unsafe extern "C" fn create_counter(ce: *mut ZendClassEntry) -> *mut ZendObject {
        COUNTERS_CREATED.set(COUNTERS_CREATED.get() + 1);

        unsafe {
            let counter = phper_zend_object_alloc(size_of::<Counter>(), ce) as *mut Counter;
            let object = &mut (*counter).object as *mut ZendObject;

            phper_zend_object_std_init(object, ce);
            phper_object_properties_init(object, ce);
            (*object).handlers = &COUNTER_HANDLERS;

            object
        }
    }

    unsafe fn register(name: &CStr, parent: *mut ZendClassEntry) -> *mut ZendClassEntry {
        unsafe {
            let mut ce = ZendClassEntry::default();
            phper_init_class_entry(&mut ce, name.as_ptr(), null());
            zend_register_internal_class_ex(&mut ce, parent)
        }
    }

    #[test]
    fn test_custom_object_lifecycle() {
        unsafe {
            let ce = register(c"Counter", null_mut());
            *phper_get_create_object(ce) = Some(create_counter);

            let mut default = Zval::undef();
            zval_long!(&mut default, 3);
            zend_declare_property(ce, c"step".as_ptr(), 4, &mut default);

            assert_eq!(phper_zend_object_properties_size(ce), size_of::<Zval>());
            assert!((*phper_get_create_object(ce)).is_some());

            let mut zv = Zval::undef();
            assert_eq!(phper_object_init_ex(&mut zv, ce), SUCCESS);
            assert_eq!(zv.ty(), IS_OBJECT);
            assert_eq!(COUNTERS_CREATED.get(), 1);

            let object = z_obj_p!(&zv);
            let counter = (object as *mut u8).sub(offset_of!(Counter, object)) as *mut Counter;

            assert!(block_size(counter as *const c_void).unwrap_or(0) >= size_of::<Counter>() + size_of::<Zval>());
            assert_eq!(phper_zend_object_refcount(object), 1);
            assert_eq!(live_objects(), 1);

            assert_eq!((*counter).hits, 0);
            assert!((*counter).label.is_null());
            (*counter).hits += 1;

            zval_ptr_dtor(&mut zv);

            assert_eq!(live_objects(), 0);
            assert_eq!(heap_stats().request_blocks, 0);
        }
    }

    #[test]
    fn test_standard_objects() {
        unsafe {
            let ce = register(c"Plain", null_mut());

            let mut default = Zval::undef();
            zval_long!(&mut default, 1);
            zend_declare_property(ce, c"a".as_ptr(), 1, &mut default);

            let mut zv = Zval::undef();
            assert_eq!(phper_object_init_ex(&mut zv, ce), SUCCESS);

            let object = z_obj_p!(&zv);
            (*object).gc.refcount += 1;
            assert_eq!(phper_zend_object_refcount(object), 2);

            phper_zend_object_release(object);
            assert_eq!(phper_zend_object_refcount(object), 1);
            assert_eq!(live_objects(), 1);

            phper_zend_object_release(object);

            assert_eq!(live_objects(), 0);
            assert_eq!(heap_stats().request_blocks, 0);
        }
    }

    #[test]
    fn test_class_hierarchy() {
        unsafe {
            let base = register(c"Shape", null_mut());
            let derived = register(c"Circle", base);

            assert_eq!(zstr_bytes((*derived).name), b"Circle");
            assert_eq!(phper_get_parent_class(derived), base);
            assert!(phper_get_parent_class(base).is_null());
            assert!((*phper_get_create_object(base)).is_none());
            assert!((*phper_get_create_object(derived)).is_none());

            assert!(phper_instanceof_function(derived, base));
            assert!(!phper_instanceof_function(base, derived));

            (*base).ce_flags |= ZEND_ACC_ABSTRACT;

            let mut zv = Zval::undef();
            assert_eq!(phper_object_init_ex(&mut zv, base), FAILURE);
            assert_eq!(zv.ty(), IS_NULL);
        }
    }
}
