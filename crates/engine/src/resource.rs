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

use std::{ffi::c_void, mem::size_of};

use crate::{
    alloc::emalloc,
    globals::next_resource_handle,
    types::{ZendRefcounted, IS_RESOURCE},
};

/// An opaque native handle wrapped into a host value.
///
/// The host releases the wrapper when the last reference is dropped. The
/// wrapped pointer stays owned by the registrant.
#[repr(C)]
pub struct ZendResource {
    pub gc: ZendRefcounted,
    pub handle: i64,
    pub type_: i32,
    pub ptr: *mut c_void,
}

/// Wraps `ptr` into a new resource of the registrant-defined kind `type_`.
///
/// Resource handles are unique per thread and increase monotonically.
pub fn zend_register_resource(ptr: *mut c_void, type_: i32) -> *mut ZendResource {
    let resource = emalloc(size_of::<ZendResource>()) as *mut ZendResource;

    // Safety: The block has the size of a ZendResource.
    unsafe {
        resource.write(ZendResource {
            gc: ZendRefcounted::new(IS_RESOURCE, 0),
            handle: next_resource_handle(),
            type_,
            ptr,
        });
    }

    resource
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        alloc::heap_stats,
        types::{Zval, IS_RESOURCE_EX},
        values::{zval_get_long, zval_ptr_dtor},
    };

    #[test]
    fn test_resource_lifecycle() {
        let before = heap_stats();
        let mut payload = 5u64;

        let first = zend_register_resource(&mut payload as *mut u64 as *mut c_void, 7);
        let second = zend_register_resource(std::ptr::null_mut(), 7);

        unsafe {
            assert!((*second).handle > (*first).handle);
            assert_eq!(*((*first).ptr as *const u64), 5);

            for resource in [first, second] {
                let mut zv = Zval::undef();
                zv.value.res = resource;
                zv.type_info = IS_RESOURCE_EX;

                assert_eq!(zval_get_long(&zv), (*resource).handle);

                zval_ptr_dtor(&mut zv);
            }
        }

        assert_eq!(heap_stats().request_blocks, before.request_blocks);
    }
}
