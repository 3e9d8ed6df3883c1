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

use zend_compat_engine::alloc::{ecalloc, efree, emalloc};

/// Allocates `size` bytes of request-bound host memory.
#[no_mangle]
pub unsafe extern "C" fn phper_emalloc(size: usize) -> *mut c_void {
    emalloc(size)
}

/// Allocates zeroed request-bound host memory for `nmemb` items of `size`
/// bytes.
#[no_mangle]
pub unsafe extern "C" fn phper_ecalloc(nmemb: usize, size: usize) -> *mut c_void {
    ecalloc(nmemb, size)
}

/// Releases a block returned by [phper_emalloc] or [phper_ecalloc].
/// Releasing a block twice is a fatal host error.
#[no_mangle]
pub unsafe extern "C" fn phper_efree(ptr: *mut c_void) {
    unsafe { efree(ptr) }
}

#[cfg(test)]
mod tests {
    use zend_compat_engine::alloc::{heap_stats, is_live_block};

    use super::*;

    #[test]
    fn test_request_memory() {
        unsafe {
            let before = heap_stats();

            let block = phper_emalloc(24);
            assert!(is_live_block(block));
            assert_eq!(heap_stats().request_blocks, before.request_blocks + 1);

            let zeroed = phper_ecalloc(4, 8) as *mut u64;
            assert!((0..4).all(|index| *zeroed.add(index) == 0));

            phper_efree(block);
            phper_efree(zeroed as *mut c_void);
            phper_efree(std::ptr::null_mut());

            assert!(!is_live_block(block));
            assert_eq!(heap_stats().request_blocks, before.request_blocks);
        }
    }
}
