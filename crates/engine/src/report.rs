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

// Fatal host conditions. The real host aborts the request in these cases;
// the reference host panics with the same wording.
macro_rules! system_panic {
    ($($args:tt)*) => {{
        ::std::panic!("Zend engine fatal error.\n{}", ::std::format_args!($($args)*));
    }};
}

// Safety: The caller guarantees that the branch is unreachable.
macro_rules! debug_unreachable {
    ($($args:tt)*) => {{
        if ::std::cfg!(debug_assertions) {
            $crate::report::system_panic!($($args)*);
        }

        ::std::hint::unreachable_unchecked()
    }};
}

pub(crate) use {debug_unreachable, system_panic};
