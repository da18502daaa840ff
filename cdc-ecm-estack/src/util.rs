// SPDX-License-Identifier: MIT OR Apache-2.0
/*
 * Copyright (c) 2025 Code Construct
 */

/// A decimal `usize` build setting, read from the environment at compile
/// time.
///
/// Evaluates to `$default` when `$name` is unset. Usable in const items;
/// a value that does not parse fails the build.
macro_rules! get_build_var {
    ($name:literal, $default:expr) => {{
        match option_env!($name) {
            None => $default,
            Some(s) => match usize::from_str_radix(s, 10) {
                Ok(v) => v,
                // const panics can't format, hence concat!
                Err(_) => panic!(concat!("Invalid build setting ", $name)),
            },
        }
    }};
}
