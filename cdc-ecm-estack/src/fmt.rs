// SPDX-License-Identifier: MIT OR Apache-2.0
/*
 * Copyright (c) 2025 Code Construct
 */

//! Logging macros, from either `log` or `defmt`.

#[cfg(not(any(feature = "log", feature = "defmt")))]
compile_error!("Either log or defmt feature must be enabled");
#[cfg(all(feature = "log", feature = "defmt"))]
compile_error!("log and defmt features are mutually exclusive");

#[cfg(feature = "defmt")]
#[allow(unused)]
pub(crate) use defmt::{debug, error, info, trace, warn};

#[cfg(feature = "log")]
#[allow(unused)]
pub(crate) use log::{debug, error, info, trace, warn};
