// SPDX-License-Identifier: MIT OR Apache-2.0
/*
 * Copyright (c) 2025 Code Construct
 */

//! Build-time configuration.
//!
//! Values can be overridden by setting the environment variable of the
//! same name (prefixed with `CDC_ECM_`) when building.

/// Default number of ECM instances in an [`Ecm`](crate::Ecm) table.
///
/// `CDC_ECM_MAX_INSTANCES`. At most 254.
pub const MAX_INSTANCES: usize = get_build_var!("CDC_ECM_MAX_INSTANCES", 2);

/// Size of the per-instance notification buffer.
///
/// `CDC_ECM_NOTIFY_BUF_SIZE`. Must hold the transport's notification
/// header plus the 8 byte connection speed payload.
pub const NOTIFY_BUF_SIZE: usize =
    get_build_var!("CDC_ECM_NOTIFY_BUF_SIZE", 16);

/// Polling interval of the notification endpoint, in milliseconds.
pub const NOTIFY_INTERVAL: u8 = 8;

const _: () = assert!(MAX_INSTANCES >= 1 && MAX_INSTANCES < 0xff);
