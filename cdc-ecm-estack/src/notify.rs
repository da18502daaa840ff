// SPDX-License-Identifier: MIT OR Apache-2.0
/*
 * Copyright (c) 2025 Code Construct
 */

//! ECM class notifications

#[allow(unused)]
use crate::fmt::{debug, error, info, trace, warn};

use cdc_ecm::{ClassTransport, Error, InstanceId, Notification, Result};

use crate::Ecm;

/// Length of the `ConnectionSpeedChange` payload
pub const SPEED_PAYLOAD_LEN: usize = 8;

/// Returns the `ConnectionSpeedChange` payload.
///
/// Downstream (`DLBitRate`) then upstream (`ULBitRate`), in bits per
/// second, little-endian.
pub fn speed_payload(
    downstream: u32,
    upstream: u32,
) -> [u8; SPEED_PAYLOAD_LEN] {
    let mut b = [0u8; SPEED_PAYLOAD_LEN];
    b[..4].copy_from_slice(&downstream.to_le_bytes());
    b[4..].copy_from_slice(&upstream.to_le_bytes());
    b
}

impl<T: ClassTransport, const N: usize> Ecm<T, N> {
    /// Send a class notification.
    ///
    /// `payload` is staged in the instance's notification buffer after the
    /// transport's notification header. Returns the length reported by
    /// the transport.
    ///
    /// Only one notification per instance may be in progress; a concurrent
    /// call on the same instance fails with [`Error::Busy`].
    /// Returns [`Error::NoSpace`] if the header and payload do not fit in
    /// [`config::NOTIFY_BUF_SIZE`](crate::config::NOTIFY_BUF_SIZE).
    pub fn notify(
        &self,
        id: InstanceId,
        code: Notification,
        value: u16,
        payload: &[u8],
    ) -> Result<usize> {
        let class = self.connected_class(id)?;
        let slot = self.slot(id)?;

        let mut scratch = slot.scratch.try_lock().map_err(|_| {
            debug!("ecm {}: notification already in progress", id);
            Error::Busy
        })?;

        let hdr = T::NOTIFICATION_HEADER;
        let total = hdr.checked_add(payload.len()).ok_or(Error::NoSpace)?;
        let buf = scratch.get_mut(..total).ok_or_else(|| {
            debug!("ecm {}: notification too large, {} bytes", id, total);
            Error::NoSpace
        })?;
        buf[hdr..].copy_from_slice(payload);

        trace!("ecm {}: notify {} value {}", id, code, value);
        let n = self.transport.notify(class, code, value, buf, payload.len())?;
        Ok(n)
    }

    /// Notify the host of the link state.
    pub fn notify_link(&self, id: InstanceId, connected: bool) -> Result<()> {
        debug!("ecm {}: link {}", id, if connected { "up" } else { "down" });
        self.notify(id, Notification::NetworkConnection, connected as u16, &[])
            .map(|_| ())
    }

    /// Notify the host of the link speed, in bits per second.
    pub fn notify_speed(
        &self,
        id: InstanceId,
        downstream: u32,
        upstream: u32,
    ) -> Result<()> {
        debug!("ecm {}: speed down {} up {}", id, downstream, upstream);
        let payload = speed_payload(downstream, upstream);
        self.notify(id, Notification::ConnectionSpeedChange, 0, &payload)
            .map(|_| ())
    }
}
