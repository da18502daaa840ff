// SPDX-License-Identifier: MIT OR Apache-2.0
/*
 * Copyright (c) 2025 Code Construct
 */

//! Ethernet frame transfers on the data interface

#[allow(unused)]
use crate::fmt::{debug, error, info, trace, warn};

use cdc_ecm::{
    ClassTransport, Cookie, Error, InstanceId, Result, RxArmError,
    RxCompletion,
};

use crate::Ecm;

impl<T: ClassTransport, const N: usize> Ecm<T, N> {
    /// Send a frame to the host.
    ///
    /// Blocks until the transport completes the transfer, or `timeout_ms`
    /// elapses (0 waits forever). Returns the number of octets sent.
    ///
    /// Fails with [`Error::InvalidInstance`] for an unregistered `id` and
    /// [`Error::NotConnected`] when the instance is not in an active
    /// configuration. Transport failures are returned unchanged as
    /// [`Error::Transport`].
    pub fn send(
        &self,
        id: InstanceId,
        frame: &[u8],
        timeout_ms: u32,
    ) -> Result<usize> {
        let class = self.connected_class(id)?;
        trace!("ecm {}: tx {} bytes", id, frame.len());
        self.transport.write(class, frame, timeout_ms).map_err(|e| {
            trace!("ecm {}: tx failed: {}", id, e);
            e.into()
        })
    }

    /// Receive a frame from the host.
    ///
    /// Blocks like [`send`](Self::send), with the same failures.
    /// Returns the number of octets received into `buf`.
    pub fn receive(
        &self,
        id: InstanceId,
        buf: &mut [u8],
        timeout_ms: u32,
    ) -> Result<usize> {
        let class = self.connected_class(id)?;
        let n = self.transport.read(class, buf, timeout_ms).map_err(|e| {
            trace!("ecm {}: rx failed: {}", id, e);
            Error::from(e)
        })?;
        trace!("ecm {}: rx {} bytes", id, n);
        Ok(n)
    }

    /// Arm an asynchronous receive.
    ///
    /// Returns once the transfer is armed. `done` is called exactly once
    /// by the transport when it finishes, with `cookie`. Losing the
    /// configuration completes the receive with
    /// [`XferError::BindingLost`](cdc_ecm::XferError::BindingLost).
    ///
    /// Continuous reception is achieved by arming a new receive from
    /// `done` after a successful completion (see [`RxPump`](crate::RxPump)).
    /// Only one receive may be outstanding per instance.
    ///
    /// On failure `buf` is returned and `done` will not be called.
    pub fn receive_async(
        &self,
        id: InstanceId,
        buf: &'static mut [u8],
        done: &'static dyn RxCompletion,
        cookie: Cookie,
    ) -> core::result::Result<(), RxArmError> {
        let class = match self.connected_class(id) {
            Ok(c) => c,
            Err(err) => return Err(RxArmError { err, buf }),
        };
        trace!("ecm {}: arming rx, {} bytes", id, buf.len());
        self.transport
            .read_async(class, buf, done, cookie)
            .map_err(|e| {
                trace!("ecm {}: arming rx failed: {}", id, e.err);
                e.into()
            })
    }
}
