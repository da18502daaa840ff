// SPDX-License-Identifier: MIT OR Apache-2.0
/*
 * Copyright (c) 2025 Code Construct
 */

//! Continuous reception by re-arming asynchronous receives.

#[allow(unused)]
use crate::fmt::{debug, error, info, trace, warn};

use core::cell::RefCell;

use cdc_ecm::{
    ClassTransport, Cookie, DeviceId, Error, InstanceId, ManagementHandler,
    Result, RxArmError, RxCompletion, RxDone, SetupRequest,
};

use crate::{config, BlockingMutex, Ecm};

/// Receives frames from an [`RxPump`].
pub trait FrameSink: Sync {
    /// A frame arrived on `instance`.
    ///
    /// Called from the transport's completion context. The frame is only
    /// valid for the duration of the call.
    fn frame(&self, instance: InstanceId, frame: &[u8]);
}

struct PumpState {
    // Parked while no receive is armed.
    buf: Option<&'static mut [u8]>,
    active: bool,
    rearms: usize,
    last_error: Option<Error>,
}

/// Keeps one asynchronous receive armed on an ECM instance.
///
/// Each successful completion passes the frame to the [`FrameSink`] and
/// re-arms a receive with the same buffer. A failed completion (for
/// example [`XferError::BindingLost`](cdc_ecm::XferError::BindingLost)
/// after the host deconfigures the device) stops the pump and is not
/// retried; [`start()`](Self::start) resumes it.
///
/// An `RxPump` is also a [`ManagementHandler`]: used as the instance's
/// handler it starts receiving on the first ECM request from the host
/// (normally the packet filter being set), and accepts every request.
pub struct RxPump<T: 'static, S, const N: usize = { config::MAX_INSTANCES }> {
    ecm: &'static Ecm<T, N>,
    sink: S,
    state: BlockingMutex<RefCell<PumpState>>,
}

impl<T: 'static, S, const N: usize> RxPump<T, S, N> {
    /// Create a stopped pump receiving into `buf`.
    ///
    /// `buf` should hold a maximum size segment.
    pub fn new(
        ecm: &'static Ecm<T, N>,
        buf: &'static mut [u8],
        sink: S,
    ) -> Self {
        Self {
            ecm,
            sink,
            state: BlockingMutex::new(RefCell::new(PumpState {
                buf: Some(buf),
                active: false,
                rearms: 0,
                last_error: None,
            })),
        }
    }

    /// Whether a receive is currently armed.
    pub fn is_active(&self) -> bool {
        self.state.lock(|s| s.borrow().active)
    }

    /// Number of receives armed from completions.
    pub fn rearm_count(&self) -> usize {
        self.state.lock(|s| s.borrow().rearms)
    }

    /// The error that last stopped the pump.
    pub fn last_error(&self) -> Option<Error> {
        self.state.lock(|s| s.borrow().last_error)
    }

    /// Returns the frame sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    fn park(&self, buf: &'static mut [u8], err: Error) {
        self.state.lock(|s| {
            let mut s = s.borrow_mut();
            s.buf = Some(buf);
            s.active = false;
            s.last_error = Some(err);
        })
    }
}

impl<T, S, const N: usize> RxPump<T, S, N>
where
    T: ClassTransport + Sync + 'static,
    S: FrameSink + 'static,
{
    /// Start receiving on `id`.
    ///
    /// Returns [`Error::Busy`] if the pump is already running.
    pub fn start(&'static self, id: InstanceId) -> Result<()> {
        let buf = self.state.lock(|s| {
            let mut s = s.borrow_mut();
            if s.active {
                return None;
            }
            let buf = s.buf.take()?;
            // Set before arming, the completion may run immediately.
            s.active = true;
            Some(buf)
        });
        let Some(buf) = buf else {
            return Err(Error::Busy);
        };

        match self.ecm.receive_async(id, buf, self, Cookie(id.0 as usize)) {
            Ok(()) => {
                debug!("ecm {}: receive started", id);
                Ok(())
            }
            Err(RxArmError { err, buf }) => {
                debug!("ecm {}: receive start failed: {}", id, err);
                self.park(buf, err);
                Err(err)
            }
        }
    }
}

impl<T, S, const N: usize> RxCompletion for RxPump<T, S, N>
where
    T: ClassTransport + Sync + 'static,
    S: FrameSink + 'static,
{
    fn rx_complete(&'static self, done: RxDone) {
        let id = InstanceId(done.cookie.0 as u8);

        if let Err(e) = done.status {
            debug!("ecm {}: receive stopped: {}", id, e);
            self.park(done.buf, e.into());
            return;
        }

        trace!("ecm {}: received {} bytes", id, done.len);
        self.sink.frame(id, done.data());

        match self.ecm.receive_async(id, done.buf, self, done.cookie) {
            Ok(()) => self.state.lock(|s| s.borrow_mut().rearms += 1),
            Err(RxArmError { err, buf }) => {
                warn!("ecm {}: re-arm failed: {}", id, err);
                self.park(buf, err);
            }
        }
    }
}

impl<T, S, const N: usize> ManagementHandler for RxPump<T, S, N>
where
    T: ClassTransport + Sync + 'static,
    S: FrameSink + 'static,
{
    fn request(
        &'static self,
        instance: InstanceId,
        _dev: DeviceId,
        req: &SetupRequest,
        _cookie: Cookie,
    ) -> bool {
        trace!("ecm {}: request {:#x}", instance, req.request);
        if !self.is_active() {
            // Busy here is a concurrent start(), nothing to do.
            let _ = self.start(instance);
        }
        true
    }
}
