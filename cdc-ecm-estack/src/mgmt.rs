// SPDX-License-Identifier: MIT OR Apache-2.0
/*
 * Copyright (c) 2025 Code Construct
 */

//! ECM management request dispatch

#[allow(unused)]
use crate::fmt::{debug, error, info, trace, warn};

use cdc_ecm::{ClassTransport, DeviceId, InstanceId, SetupRequest};

use crate::Ecm;

impl<T: ClassTransport, const N: usize> Ecm<T, N> {
    /// Dispatch a class request to the instance's management handler.
    ///
    /// ECM requests (filters and statistics) are passed to the handler,
    /// and its verdict is returned. Other requests, and any request for an
    /// instance without a handler, are rejected.
    ///
    /// The handler is called without any table locks held, so it may call
    /// back into the `Ecm` (for example to arm a receive).
    pub fn dispatch_request(
        &self,
        id: InstanceId,
        dev: DeviceId,
        req: &SetupRequest,
    ) -> bool {
        let ctrl = match self.ctrl(id) {
            Ok(c) => c,
            Err(e) => {
                debug!("ecm {}: request for bad instance: {}", id, e);
                return false;
            }
        };

        let Some(ecm_req) = req.ecm_request() else {
            trace!("ecm {}: unhandled request {:#x}", id, req.request);
            return false;
        };

        let Some(handler) = ctrl.mgmt else {
            trace!("ecm {}: no handler for {:?}", id, ecm_req);
            return false;
        };

        let accept = handler.request(id, dev, req, ctrl.cookie);
        trace!("ecm {}: {:?} accepted {}", id, ecm_req, accept);
        accept
    }
}
