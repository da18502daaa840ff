// SPDX-License-Identifier: MIT OR Apache-2.0
/*
 * Copyright (c) 2025 Code Construct
 */

//! A recording class transport for tests.

#![allow(dead_code)]

// Provides the std critical section implementation.
use critical_section as _;

use std::sync::Mutex;

use cdc_ecm::{
    ClassId, ClassParams, ClassTransport, ConfigId, Cookie, DeviceId,
    Notification, RxArmError, RxCompletion, RxDone, XferError, XferResult,
};

/// Header length used by [`Mock`], matching a USB CDC notification.
pub const HEADER: usize = 8;

/// A receive armed by `read_async`.
struct Pending {
    class: ClassId,
    buf: &'static mut [u8],
    done: &'static dyn RxCompletion,
    cookie: Cookie,
}

/// A notification as seen by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub class: ClassId,
    pub code: Notification,
    pub value: u16,
    /// The whole staged buffer, header included
    pub buf: Vec<u8>,
    pub payload_len: usize,
}

#[derive(Default)]
pub struct State {
    pub created: Vec<ClassParams>,
    pub end_of_transfer: Vec<(ClassId, bool)>,
    pub data_interfaces: Vec<(ClassId, u8)>,
    pub bindings: Vec<(ClassId, DeviceId, ConfigId)>,
    pub strings: Vec<(DeviceId, &'static str)>,
    pub connected: Vec<ClassId>,

    /// Fail `create_instance` with this error
    pub fail_create: Option<XferError>,
    /// Fail `write` and `read` with this error
    pub fail_xfer: Option<XferError>,
    /// Fail `notify` with this error
    pub fail_notify: Option<XferError>,

    pub writes: Vec<(ClassId, Vec<u8>)>,
    pub reads: usize,
    pub read_asyncs: usize,
    pub notifications: Vec<Sent>,

    pending: Option<Pending>,
}

/// A transport that records every call.
///
/// Received data is injected with [`complete_rx`](Self::complete_rx).
#[derive(Default)]
pub struct Mock {
    pub state: Mutex<State>,
}

impl Mock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with the recorded state.
    pub fn with<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    /// Number of calls that reached the data path.
    pub fn data_calls(&self) -> usize {
        self.with(|s| {
            s.writes.len() + s.reads + s.read_asyncs + s.notifications.len()
        })
    }

    /// The host selects a configuration containing `class`.
    pub fn connect(&self, class: ClassId) {
        self.with(|s| {
            if !s.connected.contains(&class) {
                s.connected.push(class)
            }
        })
    }

    /// Whether a receive is armed.
    pub fn rx_armed(&self) -> bool {
        self.with(|s| s.pending.is_some())
    }

    /// Finish the armed receive with `data`, or with an error.
    ///
    /// Returns false if no receive was armed.
    pub fn complete_rx(&self, res: XferResult<&[u8]>) -> bool {
        // Not held while calling the completion, it may re-arm.
        let Some(p) = self.with(|s| s.pending.take()) else {
            return false;
        };
        let (len, status) = match res {
            Ok(data) => {
                let len = data.len().min(p.buf.len());
                p.buf[..len].copy_from_slice(&data[..len]);
                (len, Ok(()))
            }
            Err(e) => (0, Err(e)),
        };
        p.done.rx_complete(RxDone {
            buf: p.buf,
            len,
            status,
            cookie: p.cookie,
        });
        true
    }

    /// The host deconfigures the device.
    ///
    /// All classes disconnect and an armed receive completes with
    /// `BindingLost`.
    pub fn unbind(&self) {
        self.with(|s| s.connected.clear());
        self.complete_rx(Err(XferError::BindingLost));
    }
}

impl ClassTransport for Mock {
    const NOTIFICATION_HEADER: usize = HEADER;

    fn create_instance(&self, params: &ClassParams) -> XferResult<ClassId> {
        self.with(|s| {
            if let Some(e) = s.fail_create {
                return Err(e);
            }
            s.created.push(*params);
            // Offset so that class and instance ids differ
            Ok(ClassId(s.created.len() as u8 + 0x10))
        })
    }

    fn enable_default_alt_setting(&self, _class: ClassId) -> XferResult<()> {
        Ok(())
    }

    fn set_end_of_transfer(
        &self,
        class: ClassId,
        enabled: bool,
    ) -> XferResult<()> {
        self.with(|s| s.end_of_transfer.push((class, enabled)));
        Ok(())
    }

    fn add_data_interface(
        &self,
        class: ClassId,
        protocol: u8,
    ) -> XferResult<()> {
        self.with(|s| s.data_interfaces.push((class, protocol)));
        Ok(())
    }

    fn bind_configuration(
        &self,
        class: ClassId,
        dev: DeviceId,
        cfg: ConfigId,
    ) -> XferResult<()> {
        self.with(|s| s.bindings.push((class, dev, cfg)));
        Ok(())
    }

    fn register_string(
        &self,
        dev: DeviceId,
        st: &'static str,
    ) -> XferResult<()> {
        self.with(|s| {
            if !s.strings.contains(&(dev, st)) {
                s.strings.push((dev, st))
            }
        });
        Ok(())
    }

    fn string_index(&self, dev: DeviceId, st: &str) -> Option<u8> {
        // Index 0 is the language table, 1-3 the device strings
        self.with(|s| {
            s.strings
                .iter()
                .position(|&(d, x)| d == dev && x == st)
                .map(|i| i as u8 + 4)
        })
    }

    fn is_connected(&self, class: ClassId) -> bool {
        self.with(|s| s.connected.contains(&class))
    }

    fn write(
        &self,
        class: ClassId,
        buf: &[u8],
        _timeout_ms: u32,
    ) -> XferResult<usize> {
        self.with(|s| {
            s.writes.push((class, buf.to_vec()));
            match s.fail_xfer {
                Some(e) => Err(e),
                None => Ok(buf.len()),
            }
        })
    }

    fn read(
        &self,
        _class: ClassId,
        buf: &mut [u8],
        _timeout_ms: u32,
    ) -> XferResult<usize> {
        self.with(|s| {
            s.reads += 1;
            if let Some(e) = s.fail_xfer {
                return Err(e);
            }
            let n = buf.len().min(4);
            buf[..n].fill(0xaa);
            Ok(n)
        })
    }

    fn read_async(
        &self,
        class: ClassId,
        buf: &'static mut [u8],
        done: &'static dyn RxCompletion,
        cookie: Cookie,
    ) -> Result<(), RxArmError<XferError>> {
        let mut s = self.state.lock().unwrap();
        s.read_asyncs += 1;
        if s.pending.is_some() {
            return Err(RxArmError {
                err: XferError::Busy,
                buf,
            });
        }
        s.pending = Some(Pending {
            class,
            buf,
            done,
            cookie,
        });
        Ok(())
    }

    fn notify(
        &self,
        class: ClassId,
        code: Notification,
        value: u16,
        buf: &mut [u8],
        payload_len: usize,
    ) -> XferResult<usize> {
        if let Some(e) = self.with(|s| s.fail_notify) {
            return Err(e);
        }
        buf[0] = 0xa1;
        buf[1] = code as u8;
        buf[2..4].copy_from_slice(&value.to_le_bytes());
        buf[6..8].copy_from_slice(&(payload_len as u16).to_le_bytes());
        self.with(|s| {
            s.notifications.push(Sent {
                class,
                code,
                value,
                buf: buf.to_vec(),
                payload_len,
            })
        });
        Ok(buf.len())
    }
}

pub fn start_log() {
    let _ = env_logger::Builder::new()
        .filter(None, log::LevelFilter::Trace)
        .is_test(true)
        .try_init();
}
