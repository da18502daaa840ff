// SPDX-License-Identifier: MIT OR Apache-2.0
/*
 * Copyright (c) 2025 Code Construct
 */

//! CDC ECM device class
//!
//! This crate provides the protocol layer of a USB CDC Ethernet Control
//! Model function, on top of an externally supplied class transport
//! implementing [`ClassTransport`](cdc_ecm::ClassTransport).
//!
//! An [`Ecm`] holds a fixed table of instances. Each instance is registered
//! once, bound to one or more device configurations, and then used to move
//! Ethernet frames and send link notifications. The transport calls back
//! into the [`Ecm`] through [`SubclassDriver`] to build the functional
//! descriptor and to dispatch class requests.
//!
//! No allocation is performed; the table can live in a `static`.

#![cfg_attr(not(any(feature = "std", test)), no_std)]
#![forbid(unsafe_code)]

#[macro_use]
mod util;
mod fmt;

pub mod config;
mod data;
mod desc;
mod mgmt;
mod notify;
pub mod pump;

#[allow(unused)]
use crate::fmt::{debug, error, info, trace, warn};

// Provides the std critical section implementation for unit tests.
#[cfg(test)]
use critical_section as _;

use core::cell::{Cell, RefCell};

use cdc_ecm::{
    ClassId, ClassParams, ClassTransport, ConfigId, Cookie, DescriptorWriter,
    DeviceId, Error, InstanceId, ManagementHandler, Result, SetupRequest,
    SubclassDriver, CDC_COMM_PROTOCOL_NONE, CDC_DATA_PROTOCOL_NONE,
    CDC_SUBCLASS_ECM,
};

pub use desc::{
    mac_string, valid_mac_string, EthernetParams, FunctionalDescriptor,
};
pub use notify::{speed_payload, SPEED_PAYLOAD_LEN};
pub use pump::{FrameSink, RxPump};

/// Re-exported so that callers can use the same `cdc-ecm` version.
pub use cdc_ecm;

type RawMutex = embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
type BlockingMutex<T> = embassy_sync::blocking_mutex::Mutex<RawMutex, T>;
// Only ever used with try_lock(), never awaited.
type ScratchMutex<T> = embassy_sync::mutex::Mutex<RawMutex, T>;

/// Per-instance state.
///
/// `desc` is write-once, set by the first successful `attach()`.
#[derive(Clone, Copy)]
struct Ctrl {
    class: Option<ClassId>,
    mgmt: Option<&'static dyn ManagementHandler>,
    cookie: Cookie,
    bound: bool,
    desc: Option<FunctionalDescriptor>,
}

impl Ctrl {
    const EMPTY: Self = Self {
        class: None,
        mgmt: None,
        cookie: Cookie(0),
        bound: false,
        desc: None,
    };
}

struct Slot {
    ctrl: BlockingMutex<RefCell<Ctrl>>,
    // Staging buffer for outgoing notifications.
    scratch: ScratchMutex<[u8; config::NOTIFY_BUF_SIZE]>,
}

impl Slot {
    const fn new() -> Self {
        Self {
            ctrl: BlockingMutex::new(RefCell::new(Ctrl::EMPTY)),
            scratch: ScratchMutex::new([0u8; config::NOTIFY_BUF_SIZE]),
        }
    }
}

/// A table of CDC ECM instances on top of a class transport.
///
/// Instances are allocated in registration order and are never freed.
/// `N` is the capacity, by default [`config::MAX_INSTANCES`].
pub struct Ecm<T, const N: usize = { config::MAX_INSTANCES }> {
    transport: T,
    // Number of claimed slots. Slots below this may still be unusable
    // if their transport setup failed.
    next: BlockingMutex<Cell<u8>>,
    slots: [Slot; N],
}

impl<T, const N: usize> core::fmt::Debug for Ecm<T, N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Ecm")
            .field("count", &self.count())
            .field("capacity", &N)
            .finish_non_exhaustive()
    }
}

impl<T, const N: usize> Ecm<T, N> {
    /// Create a new empty table using `transport`.
    ///
    /// Panics if `N` is 0 or larger than 254.
    pub const fn new(transport: T) -> Self {
        assert!(N >= 1 && N < 0xff, "Bad ECM table size");
        Self {
            transport,
            next: BlockingMutex::new(Cell::new(0)),
            slots: [const { Slot::new() }; N],
        }
    }

    /// Returns the class transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Number of instance ids handed out so far.
    pub fn count(&self) -> usize {
        self.next.lock(|n| n.get() as usize)
    }

    /// Maximum number of instances.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Whether `id` has been attached to at least one configuration.
    pub fn is_bound(&self, id: InstanceId) -> bool {
        self.ctrl(id).map(|c| c.bound).unwrap_or(false)
    }

    /// Returns a copy of the control block for a registered instance.
    fn ctrl(&self, id: InstanceId) -> Result<Ctrl> {
        let idx = id.0 as usize;
        if idx >= self.count() {
            return Err(Error::InvalidInstance);
        }
        let slot = self.slots.get(idx).ok_or(Error::InvalidInstance)?;
        let ctrl = slot.ctrl.lock(|c| *c.borrow());
        if ctrl.class.is_none() {
            // Claimed, but transport setup failed
            return Err(Error::InvalidInstance);
        }
        Ok(ctrl)
    }

    fn class(&self, id: InstanceId) -> Result<ClassId> {
        self.ctrl(id)?.class.ok_or(Error::InvalidInstance)
    }

    fn slot(&self, id: InstanceId) -> Result<&Slot> {
        self.slots.get(id.0 as usize).ok_or(Error::InvalidInstance)
    }

    /// Claims the next free slot.
    fn claim(&self) -> Result<u8> {
        self.next.lock(|next| {
            let n = next.get();
            if n as usize >= N {
                return Err(Error::CapacityExceeded);
            }
            next.set(n + 1);
            Ok(n)
        })
    }

    /// Returns a claimed slot, if no later slot has been claimed since.
    fn unclaim(&self, idx: u8) -> bool {
        self.next.lock(|next| {
            if next.get() == idx + 1 {
                next.set(idx);
                true
            } else {
                false
            }
        })
    }
}

impl<T: ClassTransport, const N: usize> Ecm<T, N> {
    /// Register a new ECM instance.
    ///
    /// Creates the CDC class instance in the transport, with its default
    /// alternate setting enabled and a data interface.
    /// `end_of_transfer` selects whether bulk IN transfers are terminated
    /// with a short packet.
    ///
    /// `mgmt` handles ECM class requests for the instance, called with
    /// `cookie`. Without a handler all class requests are rejected.
    ///
    /// Returns [`Error::CapacityExceeded`] when the table is full.
    pub fn register(
        &self,
        mgmt: Option<&'static dyn ManagementHandler>,
        cookie: Cookie,
        end_of_transfer: bool,
    ) -> Result<InstanceId> {
        let idx = self.claim().inspect_err(|_| {
            debug!("ECM table full, capacity {}", N);
        })?;
        let id = InstanceId(idx);

        let class = match self.transport.create_instance(&Self::params(id)) {
            Ok(c) => c,
            Err(e) => {
                if !self.unclaim(idx) {
                    warn!("ecm {}: slot lost after failed setup", id);
                }
                debug!("ecm {}: class creation failed: {}", id, e);
                return Err(e.into());
            }
        };

        // The transport class now refers to this id, so the slot is never
        // handed out again even if the remaining setup fails. It stays
        // unusable (InvalidInstance) and the class is left unbound.
        if let Err(e) = self.setup_class(class, end_of_transfer) {
            warn!("ecm {}: class {} setup failed: {}", id, class, e);
            return Err(e);
        }

        // Slots are only written here and by attach(). Only this caller
        // holds the claim on idx.
        self.slots[idx as usize].ctrl.lock(|c| {
            let mut c = c.borrow_mut();
            c.class = Some(class);
            c.mgmt = mgmt;
            c.cookie = cookie;
        });

        debug!("ecm {}: registered as class {}", id, class);
        Ok(id)
    }

    fn params(id: InstanceId) -> ClassParams {
        ClassParams {
            subclass: CDC_SUBCLASS_ECM,
            comm_protocol: CDC_COMM_PROTOCOL_NONE,
            notify_enabled: true,
            notify_interval: config::NOTIFY_INTERVAL,
            notify_buf_size: config::NOTIFY_BUF_SIZE,
            driver_arg: id,
        }
    }

    fn setup_class(
        &self,
        class: ClassId,
        end_of_transfer: bool,
    ) -> Result<()> {
        self.transport.enable_default_alt_setting(class)?;
        self.transport.set_end_of_transfer(class, end_of_transfer)?;
        self.transport.add_data_interface(class, CDC_DATA_PROTOCOL_NONE)?;
        Ok(())
    }

    /// Attach an instance to a device configuration.
    ///
    /// `mac` is the MAC address as 12 hex digits (see [`mac_string`]).
    /// It is added to the device's string table, and its index is used in
    /// the functional descriptor.
    ///
    /// An instance may be attached to several configurations, typically
    /// the high-speed and full-speed variants. The `mac` string index and
    /// `params` recorded by the first successful attach are kept for all
    /// later ones.
    pub fn attach(
        &self,
        id: InstanceId,
        dev: DeviceId,
        cfg: ConfigId,
        mac: &'static str,
        params: EthernetParams,
    ) -> Result<()> {
        let class = self.class(id)?;
        if !valid_mac_string(mac) {
            warn!("ecm {}: bad MAC address string", id);
            return Err(Error::BadArgument);
        }

        self.transport.bind_configuration(class, dev, cfg)?;
        self.transport.register_string(dev, mac)?;
        let mac_string_index =
            self.transport.string_index(dev, mac).unwrap_or_else(|| {
                warn!("ecm {}: no string index for MAC address", id);
                0
            });

        let desc = FunctionalDescriptor {
            mac_string_index,
            params,
        };
        let first = self.slot(id)?.ctrl.lock(|c| {
            let mut c = c.borrow_mut();
            c.bound = true;
            *c.desc.get_or_insert(desc)
        });
        if first != desc {
            warn!("ecm {}: keeping descriptor from first configuration", id);
        }

        debug!("ecm {}: attached to device {} config {}", id, dev, cfg);
        Ok(())
    }

    /// Returns the transport class of an instance that may transfer data.
    ///
    /// Rejects unregistered instances, then instances that were never
    /// attached (without asking the transport), then those the transport
    /// reports as not connected.
    fn connected_class(&self, id: InstanceId) -> Result<ClassId> {
        let ctrl = self.ctrl(id)?;
        let class = ctrl.class.ok_or(Error::InvalidInstance)?;
        if !ctrl.bound || !self.transport.is_connected(class) {
            return Err(Error::NotConnected);
        }
        Ok(class)
    }
}

impl<T: ClassTransport, const N: usize> SubclassDriver for Ecm<T, N> {
    fn management_request(
        &self,
        arg: InstanceId,
        dev: DeviceId,
        req: &SetupRequest,
    ) -> bool {
        self.dispatch_request(arg, dev, req)
    }

    fn notification_complete(&self, arg: InstanceId, _dev: DeviceId) {
        trace!("ecm {}: notification complete", arg);
    }

    fn functional_descriptor(
        &self,
        arg: InstanceId,
        _dev: DeviceId,
        _if_nbr: u8,
        w: &mut dyn DescriptorWriter,
    ) -> Result<()> {
        let desc = self.encode_functional_descriptor(arg)?;
        w.write(&desc)
    }

    fn functional_descriptor_size(
        &self,
        _arg: InstanceId,
        _dev: DeviceId,
    ) -> u16 {
        FunctionalDescriptor::SIZE as u16
    }
}
