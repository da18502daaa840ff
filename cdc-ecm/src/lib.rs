// SPDX-License-Identifier: MIT OR Apache-2.0
/*
 * CDC ECM common types and traits.
 *
 * Copyright (c) 2025 Code Construct
 */

// Tests may use std
#![cfg_attr(not(any(feature = "std", test)), no_std)]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # USB CDC Ethernet Control Model (ECM)
//!
//! This crate provides common types and traits for the device side of
//! a CDC ECM function.
//!
//! A USB device class transport (the part that owns enumeration, endpoint
//! scheduling and control transfers) implements [`ClassTransport`].
//! An ECM implementation implements [`SubclassDriver`], which the transport
//! calls while assembling descriptors and dispatching class requests.

use num_derive::FromPrimitive;

/// CDC subclass code for the Ethernet Control Model
pub const CDC_SUBCLASS_ECM: u8 = 0x06;
/// CDC communication protocol code: no class-specific protocol
pub const CDC_COMM_PROTOCOL_NONE: u8 = 0x00;
/// CDC data interface protocol code: no class-specific protocol
pub const CDC_DATA_PROTOCOL_NONE: u8 = 0x00;

/// `bDescriptorType` for a class-specific interface descriptor
pub const CS_INTERFACE: u8 = 0x24;
/// `bDescriptorSubtype` for the Ethernet Networking functional descriptor
pub const CDC_SUBTYPE_ETHERNET_NETWORKING: u8 = 0x0f;

/// Length of the Ethernet Networking functional descriptor, ECM 1.2 §5.4
pub const ETHERNET_FUNCTIONAL_DESC_LEN: usize = 13;

/// Length of a MAC address string descriptor, in hex digits
pub const MAC_STRING_LEN: usize = 12;

/// Handle for a registered ECM instance.
///
/// Allocated by the registry in registration order, starting at 0.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InstanceId(pub u8);

impl InstanceId {
    /// Value used by the transport for "no instance".
    pub const NONE: InstanceId = InstanceId(0xff);
}

impl core::fmt::Display for InstanceId {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> core::fmt::Result {
        self.0.fmt(fmt)
    }
}

/// USB device number within the transport
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceId(pub u8);

impl core::fmt::Display for DeviceId {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> core::fmt::Result {
        self.0.fmt(fmt)
    }
}

/// USB configuration number within a device
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConfigId(pub u8);

impl core::fmt::Display for ConfigId {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> core::fmt::Result {
        self.0.fmt(fmt)
    }
}

/// Transport handle for a CDC class instance
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClassId(pub u8);

impl core::fmt::Display for ClassId {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> core::fmt::Result {
        self.0.fmt(fmt)
    }
}

/// An opaque value that applications can use to associate callbacks.
///
/// It is passed back verbatim to the [`ManagementHandler`] or
/// [`RxCompletion`] it was registered with.
#[derive(Debug, Default, Eq, PartialEq, Clone, Copy, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Cookie(pub usize);

/// A fault reported by the class transport.
///
/// These are passed through to callers unchanged.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum XferError {
    /// The transfer did not complete within the timeout
    TimedOut,
    /// The transfer was aborted
    Aborted,
    /// The endpoint is in a state that does not allow the transfer
    EndpointState,
    /// The device or configuration is not active
    NotConfigured,
    /// The endpoint already has a transfer in progress
    Busy,
    /// The transport ran out of instances, endpoints or buffers
    AllocFailed,
    /// The class instance lost its configuration binding
    BindingLost,
    /// Other transport-specific error code
    Other(u16),
}

impl core::fmt::Display for XferError {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Self::Other(c) => write!(fmt, "transport error {:#x}", c),
            _ => write!(fmt, "{:?}", self),
        }
    }
}

/// Result type for transport operations
pub type XferResult<T> = core::result::Result<T, XferError>;

/// An error type for CDC ECM
///
/// `InvalidInstance` is always checked before the transport is touched.
/// `BadArgument` reports a violated precondition (a programming error),
/// as opposed to the runtime failures.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// The instance was never registered
    InvalidInstance,
    /// The instance table is full
    CapacityExceeded,
    /// The instance is not bound to an active configuration
    NotConnected,
    /// Bad argument
    BadArgument,
    /// Provided buffer is too small
    NoSpace,
    /// The notification buffer of the instance is in use
    Busy,
    /// Error from the class transport
    Transport(XferError),
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

impl core::fmt::Display for Error {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Self::Transport(e) => write!(fmt, "ECM transport error: {}", e),
            _ => write!(fmt, "ECM error: {:?}", self),
        }
    }
}

impl From<XferError> for Error {
    fn from(e: XferError) -> Self {
        Self::Transport(e)
    }
}

#[cfg(feature = "std")]
impl From<Error> for std::io::Error {
    fn from(e: Error) -> std::io::Error {
        std::io::Error::other(e)
    }
}

/// CDC ECM result type
pub type Result<T> = core::result::Result<T, Error>;

/// A USB setup request, as received on the control endpoint
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SetupRequest {
    /// `bmRequestType`
    pub request_type: u8,
    /// `bRequest`
    pub request: u8,
    /// `wValue`
    pub value: u16,
    /// `wIndex`
    pub index: u16,
    /// `wLength`
    pub length: u16,
}

impl SetupRequest {
    /// Returns the ECM request, if `bRequest` is one.
    pub fn ecm_request(&self) -> Option<EcmRequest> {
        num_traits::FromPrimitive::from_u8(self.request)
    }
}

/// Class-specific requests handled by an ECM function.
///
/// Codes from the CDC 1.2 specification, table 19.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, Eq, PartialEq, FromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum EcmRequest {
    SetEthernetMulticastFilters = 0x40,
    SetEthernetPowerManagementPatternFilter = 0x41,
    GetEthernetPowerManagementPatternFilter = 0x42,
    SetEthernetPacketFilter = 0x43,
    GetEthernetStatistic = 0x44,
}

/// Class notifications sent by an ECM function.
///
/// Codes from the CDC 1.2 specification, table 20.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, Eq, PartialEq, FromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Notification {
    NetworkConnection = 0x00,
    ConnectionSpeedChange = 0x2a,
}

impl core::fmt::Display for Notification {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(fmt, "{:?}", self)
    }
}

/// Parameters for creating a CDC class instance in the transport
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClassParams {
    /// CDC subclass code
    pub subclass: u8,
    /// Communication interface protocol
    pub comm_protocol: u8,
    /// Whether the notification endpoint is used
    pub notify_enabled: bool,
    /// Polling interval of the notification endpoint, in milliseconds
    pub notify_interval: u8,
    /// Largest notification the class will send, header included
    pub notify_buf_size: usize,
    /// Passed back as `arg` on every [`SubclassDriver`] call for this class
    pub driver_arg: InstanceId,
}

/// A completed asynchronous receive.
#[derive(Debug)]
pub struct RxDone {
    /// The buffer passed to the receive
    pub buf: &'static mut [u8],
    /// Number of octets received into `buf`
    pub len: usize,
    /// Transfer status
    pub status: XferResult<()>,
    /// The cookie passed to the receive
    pub cookie: Cookie,
}

impl RxDone {
    /// Returns the received octets.
    pub fn data(&self) -> &[u8] {
        &self.buf[..self.len.min(self.buf.len())]
    }
}

/// An asynchronous receive that could not be armed.
///
/// Ownership of the receive buffer is returned to the caller.
#[derive(Debug)]
pub struct RxArmError<E = Error> {
    /// The failure
    pub err: E,
    /// The buffer that was passed to the receive
    pub buf: &'static mut [u8],
}

impl From<RxArmError<XferError>> for RxArmError<Error> {
    fn from(e: RxArmError<XferError>) -> Self {
        RxArmError {
            err: e.err.into(),
            buf: e.buf,
        }
    }
}

/// Completion callback for an asynchronous receive
///
/// Called by the transport exactly once per armed receive, possibly from
/// an interrupt-like context. It is valid to arm a new receive from within
/// the callback.
pub trait RxCompletion: Sync {
    /// The receive finished, successfully or not.
    ///
    /// Takes `&'static self` so that the callback can pass itself to a
    /// new receive.
    fn rx_complete(&'static self, done: RxDone);
}

/// Handler for ECM management requests
///
/// Must live as long as the instance it is registered with, which is
/// the lifetime of the program.
pub trait ManagementHandler: Sync {
    /// Handle a request.
    ///
    /// Returns `true` to accept the request, `false` to stall it.
    /// `cookie` is the value given at registration.
    fn request(
        &'static self,
        instance: InstanceId,
        dev: DeviceId,
        req: &SetupRequest,
        cookie: Cookie,
    ) -> bool;
}

/// Sink for descriptor bytes, provided by the transport during
/// configuration descriptor assembly.
pub trait DescriptorWriter {
    /// Append bytes to the descriptor.
    ///
    /// Returns [`Error::NoSpace`] if the descriptor buffer is full.
    fn write(&mut self, data: &[u8]) -> Result<()>;
}

/// Calls made by the transport into a CDC subclass implementation.
///
/// `arg` is the [`ClassParams::driver_arg`] given when the class
/// instance was created.
pub trait SubclassDriver {
    /// A class-specific request arrived for the class instance.
    ///
    /// Returns `true` if the request was accepted.
    fn management_request(
        &self,
        arg: InstanceId,
        dev: DeviceId,
        req: &SetupRequest,
    ) -> bool;

    /// A notification sent by the subclass has completed.
    fn notification_complete(&self, _arg: InstanceId, _dev: DeviceId) {}

    /// Write the subclass functional descriptors.
    ///
    /// `if_nbr` is the first interface number of the function.
    fn functional_descriptor(
        &self,
        arg: InstanceId,
        dev: DeviceId,
        if_nbr: u8,
        w: &mut dyn DescriptorWriter,
    ) -> Result<()>;

    /// Size that [`functional_descriptor`](Self::functional_descriptor)
    /// will write.
    fn functional_descriptor_size(&self, arg: InstanceId, dev: DeviceId)
        -> u16;
}

/// The USB device class transport, as seen by an ECM implementation.
///
/// Class instances are identified by [`ClassId`]. Transfers on the data
/// interface use its bulk endpoints, notifications use the interrupt
/// endpoint of the communication interface.
///
/// Methods take `&self` since the transport is shared between an
/// application context and transport completion contexts.
pub trait ClassTransport {
    /// Length of the class notification header.
    ///
    /// [`notify`](Self::notify) payloads are staged after this offset.
    const NOTIFICATION_HEADER: usize;

    /// Create a CDC class instance
    fn create_instance(&self, params: &ClassParams) -> XferResult<ClassId>;

    /// Enable the default alternate setting of the communication interface
    fn enable_default_alt_setting(&self, class: ClassId) -> XferResult<()>;

    /// Set whether bulk IN transfers are terminated with a short or
    /// zero length packet
    fn set_end_of_transfer(
        &self,
        class: ClassId,
        enabled: bool,
    ) -> XferResult<()>;

    /// Add the data interface to the class instance
    fn add_data_interface(
        &self,
        class: ClassId,
        protocol: u8,
    ) -> XferResult<()>;

    /// Add the class instance to a device configuration
    fn bind_configuration(
        &self,
        class: ClassId,
        dev: DeviceId,
        cfg: ConfigId,
    ) -> XferResult<()>;

    /// Add a string to the device string descriptor table
    fn register_string(&self, dev: DeviceId, s: &'static str)
        -> XferResult<()>;

    /// Returns the string descriptor index of a registered string
    fn string_index(&self, dev: DeviceId, s: &str) -> Option<u8>;

    /// Whether the class instance is in an active configuration
    fn is_connected(&self, class: ClassId) -> bool;

    /// Blocking bulk IN transfer.
    ///
    /// `timeout_ms` of 0 waits forever. Returns the number of octets sent.
    fn write(
        &self,
        class: ClassId,
        buf: &[u8],
        timeout_ms: u32,
    ) -> XferResult<usize>;

    /// Blocking bulk OUT transfer.
    ///
    /// `timeout_ms` of 0 waits forever. Returns the number of octets read.
    fn read(
        &self,
        class: ClassId,
        buf: &mut [u8],
        timeout_ms: u32,
    ) -> XferResult<usize>;

    /// Arm an asynchronous bulk OUT transfer.
    ///
    /// Returns immediately. `done` is called exactly once when the
    /// transfer finishes, including when the class loses its binding
    /// ([`XferError::BindingLost`]). On error the buffer is returned and
    /// `done` is not called.
    fn read_async(
        &self,
        class: ClassId,
        buf: &'static mut [u8],
        done: &'static dyn RxCompletion,
        cookie: Cookie,
    ) -> core::result::Result<(), RxArmError<XferError>>;

    /// Send a class notification.
    ///
    /// `buf` is `NOTIFICATION_HEADER + payload_len` long, with the payload
    /// already in place after the header. The transport fills the header.
    fn notify(
        &self,
        class: ClassId,
        code: Notification,
        value: u16,
        buf: &mut [u8],
        payload_len: usize,
    ) -> XferResult<usize>;
}
