// SPDX-License-Identifier: MIT OR Apache-2.0
/*
 * Copyright (c) 2025 Code Construct
 */

//! Ethernet Networking functional descriptor

#[allow(unused)]
use crate::fmt::{debug, error, info, trace, warn};

use cdc_ecm::{
    ClassTransport, InstanceId, Result, CDC_SUBTYPE_ETHERNET_NETWORKING,
    CS_INTERFACE, ETHERNET_FUNCTIONAL_DESC_LEN, MAC_STRING_LEN,
};
use heapless::String;

use crate::Ecm;

/// Ethernet capabilities advertised in the functional descriptor.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EthernetParams {
    /// `bmEthernetStatistics`, the statistics the device collects
    pub ethernet_stats: u32,
    /// `wMaxSegmentSize`, including the Ethernet header
    pub max_segment_size: u16,
    /// `wNumberMCFilters`
    pub multicast_filters: u16,
    /// `bNumberPowerFilters`
    pub power_filters: u8,
}

/// The ECM Ethernet Networking functional descriptor, ECM 1.2 §5.4
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FunctionalDescriptor {
    /// `iMACAddress`, string descriptor index of the MAC address
    pub mac_string_index: u8,
    /// Remaining descriptor fields
    pub params: EthernetParams,
}

impl FunctionalDescriptor {
    /// Encoded length
    pub const SIZE: usize = ETHERNET_FUNCTIONAL_DESC_LEN;

    /// Returns the wire encoding.
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let p = &self.params;
        let mut b = [0u8; Self::SIZE];
        b[0] = Self::SIZE as u8;
        b[1] = CS_INTERFACE;
        b[2] = CDC_SUBTYPE_ETHERNET_NETWORKING;
        b[3] = self.mac_string_index;
        b[4..8].copy_from_slice(&p.ethernet_stats.to_le_bytes());
        b[8..10].copy_from_slice(&p.max_segment_size.to_le_bytes());
        b[10..12].copy_from_slice(&p.multicast_filters.to_le_bytes());
        b[12] = p.power_filters;
        b
    }
}

/// Whether `s` is a MAC address string usable for `iMACAddress`.
///
/// That is 12 hex digits, most significant byte first.
pub fn valid_mac_string(s: &str) -> bool {
    s.len() == MAC_STRING_LEN && s.bytes().all(|c| c.is_ascii_hexdigit())
}

/// Formats a MAC address as the string for `iMACAddress`.
pub fn mac_string(mac: [u8; 6]) -> String<MAC_STRING_LEN> {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut s = String::new();
    for b in mac {
        for nibble in [b >> 4, b & 0xf] {
            // OK to ignore: exactly MAC_STRING_LEN digits are pushed
            let _ = s.push(HEX[nibble as usize] as char);
        }
    }
    s
}

impl<T: ClassTransport, const N: usize> Ecm<T, N> {
    /// Returns the functional descriptor of an instance.
    ///
    /// An instance that has not been attached yet encodes zero fields.
    pub fn encode_functional_descriptor(
        &self,
        id: InstanceId,
    ) -> Result<[u8; FunctionalDescriptor::SIZE]> {
        let ctrl = self.ctrl(id)?;
        let desc = ctrl.desc.unwrap_or_else(|| {
            debug!("ecm {}: descriptor requested before attach", id);
            FunctionalDescriptor::default()
        });
        Ok(desc.encode())
    }
}
