// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Full SD packet: the SOME/IP header's payload when ServiceId = 0xFFFF,
//! MethodId = 0x8100 — Flags, EntriesArray, OptionsArray (§4.3).

use crate::error::{Error, Result};
use crate::sd::entry::{SdEntry, ENTRY_LEN};
use crate::sd::option::SdOption;
use crate::wire::header::{MessageType, ReturnCode, SomeIpHeader};

/// Bit 7 of the SD Flags byte: reboot flag, set whenever the sending node's
/// SD session has just (re)started.
pub const FLAG_REBOOT: u8 = 0x80;

/// One entry paired with the options it references, already resolved from
/// the packet's flat OptionsArray via its Index1st/Index2nd/NumOpts fields.
#[derive(Debug, Clone)]
pub struct ResolvedEntry {
    pub entry: SdEntry,
    pub options: Vec<SdOption>,
}

/// A fully decoded SD message: Flags plus entries resolved against their options.
#[derive(Debug, Clone)]
pub struct SdPacket {
    pub reboot: bool,
    pub entries: Vec<ResolvedEntry>,
}

impl SdPacket {
    /// Build the SOME/IP header every SD message carries.
    #[must_use]
    pub fn header(session_id: u16) -> SomeIpHeader {
        SomeIpHeader {
            service_id: super::constants::SD_SERVICE_ID,
            method_id: super::constants::SD_METHOD_ID,
            length: 0, // patched by serialize() once the payload length is known
            client_id: super::constants::SD_CLIENT_ID,
            session_id,
            interface_version: 1,
            message_type: MessageType::Notification,
            return_code: ReturnCode::Ok,
        }
    }

    /// Serialize into a full SOME/IP datagram (header + SD payload), ready
    /// to hand to a socket.
    #[must_use]
    pub fn to_datagram(&self, session_id: u16) -> Vec<u8> {
        let payload = self.serialize_payload();
        let mut header = Self::header(session_id);
        header.length = payload.len() as u32 + 8;
        let mut out = header.to_bytes();
        out.extend_from_slice(&payload);
        out
    }

    fn serialize_payload(&self) -> Vec<u8> {
        let mut entries_bytes = Vec::new();
        let mut options_bytes = Vec::new();
        let mut option_index: u8 = 0;

        for resolved in &self.entries {
            let mut entry = resolved.entry;
            if resolved.options.is_empty() {
                entry.num_opts_1st = 0;
                entry.num_opts_2nd = 0;
                entry.index_1st = 0;
                entry.index_2nd = 0;
            } else {
                entry.index_1st = option_index;
                entry.num_opts_1st = resolved.options.len() as u8;
                entry.index_2nd = 0;
                entry.num_opts_2nd = 0;
            }
            entry.serialize(&mut entries_bytes);
            for option in &resolved.options {
                option.serialize(&mut options_bytes);
                option_index += 1;
            }
        }

        let mut out = Vec::with_capacity(8 + entries_bytes.len() + options_bytes.len());
        let flags = if self.reboot { FLAG_REBOOT } else { 0 };
        out.push(flags);
        out.extend_from_slice(&[0, 0, 0]); // reserved
        out.extend_from_slice(&(entries_bytes.len() as u32).to_be_bytes());
        out.extend_from_slice(&entries_bytes);
        out.extend_from_slice(&(options_bytes.len() as u32).to_be_bytes());
        out.extend_from_slice(&options_bytes);
        out
    }

    /// Decode an SD payload (everything after the 16-byte SOME/IP header).
    ///
    /// Per §4.3, an entry whose option indices are out of range is dropped —
    /// the rest of the message is still parsed.
    pub fn deserialize_payload(data: &[u8]) -> Result<Self> {
        if data.len() < 8 {
            return Err(Error::MalformedSdPacket("SD payload shorter than 8 bytes".into()));
        }
        let reboot = (data[0] & FLAG_REBOOT) != 0;
        let entries_len = u32::from_be_bytes([data[4], data[5], data[6], data[7]]) as usize;
        let entries_start = 8;
        if data.len() < entries_start + entries_len {
            return Err(Error::MalformedSdPacket("EntriesArrayLength exceeds buffer".into()));
        }
        let entries_region = &data[entries_start..entries_start + entries_len];

        let options_len_start = entries_start + entries_len;
        if data.len() < options_len_start + 4 {
            return Err(Error::MalformedSdPacket("missing OptionsArrayLength".into()));
        }
        let options_len = u32::from_be_bytes([
            data[options_len_start],
            data[options_len_start + 1],
            data[options_len_start + 2],
            data[options_len_start + 3],
        ]) as usize;
        let options_start = options_len_start + 4;
        if data.len() < options_start + options_len {
            return Err(Error::MalformedSdPacket("OptionsArrayLength exceeds buffer".into()));
        }
        let options_region = &data[options_start..options_start + options_len];

        let options = Self::parse_options(options_region)?;

        let mut entries = Vec::new();
        let mut offset = 0;
        while offset + ENTRY_LEN <= entries_region.len() {
            let entry = match SdEntry::deserialize(&entries_region[offset..offset + ENTRY_LEN]) {
                Ok(e) => e,
                Err(_) => {
                    offset += ENTRY_LEN;
                    continue;
                }
            };
            offset += ENTRY_LEN;

            let mut resolved_options = Vec::new();
            if entry.num_opts_1st > 0 {
                if let Some(slice) = Self::slice_options(&options, entry.index_1st, entry.num_opts_1st) {
                    resolved_options.extend(slice.iter().cloned());
                } else {
                    continue; // out-of-range index: discard this entry only
                }
            }
            if entry.num_opts_2nd > 0 {
                if let Some(slice) = Self::slice_options(&options, entry.index_2nd, entry.num_opts_2nd) {
                    resolved_options.extend(slice.iter().cloned());
                } else {
                    continue;
                }
            }

            entries.push(ResolvedEntry { entry, options: resolved_options });
        }

        Ok(Self { reboot, entries })
    }

    fn parse_options(region: &[u8]) -> Result<Vec<SdOption>> {
        let mut options = Vec::new();
        let mut offset = 0;
        while offset < region.len() {
            let (option, consumed) = SdOption::deserialize(&region[offset..])?;
            options.push(option);
            offset += consumed;
        }
        Ok(options)
    }

    fn slice_options(options: &[SdOption], index: u8, count: u8) -> Option<&[SdOption]> {
        let start = index as usize;
        let end = start + count as usize;
        options.get(start..end)
    }
}
