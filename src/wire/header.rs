// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SOME/IP header: 16 bytes, big-endian, AUTOSAR PRS_SOMEIPProtocol.
//!
//! ```text
//! ServiceId(2) MethodId(2) Length(4) ClientId(2) SessionId(2)
//! ProtocolVersion(1) InterfaceVersion(1) MessageType(1) ReturnCode(1)
//! ```

use crate::error::{Error, Result};

/// Header length on the wire, fixed by the spec.
pub const HEADER_LEN: usize = 16;

/// SOME/IP protocol version this crate emits and expects.
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Message type, including the SOME/IP-TP segmentation bit (0x20).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Request,
    RequestNoReturn,
    Notification,
    RequestTp,
    RequestNoReturnTp,
    NotificationTp,
    Response,
    ResponseError,
    ResponseTp,
    ResponseErrorTp,
}

impl MessageType {
    /// The 0x20 bit that marks SOME/IP-TP segmentation.
    pub const TP_BIT: u8 = 0x20;

    #[must_use]
    pub fn is_tp(self) -> bool {
        (self.as_u8() & Self::TP_BIT) != 0
    }

    /// Set (or clear) the TP bit on a message type, keeping everything else.
    #[must_use]
    pub fn with_tp(self, tp: bool) -> Self {
        let raw = self.as_u8();
        let toggled = if tp { raw | Self::TP_BIT } else { raw & !Self::TP_BIT };
        // toggled is always one of the values recognized by from_u8 because
        // the TP bit only ever applies to Request/RequestNoReturn/Notification
        // and their Response/Error counterparts never carry it on the wire.
        Self::from_u8(toggled).unwrap_or(self)
    }

    #[must_use]
    pub fn as_u8(self) -> u8 {
        match self {
            MessageType::Request => 0x00,
            MessageType::RequestNoReturn => 0x01,
            MessageType::Notification => 0x02,
            MessageType::RequestTp => 0x20,
            MessageType::RequestNoReturnTp => 0x21,
            MessageType::NotificationTp => 0x22,
            MessageType::Response => 0x80,
            MessageType::ResponseError => 0x81,
            MessageType::ResponseTp => 0xA0,
            MessageType::ResponseErrorTp => 0xA1,
        }
    }

    #[must_use]
    pub fn from_u8(raw: u8) -> Option<Self> {
        Some(match raw {
            0x00 => MessageType::Request,
            0x01 => MessageType::RequestNoReturn,
            0x02 => MessageType::Notification,
            0x20 => MessageType::RequestTp,
            0x21 => MessageType::RequestNoReturnTp,
            0x22 => MessageType::NotificationTp,
            0x80 => MessageType::Response,
            0x81 => MessageType::ResponseError,
            0xA0 => MessageType::ResponseTp,
            0xA1 => MessageType::ResponseErrorTp,
            _ => return None,
        })
    }
}

/// Return code carried by `Response`/`Error` messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnCode {
    Ok,
    NotOk,
    UnknownService,
    UnknownMethod,
    NotReady,
    NotReachable,
    Timeout,
    WrongProtocolVersion,
    WrongInterfaceVersion,
    MalformedMessage,
    WrongMessageType,
    E2eRepeated,
    E2eWrongSequence,
    E2e,
    E2eNotAvailable,
    E2eNoNewData,
}

impl ReturnCode {
    #[must_use]
    pub fn as_u8(self) -> u8 {
        match self {
            ReturnCode::Ok => 0x00,
            ReturnCode::NotOk => 0x01,
            ReturnCode::UnknownService => 0x02,
            ReturnCode::UnknownMethod => 0x03,
            ReturnCode::NotReady => 0x04,
            ReturnCode::NotReachable => 0x05,
            ReturnCode::Timeout => 0x06,
            ReturnCode::WrongProtocolVersion => 0x07,
            ReturnCode::WrongInterfaceVersion => 0x08,
            ReturnCode::MalformedMessage => 0x09,
            ReturnCode::WrongMessageType => 0x0A,
            ReturnCode::E2eRepeated => 0x0B,
            ReturnCode::E2eWrongSequence => 0x0C,
            ReturnCode::E2e => 0x0D,
            ReturnCode::E2eNotAvailable => 0x0E,
            ReturnCode::E2eNoNewData => 0x0F,
        }
    }

    #[must_use]
    pub fn from_u8(raw: u8) -> Option<Self> {
        Some(match raw {
            0x00 => ReturnCode::Ok,
            0x01 => ReturnCode::NotOk,
            0x02 => ReturnCode::UnknownService,
            0x03 => ReturnCode::UnknownMethod,
            0x04 => ReturnCode::NotReady,
            0x05 => ReturnCode::NotReachable,
            0x06 => ReturnCode::Timeout,
            0x07 => ReturnCode::WrongProtocolVersion,
            0x08 => ReturnCode::WrongInterfaceVersion,
            0x09 => ReturnCode::MalformedMessage,
            0x0A => ReturnCode::WrongMessageType,
            0x0B => ReturnCode::E2eRepeated,
            0x0C => ReturnCode::E2eWrongSequence,
            0x0D => ReturnCode::E2e,
            0x0E => ReturnCode::E2eNotAvailable,
            0x0F => ReturnCode::E2eNoNewData,
            _ => return None,
        })
    }
}

/// A fully decoded SOME/IP header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SomeIpHeader {
    pub service_id: u16,
    pub method_id: u16,
    /// Payload length in bytes, NOT including ServiceId/MethodId/Length itself
    /// (i.e. `payload.len() + 8`).
    pub length: u32,
    pub client_id: u16,
    pub session_id: u16,
    pub interface_version: u8,
    pub message_type: MessageType,
    pub return_code: ReturnCode,
}

impl SomeIpHeader {
    /// Build a header for a request/notification (`return_code` is `Ok`
    /// by convention; it carries no meaning outside Response/Error).
    #[must_use]
    pub fn new(
        service_id: u16,
        method_id: u16,
        payload_len: usize,
        client_id: u16,
        session_id: u16,
        interface_version: u8,
        message_type: MessageType,
    ) -> Self {
        Self {
            service_id,
            method_id,
            length: payload_len as u32 + 8,
            client_id,
            session_id,
            interface_version,
            message_type,
            return_code: ReturnCode::Ok,
        }
    }

    /// Build the `Response` (or `Error`) header that answers this request,
    /// echoing `ClientId`/`SessionId` per §4.4.
    #[must_use]
    pub fn response(&self, payload_len: usize, return_code: ReturnCode, is_error: bool) -> Self {
        let message_type = if is_error {
            if self.message_type.is_tp() {
                MessageType::ResponseErrorTp
            } else {
                MessageType::ResponseError
            }
        } else if self.message_type.is_tp() {
            MessageType::ResponseTp
        } else {
            MessageType::Response
        };
        Self {
            service_id: self.service_id,
            method_id: self.method_id,
            length: payload_len as u32 + 8,
            client_id: self.client_id,
            session_id: self.session_id,
            interface_version: self.interface_version,
            message_type,
            return_code,
        }
    }

    #[must_use]
    pub fn payload_len(&self) -> usize {
        self.length.saturating_sub(8) as usize
    }

    /// Serialize the 16-byte header, big-endian.
    pub fn serialize(&self, out: &mut [u8; HEADER_LEN]) {
        out[0..2].copy_from_slice(&self.service_id.to_be_bytes());
        out[2..4].copy_from_slice(&self.method_id.to_be_bytes());
        out[4..8].copy_from_slice(&self.length.to_be_bytes());
        out[8..10].copy_from_slice(&self.client_id.to_be_bytes());
        out[10..12].copy_from_slice(&self.session_id.to_be_bytes());
        out[12] = PROTOCOL_VERSION;
        out[13] = self.interface_version;
        out[14] = self.message_type.as_u8();
        out[15] = self.return_code.as_u8();
    }

    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = [0u8; HEADER_LEN];
        self.serialize(&mut buf);
        buf.to_vec()
    }

    /// Decode a header from the front of `data`.
    ///
    /// No payload-length validation is performed here per §4.1 — the caller
    /// decides whether `length` matches the bytes actually available.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(Error::MalformedHeader);
        }
        let service_id = u16::from_be_bytes([data[0], data[1]]);
        let method_id = u16::from_be_bytes([data[2], data[3]]);
        let length = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        let client_id = u16::from_be_bytes([data[8], data[9]]);
        let session_id = u16::from_be_bytes([data[10], data[11]]);
        // data[12] (protocol version) is accepted but not enforced at this
        // layer; callers that require strict version checking do it above us.
        let interface_version = data[13];
        let message_type = MessageType::from_u8(data[14]).ok_or(Error::MalformedHeader)?;
        let return_code = ReturnCode::from_u8(data[15]).ok_or(Error::MalformedHeader)?;
        Ok(Self {
            service_id,
            method_id,
            length,
            client_id,
            session_id,
            interface_version,
            message_type,
            return_code,
        })
    }
}
