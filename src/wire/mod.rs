// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire-level codec: the 16-byte SOME/IP header, primitive payload
//! (de)serialization, and SOME/IP-TP segmentation/reassembly.

pub mod header;
pub mod primitives;
pub mod tp;

pub use header::{MessageType, ReturnCode, SomeIpHeader, HEADER_LEN, PROTOCOL_VERSION};
pub use tp::{Reassembler, Segment, TpHeader, TpSessionKey};
