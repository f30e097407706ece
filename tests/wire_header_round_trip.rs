// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Round-trips the SOME/IP header across its public serialize/deserialize
//! surface (§4.1).

use someip_rt::wire::header::{MessageType, ReturnCode, SomeIpHeader};

#[test]
fn request_header_round_trips_through_bytes() {
    let header = SomeIpHeader::new(0x1234, 0x0421, 16, 0x0001, 0x0007, 1, MessageType::Request);
    let bytes = header.to_bytes();
    assert_eq!(bytes.len(), 16);

    let decoded = SomeIpHeader::deserialize(&bytes).expect("valid header");
    assert_eq!(decoded.service_id, 0x1234);
    assert_eq!(decoded.method_id, 0x0421);
    assert_eq!(decoded.length, 24); // payload (16) + ClientId/SessionId/Version*2/Type/Return (8)
    assert_eq!(decoded.client_id, 0x0001);
    assert_eq!(decoded.session_id, 0x0007);
    assert_eq!(decoded.message_type, MessageType::Request);
}

#[test]
fn response_header_echoes_client_and_session_id() {
    let request = SomeIpHeader::new(0x1234, 0x0421, 8, 0x0001, 0x0007, 1, MessageType::Request);
    let response = request.response(4, ReturnCode::Ok, false);

    assert_eq!(response.client_id, request.client_id);
    assert_eq!(response.session_id, request.session_id);
    assert_eq!(response.message_type, MessageType::Response);
    assert_eq!(response.return_code, ReturnCode::Ok);
}

#[test]
fn error_response_sets_error_message_type_and_return_code() {
    let request = SomeIpHeader::new(0x1234, 0x0421, 8, 0x0001, 0x0007, 1, MessageType::Request);
    let error = request.response(0, ReturnCode::UnknownMethod, true);

    assert_eq!(error.message_type, MessageType::ResponseError);
    assert_eq!(error.return_code, ReturnCode::UnknownMethod);
}

#[test]
fn truncated_buffer_is_rejected() {
    let short = [0u8; 10];
    assert!(SomeIpHeader::deserialize(&short).is_err());
}
