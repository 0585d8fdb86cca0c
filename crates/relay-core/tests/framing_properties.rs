//! Integration tests for relay-core through its public API.
//!
//! These exercise the framing codec, the scan target derivation and the
//! payload profile together, the way the server uses them.

use std::net::Ipv4Addr;

use relay_core::{
    decode_size_header, encode_size_header, select_interface, DeliveryRequest, Expectation,
    InterfaceSelectionError, LocalInterface, PayloadProfile, ScanTarget,
};

fn iface(name: &str, ip: [u8; 4]) -> LocalInterface {
    LocalInterface::new(
        name,
        Ipv4Addr::from(ip),
        Ipv4Addr::new(255, 255, 255, 0),
    )
}

#[test]
fn test_framed_wire_prefix_decodes_to_payload_length() {
    for len in [0usize, 1, 64, 255, 256, 65_535, 65_536, 1 << 24] {
        // Arrange
        let payload = vec![0xAAu8; len];

        // Act: build the bytes a framed delivery puts on the wire
        let mut wire = encode_size_header(payload.len()).unwrap().to_vec();
        wire.extend_from_slice(&payload);

        // Assert
        assert_eq!(decode_size_header(&wire).unwrap() as usize, len);
        assert_eq!(&wire[4..8], &[0, 0, 0, 0], "reserved half must be zero");
        assert_eq!(wire.len(), 8 + len);
    }
}

#[test]
fn test_reference_scenario_header_bytes() {
    let request = DeliveryRequest::new(
        "192.168.1.50:9026".parse().unwrap(),
        "test.lua",
        vec![0xAA; 64],
    );

    assert_eq!(
        request.profile(),
        PayloadProfile::Framed(Expectation::Unspecified)
    );
    let header = encode_size_header(request.payload.len()).unwrap();
    assert_eq!(header, [0x40, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
}

#[test]
fn test_selected_interface_prefix_matches_its_address() {
    let interfaces = vec![
        iface("wlan0", [169, 254, 3, 9]),
        iface("eth0", [10, 20, 30, 40]),
        iface("eth1", [192, 168, 1, 7]),
    ];

    for requested in [None, Some("wlan0"), Some("eth1")] {
        let selected = select_interface(&interfaces, requested).unwrap();
        let target = ScanTarget::from_interface(selected);

        let octets = selected.ipv4.octets();
        assert_eq!(target.prefix(), [octets[0], octets[1], octets[2]]);
        assert_eq!(target.excluded(), selected.ipv4);
    }
}

#[test]
fn test_candidates_never_include_the_local_address() {
    let local = iface("eth0", [192, 168, 1, 7]);
    let target = ScanTarget::from_interface(&local);

    let candidates = target.candidates();

    assert_eq!(candidates.len(), 253);
    assert!(!candidates.contains(&local.ipv4));
    assert_eq!(candidates.first(), Some(&Ipv4Addr::new(192, 168, 1, 1)));
    assert_eq!(candidates.last(), Some(&Ipv4Addr::new(192, 168, 1, 254)));
}

#[test]
fn test_selection_errors_through_public_api() {
    assert_eq!(
        select_interface(&[], None).unwrap_err(),
        InterfaceSelectionError::NoInterfaces
    );
    let interfaces = vec![iface("eth0", [10, 0, 0, 2])];
    assert_eq!(
        select_interface(&interfaces, Some("eth9")).unwrap_err(),
        InterfaceSelectionError::InterfaceNotFound("eth9".to_string())
    );
}
