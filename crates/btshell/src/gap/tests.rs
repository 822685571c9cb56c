//! Unit tests for GAP address and pairing types

use super::*;

#[test]
fn test_address_string_round_trip() {
    let samples = [
        [0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
        [0x55, 0x44, 0x33, 0x22, 0x11, 0x00],
        [0x01, 0x23, 0x45, 0x67, 0x89, 0xAB],
        [0xFF, 0xFE, 0x80, 0x7F, 0x10, 0xC0],
    ];

    for bytes in samples {
        let addr = BdAddr::new(bytes);
        let text = addr.to_string();
        let parsed: BdAddr = text.parse().unwrap();
        assert_eq!(parsed.bytes, bytes, "round trip of {}", text);
    }
}

#[test]
fn test_address_display_is_most_significant_first() {
    let addr = BdAddr::new([0x55, 0x44, 0x33, 0x22, 0x11, 0x00]);
    assert_eq!(addr.to_string(), "00:11:22:33:44:55");
}

#[test]
fn test_address_parse_forms() {
    let expected = BdAddr::new([0x55, 0x44, 0x33, 0x22, 0x11, 0x00]);

    assert_eq!("001122334455".parse::<BdAddr>().unwrap(), expected);
    assert_eq!("0x001122334455".parse::<BdAddr>().unwrap(), expected);
    assert_eq!("0X001122334455".parse::<BdAddr>().unwrap(), expected);
    assert_eq!("00:11:22:33:44:55".parse::<BdAddr>().unwrap(), expected);
    assert_eq!("aabbccddeeff".parse::<BdAddr>().unwrap().bytes[0], 0xFF);
}

#[test]
fn test_address_parse_errors() {
    assert_eq!(
        "00112233445".parse::<BdAddr>(),
        Err(AddressParseError::InvalidLength(11))
    );
    assert_eq!(
        "00112233445G".parse::<BdAddr>(),
        Err(AddressParseError::InvalidDigit)
    );
    assert!("".parse::<BdAddr>().is_err());
}

#[test]
fn test_resolvable_private_address_bits() {
    // Top two bits 01 mark a resolvable private address
    assert!(BdAddr::new([0, 0, 0, 0, 0, 0x4F]).is_resolvable_private());
    assert!(!BdAddr::new([0, 0, 0, 0, 0, 0xCF]).is_resolvable_private());
    assert!(!BdAddr::new([0, 0, 0, 0, 0, 0x0F]).is_resolvable_private());
}

#[test]
fn test_null_address() {
    assert!(BdAddr::NULL.is_null());
    assert!(BdAddr::default().is_null());
    assert!(!BdAddr::new([1, 0, 0, 0, 0, 0]).is_null());
}

#[test]
fn test_io_capability_conversion() {
    for value in 0..=4u8 {
        let cap = IoCapability::from_u8(value).unwrap();
        assert_eq!(cap.to_u8(), value);
    }
    assert_eq!(IoCapability::from_u8(5), None);
    assert!(IoCapability::DisplayYesNo.can_confirm());
    assert!(!IoCapability::NoInputNoOutput.can_confirm());
}

#[test]
fn test_auth_requirements_from_capabilities() {
    let mut caps = PairingCapabilities::default();
    assert_eq!(caps.auth_requirements(), AuthRequirements::BONDING);

    caps.mitm = true;
    caps.bonding = false;
    assert_eq!(caps.auth_requirements(), AuthRequirements::MITM);
}

#[test]
fn test_discovery_mode_flags() {
    assert_eq!(
        DiscoveryMode::GeneralDiscoverable.advertising_flags(),
        ADV_FLAG_LE_GENERAL_DISCOVERABLE | ADV_FLAG_BR_EDR_NOT_SUPPORTED
    );
    assert_eq!(DiscoveryMode::from_u32(3), None);
    assert_eq!(PairabilityMode::from_u32(2), Some(PairabilityMode::PairableSecure));
}
