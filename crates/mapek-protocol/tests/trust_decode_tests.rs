use mapek_protocol::{decode_trust_payload, TrustDecodeError};

#[test]
fn test_bare_strings() {
    assert_eq!(decode_trust_payload("true"), Ok(true));
    assert_eq!(decode_trust_payload("FALSE"), Ok(false));
    assert_eq!(decode_trust_payload(" 1 "), Ok(true));
    assert_eq!(decode_trust_payload("0"), Ok(false));
    assert_eq!(decode_trust_payload("yes"), Ok(true));
    assert_eq!(decode_trust_payload("no"), Ok(false));
    assert_eq!(decode_trust_payload("ok"), Ok(true));
}

#[test]
fn test_json_object_keys() {
    assert_eq!(decode_trust_payload(r#"{"Bool": true}"#), Ok(true));
    assert_eq!(decode_trust_payload(r#"{"Bool": false}"#), Ok(false));
    assert_eq!(decode_trust_payload(r#"{"Str": "false"}"#), Ok(false));
    assert_eq!(decode_trust_payload(r#"{"trust": 1}"#), Ok(true));
    assert_eq!(decode_trust_payload(r#"{"value": "yes"}"#), Ok(true));
}

#[test]
fn test_key_priority_is_fixed() {
    // "Str" is checked before "Bool".
    assert_eq!(decode_trust_payload(r#"{"Bool": true, "Str": "false"}"#), Ok(false));
}

#[test]
fn test_unusable_key_falls_through_to_next() {
    assert_eq!(decode_trust_payload(r#"{"value": null, "Bool": true}"#), Ok(true));
    assert_eq!(decode_trust_payload(r#"{"Str": "maybe", "ok": 0}"#), Ok(false));
    assert_eq!(
        decode_trust_payload(r#"{"value": null, "Bool": "perhaps"}"#),
        Err(TrustDecodeError::NotBoolean("null".to_string()))
    );
}

#[test]
fn test_json_scalars() {
    assert_eq!(decode_trust_payload(r#""true""#), Ok(true));
    assert_eq!(decode_trust_payload("false"), Ok(false));
}

#[test]
fn test_unrecognized_shapes_are_errors() {
    assert_eq!(decode_trust_payload("   "), Err(TrustDecodeError::Empty));
    assert!(matches!(
        decode_trust_payload(r#"{"other": true}"#),
        Err(TrustDecodeError::MissingKey(_))
    ));
    assert!(matches!(
        decode_trust_payload(r#"{"Bool": {"nested": true}}"#),
        Err(TrustDecodeError::NotBoolean(_))
    ));
    assert!(matches!(decode_trust_payload("maybe"), Err(TrustDecodeError::NotBoolean(_))));
    assert!(matches!(decode_trust_payload("[true]"), Err(TrustDecodeError::NotBoolean(_))));
    assert!(matches!(decode_trust_payload("2"), Err(TrustDecodeError::NotBoolean(_))));
}
