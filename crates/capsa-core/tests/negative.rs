use capsa_core::builder::{CapsaBuilder, FileOptions, PartyKey};
use capsa_core::error::CapsaError;
use capsa_core::keygen::generate_key_pair;
use capsa_core::keys::{parse_private_key, parse_public_key};
use capsa_core::limits::Limits;
use capsa_core::opener::OpenedCapsa;
use capsa_core::rsa_oaep;
use rsa::RsaPrivateKey;

fn party(id: &str) -> (PartyKey, RsaPrivateKey) {
    let pair = generate_key_pair(4096).unwrap();
    let pk = parse_public_key(&pair.public_key).unwrap();
    let sk = parse_private_key(&pair.private_key).unwrap();
    (
        PartyKey {
            id: id.to_string(),
            public_key: pk,
            fingerprint: pair.fingerprint,
            is_delegate: None,
        },
        sk,
    )
}

#[test]
fn empty_capsa_is_rejected() {
    let (creator, creator_sk) = party("creator");
    let builder = CapsaBuilder::new("creator", Limits::default());
    let result = builder.build(&creator_sk, vec![creator]);
    assert!(matches!(result, Err(CapsaError::Empty)));
}

#[test]
fn the_101st_keychain_entry_is_rejected() {
    let mut builder = CapsaBuilder::new("creator", Limits::default());
    builder.set_subject("hi").unwrap();
    for i in 0..99 {
        builder.add_recipient(format!("r{i}")).unwrap();
    }
    // 99 recipients + the implicit creator = 100, the cardinality ceiling (§3);
    // one more would be the 101st entry and must be rejected before build runs.
    let result = builder.add_recipient("r99");
    assert!(matches!(
        result,
        Err(CapsaError::LimitExceeded { field: "recipients", .. })
    ));
}

#[test]
fn subject_encoding_at_the_byte_group_boundary_is_accepted_one_group_more_is_rejected() {
    // Base64url-without-padding only ever lands on lengths ≡ 0, 2, or 3 (mod 4),
    // so an exact 65,536/65,537-char pair isn't reachable byte-for-byte; instead
    // this exercises the same limit at the nearest achievable boundary: a
    // 49,152-byte subject encodes to exactly 65,536 chars, the configured
    // ceiling (§3), and the next full 3-byte group pushes it over.
    let (creator, creator_sk) = party("creator");
    let at_limit = "a".repeat(49_152);
    let mut builder = CapsaBuilder::new("creator", Limits::default());
    builder.set_subject(at_limit).unwrap();
    let result = builder.build(&creator_sk, vec![creator]);
    assert!(result.is_ok());

    let (creator2, creator_sk2) = party("creator2");
    let over_limit = "a".repeat(49_155);
    let mut builder2 = CapsaBuilder::new("creator2", Limits::default());
    builder2.set_subject(over_limit).unwrap();
    let result2 = builder2.build(&creator_sk2, vec![creator2]);
    assert!(matches!(
        result2,
        Err(CapsaError::LimitExceeded { field: "subject", .. })
    ));
}

#[test]
fn rsa_3072_public_key_is_rejected_at_wrap() {
    let pair = generate_key_pair(3072).unwrap();
    let pk = parse_public_key(&pair.public_key).unwrap();
    let key = capsa_core::random::new_master_key();
    assert!(matches!(rsa_oaep::wrap(&key, &pk), Err(CapsaError::Argument(_))));
}

#[test]
fn undersized_decoded_signature_is_rejected_at_verify() {
    use capsa_core::jws::verify_jws;

    let pair = generate_key_pair(4096).unwrap();
    let pk = parse_public_key(&pair.public_key).unwrap();
    let protected = capsa_core::base64url::encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = capsa_core::base64url::encode(b"canonical-string");
    for bad_len in [511usize, 513] {
        let signature = capsa_core::base64url::encode(&vec![0u8; bad_len]);
        assert!(!verify_jws(&protected, &payload, &signature, "canonical-string", &pk));
    }
}

#[test]
fn missing_auth_tag_is_rejected_before_touching_ciphertext() {
    let (creator, creator_sk) = party("creator");
    let mut builder = CapsaBuilder::new("creator", Limits::default());
    builder
        .add_file_bytes("f.txt", b"some bytes".to_vec(), FileOptions::default())
        .unwrap();
    let mut built = builder.build(&creator_sk, vec![creator]).unwrap();

    built.envelope.files[0].auth_tag = String::new();
    let file_id = built.envelope.files[0].file_id.clone();
    let ciphertext = built.blobs[0].1.clone();

    let opened = OpenedCapsa::open(built.envelope, &creator_sk, None, None, false).unwrap();
    let result = opened.decrypt_file(&file_id, &ciphertext);
    assert!(matches!(result, Err(CapsaError::AuthenticationFailed)));
}

#[test]
fn missing_filename_auth_tag_is_rejected() {
    let (creator, creator_sk) = party("creator");
    let mut builder = CapsaBuilder::new("creator", Limits::default());
    builder
        .add_file_bytes("f.txt", b"some bytes".to_vec(), FileOptions::default())
        .unwrap();
    let mut built = builder.build(&creator_sk, vec![creator]).unwrap();

    built.envelope.files[0].filename_auth_tag = String::new();
    let file_id = built.envelope.files[0].file_id.clone();

    let opened = OpenedCapsa::open(built.envelope, &creator_sk, None, None, false).unwrap();
    assert!(matches!(
        opened.decrypt_filename(&file_id),
        Err(CapsaError::AuthenticationFailed)
    ));
}
