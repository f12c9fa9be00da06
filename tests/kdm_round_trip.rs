mod common;

use common::*;
use dcp_kdm::prelude::*;
use dcp_kdm::{key_block, wrap, KeyBlockError, ASSUME_TRUST_THUMBPRINT, SMPTE_BLOCK_LEN};
use uuid::Uuid;

fn issue(cpl: &Cpl, key: &KeyMaterial, options: &EncryptOptions) -> (DecryptedKdm, EncryptedKdm) {
    let kdm = DecryptedKdm::builder()
        .valid_window(
            t("2021-01-01T00:00:00+00:00"),
            t("2025-01-01T00:00:00+00:00"),
        )
        .annotation_text("Feature for Screen 1")
        .issue_date(t("2020-12-15T10:30:00+01:00"))
        .build_for_cpl(cpl, key)
        .unwrap();
    let encrypted = kdm
        .encrypt(&signer_chain(), &recipient_certificate(), options)
        .unwrap();
    (kdm, encrypted)
}

#[test]
fn test_end_to_end_three_assets_shared_key() {
    init_tracing();
    let cpl = encrypted_cpl(3);
    let key = KeyMaterial::random();
    let (kdm, encrypted) = issue(&cpl, &key, &EncryptOptions::default());

    // One record per asset, all with the shared key and distinct ids
    assert_eq!(kdm.keys().len(), 3);
    let ids: Vec<Uuid> = kdm.keys().iter().map(|k| k.key_id()).collect();
    let expected: Vec<Uuid> = cpl.encryptable_assets().filter_map(|a| a.key_id()).collect();
    assert_eq!(ids, expected);
    assert!(kdm.keys().iter().all(|k| k.key() == &key));

    assert_eq!(encrypted.cipher_values().len(), 3);
    assert_eq!(encrypted.cpl_id(), cpl.id);
    let listed: Vec<Uuid> = encrypted.key_id_list().iter().map(|k| k.key_id).collect();
    assert_eq!(listed, expected);

    let decrypted = DecryptedKdm::decrypt(&encrypted, &RECIPIENT_KEY).unwrap();
    assert_eq!(decrypted.keys(), kdm.keys());
    assert_eq!(decrypted.not_valid_before(), kdm.not_valid_before());
    assert_eq!(decrypted.not_valid_after(), kdm.not_valid_after());
    assert_eq!(decrypted.annotation_text(), Some("Feature for Screen 1"));
    assert_eq!(decrypted.content_title_text(), "Feature_FTR_F_EN-XX_51_2K");
    assert_eq!(
        decrypted.issue_date().as_string(),
        "2020-12-15T10:30:00+01:00"
    );
}

#[test]
fn test_decrypt_with_pem_key() {
    let cpl = encrypted_cpl(1);
    let (kdm, encrypted) = issue(&cpl, &KeyMaterial::random(), &EncryptOptions::default());
    let decrypted = DecryptedKdm::decrypt_pem(&encrypted, &recipient_private_pem()).unwrap();
    assert_eq!(decrypted.keys(), kdm.keys());
}

#[test]
fn test_cipher_values_are_64_column_lines() {
    let cpl = encrypted_cpl(2);
    let (_, encrypted) = issue(&cpl, &KeyMaterial::random(), &EncryptOptions::default());
    for value in encrypted.cipher_values() {
        let lines: Vec<&str> = value.split('\n').collect();
        assert!(lines.len() > 1);
        assert!(lines[..lines.len() - 1].iter().all(|l| l.len() == 64));
        assert!(lines.last().unwrap().len() <= 64);
    }
}

#[test]
fn test_key_blocks_carry_signer_thumbprint_and_window() {
    let cpl = encrypted_cpl(1);
    let (_, encrypted) = issue(&cpl, &KeyMaterial::random(), &EncryptOptions::default());

    let raw = RsaOaepWrapper::default()
        .unwrap(&encrypted.cipher_values()[0], &RECIPIENT_KEY)
        .unwrap();
    assert_eq!(raw.len(), SMPTE_BLOCK_LEN);

    let block = key_block::unpack(&raw).unwrap();
    assert_eq!(block.signer_thumbprint(), signer_chain().leaf().thumbprint());
    assert_eq!(block.cpl_id(), cpl.id);
    assert_eq!(block.key_type(), Some(KeyType::MDIK));
    assert_eq!(
        block.not_valid_before().as_string(),
        "2021-01-01T00:00:00+00:00"
    );
}

#[test]
fn test_interop_records_round_trip() {
    let cpl_id = Uuid::new_v4();
    let mut kdm = DecryptedKdm::builder()
        .valid_window(
            t("2021-01-01T00:00:00+00:00"),
            t("2021-06-01T00:00:00+00:00"),
        )
        .content_title_text("Interop Trailer")
        .build()
        .unwrap();
    let record = KeyRecord::new(
        None,
        Uuid::new_v4(),
        KeyMaterial::random(),
        cpl_id,
        Standard::Interop,
    )
    .unwrap();
    kdm.add_key(record.clone());

    let encrypted = kdm
        .encrypt(&signer_chain(), &recipient_certificate(), &EncryptOptions::default())
        .unwrap();
    assert_eq!(encrypted.key_id_list()[0].key_type, None);

    let decrypted = DecryptedKdm::decrypt(&encrypted, &RECIPIENT_KEY).unwrap();
    assert_eq!(decrypted.keys(), [record]);
}

#[test]
fn test_sha256_oaep_round_trip() {
    let cpl = encrypted_cpl(2);
    let options = EncryptOptions::new().oaep_hash(OaepHash::Sha256);
    let (kdm, encrypted) = issue(&cpl, &KeyMaterial::random(), &options);

    let decrypted =
        DecryptedKdm::decrypt_with(&encrypted, &RECIPIENT_KEY, &RsaOaepWrapper::with_sha256())
            .unwrap();
    assert_eq!(decrypted.keys(), kdm.keys());

    // The default SHA-1 wrapper cannot open it
    let result = DecryptedKdm::decrypt(&encrypted, &RECIPIENT_KEY);
    assert!(matches!(result, Err(KdmError::Crypto(_))));
}

#[test]
fn test_json_hand_off_round_trip() {
    let cpl = encrypted_cpl(3);
    let options = EncryptOptions::new()
        .formulation(Formulation::DciSpecific)
        .trusted_device("aGVsbG8gd29ybGQgdGh1bWJwcmludA==")
        .forensic_marking(ForensicMarking {
            disable_picture: true,
            disable_audio: Some(6),
        });
    let (kdm, encrypted) = issue(&cpl, &KeyMaterial::random(), &options);

    let json = encrypted.to_json().unwrap();
    let parsed = EncryptedKdm::from_json(&json).unwrap();
    assert_eq!(parsed, encrypted);
    assert_eq!(parsed.forensic_marking().unwrap(), options.forensic_marking);

    let decrypted = DecryptedKdm::decrypt(&parsed, &RECIPIENT_KEY).unwrap();
    assert_eq!(decrypted.keys(), kdm.keys());
}

#[test]
fn test_formulation_metadata() {
    let cpl = encrypted_cpl(1);
    let key = KeyMaterial::random();

    let (_, mt1) = issue(&cpl, &key, &EncryptOptions::default());
    let info = mt1.authorized_device_info().unwrap();
    assert_eq!(info.certificate_thumbprints, [ASSUME_TRUST_THUMBPRINT]);
    assert_eq!(
        info.device_list_description.as_deref(),
        Some("ws-1.cinema.example.com")
    );
    assert_eq!(mt1.content_authenticator(), None);
    assert!(mt1.forensic_mark_flags().is_empty());

    let (_, dci) = issue(
        &cpl,
        &key,
        &EncryptOptions::new().formulation(Formulation::DciAny),
    );
    assert_eq!(
        dci.content_authenticator(),
        Some(signer_chain().leaf().thumbprint())
    );
    assert_eq!(dci.signer().x509_issuer_name, signer_chain().leaf().issuer());
    assert_ne!(dci.message_id(), mt1.message_id());
}

#[test]
fn test_corrupted_cipher_value_fails_whole_kdm() {
    let cpl = encrypted_cpl(3);
    let (_, encrypted) = issue(&cpl, &KeyMaterial::random(), &EncryptOptions::default());

    // Replace the second block with a wrapped block of the wrong size
    let bogus = wrap::RsaOaepWrapper::default()
        .wrap(&[0u8; 100], &RECIPIENT_KEY.to_public_key())
        .unwrap();
    let mut json: serde_json::Value = serde_json::from_str(&encrypted.to_json().unwrap()).unwrap();
    json["cipherValues"][1] = serde_json::Value::String(bogus);
    let tampered = EncryptedKdm::from_json(&json.to_string()).unwrap();

    let err = DecryptedKdm::decrypt(&tampered, &RECIPIENT_KEY).unwrap_err();
    assert!(err.is_format_error());
    assert!(matches!(
        err,
        KdmError::Format(KeyBlockError::InvalidLength(100))
    ));
}

#[test]
fn test_decrypt_with_wrong_private_key() {
    let cpl = encrypted_cpl(1);
    let (_, encrypted) = issue(&cpl, &KeyMaterial::random(), &EncryptOptions::default());

    let err = DecryptedKdm::decrypt(&encrypted, &SIGNER_KEY).unwrap_err();
    assert!(err.is_crypto_error());
    assert!(err.suggestion().is_some());
    assert!(err.to_string().contains("RSA key size 2048 bits"));
}

#[test]
fn test_mismatched_block_keeps_first_window() {
    init_tracing();
    let cpl = encrypted_cpl(3);
    let (kdm, encrypted) = issue(&cpl, &KeyMaterial::random(), &EncryptOptions::default());

    // A block for another CPL with its own validity window
    let other_cpl = Uuid::new_v4();
    let stray = KeyRecord::new(
        Some(KeyType::MDAK),
        Uuid::new_v4(),
        KeyMaterial::random(),
        other_cpl,
        Standard::Smpte,
    )
    .unwrap();
    let block = key_block::pack(
        &stray,
        signer_chain().leaf().thumbprint(),
        t("2022-03-01T00:00:00+00:00"),
        t("2022-04-01T00:00:00+00:00"),
    )
    .unwrap();
    let wrapped = RsaOaepWrapper::default()
        .wrap(&block, &RECIPIENT_KEY.to_public_key())
        .unwrap();

    let mut json: serde_json::Value = serde_json::from_str(&encrypted.to_json().unwrap()).unwrap();
    json["cipherValues"][1] = serde_json::Value::String(wrapped);
    let mixed = EncryptedKdm::from_json(&json.to_string()).unwrap();

    let decrypted = DecryptedKdm::decrypt(&mixed, &RECIPIENT_KEY).unwrap();
    assert_eq!(decrypted.keys().len(), 3);
    assert_eq!(decrypted.keys()[0], kdm.keys()[0]);
    assert_eq!(decrypted.keys()[1], stray);
    assert_eq!(decrypted.keys()[1].cpl_id(), other_cpl);
    assert_eq!(decrypted.keys()[2], kdm.keys()[2]);
    assert_eq!(
        decrypted.not_valid_before().as_string(),
        "2021-01-01T00:00:00+00:00"
    );
    assert_eq!(
        decrypted.not_valid_after().as_string(),
        "2025-01-01T00:00:00+00:00"
    );
}

#[test]
fn test_kdm_without_cipher_values_uses_recorded_window() {
    let cpl = encrypted_cpl(2);
    let (_, encrypted) = issue(&cpl, &KeyMaterial::random(), &EncryptOptions::default());

    let mut json: serde_json::Value = serde_json::from_str(&encrypted.to_json().unwrap()).unwrap();
    json["cipherValues"] = serde_json::Value::Array(Vec::new());
    let empty = EncryptedKdm::from_json(&json.to_string()).unwrap();

    let decrypted = DecryptedKdm::decrypt(&empty, &RECIPIENT_KEY).unwrap();
    assert!(decrypted.keys().is_empty());
    assert_eq!(decrypted.not_valid_before(), encrypted.not_valid_before());
    assert_eq!(decrypted.not_valid_after(), encrypted.not_valid_after());
    assert_eq!(decrypted.content_title_text(), "Feature_FTR_F_EN-XX_51_2K");
    assert_eq!(decrypted.annotation_text(), Some("Feature for Screen 1"));
}
