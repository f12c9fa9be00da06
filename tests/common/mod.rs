//! Common test utilities for dcp-kdm integration tests
//!
//! RSA key generation is slow in debug builds, so each test binary generates
//! its keypairs once and shares them.

#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use dcp_kdm::{
    thumbprint_of, Asset, Certificate, CertificateChain, CertificateInfo, Cpl, KeyType,
    LocalTime, ReelFileAsset, Standard,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::RsaPrivateKey;
use std::sync::{Arc, Once};
use uuid::Uuid;

lazy_static! {
    /// Key of the device receiving KDMs
    pub static ref RECIPIENT_KEY: RsaPrivateKey =
        RsaPrivateKey::new(&mut OsRng, 2048).expect("generate recipient key");
    /// Key of the signer's leaf certificate
    pub static ref SIGNER_KEY: RsaPrivateKey =
        RsaPrivateKey::new(&mut OsRng, 2048).expect("generate signer key");
    /// Too small to carry a key block under OAEP
    pub static ref SMALL_KEY: RsaPrivateKey =
        RsaPrivateKey::new(&mut OsRng, 1024).expect("generate small key");
}

static TRACING: Once = Once::new();

/// Install a tracing subscriber once per test binary; honours `RUST_LOG`
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn t(s: &str) -> LocalTime {
    LocalTime::parse(s).expect("valid timestamp")
}

pub fn recipient_private_pem() -> String {
    RECIPIENT_KEY
        .to_pkcs8_pem(LineEnding::LF)
        .expect("encode recipient key")
        .to_string()
}

/// A certificate with the given key, valid from `from` to `to` (UTC midnight)
pub fn certificate(
    cn: &str,
    key: &RsaPrivateKey,
    from: (i32, u32, u32),
    to: (i32, u32, u32),
) -> Certificate {
    Certificate::new(CertificateInfo {
        public_key: key.to_public_key(),
        thumbprint: thumbprint_of(cn.as_bytes()),
        not_before: Utc
            .with_ymd_and_hms(from.0, from.1, from.2, 0, 0, 0)
            .unwrap(),
        not_after: Utc.with_ymd_and_hms(to.0, to.1, to.2, 0, 0, 0).unwrap(),
        subject_common_name: cn.to_string(),
        issuer_common_name: "ca.example.com".to_string(),
        issuer: "dnQualifier=8O8W8oYHlf+BQ6ThCHnYjZqNDSw=,CN=ca.example.com,O=example.com".to_string(),
        serial: "1024".to_string(),
        subject: format!("CN={},O=example.com", cn),
    })
}

/// Signer chain whose leaf is valid 2020-01-01 to 2030-01-01
pub fn signer_chain() -> CertificateChain {
    CertificateChain::new(vec![
        certificate("CS.signer.example.com", &SIGNER_KEY, (2020, 1, 1), (2030, 1, 1)),
        certificate("ca.example.com", &SIGNER_KEY, (2015, 1, 1), (2035, 1, 1)),
    ])
    .expect("non-empty chain")
}

pub fn recipient_certificate() -> Certificate {
    certificate(
        "SM.ws-1.cinema.example.com",
        &RECIPIENT_KEY,
        (2020, 1, 1),
        (2030, 1, 1),
    )
}

/// A loaded essence file
#[derive(Debug)]
pub struct TestAsset {
    pub id: String,
    pub label: String,
}

impl Asset for TestAsset {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Picture, sound and subtitle assets, each with its own key id
pub fn encrypted_cpl(count: usize) -> Cpl {
    let types = [KeyType::MDIK, KeyType::MDAK, KeyType::MDSK];
    let mut cpl = Cpl::new(Uuid::new_v4(), "Feature_FTR_F_EN-XX_51_2K", Standard::Smpte);
    for i in 0..count {
        cpl.add_asset(ReelFileAsset::encrypted(
            Uuid::new_v4(),
            types[i % types.len()],
            Uuid::new_v4(),
        ));
    }
    cpl
}

/// Loaded assets matching every reel asset of `cpl`
pub fn loaded_assets(cpl: &Cpl) -> Vec<Arc<dyn Asset>> {
    cpl.reel_assets
        .iter()
        .enumerate()
        .map(|(i, a)| {
            Arc::new(TestAsset {
                id: a.id().hyphenated().to_string(),
                label: format!("reel asset {}", i),
            }) as Arc<dyn Asset>
        })
        .collect()
}
