//! SSH algorithm preference lists for each security profile.
//!
//! Each category is split into three tiers. `secure` uses the first tier,
//! `balanced` the first two and `legacy` all three, so modern algorithms
//! stay preferred even when talking to old equipment.

use russh::keys::{Algorithm, EcdsaCurve, HashAlg};
use russh::{cipher, compression, kex, mac};

use super::SecurityLevel;

type Tiers<T> = [&'static [T]; 3];

const KEX: Tiers<kex::Name> = [
    &[
        kex::CURVE25519,
        kex::CURVE25519_PRE_RFC_8731,
        kex::ECDH_SHA2_NISTP256,
        kex::ECDH_SHA2_NISTP384,
        kex::ECDH_SHA2_NISTP521,
        kex::DH_G16_SHA512,
        kex::DH_G14_SHA256,
    ],
    &[kex::DH_GEX_SHA256, kex::DH_G14_SHA1],
    &[
        kex::DH_G15_SHA512,
        kex::DH_G17_SHA512,
        kex::DH_G18_SHA512,
        kex::DH_GEX_SHA1,
        kex::DH_G1_SHA1,
        kex::NONE,
    ],
];

const CIPHERS: Tiers<cipher::Name> = [
    &[
        cipher::CHACHA20_POLY1305,
        cipher::AES_256_GCM,
        cipher::AES_256_CTR,
        cipher::AES_192_CTR,
        cipher::AES_128_CTR,
    ],
    &[cipher::AES_256_CBC, cipher::AES_128_CBC],
    &[cipher::AES_192_CBC, cipher::CLEAR, cipher::NONE],
];

const MACS: Tiers<mac::Name> = [
    &[
        mac::HMAC_SHA512_ETM,
        mac::HMAC_SHA256_ETM,
        mac::HMAC_SHA512,
        mac::HMAC_SHA256,
    ],
    &[mac::HMAC_SHA1_ETM, mac::HMAC_SHA1],
    &[mac::NONE],
];

const NIST_P256: Algorithm = Algorithm::Ecdsa {
    curve: EcdsaCurve::NistP256,
};
const NIST_P384: Algorithm = Algorithm::Ecdsa {
    curve: EcdsaCurve::NistP384,
};
const NIST_P521: Algorithm = Algorithm::Ecdsa {
    curve: EcdsaCurve::NistP521,
};

const HOST_KEYS: Tiers<Algorithm> = [
    &[
        Algorithm::Ed25519,
        NIST_P256,
        NIST_P384,
        NIST_P521,
        Algorithm::Rsa {
            hash: Some(HashAlg::Sha512),
        },
        Algorithm::Rsa {
            hash: Some(HashAlg::Sha256),
        },
    ],
    // ssh-rsa with SHA-1 signatures
    &[Algorithm::Rsa { hash: None }],
    &[Algorithm::Dsa],
];

pub const COMPRESSION: &[compression::Name] =
    &[compression::NONE, compression::ZLIB, compression::ZLIB_LEGACY];

fn tiered<T: Clone>(level: SecurityLevel, tiers: &Tiers<T>) -> Vec<T> {
    let depth = match level {
        SecurityLevel::Secure => 1,
        SecurityLevel::Balanced => 2,
        SecurityLevel::LegacyCompatible => 3,
    };
    tiers[..depth].concat()
}

pub fn kex_order(level: SecurityLevel) -> Vec<kex::Name> {
    tiered(level, &KEX)
}

pub fn ciphers(level: SecurityLevel) -> Vec<cipher::Name> {
    tiered(level, &CIPHERS)
}

pub fn macs(level: SecurityLevel) -> Vec<mac::Name> {
    tiered(level, &MACS)
}

pub fn host_key_types(level: SecurityLevel) -> Vec<Algorithm> {
    tiered(level, &HOST_KEYS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_level_extends_the_previous_one() {
        let secure = kex_order(SecurityLevel::Secure);
        let balanced = kex_order(SecurityLevel::Balanced);
        let legacy = kex_order(SecurityLevel::LegacyCompatible);

        assert!(balanced.starts_with(&secure));
        assert!(legacy.starts_with(&balanced));
        assert!(legacy.len() > balanced.len());
    }

    #[test]
    fn only_legacy_offers_dsa_host_keys() {
        assert!(!host_key_types(SecurityLevel::Balanced).contains(&Algorithm::Dsa));
        assert!(host_key_types(SecurityLevel::LegacyCompatible).contains(&Algorithm::Dsa));
    }
}
