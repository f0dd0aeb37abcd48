#![forbid(unsafe_code)]

//! Signature verification algorithms (RSA PKCS#1 v1.5, RSA-PSS, ECDSA).
//!
//! `rsa-sha1` is only available with the `legacy-algorithms` feature.

use islogin_core::{algorithm, Error};
use signature::Verifier;

/// Public key material taken from a signer certificate.
#[derive(Debug, Clone)]
pub enum PublicKey {
    Rsa(rsa::RsaPublicKey),
    EcP256(p256::ecdsa::VerifyingKey),
    EcP384(p384::ecdsa::VerifyingKey),
}

impl PublicKey {
    /// Short human-readable key type, used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Rsa(_) => "RSA",
            Self::EcP256(_) => "EC P-256",
            Self::EcP384(_) => "EC P-384",
        }
    }
}

/// Trait for signature algorithms.
pub trait SignatureAlgorithm: Send + Sync {
    fn uri(&self) -> &'static str;
    /// Return `Ok(false)` for a well-formed signature that does not verify,
    /// and an error when the key or signature cannot be used at all.
    fn verify(&self, key: &PublicKey, data: &[u8], signature: &[u8]) -> Result<bool, Error>;
}

/// Create a signature algorithm from its URI.
pub fn from_uri(uri: &str) -> Result<Box<dyn SignatureAlgorithm>, Error> {
    match uri {
        #[cfg(feature = "legacy-algorithms")]
        algorithm::RSA_SHA1 => Ok(Box::new(RsaPkcs1v15 { uri: algorithm::RSA_SHA1, hash: HashType::Sha1 })),
        algorithm::RSA_SHA224 => Ok(Box::new(RsaPkcs1v15 { uri: algorithm::RSA_SHA224, hash: HashType::Sha224 })),
        algorithm::RSA_SHA256 => Ok(Box::new(RsaPkcs1v15 { uri: algorithm::RSA_SHA256, hash: HashType::Sha256 })),
        algorithm::RSA_SHA384 => Ok(Box::new(RsaPkcs1v15 { uri: algorithm::RSA_SHA384, hash: HashType::Sha384 })),
        algorithm::RSA_SHA512 => Ok(Box::new(RsaPkcs1v15 { uri: algorithm::RSA_SHA512, hash: HashType::Sha512 })),

        algorithm::RSA_PSS_SHA256 => Ok(Box::new(RsaPss { uri: algorithm::RSA_PSS_SHA256, hash: HashType::Sha256 })),
        algorithm::RSA_PSS_SHA384 => Ok(Box::new(RsaPss { uri: algorithm::RSA_PSS_SHA384, hash: HashType::Sha384 })),
        algorithm::RSA_PSS_SHA512 => Ok(Box::new(RsaPss { uri: algorithm::RSA_PSS_SHA512, hash: HashType::Sha512 })),

        algorithm::ECDSA_SHA256 => Ok(Box::new(EcdsaP256)),
        algorithm::ECDSA_SHA384 => Ok(Box::new(EcdsaP384)),

        _ => Err(Error::UnsupportedAlgorithm(format!("signature algorithm: {uri}"))),
    }
}

/// URIs accepted by [`from_uri`].
pub const SUPPORTED: &[&str] = &[
    #[cfg(feature = "legacy-algorithms")]
    algorithm::RSA_SHA1,
    algorithm::RSA_SHA224,
    algorithm::RSA_SHA256,
    algorithm::RSA_SHA384,
    algorithm::RSA_SHA512,
    algorithm::RSA_PSS_SHA256,
    algorithm::RSA_PSS_SHA384,
    algorithm::RSA_PSS_SHA512,
    algorithm::ECDSA_SHA256,
    algorithm::ECDSA_SHA384,
];

#[derive(Debug, Clone, Copy)]
enum HashType {
    #[cfg(feature = "legacy-algorithms")]
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

fn rsa_key(key: &PublicKey) -> Result<&rsa::RsaPublicKey, Error> {
    match key {
        PublicKey::Rsa(pk) => Ok(pk),
        other => Err(Error::Key(format!("RSA key required, certificate holds {}", other.kind()))),
    }
}

// ── RSA PKCS#1 v1.5 ─────────────────────────────────────────────────

struct RsaPkcs1v15 {
    uri: &'static str,
    hash: HashType,
}

impl SignatureAlgorithm for RsaPkcs1v15 {
    fn uri(&self) -> &'static str {
        self.uri
    }

    fn verify(&self, key: &PublicKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool, Error> {
        let public_key = rsa_key(key)?;
        let sig = rsa::pkcs1v15::Signature::try_from(sig_bytes)
            .map_err(|e| Error::Crypto(format!("invalid RSA signature: {e}")))?;
        macro_rules! do_verify {
            ($hasher:ty) => {{
                let vk = rsa::pkcs1v15::VerifyingKey::<$hasher>::new(public_key.clone());
                Ok(vk.verify(data, &sig).is_ok())
            }};
        }
        match self.hash {
            #[cfg(feature = "legacy-algorithms")]
            HashType::Sha1 => do_verify!(sha1::Sha1),
            HashType::Sha224 => do_verify!(sha2::Sha224),
            HashType::Sha256 => do_verify!(sha2::Sha256),
            HashType::Sha384 => do_verify!(sha2::Sha384),
            HashType::Sha512 => do_verify!(sha2::Sha512),
        }
    }
}

// ── RSA-PSS ──────────────────────────────────────────────────────────

struct RsaPss {
    uri: &'static str,
    hash: HashType,
}

impl SignatureAlgorithm for RsaPss {
    fn uri(&self) -> &'static str {
        self.uri
    }

    fn verify(&self, key: &PublicKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool, Error> {
        let public_key = rsa_key(key)?;
        let sig = rsa::pss::Signature::try_from(sig_bytes)
            .map_err(|e| Error::Crypto(format!("invalid RSA-PSS signature: {e}")))?;
        macro_rules! do_verify {
            ($hasher:ty) => {{
                let vk = rsa::pss::VerifyingKey::<$hasher>::new(public_key.clone());
                Ok(vk.verify(data, &sig).is_ok())
            }};
        }
        match self.hash {
            HashType::Sha256 => do_verify!(sha2::Sha256),
            HashType::Sha384 => do_verify!(sha2::Sha384),
            HashType::Sha512 => do_verify!(sha2::Sha512),
            other => Err(Error::UnsupportedAlgorithm(format!("RSA-PSS with {other:?}"))),
        }
    }
}

// ── ECDSA ────────────────────────────────────────────────────────────

struct EcdsaP256;

/// Convert an XML-DSig ECDSA `r||s` value to a typed P-256 signature.
pub fn xmldsig_to_p256(rs: &[u8]) -> Result<p256::ecdsa::Signature, Error> {
    if rs.len() != 64 {
        return Err(Error::Crypto(format!("P-256 signature must be 64 bytes, got {}", rs.len())));
    }
    p256::ecdsa::Signature::from_slice(rs).map_err(|e| Error::Crypto(format!("invalid P-256 signature: {e}")))
}

impl SignatureAlgorithm for EcdsaP256 {
    fn uri(&self) -> &'static str {
        algorithm::ECDSA_SHA256
    }

    fn verify(&self, key: &PublicKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool, Error> {
        let PublicKey::EcP256(vk) = key else {
            return Err(Error::Key(format!("P-256 key required, certificate holds {}", key.kind())));
        };
        let sig = xmldsig_to_p256(sig_bytes)?;
        Ok(vk.verify(data, &sig).is_ok())
    }
}

struct EcdsaP384;

/// Convert an XML-DSig ECDSA `r||s` value to a typed P-384 signature.
pub fn xmldsig_to_p384(rs: &[u8]) -> Result<p384::ecdsa::Signature, Error> {
    if rs.len() != 96 {
        return Err(Error::Crypto(format!("P-384 signature must be 96 bytes, got {}", rs.len())));
    }
    p384::ecdsa::Signature::from_slice(rs).map_err(|e| Error::Crypto(format!("invalid P-384 signature: {e}")))
}

impl SignatureAlgorithm for EcdsaP384 {
    fn uri(&self) -> &'static str {
        algorithm::ECDSA_SHA384
    }

    fn verify(&self, key: &PublicKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool, Error> {
        let PublicKey::EcP384(vk) = key else {
            return Err(Error::Key(format!("P-384 key required, certificate holds {}", key.kind())));
        };
        let sig = xmldsig_to_p384(sig_bytes)?;
        Ok(vk.verify(data, &sig).is_ok())
    }
}
