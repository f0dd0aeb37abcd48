#![forbid(unsafe_code)]

//! X.509 certificate chain validation.
//!
//! Builds a path from a leaf certificate to one of a set of trust anchors,
//! using the other certificates the token embeds as untrusted
//! intermediates, and verifies each link's signature.  Every issuer on the
//! path must be a CA allowed to sign certificates and must be valid at the
//! verification instant.  The leaf's own validity window is handled by the
//! caller's [`crate::CertificateValidityPolicy`].

use crate::certificate::SignerCertificate;
use chrono::{DateTime, Utc};
use der::{Decode, Encode};
use islogin_core::Error;
use x509_cert::ext::pkix::{BasicConstraints, KeyUsage};
use x509_cert::Certificate;

const MAX_DEPTH: usize = 10;

/// Validate a certificate chain from `leaf` to one of `anchors` at `now`.
pub fn validate_cert_chain(
    leaf: &SignerCertificate,
    intermediates: &[SignerCertificate],
    anchors: &[SignerCertificate],
    now: DateTime<Utc>,
) -> Result<(), Error> {
    if anchors.is_empty() {
        return Err(Error::Untrusted("no trust anchors configured".into()));
    }

    // The leaf itself may be an anchor.
    if anchors.iter().any(|a| a.der() == leaf.der()) {
        return Ok(());
    }

    let mut current = leaf;
    let mut visited: Vec<&[u8]> = vec![leaf.der()];

    for _ in 0..MAX_DEPTH {
        let cert = current.certificate();
        let issuer_der = name_der(&cert.tbs_certificate.issuer)?;
        // Intermediate CAs already on the path below the next issuer.
        let below = visited.len() - 1;

        let anchor = anchors
            .iter()
            .find(|anchor| issued_by(cert, &issuer_der, anchor.certificate()));
        if let Some(anchor) = anchor {
            check_issuer(anchor, IssuerRole::Anchor, below, now)?;
            return Ok(());
        }

        let next = intermediates.iter().find(|ic| {
            !visited.contains(&ic.der()) && issued_by(cert, &issuer_der, ic.certificate())
        });
        match next {
            Some(ic) => {
                check_issuer(ic, IssuerRole::Intermediate, below, now)?;
                visited.push(ic.der());
                current = ic;
            }
            None => {
                return Err(Error::Untrusted(format!(
                    "no path from {} to a trust anchor",
                    leaf.subject()
                )))
            }
        }
    }

    Err(Error::Untrusted("certificate chain too long".into()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IssuerRole {
    Anchor,
    Intermediate,
}

/// Check that `issuer` may sign the certificate below it.
///
/// Intermediates must assert `cA` in basicConstraints.  A configured anchor
/// without the extension is accepted (v1 roots), but one that denies being
/// a CA is not.
fn check_issuer(
    issuer: &SignerCertificate,
    role: IssuerRole,
    below: usize,
    now: DateTime<Utc>,
) -> Result<(), Error> {
    let tbs = &issuer.certificate().tbs_certificate;
    let constraints = tbs
        .get::<BasicConstraints>()
        .map_err(|e| Error::Certificate(format!("invalid basicConstraints in {}: {e}", issuer.subject())))?
        .map(|(_, bc)| bc);

    match (&constraints, role) {
        (Some(bc), _) if bc.ca => {}
        (None, IssuerRole::Anchor) => {}
        _ => {
            return Err(Error::Untrusted(format!(
                "{} is not a CA certificate",
                issuer.subject()
            )))
        }
    }

    if let Some(limit) = constraints.and_then(|bc| bc.path_len_constraint) {
        if below > usize::from(limit) {
            return Err(Error::Untrusted(format!(
                "path length constraint of {} exceeded",
                issuer.subject()
            )));
        }
    }

    let key_usage = tbs
        .get::<KeyUsage>()
        .map_err(|e| Error::Certificate(format!("invalid keyUsage in {}: {e}", issuer.subject())))?;
    if let Some((_, usage)) = key_usage {
        if !usage.key_cert_sign() {
            return Err(Error::Untrusted(format!(
                "{} may not sign certificates",
                issuer.subject()
            )));
        }
    }

    if !issuer.is_valid_at(now)? {
        return Err(Error::Untrusted(format!(
            "issuer {} is outside its validity window",
            issuer.subject()
        )));
    }
    Ok(())
}

fn name_der(name: &x509_cert::name::Name) -> Result<Vec<u8>, Error> {
    name.to_der()
        .map_err(|e| Error::Certificate(format!("failed to encode name: {e}")))
}

/// True when `candidate`'s subject matches `issuer_der` and its key
/// verifies `cert`'s signature.
fn issued_by(cert: &Certificate, issuer_der: &[u8], candidate: &Certificate) -> bool {
    let subject_matches = name_der(&candidate.tbs_certificate.subject)
        .map(|subject| subject == issuer_der)
        .unwrap_or(false);
    subject_matches
        && verify_cert_signature(cert, &candidate.tbs_certificate.subject_public_key_info).is_ok()
}

// sha*WithRSAEncryption
const SHA1_RSA: &str = "1.2.840.113549.1.1.5";
const SHA224_RSA: &str = "1.2.840.113549.1.1.14";
const SHA256_RSA: &str = "1.2.840.113549.1.1.11";
const SHA384_RSA: &str = "1.2.840.113549.1.1.12";
const SHA512_RSA: &str = "1.2.840.113549.1.1.13";
// ecdsa-with-SHA*
const ECDSA_SHA256: &str = "1.2.840.10045.4.3.2";
const ECDSA_SHA384: &str = "1.2.840.10045.4.3.3";
// Named curves
const P256: &str = "1.2.840.10045.3.1.7";
const P384: &str = "1.3.132.0.34";

/// Verify a certificate's signature using the issuer's SPKI.
pub fn verify_cert_signature(
    cert: &Certificate,
    issuer_spki: &spki::SubjectPublicKeyInfoOwned,
) -> Result<(), Error> {
    let tbs_der = cert
        .tbs_certificate
        .to_der()
        .map_err(|e| Error::Certificate(format!("failed to encode TBS: {e}")))?;
    let sig_bytes = cert
        .signature
        .as_bytes()
        .ok_or_else(|| Error::Certificate("no signature bytes".into()))?;
    let spki_der = issuer_spki
        .to_der()
        .map_err(|e| Error::Certificate(format!("failed to encode issuer SPKI: {e}")))?;

    let oid = cert.signature_algorithm.oid.to_string();
    match oid.as_str() {
        SHA1_RSA => verify_rsa_signature::<sha1::Sha1>(&spki_der, &tbs_der, sig_bytes),
        SHA224_RSA => verify_rsa_signature::<sha2::Sha224>(&spki_der, &tbs_der, sig_bytes),
        SHA256_RSA => verify_rsa_signature::<sha2::Sha256>(&spki_der, &tbs_der, sig_bytes),
        SHA384_RSA => verify_rsa_signature::<sha2::Sha384>(&spki_der, &tbs_der, sig_bytes),
        SHA512_RSA => verify_rsa_signature::<sha2::Sha512>(&spki_der, &tbs_der, sig_bytes),
        ECDSA_SHA256 | ECDSA_SHA384 => {
            let curve = issuer_spki
                .algorithm
                .parameters
                .as_ref()
                .and_then(|p| der::asn1::ObjectIdentifier::from_der(p.value()).ok())
                .map(|oid| oid.to_string())
                .unwrap_or_default();
            match curve.as_str() {
                P256 => verify_ecdsa_p256_signature(&spki_der, &tbs_der, sig_bytes),
                P384 => verify_ecdsa_p384_signature(&spki_der, &tbs_der, sig_bytes),
                other => Err(Error::Certificate(format!("unsupported issuer curve: {other}"))),
            }
        }
        _ => Err(Error::Certificate(format!(
            "unsupported certificate signature algorithm: {oid}"
        ))),
    }
}

fn verify_rsa_signature<D>(issuer_spki_der: &[u8], tbs_der: &[u8], signature: &[u8]) -> Result<(), Error>
where
    D: digest::Digest + digest::const_oid::AssociatedOid,
    rsa::pkcs1v15::VerifyingKey<D>: signature::Verifier<rsa::pkcs1v15::Signature>,
{
    use signature::Verifier;
    use spki::DecodePublicKey;

    let public_key = rsa::RsaPublicKey::from_public_key_der(issuer_spki_der)
        .map_err(|e| Error::Certificate(format!("invalid RSA public key: {e}")))?;
    let sig = rsa::pkcs1v15::Signature::try_from(signature)
        .map_err(|e| Error::Certificate(format!("invalid RSA signature: {e}")))?;
    rsa::pkcs1v15::VerifyingKey::<D>::new(public_key)
        .verify(tbs_der, &sig)
        .map_err(|e| Error::Certificate(format!("certificate signature verification failed: {e}")))
}

fn verify_ecdsa_p256_signature(issuer_spki_der: &[u8], tbs_der: &[u8], signature: &[u8]) -> Result<(), Error> {
    use signature::Verifier;
    use spki::DecodePublicKey;

    let vk = p256::ecdsa::VerifyingKey::from_public_key_der(issuer_spki_der)
        .map_err(|e| Error::Certificate(format!("invalid EC P-256 key: {e}")))?;
    let sig = p256::ecdsa::DerSignature::from_bytes(signature)
        .map_err(|e| Error::Certificate(format!("invalid ECDSA signature: {e}")))?;
    vk.verify(tbs_der, &sig)
        .map_err(|e| Error::Certificate(format!("certificate signature verification failed: {e}")))
}

fn verify_ecdsa_p384_signature(issuer_spki_der: &[u8], tbs_der: &[u8], signature: &[u8]) -> Result<(), Error> {
    use signature::Verifier;
    use spki::DecodePublicKey;

    let vk = p384::ecdsa::VerifyingKey::from_public_key_der(issuer_spki_der)
        .map_err(|e| Error::Certificate(format!("invalid EC P-384 key: {e}")))?;
    let sig = p384::ecdsa::DerSignature::from_bytes(signature)
        .map_err(|e| Error::Certificate(format!("invalid ECDSA signature: {e}")))?;
    vk.verify(tbs_der, &sig)
        .map_err(|e| Error::Certificate(format!("certificate signature verification failed: {e}")))
}
