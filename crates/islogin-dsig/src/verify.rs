#![forbid(unsafe_code)]

//! XML-DSig signature verification.
//!
//! Processing order:
//! 1. Register ID attributes, refusing duplicates
//! 2. Read `SignedInfo`: CanonicalizationMethod, SignatureMethod
//! 3. Decode the signer certificate from `KeyInfo/X509Data`
//! 4. For the single `Reference`: resolve the URI, run transforms, compare
//!    the digest
//! 5. Canonicalize `SignedInfo` and verify `SignatureValue`
//! 6. Apply the trust policy and the certificate validity policy

use crate::context::VerifyContext;
use base64::Engine;
use islogin_c14n::C14nMode;
use islogin_core::{ns, Error};
use islogin_crypto::digest;
use islogin_keys::{CertificateSummary, CertificateValidityPolicy, SignerCertificate};
use islogin_transforms::{TransformData, TransformPipeline};
use islogin_xml::document::{self, collapsed_text, find_child_elements, require_attribute, require_single_child};
use islogin_xml::{xpath, NodeSet, XmlDocument};
use roxmltree::{Node, NodeId};
use serde::Serialize;
use tracing::{debug, trace, warn};

/// Outcome of verifying one signature.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureReport {
    pub is_valid: bool,
    /// Human-readable description of the verdict.
    pub detail: String,
    /// ID value of the element the reference covers, set only when valid.
    pub signed_id: Option<String>,
    /// The signer certificate, whenever it could be decoded.
    pub certificate: Option<CertificateSummary>,
}

impl SignatureReport {
    fn invalid(detail: impl Into<String>, certificate: Option<CertificateSummary>) -> Self {
        Self {
            is_valid: false,
            detail: detail.into(),
            signed_id: None,
            certificate,
        }
    }
}

/// Verify the enveloped signature of a standalone document.
///
/// The signature must be a child of the document element and must
/// reference that element.
pub fn verify(ctx: &VerifyContext, xml: &str) -> SignatureReport {
    let parsed = match XmlDocument::parse(xml.to_owned()) {
        Ok(parsed) => parsed,
        Err(e) => return SignatureReport::invalid(e.to_string(), None),
    };
    let doc = match parsed.parse_doc() {
        Ok(doc) => doc,
        Err(e) => return SignatureReport::invalid(e.to_string(), None),
    };
    let root = doc.root_element();
    let signature = match require_single_child(root, ns::DSIG, ns::node::SIGNATURE) {
        Ok(signature) => signature,
        Err(e) => return SignatureReport::invalid(e.to_string(), None),
    };
    verify_signature(ctx, &doc, signature, &[root.id()])
}

/// Verify `signature` inside `doc`.
///
/// The signature's reference must resolve to one of `allowed_targets`;
/// anything else is reported invalid.  Errors never escape: every fault
/// becomes `is_valid = false` with the fault as detail.
pub fn verify_signature(
    ctx: &VerifyContext,
    doc: &roxmltree::Document<'_>,
    signature: Node<'_, '_>,
    allowed_targets: &[NodeId],
) -> SignatureReport {
    let mut certificate = None;
    match verify_inner(ctx, doc, signature, allowed_targets, &mut certificate) {
        Ok((detail, signed_id)) => {
            debug!(%detail, %signed_id, "signature verified");
            SignatureReport {
                is_valid: true,
                detail,
                signed_id: Some(signed_id),
                certificate,
            }
        }
        Err(e) => {
            debug!(error = %e, "signature rejected");
            SignatureReport::invalid(e.to_string(), certificate)
        }
    }
}

fn verify_inner(
    ctx: &VerifyContext,
    doc: &roxmltree::Document<'_>,
    signature: Node<'_, '_>,
    allowed_targets: &[NodeId],
    summary: &mut Option<CertificateSummary>,
) -> Result<(String, String), Error> {
    let id_map = document::build_id_map(doc)?;

    let signed_info = require_single_child(signature, ns::DSIG, ns::node::SIGNED_INFO)?;
    let c14n_method = require_single_child(signed_info, ns::DSIG, ns::node::CANONICALIZATION_METHOD)?;
    let c14n_mode = C14nMode::require(require_attribute(c14n_method, ns::attr::ALGORITHM)?)?;
    let sig_method = require_single_child(signed_info, ns::DSIG, ns::node::SIGNATURE_METHOD)?;
    let sig_method_uri = require_attribute(sig_method, ns::attr::ALGORITHM)?;
    let sig_alg = islogin_crypto::verify::from_uri(sig_method_uri)?;

    let (signer, chain) = read_certificates(signature)?;
    *summary = Some(signer.summary(ctx.now)?);
    trace!(subject = %signer.subject(), chain = chain.len(), "decoded signer certificate");

    let reference = require_single_child(signed_info, ns::DSIG, ns::node::REFERENCE)?;
    let signed_id = verify_reference(doc, reference, signature, &id_map, allowed_targets)?;

    let prefixes = read_inclusive_prefixes(c14n_method);
    let canonical_signed_info = islogin_c14n::canonicalize_subtree(doc, signed_info, c14n_mode, &prefixes)?;
    let sig_value_node = require_single_child(signature, ns::DSIG, ns::node::SIGNATURE_VALUE)?;
    let sig_value = decode_base64(sig_value_node, "SignatureValue")?;

    let public_key = signer.public_key()?;
    if !sig_alg.verify(&public_key, &canonical_signed_info, &sig_value)? {
        return Err(Error::SignatureInvalid("signature mismatch".into()));
    }
    debug!(algorithm = sig_alg.uri(), key = public_key.kind(), "signature value matches");

    ctx.trust.check(&signer, &chain, ctx.now)?;

    let mut detail = format!("signature valid ({} trust)", ctx.trust.name());
    if !signer.is_valid_at(ctx.now)? {
        let (not_before, not_after) = signer.validity()?;
        let window = format!("signer certificate outside its validity window ({not_before} to {not_after})");
        match ctx.validity {
            CertificateValidityPolicy::Flag => {
                warn!(subject = %signer.subject(), %not_before, %not_after, "signer certificate outside its validity window");
                detail.push_str("; ");
                detail.push_str(&window);
            }
            CertificateValidityPolicy::Enforce => return Err(Error::Certificate(window)),
        }
    }
    Ok((detail, signed_id))
}

/// Check the digest of the single `Reference` and return the ID it covers.
fn verify_reference(
    doc: &roxmltree::Document<'_>,
    reference: Node<'_, '_>,
    signature: Node<'_, '_>,
    id_map: &std::collections::HashMap<String, NodeId>,
    allowed_targets: &[NodeId],
) -> Result<String, Error> {
    let uri = reference.attribute(ns::attr::URI).unwrap_or("");
    let id = xpath::parse_same_document_ref(uri)
        .ok_or_else(|| Error::InvalidUri(format!("only same-document ID references are supported: {uri:?}")))?;
    let target = xpath::resolve_id(doc, id_map, id)?;
    if !allowed_targets.contains(&target.id()) {
        return Err(Error::InvalidUri(format!(
            "reference {uri} does not cover the signed response or assertion"
        )));
    }

    let digest_method = require_single_child(reference, ns::DSIG, ns::node::DIGEST_METHOD)?;
    let digest_uri = require_attribute(digest_method, ns::attr::ALGORITHM)?;
    let digest_value = require_single_child(reference, ns::DSIG, ns::node::DIGEST_VALUE)?;
    let expected = decode_base64(digest_value, "DigestValue")?;

    let mut pipeline = TransformPipeline::new();
    if let Some(transforms) = document::find_child_element(reference, ns::DSIG, ns::node::TRANSFORMS) {
        for transform in find_child_elements(transforms, ns::DSIG, ns::node::TRANSFORM) {
            let transform_uri = require_attribute(transform, ns::attr::ALGORITHM)?;
            pipeline.push(islogin_transforms::from_uri(
                transform_uri,
                signature.id(),
                read_inclusive_prefixes(transform),
            )?);
        }
    }
    trace!(uri, transforms = ?pipeline.uris(), "running reference transforms");

    let octets = pipeline.execute(doc, TransformData::Xml(NodeSet::tree_without_comments(target)))?;
    let computed = digest::digest(digest_uri, &octets)?;
    if !digest::constant_time_eq(&computed, &expected) {
        return Err(Error::DigestMismatch(uri.to_owned()));
    }
    Ok(id.to_owned())
}

/// Decode every `X509Certificate` in `KeyInfo/X509Data`.  The first is the
/// signer; the rest are chain candidates.
fn read_certificates(signature: Node<'_, '_>) -> Result<(SignerCertificate, Vec<SignerCertificate>), Error> {
    let key_info = require_single_child(signature, ns::DSIG, ns::node::KEY_INFO)?;
    let mut certs = find_child_elements(key_info, ns::DSIG, ns::node::X509_DATA)
        .into_iter()
        .flat_map(|data| find_child_elements(data, ns::DSIG, ns::node::X509_CERTIFICATE))
        .map(|node| SignerCertificate::from_base64(&collapsed_text(node)));
    let signer = certs
        .next()
        .ok_or_else(|| Error::MissingElement(ns::node::X509_CERTIFICATE.into()))??;
    let chain = certs.collect::<Result<Vec<_>, _>>()?;
    Ok((signer, chain))
}

fn decode_base64(node: Node<'_, '_>, what: &str) -> Result<Vec<u8>, Error> {
    base64::engine::general_purpose::STANDARD
        .decode(collapsed_text(node))
        .map_err(|e| Error::Base64(format!("{what}: {e}")))
}

fn read_inclusive_prefixes(node: Node<'_, '_>) -> Vec<String> {
    document::find_child_element(node, ns::EXC_C14N, ns::node::INCLUSIVE_NAMESPACES)
        .and_then(|child| child.attribute(ns::attr::PREFIX_LIST))
        .map(|list| list.split_whitespace().map(str::to_owned).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use islogin_keys::{TrustPolicy, TrustedCertificate};

    const VALID: &str = include_str!("../../../test-data/tokens/valid.xml");
    const EXPIRED_CERT: &str = include_str!("../../../test-data/tokens/expired-certificate.xml");
    const ROGUE: &str = include_str!("../../../test-data/tokens/rogue-signer.xml");
    const IDP_PEM: &str = include_str!("../../../test-data/keys/idp-cert.pem");
    const CA_PEM: &str = include_str!("../../../test-data/keys/ca-cert.pem");

    fn ctx() -> VerifyContext {
        VerifyContext::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 1, 0).unwrap())
    }

    #[test]
    fn valid_fixture_verifies() {
        let report = verify(&ctx(), VALID);
        assert!(report.is_valid, "{}", report.detail);
        assert_eq!(report.signed_id.as_deref(), Some("_resp-4f1c9a0e"));
        let cert = report.certificate.unwrap();
        assert!(cert.subject.contains("innskraning.island.is"));
        assert!(cert.within_validity);
    }

    #[test]
    fn tampered_claim_breaks_digest() {
        let tampered = VALID.replace("1203894569", "1203894579");
        let report = verify(&ctx(), &tampered);
        assert!(!report.is_valid);
        assert!(report.detail.contains("digest mismatch"), "{}", report.detail);
        assert_eq!(report.signed_id, None);
        // The certificate was still decoded.
        assert!(report.certificate.is_some());
    }

    #[test]
    fn tampered_signed_info_breaks_signature() {
        let tampered = VALID.replace(
            "<CanonicalizationMethod Algorithm=\"http://www.w3.org/2001/10/xml-exc-c14n#\"></CanonicalizationMethod>",
            "<CanonicalizationMethod Algorithm=\"http://www.w3.org/2001/10/xml-exc-c14n#\"> </CanonicalizationMethod>",
        );
        assert_ne!(tampered, VALID);
        let report = verify(&ctx(), &tampered);
        assert!(!report.is_valid);
        assert!(report.detail.contains("signature mismatch"), "{}", report.detail);
    }

    #[test]
    fn expired_certificate_flagged_or_enforced() {
        let flagged = verify(&ctx(), EXPIRED_CERT);
        assert!(flagged.is_valid, "{}", flagged.detail);
        assert!(flagged.detail.contains("outside its validity window"));
        assert!(!flagged.certificate.unwrap().within_validity);

        let enforced = verify(&ctx().with_validity(CertificateValidityPolicy::Enforce), EXPIRED_CERT);
        assert!(!enforced.is_valid);
        assert!(enforced.detail.contains("outside its validity window"));
    }

    #[test]
    fn trust_policies() {
        assert!(verify(&ctx(), ROGUE).is_valid);

        let pinned = TrustPolicy::Pinned {
            certificates: vec![TrustedCertificate::from_pem(IDP_PEM).unwrap()],
        };
        assert!(verify(&ctx().with_trust(pinned.clone()), VALID).is_valid);
        let report = verify(&ctx().with_trust(pinned), ROGUE);
        assert!(!report.is_valid);
        assert!(report.detail.contains("untrusted"), "{}", report.detail);

        let chain = TrustPolicy::Chain {
            anchors: vec![TrustedCertificate::from_pem(CA_PEM).unwrap()],
        };
        assert!(verify(&ctx().with_trust(chain.clone()), VALID).is_valid);
        assert!(!verify(&ctx().with_trust(chain), ROGUE).is_valid);
    }

    #[test]
    fn reference_must_cover_the_response() {
        let doc_text = VALID.replace("URI=\"#_resp-4f1c9a0e\"", "URI=\"#_assert-77e0b2\"");
        let report = verify(&ctx(), &doc_text);
        assert!(!report.is_valid);
        // Either the target check or the SignedInfo change trips first.
        assert!(
            report.detail.contains("does not cover") || report.detail.contains("signature mismatch"),
            "{}",
            report.detail
        );
    }

    #[test]
    fn missing_signature_parts_are_reported() {
        let no_key_info = {
            let start = VALID.find("<KeyInfo>").unwrap();
            let end = VALID.find("</KeyInfo>").unwrap() + "</KeyInfo>".len();
            format!("{}{}", &VALID[..start], &VALID[end..])
        };
        let report = verify(&ctx(), &no_key_info);
        assert!(!report.is_valid);
        assert!(report.detail.contains("KeyInfo"));
        assert!(report.certificate.is_none());

        let report = verify(&ctx(), "<Response xmlns=\"urn:oasis:names:tc:SAML:2.0:protocol\"/>");
        assert!(!report.is_valid);
        assert!(report.detail.contains("Signature"));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let doc_text = VALID.replace("ID=\"_assert-77e0b2\"", "ID=\"_resp-4f1c9a0e\"");
        let report = verify(&ctx(), &doc_text);
        assert!(!report.is_valid);
        assert!(report.detail.contains("duplicate ID"));
    }
}
