#![forbid(unsafe_code)]

//! Structural parsing of a SAML `Response` carrying one signed assertion.
//!
//! Every view is read by fixed, namespace-aware path:
//!
//! ```text
//! Response                          (protocol namespace)
//!   @Destination                    optional
//!   Signature                       exactly one (XML-DSig)
//!     KeyInfo/X509Data/X509Certificate
//!   Assertion                       exactly one (assertion namespace)
//!     Conditions/@NotBefore, @NotOnOrAfter
//!     Conditions/AudienceRestriction/Audience
//!     AttributeStatement/Attribute/@Name, AttributeValue
//! ```
//!
//! The document text is kept exactly as received so the signature check
//! runs over the signed bytes.

use chrono::{DateTime, Utc};
use islogin_core::{ns, Error};
use islogin_dsig::{SignatureReport, VerifyContext};
use islogin_xml::document::{
    collapsed_text, find_child_element, find_child_elements, is_element_named, require_attribute, require_child,
    require_single_child,
};
use islogin_xml::XmlDocument;
use roxmltree::Node;
use tracing::trace;

/// One `saml:Attribute` of the attribute statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    /// Text of the first `AttributeValue`, `None` when there is none.
    pub value: Option<String>,
}

/// `Assertion/Conditions`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conditions {
    /// `None` when the attribute is missing or not an RFC 3339 instant.
    pub not_before: Option<DateTime<Utc>>,
    pub not_on_or_after: Option<DateTime<Utc>>,
    pub audience: String,
}

/// What the signature block declares, read without verifying anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureBlock {
    pub canonicalization_method: Option<String>,
    pub signature_method: Option<String>,
    pub reference_uri: Option<String>,
    pub digest_method: Option<String>,
    pub digest_value: Option<String>,
    pub signature_value: Option<String>,
    /// Base64 DER of the signer certificate.
    pub certificate: String,
    /// Further embedded certificates, candidates for a chain.
    pub chain: Vec<String>,
}

/// A parsed login token.
#[derive(Debug, Clone)]
pub struct AssertionDocument {
    document: XmlDocument,
    /// ID of the `Response` element, if it carries one.
    response_id: Option<String>,
    /// `Response/@Destination`, empty when absent.  Only authenticated when
    /// the signature covers the whole `Response`; see [`Self::signs_response`].
    pub destination: String,
    pub signature: SignatureBlock,
    pub conditions: Conditions,
    pub attributes: Vec<Attribute>,
}

impl AssertionDocument {
    /// Parse the XML text of a token.
    ///
    /// A missing structurally required node is an error; so is a DTD.
    pub fn parse(xml: String) -> Result<Self, Error> {
        let document = XmlDocument::parse(xml)?;
        let doc = document.parse_doc()?;
        let located = locate(&doc)?;

        let response_id = ns::attr::ID_ATTRS
            .iter()
            .find_map(|name| located.response.attribute(*name))
            .map(str::to_owned);
        let destination = located.response.attribute(ns::attr::DESTINATION).unwrap_or("").to_owned();
        let signature = read_signature_block(located.signature)?;
        let conditions = read_conditions(located.assertion)?;
        let attributes = read_attributes(located.assertion)?;
        trace!(
            attributes = attributes.len(),
            chain = signature.chain.len(),
            "parsed login token"
        );
        drop(doc);

        Ok(Self {
            document,
            response_id,
            destination,
            signature,
            conditions,
            attributes,
        })
    }

    /// The document text exactly as received.
    pub fn text(&self) -> &str {
        self.document.text()
    }

    /// Verify the enveloped signature.  The reference must cover the
    /// `Response` or the `Assertion` these claims came from.
    pub fn verify_signature(&self, ctx: &VerifyContext) -> SignatureReport {
        let doc = match self.document.parse_doc() {
            Ok(doc) => doc,
            Err(e) => return invalid_report(e),
        };
        let located = match locate(&doc) {
            Ok(located) => located,
            Err(e) => return invalid_report(e),
        };
        let allowed = [located.response.id(), located.assertion.id()];
        islogin_dsig::verify_signature(ctx, &doc, located.signature, &allowed)
    }

    /// Whether a valid `report` covers the `Response` element itself, and
    /// with it everything outside the `Assertion`.
    pub fn signs_response(&self, report: &SignatureReport) -> bool {
        report.is_valid && report.signed_id.is_some() && report.signed_id == self.response_id
    }
}

fn invalid_report(e: Error) -> SignatureReport {
    SignatureReport {
        is_valid: false,
        detail: e.to_string(),
        signed_id: None,
        certificate: None,
    }
}

struct Located<'a, 'input> {
    response: Node<'a, 'input>,
    signature: Node<'a, 'input>,
    assertion: Node<'a, 'input>,
}

fn locate<'a, 'input>(doc: &'a roxmltree::Document<'input>) -> Result<Located<'a, 'input>, Error> {
    let response = doc.root_element();
    if !is_element_named(response, ns::SAML_PROTOCOL, ns::node::RESPONSE) {
        return Err(Error::XmlStructure(format!(
            "document element is {{{}}}{}, expected a SAML protocol Response",
            response.tag_name().namespace().unwrap_or(""),
            response.tag_name().name()
        )));
    }
    Ok(Located {
        response,
        signature: require_single_child(response, ns::DSIG, ns::node::SIGNATURE)?,
        assertion: require_single_child(response, ns::SAML_ASSERTION, ns::node::ASSERTION)?,
    })
}

fn read_signature_block(signature: Node<'_, '_>) -> Result<SignatureBlock, Error> {
    let key_info = require_child(signature, ns::DSIG, ns::node::KEY_INFO)?;
    let mut certificates = find_child_elements(key_info, ns::DSIG, ns::node::X509_DATA)
        .into_iter()
        .flat_map(|data| find_child_elements(data, ns::DSIG, ns::node::X509_CERTIFICATE))
        .map(collapsed_text);
    let certificate = certificates
        .next()
        .ok_or_else(|| Error::MissingElement(ns::node::X509_CERTIFICATE.into()))?;
    let chain = certificates.collect();

    let signed_info = find_child_element(signature, ns::DSIG, ns::node::SIGNED_INFO);
    let reference = dsig_child(signed_info, ns::node::REFERENCE);

    Ok(SignatureBlock {
        canonicalization_method: algorithm(dsig_child(signed_info, ns::node::CANONICALIZATION_METHOD)),
        signature_method: algorithm(dsig_child(signed_info, ns::node::SIGNATURE_METHOD)),
        reference_uri: reference.and_then(|r| r.attribute(ns::attr::URI)).map(str::to_owned),
        digest_method: algorithm(dsig_child(reference, ns::node::DIGEST_METHOD)),
        digest_value: dsig_child(reference, ns::node::DIGEST_VALUE).map(collapsed_text),
        signature_value: find_child_element(signature, ns::DSIG, ns::node::SIGNATURE_VALUE).map(collapsed_text),
        certificate,
        chain,
    })
}

fn dsig_child<'a, 'input>(parent: Option<Node<'a, 'input>>, name: &str) -> Option<Node<'a, 'input>> {
    parent.and_then(|p| find_child_element(p, ns::DSIG, name))
}

fn algorithm(node: Option<Node<'_, '_>>) -> Option<String> {
    node.and_then(|n| n.attribute(ns::attr::ALGORITHM)).map(str::to_owned)
}

fn read_conditions(assertion: Node<'_, '_>) -> Result<Conditions, Error> {
    let conditions = require_child(assertion, ns::SAML_ASSERTION, ns::node::CONDITIONS)?;
    let restriction = require_child(conditions, ns::SAML_ASSERTION, ns::node::AUDIENCE_RESTRICTION)?;
    let audience = require_child(restriction, ns::SAML_ASSERTION, ns::node::AUDIENCE)?;
    Ok(Conditions {
        not_before: parse_instant(conditions.attribute(ns::attr::NOT_BEFORE)),
        not_on_or_after: parse_instant(conditions.attribute(ns::attr::NOT_ON_OR_AFTER)),
        audience: element_text(audience),
    })
}

fn read_attributes(assertion: Node<'_, '_>) -> Result<Vec<Attribute>, Error> {
    let statement = require_child(assertion, ns::SAML_ASSERTION, ns::node::ATTRIBUTE_STATEMENT)?;
    find_child_elements(statement, ns::SAML_ASSERTION, ns::node::ATTRIBUTE)
        .into_iter()
        .map(|attribute| {
            Ok(Attribute {
                name: require_attribute(attribute, ns::attr::NAME)?.to_owned(),
                value: find_child_element(attribute, ns::SAML_ASSERTION, ns::node::ATTRIBUTE_VALUE)
                    .map(element_text),
            })
        })
        .collect()
}

/// Character data of an element, verbatim.
fn element_text(node: Node<'_, '_>) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}

fn parse_instant(value: Option<&str>) -> Option<DateTime<Utc>> {
    let value = value?;
    DateTime::parse_from_rfc3339(value.trim())
        .map(|instant| instant.with_timezone(&Utc))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const VALID: &str = include_str!("../../../test-data/tokens/valid.xml");

    fn parse(xml: &str) -> Result<AssertionDocument, Error> {
        AssertionDocument::parse(xml.to_owned())
    }

    fn cut(xml: &str, open: &str, close: &str) -> String {
        let start = xml.find(open).unwrap();
        let end = xml.find(close).unwrap() + close.len();
        format!("{}{}", &xml[..start], &xml[end..])
    }

    #[test]
    fn reads_every_view() {
        let token = parse(VALID).unwrap();
        assert_eq!(token.destination, "https://thjonusta.example.is/innskraning");
        assert_eq!(token.conditions.audience, "https://thjonusta.example.is");
        assert_eq!(
            token.conditions.not_before,
            Some(Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            token.conditions.not_on_or_after,
            Some(Utc.with_ymd_and_hms(2099, 12, 31, 23, 59, 59).unwrap())
        );
        assert_eq!(token.attributes.len(), 9);
        assert_eq!(
            token.attributes[0],
            Attribute {
                name: "UserSSN".into(),
                value: Some("1203894569".into())
            }
        );
        assert!(token.signature.certificate.starts_with("MIID"));
        assert!(token.signature.chain.is_empty());
        assert_eq!(token.signature.reference_uri.as_deref(), Some("#_resp-4f1c9a0e"));
        assert_eq!(
            token.signature.signature_method.as_deref(),
            Some("http://www.w3.org/2001/04/xmldsig-more#rsa-sha256")
        );
        assert_eq!(token.text(), VALID);
    }

    #[test]
    fn missing_destination_is_empty() {
        let xml = VALID.replace(" Destination=\"https://thjonusta.example.is/innskraning\"", "");
        assert_eq!(parse(&xml).unwrap().destination, "");
    }

    #[test]
    fn unparseable_timestamps_are_absent() {
        let xml = VALID.replace("NotBefore=\"2000-01-01T00:00:00Z\"", "NotBefore=\"yesterday\"");
        let token = parse(&xml).unwrap();
        assert_eq!(token.conditions.not_before, None);
        assert!(token.conditions.not_on_or_after.is_some());
    }

    #[test]
    fn fractional_and_offset_timestamps() {
        assert_eq!(
            parse_instant(Some("2024-05-01T12:00:00.250Z")),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + chrono::Duration::milliseconds(250))
        );
        assert_eq!(
            parse_instant(Some("2024-05-01T14:00:00+02:00")),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
        );
        assert_eq!(parse_instant(None), None);
    }

    #[test]
    fn attribute_without_value() {
        let xml = VALID.replace(
            "<AttributeValue xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" xsi:type=\"xs:string\">888-1234</AttributeValue>",
            "",
        );
        let token = parse(&xml).unwrap();
        let mobile = token.attributes.iter().find(|a| a.name == "Mobile").unwrap();
        assert_eq!(mobile.value, None);
    }

    #[test]
    fn attribute_without_name_fails() {
        let xml = VALID.replace("Name=\"UserSSN\"", "");
        assert!(matches!(parse(&xml), Err(Error::MissingAttribute(_))));
    }

    #[test]
    fn structural_failures() {
        let cases = [
            cut(VALID, "<Signature", "</Signature>"),
            cut(VALID, "<KeyInfo>", "</KeyInfo>"),
            cut(VALID, "<Conditions", "</Conditions>"),
            cut(VALID, "<AudienceRestriction>", "</AudienceRestriction>"),
            cut(VALID, "<AttributeStatement>", "</AttributeStatement>"),
            cut(VALID, "<Assertion ", "</Assertion>"),
        ];
        for xml in cases {
            let err = parse(&xml).unwrap_err();
            assert!(err.is_structural(), "{err}");
        }
    }

    #[test]
    fn foreign_root_is_refused() {
        let err = parse("<Response xmlns=\"urn:example\"/>").unwrap_err();
        assert!(err.to_string().contains("expected a SAML protocol Response"));
    }

    #[test]
    fn repeated_assertion_is_refused() {
        let start = VALID.find("<Assertion ").unwrap();
        let end = VALID.find("</Response>").unwrap();
        let assertion = &VALID[start..end];
        let xml = VALID.replace("</Response>", &format!("{assertion}</Response>"));
        assert!(matches!(parse(&xml), Err(Error::XmlStructure(_))));
    }

    #[test]
    fn local_name_in_wrong_namespace_is_not_found() {
        let xml = VALID.replace(
            "<Assertion xmlns=\"urn:oasis:names:tc:SAML:2.0:assertion\"",
            "<Assertion xmlns=\"urn:example:assertion\"",
        );
        assert!(matches!(parse(&xml), Err(Error::MissingElement(_))));
    }

    #[test]
    fn truncated_and_dtd_documents_fail_to_parse() {
        let truncated = &VALID[..VALID.find("<Status>").unwrap()];
        assert!(matches!(parse(truncated), Err(Error::XmlParse(_))));
        let dtd = "<!DOCTYPE Response [<!ENTITY a \"b\">]><Response/>";
        assert!(matches!(parse(dtd), Err(Error::XmlParse(_))));
    }

    #[test]
    fn signature_checks_over_original_text() {
        let ctx = VerifyContext::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 1, 0).unwrap());
        let token = parse(VALID).unwrap();
        let report = token.verify_signature(&ctx);
        assert!(report.is_valid, "{}", report.detail);
        assert!(token.signs_response(&report));
    }

    #[test]
    fn invalid_report_never_covers_the_response() {
        let ctx = VerifyContext::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 1, 0).unwrap());
        let token = parse(&VALID.replace("1203894569", "1203894579")).unwrap();
        let report = token.verify_signature(&ctx);
        assert!(!report.is_valid);
        assert!(!token.signs_response(&report));
    }
}
