#![allow(dead_code)]

//! Fixtures and a test-only token signer.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use islogin::c14n::{self, C14nMode};
use islogin::xml::NodeSet;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use sha2::{Digest, Sha256};
use std::fmt::Write;

pub const AUDIENCE: &str = "https://thjonusta.example.is";
pub const DESTINATION: &str = "https://thjonusta.example.is/innskraning";

pub const VALID: &str = include_str!("../../../../test-data/tokens/valid.xml");
pub const EXPIRED_WINDOW: &str = include_str!("../../../../test-data/tokens/expired-window.xml");
pub const EXPIRED_CERTIFICATE: &str = include_str!("../../../../test-data/tokens/expired-certificate.xml");
pub const ROGUE_SIGNER: &str = include_str!("../../../../test-data/tokens/rogue-signer.xml");

pub const IDP_KEY: &str = include_str!("../../../../test-data/keys/idp-key.pem");
pub const IDP_CERT: &str = include_str!("../../../../test-data/keys/idp-cert.pem");
pub const IDP_CHAINED_CERT: &str = include_str!("../../../../test-data/keys/idp-chained-cert.pem");
pub const INTERMEDIATE_CERT: &str = include_str!("../../../../test-data/keys/intermediate-cert.pem");
pub const CA_CERT: &str = include_str!("../../../../test-data/keys/ca-cert.pem");
pub const ROGUE_KEY: &str = include_str!("../../../../test-data/keys/rogue-key.pem");
pub const ROGUE_CERT: &str = include_str!("../../../../test-data/keys/rogue-cert.pem");
/// Issued by the IdP's own end-entity key.
pub const ATTACKER_KEY: &str = include_str!("../../../../test-data/keys/attacker-key.pem");
pub const ATTACKER_CERT: &str = include_str!("../../../../test-data/keys/attacker-cert.pem");

const RESPONSE_ID: &str = "_resp-8d2e";
const ASSERTION_ID: &str = "_assert-3b71";
const STATUS_ID: &str = "_status-c0a5";

/// 2024-05-01T12:01:00Z, inside every fixture window except `EXPIRED_WINDOW`.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 1, 0).unwrap()
}

pub fn encode(xml: &str) -> String {
    STANDARD.encode(xml.as_bytes())
}

/// The base64 body of a PEM certificate, as it appears in `X509Certificate`.
pub fn pem_body(pem: &str) -> String {
    pem.lines().filter(|line| !line.starts_with("-----")).collect()
}

/// Which element the signature's `Reference` points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignedPart {
    Response,
    Assertion,
    Status,
}

impl SignedPart {
    fn id(self) -> &'static str {
        match self {
            Self::Response => RESPONSE_ID,
            Self::Assertion => ASSERTION_ID,
            Self::Status => STATUS_ID,
        }
    }
}

/// Builds and signs a login token shaped like the ones Island.is issues.
/// Signing uses RSA-SHA256; `canonicalization` names both the SignedInfo
/// method and the reference transform.
#[derive(Debug, Clone)]
pub struct TokenBuilder {
    pub destination: Option<String>,
    pub audience: String,
    pub not_before: String,
    pub not_on_or_after: String,
    pub attributes: Vec<(String, Option<String>)>,
    pub signed_part: SignedPart,
    pub canonicalization: C14nMode,
    pub key_pem: String,
    /// Signer first, then chain certificates.
    pub certificates: Vec<String>,
}

impl Default for TokenBuilder {
    fn default() -> Self {
        Self {
            destination: Some(DESTINATION.into()),
            audience: AUDIENCE.into(),
            not_before: "2000-01-01T00:00:00Z".into(),
            not_on_or_after: "2099-12-31T23:59:59Z".into(),
            attributes: [
                ("UserSSN", "1203894569"),
                ("Name", "Jón Jónsson"),
                ("Authentication", "Rafræn símaskilríki"),
                ("Mobile", "888-1234"),
                ("IPAddress", "192.0.2.17"),
                ("UserAgent", "Mozilla/5.0 (X11; Linux x86_64)"),
                ("AuthID", "5f3c1d7e-2a9b-4c8e-b1d0-7e6f5a4b3c2d"),
                ("DestinationSSN", "5206871229"),
            ]
            .into_iter()
            .map(|(name, value)| (name.to_owned(), Some(value.to_owned())))
            .collect(),
            signed_part: SignedPart::Response,
            canonicalization: C14nMode::Exclusive,
            key_pem: IDP_KEY.into(),
            certificates: vec![pem_body(IDP_CERT)],
        }
    }
}

impl TokenBuilder {
    pub fn attributes(mut self, attributes: &[(&str, Option<&str>)]) -> Self {
        self.attributes = attributes
            .iter()
            .map(|(name, value)| ((*name).to_owned(), value.map(str::to_owned)))
            .collect();
        self
    }

    pub fn signer(mut self, key_pem: &str, certificates: &[&str]) -> Self {
        self.key_pem = key_pem.to_owned();
        self.certificates = certificates.iter().map(|pem| pem_body(pem)).collect();
        self
    }

    /// Signed XML text.
    pub fn sign(&self) -> String {
        let unsigned = self.render("", "");
        let digest = STANDARD.encode(Sha256::digest(self.canonical_target(&unsigned)));

        let with_digest = self.render(&digest, "");
        let signed_info = canonical_signed_info(&with_digest, self.canonicalization);
        let key = RsaPrivateKey::from_pkcs8_pem(&self.key_pem).unwrap();
        let signature = SigningKey::<Sha256>::new(key).sign(&signed_info);

        self.render(&digest, &STANDARD.encode(signature.to_vec()))
    }

    /// Signed token, base64 encoded.
    pub fn token(&self) -> String {
        encode(&self.sign())
    }

    fn canonical_target(&self, xml: &str) -> Vec<u8> {
        let doc = roxmltree::Document::parse(xml).unwrap();
        let target = doc
            .descendants()
            .find(|n| n.attribute("ID") == Some(self.signed_part.id()))
            .unwrap();
        let signature = doc
            .descendants()
            .find(|n| n.tag_name().name() == "Signature")
            .unwrap();
        let mut set = NodeSet::tree_without_comments(target);
        set.remove_subtree(signature);
        c14n::canonicalize_doc(&doc, self.canonicalization, Some(&set), &[]).unwrap()
    }

    fn render(&self, digest: &str, signature: &str) -> String {
        let mut xml = String::new();
        xml.push_str("<Response xmlns=\"urn:oasis:names:tc:SAML:2.0:protocol\"");
        if let Some(destination) = &self.destination {
            write!(xml, " Destination=\"{}\"", escape(destination)).unwrap();
        }
        write!(
            xml,
            " ID=\"{RESPONSE_ID}\" IssueInstant=\"2024-05-01T12:00:00Z\" Version=\"2.0\">\
             <Issuer xmlns=\"urn:oasis:names:tc:SAML:2.0:assertion\">https://innskraning.island.is</Issuer>"
        )
        .unwrap();

        write!(
            xml,
            "<Signature xmlns=\"http://www.w3.org/2000/09/xmldsig#\"><SignedInfo>\
             <CanonicalizationMethod Algorithm=\"{c14n}\"/>\
             <SignatureMethod Algorithm=\"http://www.w3.org/2001/04/xmldsig-more#rsa-sha256\"/>\
             <Reference URI=\"#{}\"><Transforms>\
             <Transform Algorithm=\"http://www.w3.org/2000/09/xmldsig#enveloped-signature\"/>\
             <Transform Algorithm=\"{c14n}\"/>\
             </Transforms>\
             <DigestMethod Algorithm=\"http://www.w3.org/2001/04/xmlenc#sha256\"/>\
             <DigestValue>{digest}</DigestValue></Reference></SignedInfo>\
             <SignatureValue>{signature}</SignatureValue><KeyInfo><X509Data>",
            self.signed_part.id(),
            c14n = self.canonicalization.uri(),
        )
        .unwrap();
        for certificate in &self.certificates {
            write!(xml, "<X509Certificate>{certificate}</X509Certificate>").unwrap();
        }
        xml.push_str("</X509Data></KeyInfo></Signature>");

        write!(
            xml,
            "<Status ID=\"{STATUS_ID}\"><StatusCode Value=\"urn:oasis:names:tc:SAML:2.0:status:Success\"/></Status>\
             <Assertion xmlns=\"urn:oasis:names:tc:SAML:2.0:assertion\" ID=\"{ASSERTION_ID}\" \
             IssueInstant=\"2024-05-01T12:00:00Z\" Version=\"2.0\">\
             <Issuer>https://innskraning.island.is</Issuer>\
             <Conditions NotBefore=\"{}\" NotOnOrAfter=\"{}\">\
             <AudienceRestriction><Audience>{}</Audience></AudienceRestriction></Conditions>\
             <AttributeStatement>",
            escape(&self.not_before),
            escape(&self.not_on_or_after),
            escape(&self.audience)
        )
        .unwrap();
        for (name, value) in &self.attributes {
            write!(xml, "<Attribute Name=\"{}\">", escape(name)).unwrap();
            if let Some(value) = value {
                write!(xml, "<AttributeValue>{}</AttributeValue>", escape(value)).unwrap();
            }
            xml.push_str("</Attribute>");
        }
        xml.push_str("</AttributeStatement></Assertion></Response>");
        xml
    }
}

fn canonical_signed_info(xml: &str, mode: C14nMode) -> Vec<u8> {
    let doc = roxmltree::Document::parse(xml).unwrap();
    let signed_info = doc
        .descendants()
        .find(|n| n.tag_name().name() == "SignedInfo")
        .unwrap();
    c14n::canonicalize_subtree(&doc, signed_info, mode, &[]).unwrap()
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
