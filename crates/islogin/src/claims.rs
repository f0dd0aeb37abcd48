#![forbid(unsafe_code)]

//! Claim extraction: the attribute statement as a user profile.

use crate::assertion::AssertionDocument;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use tracing::warn;

/// Attribute names copied into the profile.
pub mod names {
    pub const USER_SSN: &str = "UserSSN";
    pub const MOBILE: &str = "Mobile";
    pub const NAME: &str = "Name";
    pub const IP_ADDRESS: &str = "IPAddress";
    pub const USER_AGENT: &str = "UserAgent";
    pub const AUTH_ID: &str = "AuthID";
    pub const AUTHENTICATION: &str = "Authentication";
    pub const DESTINATION_SSN: &str = "DestinationSSN";
}

/// The authenticated user.  Claims the token does not carry are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub kennitala: String,
    /// Phone number with its first `-` removed.
    pub mobile: String,
    pub fullname: String,
    pub ip: String,
    pub user_agent: String,
    #[serde(rename = "destinationSSN")]
    pub destination_ssn: String,
    pub auth_id: String,
    pub authentication_method: String,
    /// The audience the token was issued for.
    pub audience_url: String,
    pub date: ValidityWindow,
}

/// `Conditions` validity window of the token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidityWindow {
    pub not_before: Option<DateTime<Utc>>,
    pub not_on_or_after: Option<DateTime<Utc>>,
}

/// Build the profile from a parsed token.
///
/// Names are case-sensitive and unknown names are ignored.  When a name
/// repeats, the first occurrence wins.
pub fn extract(token: &AssertionDocument) -> UserProfile {
    let mut profile = UserProfile {
        audience_url: token.conditions.audience.clone(),
        date: ValidityWindow {
            not_before: token.conditions.not_before,
            not_on_or_after: token.conditions.not_on_or_after,
        },
        ..UserProfile::default()
    };

    let mut seen = HashSet::new();
    for attribute in &token.attributes {
        let field = match attribute.name.as_str() {
            names::USER_SSN => &mut profile.kennitala,
            names::MOBILE => &mut profile.mobile,
            names::NAME => &mut profile.fullname,
            names::IP_ADDRESS => &mut profile.ip,
            names::USER_AGENT => &mut profile.user_agent,
            names::AUTH_ID => &mut profile.auth_id,
            names::AUTHENTICATION => &mut profile.authentication_method,
            names::DESTINATION_SSN => &mut profile.destination_ssn,
            _ => continue,
        };
        if !seen.insert(attribute.name.as_str()) {
            warn!(name = %attribute.name, "repeated attribute ignored");
            continue;
        }
        let value = attribute.value.as_deref().unwrap_or("");
        *field = if attribute.name == names::MOBILE {
            value.replacen('-', "", 1)
        } else {
            value.to_owned()
        };
    }
    profile
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertion::Attribute;

    const VALID: &str = include_str!("../../../test-data/tokens/valid.xml");

    fn token() -> AssertionDocument {
        AssertionDocument::parse(VALID.to_owned()).unwrap()
    }

    fn with_attributes(attributes: &[(&str, Option<&str>)]) -> UserProfile {
        let mut token = token();
        token.attributes = attributes
            .iter()
            .map(|(name, value)| Attribute {
                name: (*name).to_owned(),
                value: value.map(str::to_owned),
            })
            .collect();
        extract(&token)
    }

    #[test]
    fn fixture_profile() {
        let profile = extract(&token());
        assert_eq!(profile.kennitala, "1203894569");
        assert_eq!(profile.fullname, "Jón Jónsson");
        assert_eq!(profile.mobile, "8881234");
        assert_eq!(profile.ip, "192.0.2.17");
        assert_eq!(profile.user_agent, "Mozilla/5.0 (X11; Linux x86_64)");
        assert_eq!(profile.auth_id, "5f3c1d7e-2a9b-4c8e-b1d0-7e6f5a4b3c2d");
        assert_eq!(profile.authentication_method, "Rafræn símaskilríki");
        assert_eq!(profile.destination_ssn, "5206871229");
        assert_eq!(profile.audience_url, "https://thjonusta.example.is");
        assert!(profile.date.not_before.is_some());
    }

    #[test]
    fn only_first_hyphen_is_removed() {
        let profile = with_attributes(&[("Mobile", Some("+354-888-1234"))]);
        assert_eq!(profile.mobile, "+354888-1234");
    }

    #[test]
    fn absent_claims_are_empty() {
        let profile = with_attributes(&[("UserSSN", Some("1203894569")), ("Mobile", None)]);
        assert_eq!(profile.kennitala, "1203894569");
        assert_eq!(profile.mobile, "");
        assert_eq!(profile.fullname, "");
        assert_eq!(profile.destination_ssn, "");
    }

    #[test]
    fn first_occurrence_wins() {
        let profile = with_attributes(&[("Name", Some("Jón Jónsson")), ("Name", Some("Gunnar Gunnarsson"))]);
        assert_eq!(profile.fullname, "Jón Jónsson");
    }

    #[test]
    fn names_are_case_sensitive() {
        let profile = with_attributes(&[("userssn", Some("1203894569")), ("NAME", Some("Jón"))]);
        assert_eq!(profile, with_attributes(&[]));
    }

    #[test]
    fn serializes_with_wire_names() {
        let json = serde_json::to_value(extract(&token())).unwrap();
        assert_eq!(json["kennitala"], "1203894569");
        assert_eq!(json["destinationSSN"], "5206871229");
        assert_eq!(json["userAgent"], "Mozilla/5.0 (X11; Linux x86_64)");
        assert_eq!(json["authenticationMethod"], "Rafræn símaskilríki");
        assert_eq!(json["date"]["notOnOrAfter"], "2099-12-31T23:59:59Z");
    }
}
