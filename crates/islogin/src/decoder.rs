#![forbid(unsafe_code)]

//! Token decoding: base64 text to XML text.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use islogin_core::Error;

/// Standard alphabet; trailing `=` padding is optional.
const TOKEN_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode a base64 login token into UTF-8 text.
///
/// ASCII whitespace anywhere in the token is ignored, since form posts and
/// MIME encoders wrap long values.  No XML check happens here.
pub fn decode_token(token: &str) -> Result<String, Error> {
    let compact: String = token.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return Err(Error::Base64("empty token".into()));
    }
    let bytes = TOKEN_ENGINE
        .decode(compact.as_bytes())
        .map_err(|e| Error::Base64(format!("token: {e}")))?;
    String::from_utf8(bytes).map_err(|e| Error::XmlParse(format!("token is not UTF-8: {e}")))
}

/// Encode XML text as a login token.
pub fn encode_token(xml: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(xml.as_bytes())
}
