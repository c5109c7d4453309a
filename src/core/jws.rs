use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde_json::Value as Json;

/// Check the protected header of a detached, unencoded-payload JWS as found in the `jws`
/// member of a Linked Data proof, returning its `alg`.
///
/// The header is accepted only when `b64` is `false` AND `crit` lists `"b64"`, as required by
/// [RFC 7797 §6](https://www.rfc-editor.org/rfc/rfc7797#section-6). Any other combination is
/// rejected.
pub fn validate_detached_jws_header(jws: &str) -> Result<String> {
    let (encoded_header, rest) = jws
        .split_once('.')
        .context("JWS is not in compact serialization")?;
    let (payload, _signature) = rest
        .split_once('.')
        .context("JWS is not in compact serialization")?;

    if !payload.is_empty() {
        bail!("JWS payload must be detached");
    }

    let header: Json = URL_SAFE_NO_PAD
        .decode(encoded_header)
        .context("JWS header is not base64url")
        .and_then(|bytes| serde_json::from_slice(&bytes).context("JWS header is not JSON"))?;

    let b64_disabled = header.get("b64").and_then(Json::as_bool) == Some(false);
    let b64_critical = header
        .get("crit")
        .and_then(Json::as_array)
        .is_some_and(|crit| crit.iter().any(|c| c.as_str() == Some("b64")));

    if !(b64_disabled && b64_critical) {
        bail!("JWS header must set \"b64\" to false and list \"b64\" in \"crit\"");
    }

    header
        .get("alg")
        .and_then(Json::as_str)
        .map(ToOwned::to_owned)
        .context("JWS header is missing \"alg\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn detached(header: Json) -> String {
        format!("{}..c2lnbmF0dXJl", URL_SAFE_NO_PAD.encode(header.to_string()))
    }

    #[test]
    fn accepts_unencoded_payload_header() {
        let jws = detached(json!({ "alg": "EdDSA", "b64": false, "crit": ["b64"] }));
        assert_eq!(validate_detached_jws_header(&jws).unwrap(), "EdDSA");
    }

    #[test]
    fn rejects_b64_without_crit() {
        let jws = detached(json!({ "alg": "EdDSA", "b64": false }));
        assert!(validate_detached_jws_header(&jws).is_err());
    }

    #[test]
    fn rejects_crit_with_encoded_payload() {
        let jws = detached(json!({ "alg": "EdDSA", "b64": true, "crit": ["b64"] }));
        assert!(validate_detached_jws_header(&jws).is_err());

        let jws = detached(json!({ "alg": "EdDSA", "crit": ["b64"] }));
        assert!(validate_detached_jws_header(&jws).is_err());
    }

    #[test]
    fn rejects_attached_payload() {
        let header = URL_SAFE_NO_PAD.encode(json!({ "alg": "EdDSA", "b64": false, "crit": ["b64"] }).to_string());
        assert!(validate_detached_jws_header(&format!("{header}.e30.c2ln")).is_err());
    }
}
