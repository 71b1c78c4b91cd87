use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Serialize a JSON value with recursively sorted object keys.
///
/// Signatures must be reproducible by the receiver from the wire bytes,
/// so the body is rendered in one canonical form regardless of how the
/// source object was assembled.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (index, key) in keys.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                if let Some(child) = map.get(*key) {
                    write_canonical(child, out);
                }
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

/// `X-Webhook-Signature` header value: `sha256=<hex(HMAC_SHA256(secret, body))>`.
///
/// Returns None only if the MAC cannot be keyed, which HMAC permits for
/// any key length; the caller treats that as "deliver unsigned".
pub fn signature_header(secret: &str, body: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body.as_bytes());
    let digest = mac.finalize().into_bytes();
    Some(format!("sha256={}", hex::encode(digest)))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_json_sorts_keys_recursively() {
        let value = json!({
            "zebra": 1,
            "apple": {"y": true, "x": [3, {"b": null, "a": "z"}]},
        });
        assert_eq!(
            canonical_json(&value),
            r#"{"apple":{"x":[3,{"a":"z","b":null}],"y":true},"zebra":1}"#
        );
    }

    #[test]
    fn canonical_json_is_order_independent() {
        let a = json!({"event": "product.created", "data": {"sku": "A-1", "name": "Widget"}});
        let b = json!({"data": {"name": "Widget", "sku": "A-1"}, "event": "product.created"});
        assert_eq!(canonical_json(&a), canonical_json(&b));
    }

    #[test]
    fn canonical_json_escapes_string_values() {
        let value = json!({"name": "line\nbreak \"quoted\""});
        assert_eq!(
            canonical_json(&value),
            r#"{"name":"line\nbreak \"quoted\""}"#
        );
    }

    #[test]
    fn signature_header_has_sha256_prefix_and_hex_digest() {
        let header = signature_header("secret", "{}").unwrap();
        let digest = header.strip_prefix("sha256=").unwrap();
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn same_payload_different_key_order_signs_identically() {
        let a = json!({"b": 2, "a": 1});
        let b = json!({"a": 1, "b": 2});
        assert_eq!(
            signature_header("s3cr3t", &canonical_json(&a)),
            signature_header("s3cr3t", &canonical_json(&b)),
        );
    }
}
