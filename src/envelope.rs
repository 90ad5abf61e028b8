//! Canonical response envelope and backend reply normalization.
//!
//! The backend boundary is not type-safe: depending on the operation (and on
//! the backend's own evolution) a reply may arrive as the canonical
//! `{success, message, data}` shape, a coded `{code, success, data}` shape, a
//! `{status, message, data}` shape, or something else entirely. This module
//! reconciles all of them into one [`Envelope`] before any other component
//! looks at the reply.
//!
//! Normalization is pure, total, and ordered: the first matching shape wins,
//! a missing field degrades to a default instead of failing, and no input —
//! `null`, primitives, arrays, arbitrary objects — ever causes a panic.
//!
//! # Examples
//!
//! ```rust
//! use flowdeck::envelope::Envelope;
//! use serde_json::json;
//!
//! let env = Envelope::normalize(json!({"status": "success", "message": "ok", "data": {"x": 1}}), "boom");
//! assert!(env.success);
//! assert_eq!(env.message, "ok");
//! assert_eq!(env.data, Some(json!({"x": 1})));
//!
//! let env = Envelope::normalize(serde_json::Value::Null, "boom");
//! assert!(!env.success);
//! assert_eq!(env.message, "boom");
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message substituted when a coded reply reports success without one.
pub const GENERIC_SUCCESS: &str = "operation succeeded";

/// Message substituted when a coded reply reports failure without one.
pub const GENERIC_FAILURE: &str = "operation failed";

/// The canonical reply shape every backend response is normalized into.
///
/// `data` is `None` both when the reply carried no payload and when it
/// carried an explicit JSON `null`; callers never distinguish the two.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Envelope {
    /// A successful envelope with an optional payload.
    #[must_use]
    pub fn ok(message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }

    /// A failed envelope carrying only a message.
    #[must_use]
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }

    /// Normalize an arbitrary backend reply into the canonical envelope.
    ///
    /// The matchers are tried in order; the first one that applies wins:
    ///
    /// 1. `null` — failure with `default_error`.
    /// 2. Already canonical (`success` is a boolean and a `message` key is
    ///    present) — returned as-is.
    /// 3. Coded (`code` present and `success` is a boolean) — mapped
    ///    directly, substituting a generic message when absent.
    /// 4. Status (`status` is a string) — success iff `status == "success"`.
    /// 5. Fallback — success inferred from `success`/`ok`/`status`/`code`,
    ///    message from `message`/`msg`, data from `data`/`result`/the whole
    ///    value.
    ///
    /// Normalizing an already-canonical envelope is idempotent.
    #[must_use]
    pub fn normalize(raw: Value, default_error: &str) -> Self {
        if raw.is_null() {
            return Self::fail(default_error);
        }

        let Some(obj) = raw.as_object() else {
            // Primitives and arrays are not envelopes; treat the value itself
            // as an unconfirmed payload.
            return Self {
                success: false,
                message: default_error.to_string(),
                data: Some(raw),
            };
        };

        // Shape 2: already canonical.
        if let Some(success) = obj.get("success").and_then(Value::as_bool)
            && obj.contains_key("message")
        {
            return Self {
                success,
                message: message_text(obj.get("message"), success, default_error),
                data: non_null(obj.get("data")),
            };
        }

        // Shape 3: coded reply.
        if obj.contains_key("code")
            && let Some(success) = obj.get("success").and_then(Value::as_bool)
        {
            return Self {
                success,
                message: message_text(obj.get("message"), success, default_error),
                data: non_null(obj.get("data")),
            };
        }

        // Shape 4: status string.
        if let Some(status) = obj.get("status").and_then(Value::as_str) {
            let success = status == "success";
            return Self {
                success,
                message: message_text(obj.get("message"), success, default_error),
                data: non_null(obj.get("data")),
            };
        }

        // Shape 5: fallback inference over any remaining object.
        let success = obj.get("success").and_then(Value::as_bool) == Some(true)
            || obj.get("ok").and_then(Value::as_bool) == Some(true)
            || obj.get("status").and_then(Value::as_str) == Some("success")
            || obj.get("code").and_then(Value::as_i64) == Some(200);
        let message = message_text(
            obj.get("message").or_else(|| obj.get("msg")),
            success,
            default_error,
        );
        let data = non_null(obj.get("data"))
            .or_else(|| non_null(obj.get("result")))
            .or_else(|| Some(raw.clone()));
        Self {
            success,
            message,
            data,
        }
    }
}

/// Extract a display message, degrading to the generic/default text.
fn message_text(value: Option<&Value>, success: bool, default_error: &str) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => {
            if success {
                GENERIC_SUCCESS.to_string()
            } else {
                default_error.to_string()
            }
        }
        // Non-string messages are kept, serialized compactly.
        Some(other) => other.to_string(),
    }
}

fn non_null(value: Option<&Value>) -> Option<Value> {
    value.filter(|v| !v.is_null()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_reply_uses_default_message() {
        let env = Envelope::normalize(Value::Null, "boom");
        assert_eq!(env, Envelope::fail("boom"));
    }

    #[test]
    fn canonical_reply_passes_through() {
        let env = Envelope::normalize(
            json!({"success": true, "message": "created", "data": {"id": "w1"}}),
            "boom",
        );
        assert!(env.success);
        assert_eq!(env.message, "created");
        assert_eq!(env.data, Some(json!({"id": "w1"})));
    }

    #[test]
    fn canonical_failure_keeps_backend_message() {
        let env = Envelope::normalize(json!({"success": false, "message": "node error"}), "boom");
        assert!(!env.success);
        assert_eq!(env.message, "node error");
        assert_eq!(env.data, None);
    }

    #[test]
    fn coded_reply_substitutes_generic_messages() {
        let env = Envelope::normalize(json!({"code": 200, "success": true, "data": [1, 2]}), "boom");
        assert!(env.success);
        assert_eq!(env.message, GENERIC_SUCCESS);
        assert_eq!(env.data, Some(json!([1, 2])));

        let env = Envelope::normalize(json!({"code": 500, "success": false}), "boom");
        assert!(!env.success);
        assert_eq!(env.message, "boom");
    }

    #[test]
    fn status_reply_maps_success_string() {
        let env = Envelope::normalize(
            json!({"status": "success", "message": "ok", "data": {"x": 1}}),
            "boom",
        );
        assert_eq!(env, Envelope::ok("ok", Some(json!({"x": 1}))));

        let env = Envelope::normalize(json!({"status": "error", "message": "bad"}), "boom");
        assert!(!env.success);
        assert_eq!(env.message, "bad");
    }

    #[test]
    fn fallback_infers_from_loose_keys() {
        let env = Envelope::normalize(json!({"ok": true, "result": {"y": 2}}), "boom");
        assert!(env.success);
        assert_eq!(env.message, GENERIC_SUCCESS);
        assert_eq!(env.data, Some(json!({"y": 2})));

        // Nothing recognizable: the whole object becomes the payload.
        let env = Envelope::normalize(json!({"weird": 1}), "boom");
        assert!(!env.success);
        assert_eq!(env.data, Some(json!({"weird": 1})));
    }

    #[test]
    fn primitives_and_arrays_become_unconfirmed_payloads() {
        for raw in [json!(5), json!("text"), json!(true), json!([1, 2, 3])] {
            let env = Envelope::normalize(raw.clone(), "boom");
            assert!(!env.success);
            assert_eq!(env.message, "boom");
            assert_eq!(env.data, Some(raw));
        }
    }

    #[test]
    fn normalize_is_idempotent_on_canonical_envelopes() {
        let cases = [
            json!({"success": true, "message": "ok", "data": {"a": 1}}),
            json!({"success": false, "message": "nope"}),
        ];
        for raw in cases {
            let once = Envelope::normalize(raw, "boom");
            let twice = Envelope::normalize(
                serde_json::to_value(&once).expect("envelope serializes"),
                "boom",
            );
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn null_data_key_degrades_to_none() {
        let env = Envelope::normalize(json!({"success": true, "message": "ok", "data": null}), "boom");
        assert_eq!(env.data, None);
    }
}
