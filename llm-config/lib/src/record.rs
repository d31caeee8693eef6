//! Persisted credential records and resolved flow results.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A base URL / API key pair as written to a [`CredentialStore`](crate::CredentialStore).
///
/// Serializes as `{"baseUrl": "...", "apiKey": "..."}`. Use [`CredentialRecord::parse`]
/// to read stored values, which also understands the older `baseURL` spelling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    /// Root endpoint of the service, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    /// Bearer token. Empty for services that allow anonymous access.
    pub api_key: String,
}

/// Raw shape of a stored record before normalization.
///
/// Values stay untyped so a wrong type is "no record" rather than a hard error.
#[derive(Debug, Deserialize)]
struct StoredRecord {
    #[serde(rename = "baseUrl")]
    base_url: Option<Value>,
    #[serde(rename = "baseURL")]
    base_url_legacy: Option<Value>,
    #[serde(rename = "apiKey")]
    api_key: Option<Value>,
}

impl CredentialRecord {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Parses a stored value into a record.
    ///
    /// Returns `None` for anything that is not a JSON object with a string
    /// `apiKey` and a string `baseUrl` (or, failing that, `baseURL`).
    ///
    /// ## Examples
    ///
    /// ```
    /// use llm_config_lib::CredentialRecord;
    ///
    /// let record = CredentialRecord::parse(r#"{"baseURL":"https://x/v1","apiKey":"k"}"#).unwrap();
    /// assert_eq!(record.base_url, "https://x/v1");
    /// assert!(CredentialRecord::parse("not json").is_none());
    /// ```
    pub fn parse(raw: &str) -> Option<Self> {
        let stored: StoredRecord = serde_json::from_str(raw).ok()?;
        let Some(Value::String(api_key)) = stored.api_key else {
            return None;
        };

        let base_url = match (stored.base_url, stored.base_url_legacy) {
            (Some(Value::String(url)), _) => url,
            (_, Some(Value::String(url))) => url,
            _ => return None,
        };

        Some(Self { base_url, api_key })
    }

    /// Serializes the record in its canonical stored form.
    pub fn to_json(&self) -> String {
        serde_json::json!({ "baseUrl": self.base_url, "apiKey": self.api_key }).to_string()
    }
}

/// The result of a successful flow: validated credentials plus the models the
/// service reported for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedCredentials {
    pub base_url: String,
    pub api_key: String,
    /// Model ids in the order the service listed them.
    pub models: Vec<String>,
}

impl ResolvedCredentials {
    pub(crate) fn from_record(record: CredentialRecord, models: Vec<String>) -> Self {
        Self {
            base_url: record.base_url,
            api_key: record.api_key,
            models,
        }
    }

    /// Returns the credential half of the result.
    pub fn record(&self) -> CredentialRecord {
        CredentialRecord::new(self.base_url.clone(), self.api_key.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_field_names() {
        let record = CredentialRecord::parse(r#"{"baseUrl":"https://x/v1","apiKey":"k"}"#);
        assert_eq!(record, Some(CredentialRecord::new("https://x/v1", "k")));
    }

    #[test]
    fn parses_legacy_base_url_spelling() {
        let record = CredentialRecord::parse(r#"{"baseURL":"https://api.openai.com/v1","apiKey":""}"#);
        assert_eq!(
            record,
            Some(CredentialRecord::new("https://api.openai.com/v1", ""))
        );
    }

    #[test]
    fn canonical_name_wins_when_both_present() {
        let raw = r#"{"baseUrl":"https://new/v1","baseURL":"https://old/v1","apiKey":"k"}"#;
        assert_eq!(CredentialRecord::parse(raw).unwrap().base_url, "https://new/v1");
    }

    #[test]
    fn falls_back_to_legacy_when_canonical_is_not_a_string() {
        let raw = r#"{"baseUrl":42,"baseURL":"https://old/v1","apiKey":"k"}"#;
        assert_eq!(CredentialRecord::parse(raw).unwrap().base_url, "https://old/v1");
    }

    #[test]
    fn rejects_unusable_values() {
        for raw in [
            "",
            "null",
            "[]",
            "\"https://x\"",
            "{not json",
            r#"{"baseUrl":"https://x/v1"}"#,
            r#"{"baseUrl":"https://x/v1","apiKey":null}"#,
            r#"{"baseUrl":"https://x/v1","apiKey":7}"#,
            r#"{"apiKey":"k"}"#,
        ] {
            assert!(CredentialRecord::parse(raw).is_none(), "accepted {raw:?}");
        }
    }

    #[test]
    fn writes_canonical_field_names_only() {
        let json = CredentialRecord::new("https://x/v1", "k").to_json();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["baseUrl"], "https://x/v1");
        assert_eq!(value["apiKey"], "k");
        assert!(value.get("baseURL").is_none());
    }

    #[test]
    fn resolved_serializes_camel_case() {
        let resolved = ResolvedCredentials::from_record(
            CredentialRecord::new("https://x/v1", ""),
            vec!["m1".to_string()],
        );
        let value = serde_json::to_value(&resolved).unwrap();
        assert_eq!(value["baseUrl"], "https://x/v1");
        assert_eq!(value["models"][0], "m1");
        assert_eq!(resolved.record(), CredentialRecord::new("https://x/v1", ""));
    }
}
