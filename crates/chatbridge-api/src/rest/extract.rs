//! Request parsing helpers

use axum::http::{header, HeaderMap};
use chatbridge_core::{BridgeError, ChannelId, Result, TenantContext, DEFAULT_TENANT};
use serde::Deserialize;
use serde_json::Value;

/// Header selecting the tenant; absent means the default tenant
pub const TENANT_HEADER: &str = "x-bridge-tenant";

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Tenant context of a request
pub fn tenant_context(headers: &HeaderMap) -> TenantContext {
    let tenant = header_value(headers, TENANT_HEADER).unwrap_or(DEFAULT_TENANT);
    let ctx = TenantContext::new(tenant);
    match header_value(headers, REQUEST_ID_HEADER) {
        Some(request_id) => ctx.with_request_id(request_id),
        None => ctx,
    }
}

/// Token from the token header, else from `Authorization: Bearer`.
///
/// Tokens are passed through untrimmed; only an empty value counts as absent.
pub fn header_token(headers: &HeaderMap, token_header: &str) -> Option<String> {
    if let Some(token) = raw_header_value(headers, token_header) {
        return Some(token.to_string());
    }

    raw_header_value(headers, header::AUTHORIZATION.as_str())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
        .map(String::from)
}

/// Header token, falling back to one supplied with the request data
pub fn request_token(
    headers: &HeaderMap,
    token_header: &str,
    fallback: Option<String>,
) -> Option<String> {
    header_token(headers, token_header).or(fallback.filter(|t| !t.is_empty()))
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    raw_header_value(headers, name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn raw_header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

/// Channel id as sent by clients: a number or a numeric string
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawChannelId {
    Number(i64),
    Text(String),
}

impl RawChannelId {
    pub fn parse(&self) -> Result<ChannelId> {
        let id = match self {
            RawChannelId::Number(id) => *id,
            RawChannelId::Text(raw) => raw
                .trim()
                .parse::<i64>()
                .map_err(|_| BridgeError::BadRequest(format!("invalid channel_id: {}", raw)))?,
        };

        if id <= 0 {
            return Err(BridgeError::BadRequest(format!("invalid channel_id: {}", id)));
        }
        Ok(ChannelId::new(id))
    }
}

/// Context blob as sent by clients: objects are serialized, strings stored as-is
pub fn context_blob(context: Option<Value>) -> Result<Option<String>> {
    match context {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) => Ok(Some(raw)),
        Some(value) => Ok(Some(serde_json::to_string(&value)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_tenant_context() {
        assert_eq!(tenant_context(&HeaderMap::new()).tenant_id, DEFAULT_TENANT);

        let ctx = tenant_context(&headers(&[
            (TENANT_HEADER, "acme"),
            (REQUEST_ID_HEADER, "req-1"),
        ]));
        assert_eq!(ctx.tenant_id, "acme");
        assert_eq!(ctx.request_id.as_deref(), Some("req-1"));
    }

    #[test]
    fn test_token_sources() {
        let both = headers(&[("x-n8n-token", "header"), ("authorization", "Bearer bearer")]);
        assert_eq!(header_token(&both, "X-N8N-Token").as_deref(), Some("header"));

        let bearer = headers(&[("authorization", "Bearer bearer")]);
        assert_eq!(header_token(&bearer, "X-N8N-Token").as_deref(), Some("bearer"));

        let basic = headers(&[("authorization", "Basic abc")]);
        assert_eq!(header_token(&basic, "X-N8N-Token"), None);

        assert_eq!(
            request_token(&HeaderMap::new(), "X-N8N-Token", Some("body".into())).as_deref(),
            Some("body")
        );
        assert_eq!(
            request_token(&bearer, "X-N8N-Token", Some("body".into())).as_deref(),
            Some("bearer")
        );
    }

    #[test]
    fn test_tokens_are_not_trimmed() {
        let padded = headers(&[("x-n8n-token", "secret ")]);
        assert_eq!(header_token(&padded, "X-N8N-Token").as_deref(), Some("secret "));

        let bearer = headers(&[("authorization", "Bearer  secret")]);
        assert_eq!(header_token(&bearer, "X-N8N-Token").as_deref(), Some(" secret"));

        assert_eq!(
            request_token(&HeaderMap::new(), "X-N8N-Token", Some(" secret\n".into())).as_deref(),
            Some(" secret\n")
        );
        assert_eq!(request_token(&HeaderMap::new(), "X-N8N-Token", Some(String::new())), None);
    }

    #[test]
    fn test_channel_id_forms() {
        let number: RawChannelId = serde_json::from_value(json!(42)).unwrap();
        let text: RawChannelId = serde_json::from_value(json!(" 42 ")).unwrap();
        assert_eq!(number.parse().unwrap(), ChannelId::new(42));
        assert_eq!(text.parse().unwrap(), ChannelId::new(42));

        assert!(RawChannelId::Text("abc".into()).parse().is_err());
        assert!(RawChannelId::Number(0).parse().is_err());
    }

    #[test]
    fn test_context_blob() {
        assert_eq!(context_blob(None).unwrap(), None);
        assert_eq!(context_blob(Some(Value::Null)).unwrap(), None);
        assert_eq!(
            context_blob(Some(json!("{\"a\":1}"))).unwrap().as_deref(),
            Some("{\"a\":1}")
        );
        assert_eq!(
            context_blob(Some(json!({"a": 1}))).unwrap().as_deref(),
            Some("{\"a\":1}")
        );
    }
}
