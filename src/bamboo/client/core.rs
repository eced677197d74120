use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, Proxy};
use serde_json::Value;
use url::Url;

use crate::auth::Token;
use crate::config::ConnectionSettings;
use crate::error::{BambooError, Result};

const API_PATH: &str = "/rest/api/latest";

/// Query parameters for a Bamboo request.
///
/// Absent values are skipped, so optional tool arguments can be passed
/// straight through without building the query by hand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query(Vec<(String, String)>);

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.0.push((key.into(), value.to_string()));
        self
    }

    pub fn opt<V: ToString>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.set(key, value),
            None => self,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// HTTP transport for the Bamboo REST API.
///
/// Holds an immutable client configured once from [`ConnectionSettings`];
/// every call is independent and there is no retry policy.
#[derive(Clone)]
pub struct BambooClient {
    client: Client,
    api_root: String,
    token: Token,
}

impl BambooClient {
    pub fn new(settings: &ConnectionSettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut builder = Client::builder()
            .user_agent(concat!("bamboo-mcp/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers);

        if let Some(proxy_url) = &settings.proxy_url {
            let proxy = Proxy::all(proxy_url.as_str())
                .map_err(|e| BambooError::Config(format!("Invalid proxy URL: {e}")))?;
            builder = builder.proxy(proxy);
        }

        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|e| BambooError::Config(format!("Failed to create HTTP client: {e}")))?;

        let base_url = settings.base_url.trim_end_matches('/');
        Url::parse(base_url).map_err(|e| BambooError::Config(format!("Invalid base URL: {e}")))?;

        Ok(Self {
            client,
            api_root: format!("{base_url}{API_PATH}"),
            token: settings.token.clone(),
        })
    }

    /// Root all request paths are appended to (`<base>/rest/api/latest`).
    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    fn endpoint_url(&self, path: &str, query: &Query) -> Result<Url> {
        let mut url = Url::parse(&format!("{}{path}", self.api_root))
            .map_err(|e| BambooError::Config(format!("Invalid request path {path}: {e}")))?;

        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.pairs());
        }

        Ok(url)
    }

    /// Issue one authenticated request and return the parsed JSON body.
    ///
    /// Non-2xx responses become [`BambooError::Api`] carrying the status and
    /// raw body text. An empty 2xx body yields `{}`.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: &Query,
        body: Option<&Value>,
    ) -> Result<Value> {
        let url = self.endpoint_url(path, query)?;
        debug!("{method} {url}");

        let mut request = self
            .client
            .request(method.clone(), url)
            .bearer_auth(self.token.as_str());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            warn!("{method} {path} failed with status {status}");
            return Err(BambooError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }

        Ok(serde_json::from_str(&text)?)
    }

    pub async fn get(&self, path: &str, query: &Query) -> Result<Value> {
        self.request(Method::GET, path, query, None).await
    }

    pub async fn post(&self, path: &str, query: &Query) -> Result<Value> {
        self.request(Method::POST, path, query, None).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value> {
        self.request(Method::DELETE, path, &Query::new(), None).await
    }

    /// Fetch and decode a response into a typed view.
    pub(in crate::bamboo) async fn get_as<T>(&self, path: &str, query: &Query) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let value = self.get(path, query).await?;
        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bamboo::test_support::client_for;
    use mockito::Matcher;
    use serde_json::json;

    #[test]
    fn test_query_skips_absent_values() {
        let query = Query::new()
            .opt("expand", Some("plans"))
            .opt::<u32>("start-index", None)
            .set("max-result", 5);

        let pairs: Vec<_> = query.pairs().collect();
        assert_eq!(pairs, vec![("expand", "plans"), ("max-result", "5")]);
    }

    #[test]
    fn test_trailing_slash_is_stripped() {
        let settings =
            ConnectionSettings::new("https://bamboo.example.com/", Token::from("test-token"));
        let client = BambooClient::new(&settings).unwrap();
        assert_eq!(
            client.api_root(),
            "https://bamboo.example.com/rest/api/latest"
        );
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let settings = ConnectionSettings::new("not a url", Token::from("test-token"));
        let result = BambooClient::new(&settings);
        assert!(matches!(result, Err(BambooError::Config(_))));
    }

    #[test]
    fn test_proxy_and_timeout_are_accepted() {
        let mut settings =
            ConnectionSettings::new("https://bamboo.example.com", Token::from("test-token"));
        settings.proxy_url = Some("http://proxy.example.com:8080".into());
        settings.timeout = Some(std::time::Duration::from_secs(5));
        assert!(BambooClient::new(&settings).is_ok());
    }

    #[tokio::test]
    async fn test_request_sends_bearer_token_and_parses_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/rest/api/latest/info")
            .match_header("authorization", "Bearer test-token")
            .match_header("accept", "application/json")
            .with_status(200)
            .with_body(r#"{"version":"9.2.1","state":"RUNNING"}"#)
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server);
        let value = client.get("/info", &Query::new()).await.unwrap();

        assert_eq!(value, json!({"version": "9.2.1", "state": "RUNNING"}));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_request_encodes_query_parameters() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/rest/api/latest/search/plans")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("searchTerm".into(), "my plan".into()),
                Matcher::UrlEncoded("fuzzy".into(), "true".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"size":0}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let query = Query::new().set("searchTerm", "my plan").set("fuzzy", true);
        client.get("/search/plans", &query).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_success_body_becomes_empty_object() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/rest/api/latest/plan/PROJ-PLAN1/enable")
            .with_status(204)
            .create_async()
            .await;

        let client = client_for(&server);
        let value = client
            .post("/plan/PROJ-PLAN1/enable", &Query::new())
            .await
            .unwrap();

        assert_eq!(value, json!({}));
    }

    #[tokio::test]
    async fn test_non_success_status_is_api_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/rest/api/latest/plan/INVALID-KEY")
            .with_status(404)
            .with_body("Plan not found")
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client
            .get("/plan/INVALID-KEY", &Query::new())
            .await
            .unwrap_err();

        match &err {
            BambooError::Api { status, body } => {
                assert_eq!(*status, 404);
                assert_eq!(body, "Plan not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.to_string(), "Bamboo API error (404): Plan not found");
    }

    #[tokio::test]
    async fn test_malformed_body_is_json_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/rest/api/latest/server")
            .with_status(200)
            .with_body("<html>login</html>")
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.get("/server", &Query::new()).await.unwrap_err();
        assert!(matches!(err, BambooError::Json(_)));
    }
}
