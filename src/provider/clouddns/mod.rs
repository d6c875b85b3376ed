mod error;
mod provider;
mod types;

pub use error::{ClientError, ProviderError};
pub use provider::CloudDnsProvider;

use log::{debug, info};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
use types::{
    ApiErrorBody, CreateTxtRecordRequest, DomainDetail, LoginRequest, LoginResponse,
    PublishRequest, RecordEntry, SearchBlock, SearchRequest, SearchResponse,
};

pub const CLOUDDNS_API_BASE: &str = "https://admin.vshosting.cloud/clouddns";
pub const CLOUDDNS_LOGIN_URL: &str = "https://admin.vshosting.cloud/api/public/auth/login";

const TXT: &str = "TXT";

#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub email: String,
    pub password: String,
}

pub struct Client<T = ReqwestTransport> {
    transport: T,
    credentials: Credentials,
    ttl: u32,
    api_base_url: String,
    login_url: String,
    access_token: Mutex<Option<String>>,
}

impl<T: HttpTransport> Client<T> {
    pub fn new(transport: T, credentials: Credentials, ttl: u32) -> Self {
        Self {
            transport,
            credentials,
            ttl,
            api_base_url: CLOUDDNS_API_BASE.to_string(),
            login_url: CLOUDDNS_LOGIN_URL.to_string(),
            access_token: Mutex::new(None),
        }
    }

    pub fn with_endpoints(mut self, api_base_url: &str, login_url: &str) -> Self {
        self.api_base_url = api_base_url.trim_end_matches('/').to_string();
        self.login_url = login_url.to_string();
        self
    }

    /// Creates a TXT record in `zone` and publishes the zone.
    pub async fn add_record(
        &self,
        zone: &str,
        record_name: &str,
        record_value: &str,
    ) -> Result<(), ClientError> {
        let domain_id = self.get_domain_id(zone).await?;
        self.add_txt_record(&domain_id, record_name, record_value)
            .await?;
        self.publish_records(&domain_id).await?;

        info!("Added TXT record {} to zone {}", record_name, zone);
        Ok(())
    }

    pub async fn delete_record(&self, zone: &str, record_name: &str) -> Result<(), ClientError> {
        let domain_id = self.get_domain_id(zone).await?;
        let record_id = self.get_record_id(&domain_id, record_name).await?;
        self.delete_record_by_id(&record_id).await?;
        self.publish_records(&domain_id).await?;

        info!("Deleted TXT record {} from zone {}", record_name, zone);
        Ok(())
    }

    async fn get_domain_id(&self, zone: &str) -> Result<String, ClientError> {
        let search = SearchRequest {
            search: vec![
                SearchBlock::eq("clientId", &self.credentials.client_id),
                SearchBlock::eq("domainName", zone),
            ],
        };

        let response = self
            .api_request(Method::POST, "domain/search", Some(&search))
            .await?;
        let result: SearchResponse = decode("domain search", &response)?;

        let domain_id = result
            .items
            .into_iter()
            .next()
            .map(|item| item.id)
            .ok_or_else(|| ClientError::DomainNotFound {
                zone: zone.to_string(),
            })?;

        debug!("Zone {} resolved to domain {}", zone, domain_id);
        Ok(domain_id)
    }

    // Last matching TXT entry wins.
    async fn get_record_id(&self, domain_id: &str, record_name: &str) -> Result<String, ClientError> {
        let endpoint = format!("domain/{}", domain_id);
        let response = self.api_request(Method::GET, &endpoint, NO_BODY).await?;
        let detail: DomainDetail = decode("domain detail", &response)?;

        let found = detail
            .last_domain_record_list
            .into_iter()
            .rev()
            .find(|entry| entry.name == record_name && entry.record_type == TXT);

        match found {
            Some(RecordEntry { id: Some(id), .. }) => Ok(id),
            Some(_) => Err(ClientError::Decode {
                context: "domain detail",
                detail: format!("record {} has no id", record_name),
            }),
            None => Err(ClientError::RecordNotFound {
                domain_id: domain_id.to_string(),
                name: record_name.to_string(),
            }),
        }
    }

    async fn add_txt_record(
        &self,
        domain_id: &str,
        record_name: &str,
        record_value: &str,
    ) -> Result<(), ClientError> {
        let record = CreateTxtRecordRequest {
            domain_id,
            name: record_name,
            value: record_value,
            record_type: TXT,
        };

        self.api_request(Method::POST, "record-txt", Some(&record))
            .await?;
        Ok(())
    }

    async fn delete_record_by_id(&self, record_id: &str) -> Result<(), ClientError> {
        let endpoint = format!("record/{}", record_id);
        self.api_request(Method::DELETE, &endpoint, NO_BODY).await?;
        Ok(())
    }

    async fn publish_records(&self, domain_id: &str) -> Result<(), ClientError> {
        let endpoint = format!("domain/{}/publish", domain_id);
        let publish = PublishRequest { soa_ttl: self.ttl };

        self.api_request(Method::PUT, &endpoint, Some(&publish))
            .await?;
        Ok(())
    }

    async fn access_token(&self) -> Result<String, ClientError> {
        // Held across the login so concurrent callers wait for a single login.
        let mut cached = self.access_token.lock().await;
        if let Some(token) = cached.as_deref().filter(|t| !t.is_empty()) {
            return Ok(token.to_string());
        }

        let token = self.login().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    async fn login(&self) -> Result<String, ClientError> {
        debug!("Logging in to CloudDNS as {}", self.credentials.email);

        let body = serde_json::to_string(&LoginRequest {
            email: &self.credentials.email,
            password: &self.credentials.password,
        })?;
        let request = HttpRequest::new(Method::POST, self.login_url.as_str())
            .header("Content-Type", "application/json")
            .body(body);

        let response = self.execute(request).await?;
        let result: LoginResponse = decode("login", &response)?;

        info!("Logged in to CloudDNS");
        Ok(result.auth.access_token)
    }

    async fn api_request<B: Serialize>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
    ) -> Result<String, ClientError> {
        let token = self.access_token().await?;
        let url = format!("{}/{}", self.api_base_url, endpoint);

        let mut request = HttpRequest::new(method, url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", token));
        if let Some(body) = body {
            request = request.body(serde_json::to_string(body)?);
        }

        self.execute(request).await
    }

    async fn execute(&self, request: HttpRequest) -> Result<String, ClientError> {
        let url = request.url.clone();
        debug!("{} {}", request.method, url);

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| ClientError::Transport {
                url: url.clone(),
                detail: e.to_string(),
            })?;

        if response.status >= 400 {
            return Err(read_error(&url, response));
        }

        Ok(response.body)
    }
}

const NO_BODY: Option<&()> = None;

fn read_error(url: &str, response: HttpResponse) -> ClientError {
    match serde_json::from_str::<ApiErrorBody>(&response.body) {
        Ok(api_error) => {
            debug!(
                "CloudDNS API error: HTTP {} {}: {}",
                response.status, api_error.code, api_error.message
            );
            ClientError::Api {
                status: response.status,
                code: api_error.code,
                message: api_error.message,
            }
        }
        Err(e) => ClientError::UnreadableBody {
            url: url.to_string(),
            body: response.body,
            detail: e.to_string(),
        },
    }
}

fn decode<T: DeserializeOwned>(context: &'static str, body: &str) -> Result<T, ClientError> {
    serde_json::from_str(body).map_err(|e| {
        debug!("Failed to parse CloudDNS {} response: {}", context, e);
        ClientError::Decode {
            context,
            detail: e.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{json, Value};

    use super::*;
    use crate::transport::mock::ScriptedTransport;

    const API: &str = "https://api.test/clouddns";
    const LOGIN: &str = "https://auth.test/login";

    fn client(transport: &Arc<ScriptedTransport>) -> Client<Arc<ScriptedTransport>> {
        let credentials = Credentials {
            client_id: "client-1".to_string(),
            email: "user@example.com".to_string(),
            password: "secret".to_string(),
        };
        Client::new(transport.clone(), credentials, 300).with_endpoints(API, LOGIN)
    }

    async fn authenticated_client(
        transport: &Arc<ScriptedTransport>,
    ) -> Client<Arc<ScriptedTransport>> {
        let client = client(transport);
        *client.access_token.lock().await = Some("cached-token".to_string());
        client
    }

    fn body_json(request: &HttpRequest) -> Value {
        serde_json::from_str(request.body.as_deref().unwrap()).unwrap()
    }

    const DOMAIN_SEARCH: &str = r#"{"items":[{"id":"dom-1"}]}"#;

    #[tokio::test]
    async fn test_first_call_logs_in() {
        let transport = ScriptedTransport::new();
        transport
            .respond(200, r#"{"auth":{"accessToken":"tok-123"}}"#)
            .respond(200, DOMAIN_SEARCH);

        let client = client(&transport);
        let domain_id = client.get_domain_id("example.com.").await.unwrap();

        assert_eq!(domain_id, "dom-1");
        let requests = transport.requests();
        assert_eq!(requests.len(), 2);

        assert_eq!(requests[0].method, Method::POST);
        assert_eq!(requests[0].url, LOGIN);
        assert_eq!(requests[0].header_value("Authorization"), None);
        assert_eq!(
            body_json(&requests[0]),
            json!({"email": "user@example.com", "password": "secret"})
        );

        assert_eq!(
            requests[1].header_value("Authorization"),
            Some("Bearer tok-123")
        );
        assert_eq!(
            requests[1].header_value("Content-Type"),
            Some("application/json")
        );
    }

    #[tokio::test]
    async fn test_token_is_reused() {
        let transport = ScriptedTransport::new();
        transport
            .respond(200, r#"{"auth":{"accessToken":"tok-123"}}"#)
            .respond(200, DOMAIN_SEARCH)
            .respond(200, DOMAIN_SEARCH);

        let client = client(&transport);
        client.get_domain_id("example.com.").await.unwrap();
        client.get_domain_id("example.com.").await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests.iter().filter(|r| r.url == LOGIN).count(), 1);
        assert_eq!(
            requests[2].header_value("Authorization"),
            Some("Bearer tok-123")
        );
    }

    #[tokio::test]
    async fn test_existing_token_skips_login() {
        let transport = ScriptedTransport::new();
        transport.respond(200, DOMAIN_SEARCH);

        let client = authenticated_client(&transport).await;
        client.get_domain_id("example.com.").await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, format!("{}/domain/search", API));
        assert_eq!(
            requests[0].header_value("Authorization"),
            Some("Bearer cached-token")
        );
    }

    #[tokio::test]
    async fn test_failed_login_stores_no_token() {
        let transport = ScriptedTransport::new();
        transport
            .respond(401, r#"{"code":"UNAUTHORIZED","message":"bad credentials"}"#)
            .respond(200, r#"{"auth":{"accessToken":"tok-2"}}"#)
            .respond(200, DOMAIN_SEARCH);

        let client = client(&transport);
        let err = client.get_domain_id("example.com.").await.unwrap_err();
        assert!(matches!(err, ClientError::Api { status: 401, .. }));
        assert!(client.access_token.lock().await.is_none());

        // The next call tries to log in again.
        client.get_domain_id("example.com.").await.unwrap();
        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[1].url, LOGIN);
    }

    #[tokio::test]
    async fn test_login_response_without_token() {
        let transport = ScriptedTransport::new();
        transport.respond(200, r#"{"auth":{}}"#);

        let client = client(&transport);
        let err = client.add_record("example.com.", "a", "b").await.unwrap_err();

        assert!(matches!(err, ClientError::Decode { context: "login", .. }));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_add_record() {
        let transport = ScriptedTransport::new();
        transport
            .respond(200, DOMAIN_SEARCH)
            .respond(201, r#"{"id":"rec-9"}"#)
            .respond(200, "{}");

        let client = authenticated_client(&transport).await;
        client
            .add_record("example.com.", "_acme-challenge.example.com.", "abc123")
            .await
            .unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 3);

        assert_eq!(requests[0].method, Method::POST);
        assert_eq!(requests[0].url, format!("{}/domain/search", API));
        assert_eq!(
            body_json(&requests[0]),
            json!({"search": [
                {"name": "clientId", "operator": "eq", "value": "client-1"},
                {"name": "domainName", "operator": "eq", "value": "example.com."}
            ]})
        );

        assert_eq!(requests[1].method, Method::POST);
        assert_eq!(requests[1].url, format!("{}/record-txt", API));
        assert_eq!(
            body_json(&requests[1]),
            json!({
                "domainId": "dom-1",
                "name": "_acme-challenge.example.com.",
                "value": "abc123",
                "type": "TXT"
            })
        );

        assert_eq!(requests[2].method, Method::PUT);
        assert_eq!(requests[2].url, format!("{}/domain/dom-1/publish", API));
        assert_eq!(body_json(&requests[2]), json!({"soaTtl": 300}));
    }

    #[tokio::test]
    async fn test_publish_ttl_is_stable() {
        let transport = ScriptedTransport::new();
        for _ in 0..2 {
            transport
                .respond(200, DOMAIN_SEARCH)
                .respond(201, "{}")
                .respond(200, "{}");
        }

        let client = authenticated_client(&transport).await;
        client.add_record("example.com.", "a.example.com.", "1").await.unwrap();
        client.add_record("example.com.", "b.example.com.", "2").await.unwrap();

        let publishes: Vec<Value> = transport
            .requests()
            .iter()
            .filter(|r| r.method == Method::PUT)
            .map(body_json)
            .collect();
        assert_eq!(publishes, vec![json!({"soaTtl": 300}), json!({"soaTtl": 300})]);
    }

    #[tokio::test]
    async fn test_add_record_stops_at_first_failure() {
        let transport = ScriptedTransport::new();
        transport
            .respond(200, DOMAIN_SEARCH)
            .respond(400, r#"{"code":"INVALID","message":"bad record"}"#);

        let client = authenticated_client(&transport).await;
        let err = client
            .add_record("example.com.", "_acme-challenge.example.com.", "abc")
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "HTTP 400: INVALID: bad record");
        // No publish after the failed create.
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_record_picks_last_match() {
        let transport = ScriptedTransport::new();
        transport
            .respond(200, DOMAIN_SEARCH)
            .respond(
                200,
                json!({"lastDomainRecordList": [
                    {"id": "rec-1", "name": "_acme-challenge.example.com.", "type": "TXT"},
                    {"id": "rec-a", "name": "_acme-challenge.example.com.", "type": "A"},
                    {"id": "rec-2", "name": "_acme-challenge.example.com.", "type": "TXT"},
                    {"name": "example.com.", "type": "SOA"}
                ]})
                .to_string(),
            )
            .respond(200, "{}")
            .respond(200, "{}");

        let client = authenticated_client(&transport).await;
        client
            .delete_record("example.com.", "_acme-challenge.example.com.")
            .await
            .unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 4);
        assert_eq!(requests[1].method, Method::GET);
        assert_eq!(requests[1].url, format!("{}/domain/dom-1", API));
        assert_eq!(requests[2].method, Method::DELETE);
        assert_eq!(requests[2].url, format!("{}/record/rec-2", API));
        assert!(requests[2].body.is_none());
        assert_eq!(requests[3].url, format!("{}/domain/dom-1/publish", API));
    }

    #[tokio::test]
    async fn test_delete_missing_record() {
        let transport = ScriptedTransport::new();
        transport.respond(200, DOMAIN_SEARCH).respond(
            200,
            r#"{"lastDomainRecordList":[{"id":"rec-1","name":"other.example.com.","type":"TXT"}]}"#,
        );

        let client = authenticated_client(&transport).await;
        let err = client
            .delete_record("example.com.", "_acme-challenge.example.com.")
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::RecordNotFound { .. }));
        assert!(transport
            .requests()
            .iter()
            .all(|r| r.method != Method::DELETE));
    }

    #[tokio::test]
    async fn test_domain_not_found() {
        let transport = ScriptedTransport::new();
        transport.respond(200, r#"{"items":[]}"#);

        let client = authenticated_client(&transport).await;
        let err = client.add_record("missing.com.", "a", "b").await.unwrap_err();

        assert!(matches!(err, ClientError::DomainNotFound { ref zone } if zone == "missing.com."));
    }

    #[tokio::test]
    async fn test_malformed_search_response() {
        let transport = ScriptedTransport::new();
        transport.respond(200, r#"{"items":[{"id":42}]}"#);

        let client = authenticated_client(&transport).await;
        let err = client.get_domain_id("example.com.").await.unwrap_err();

        assert!(matches!(
            err,
            ClientError::Decode {
                context: "domain search",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_api_error_message() {
        let transport = ScriptedTransport::new();
        transport.respond(403, r#"{"code":"FORBIDDEN","message":"no access"}"#);

        let client = authenticated_client(&transport).await;
        let err = client.get_domain_id("example.com.").await.unwrap_err();
        let text = err.to_string();

        assert!(text.contains("403"));
        assert!(text.contains("FORBIDDEN"));
        assert!(text.contains("no access"));
    }

    #[tokio::test]
    async fn test_unreadable_error_body() {
        let transport = ScriptedTransport::new();
        transport
            .respond(200, DOMAIN_SEARCH)
            .respond(502, "Bad Gateway");

        let client = authenticated_client(&transport).await;
        let err = client
            .delete_record("example.com.", "_acme-challenge.example.com.")
            .await
            .unwrap_err();
        let text = err.to_string();

        assert!(matches!(err, ClientError::UnreadableBody { .. }));
        assert!(text.contains(&format!("{}/domain/dom-1", API)));
        assert!(text.contains("Bad Gateway"));
    }

    #[tokio::test]
    async fn test_unreadable_html_error_body() {
        let html = "<html>\n<body class=\"err\">Bad Gateway</body>\n</html>";
        let transport = ScriptedTransport::new();
        transport.respond(502, html);

        let client = authenticated_client(&transport).await;
        let err = client.get_domain_id("example.com.").await.unwrap_err();
        let text = err.to_string();

        assert!(matches!(err, ClientError::UnreadableBody { .. }));
        assert!(text.contains(&format!("{}/domain/search", API)));
        assert!(text.contains(html));
    }

    #[tokio::test]
    async fn test_search_response_without_items() {
        let transport = ScriptedTransport::new();
        transport.respond(200, r#"{"total":0}"#);

        let client = authenticated_client(&transport).await;
        let err = client.get_domain_id("example.com.").await.unwrap_err();

        assert!(matches!(
            err,
            ClientError::Decode {
                context: "domain search",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_domain_detail_without_record_list() {
        let transport = ScriptedTransport::new();
        transport
            .respond(200, DOMAIN_SEARCH)
            .respond(200, r#"{"id":"dom-1"}"#);

        let client = authenticated_client(&transport).await;
        let err = client
            .delete_record("example.com.", "_acme-challenge.example.com.")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ClientError::Decode {
                context: "domain detail",
                ..
            }
        ));
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_matching_record_without_id() {
        let transport = ScriptedTransport::new();
        transport.respond(200, DOMAIN_SEARCH).respond(
            200,
            r#"{"lastDomainRecordList":[{"name":"_acme-challenge.example.com.","type":"TXT"}]}"#,
        );

        let client = authenticated_client(&transport).await;
        let err = client
            .delete_record("example.com.", "_acme-challenge.example.com.")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ClientError::Decode {
                context: "domain detail",
                ..
            }
        ));
        assert!(transport
            .requests()
            .iter()
            .all(|r| r.method != Method::DELETE));
    }

    #[tokio::test]
    async fn test_transport_failure() {
        let transport = ScriptedTransport::new();
        transport.fail("connection reset");

        let client = authenticated_client(&transport).await;
        let err = client.get_domain_id("example.com.").await.unwrap_err();

        assert!(matches!(err, ClientError::Transport { .. }));
        assert!(err.to_string().contains("connection reset"));
    }

    mod http {
        use wiremock::matchers::{body_json as json_body, header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        use super::*;

        #[tokio::test]
        async fn test_add_record_over_http() {
            let mock_server = MockServer::start().await;

            Mock::given(method("POST"))
                .and(path("/api/public/auth/login"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "auth": {"accessToken": "live-token"}
                })))
                .expect(1)
                .mount(&mock_server)
                .await;

            Mock::given(method("POST"))
                .and(path("/clouddns/domain/search"))
                .and(header("Authorization", "Bearer live-token"))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(json!({"items": [{"id": "dom-1"}]})),
                )
                .expect(1)
                .mount(&mock_server)
                .await;

            Mock::given(method("POST"))
                .and(path("/clouddns/record-txt"))
                .and(header("Authorization", "Bearer live-token"))
                .and(json_body(json!({
                    "domainId": "dom-1",
                    "name": "_acme-challenge.example.com.",
                    "value": "abc123",
                    "type": "TXT"
                })))
                .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "rec-1"})))
                .expect(1)
                .mount(&mock_server)
                .await;

            Mock::given(method("PUT"))
                .and(path("/clouddns/domain/dom-1/publish"))
                .and(json_body(json!({"soaTtl": 600})))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
                .expect(1)
                .mount(&mock_server)
                .await;

            let credentials = Credentials {
                client_id: "client-1".to_string(),
                email: "user@example.com".to_string(),
                password: "secret".to_string(),
            };
            let client = Client::new(ReqwestTransport::new(None).unwrap(), credentials, 600)
                .with_endpoints(
                    &format!("{}/clouddns/", mock_server.uri()),
                    &format!("{}/api/public/auth/login", mock_server.uri()),
                );

            client
                .add_record("example.com.", "_acme-challenge.example.com.", "abc123")
                .await
                .unwrap();
        }
    }
}
