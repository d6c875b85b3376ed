// CloudDNS API types

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(super) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub(super) struct LoginResponse {
    pub auth: AuthBlock,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AuthBlock {
    pub access_token: String,
}

#[derive(Debug, Serialize)]
pub(super) struct SearchRequest<'a> {
    pub search: Vec<SearchBlock<'a>>,
}

/// One `{name, operator, value}` predicate of a search request.
#[derive(Debug, Serialize)]
pub(super) struct SearchBlock<'a> {
    pub name: &'a str,
    pub operator: &'a str,
    pub value: &'a str,
}

impl<'a> SearchBlock<'a> {
    pub fn eq(name: &'a str, value: &'a str) -> Self {
        Self {
            name,
            operator: "eq",
            value,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct SearchResponse {
    pub items: Vec<DomainItem>,
}

#[derive(Debug, Deserialize)]
pub(super) struct DomainItem {
    pub id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CreateTxtRecordRequest<'a> {
    pub domain_id: &'a str,
    pub name: &'a str,
    pub value: &'a str,
    #[serde(rename = "type")]
    pub record_type: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PublishRequest {
    pub soa_ttl: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct DomainDetail {
    pub last_domain_record_list: Vec<RecordEntry>,
}

/// Entries of other record types may lack fields we never read.
#[derive(Debug, Deserialize)]
pub(super) struct RecordEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub record_type: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct ApiErrorBody {
    pub code: String,
    pub message: String,
}
