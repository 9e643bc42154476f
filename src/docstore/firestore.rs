//! Firestore document store backend.
//!
//! Talks to the Firestore REST API via `reqwest`.  Firestore returns
//! documents as a nested tagged-union value format (`stringValue`,
//! `mapValue`, ...); that format is modelled here as the explicit
//! recursive [`FirestoreValue`] type with a single [`decode_value`]
//! function instead of inline parsing at every call site.

use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::debug;

use super::store::{DocumentStore, GalleryRecord, ShareGrant, SubscriptionRecord, UserRecord};
use crate::config::FirestoreConfig;
use crate::gcp::GcpTokenSource;

/// Public Firestore REST endpoint.
const FIRESTORE_API_BASE: &str = "https://firestore.googleapis.com/v1";

// -- Firestore value model ----------------------------------------------------

/// A decoded Firestore field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FirestoreValue {
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    Str(String),
    Timestamp(DateTime<Utc>),
    Array(Vec<FirestoreValue>),
    Map(HashMap<String, FirestoreValue>),
}

impl FirestoreValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FirestoreValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FirestoreValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FirestoreValue::Integer(n) => Some(*n),
            FirestoreValue::Double(d) => Some(*d as i64),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            FirestoreValue::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[FirestoreValue]> {
        match self {
            FirestoreValue::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a field on a map value.
    pub fn get(&self, field: &str) -> Option<&FirestoreValue> {
        match self {
            FirestoreValue::Map(fields) => fields.get(field),
            _ => None,
        }
    }
}

/// Decode one Firestore wire value into a [`FirestoreValue`].
///
/// Unknown or malformed tags decode to `Null` rather than failing the
/// whole document.
pub fn decode_value(raw: &serde_json::Value) -> FirestoreValue {
    let Some(obj) = raw.as_object() else {
        return FirestoreValue::Null;
    };

    if obj.contains_key("nullValue") {
        return FirestoreValue::Null;
    }
    if let Some(b) = obj.get("booleanValue").and_then(|v| v.as_bool()) {
        return FirestoreValue::Bool(b);
    }
    if let Some(v) = obj.get("integerValue") {
        // Firestore serialises integers as JSON strings.
        let parsed = match v {
            serde_json::Value::String(s) => s.parse::<i64>().ok(),
            serde_json::Value::Number(n) => n.as_i64(),
            _ => None,
        };
        if let Some(n) = parsed {
            return FirestoreValue::Integer(n);
        }
        return FirestoreValue::Null;
    }
    if let Some(d) = obj.get("doubleValue").and_then(|v| v.as_f64()) {
        return FirestoreValue::Double(d);
    }
    if let Some(s) = obj.get("stringValue").and_then(|v| v.as_str()) {
        return FirestoreValue::Str(s.to_string());
    }
    if let Some(s) = obj.get("timestampValue").and_then(|v| v.as_str()) {
        return match DateTime::parse_from_rfc3339(s) {
            Ok(t) => FirestoreValue::Timestamp(t.with_timezone(&Utc)),
            Err(_) => FirestoreValue::Null,
        };
    }
    if let Some(arr) = obj.get("arrayValue") {
        let items = arr
            .get("values")
            .and_then(|v| v.as_array())
            .map(|values| values.iter().map(decode_value).collect())
            .unwrap_or_default();
        return FirestoreValue::Array(items);
    }
    if let Some(map) = obj.get("mapValue") {
        let fields = map
            .get("fields")
            .and_then(|v| v.as_object())
            .map(|fields| {
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), decode_value(v)))
                    .collect()
            })
            .unwrap_or_default();
        return FirestoreValue::Map(fields);
    }

    FirestoreValue::Null
}

/// Decode the `fields` map of a Firestore document into a map value.
fn decode_document_fields(doc: &serde_json::Value) -> FirestoreValue {
    let fields = doc
        .get("fields")
        .and_then(|v| v.as_object())
        .map(|fields| {
            fields
                .iter()
                .map(|(k, v)| (k.clone(), decode_value(v)))
                .collect()
        })
        .unwrap_or_default();
    FirestoreValue::Map(fields)
}

/// The trailing document ID of a full Firestore resource name.
fn document_id(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

// -- Backend ------------------------------------------------------------------

/// Firestore-backed document store.
pub struct FirestoreDocumentStore {
    client: reqwest::Client,
    tokens: Arc<GcpTokenSource>,
    /// `{api_base}/projects/{project}/databases/(default)/documents`
    documents_base: String,
}

impl FirestoreDocumentStore {
    pub fn new(config: &FirestoreConfig, tokens: Arc<GcpTokenSource>) -> anyhow::Result<Self> {
        let api_base = if config.api_base.is_empty() {
            FIRESTORE_API_BASE.to_string()
        } else {
            config.api_base.trim_end_matches('/').to_string()
        };
        if config.project_id.is_empty() {
            return Err(anyhow::anyhow!("docstore.firestore.project_id is required"));
        }
        let documents_base = format!(
            "{}/projects/{}/databases/(default)/documents",
            api_base, config.project_id
        );
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {e}"))?,
            tokens,
            documents_base,
        })
    }

    /// GET a single document. `Ok(None)` on 404.
    async fn fetch_document(&self, path: &str) -> anyhow::Result<Option<serde_json::Value>> {
        let token = self.tokens.access_token().await?;
        let url = format!("{}/{}", self.documents_base, path);
        debug!("firestore get {path}");

        let resp = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Firestore request failed: {e}"))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Firestore get {path} failed ({status}): {body}"));
        }

        Ok(Some(resp.json().await?))
    }

    fn gallery_from_fields(gallery_id: &str, fields: &FirestoreValue) -> GalleryRecord {
        GalleryRecord {
            gallery_id: gallery_id.to_string(),
            owner_id: fields
                .get("ownerId")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            public_share_required: fields
                .get("publicShareRequired")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            public_share_token_hash: fields
                .get("publicShareTokenHash")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            public_share_expires_at: fields
                .get("publicShareExpiresAt")
                .and_then(|v| v.as_timestamp()),
        }
    }

    fn subscription_from_fields(fields: &FirestoreValue) -> SubscriptionRecord {
        // Stripe-style shape: items[0].price.{id, unit_amount}, with flat
        // priceId/priceAmount fields as a fallback.
        let first_price = fields
            .get("items")
            .and_then(|v| v.as_array())
            .and_then(|items| items.first())
            .and_then(|item| item.get("price"));

        let price_id = first_price
            .and_then(|p| p.get("id"))
            .and_then(|v| v.as_str())
            .or_else(|| fields.get("priceId").and_then(|v| v.as_str()))
            .unwrap_or_default()
            .to_string();

        let price_amount_cents = first_price
            .and_then(|p| p.get("unit_amount"))
            .and_then(|v| v.as_i64())
            .or_else(|| fields.get("priceAmount").and_then(|v| v.as_i64()));

        SubscriptionRecord {
            status: fields
                .get("status")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            price_id,
            price_amount_cents,
        }
    }
}

impl DocumentStore for FirestoreDocumentStore {
    fn get_gallery(
        &self,
        gallery_id: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<GalleryRecord>>> + Send + '_>> {
        let gallery_id = gallery_id.to_string();
        Box::pin(async move {
            let Some(doc) = self.fetch_document(&format!("galleries/{gallery_id}")).await? else {
                return Ok(None);
            };
            let fields = decode_document_fields(&doc);
            Ok(Some(Self::gallery_from_fields(&gallery_id, &fields)))
        })
    }

    fn list_galleries_by_owner(
        &self,
        owner_id: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<String>>> + Send + '_>> {
        let owner_id = owner_id.to_string();
        Box::pin(async move {
            let token = self.tokens.access_token().await?;
            let url = format!("{}:runQuery", self.documents_base);
            let body = serde_json::json!({
                "structuredQuery": {
                    "from": [{"collectionId": "galleries"}],
                    "where": {
                        "fieldFilter": {
                            "field": {"fieldPath": "ownerId"},
                            "op": "EQUAL",
                            "value": {"stringValue": owner_id},
                        }
                    }
                }
            });

            let resp = self
                .client
                .post(&url)
                .bearer_auth(token)
                .json(&body)
                .send()
                .await
                .map_err(|e| anyhow::anyhow!("Firestore query failed: {e}"))?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(anyhow::anyhow!("Firestore runQuery failed ({status}): {body}"));
            }

            let rows: Vec<serde_json::Value> = resp.json().await?;
            let ids = rows
                .iter()
                .filter_map(|row| row.get("document"))
                .filter_map(|doc| doc.get("name").and_then(|n| n.as_str()))
                .map(|name| document_id(name).to_string())
                .collect();
            Ok(ids)
        })
    }

    fn set_share_grant(
        &self,
        gallery_id: &str,
        grant: ShareGrant,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let gallery_id = gallery_id.to_string();
        Box::pin(async move {
            let token = self.tokens.access_token().await?;
            let url = format!(
                "{}/galleries/{}?updateMask.fieldPaths=publicShareRequired\
                 &updateMask.fieldPaths=publicShareTokenHash\
                 &updateMask.fieldPaths=publicShareExpiresAt",
                self.documents_base, gallery_id
            );
            let body = serde_json::json!({
                "fields": {
                    "publicShareRequired": {"booleanValue": true},
                    "publicShareTokenHash": {"stringValue": grant.token_hash},
                    "publicShareExpiresAt": {
                        "timestampValue": grant
                            .expires_at
                            .to_rfc3339_opts(SecondsFormat::Millis, true)
                    },
                }
            });

            let resp = self
                .client
                .patch(&url)
                .bearer_auth(token)
                .json(&body)
                .send()
                .await
                .map_err(|e| anyhow::anyhow!("Firestore patch failed: {e}"))?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(anyhow::anyhow!(
                    "Firestore share-grant write failed ({status}): {body}"
                ));
            }
            Ok(())
        })
    }

    fn get_user(
        &self,
        user_id: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<UserRecord>>> + Send + '_>> {
        let user_id = user_id.to_string();
        Box::pin(async move {
            let Some(doc) = self.fetch_document(&format!("users/{user_id}")).await? else {
                return Ok(None);
            };
            let fields = decode_document_fields(&doc);
            Ok(Some(UserRecord {
                user_id,
                plan: fields
                    .get("plan")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
                plan_override: fields
                    .get("planOverride")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
            }))
        })
    }

    fn list_subscriptions(
        &self,
        user_id: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<SubscriptionRecord>>> + Send + '_>> {
        let user_id = user_id.to_string();
        Box::pin(async move {
            let token = self.tokens.access_token().await?;
            let mut subs = Vec::new();
            let mut page_token: Option<String> = None;

            // The billing integration mirrors subscriptions under
            // customers/{uid}/subscriptions; paginate the whole collection.
            loop {
                let mut url = format!(
                    "{}/customers/{}/subscriptions?pageSize=100",
                    self.documents_base, user_id
                );
                if let Some(ref t) = page_token {
                    url.push_str("&pageToken=");
                    url.push_str(t);
                }

                let resp = self
                    .client
                    .get(&url)
                    .bearer_auth(&token)
                    .send()
                    .await
                    .map_err(|e| anyhow::anyhow!("Firestore list failed: {e}"))?;

                if resp.status() == reqwest::StatusCode::NOT_FOUND {
                    return Ok(subs);
                }
                if !resp.status().is_success() {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    return Err(anyhow::anyhow!(
                        "Firestore subscriptions list failed ({status}): {body}"
                    ));
                }

                let page: serde_json::Value = resp.json().await?;
                if let Some(docs) = page.get("documents").and_then(|v| v.as_array()) {
                    for doc in docs {
                        let fields = decode_document_fields(doc);
                        subs.push(Self::subscription_from_fields(&fields));
                    }
                }

                match page.get("nextPageToken").and_then(|v| v.as_str()) {
                    Some(t) if !t.is_empty() => page_token = Some(t.to_string()),
                    _ => break,
                }
            }

            Ok(subs)
        })
    }
}
