//! The endpoint layer every data pull delegates to.
//!
//! An [`Endpoint`] addresses one resource collection in the API as
//! `{base}/{folder}/v{version}/tenant/{tenant}/{endpoint}`. List responses
//! arrive in an envelope carrying a `hasMore` flag, and [`Endpoint::get_all`]
//! keeps requesting pages until the envelope says otherwise. Records are kept
//! as opaque [`serde_json::Value`]s; callers reach into the fields they need.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use ureq::{http::Method, Agent};

use crate::client::{self, STContext};
use crate::error::{APIError, APIResult};

/// Query parameters for one fetch, keyed by the API's filter-field names.
pub type QueryOptions = BTreeMap<String, String>;

/// One resource collection, bound to a connection context.
pub struct Endpoint<'a> {
    folder: String,
    endpoint: String,
    version: u8,
    context: &'a STContext,
}

/// Envelope the API wraps every list response in.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PageEnvelope {
    has_more: bool,
    data: Vec<Value>,
}

impl<'a> Endpoint<'a> {
    #[must_use]
    pub fn new(
        folder: impl Into<String>,
        endpoint: impl Into<String>,
        version: u8,
        context: &'a STContext,
    ) -> Self {
        Self {
            folder: folder.into(),
            endpoint: endpoint.into(),
            version,
            context,
        }
    }

    fn path(&self) -> String {
        format!(
            "/{}/v{}/tenant/{}/{}",
            self.folder,
            self.version,
            self.context.tenant_id(),
            self.endpoint
        )
    }

    /// Fetches every page of the collection matching `options`, concatenated
    /// in API order. The `page` cursor is managed here and overrides any
    /// caller-supplied value.
    ///
    /// # Errors
    ///
    /// Fails on the first transport fault or non-success status; records
    /// from pages already fetched are discarded.
    pub fn get_all(&self, client: &Agent, options: &QueryOptions) -> APIResult<Vec<Value>> {
        let mut records = Vec::new();
        let mut page: u32 = 1;
        loop {
            let mut query = options.clone();
            query.insert("page".to_string(), page.to_string());
            let envelope = self.get_page(client, &query)?;
            records.extend(envelope.data);
            if !envelope.has_more {
                break;
            }
            page += 1;
        }

        log::debug!(
            "Fetched {} record(s) across {page} page(s) from {}",
            records.len(),
            self.path()
        );

        Ok(records)
    }

    fn get_page(&self, client: &Agent, query: &QueryOptions) -> APIResult<PageEnvelope> {
        let request = client::build_request(
            Method::GET,
            &self.path(),
            None::<&()>,
            Some(query),
            "application/json",
            self.context,
        )?;
        let response = self.context.with_permission(|_| Ok(client.run(request)?))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(APIError::BadRequest {
                status,
                body: response.into_body().read_to_string()?,
            });
        }
        Ok(response.into_body().read_json()?)
    }

    /// Fetches a single resource as its raw byte payload (attachments).
    ///
    /// # Errors
    ///
    /// Fails on transport faults or a non-success status.
    pub fn get_one_raw(&self, client: &Agent, id: i64) -> APIResult<Vec<u8>> {
        let request = client::build_request(
            Method::GET,
            &format!("{}/{id}", self.path()),
            None::<&()>,
            None::<&QueryOptions>,
            "application/json",
            self.context,
        )?;
        let response = self.context.with_permission(|_| Ok(client.run(request)?))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(APIError::BadRequest {
                status,
                body: response.into_body().read_to_string()?,
            });
        }
        Ok(response.into_body().read_to_vec()?)
    }

    /// Issues a single mutating request against one resource and returns the
    /// updated record.
    ///
    /// # Errors
    ///
    /// Fails on transport faults or a non-success status.
    pub fn update(
        &self,
        client: &Agent,
        id: i64,
        json_payload: &Value,
        method: Method,
    ) -> APIResult<Value> {
        let request = client::build_request(
            method,
            &format!("{}/{id}", self.path()),
            Some(json_payload),
            None::<&QueryOptions>,
            "application/json",
            self.context,
        )?;
        let response = self.context.with_permission(|_| Ok(client.run(request)?))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(APIError::BadRequest {
                status,
                body: response.into_body().read_to_string()?,
            });
        }
        Ok(response.into_body().read_json()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Environment;
    use httpmock::prelude::*;
    use httpmock::Method::PATCH;
    use serde_json::json;

    fn test_context(base_url: String) -> STContext {
        STContext::new(
            Environment::INTEGRATION,
            "500".to_string(),
            "app-key".to_string(),
            "token".to_string(),
        )
        .with_base_url(base_url)
    }

    #[test]
    fn get_all_follows_has_more_pages() {
        let server = MockServer::start();
        let first = server.mock(|when, then| {
            when.method(GET)
                .path("/jpm/v2/tenant/500/jobs")
                .query_param("page", "1");
            then.status(200).json_body(json!({
                "page": 1, "pageSize": 2, "totalCount": 3, "hasMore": true,
                "data": [{"id": 1}, {"id": 2}],
            }));
        });
        let second = server.mock(|when, then| {
            when.method(GET)
                .path("/jpm/v2/tenant/500/jobs")
                .query_param("page", "2");
            then.status(200).json_body(json!({
                "page": 2, "pageSize": 2, "totalCount": 3, "hasMore": false,
                "data": [{"id": 3}],
            }));
        });

        let context = test_context(server.base_url());
        let client = Agent::new_with_defaults();
        let records = Endpoint::new("jpm", "jobs", 2, &context)
            .get_all(&client, &QueryOptions::new())
            .unwrap();

        first.assert();
        second.assert();
        let ids: Vec<i64> = records.iter().map(|r| r["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn get_all_sends_bearer_and_app_key_headers() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/settings/v2/tenant/500/employees")
                .header("Authorization", "Bearer token")
                .header("ST-App-Key", "app-key");
            then.status(200)
                .json_body(json!({"hasMore": false, "data": []}));
        });

        let context = test_context(server.base_url());
        let client = Agent::new_with_defaults();
        Endpoint::new("settings", "employees", 2, &context)
            .get_all(&client, &QueryOptions::new())
            .unwrap();

        mock.assert();
    }

    #[test]
    fn get_all_forwards_filter_options() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/accounting/v2/tenant/500/invoices")
                .query_param("invoicedOnOrAfter", "2024-01-01T00:00:00Z")
                .query_param("page", "1");
            then.status(200)
                .json_body(json!({"hasMore": false, "data": []}));
        });

        let context = test_context(server.base_url());
        let client = Agent::new_with_defaults();
        let mut options = QueryOptions::new();
        options.insert(
            "invoicedOnOrAfter".to_string(),
            "2024-01-01T00:00:00Z".to_string(),
        );
        Endpoint::new("accounting", "invoices", 2, &context)
            .get_all(&client, &options)
            .unwrap();

        mock.assert();
    }

    #[test]
    fn get_one_raw_returns_bytes() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/forms/v2/tenant/500/jobs/attachment/77");
            then.status(200).body("%PDF-1.4 stub");
        });

        let context = test_context(server.base_url());
        let client = Agent::new_with_defaults();
        let bytes = Endpoint::new("forms", "jobs/attachment", 2, &context)
            .get_one_raw(&client, 77)
            .unwrap();

        assert_eq!(bytes, b"%PDF-1.4 stub".to_vec());
    }

    #[test]
    fn update_patches_a_single_resource() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(PATCH)
                .path("/jpm/v2/tenant/500/jobs/99")
                .json_body(json!({"summary": "rework"}));
            then.status(200).json_body(json!({"id": 99, "summary": "rework"}));
        });

        let context = test_context(server.base_url());
        let client = Agent::new_with_defaults();
        let updated = Endpoint::new("jpm", "jobs", 2, &context)
            .update(&client, 99, &json!({"summary": "rework"}), Method::PATCH)
            .unwrap();

        mock.assert();
        assert_eq!(updated["id"], 99);
    }

    #[test]
    fn non_success_status_is_an_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/jpm/v2/tenant/500/jobs");
            then.status(404).body("tenant not found");
        });

        let context = test_context(server.base_url());
        let client = Agent::new_with_defaults();
        let result = Endpoint::new("jpm", "jobs", 2, &context).get_all(&client, &QueryOptions::new());

        assert!(result.is_err());
    }
}
