// src/fetch/mod.rs

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};
use url::Url;

use crate::error::FetchError;

pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// One JSON object per row, in page order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonTable {
    pub rows: Vec<Map<String, Value>>,
}

impl JsonTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Parameters of a paginated DataCatalog query; only `skip` changes per page.
#[derive(Debug, Clone)]
pub struct PageRequest {
    pub dataset_id: String,
    pub resource_id: String,
    pub select: Option<Vec<String>>,
    pub filter: Option<String>,
    pub page_size: usize,
    pub data_type: String,
}

impl PageRequest {
    pub fn new(dataset_id: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            dataset_id: dataset_id.into(),
            resource_id: resource_id.into(),
            select: None,
            filter: None,
            page_size: DEFAULT_PAGE_SIZE,
            data_type: "json".to_string(),
        }
    }

    pub fn select(mut self, fields: Vec<String>) -> Self {
        self.select = Some(fields);
        self
    }

    pub fn filter(mut self, expr: impl Into<String>) -> Self {
        self.filter = Some(expr.into());
        self
    }

    pub fn page_size(mut self, n: usize) -> Self {
        self.page_size = n;
        self
    }

    fn page_url(&self, base: &Url, skip: usize) -> Url {
        let mut url = base.clone();
        {
            let mut q = url.query_pairs_mut();
            q.append_pair("datasetId", &self.dataset_id)
                .append_pair("resourceId", &self.resource_id)
                .append_pair("type", &self.data_type)
                .append_pair("top", &self.page_size.to_string())
                .append_pair("skip", &skip.to_string());
            if let Some(fields) = self.select.as_ref().filter(|f| !f.is_empty()) {
                q.append_pair("select", &fields.join(","));
            }
            if let Some(expr) = self.filter.as_deref().filter(|e| !e.is_empty()) {
                q.append_pair("filter", expr);
            }
        }
        url
    }
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    data: Vec<Map<String, Value>>,
}

/// Blocking client for the World Bank DataCatalog API.
#[derive(Clone)]
pub struct DataCatalogClient {
    client: Client,
    base_url: Url,
}

impl DataCatalogClient {
    pub fn new(base_url: &str) -> Result<Self, FetchError> {
        Ok(Self {
            client: Client::new(),
            base_url: Url::parse(base_url)?,
        })
    }

    /// Request pages until one comes back shorter than `page_size`, then
    /// concatenate them. A failed page aborts the whole fetch.
    #[instrument(level = "info", skip(self, req), fields(dataset = %req.dataset_id, resource = %req.resource_id))]
    pub fn fetch_paginated(&self, req: &PageRequest) -> Result<JsonTable, FetchError> {
        let mut rows = Vec::new();
        let mut skip = 0;
        let page_size = req.page_size.max(1);

        loop {
            let url = req.page_url(&self.base_url, skip);
            let batch = self.get_page(&url)?;
            let n = batch.len();
            debug!(skip, rows = n, "page");
            rows.extend(batch);

            if n < page_size {
                break;
            }
            skip += page_size;
        }

        info!(rows = rows.len(), "fetched dataset");
        Ok(JsonTable { rows })
    }

    fn get_page(&self, url: &Url) -> Result<Vec<Map<String, Value>>, FetchError> {
        let resp = self
            .client
            .get(url.clone())
            .send()
            .map_err(|source| FetchError::Http {
                url: url.to_string(),
                source,
            })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }
        let page: Page = resp.json().map_err(|source| FetchError::Decode {
            url: url.to_string(),
            source,
        })?;
        Ok(page.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn rows(ids: std::ops::Range<u32>) -> Vec<Value> {
        ids.map(|i| json!({ "project_id": format!("P{i}") })).collect()
    }

    #[test]
    fn sends_query_parameters() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/api")
                .query_param("datasetId", "DS00976")
                .query_param("resourceId", "RS00906")
                .query_param("type", "json")
                .query_param("top", "10")
                .query_param("skip", "0")
                .query_param("select", "a,b")
                .query_param("filter", "end_of_period>='01-Sep-2024'");
            then.status(200).json_body(json!({ "data": rows(0..3) }));
        });

        let client = DataCatalogClient::new(&server.url("/api")).unwrap();
        let req = PageRequest::new("DS00976", "RS00906")
            .select(vec!["a".into(), "b".into()])
            .filter("end_of_period>='01-Sep-2024'")
            .page_size(10);
        let table = client.fetch_paginated(&req).unwrap();
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn offset_pagination_stops_on_short_page() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api").query_param("skip", "0");
            then.status(200).json_body(json!({ "data": rows(0..2) }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api").query_param("skip", "2");
            then.status(200).json_body(json!({ "data": rows(2..4) }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api").query_param("skip", "4");
            then.status(200).json_body(json!({ "data": rows(4..5) }));
        });

        let client = DataCatalogClient::new(&server.url("/api")).unwrap();
        let table = client
            .fetch_paginated(&PageRequest::new("DS", "RS").page_size(2))
            .unwrap();

        let ids: Vec<_> = table
            .rows
            .iter()
            .map(|r| r["project_id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["P0", "P1", "P2", "P3", "P4"]);
    }

    #[test]
    fn exact_multiple_needs_one_empty_page() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api").query_param("skip", "0");
            then.status(200).json_body(json!({ "data": rows(0..2) }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api").query_param("skip", "2");
            then.status(200).json_body(json!({}));
        });

        let client = DataCatalogClient::new(&server.url("/api")).unwrap();
        let table = client
            .fetch_paginated(&PageRequest::new("DS", "RS").page_size(2))
            .unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn failing_page_aborts_fetch() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api").query_param("skip", "0");
            then.status(200).json_body(json!({ "data": rows(0..2) }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api").query_param("skip", "2");
            then.status(503);
        });

        let client = DataCatalogClient::new(&server.url("/api")).unwrap();
        let err = client
            .fetch_paginated(&PageRequest::new("DS", "RS").page_size(2))
            .unwrap_err();
        match err {
            FetchError::Status { status, .. } => assert_eq!(status.as_u16(), 503),
            other => panic!("unexpected error: {other}"),
        }
    }
}
