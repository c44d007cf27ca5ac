//! HTTP implementation of the [`Gateway`] trait.
//!
//! Single request/response per call, no retry at this layer; retry policy
//! belongs to callers.

use async_trait::async_trait;
use kaiseki_core::{
    BunsetsuItem, KaisekiError, Orientation, PatternDescriptor, Relation, Result, Segmentation,
    ServiceConfig, TreeNode, Triple,
};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::wire::{
    ChartRequest, ChartResult, ExpandCellRequest, ExpandedCell, MatchOutcome, MatchingRequest,
    MatchingResponse, PatternsResponse, SegmentRequest, Stage1Request, Stage1Response,
    Stage2Request, Stage2Response, Step3Request, Step3Response, Step4Request, Step4Response,
};
use crate::Gateway;

/// Gateway over HTTP JSON, one base URL for all services
pub struct HttpGateway {
    client: Client,
    base_url: String,
}

impl HttpGateway {
    /// Create a new gateway against a base URL
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| KaisekiError::GatewayError(format!("client build failed: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Create from service configuration
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| KaisekiError::GatewayError(format!("client build failed: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(|e| KaisekiError::GatewayError(format!("{path} request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(KaisekiError::ServiceError {
                status: status.as_u16(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| KaisekiError::GatewayError(format!("{path} parse failed: {e}")))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .send()
            .await
            .map_err(|e| KaisekiError::GatewayError(format!("{path} request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(KaisekiError::ServiceError {
                status: status.as_u16(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| KaisekiError::GatewayError(format!("{path} parse failed: {e}")))
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn segment(&self, text: &str) -> Result<Segmentation> {
        if text.trim().is_empty() {
            return Err(KaisekiError::InputError(
                "segmentation text is empty".to_string(),
            ));
        }

        tracing::debug!(len = text.len(), "segmenting text");
        let items: Vec<BunsetsuItem> = self
            .post_json("/api/bunsetu", &SegmentRequest { text })
            .await?;

        if items.is_empty() {
            return Err(KaisekiError::EmptyResult("segment".to_string()));
        }
        Ok(items)
    }

    async fn build_chart(&self, segmentation: &[BunsetsuItem]) -> Result<ChartResult> {
        tracing::debug!(bunsetsu = segmentation.len(), "building chart");
        self.post_json("/api/cky", &ChartRequest { data: segmentation })
            .await
    }

    async fn expand_cell(
        &self,
        segmentation: &[BunsetsuItem],
        cell: (usize, usize),
        pred_threshold: u32,
    ) -> Result<ExpandedCell> {
        tracing::debug!(i = cell.0, j = cell.1, pred_threshold, "expanding cell");
        self.post_json(
            "/api/cky/expand-cell",
            &ExpandCellRequest {
                data: segmentation,
                cell: [cell.0, cell.1],
                pred_threshold,
            },
        )
        .await
    }

    async fn list_patterns(&self) -> Result<BTreeMap<u64, PatternDescriptor>> {
        let response: PatternsResponse = self.get_json("/api/patterns").await?;
        let catalog = response.into_catalog();
        tracing::debug!(patterns = catalog.len(), "pattern catalog fetched");
        Ok(catalog)
    }

    async fn match_patterns(
        &self,
        tree: &TreeNode,
        segmentation: &[BunsetsuItem],
        selected: Option<&[u64]>,
    ) -> Result<MatchOutcome> {
        // An empty selection is never sent; callers short-circuit locally.
        let selected = selected.filter(|ids| !ids.is_empty());

        let response: MatchingResponse = self
            .post_json(
                "/api/matching",
                &MatchingRequest {
                    tree,
                    bunsetsu_list: segmentation,
                    selected_patterns: selected,
                },
            )
            .await?;

        Ok(response.into_outcome())
    }

    async fn verify_definition(
        &self,
        triple: &Triple,
        relations: &[Relation],
    ) -> Result<Stage1Response> {
        self.post_json("/api/verify/stage1", &Stage1Request { triple, relations })
            .await
    }

    async fn verify_direction(
        &self,
        triple: &Triple,
        relation: &Relation,
    ) -> Result<Stage2Response> {
        self.post_json("/api/verify/stage2", &Stage2Request { triple, relation })
            .await
    }

    async fn generate_samples(&self, relation: &Relation) -> Result<Step3Response> {
        self.post_json("/api/verify/step3", &Step3Request { relation })
            .await
    }

    async fn verify_membership(
        &self,
        triple: &Triple,
        pattern: Orientation,
        relation: &Relation,
        samples: &Step3Response,
    ) -> Result<Step4Response> {
        self.post_json(
            "/api/verify/step4",
            &Step4Request {
                triple,
                pattern,
                relation,
                sample_domain: &samples.sample_domain,
                sample_object_class: &samples.sample_object_class,
            },
        )
        .await
    }
}
