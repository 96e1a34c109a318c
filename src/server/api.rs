use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;
use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use axum_auth::AuthBearer;
use axum_typed_multipart::TypedMultipart;
use clap::ValueEnum;
use log::info;
use rayon::prelude::*;
use tokio::task::block_in_place;

use super::error::{AppError, Result};
use super::state::AppState;
use super::types::*;
use crate::distance::Distance;
use crate::extractor::{FeatureExtractor, Processed};
use crate::metrics;
use crate::query::QueryConfig;
use crate::retriever::FeatureRetriever;
use crate::segment::{Frame, Segment};

/// 校验 Bearer token
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
    request: Request,
    next: Next,
) -> Result<Response> {
    if token != state.token {
        return Err(AppError::unauthorized());
    }
    Ok(next.run(request).await)
}

/// 根据请求参数构建查询配置
fn query_config(
    count: Option<usize>,
    distance: Option<Distance>,
    correspondence: Option<&str>,
) -> Result<QueryConfig> {
    let correspondence =
        correspondence.map(str::parse).transpose().map_err(AppError::bad_request)?;
    Ok(QueryConfig { max_results: count, correspondence, distance })
}

fn decode_frames(files: &[Bytes]) -> Result<Vec<Frame>> {
    if files.is_empty() {
        return Err(AppError::bad_request(anyhow!("至少需要上传一帧")));
    }
    let frames = block_in_place(|| {
        files.par_iter().map(|file| Frame::decode(file)).collect::<Result<Vec<_>, _>>()
    })?;
    Ok(frames)
}

/// 按内容搜索相似片段
#[utoipa::path(
    post,
    path = "/search",
    request_body(content = SearchForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, body = SearchResponse),
    )
)]
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    data: TypedMultipart<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    let distance = data
        .distance
        .as_deref()
        .map(|s| Distance::from_str(s, true))
        .transpose()
        .map_err(|e| AppError::bad_request(anyhow!(e)))?;
    let config = query_config(data.count, distance, data.correspondence.as_deref())?;

    let start = Instant::now();

    info!("正在搜索上传片段，共 {} 帧", data.file.len());

    let segment = Segment::new("", decode_frames(&data.file)?);

    let mut retriever =
        FeatureRetriever::new(state.transform, state.config).with_entity(state.entity.clone());
    retriever.init(&state.store).await?;
    let result = retriever.get_similar(&segment, &config).await;
    retriever.finish();

    Ok(Json(SearchResponse { time: start.elapsed().as_millis() as u64, result: result? }))
}

/// 搜索与已入库片段相似的片段
#[utoipa::path(
    get,
    path = "/similar/{id}",
    params(
        ("id" = String, Path, description = "片段 ID"),
        SimilarParams,
    ),
    responses(
        (status = 200, body = SearchResponse),
    )
)]
pub async fn similar_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<SimilarParams>,
) -> Result<Json<SearchResponse>> {
    let config = query_config(params.count, params.distance, params.correspondence.as_deref())?;

    let start = Instant::now();

    let mut retriever =
        FeatureRetriever::new(state.transform, state.config).with_entity(state.entity.clone());
    retriever.init(&state.store).await?;
    let result = retriever.get_similar_by_id(&id, &config).await;
    retriever.finish();

    Ok(Json(SearchResponse { time: start.elapsed().as_millis() as u64, result: result? }))
}

/// 添加片段到数据库
#[utoipa::path(
    post,
    path = "/add",
    request_body(content = AddForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, body = AddResponse),
    )
)]
pub async fn add_handler(
    State(state): State<Arc<AppState>>,
    data: TypedMultipart<AddRequest>,
) -> Result<Json<AddResponse>> {
    if data.id.is_empty() {
        return Err(AppError::bad_request(anyhow!("片段 ID 不能为空")));
    }
    let segment = Segment::new(data.id.clone(), decode_frames(&data.file)?);

    let mut extractor = FeatureExtractor::new(state.transform).with_entity(state.entity.clone());
    extractor.init(&state.store).await?;
    let processed = extractor.process_segment(&segment).await;
    extractor.finish();

    let processed = processed.inspect_err(|_| metrics::inc_extract_failed())?;
    Ok(Json(AddResponse { written: processed == Processed::Written }))
}

/// Prometheus 指标
pub async fn metrics_handler() -> String {
    metrics::gather_text()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::CorrespondenceFunction;

    #[test]
    fn test_query_config() {
        let config = query_config(Some(3), Some(Distance::Cosine), Some("linear:2")).ok().unwrap();
        assert_eq!(config.max_results, Some(3));
        assert_eq!(config.distance, Some(Distance::Cosine));
        assert_eq!(config.correspondence, Some(CorrespondenceFunction::linear(2.)));
        assert!(query_config(None, None, Some("quadratic:1")).is_err());
    }
}
