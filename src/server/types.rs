use axum::body::Bytes;
use axum_typed_multipart::TryFromMultipart;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::distance::Distance;
use crate::score::ScoreElement;

/// 搜索请求参数
#[derive(TryFromMultipart)]
pub struct SearchRequest {
    pub file: Vec<Bytes>,
    pub count: Option<usize>,
    pub distance: Option<String>,
    pub correspondence: Option<String>,
}

/// 搜索表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct SearchForm {
    /// 查询片段的所有帧，按顺序上传
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: String,
    /// 返回的结果数量
    pub count: Option<usize>,
    /// 距离函数
    pub distance: Option<Distance>,
    /// 对应函数，例：linear:1.0、hyperbolic:0.5
    pub correspondence: Option<String>,
}

/// 相似片段查询参数
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SimilarParams {
    /// 返回的结果数量
    pub count: Option<usize>,
    /// 距离函数
    pub distance: Option<Distance>,
    /// 对应函数，例：linear:1.0、hyperbolic:0.5
    pub correspondence: Option<String>,
}

/// 搜索响应
#[derive(Debug, Serialize, ToSchema)]
pub struct SearchResponse {
    /// 搜索耗时，单位为毫秒
    pub time: u64,
    /// 按相似度降序排列的结果
    pub result: Vec<ScoreElement>,
}

/// 添加片段的请求参数
#[derive(TryFromMultipart)]
pub struct AddRequest {
    pub id: String,
    pub file: Vec<Bytes>,
}

/// 添加表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct AddForm {
    /// 片段 ID
    pub id: String,
    /// 片段的所有帧，按顺序上传
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: String,
}

/// 添加响应
#[derive(Debug, Serialize, ToSchema)]
pub struct AddResponse {
    /// 是否写入了新的特征，片段已存在时为 false
    pub written: bool,
}
