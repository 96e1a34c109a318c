use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// 近邻查询返回的 (片段 ID, 距离)
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceElement {
    pub id: String,
    pub distance: f64,
}

impl DistanceElement {
    pub fn new(id: impl Into<String>, distance: f64) -> Self {
        Self { id: id.into(), distance }
    }
}

/// 检索结果 (片段 ID, 相似度)，相似度范围为 [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ScoreElement {
    /// 片段 ID
    pub id: String,
    /// 相似度
    pub score: f64,
}

impl ScoreElement {
    pub fn new(id: impl Into<String>, score: f64) -> Self {
        Self { id: id.into(), score }
    }
}

/// 对应函数，将距离映射为 [0, 1] 内的相似度，距离越大相似度越低
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CorrespondenceFunction {
    /// `max(0, 1 - d / max_distance)`
    Linear { max_distance: f64 },
    /// `1 / (1 + d / divisor)`
    Hyperbolic { divisor: f64 },
}

impl CorrespondenceFunction {
    pub fn linear(max_distance: f64) -> Self {
        Self::Linear { max_distance }
    }

    pub fn hyperbolic(divisor: f64) -> Self {
        Self::Hyperbolic { divisor }
    }

    pub fn score(&self, distance: f64) -> f64 {
        if distance.is_nan() {
            return 0.;
        }
        let distance = distance.max(0.);
        let score = match *self {
            Self::Linear { max_distance } => 1. - distance / max_distance,
            Self::Hyperbolic { divisor } => 1. / (1. + distance / divisor),
        };
        if score.is_nan() { 0. } else { score.clamp(0., 1.) }
    }
}

impl fmt::Display for CorrespondenceFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linear { max_distance } => write!(f, "linear:{}", max_distance),
            Self::Hyperbolic { divisor } => write!(f, "hyperbolic:{}", divisor),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ParseCorrespondenceError {
    #[error("无效的对应函数: {0}，格式应为 linear:<最大距离> 或 hyperbolic:<除数>")]
    Format(String),
    #[error("对应函数参数必须为正数: {0}")]
    Parameter(String),
}

impl FromStr for CorrespondenceFunction {
    type Err = ParseCorrespondenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, value) =
            s.split_once(':').ok_or_else(|| ParseCorrespondenceError::Format(s.to_owned()))?;
        let value: f64 =
            value.trim().parse().map_err(|_| ParseCorrespondenceError::Format(s.to_owned()))?;
        if !(value.is_finite() && value > 0.) {
            return Err(ParseCorrespondenceError::Parameter(s.to_owned()));
        }
        match kind.trim() {
            "linear" => Ok(Self::linear(value)),
            "hyperbolic" => Ok(Self::hyperbolic(value)),
            _ => Err(ParseCorrespondenceError::Format(s.to_owned())),
        }
    }
}

/// 将距离列表转换为按相似度降序排列的结果
///
/// 排序是稳定的，相似度相同的元素保持查询返回时的顺序。
pub fn to_scores<I>(distances: I, function: CorrespondenceFunction) -> Vec<ScoreElement>
where
    I: IntoIterator<Item = DistanceElement>,
{
    let mut scores = distances
        .into_iter()
        .map(|e| ScoreElement { score: function.score(e.distance), id: e.id })
        .collect::<Vec<_>>();
    scores.sort_by(|a, b| b.score.total_cmp(&a.score));
    scores
}
