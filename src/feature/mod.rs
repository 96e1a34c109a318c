//! 特征变换：将一个片段映射为定长的特征向量
//!
//! 抽取和检索必须使用同一个变换，否则存储的向量与查询向量不在同一空间内，距离没有意义。

mod histogram;

use std::ops::Deref;

use serde::{Deserialize, Serialize};

pub use self::histogram::DominantChannelHistogram;
use crate::segment::Segment;

/// 定长浮点特征向量
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn zeros(dimension: usize) -> Self {
        Self(vec![0.; dimension])
    }

    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }
}

impl Deref for FeatureVector {
    type Target = [f32];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<f32>> for FeatureVector {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

impl<const N: usize> From<[f32; N]> for FeatureVector {
    fn from(values: [f32; N]) -> Self {
        Self(values.to_vec())
    }
}

/// 特征变换
///
/// 实现必须是纯函数：相同的片段总是得到相同的向量，并且对没有帧的片段也要返回一个确定的向量。
pub trait FeatureTransform: Send + Sync {
    /// 模块名称，用于生成默认的实体名
    fn name(&self) -> &str;

    /// 输出向量的维数
    fn dimension(&self) -> usize;

    /// 默认线性对应函数使用的最大距离，超过此距离的相似度为 0
    fn max_distance(&self) -> f32;

    /// 计算片段的特征向量
    fn vector(&self, segment: &Segment) -> FeatureVector;
}
