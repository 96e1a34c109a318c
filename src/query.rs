use crate::distance::Distance;
use crate::score::CorrespondenceFunction;

/// 单次查询的配置，查询过程中不会被修改
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryConfig {
    /// 最大返回数量，未设置时使用检索器的默认值
    pub max_results: Option<usize>,
    /// 对应函数，未设置时使用特征变换对应的线性函数
    pub correspondence: Option<CorrespondenceFunction>,
    /// 距离函数，未设置时由存储层决定
    pub distance: Option<Distance>,
}

impl QueryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    pub fn correspondence(mut self, function: CorrespondenceFunction) -> Self {
        self.correspondence = Some(function);
        self
    }

    pub fn distance(mut self, distance: Distance) -> Self {
        self.distance = Some(distance);
        self
    }

    /// 实际使用的距离函数
    pub fn distance_or_default(&self) -> Distance {
        self.distance.unwrap_or_default()
    }
}

/// 检索器的全局配置，由调用方显式传入
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrieverConfig {
    /// 每个模块默认返回的最大结果数量
    pub max_results_per_module: usize,
}

impl RetrieverConfig {
    pub const DEFAULT_MAX_RESULTS: usize = 250;
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self { max_results_per_module: Self::DEFAULT_MAX_RESULTS }
    }
}
