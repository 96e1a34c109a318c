use std::sync::Arc;

use crate::db::SqliteStore;
use crate::feature::DominantChannelHistogram;
use crate::query::RetrieverConfig;

/// 应用状态
pub struct AppState {
    /// 数据库连接池，每个请求从中获取独立的连接
    pub store: SqliteStore,
    /// 特征变换
    pub transform: DominantChannelHistogram,
    /// 特征实体名
    pub entity: String,
    /// 检索配置
    pub config: RetrieverConfig,
    /// 鉴权 token
    pub token: String,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(
        store: SqliteStore,
        entity: String,
        config: RetrieverConfig,
        token: String,
    ) -> Arc<Self> {
        Arc::new(AppState { store, transform: DominantChannelHistogram, entity, config, token })
    }
}
