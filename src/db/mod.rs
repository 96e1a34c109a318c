//! 持久化层与近邻查询层的接口
//!
//! 流水线只依赖这里的 trait，具体的存储引擎（目前为 SQLite）可以替换。
//! 每个写入器 / 查询器独占一个数据库连接，`close` 时归还。

mod sqlite;

use std::future::Future;

use thiserror::Error;

pub use self::sqlite::*;
use crate::feature::FeatureVector;
use crate::query::QueryConfig;
use crate::score::DistanceElement;

/// 特征实体名的固定前缀
pub const ENTITY_PREFIX: &str = "features_";
/// 存放特征向量的字段名
pub const FEATURE_FIELD: &str = "feature";
/// 片段 ID 字段名
pub const ID_FIELD: &str = "id";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("数据库错误: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("数据库迁移失败: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("无效的实体名: {0:?}，只允许字母、数字和下划线，且不能与内部表重名")]
    InvalidEntityName(String),
    #[error("实体不存在: {0}")]
    EntityNotFound(String),
    #[error("尚未打开实体")]
    NotOpen,
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("片段已存在: {0}")]
    Duplicate(String),
    #[error("向量维数不一致: 实体为 {expected}，写入的向量为 {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<sqlx::Error> for WriteError {
    fn from(err: sqlx::Error) -> Self {
        Self::Store(err.into())
    }
}

/// 实体的元数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityInfo {
    pub name: String,
    /// ID 是否唯一
    pub unique_key: bool,
    /// 向量维数，首次写入前为 None
    pub dimension: Option<usize>,
    /// 已存储的元组数量
    pub count: u64,
}

/// 根据模块名生成实体名
pub fn entity_name(module: &str) -> String {
    format!("{ENTITY_PREFIX}{module}")
}

/// 存储层自身使用的表
const RESERVED_TABLES: [&str; 2] = ["entity", "_sqlx_migrations"];

/// 实体名会被拼接进 SQL，因此只允许 `[A-Za-z0-9_]`
///
/// SQLite 表名不区分大小写，内部表与 `sqlite_` 前缀同样按不区分大小写的方式排除。
pub fn validate_entity_name(name: &str) -> Result<(), StoreError> {
    let lower = name.to_ascii_lowercase();
    if name.is_empty()
        || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        || RESERVED_TABLES.contains(&lower.as_str())
        || lower.starts_with("sqlite_")
    {
        return Err(StoreError::InvalidEntityName(name.to_owned()));
    }
    Ok(())
}

/// 实体的创建与删除，只在初始化阶段使用
pub trait EntityCreator: Send {
    /// 创建实体，已存在时不做任何事
    fn create_entity(
        &mut self,
        name: &str,
        unique_key: bool,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// 删除实体及其所有数据，不存在时不做任何事
    fn drop_entity(&mut self, name: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn exists_entity(&mut self, name: &str)
    -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// 查询实体元数据，不存在时返回 None
    fn describe_entity(
        &mut self,
        name: &str,
    ) -> impl Future<Output = Result<Option<EntityInfo>, StoreError>> + Send;
}

/// 写入 (id, 特征向量) 元组
pub trait PersistencyWriter: Send {
    /// 打开要写入的实体，实体不存在时报错
    fn open(&mut self, entity: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// 检查指定 ID 是否已经写入
    fn exists(&mut self, id: &str) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// 写入一个元组，写入是原子的
    ///
    /// 并发写入同一 ID 时由实体的唯一键保证至多写入一次，失败的一方得到 [`WriteError::Duplicate`]。
    fn persist(
        &mut self,
        id: &str,
        feature: &FeatureVector,
    ) -> impl Future<Output = Result<(), WriteError>> + Send;

    /// 释放连接
    fn close(self);
}

/// 读取特征向量并执行近邻查询
pub trait DbSelector: Send {
    /// 打开要查询的实体，实体不存在时后续查询均返回空结果
    fn open(&mut self, entity: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// 读取 `key_field` 等于 `key_value` 的所有向量
    fn get_feature_vectors(
        &mut self,
        key_field: &str,
        key_value: &str,
        vector_field: &str,
    ) -> impl Future<Output = Result<Vec<FeatureVector>, StoreError>> + Send;

    /// 返回距离 `query` 最近的至多 `k` 个元素，按距离升序排列
    fn get_nearest_neighbours(
        &mut self,
        k: usize,
        query: &FeatureVector,
        vector_field: &str,
        config: &QueryConfig,
    ) -> impl Future<Output = Result<Vec<DistanceElement>, StoreError>> + Send;

    /// 读取实体中的所有元组
    fn all_features(
        &mut self,
    ) -> impl Future<Output = Result<Vec<(String, FeatureVector)>, StoreError>> + Send;

    /// 释放连接
    fn close(self);
}

/// 存储层连接的提供者
pub trait Store: Send + Sync {
    type Writer: PersistencyWriter;
    type Selector: DbSelector;
    type Creator: EntityCreator;

    fn writer(&self) -> impl Future<Output = Result<Self::Writer, StoreError>> + Send;

    fn selector(&self) -> impl Future<Output = Result<Self::Selector, StoreError>> + Send;

    fn creator(&self) -> impl Future<Output = Result<Self::Creator, StoreError>> + Send;
}

/// 使用一个临时连接创建实体，连接在函数返回时释放（包括出错时）
pub async fn create_entity<S: Store>(
    store: &S,
    name: &str,
    unique_key: bool,
) -> Result<(), StoreError> {
    let mut creator = store.creator().await?;
    creator.create_entity(name, unique_key).await
}

/// 使用一个临时连接删除实体
pub async fn drop_entity<S: Store>(store: &S, name: &str) -> Result<(), StoreError> {
    let mut creator = store.creator().await?;
    creator.drop_entity(name).await
}

/// 使用一个临时连接查询实体元数据
pub async fn describe_entity<S: Store>(
    store: &S,
    name: &str,
) -> Result<Option<EntityInfo>, StoreError> {
    let mut creator = store.creator().await?;
    creator.describe_entity(name).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_name() {
        assert_eq!(entity_name("DominantChannelHistogram"), "features_DominantChannelHistogram");
    }

    #[test]
    fn test_validate_entity_name() {
        assert!(validate_entity_name("features_Abc_123").is_ok());
        assert!(validate_entity_name("entity_2").is_ok());
        for name in [
            "",
            "a b",
            "x\"; DROP TABLE entity; --",
            "features-x",
            "特征",
            "entity",
            "Entity",
            "_sqlx_migrations",
            "sqlite_master",
            "SQLITE_sequence",
        ] {
            assert!(
                matches!(validate_entity_name(name), Err(StoreError::InvalidEntityName(_))),
                "{name}"
            );
        }
    }
}
