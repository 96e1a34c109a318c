use log::{debug, info, warn};
use thiserror::Error;

use crate::db::{self, PersistencyWriter, Store, StoreError, WriteError, entity_name};
use crate::feature::FeatureTransform;
use crate::metrics;
use crate::segment::Segment;
use crate::session::Session;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("存储层不可用: {0}")]
    Unavailable(#[source] StoreError),
    #[error("抽取器尚未初始化或已经结束")]
    NotInitialized,
    #[error("写入片段 {id} 失败: {source}")]
    Write {
        id: String,
        #[source]
        source: WriteError,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// 单个片段的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Processed {
    /// 片段已存在，未做任何处理
    Skipped,
    /// 计算并写入了特征向量
    Written,
}

/// 特征抽取流水线：特征变换 → 去重检查 → 写入
///
/// 抽取是幂等的，已经写入过的片段会被跳过，因此可以任意重试。
/// 抽取器本身不加锁，多个抽取器并发写入同一个片段时，依赖实体的唯一键保证至多写入一次。
pub struct FeatureExtractor<T, W> {
    transform: T,
    entity: String,
    session: Session<W>,
}

impl<T: FeatureTransform, W: PersistencyWriter> FeatureExtractor<T, W> {
    /// 创建抽取器，实体名为 `features_<变换名>`
    pub fn new(transform: T) -> Self {
        let entity = entity_name(transform.name());
        Self { transform, entity, session: Session::Uninitialized }
    }

    /// 使用指定的实体名
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = entity.into();
        self
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn transform(&self) -> &T {
        &self.transform
    }

    pub fn is_initialized(&self) -> bool {
        self.session.is_open()
    }

    /// 在存储层创建本抽取器使用的实体
    pub async fn initialize_persistent_layer<S: Store>(&self, store: &S) -> Result<(), StoreError> {
        db::create_entity(store, &self.entity, true).await
    }

    /// 删除本抽取器使用的实体
    pub async fn drop_persistent_layer<S: Store>(&self, store: &S) -> Result<(), StoreError> {
        db::drop_entity(store, &self.entity).await
    }

    /// 获取写入连接并打开实体，失败时不会处理任何片段
    pub async fn init<S>(&mut self, store: &S) -> Result<(), ExtractError>
    where
        S: Store<Writer = W>,
    {
        let mut writer = store.writer().await.map_err(ExtractError::Unavailable)?;
        writer.open(&self.entity).await.map_err(ExtractError::Unavailable)?;
        if let Some(old) = self.session.open(writer) {
            warn!("抽取器重复初始化，释放旧连接");
            old.close();
        }
        info!("抽取器已初始化: {}", self.entity);
        Ok(())
    }

    /// 处理一个片段
    ///
    /// 写入失败只影响当前片段，调用方可以继续处理其他片段。
    pub async fn process_segment(&mut self, segment: &Segment) -> Result<Processed, ExtractError> {
        let writer = self.session.get_mut().ok_or(ExtractError::NotInitialized)?;

        if writer.exists(segment.id()).await? {
            debug!("跳过已存在的片段: {}", segment.id());
            metrics::inc_extracted(Processed::Skipped);
            return Ok(Processed::Skipped);
        }

        let feature = self.transform.vector(segment);
        writer
            .persist(segment.id(), &feature)
            .await
            .map_err(|source| ExtractError::Write { id: segment.id().to_owned(), source })?;

        metrics::inc_extracted(Processed::Written);
        Ok(Processed::Written)
    }

    /// 释放连接，可以重复调用
    pub fn finish(&mut self) {
        if let Some(writer) = self.session.finish() {
            writer.close();
            info!("抽取器已结束: {}", self.entity);
        }
    }
}
