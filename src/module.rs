use crate::db::{Store, StoreError};
use crate::extractor::{ExtractError, FeatureExtractor, Processed};
use crate::feature::FeatureTransform;
use crate::query::{QueryConfig, RetrieverConfig};
use crate::retriever::{FeatureRetriever, RetrieveError};
use crate::score::ScoreElement;
use crate::segment::Segment;

/// 特征模块：在同一个实体上同时负责抽取和检索
///
/// 抽取和检索共享同一个特征变换和实体名，保证存储的向量与查询向量可比。
pub struct FeatureModule<T, S: Store> {
    extractor: FeatureExtractor<T, S::Writer>,
    retriever: FeatureRetriever<T, S::Selector>,
}

impl<T, S> FeatureModule<T, S>
where
    T: FeatureTransform + Clone,
    S: Store,
{
    pub fn new(transform: T, config: RetrieverConfig) -> Self {
        Self {
            extractor: FeatureExtractor::new(transform.clone()),
            retriever: FeatureRetriever::new(transform, config),
        }
    }

    /// 使用指定的实体名
    pub fn with_entity(self, entity: impl Into<String>) -> Self {
        let entity = entity.into();
        Self {
            extractor: self.extractor.with_entity(entity.clone()),
            retriever: self.retriever.with_entity(entity),
        }
    }

    pub fn entity(&self) -> &str {
        self.extractor.entity()
    }

    pub async fn initialize_persistent_layer(&self, store: &S) -> Result<(), StoreError> {
        self.extractor.initialize_persistent_layer(store).await
    }

    pub async fn drop_persistent_layer(&self, store: &S) -> Result<(), StoreError> {
        self.extractor.drop_persistent_layer(store).await
    }

    /// 同时获取写入连接和查询连接，任意一个失败都会释放已获取的连接
    pub async fn init(&mut self, store: &S) -> Result<(), ExtractError> {
        self.extractor.init(store).await?;
        if let Err(err) = self.retriever.init(store).await {
            self.extractor.finish();
            return Err(match err {
                RetrieveError::Unavailable(e) => ExtractError::Unavailable(e),
                RetrieveError::Store(e) => ExtractError::Store(e),
                RetrieveError::NotInitialized => ExtractError::NotInitialized,
            });
        }
        Ok(())
    }

    pub async fn process_segment(&mut self, segment: &Segment) -> Result<Processed, ExtractError> {
        self.extractor.process_segment(segment).await
    }

    pub async fn get_similar(
        &mut self,
        segment: &Segment,
        config: &QueryConfig,
    ) -> Result<Vec<ScoreElement>, RetrieveError> {
        self.retriever.get_similar(segment, config).await
    }

    pub async fn get_similar_by_id(
        &mut self,
        id: &str,
        config: &QueryConfig,
    ) -> Result<Vec<ScoreElement>, RetrieveError> {
        self.retriever.get_similar_by_id(id, config).await
    }

    pub fn finish(&mut self) {
        self.extractor.finish();
        self.retriever.finish();
    }
}
