use std::time::Instant;

use log::{debug, info, warn};
use thiserror::Error;

use crate::db::{self, DbSelector, FEATURE_FIELD, ID_FIELD, Store, StoreError, entity_name};
use crate::feature::{FeatureTransform, FeatureVector};
use crate::metrics;
use crate::query::{QueryConfig, RetrieverConfig};
use crate::score::{CorrespondenceFunction, ScoreElement, to_scores};
use crate::segment::Segment;
use crate::session::Session;

#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error("存储层不可用: {0}")]
    Unavailable(#[source] StoreError),
    #[error("检索器尚未初始化或已经结束")]
    NotInitialized,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// 基于内容的检索流水线
///
/// 查询片段使用与抽取时相同的特征变换，再通过近邻查询和对应函数得到按相似度降序排列的结果。
pub struct FeatureRetriever<T, S> {
    transform: T,
    entity: String,
    config: RetrieverConfig,
    session: Session<S>,
}

impl<T: FeatureTransform, S: DbSelector> FeatureRetriever<T, S> {
    /// 创建检索器，实体名为 `features_<变换名>`
    pub fn new(transform: T, config: RetrieverConfig) -> Self {
        let entity = entity_name(transform.name());
        Self { transform, entity, config, session: Session::Uninitialized }
    }

    /// 使用指定的实体名
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = entity.into();
        self
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.session.is_open()
    }

    /// 在存储层创建本检索器读取的实体
    pub async fn initialize_persistent_layer<St: Store>(
        &self,
        store: &St,
    ) -> Result<(), StoreError> {
        db::create_entity(store, &self.entity, true).await
    }

    /// 删除本检索器读取的实体
    pub async fn drop_persistent_layer<St: Store>(&self, store: &St) -> Result<(), StoreError> {
        db::drop_entity(store, &self.entity).await
    }

    /// 获取查询连接并打开实体
    pub async fn init<St>(&mut self, store: &St) -> Result<(), RetrieveError>
    where
        St: Store<Selector = S>,
    {
        let mut selector = store.selector().await.map_err(RetrieveError::Unavailable)?;
        selector.open(&self.entity).await.map_err(RetrieveError::Unavailable)?;
        if let Some(old) = self.session.open(selector) {
            warn!("检索器重复初始化，释放旧连接");
            old.close();
        }
        debug!("检索器已初始化: {}", self.entity);
        Ok(())
    }

    /// 查找与给定片段内容相似的片段
    pub async fn get_similar(
        &mut self,
        segment: &Segment,
        config: &QueryConfig,
    ) -> Result<Vec<ScoreElement>, RetrieveError> {
        let start = Instant::now();
        let query = self.transform.vector(segment);
        let result = self.similar_to_vector(&query, config).await?;
        metrics::observe_search("segment", start.elapsed().as_secs_f64(), &result);
        Ok(result)
    }

    /// 查找与已入库片段相似的片段，ID 不存在时返回空结果
    pub async fn get_similar_by_id(
        &mut self,
        id: &str,
        config: &QueryConfig,
    ) -> Result<Vec<ScoreElement>, RetrieveError> {
        let start = Instant::now();
        let selector = self.session.get_mut().ok_or(RetrieveError::NotInitialized)?;
        let vectors = selector.get_feature_vectors(ID_FIELD, id, FEATURE_FIELD).await?;
        let Some(query) = vectors.into_iter().next() else {
            debug!("片段 {id} 不存在");
            return Ok(vec![]);
        };
        let result = self.similar_to_vector(&query, config).await?;
        metrics::observe_search("id", start.elapsed().as_secs_f64(), &result);
        Ok(result)
    }

    /// 默认的对应函数：最大距离由特征变换决定的线性函数
    pub fn default_correspondence(&self) -> CorrespondenceFunction {
        CorrespondenceFunction::linear(self.transform.max_distance() as f64)
    }

    async fn similar_to_vector(
        &mut self,
        query: &FeatureVector,
        config: &QueryConfig,
    ) -> Result<Vec<ScoreElement>, RetrieveError> {
        let k = config.max_results.unwrap_or(self.config.max_results_per_module);
        let function = config.correspondence.unwrap_or_else(|| self.default_correspondence());
        let selector = self.session.get_mut().ok_or(RetrieveError::NotInitialized)?;
        let distances = selector.get_nearest_neighbours(k, query, FEATURE_FIELD, config).await?;
        debug!("近邻查询返回 {} 个结果", distances.len());
        Ok(to_scores(distances, function))
    }

    /// 释放连接，可以重复调用
    pub fn finish(&mut self) {
        if let Some(selector) = self.session.finish() {
            selector.close();
            info!("检索器已结束: {}", self.entity);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::feature::DominantChannelHistogram;
    use crate::score::DistanceElement;
    use crate::segment::{Frame, Pixel};

    /// 返回固定距离列表的查询器，并记录收到的查询
    #[derive(Default)]
    struct Fixed {
        stored: Vec<(String, FeatureVector)>,
        distances: Vec<DistanceElement>,
        queries: Arc<Mutex<Vec<(usize, FeatureVector)>>>,
        closed: Arc<Mutex<usize>>,
    }

    impl DbSelector for Fixed {
        async fn open(&mut self, _: &str) -> Result<(), StoreError> {
            Ok(())
        }

        async fn get_feature_vectors(
            &mut self,
            _: &str,
            key_value: &str,
            _: &str,
        ) -> Result<Vec<FeatureVector>, StoreError> {
            let matched = self.stored.iter().filter(|(id, _)| id == key_value);
            Ok(matched.map(|(_, v)| v.clone()).collect())
        }

        async fn get_nearest_neighbours(
            &mut self,
            k: usize,
            query: &FeatureVector,
            _: &str,
            _: &QueryConfig,
        ) -> Result<Vec<DistanceElement>, StoreError> {
            self.queries.lock().unwrap().push((k, query.clone()));
            Ok(self.distances.iter().take(k).cloned().collect())
        }

        async fn all_features(&mut self) -> Result<Vec<(String, FeatureVector)>, StoreError> {
            Ok(self.stored.clone())
        }

        fn close(self) {
            *self.closed.lock().unwrap() += 1;
        }
    }

    fn retriever(selector: Fixed) -> FeatureRetriever<DominantChannelHistogram, Fixed> {
        let mut retriever =
            FeatureRetriever::new(DominantChannelHistogram, RetrieverConfig::default());
        retriever.session.open(selector);
        retriever
    }

    fn red_segment() -> Segment {
        Segment::new("q", vec![Frame::new(1, 1, vec![Pixel::new(200, 50, 50, 255)]).unwrap()])
    }

    fn distances() -> Vec<DistanceElement> {
        vec![
            DistanceElement::new("a", 0.),
            DistanceElement::new("b", 0.4),
            DistanceElement::new("c", 1.5),
        ]
    }

    #[tokio::test]
    async fn test_default_max_results_and_correspondence() {
        let queries = Arc::new(Mutex::new(vec![]));
        let mut retriever = retriever(Fixed {
            distances: distances(),
            queries: queries.clone(),
            ..Default::default()
        });

        let result = retriever.get_similar(&red_segment(), &QueryConfig::new()).await.unwrap();

        assert_eq!(
            result,
            [ScoreElement::new("a", 1.), ScoreElement::new("b", 0.6), ScoreElement::new("c", 0.)]
        );
        let queries = queries.lock().unwrap();
        assert_eq!(queries[0].0, RetrieverConfig::DEFAULT_MAX_RESULTS);
        assert_eq!(queries[0].1.as_slice(), &[1., 0., 0.]);
    }

    #[tokio::test]
    async fn test_query_config_overrides() {
        let queries = Arc::new(Mutex::new(vec![]));
        let mut retriever = retriever(Fixed {
            distances: distances(),
            queries: queries.clone(),
            ..Default::default()
        });
        let config = QueryConfig::new()
            .max_results(2)
            .correspondence(CorrespondenceFunction::hyperbolic(0.4));

        let result = retriever.get_similar(&red_segment(), &config).await.unwrap();

        assert_eq!(result, [ScoreElement::new("a", 1.), ScoreElement::new("b", 0.5)]);
        assert_eq!(queries.lock().unwrap()[0].0, 2);
    }

    #[tokio::test]
    async fn test_unknown_id_is_empty() {
        let queries = Arc::new(Mutex::new(vec![]));
        let mut retriever = retriever(Fixed {
            distances: distances(),
            queries: queries.clone(),
            ..Default::default()
        });
        let result = retriever.get_similar_by_id("missing", &QueryConfig::new()).await.unwrap();
        assert!(result.is_empty());
        assert!(queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_both_paths_agree() {
        let segment = red_segment();
        let stored = vec![("q".to_owned(), DominantChannelHistogram.vector(&segment))];
        let mut retriever =
            retriever(Fixed { stored, distances: distances(), ..Default::default() });
        let config = QueryConfig::new();

        let by_segment = retriever.get_similar(&segment, &config).await.unwrap();
        let by_id = retriever.get_similar_by_id("q", &config).await.unwrap();
        assert_eq!(by_segment, by_id);
    }

    #[tokio::test]
    async fn test_finish() {
        let closed = Arc::new(Mutex::new(0));
        let mut retriever = retriever(Fixed { closed: closed.clone(), ..Default::default() });
        retriever.finish();
        retriever.finish();
        assert_eq!(*closed.lock().unwrap(), 1);
        assert!(matches!(
            retriever.get_similar(&red_segment(), &QueryConfig::new()).await,
            Err(RetrieveError::NotInitialized)
        ));
    }
}
