use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use futures::TryStreamExt;
use log::{debug, info, warn};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::*;
use sqlx::{Connection, Sqlite, SqlitePool};

use super::*;

/// 近邻堆的最大预分配容量
const HEAP_PREALLOC: usize = 1024;

/// 基于 SQLite 的存储层
///
/// 每个实体对应一张表 `(id TEXT, feature BLOB)`，向量以小端 f32 序列存储。
/// 近邻查询为逐行扫描的精确搜索。
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// 打开数据库，不存在时创建
    pub async fn open(filename: impl AsRef<Path>) -> Result<Self, StoreError> {
        let filename = filename.as_ref();
        info!("初始化数据库连接: {}", filename.display());

        let options = SqliteConnectOptions::new()
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .filename(filename)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options).await?;

        debug!("检查数据库迁移");
        sqlx::migrate!().run(&pool).await?;

        Ok(Self { pool })
    }
}

impl Store for SqliteStore {
    type Writer = SqliteWriter;
    type Selector = SqliteSelector;
    type Creator = SqliteCreator;

    async fn writer(&self) -> Result<SqliteWriter, StoreError> {
        Ok(SqliteWriter { conn: self.pool.acquire().await?, entity: None })
    }

    async fn selector(&self) -> Result<SqliteSelector, StoreError> {
        Ok(SqliteSelector { conn: self.pool.acquire().await?, target: Target::Unopened })
    }

    async fn creator(&self) -> Result<SqliteCreator, StoreError> {
        Ok(SqliteCreator { conn: self.pool.acquire().await? })
    }
}

pub struct SqliteCreator {
    conn: PoolConnection<Sqlite>,
}

impl EntityCreator for SqliteCreator {
    async fn create_entity(&mut self, name: &str, unique_key: bool) -> Result<(), StoreError> {
        validate_entity_name(name)?;
        let table = if unique_key {
            format!(
                r#"CREATE TABLE IF NOT EXISTS "{name}"
                   (id TEXT PRIMARY KEY NOT NULL, feature BLOB NOT NULL)"#
            )
        } else {
            format!(
                r#"CREATE TABLE IF NOT EXISTS "{name}" (id TEXT NOT NULL, feature BLOB NOT NULL)"#
            )
        };

        let mut tx = self.conn.begin().await?;
        sqlx::query(&table).execute(&mut *tx).await?;
        if !unique_key {
            let index = format!(r#"CREATE INDEX IF NOT EXISTS "{name}_id" ON "{name}" (id)"#);
            sqlx::query(&index).execute(&mut *tx).await?;
        }
        sqlx::query("INSERT OR IGNORE INTO entity (name, unique_key) VALUES (?, ?)")
            .bind(name)
            .bind(unique_key)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!("创建实体: {name}");
        Ok(())
    }

    async fn drop_entity(&mut self, name: &str) -> Result<(), StoreError> {
        validate_entity_name(name)?;
        let mut tx = self.conn.begin().await?;
        sqlx::query(&format!(r#"DROP TABLE IF EXISTS "{name}""#)).execute(&mut *tx).await?;
        sqlx::query("DELETE FROM entity WHERE name = ?").bind(name).execute(&mut *tx).await?;
        tx.commit().await?;

        info!("删除实体: {name}");
        Ok(())
    }

    async fn exists_entity(&mut self, name: &str) -> Result<bool, StoreError> {
        Ok(read_meta(&mut self.conn, name).await?.is_some())
    }

    async fn describe_entity(&mut self, name: &str) -> Result<Option<EntityInfo>, StoreError> {
        let Some((unique_key, dimension)) = read_meta(&mut self.conn, name).await? else {
            return Ok(None);
        };
        let count: i64 = sqlx::query_scalar(&format!(r#"SELECT COUNT(*) FROM "{name}""#))
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(Some(EntityInfo { name: name.to_owned(), unique_key, dimension, count: count as u64 }))
    }
}

/// 已打开实体的状态
struct OpenEntity {
    name: String,
    dimension: Option<usize>,
}

pub struct SqliteWriter {
    conn: PoolConnection<Sqlite>,
    entity: Option<OpenEntity>,
}

impl SqliteWriter {
    fn entity(&self) -> Result<&OpenEntity, StoreError> {
        self.entity.as_ref().ok_or(StoreError::NotOpen)
    }
}

impl PersistencyWriter for SqliteWriter {
    async fn open(&mut self, entity: &str) -> Result<(), StoreError> {
        let Some((_, dimension)) = read_meta(&mut self.conn, entity).await? else {
            return Err(StoreError::EntityNotFound(entity.to_owned()));
        };
        debug!("打开实体 {entity} 用于写入");
        self.entity = Some(OpenEntity { name: entity.to_owned(), dimension });
        Ok(())
    }

    async fn exists(&mut self, id: &str) -> Result<bool, StoreError> {
        let sql = format!(r#"SELECT COUNT(*) FROM "{}" WHERE id = ?"#, self.entity()?.name);
        let count: i64 = sqlx::query_scalar(&sql).bind(id).fetch_one(&mut *self.conn).await?;
        Ok(count > 0)
    }

    async fn persist(&mut self, id: &str, feature: &FeatureVector) -> Result<(), WriteError> {
        let (name, known) = {
            let entity = self.entity()?;
            (entity.name.clone(), entity.dimension)
        };
        if let Some(expected) = known {
            if expected != feature.dimension() {
                return Err(WriteError::DimensionMismatch { expected, actual: feature.dimension() });
            }
        }

        let sql = format!(r#"INSERT INTO "{name}" (id, feature) VALUES (?, ?)"#);
        let blob = encode_vector(feature);

        let mut tx = self.conn.begin().await?;
        sqlx::query(&sql).bind(id).bind(blob).execute(&mut *tx).await.map_err(|err| {
            if let sqlx::Error::Database(e) = &err {
                if e.is_unique_violation() {
                    return WriteError::Duplicate(id.to_owned());
                }
            }
            WriteError::from(err)
        })?;

        // 第一次写入时记录实体维数，之后的写入都必须与其一致
        let mut dimension = known;
        if dimension.is_none() {
            sqlx::query("UPDATE entity SET dimension = ? WHERE name = ? AND dimension IS NULL")
                .bind(feature.dimension() as i64)
                .bind(&name)
                .execute(&mut *tx)
                .await?;
            let stored: Option<i64> =
                sqlx::query_scalar("SELECT dimension FROM entity WHERE name = ?")
                    .bind(&name)
                    .fetch_one(&mut *tx)
                    .await?;
            let stored = stored.map(|d| d as usize);
            if stored != Some(feature.dimension()) {
                return Err(WriteError::DimensionMismatch {
                    expected: stored.unwrap_or_default(),
                    actual: feature.dimension(),
                });
            }
            dimension = stored;
        }
        tx.commit().await?;

        if let Some(entity) = self.entity.as_mut() {
            entity.dimension = dimension;
        }
        Ok(())
    }

    fn close(self) {
        debug!("释放写入连接");
    }
}

enum Target {
    Unopened,
    Missing,
    Entity(String),
}

pub struct SqliteSelector {
    conn: PoolConnection<Sqlite>,
    target: Target,
}

impl SqliteSelector {
    /// 当前实体的表名，实体不存在时返回 None
    fn table(&self) -> Result<Option<String>, StoreError> {
        match &self.target {
            Target::Unopened => Err(StoreError::NotOpen),
            Target::Missing => Ok(None),
            Target::Entity(name) => Ok(Some(name.clone())),
        }
    }
}

impl DbSelector for SqliteSelector {
    async fn open(&mut self, entity: &str) -> Result<(), StoreError> {
        self.target = match read_meta(&mut self.conn, entity).await? {
            Some(_) => Target::Entity(entity.to_owned()),
            None => {
                warn!("实体 {entity} 不存在，查询结果将为空");
                Target::Missing
            }
        };
        Ok(())
    }

    async fn get_feature_vectors(
        &mut self,
        key_field: &str,
        key_value: &str,
        vector_field: &str,
    ) -> Result<Vec<FeatureVector>, StoreError> {
        let Some(table) = self.table()? else {
            return Ok(vec![]);
        };
        if key_field != ID_FIELD || vector_field != FEATURE_FIELD {
            warn!("实体 {table} 中不存在字段 {key_field} 或 {vector_field}");
            return Ok(vec![]);
        }
        let sql = format!(r#"SELECT feature FROM "{table}" WHERE id = ? ORDER BY rowid"#);
        let blobs: Vec<Vec<u8>> =
            sqlx::query_scalar(&sql).bind(key_value).fetch_all(&mut *self.conn).await?;
        Ok(blobs.iter().filter_map(|blob| decode_vector(blob)).collect())
    }

    async fn get_nearest_neighbours(
        &mut self,
        k: usize,
        query: &FeatureVector,
        vector_field: &str,
        config: &QueryConfig,
    ) -> Result<Vec<DistanceElement>, StoreError> {
        let Some(table) = self.table()? else {
            return Ok(vec![]);
        };
        if k == 0 {
            return Ok(vec![]);
        }
        if vector_field != FEATURE_FIELD {
            warn!("实体 {table} 中不存在字段 {vector_field}");
            return Ok(vec![]);
        }

        let distance = config.distance_or_default();
        let sql = format!(r#"SELECT id, feature FROM "{table}""#);
        // k 来自调用方，预分配量不能随它增长
        let mut heap = BinaryHeap::with_capacity(k.saturating_add(1).min(HEAP_PREALLOC));
        let mut skipped = 0usize;

        let mut rows = sqlx::query_as::<_, (String, Vec<u8>)>(&sql).fetch(&mut *self.conn);
        while let Some((id, blob)) = rows.try_next().await? {
            let Some(vector) = decode_vector(&blob) else {
                skipped += 1;
                continue;
            };
            if vector.dimension() != query.dimension() {
                skipped += 1;
                continue;
            }
            heap.push(Candidate { distance: distance.eval(query, &vector), id });
            if heap.len() > k {
                heap.pop();
            }
        }

        if skipped > 0 {
            warn!("跳过了 {skipped} 个维数不匹配或已损坏的向量");
        }

        let sorted = heap.into_sorted_vec().into_iter();
        Ok(sorted.map(|c| DistanceElement::new(c.id, c.distance)).collect())
    }

    async fn all_features(&mut self) -> Result<Vec<(String, FeatureVector)>, StoreError> {
        let Some(table) = self.table()? else {
            return Ok(vec![]);
        };
        let sql = format!(r#"SELECT id, feature FROM "{table}" ORDER BY rowid"#);
        let rows: Vec<(String, Vec<u8>)> = sqlx::query_as(&sql).fetch_all(&mut *self.conn).await?;
        Ok(rows
            .into_iter()
            .filter_map(|(id, blob)| decode_vector(&blob).map(|v| (id, v)))
            .collect())
    }

    fn close(self) {
        debug!("释放查询连接");
    }
}

/// 近邻候选，按 (距离, ID) 排序，保证结果确定
struct Candidate {
    distance: f64,
    id: String,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance.total_cmp(&other.distance).then_with(|| self.id.cmp(&other.id))
    }
}

/// 读取实体元数据 (unique_key, dimension)
async fn read_meta(
    conn: &mut PoolConnection<Sqlite>,
    name: &str,
) -> Result<Option<(bool, Option<usize>)>, StoreError> {
    validate_entity_name(name)?;
    let row: Option<(bool, Option<i64>)> =
        sqlx::query_as("SELECT unique_key, dimension FROM entity WHERE name = ?")
            .bind(name)
            .fetch_optional(&mut **conn)
            .await?;
    Ok(row.map(|(unique_key, dimension)| (unique_key, dimension.map(|d| d as usize))))
}

fn encode_vector(vector: &FeatureVector) -> Vec<u8> {
    let mut blob = vec![0u8; vector.dimension() * 4];
    LittleEndian::write_f32_into(vector, &mut blob);
    blob
}

fn decode_vector(blob: &[u8]) -> Option<FeatureVector> {
    if blob.len() % 4 != 0 {
        return None;
    }
    let mut vector = vec![0f32; blob.len() / 4];
    LittleEndian::read_f32_into(blob, &mut vector);
    Some(vector.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_blob() {
        let vector = FeatureVector::from([0.5, -1.25, 3.]);
        let blob = encode_vector(&vector);
        assert_eq!(blob.len(), 12);
        assert_eq!(&blob[..4], &0.5f32.to_le_bytes());
        assert_eq!(decode_vector(&blob), Some(vector));
        assert_eq!(decode_vector(&blob[..5]), None);
    }

    #[test]
    fn test_candidate_order() {
        let mut heap = BinaryHeap::new();
        for (id, distance) in [("b", 0.5), ("a", 0.5), ("c", 0.1), ("d", 0.9)] {
            heap.push(Candidate { distance, id: id.to_owned() });
            if heap.len() > 3 {
                heap.pop();
            }
        }
        let ids = heap.into_sorted_vec().into_iter().map(|c| c.id).collect::<Vec<_>>();
        assert_eq!(ids, ["c", "a", "b"]);
    }
}
