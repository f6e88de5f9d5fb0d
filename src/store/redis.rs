//! Redis vector-search backend.
//!
//! Chunks live in hashes keyed `doc:{filename}:{chunk_index}`, indexed by
//! a FLAT (exact) vector field. FLAT search is deterministic for a given
//! data set, unlike the approximate Atlas variant. The engine reports a
//! *distance* per hit (lower is closer); this store inverts it so callers
//! get the common higher-is-better score.
//!
//! Index creation is check-then-create and therefore racy across
//! processes; the create call treats "already exists" as success, which
//! makes `ensure_index` safe under at-least-once semantics. An index that
//! already exists is trusted as-is: the index name is expected to encode
//! the deployment's embedding configuration.

use async_trait::async_trait;
use redis::Value;
use tracing::debug;
use tracing::info;

use crate::config::AppConfig;
use crate::errors::DocRagError;
use crate::errors::Result;
use crate::store::ChunkRecord;
use crate::store::Metric;
use crate::store::ScoredChunk;
use crate::store::VectorStore;

const BACKEND: &str = "redis";

/// Alias applied to the KNN distance in search replies.
const SCORE_FIELD: &str = "score";

pub struct RedisVectorStore {
    client: redis::Client,
    index_name: String,
    key_prefix: String,
    dimension: usize,
}

impl RedisVectorStore {
    pub fn connect(config: &AppConfig) -> Result<Self> {
        let redis_config = &config.store.redis;
        let client = redis::Client::open(redis_config.url.as_str())
            .map_err(|e| DocRagError::store(BACKEND, "connect", e))?;

        Ok(Self {
            client,
            index_name: redis_config.index_name.clone(),
            key_prefix: redis_config.key_prefix.clone(),
            dimension: config.embeddings.dimension,
        })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|e| DocRagError::store(BACKEND, "connect", e))
    }

    async fn create_index(
        &self,
        dimension: usize,
        metric: Metric,
        conn: &mut redis::aio::MultiplexedConnection,
    ) -> Result<()> {
        info!(
            "creating vector index '{}' ({}d, {})",
            self.index_name,
            dimension,
            metric.as_redis_str()
        );
        let result = redis::cmd("FT.CREATE")
            .arg(&self.index_name)
            .arg("ON")
            .arg("HASH")
            .arg("PREFIX")
            .arg(1)
            .arg(&self.key_prefix)
            .arg("SCHEMA")
            .arg("chunk")
            .arg("TEXT")
            .arg("filename")
            .arg("TEXT")
            .arg("filepath")
            .arg("TEXT")
            .arg("chunk_index")
            .arg("TEXT")
            .arg("embedding")
            .arg("VECTOR")
            .arg("FLAT")
            .arg(6)
            .arg("TYPE")
            .arg("FLOAT32")
            .arg("DIM")
            .arg(dimension)
            .arg("DISTANCE_METRIC")
            .arg(metric.as_redis_str())
            .query_async::<()>(conn)
            .await;

        match result {
            Ok(()) => Ok(()),
            // Another writer won the create race; that is a success here.
            Err(err) if is_index_exists(&err) => {
                debug!("vector index '{}' created concurrently", self.index_name);
                Ok(())
            }
            Err(err) => Err(DocRagError::store(BACKEND, "FT.CREATE", err)),
        }
    }
}

#[async_trait]
impl VectorStore for RedisVectorStore {
    async fn ensure_index(&self, dimension: usize, metric: Metric) -> Result<()> {
        let mut conn = self.connection().await?;
        match redis::cmd("FT.INFO")
            .arg(&self.index_name)
            .query_async::<Value>(&mut conn)
            .await
        {
            Ok(_) => Ok(()),
            Err(err) if is_unknown_index(&err) => {
                self.create_index(dimension, metric, &mut conn).await
            }
            Err(err) => Err(DocRagError::store(BACKEND, "FT.INFO", err)),
        }
    }

    async fn upsert_record(&self, record: &ChunkRecord) -> Result<()> {
        if record.embedding.len() != self.dimension {
            return Err(DocRagError::DimensionMismatch {
                expected: self.dimension,
                actual: record.embedding.len(),
            });
        }
        let key = format!(
            "{}{}:{}",
            self.key_prefix, record.filename, record.chunk_index
        );
        let mut conn = self.connection().await?;
        redis::cmd("HSET")
            .arg(&key)
            .arg("chunk")
            .arg(&record.chunk)
            .arg("filename")
            .arg(&record.filename)
            .arg("filepath")
            .arg(&record.filepath)
            .arg("chunk_index")
            .arg(record.chunk_index.to_string())
            .arg("embedding")
            .arg(encode_vector(&record.embedding))
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| DocRagError::store(BACKEND, "upsert_record", e))?;
        Ok(())
    }

    async fn search(&self, query_vector: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>> {
        if query_vector.len() != self.dimension {
            return Err(DocRagError::DimensionMismatch {
                expected: self.dimension,
                actual: query_vector.len(),
            });
        }
        let mut conn = self.connection().await?;
        let knn = format!("*=>[KNN {top_k} @embedding $vec AS {SCORE_FIELD}]");
        let reply = redis::cmd("FT.SEARCH")
            .arg(&self.index_name)
            .arg(knn)
            .arg("PARAMS")
            .arg(2)
            .arg("vec")
            .arg(encode_vector(query_vector))
            .arg("SORTBY")
            .arg(SCORE_FIELD)
            .arg("RETURN")
            .arg(5)
            .arg("chunk")
            .arg("filename")
            .arg("filepath")
            .arg("chunk_index")
            .arg(SCORE_FIELD)
            .arg("DIALECT")
            .arg(2)
            .query_async::<Value>(&mut conn)
            .await
            .map_err(|e| DocRagError::store(BACKEND, "search", e))?;

        parse_search_reply(&reply)
    }
}

/// Serialize an embedding the way the index schema declares it: packed
/// little-endian 32-bit floats. Any other width or byte order would not
/// fail loudly, it would just match nothing.
fn encode_vector(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Decode a RESP search reply: a count header followed by alternating
/// document keys and field-value arrays. The KNN distance comes back
/// under [`SCORE_FIELD`] and is normalized to higher-is-better here,
/// which preserves the engine's ascending-distance order as descending
/// score.
fn parse_search_reply(reply: &Value) -> Result<Vec<ScoredChunk>> {
    let Value::Array(items) = reply else {
        return Err(malformed("reply is not an array"));
    };
    let Some((_total, documents)) = items.split_first() else {
        return Err(malformed("reply is missing the count header"));
    };

    let mut results = Vec::new();
    for pair in documents.chunks(2) {
        let [_key, fields] = pair else {
            return Err(malformed("dangling document key"));
        };
        let Value::Array(fields) = fields else {
            return Err(malformed("document fields are not an array"));
        };

        let mut chunk = None;
        let mut filename = None;
        let mut filepath = None;
        let mut chunk_index = None;
        let mut distance = None;
        for field in fields.chunks(2) {
            let [name, value] = field else { continue };
            match field_text(name).as_deref() {
                Some("chunk") => chunk = field_text(value),
                Some("filename") => filename = field_text(value),
                Some("filepath") => filepath = field_text(value),
                Some("chunk_index") => chunk_index = field_text(value),
                Some(SCORE_FIELD) => distance = field_text(value),
                _ => {}
            }
        }

        let distance: f32 = distance
            .ok_or_else(|| malformed("document is missing the distance field"))?
            .parse()
            .map_err(|_| malformed("distance is not a float"))?;
        let chunk_index: usize = chunk_index
            .ok_or_else(|| malformed("document is missing chunk_index"))?
            .parse()
            .map_err(|_| malformed("chunk_index is not an integer"))?;

        results.push(ScoredChunk {
            chunk: chunk.ok_or_else(|| malformed("document is missing chunk"))?,
            filename: filename.ok_or_else(|| malformed("document is missing filename"))?,
            filepath: filepath.ok_or_else(|| malformed("document is missing filepath"))?,
            chunk_index,
            score: 1.0 - distance,
        });
    }
    Ok(results)
}

fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::BulkString(bytes) => String::from_utf8(bytes.clone()).ok(),
        Value::SimpleString(text) => Some(text.clone()),
        Value::Int(number) => Some(number.to_string()),
        _ => None,
    }
}

fn malformed(detail: &str) -> DocRagError {
    DocRagError::store(BACKEND, "search", format!("malformed search reply: {detail}"))
}

fn is_unknown_index(err: &redis::RedisError) -> bool {
    let message = err.to_string().to_ascii_lowercase();
    message.contains("unknown index") || message.contains("no such index")
}

fn is_index_exists(err: &redis::RedisError) -> bool {
    err.to_string().to_ascii_lowercase().contains("index already exists")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreBackend;

    fn bulk(text: &str) -> Value {
        Value::BulkString(text.as_bytes().to_vec())
    }

    fn document(key: &str, chunk: &str, index: &str, distance: &str) -> [Value; 2] {
        [
            bulk(key),
            Value::Array(vec![
                bulk("chunk"),
                bulk(chunk),
                bulk("filename"),
                bulk("doc.txt"),
                bulk("filepath"),
                bulk("/data/doc.txt"),
                bulk("chunk_index"),
                bulk(index),
                bulk("score"),
                bulk(distance),
            ]),
        ]
    }

    #[test]
    fn vectors_encode_as_packed_little_endian_f32() {
        let bytes = encode_vector(&[1.0, -2.0]);
        assert_eq!(bytes, vec![0x00, 0x00, 0x80, 0x3f, 0x00, 0x00, 0x00, 0xc0]);
    }

    #[test]
    fn distances_invert_into_descending_scores() {
        let mut items = vec![Value::Int(2)];
        items.extend(document("doc:doc.txt:0", "closest", "0", "0.1"));
        items.extend(document("doc:doc.txt:1", "further", "1", "0.4"));
        let reply = Value::Array(items);

        let results = parse_search_reply(&reply).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk, "closest");
        assert!((results[0].score - 0.9).abs() < 1e-6);
        assert!((results[1].score - 0.6).abs() < 1e-6);
        assert!(results[0].score > results[1].score);
        assert_eq!(results[1].chunk_index, 1);
    }

    #[test]
    fn empty_reply_yields_no_chunks() {
        let reply = Value::Array(vec![Value::Int(0)]);
        assert_eq!(parse_search_reply(&reply).unwrap(), vec![]);
    }

    #[test]
    fn missing_distance_field_is_an_error() {
        let reply = Value::Array(vec![
            Value::Int(1),
            bulk("doc:doc.txt:0"),
            Value::Array(vec![bulk("chunk"), bulk("text")]),
        ]);
        assert!(parse_search_reply(&reply).is_err());
    }

    #[test]
    fn recognizes_index_lifecycle_errors() {
        let unknown = redis::RedisError::from((
            redis::ErrorKind::ResponseError,
            "",
            "Unknown index name".to_string(),
        ));
        assert!(is_unknown_index(&unknown));
        assert!(!is_index_exists(&unknown));

        let exists = redis::RedisError::from((
            redis::ErrorKind::ResponseError,
            "",
            "Index already exists".to_string(),
        ));
        assert!(is_index_exists(&exists));
        assert!(!is_unknown_index(&exists));
    }

    #[tokio::test]
    async fn wrong_query_dimension_is_rejected_before_any_backend_call() {
        let mut config = AppConfig::default();
        config.store.backend = StoreBackend::Redis;
        let store = RedisVectorStore::connect(&config).unwrap();
        let err = store.search(&[0.0; 4], 3).await.unwrap_err();
        assert!(matches!(
            err,
            DocRagError::DimensionMismatch {
                expected: 1536,
                actual: 4
            }
        ));
    }
}
