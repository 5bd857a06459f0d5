
use super::{QueryHit, RawHit, TEXT_COLUMNS};
use crate::{FaqError, config::VectorStoreConfig};
use arrow::array::{Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection, Table,
    query::{ExecutableQuery, QueryBase},
};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Vector database store using LanceDB for similarity search
pub struct VectorStore {
    connection: Connection,
    table_name: String,
    dimension: usize,
}

impl VectorStore {
    /// Connect using the configured URI and table name
    ///
    /// # Arguments
    /// * `config` - Vector store section of the application configuration
    /// * `dimension` - Length of the vectors this store will hold
    #[inline]
    pub async fn connect(config: &VectorStoreConfig, dimension: usize) -> Result<Self, FaqError> {
        Self::open(&config.uri, &config.table_name, dimension).await
    }

    /// Open a LanceDB connection at `uri`.
    ///
    /// Plain paths are treated as local directories and created if missing;
    /// anything with a scheme (`s3://`, `db://`, ...) is passed to LanceDB as is.
    #[inline]
    pub async fn open(uri: &str, table_name: &str, dimension: usize) -> Result<Self, FaqError> {
        if !uri.contains("://") {
            std::fs::create_dir_all(Path::new(uri)).map_err(|e| {
                FaqError::Database(format!("Failed to create vector database directory: {}", e))
            })?;
        }

        debug!("Connecting to LanceDB at {}", uri);
        let connection = lancedb::connect(uri)
            .execute()
            .await
            .map_err(|e| FaqError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        let store = Self {
            connection,
            table_name: table_name.to_string(),
            dimension,
        };

        if store.table_exists().await? {
            match store.detect_table_dimension().await {
                Ok(existing) if existing != dimension => warn!(
                    "Table {} holds {}-dimensional vectors but {} were configured; reset it before querying",
                    store.table_name, existing, dimension
                ),
                Ok(_) => debug!("Table {} already exists", store.table_name),
                Err(e) => warn!("Could not detect vector dimension of {}: {}", store.table_name, e),
            }
        }

        info!("Vector store ready (table {})", store.table_name);
        Ok(store)
    }

    #[inline]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Vector width of the stored table, `None` when the table does not exist yet
    #[inline]
    pub async fn table_dimension(&self) -> Result<Option<usize>, FaqError> {
        if !self.table_exists().await? {
            return Ok(None);
        }
        self.detect_table_dimension().await.map(Some)
    }

    async fn table_exists(&self) -> Result<bool, FaqError> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| FaqError::Database(format!("Failed to list tables: {}", e)))?;

        Ok(table_names.contains(&self.table_name))
    }

    async fn open_table(&self) -> Result<Table, FaqError> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| FaqError::Database(format!("Failed to open table: {}", e)))
    }

    /// Detect vector dimension from existing table schema
    async fn detect_table_dimension(&self) -> Result<usize, FaqError> {
        let schema = self
            .open_table()
            .await?
            .schema()
            .await
            .map_err(|e| FaqError::Database(format!("Failed to get table schema: {}", e)))?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return Ok(*size as usize);
                }
            }
        }

        Err(FaqError::Database(
            "Could not find vector column or determine dimension".to_string(),
        ))
    }

    /// Create schema with the specified vector dimension
    fn create_schema(vector_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("document", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    vector_dim as i32,
                ),
                false,
            ),
            Field::new("metadata", DataType::Utf8, true),
        ]))
    }

    /// Drop the table if present and recreate it empty for `dimension`-length
    /// vectors. Everything stored before is lost.
    #[inline]
    pub async fn reset_collection(&mut self, dimension: usize) -> Result<(), FaqError> {
        info!(
            "Resetting table {} for {}-dimensional vectors",
            self.table_name, dimension
        );

        self.drop_table_if_exists().await?;

        self.connection
            .create_empty_table(&self.table_name, Self::create_schema(dimension))
            .execute()
            .await
            .map_err(|e| FaqError::Database(format!("Failed to create table: {}", e)))?;

        self.dimension = dimension;
        Ok(())
    }

    async fn drop_table_if_exists(&self) -> Result<(), FaqError> {
        if self.table_exists().await? {
            info!("Dropping existing table {}", self.table_name);
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| FaqError::Database(format!("Failed to drop table: {}", e)))?;
        }

        Ok(())
    }

    /// Insert one row per index of the parallel arrays, in a single write
    ///
    /// # Arguments
    /// * `ids` - Unique row identifiers
    /// * `texts` - Text each vector was embedded from
    /// * `vectors` - Embeddings, all of the store's dimension
    /// * `metadatas` - Per-row metadata objects, stored as JSON
    #[inline]
    pub async fn insert(
        &self,
        ids: &[String],
        texts: &[String],
        vectors: &[Vec<f32>],
        metadatas: &[Map<String, Value>],
    ) -> Result<(), FaqError> {
        let len = ids.len();
        if texts.len() != len || vectors.len() != len || metadatas.len() != len {
            return Err(FaqError::Database(format!(
                "Insert arrays differ in length: {} ids, {} texts, {} vectors, {} metadatas",
                len,
                texts.len(),
                vectors.len(),
                metadatas.len()
            )));
        }

        if len == 0 {
            debug!("No rows to insert");
            return Ok(());
        }

        let mut seen = HashSet::with_capacity(len);
        if let Some(duplicate) = ids.iter().find(|id| !seen.insert(id.as_str())) {
            return Err(FaqError::Database(format!(
                "Duplicate id in insert batch: {}",
                duplicate
            )));
        }

        let record_batch = self.create_record_batch(ids, texts, vectors, metadatas)?;

        let table = self.open_table().await?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| FaqError::Database(format!("Failed to insert rows: {}", e)))?;

        info!("Inserted {} rows into {}", len, self.table_name);
        Ok(())
    }

    fn create_record_batch(
        &self,
        ids: &[String],
        texts: &[String],
        vectors: &[Vec<f32>],
        metadatas: &[Map<String, Value>],
    ) -> Result<RecordBatch, FaqError> {
        let mut flat_values = Vec::with_capacity(vectors.len() * self.dimension);
        for (id, vector) in ids.iter().zip(vectors) {
            if vector.len() != self.dimension {
                return Err(FaqError::Database(format!(
                    "Vector for {} has {} dimensions, table expects {}",
                    id,
                    vector.len(),
                    self.dimension
                )));
            }
            flat_values.extend_from_slice(vector);
        }

        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let vector_array = FixedSizeListArray::try_new(
            field,
            self.dimension as i32,
            Arc::new(Float32Array::from(flat_values)),
            None,
        )
        .map_err(|e| FaqError::Database(format!("Failed to create vector array: {}", e)))?;

        let metadata_json = metadatas
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| FaqError::Database(format!("Failed to encode metadata: {}", e)))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from_iter_values(ids)),
            Arc::new(StringArray::from_iter_values(texts)),
            Arc::new(vector_array),
            Arc::new(StringArray::from_iter_values(metadata_json)),
        ];

        RecordBatch::try_new(Self::create_schema(self.dimension), arrays)
            .map_err(|e| FaqError::Database(format!("Failed to create record batch: {}", e)))
    }

    /// Return up to `k` rows nearest to `vector`, closest first.
    ///
    /// A missing or empty table yields no rows.
    #[inline]
    pub async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<QueryHit>, FaqError> {
        debug!("Searching {} for {} nearest rows", self.table_name, k);

        if k == 0 || !self.has_rows().await? {
            return Ok(Vec::new());
        }

        let results = self
            .open_table()
            .await?
            .vector_search(vector)
            .map_err(|e| FaqError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .limit(k)
            .execute()
            .await
            .map_err(|e| FaqError::Database(format!("Failed to execute search: {}", e)))?;

        let mut hits = Self::parse_search_results_stream(results).await?;

        // Best match first
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        Ok(hits)
    }

    async fn parse_search_results_stream(
        mut results: lancedb::arrow::SendableRecordBatchStream,
    ) -> Result<Vec<QueryHit>, FaqError> {
        let mut hits = Vec::new();

        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| FaqError::Database(format!("Failed to read result stream: {}", e)))?
        {
            hits.extend(Self::parse_search_batch(&batch)?.into_iter().map(QueryHit::from));
        }

        debug!("Parsed {} search results from stream", hits.len());
        Ok(hits)
    }

    /// Read raw rows out of a result batch. Only `id` is required; text,
    /// metadata and distance columns are picked up when present.
    fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<RawHit>, FaqError> {
        let ids = string_column(batch, "id")
            .ok_or_else(|| FaqError::Database("Missing or invalid id column".to_string()))?;

        let [documents, texts, payloads] = TEXT_COLUMNS.map(|name| string_column(batch, name));
        let metadatas = string_column(batch, "metadata");
        let distances = batch
            .column_by_name("_distance")
            .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

        let value_at = |column: Option<&StringArray>, row: usize| {
            column
                .filter(|c| !c.is_null(row))
                .map(|c| c.value(row).to_string())
        };

        let raw_hits = (0..batch.num_rows())
            .map(|row| RawHit {
                id: ids.value(row).to_string(),
                document: value_at(documents, row),
                text: value_at(texts, row),
                payload: value_at(payloads, row),
                metadata: value_at(metadatas, row),
                distance: distances.filter(|d| !d.is_null(row)).map(|d| d.value(row)),
            })
            .collect();

        Ok(raw_hits)
    }

    /// Whether the table exists and holds at least one row
    #[inline]
    pub async fn has_rows(&self) -> Result<bool, FaqError> {
        Ok(self.count_rows().await? > 0)
    }

    /// Number of rows in the table; 0 when the table does not exist
    #[inline]
    pub async fn count_rows(&self) -> Result<u64, FaqError> {
        if !self.table_exists().await? {
            return Ok(0);
        }

        let count = self
            .open_table()
            .await?
            .count_rows(None)
            .await
            .map_err(|e| FaqError::Database(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Option<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|col| col.as_any().downcast_ref::<StringArray>())
}
