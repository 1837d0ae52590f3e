#[cfg(test)]
mod tests;

use super::{ImportSummary, ScoredRecord, StoreLocation, TABLE_NAME};
use crate::database::records::{RawRecord, Record};
use crate::embeddings::EmbeddingGenerator;
use crate::{AgentError, Result};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray,
    TimestampSecondArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::DateTime;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use std::sync::Arc;
use tracing::{debug, info, warn};

const EMBEDDING_COLUMN: &str = "embedding";
const DISTANCE_COLUMN: &str = "_distance";

/// Record table with exact cosine similarity search
///
/// Opening the store provisions the table; [`VectorStore::close`] releases the
/// connection, after which every call fails with `AgentError::StoreClosed`.
/// Calls are not synchronized: one caller at a time.
pub struct VectorStore {
    connection: Option<Connection>,
    table: Option<Table>,
    generator: Arc<EmbeddingGenerator>,
    location: StoreLocation,
}

impl VectorStore {
    /// Open the store at `location`, creating the record table if needed
    ///
    /// # Arguments
    /// * `location` - Directory for a durable store, or in-memory
    /// * `generator` - Shared embedding generator; fixes the vector width
    ///
    /// # Returns
    /// * `Result<Self>` - Open store, or `IncompatibleSchema` when an existing
    ///   table does not match the record layout or dimensionality
    #[inline]
    pub async fn open(location: StoreLocation, generator: Arc<EmbeddingGenerator>) -> Result<Self> {
        if let StoreLocation::Path(path) = &location {
            std::fs::create_dir_all(path).map_err(|e| {
                AgentError::Database(format!("Failed to create store directory: {}", e))
            })?;
        }

        let uri = location.uri();
        debug!("Connecting to LanceDB at {}", uri);

        let connection = lancedb::connect(&uri).execute().await.map_err(|e| {
            AgentError::Database(format!("Failed to connect to LanceDB at {}: {}", uri, e))
        })?;

        let table = Self::provision_table(&connection, generator.dimension()).await?;

        info!(
            "Vector store open at {} ({} dimensions)",
            uri,
            generator.dimension()
        );
        Ok(Self {
            connection: Some(connection),
            table: Some(table),
            generator,
            location,
        })
    }

    /// Ensure the record table exists and matches the expected schema
    async fn provision_table(connection: &Connection, dimension: usize) -> Result<Table> {
        let table_names = connection
            .table_names()
            .execute()
            .await
            .map_err(|e| AgentError::Database(format!("Failed to list tables: {}", e)))?;

        if table_names.iter().any(|name| name == TABLE_NAME) {
            debug!("Table {} already exists, verifying schema", TABLE_NAME);
        } else {
            match connection
                .create_empty_table(TABLE_NAME, table_schema(dimension)?)
                .execute()
                .await
            {
                Ok(table) => {
                    info!(
                        "Created table {} with {} dimensions",
                        TABLE_NAME, dimension
                    );
                    return Ok(table);
                }
                Err(lancedb::Error::TableAlreadyExists { .. }) => {
                    warn!(
                        "Table {} was created concurrently, continuing with existing table",
                        TABLE_NAME
                    );
                }
                Err(e) => {
                    return Err(AgentError::Database(format!(
                        "Failed to create table: {}",
                        e
                    )));
                }
            }
        }

        let table = connection
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(|e| AgentError::Database(format!("Failed to open table: {}", e)))?;

        let existing = table
            .schema()
            .await
            .map_err(|e| AgentError::Database(format!("Failed to get table schema: {}", e)))?;

        check_schema_compatible(&existing, dimension)?;
        Ok(table)
    }

    #[inline]
    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.connection.is_none()
    }

    fn table(&self) -> Result<&Table> {
        self.table.as_ref().ok_or(AgentError::StoreClosed)
    }

    /// Release the backend connection. Fails with `StoreClosed` if already closed.
    #[inline]
    pub fn close(&mut self) -> Result<()> {
        if self.connection.is_none() {
            return Err(AgentError::StoreClosed);
        }

        self.table = None;
        self.connection = None;
        info!("Vector store at {} closed", self.location.uri());
        Ok(())
    }

    /// Number of stored records
    #[inline]
    pub async fn count(&self) -> Result<u64> {
        let count = self
            .table()?
            .count_rows(None)
            .await
            .map_err(|e| AgentError::Database(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }

    /// Embed and insert `rows`
    ///
    /// Rows are split into insert batches of `batch_size`; each insert batch
    /// is embedded `embedding_batch_size` texts per model call and written in
    /// one round-trip. A failing batch aborts the import; batches written
    /// before it stay committed.
    ///
    /// # Arguments
    /// * `rows` - Raw rows in input order
    /// * `batch_size` - Rows per insert round-trip
    /// * `embedding_batch_size` - Texts per model call, at most `batch_size`
    ///
    /// # Returns
    /// * `Result<ImportSummary>` - Rows and batches written, or the first
    ///   `MalformedRecord`, `EncodingFailure` or `IngestionFailure`
    #[inline]
    pub async fn import_records(
        &self,
        rows: &[RawRecord],
        batch_size: usize,
        embedding_batch_size: usize,
    ) -> Result<ImportSummary> {
        self.import_records_with_progress(rows, batch_size, embedding_batch_size, |_| {})
            .await
    }

    /// [`VectorStore::import_records`], calling `on_batch` after every
    /// committed batch with the running totals
    #[inline]
    pub async fn import_records_with_progress<F>(
        &self,
        rows: &[RawRecord],
        batch_size: usize,
        embedding_batch_size: usize,
        mut on_batch: F,
    ) -> Result<ImportSummary>
    where
        F: FnMut(&ImportSummary) + Send,
    {
        let table = self.table()?;

        if batch_size == 0 || embedding_batch_size == 0 {
            return Err(AgentError::InvalidArgument(
                "batch sizes must be positive".to_string(),
            ));
        }
        if embedding_batch_size > batch_size {
            return Err(AgentError::InvalidArgument(format!(
                "embedding batch size {} exceeds batch size {}",
                embedding_batch_size, batch_size
            )));
        }

        let mut summary = ImportSummary::default();

        for (batch_index, batch) in rows.chunks(batch_size).enumerate() {
            let first_row = batch_index * batch_size;

            let records = batch
                .iter()
                .enumerate()
                .map(|(i, raw)| Record::from_raw(first_row + i, raw))
                .collect::<Result<Vec<_>>>()?;

            let mut embedded = Vec::with_capacity(records.len());
            for sub_batch in records.chunks(embedding_batch_size) {
                let keyed = sub_batch
                    .iter()
                    .map(|record| (record, record.content.as_str()))
                    .collect();
                embedded.extend(self.generator.embed_keyed(keyed)?);
            }

            let record_batch = create_record_batch(&embedded, self.generator.dimension())?;
            let schema = record_batch.schema();
            let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

            table.add(reader).execute().await.map_err(|e| {
                AgentError::IngestionFailure(format!(
                    "Failed to insert rows {}..{}: {}",
                    first_row,
                    first_row + records.len(),
                    e
                ))
            })?;

            summary.rows += records.len();
            summary.batches += 1;
            debug!(
                "Inserted batch {} ({} rows, {} total)",
                batch_index + 1,
                records.len(),
                summary.rows
            );
            on_batch(&summary);
        }

        info!(
            "Imported {} records in {} batches",
            summary.rows, summary.batches
        );
        Ok(summary)
    }

    /// Rank stored records by cosine similarity to `query`
    ///
    /// Results are ordered by ascending distance; equal distances keep the
    /// backend's order. At most `limit` results are returned, none for an
    /// empty store.
    #[inline]
    pub async fn search_similar(&self, query: &str, limit: usize) -> Result<Vec<ScoredRecord>> {
        let table = self.table()?;

        if query.trim().is_empty() {
            return Err(AgentError::InvalidArgument(
                "query must not be empty".to_string(),
            ));
        }
        if limit == 0 {
            return Err(AgentError::InvalidArgument(
                "limit must be positive".to_string(),
            ));
        }

        let stored = table
            .count_rows(None)
            .await
            .map_err(|e| AgentError::Database(format!("Failed to count rows: {}", e)))?;
        if stored == 0 {
            debug!("Store is empty, skipping search");
            return Ok(Vec::new());
        }

        let query_vector = self.generator.embed_one(query)?;
        debug!(
            "Searching {} records with limit {}",
            stored, limit
        );

        let mut stream = table
            .vector_search(query_vector.as_slice())
            .map_err(|e| AgentError::Database(format!("Failed to create vector search: {}", e)))?
            .column(EMBEDDING_COLUMN)
            .distance_type(DistanceType::Cosine)
            .bypass_vector_index()
            .limit(limit)
            .execute()
            .await
            .map_err(|e| AgentError::Database(format!("Failed to execute search: {}", e)))?;

        let mut results = Vec::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| AgentError::Database(format!("Failed to read result stream: {}", e)))?
        {
            results.extend(parse_search_batch(&batch)?);
        }

        results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        results.truncate(limit);

        debug!("Search returned {} results", results.len());
        Ok(results)
    }
}

fn embedding_item_field() -> Arc<Field> {
    Arc::new(Field::new("item", DataType::Float32, false))
}

/// Width of the embedding column, which Arrow stores as `i32`
fn embedding_width(dimension: usize) -> Result<i32> {
    i32::try_from(dimension).map_err(|_| {
        AgentError::IncompatibleSchema(format!(
            "embedding dimension {} does not fit a vector column",
            dimension
        ))
    })
}

/// Arrow schema of the record table
fn table_schema(dimension: usize) -> Result<SchemaRef> {
    let width = embedding_width(dimension)?;
    Ok(Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("sender_id", DataType::Utf8, false),
        Field::new("sender_name", DataType::Utf8, false),
        Field::new(
            "timestamp",
            DataType::Timestamp(TimeUnit::Second, None),
            false,
        ),
        Field::new("content", DataType::Utf8, false),
        Field::new(
            EMBEDDING_COLUMN,
            DataType::FixedSizeList(embedding_item_field(), width),
            false,
        ),
        Field::new("duration", DataType::UInt32, false),
        Field::new("offset", DataType::UInt32, false),
    ])))
}

/// Accept an existing table only if every expected column is present with
/// the expected type and the embedding width matches
fn check_schema_compatible(existing: &Schema, dimension: usize) -> Result<()> {
    let expected = table_schema(dimension)?;

    for field in expected.fields() {
        let found = existing.field_with_name(field.name()).map_err(|_| {
            AgentError::IncompatibleSchema(format!("missing column {}", field.name()))
        })?;

        let compatible = match (field.data_type(), found.data_type()) {
            (DataType::FixedSizeList(_, want), DataType::FixedSizeList(item, got)) => {
                want == got && item.data_type() == &DataType::Float32
            }
            (want, got) => want == got,
        };

        if !compatible {
            return Err(AgentError::IncompatibleSchema(format!(
                "column {} has type {:?}, expected {:?}",
                field.name(),
                found.data_type(),
                field.data_type()
            )));
        }
    }

    Ok(())
}

/// Build one insert batch from records paired with their embeddings
fn create_record_batch(rows: &[(&Record, Vec<f32>)], dimension: usize) -> Result<RecordBatch> {
    let mut flat_values = Vec::with_capacity(rows.len() * dimension);
    for (record, vector) in rows {
        if vector.len() != dimension {
            return Err(AgentError::IngestionFailure(format!(
                "record {} has {} dimensions, expected {}",
                record.id,
                vector.len(),
                dimension
            )));
        }
        flat_values.extend_from_slice(vector);
    }

    let schema = table_schema(dimension)?;
    let vector_array = FixedSizeListArray::try_new(
        embedding_item_field(),
        embedding_width(dimension)?,
        Arc::new(Float32Array::from(flat_values)),
        None,
    )
    .map_err(|e| AgentError::IngestionFailure(format!("Failed to create vector array: {}", e)))?;

    let arrays: Vec<Arc<dyn Array>> = vec![
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|(r, _)| r.id.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|(r, _)| r.sender_id.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|(r, _)| r.sender_name.as_str()),
        )),
        Arc::new(TimestampSecondArray::from(
            rows.iter()
                .map(|(r, _)| r.timestamp.timestamp())
                .collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|(r, _)| r.content.as_str()),
        )),
        Arc::new(vector_array),
        Arc::new(UInt32Array::from(
            rows.iter().map(|(r, _)| r.duration).collect::<Vec<_>>(),
        )),
        Arc::new(UInt32Array::from(
            rows.iter().map(|(r, _)| r.offset).collect::<Vec<_>>(),
        )),
    ];

    RecordBatch::try_new(schema, arrays)
        .map_err(|e| AgentError::IngestionFailure(format!("Failed to create record batch: {}", e)))
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .ok_or_else(|| AgentError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| AgentError::Database(format!("Invalid {} column type", name)))
}

/// Parse a single record batch from search results
fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<ScoredRecord>> {
    let ids = column::<StringArray>(batch, "id")?;
    let sender_ids = column::<StringArray>(batch, "sender_id")?;
    let sender_names = column::<StringArray>(batch, "sender_name")?;
    let timestamps = column::<TimestampSecondArray>(batch, "timestamp")?;
    let contents = column::<StringArray>(batch, "content")?;
    let durations = column::<UInt32Array>(batch, "duration")?;
    let offsets = column::<UInt32Array>(batch, "offset")?;
    let distances = column::<Float32Array>(batch, DISTANCE_COLUMN)?;

    (0..batch.num_rows())
        .map(|row| {
            let seconds = timestamps.value(row);
            let timestamp = DateTime::from_timestamp(seconds, 0).ok_or_else(|| {
                AgentError::Database(format!("Stored timestamp {} is out of range", seconds))
            })?;
            let distance = distances.value(row);

            Ok(ScoredRecord {
                id: ids.value(row).to_string(),
                sender_id: sender_ids.value(row).to_string(),
                sender_name: sender_names.value(row).to_string(),
                timestamp,
                content: contents.value(row).to_string(),
                duration: durations.value(row),
                offset: offsets.value(row),
                distance,
                similarity: 1.0 - distance,
            })
        })
        .collect()
}
