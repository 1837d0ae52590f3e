use super::*;
use crate::embeddings::testing::FixtureModel;
use chrono::{TimeZone, Utc};
use tempfile::TempDir;

const DIMENSION: usize = 16;

fn generator(model: FixtureModel) -> Arc<EmbeddingGenerator> {
    Arc::new(EmbeddingGenerator::new(Box::new(model)).expect("should build generator"))
}

async fn open_store(model: FixtureModel) -> (VectorStore, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = VectorStore::open(
        StoreLocation::Path(temp_dir.path().join("store")),
        generator(model),
    )
    .await
    .expect("should open vector store");
    (store, temp_dir)
}

fn message(id: &str, content: &str) -> RawRecord {
    RawRecord::new(id, "Alice", content, "2024-05-01T09:30:00Z")
}

fn messages(count: usize) -> Vec<RawRecord> {
    (0..count)
        .map(|i| message(&format!("msg-{}", i), &format!("message number {} about topic {}", i, i * 7)))
        .collect()
}

#[tokio::test]
async fn open_creates_empty_table() {
    let (store, _temp_dir) = open_store(FixtureModel::new(DIMENSION)).await;

    assert!(!store.is_closed());
    assert_eq!(store.count().await.expect("should count"), 0);
}

#[tokio::test]
async fn reopening_keeps_records() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let location = StoreLocation::Path(temp_dir.path().join("store"));

    let mut store = VectorStore::open(location.clone(), generator(FixtureModel::new(DIMENSION)))
        .await
        .expect("should open vector store");
    store
        .import_records(&messages(4), 10, 4)
        .await
        .expect("should import");
    store.close().expect("should close");

    let reopened = VectorStore::open(location, generator(FixtureModel::new(DIMENSION)))
        .await
        .expect("reopening a compatible store should succeed");
    assert_eq!(reopened.count().await.expect("should count"), 4);
}

#[tokio::test]
async fn reopening_with_other_dimension_is_incompatible() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let location = StoreLocation::Path(temp_dir.path().join("store"));

    let mut store = VectorStore::open(location.clone(), generator(FixtureModel::new(DIMENSION)))
        .await
        .expect("should open vector store");
    store.close().expect("should close");

    let result = VectorStore::open(location, generator(FixtureModel::new(DIMENSION * 2))).await;
    assert!(
        matches!(result, Err(AgentError::IncompatibleSchema(_))),
        "unexpected result: {:?}",
        result.err()
    );
}

#[tokio::test]
async fn apostrophes_survive_round_trip() {
    let (store, _temp_dir) = open_store(FixtureModel::new(DIMENSION)).await;

    let rows = vec![
        message("quote", "hello 'world'"),
        message("other", "completely unrelated sentence"),
    ];
    store
        .import_records(&rows, 50, 16)
        .await
        .expect("should import");

    let results = store
        .search_similar("hello world", 1)
        .await
        .expect("search should succeed");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "quote");
    assert_eq!(results[0].content, "hello 'world'");
    assert!((results[0].similarity - 1.0).abs() < 1e-4);
}

#[tokio::test]
async fn ranks_by_cosine_similarity() {
    let model = FixtureModel::new(4)
        .pin("query", vec![1.0, 0.0, 0.0, 0.0])
        .pin("orthogonal", vec![0.0, 1.0, 0.0, 0.0])
        .pin("near parallel", vec![0.9, 0.1, 0.0, 0.0])
        .pin("anti parallel", vec![-2.0, 0.0, 0.0, 0.0]);
    let (store, _temp_dir) = open_store(model).await;

    let rows = vec![
        message("o", "orthogonal"),
        message("n", "near parallel"),
        message("a", "anti parallel"),
    ];
    store
        .import_records(&rows, 3, 3)
        .await
        .expect("should import");

    let results = store
        .search_similar("query", 3)
        .await
        .expect("search should succeed");

    let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["n", "o", "a"]);

    assert!(results[0].similarity > 0.9);
    assert!(results[1].similarity.abs() < 1e-4);
    // Dissimilar vectors keep their negative score
    assert!((results[2].similarity + 1.0).abs() < 1e-4);
    assert!((results[2].distance - 2.0).abs() < 1e-4);

    for pair in results.windows(2) {
        assert!(pair[0].distance <= pair[1].distance);
        assert!((pair[0].similarity - (1.0 - pair[0].distance)).abs() < f32::EPSILON);
    }
}

#[tokio::test]
async fn limit_truncates_results() {
    let (store, _temp_dir) = open_store(FixtureModel::new(DIMENSION)).await;
    store
        .import_records(&messages(5), 50, 16)
        .await
        .expect("should import");

    let three = store
        .search_similar("message about topic", 3)
        .await
        .expect("search should succeed");
    assert_eq!(three.len(), 3);

    let all = store
        .search_similar("message about topic", 100)
        .await
        .expect("search should succeed");
    assert_eq!(all.len(), 5);
}

#[tokio::test]
async fn in_memory_store_is_usable_and_not_durable() {
    let mut store = VectorStore::open(StoreLocation::InMemory, generator(FixtureModel::new(DIMENSION)))
        .await
        .expect("should open in-memory store");
    store
        .import_records(&messages(5), 2, 2)
        .await
        .expect("should import");
    assert_eq!(store.count().await.expect("should count"), 5);

    let results = store
        .search_similar("message about topic", 3)
        .await
        .expect("search should succeed");
    assert_eq!(results.len(), 3);
    assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));

    store.close().expect("should close");
    drop(store);

    let fresh = VectorStore::open(StoreLocation::InMemory, generator(FixtureModel::new(DIMENSION)))
        .await
        .expect("should open a second in-memory store");
    assert_eq!(fresh.count().await.expect("should count"), 0);
}

#[tokio::test]
async fn empty_store_returns_no_results() {
    let (store, _temp_dir) = open_store(FixtureModel::new(DIMENSION)).await;

    let results = store
        .search_similar("anything at all", 5)
        .await
        .expect("empty store search should succeed");
    assert!(results.is_empty());
}

#[tokio::test]
async fn closed_store_rejects_every_operation() {
    let (mut store, _temp_dir) = open_store(FixtureModel::new(DIMENSION)).await;
    store.close().expect("first close should succeed");
    assert!(store.is_closed());

    assert!(matches!(
        store.search_similar("query", 1).await,
        Err(AgentError::StoreClosed)
    ));
    assert!(matches!(
        store.import_records(&messages(1), 1, 1).await,
        Err(AgentError::StoreClosed)
    ));
    assert!(matches!(store.count().await, Err(AgentError::StoreClosed)));
    assert!(matches!(store.close(), Err(AgentError::StoreClosed)));
}

#[tokio::test]
async fn embeds_in_nested_batches() {
    let model = FixtureModel::new(DIMENSION);
    let calls = model.call_log();
    let (store, _temp_dir) = open_store(model).await;
    calls.lock().expect("lock").clear();

    let summary = store
        .import_records(&messages(7), 3, 2)
        .await
        .expect("should import");

    assert_eq!(summary, ImportSummary { rows: 7, batches: 3 });
    assert_eq!(*calls.lock().expect("lock"), vec![2, 1, 2, 1, 1]);
    assert_eq!(store.count().await.expect("should count"), 7);
}

#[tokio::test]
async fn embeddings_stay_with_their_rows() {
    let (store, _temp_dir) = open_store(FixtureModel::new(64)).await;

    let rows = vec![
        message("cats", "cats purr on warm windowsills"),
        message("rust", "borrow checker lifetimes ownership"),
        message("rain", "heavy rain flooded the streets"),
        message("jazz", "saxophone improvisation bebop"),
        message("tea", "green tea steeped briefly"),
    ];
    store
        .import_records(&rows, 4, 3)
        .await
        .expect("should import");

    for row in &rows {
        let content = row.content.as_deref().expect("content set");
        let results = store
            .search_similar(content, 1)
            .await
            .expect("search should succeed");
        assert_eq!(results[0].id, row.id.as_deref().expect("id set"));
    }
}

#[tokio::test]
async fn metadata_round_trips() {
    let (store, _temp_dir) = open_store(FixtureModel::new(DIMENSION)).await;

    let row = RawRecord::new("m1", "O'Brien", "meeting notes", "2024-02-29T23:59:59.750+02:00")
        .with_sender_id("user-9")
        .with_duration(42)
        .with_offset(7);
    store
        .import_records(&[row], 1, 1)
        .await
        .expect("should import");

    let results = store
        .search_similar("meeting notes", 1)
        .await
        .expect("search should succeed");
    let found = &results[0];

    assert_eq!(found.sender_id, "user-9");
    assert_eq!(found.sender_name, "O'Brien");
    assert_eq!(
        found.timestamp,
        Utc.with_ymd_and_hms(2024, 2, 29, 21, 59, 59)
            .single()
            .expect("valid date")
    );
    assert_eq!(found.duration, 42);
    assert_eq!(found.offset, 7);
}

#[tokio::test]
async fn malformed_row_aborts_only_its_batch() {
    let (store, _temp_dir) = open_store(FixtureModel::new(DIMENSION)).await;

    let mut rows = messages(6);
    rows[4].timestamp = Some("31/12/2024".to_string());

    let result = store.import_records(&rows, 3, 3).await;
    match result {
        Err(AgentError::MalformedRecord { row, .. }) => assert_eq!(row, 4),
        other => panic!("expected MalformedRecord, got {:?}", other),
    }

    // First batch was committed before the failure
    assert_eq!(store.count().await.expect("should count"), 3);
}

#[tokio::test]
async fn encoding_failure_aborts_batch() {
    let (store, _temp_dir) =
        open_store(FixtureModel::new(DIMENSION).failing_on("untokenizable")).await;

    let rows = vec![message("ok", "fine text"), message("bad", "untokenizable")];
    let result = store.import_records(&rows, 2, 1).await;

    assert!(matches!(result, Err(AgentError::EncodingFailure(_))));
    assert_eq!(store.count().await.expect("should count"), 0);
}

#[tokio::test]
async fn query_encoding_failure_propagates() {
    let (store, _temp_dir) =
        open_store(FixtureModel::new(DIMENSION).failing_on("untokenizable")).await;
    store
        .import_records(&messages(2), 2, 2)
        .await
        .expect("should import");

    let result = store.search_similar("untokenizable", 1).await;
    assert!(matches!(result, Err(AgentError::EncodingFailure(_))));
}

#[tokio::test]
async fn rejects_invalid_arguments() {
    let (store, _temp_dir) = open_store(FixtureModel::new(DIMENSION)).await;

    assert!(matches!(
        store.import_records(&messages(2), 0, 0).await,
        Err(AgentError::InvalidArgument(_))
    ));
    assert!(matches!(
        store.import_records(&messages(2), 2, 4).await,
        Err(AgentError::InvalidArgument(_))
    ));
    assert!(matches!(
        store.search_similar("   ", 1).await,
        Err(AgentError::InvalidArgument(_))
    ));
    assert!(matches!(
        store.search_similar("query", 0).await,
        Err(AgentError::InvalidArgument(_))
    ));
}

#[test]
fn schema_check_rejects_wrong_column_type() {
    let mut fields: Vec<Field> = table_schema(8)
        .expect("schema should build")
        .fields()
        .iter()
        .map(|f| f.as_ref().clone())
        .collect();
    fields[6] = Field::new("duration", DataType::Utf8, false);
    let schema = Schema::new(fields);

    assert!(matches!(
        check_schema_compatible(&schema, 8),
        Err(AgentError::IncompatibleSchema(_))
    ));
    assert!(check_schema_compatible(&table_schema(8).expect("schema should build"), 8).is_ok());
}

#[test]
fn schema_check_rejects_missing_column() {
    let fields: Vec<Field> = table_schema(8)
        .expect("schema should build")
        .fields()
        .iter()
        .filter(|f| f.name() != "offset")
        .map(|f| f.as_ref().clone())
        .collect();

    assert!(matches!(
        check_schema_compatible(&Schema::new(fields), 8),
        Err(AgentError::IncompatibleSchema(_))
    ));
}

#[test]
fn oversized_dimension_is_rejected() {
    let too_wide = i32::MAX as usize + 1;

    assert!(matches!(
        table_schema(too_wide),
        Err(AgentError::IncompatibleSchema(_))
    ));
    assert!(matches!(
        check_schema_compatible(&table_schema(8).expect("schema should build"), too_wide),
        Err(AgentError::IncompatibleSchema(_))
    ));
}

#[test]
fn record_batch_rejects_wrong_vector_width() {
    let record = Record::from_raw(0, &message("a", "hello")).expect("valid record");

    let result = create_record_batch(&[(&record, vec![1.0; 4])], 8);
    assert!(matches!(result, Err(AgentError::IngestionFailure(_))));

    let batch = create_record_batch(&[(&record, vec![0.5; 8])], 8).expect("batch should build");
    assert_eq!(batch.num_rows(), 1);
}
