use super::*;
use chrono::TimeZone;

#[test]
fn location_uris() {
    let durable = StoreLocation::Path(PathBuf::from("/tmp/click-agent/store"));
    assert_eq!(durable.uri(), "file:///tmp/click-agent/store");
    assert_eq!(StoreLocation::InMemory.uri(), "memory://");
}

#[test]
fn scored_record_serialization() {
    let record = ScoredRecord {
        id: "msg-1".to_string(),
        sender_id: String::new(),
        sender_name: "Alice".to_string(),
        timestamp: Utc
            .with_ymd_and_hms(2024, 1, 1, 8, 0, 0)
            .single()
            .expect("valid date"),
        content: "it's fine".to_string(),
        duration: 0,
        offset: 4,
        distance: 1.25,
        similarity: -0.25,
    };

    let json = serde_json::to_string(&record).expect("can serialize json");
    let deserialized: ScoredRecord = serde_json::from_str(&json).expect("can parse json");

    assert_eq!(record, deserialized);
}
