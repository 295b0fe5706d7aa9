//! Integration tests for schema installation, inserts and reads through the
//! connection manager. Each test gets its own manager and database.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use futures::StreamExt;

use slate_store::{
    ConnectionManager, FieldDef, FieldValue, Record, Result, SemanticType, SlateError,
    StorageLocation, StoredRow, TypeRegistry, NO_PARAMS,
};

// =============================================================================
// Fixtures
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
struct TestModel {
    rowid: Option<i64>,
    power_level: i64,
    name: String,
}

impl TestModel {
    fn new(power_level: i64, name: &str) -> Self {
        Self {
            rowid: None,
            power_level,
            name: name.to_string(),
        }
    }
}

impl Record for TestModel {
    const TYPE_NAME: &'static str = "TestModel";

    fn fields() -> &'static [FieldDef] {
        const FIELDS: &[FieldDef] = &[
            FieldDef::new("power_level", SemanticType::INTEGER),
            FieldDef::new("name", SemanticType::TEXT),
        ];
        FIELDS
    }

    fn values(&self) -> Vec<FieldValue> {
        vec![self.power_level.into(), self.name.clone().into()]
    }

    fn identity(&self) -> Option<i64> {
        self.rowid
    }

    fn from_row(row: &StoredRow) -> Result<Self> {
        Ok(Self {
            rowid: row.identity()?,
            power_level: row.get("power_level")?,
            name: row.get("name")?,
        })
    }
}

/// One field of every built-in semantic type.
#[derive(Debug, Clone, PartialEq)]
struct ArtifactRecord {
    rowid: Option<i64>,
    size: i64,
    duration: f64,
    label: String,
    path: PathBuf,
    created_at: DateTime<Utc>,
    properties: serde_json::Value,
    digest: Vec<u8>,
}

impl Record for ArtifactRecord {
    const TYPE_NAME: &'static str = "ArtifactRecord";

    fn fields() -> &'static [FieldDef] {
        const FIELDS: &[FieldDef] = &[
            FieldDef::new("size", SemanticType::INTEGER),
            FieldDef::new("duration", SemanticType::FLOAT),
            FieldDef::new("label", SemanticType::TEXT),
            FieldDef::new("path", SemanticType::PATH),
            FieldDef::new("created_at", SemanticType::TIMESTAMP),
            FieldDef::new("properties", SemanticType::JSON),
            FieldDef::new("digest", SemanticType::BYTES),
        ];
        FIELDS
    }

    fn values(&self) -> Vec<FieldValue> {
        vec![
            self.size.into(),
            self.duration.into(),
            self.label.clone().into(),
            self.path.clone().into(),
            self.created_at.into(),
            self.properties.clone().into(),
            self.digest.clone().into(),
        ]
    }

    fn identity(&self) -> Option<i64> {
        self.rowid
    }

    fn from_row(row: &StoredRow) -> Result<Self> {
        Ok(Self {
            rowid: row.identity()?,
            size: row.get("size")?,
            duration: row.get("duration")?,
            label: row.get("label")?,
            path: PathBuf::from(row.get::<String>("path")?),
            created_at: row.get("created_at")?,
            properties: row.get("properties")?,
            digest: row.get("digest")?,
        })
    }
}

const UUID: SemanticType = SemanticType::new("uuid");

#[derive(Debug)]
struct Tagged {
    id: String,
}

impl Record for Tagged {
    const TYPE_NAME: &'static str = "Tagged";

    fn fields() -> &'static [FieldDef] {
        const FIELDS: &[FieldDef] = &[FieldDef::new("id", UUID)];
        FIELDS
    }

    fn values(&self) -> Vec<FieldValue> {
        vec![self.id.clone().into()]
    }

    fn identity(&self) -> Option<i64> {
        None
    }

    fn from_row(row: &StoredRow) -> Result<Self> {
        Ok(Self { id: row.get("id")? })
    }
}

fn memory_manager() -> ConnectionManager {
    ConnectionManager::new(
        StorageLocation::Memory,
        Arc::new(TypeRegistry::with_defaults()),
    )
}

async fn manager_with_schema() -> ConnectionManager {
    let manager = memory_manager();
    manager.load_schema::<TestModel>(None).await.unwrap();
    manager
}

async fn insert_power_levels(manager: &ConnectionManager, count: i64) {
    let records: Vec<TestModel> = (1..=count).map(|i| TestModel::new(i, "test")).collect();
    let scope = manager.session(None).unwrap().scope().await.unwrap();
    scope.add_all(&records).await.unwrap();
    scope.commit().await.unwrap();
    scope.finish().await.unwrap();
}

// =============================================================================
// Schema installation
// =============================================================================

#[tokio::test]
async fn test_simple_table_is_created() {
    let manager = manager_with_schema().await;

    let scope = manager.session(None).unwrap().scope().await.unwrap();
    let mut rows = scope
        .query("SELECT sql FROM sqlite_master", NO_PARAMS)
        .await
        .unwrap();
    let mut results = Vec::new();
    while let Some(row) = rows.next().await {
        results.push(row.unwrap().get::<String>("sql").unwrap());
    }

    assert_eq!(results.len(), 1, "Multiple tables created");
    assert_eq!(
        results[0],
        "CREATE TABLE test_model (\npower_level INTEGER,\nname TEXT\n)"
    );
}

#[tokio::test]
async fn test_installed_columns_match_declaration() {
    let manager = memory_manager();
    manager.load_schema::<ArtifactRecord>(None).await.unwrap();

    let scope = manager.session(None).unwrap().scope().await.unwrap();
    let mut rows = scope
        .query("PRAGMA table_info(artifact_record)", NO_PARAMS)
        .await
        .unwrap();
    let mut columns = Vec::new();
    while let Some(row) = rows.next().await {
        let row = row.unwrap();
        columns.push((
            row.get::<String>("name").unwrap(),
            row.get::<String>("type").unwrap(),
        ));
    }

    let expected = [
        ("size", "INTEGER"),
        ("duration", "REAL"),
        ("label", "TEXT"),
        ("path", "TEXT"),
        ("created_at", "TEXT"),
        ("properties", "TEXT"),
        ("digest", "BLOB"),
    ];
    assert_eq!(columns.len(), expected.len());
    for ((name, kind), (want_name, want_kind)) in columns.iter().zip(expected) {
        assert_eq!(name, want_name);
        assert_eq!(kind, want_kind);
    }
}

#[tokio::test]
async fn test_schema_installed_once_per_type() {
    let manager = manager_with_schema().await;

    let err = manager.load_schema::<TestModel>(None).await.unwrap_err();
    assert!(matches!(err, SlateError::DuplicateTableDefinition { .. }));

    let scope = manager.session(None).unwrap().scope().await.unwrap();
    let mut rows = scope
        .query(
            "SELECT COUNT(*) AS n FROM sqlite_master WHERE name = :name",
            &[("name", slate_store::SqlValue::Text("test_model".to_string()))],
        )
        .await
        .unwrap();
    let count: i64 = rows.next().await.unwrap().unwrap().get("n").unwrap();
    assert_eq!(count, 1);
}

// =============================================================================
// Inserts and reads
// =============================================================================

#[tokio::test]
async fn test_inserts_are_persisted() {
    let manager = manager_with_schema().await;

    let scope = manager.session(None).unwrap().scope().await.unwrap();
    scope.add(&TestModel::new(1, "test")).await.unwrap();
    scope.commit().await.unwrap();
    scope.finish().await.unwrap();

    let scope = manager.session(None).unwrap().scope().await.unwrap();
    let mut rows = scope
        .query("SELECT * FROM test_model", NO_PARAMS)
        .await
        .unwrap();
    let mut results = Vec::new();
    while let Some(row) = rows.next().await {
        results.push(row.unwrap());
    }

    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert_eq!(result.columns(), ["power_level", "name"]);
    assert_eq!(result.get::<i64>("power_level").unwrap(), 1);
    assert_eq!(result.get::<String>("name").unwrap(), "test");
}

#[tokio::test]
async fn test_select_from_table() {
    let manager = manager_with_schema().await;
    let added = TestModel::new(1, "test");

    let scope = manager.session(None).unwrap().scope().await.unwrap();
    scope.add(&added).await.unwrap();
    scope.finish().await.unwrap();

    let scope = manager.session(None).unwrap().scope().await.unwrap();
    let results = scope.select_all::<TestModel>().await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].power_level, added.power_level);
    assert_eq!(results[0].name, added.name);
    assert_eq!(results[0].rowid, Some(1));
}

#[tokio::test]
async fn test_lazy_select_yields_sequential_identities() {
    let manager = manager_with_schema().await;
    insert_power_levels(&manager, 10).await;

    let scope = manager.session(None).unwrap().scope().await.unwrap();
    let mut stream = scope.select::<TestModel>().await.unwrap();
    let mut seen = Vec::new();
    while let Some(record) = stream.next().await {
        let record = record.unwrap();
        assert_eq!(record.name, "test");
        seen.push((record.rowid, record.power_level));
    }

    let expected: Vec<(Option<i64>, i64)> = (1..=10).map(|i| (Some(i), i)).collect();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn test_eager_and_lazy_reads_agree() {
    let manager = manager_with_schema().await;
    insert_power_levels(&manager, 25).await;

    let scope = manager.session(None).unwrap().scope().await.unwrap();
    let eager = scope.select_all::<TestModel>().await.unwrap();

    let mut lazy = Vec::new();
    let mut stream = scope.select::<TestModel>().await.unwrap();
    while let Some(record) = stream.next().await {
        lazy.push(record.unwrap());
    }

    assert_eq!(eager.len(), 25);
    assert_eq!(eager, lazy);
}

#[tokio::test]
async fn test_round_trip_every_builtin_type() {
    let manager = memory_manager();
    manager.load_schema::<ArtifactRecord>(None).await.unwrap();

    let original = ArtifactRecord {
        rowid: None,
        size: 4096,
        duration: 12.5,
        label: "nightly".to_string(),
        path: PathBuf::from("data/ab/abcdef.xml"),
        created_at: Utc.with_ymd_and_hms(2024, 5, 17, 8, 15, 30).unwrap(),
        properties: serde_json::json!({"branch": "main", "retries": 2}),
        digest: vec![0xde, 0xad, 0xbe, 0xef],
    };

    let scope = manager.session(None).unwrap().scope().await.unwrap();
    scope.add(&original).await.unwrap();
    scope.finish().await.unwrap();

    let scope = manager.session(None).unwrap().scope().await.unwrap();
    let loaded = scope.select_all::<ArtifactRecord>().await.unwrap();
    assert_eq!(loaded.len(), 1);

    let mut expected = original.clone();
    expected.rowid = Some(1);
    assert_eq!(loaded[0], expected);
}

#[tokio::test]
async fn test_unregistered_type_fails_before_any_statement() {
    let manager = memory_manager();

    let err = manager.load_schema::<Tagged>(None).await.unwrap_err();
    assert!(matches!(err, SlateError::UnregisteredType { .. }));

    let scope = manager.session(None).unwrap().scope().await.unwrap();
    let err = scope
        .add(&Tagged {
            id: "7f3c".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, SlateError::UnregisteredType { .. }));

    assert!(!scope.table_exists("tagged").await.unwrap());
    let mut rows = scope
        .query("SELECT COUNT(*) AS n FROM sqlite_master", NO_PARAMS)
        .await
        .unwrap();
    let count: i64 = rows.next().await.unwrap().unwrap().get("n").unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_select_without_table_fails() {
    let manager = memory_manager();
    let scope = manager.session(None).unwrap().scope().await.unwrap();
    let err = scope.select_all::<TestModel>().await.unwrap_err();
    assert!(matches!(err, SlateError::Storage(_)));
}

// =============================================================================
// File-backed locations
// =============================================================================

#[tokio::test]
async fn test_file_location_survives_close_all() {
    let dir = tempfile::tempdir().unwrap();
    let location = StorageLocation::file(dir.path().join("reports.db"));

    let manager = ConnectionManager::new(
        location.clone(),
        Arc::new(TypeRegistry::with_defaults()),
    );
    manager.load_schema::<TestModel>(None).await.unwrap();
    insert_power_levels(&manager, 3).await;
    manager.close_all().await.unwrap();

    let scope = manager.session(Some(&location)).unwrap().scope().await.unwrap();
    let records = scope.select_all::<TestModel>().await.unwrap();
    let identities: Vec<Option<i64>> = records.iter().map(|r| r.rowid).collect();
    assert_eq!(identities, vec![Some(1), Some(2), Some(3)]);
}

#[tokio::test]
async fn test_locations_are_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let other = StorageLocation::file(dir.path().join("other.db"));
    let manager = manager_with_schema().await;

    manager.load_schema::<TestModel>(Some(&other)).await.unwrap();
    insert_power_levels(&manager, 2).await;

    let scope = manager.session(Some(&other)).unwrap().scope().await.unwrap();
    assert!(scope.select_all::<TestModel>().await.unwrap().is_empty());
}
