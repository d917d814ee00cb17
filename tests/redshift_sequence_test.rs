use async_trait::async_trait;
use songplay_warehouse::config::Config;
use songplay_warehouse::error::{Result, WarehouseError};
use songplay_warehouse::pipeline::{load_and_transform, reset_schema, Stage};
use songplay_warehouse::warehouse::{Target, Warehouse};

/// Records statements instead of running them; optionally fails the nth one.
struct RecordingWarehouse {
    target: Target,
    executed: Vec<String>,
    fail_at: Option<usize>,
}

impl RecordingWarehouse {
    fn new(target: Target) -> Self {
        Self {
            target,
            executed: Vec::new(),
            fail_at: None,
        }
    }

    fn position(&self, needle: &str) -> usize {
        self.executed
            .iter()
            .position(|sql| sql.contains(needle))
            .unwrap_or_else(|| panic!("no statement containing {needle:?}"))
    }
}

#[async_trait]
impl Warehouse for RecordingWarehouse {
    fn target(&self) -> Target {
        self.target
    }

    async fn execute(&mut self, sql: &str) -> Result<u64> {
        if self.fail_at == Some(self.executed.len()) {
            return Err(WarehouseError::Connection {
                message: "server closed the connection unexpectedly".to_string(),
            });
        }
        self.executed.push(sql.to_string());
        Ok(1)
    }

    async fn count_rows(&mut self, _table: &str) -> Result<i64> {
        Ok(0)
    }
}

const CONFIG: &str = r#"
    [cluster]
    host = "dwhcluster.example.us-west-2.redshift.amazonaws.com"
    db_name = "dwh"
    db_user = "dwhuser"
    db_password = "Passw0rd"
    db_port = 5439

    [iam_role]
    arn = "arn:aws:iam::123456789012:role/dwhRole"

    [s3]
    log_data = "s3://udacity-dend/log_data"
    log_jsonpath = "s3://udacity-dend/log_json_path.json"
    song_data = "s3://udacity-dend/song_data"
"#;

#[tokio::test]
async fn test_reset_drops_then_creates_dimensions_before_fact() {
    let mut warehouse = RecordingWarehouse::new(Target::Redshift);
    let reports = reset_schema(&mut warehouse).await.unwrap();

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].stage, Stage::DropTables);
    assert_eq!(reports[1].stage, Stage::CreateTables);
    assert_eq!(warehouse.executed.len(), 14);
    assert!(warehouse.executed[..7].iter().all(|sql| sql.starts_with("DROP TABLE IF EXISTS")));

    let fact = warehouse.position("CREATE TABLE IF NOT EXISTS songplays");
    for dimension in ["users", "songs", "artists", "time"] {
        let created = warehouse.position(&format!("CREATE TABLE IF NOT EXISTS {dimension} "));
        assert!(created < fact, "{dimension} must exist before songplays");
    }
}

#[tokio::test]
async fn test_load_then_transform_in_dependency_order() {
    let config = Config::from_toml_str(CONFIG).unwrap();
    let cloud = config.cloud().unwrap();
    let mut warehouse = RecordingWarehouse::new(Target::Redshift);

    let reports = load_and_transform(&mut warehouse, &cloud).await.unwrap();
    assert_eq!(reports[0].stage, Stage::LoadStaging);
    assert_eq!(reports[0].statements_executed, 2);
    assert_eq!(reports[1].stage, Stage::InsertTables);

    let executed = &warehouse.executed;
    assert!(executed[0].starts_with("copy staging_events"));
    assert!(executed[1].starts_with("copy staging_songs"));
    assert!(executed.last().unwrap().contains("INSERT INTO songplays"));

    let update_users = warehouse.position("UPDATE users");
    let insert_users = warehouse.position("INSERT INTO users");
    assert!(update_users < insert_users);
    for dimension in ["INSERT INTO songs", "INSERT INTO artists", "INSERT INTO time"] {
        assert!(warehouse.position(dimension) < executed.len() - 1);
    }
}

#[tokio::test]
async fn test_failure_stops_remaining_statements() {
    let config = Config::from_toml_str(CONFIG).unwrap();
    let cloud = config.cloud().unwrap();
    let mut warehouse = RecordingWarehouse::new(Target::Redshift);
    warehouse.fail_at = Some(3);

    let err = load_and_transform(&mut warehouse, &cloud).await.unwrap_err();
    assert!(matches!(err, WarehouseError::Connection { .. }));

    // Both copies and the user update ran; nothing after the failure was attempted
    assert_eq!(warehouse.executed.len(), 3);
    assert!(warehouse.executed.iter().all(|sql| !sql.contains("songplays")));
}

#[tokio::test]
async fn test_local_target_cannot_stage() {
    let config = Config::from_toml_str(CONFIG).unwrap();
    let cloud = config.cloud().unwrap();
    let mut warehouse = RecordingWarehouse::new(Target::Local);

    let err = load_and_transform(&mut warehouse, &cloud).await.unwrap_err();
    assert!(matches!(err, WarehouseError::Config(_)));
    assert!(warehouse.executed.is_empty());
}

#[tokio::test]
async fn test_local_reset_has_no_staging_or_cascade() {
    let mut warehouse = RecordingWarehouse::new(Target::Local);
    reset_schema(&mut warehouse).await.unwrap();

    assert_eq!(warehouse.executed.len(), 10);
    assert!(warehouse.executed.iter().all(|sql| !sql.contains("staging")));
    assert!(warehouse.executed.iter().all(|sql| !sql.contains("CASCADE")));
}
