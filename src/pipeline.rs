use crate::config::CloudConfig;
use crate::constants::final_tables;
use crate::error::{Result, WarehouseError};
use crate::sql::{self, redshift, Statement};
use crate::warehouse::{Target, Warehouse};
use metrics::{counter, histogram};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    DropTables,
    CreateTables,
    LoadStaging,
    InsertTables,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::DropTables => "drop_tables",
            Stage::CreateTables => "create_tables",
            Stage::LoadStaging => "load_staging",
            Stage::InsertTables => "insert_tables",
        }
    }

    pub fn status_line(&self) -> &'static str {
        match self {
            Stage::DropTables => "Finish dropping all tables!",
            Stage::CreateTables => "Finish creating all tables!",
            Stage::LoadStaging => "Finish copying data to staging tables!",
            Stage::InsertTables => {
                "Finish inserting data from staging tables to fact & dimension tables!"
            }
        }
    }
}

/// Result of one completed stage
#[derive(Debug, Clone)]
pub struct StageReport {
    pub stage: Stage,
    pub statements_executed: usize,
    pub rows_affected: u64,
    pub duration: Duration,
}

/// Executes `statements` in order, stopping at the first failure.
///
/// Each statement is committed as it completes, so a failure part way
/// through leaves the earlier ones applied and the later ones unattempted.
#[instrument(skip(warehouse, statements), fields(stage = stage.name(), warehouse_target = %warehouse.target()))]
pub async fn run_stage<W>(warehouse: &mut W, stage: Stage, statements: &[Statement]) -> Result<StageReport>
where
    W: Warehouse + ?Sized,
{
    let started = Instant::now();
    let mut rows_affected = 0;

    for (i, statement) in statements.iter().enumerate() {
        debug!(
            "[{}/{}] {:?} {}",
            i + 1,
            statements.len(),
            statement.kind,
            statement.table
        );
        match warehouse.execute(&statement.sql).await {
            Ok(rows) => {
                rows_affected += rows;
                counter!("warehouse_statements_total", "stage" => stage.name()).increment(1);
                info!("{:?} {} ({} rows)", statement.kind, statement.table, rows);
            }
            Err(e) => {
                counter!("warehouse_statement_errors_total", "stage" => stage.name()).increment(1);
                error!("{:?} {} failed: {}", statement.kind, statement.table, e);
                return Err(e);
            }
        }
    }

    let duration = started.elapsed();
    histogram!("warehouse_stage_duration_seconds", "stage" => stage.name())
        .record(duration.as_secs_f64());

    Ok(StageReport {
        stage,
        statements_executed: statements.len(),
        rows_affected,
        duration,
    })
}

pub async fn drop_tables<W>(warehouse: &mut W) -> Result<StageReport>
where
    W: Warehouse + ?Sized,
{
    let statements = sql::drop_table_queries(warehouse.target());
    run_stage(warehouse, Stage::DropTables, &statements).await
}

pub async fn create_tables<W>(warehouse: &mut W) -> Result<StageReport>
where
    W: Warehouse + ?Sized,
{
    let statements = sql::create_table_queries(warehouse.target());
    sql::check_dependency_order(&statements)?;
    run_stage(warehouse, Stage::CreateTables, &statements).await
}

/// Drop then create: a full reset of the target's schema.
pub async fn reset_schema<W>(warehouse: &mut W) -> Result<Vec<StageReport>>
where
    W: Warehouse + ?Sized,
{
    let dropped = drop_tables(warehouse).await?;
    let created = create_tables(warehouse).await?;
    Ok(vec![dropped, created])
}

pub async fn load_staging_tables<W>(warehouse: &mut W, cloud: &CloudConfig<'_>) -> Result<StageReport>
where
    W: Warehouse + ?Sized,
{
    require_redshift(&*warehouse)?;
    let statements = redshift::copy_table_queries(cloud.s3, cloud.iam_role);
    run_stage(warehouse, Stage::LoadStaging, &statements).await
}

pub async fn insert_tables<W>(warehouse: &mut W) -> Result<StageReport>
where
    W: Warehouse + ?Sized,
{
    require_redshift(&*warehouse)?;
    let statements = redshift::insert_table_queries();
    sql::check_dependency_order(&statements)?;
    run_stage(warehouse, Stage::InsertTables, &statements).await
}

/// Staging load followed by the staging to star-schema transforms.
pub async fn load_and_transform<W>(warehouse: &mut W, cloud: &CloudConfig<'_>) -> Result<Vec<StageReport>>
where
    W: Warehouse + ?Sized,
{
    let loaded = load_staging_tables(warehouse, cloud).await?;
    let inserted = insert_tables(warehouse).await?;
    Ok(vec![loaded, inserted])
}

/// Row counts of the final tables, fact first.
pub async fn table_counts<W>(warehouse: &mut W) -> Result<Vec<(&'static str, i64)>>
where
    W: Warehouse + ?Sized,
{
    let mut counts = Vec::new();
    for table in final_tables() {
        counts.push((table, warehouse.count_rows(table).await?));
    }
    Ok(counts)
}

fn require_redshift<W: Warehouse + ?Sized>(warehouse: &W) -> Result<()> {
    match warehouse.target() {
        Target::Redshift => Ok(()),
        other => Err(WarehouseError::Config(format!(
            "staging load and transform only run against redshift, not {other}"
        ))),
    }
}
