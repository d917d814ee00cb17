//! Statement lists for both deployment targets.
//!
//! Each list is applied in order by the pipeline driver. `depends_on`
//! records the tables a statement references (foreign keys for creates,
//! joined dimensions for transforms) so an ordering mistake is caught
//! before anything reaches the database.

pub mod local;
pub mod redshift;

use crate::error::{Result, WarehouseError};
use crate::warehouse::Target;
use std::borrow::Cow;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Drop,
    Create,
    Copy,
    Insert,
}

#[derive(Debug, Clone)]
pub struct Statement {
    pub table: &'static str,
    pub kind: StatementKind,
    pub depends_on: &'static [&'static str],
    pub sql: Cow<'static, str>,
}

impl Statement {
    pub fn new(table: &'static str, kind: StatementKind, sql: impl Into<Cow<'static, str>>) -> Self {
        Self {
            table,
            kind,
            depends_on: &[],
            sql: sql.into(),
        }
    }

    pub fn depends_on(mut self, tables: &'static [&'static str]) -> Self {
        self.depends_on = tables;
        self
    }
}

pub fn drop_table_queries(target: Target) -> Vec<Statement> {
    match target {
        Target::Local => local::drop_table_queries(),
        Target::Redshift => redshift::drop_table_queries(),
    }
}

pub fn create_table_queries(target: Target) -> Vec<Statement> {
    match target {
        Target::Local => local::create_table_queries(),
        Target::Redshift => redshift::create_table_queries(),
    }
}

/// Fails if a statement runs before a table it depends on.
pub fn check_dependency_order(statements: &[Statement]) -> Result<()> {
    let mut seen: HashSet<&'static str> = HashSet::new();

    for statement in statements {
        for dependency in statement.depends_on {
            if !seen.contains(dependency) {
                return Err(WarehouseError::DependencyOrder {
                    table: statement.table.to_string(),
                    dependency: dependency.to_string(),
                });
            }
        }
        seen.insert(statement.table);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{SONGPLAYS_TABLE, USERS_TABLE};

    #[test]
    fn test_shipped_lists_are_ordered() {
        for target in [Target::Local, Target::Redshift] {
            check_dependency_order(&create_table_queries(target)).unwrap();
        }
        check_dependency_order(&redshift::insert_table_queries()).unwrap();
    }

    #[test]
    fn test_fact_before_dimension_rejected() {
        let statements = vec![
            Statement::new(SONGPLAYS_TABLE, StatementKind::Create, "CREATE TABLE songplays ()")
                .depends_on(&[USERS_TABLE]),
            Statement::new(USERS_TABLE, StatementKind::Create, "CREATE TABLE users ()"),
        ];

        match check_dependency_order(&statements) {
            Err(WarehouseError::DependencyOrder { table, dependency }) => {
                assert_eq!(table, SONGPLAYS_TABLE);
                assert_eq!(dependency, USERS_TABLE);
            }
            other => panic!("expected dependency error, got {other:?}"),
        }
    }

    #[test]
    fn test_drop_lists_cover_every_created_table() {
        for target in [Target::Local, Target::Redshift] {
            let dropped: HashSet<_> = drop_table_queries(target).iter().map(|s| s.table).collect();
            let created: HashSet<_> = create_table_queries(target).iter().map(|s| s.table).collect();
            assert_eq!(dropped, created);
        }
    }
}
