//! Statement compilation.
//!
//! SQL text and the positional binding list are derived together in a single
//! pass over builder state, so binding order always matches `$N` placeholder
//! order. Clause order is fixed: SELECT, FROM, JOIN, WHERE, GROUP BY, HAVING,
//! ORDER BY, LIMIT, OFFSET.

use serde_json::Value;

use super::clause::{HavingClause, Predicate, WhereClause};
use super::SqlQuery;
use crate::value::RowMap;

#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub sql: String,
    pub bindings: Vec<Value>,
}

pub(crate) fn compile_select(q: &SqlQuery) -> CompiledQuery {
    let mut counter = 1usize;
    let mut sql = String::from("SELECT ");
    if q.distinct_flag {
        sql.push_str("DISTINCT ");
    }
    if q.columns.is_empty() {
        sql.push('*');
    } else {
        sql.push_str(&q.columns.join(", "));
    }
    sql.push_str(" FROM ");
    sql.push_str(&q.table);

    for join in &q.joins {
        sql.push(' ');
        sql.push_str(join.kind.keyword());
        sql.push_str(&format!(
            " {} ON {} {} {}",
            join.table, join.left, join.operator, join.right
        ));
    }

    let (where_sql, mut bindings) = write_where(&q.wheres, &mut counter);
    sql.push_str(&where_sql);

    if !q.group_columns.is_empty() {
        sql.push_str(" GROUP BY ");
        sql.push_str(&q.group_columns.join(", "));
    }

    let (having_sql, having_bindings) = write_having(&q.havings, &mut counter);
    sql.push_str(&having_sql);
    bindings.extend(having_bindings);

    if !q.orders.is_empty() {
        sql.push_str(" ORDER BY ");
        let parts: Vec<String> = q
            .orders
            .iter()
            .map(|o| format!("{} {}", o.column, o.direction.keyword()))
            .collect();
        sql.push_str(&parts.join(", "));
    }

    if let Some(limit) = q.limit_value {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    if let Some(offset) = q.offset_value {
        sql.push_str(&format!(" OFFSET {}", offset));
    }

    CompiledQuery { sql, bindings }
}

pub(crate) fn compile_insert(table: &str, returning: &str, data: &RowMap) -> CompiledQuery {
    if data.is_empty() {
        // column-less insert: every column takes its default
        return CompiledQuery {
            sql: format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", table, returning),
            bindings: Vec::new(),
        };
    }
    let columns: Vec<&str> = data.keys().map(String::as_str).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|n| format!("${}", n)).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        table,
        columns.join(", "),
        placeholders.join(", "),
        returning
    );
    CompiledQuery {
        sql,
        bindings: data.values().cloned().collect(),
    }
}

/// Multi-row insert. Column set comes from the first row; rows missing a
/// column bind null for it.
pub(crate) fn compile_insert_batch(table: &str, rows: &[RowMap]) -> Option<CompiledQuery> {
    let first = rows.first()?;
    let columns: Vec<String> = first.keys().cloned().collect();
    let mut counter = 1usize;
    let mut groups = Vec::with_capacity(rows.len());
    let mut bindings = Vec::with_capacity(rows.len() * columns.len());
    for row in rows {
        let mut placeholders = Vec::with_capacity(columns.len());
        for column in &columns {
            placeholders.push(format!("${}", counter));
            counter += 1;
            bindings.push(row.get(column).cloned().unwrap_or(Value::Null));
        }
        groups.push(format!("({})", placeholders.join(", ")));
    }
    Some(CompiledQuery {
        sql: format!(
            "INSERT INTO {} ({}) VALUES {}",
            table,
            columns.join(", "),
            groups.join(", ")
        ),
        bindings,
    })
}

pub(crate) fn compile_update(q: &SqlQuery, data: &RowMap) -> CompiledQuery {
    let mut counter = 1usize;
    let mut sets = Vec::with_capacity(data.len());
    let mut bindings = Vec::with_capacity(data.len());
    for (column, value) in data {
        sets.push(format!("{} = ${}", column, counter));
        counter += 1;
        bindings.push(value.clone());
    }
    let (where_sql, where_bindings) = write_where(&q.wheres, &mut counter);
    bindings.extend(where_bindings);
    CompiledQuery {
        sql: format!("UPDATE {} SET {}{}", q.table, sets.join(", "), where_sql),
        bindings,
    }
}

pub(crate) fn compile_delete(q: &SqlQuery) -> CompiledQuery {
    let mut counter = 1usize;
    let (where_sql, bindings) = write_where(&q.wheres, &mut counter);
    CompiledQuery {
        sql: format!("DELETE FROM {}{}", q.table, where_sql),
        bindings,
    }
}

/// `column = column + $1`, used by increment/decrement
pub(crate) fn compile_adjust(q: &SqlQuery, column: &str, amount: i64) -> CompiledQuery {
    let mut counter = 2usize;
    let (where_sql, where_bindings) = write_where(&q.wheres, &mut counter);
    let mut bindings = vec![Value::from(amount)];
    bindings.extend(where_bindings);
    CompiledQuery {
        sql: format!(
            "UPDATE {} SET {} = {} + $1{}",
            q.table, column, column, where_sql
        ),
        bindings,
    }
}

pub(crate) fn write_where(clauses: &[WhereClause], counter: &mut usize) -> (String, Vec<Value>) {
    if clauses.is_empty() {
        return (String::new(), Vec::new());
    }
    let mut sql = String::from(" WHERE ");
    let mut bindings = Vec::new();
    for (i, clause) in clauses.iter().enumerate() {
        // first clause's connector is dropped
        if i > 0 {
            sql.push(' ');
            sql.push_str(clause.connector.keyword());
            sql.push(' ');
        }
        match &clause.predicate {
            Predicate::Basic {
                column,
                operator,
                value,
            } => {
                sql.push_str(&format!("{} {} ${}", column, operator, counter));
                *counter += 1;
                bindings.push(value.clone());
            }
            Predicate::In { column, values } => {
                if values.is_empty() {
                    // empty IN can never match
                    sql.push_str("1=0");
                } else {
                    let mut placeholders = Vec::with_capacity(values.len());
                    for _ in values {
                        placeholders.push(format!("${}", counter));
                        *counter += 1;
                    }
                    sql.push_str(&format!("{} IN ({})", column, placeholders.join(", ")));
                    bindings.extend(values.iter().cloned());
                }
            }
            Predicate::NotIn { column, values } => {
                if values.is_empty() {
                    // empty NOT IN excludes nothing
                    sql.push_str("1=1");
                } else {
                    let mut placeholders = Vec::with_capacity(values.len());
                    for _ in values {
                        placeholders.push(format!("${}", counter));
                        *counter += 1;
                    }
                    sql.push_str(&format!("{} NOT IN ({})", column, placeholders.join(", ")));
                    bindings.extend(values.iter().cloned());
                }
            }
            Predicate::Null { column } => {
                sql.push_str(&format!("{} IS NULL", column));
            }
            Predicate::NotNull { column } => {
                sql.push_str(&format!("{} IS NOT NULL", column));
            }
            Predicate::Between { column, low, high } => {
                sql.push_str(&format!(
                    "{} BETWEEN ${} AND ${}",
                    column,
                    *counter,
                    *counter + 1
                ));
                *counter += 2;
                bindings.push(low.clone());
                bindings.push(high.clone());
            }
            Predicate::Raw {
                sql: fragment,
                bindings: values,
            } => {
                for ch in fragment.chars() {
                    if ch == '?' {
                        sql.push_str(&format!("${}", counter));
                        *counter += 1;
                    } else {
                        sql.push(ch);
                    }
                }
                bindings.extend(values.iter().cloned());
            }
        }
    }
    (sql, bindings)
}

fn write_having(clauses: &[HavingClause], counter: &mut usize) -> (String, Vec<Value>) {
    if clauses.is_empty() {
        return (String::new(), Vec::new());
    }
    let mut sql = String::from(" HAVING ");
    let mut bindings = Vec::with_capacity(clauses.len());
    for (i, clause) in clauses.iter().enumerate() {
        if i > 0 {
            sql.push(' ');
            sql.push_str(clause.connector.keyword());
            sql.push(' ');
        }
        sql.push_str(&format!(
            "{} {} ${}",
            clause.column, clause.operator, counter
        ));
        *counter += 1;
        bindings.push(clause.value.clone());
    }
    (sql, bindings)
}
