//! Declarative filters compiled to parameterized SQL.
//!
//! A [`Filter`] is a list of AND-joined [`Condition`]s. Compilation walks the
//! list and pushes every value through [`QueryBuilder::push_bind`], so each
//! value gets its own positional parameter and a column that appears in
//! several nested groups can never collide with itself.
//!
//! Column names cannot be bound, so they are checked against the target
//! table's column list ([`Table::COLUMNS`]) before any SQL is produced.
//! Conditions naming an unknown column are dropped with a warning.

use sqlx::{QueryBuilder, Sqlite};

/// A bindable SQL value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Real(f64),
    Text(String),
    /// Stored as 0/1; SQLite has no boolean type.
    Bool(bool),
    Blob(Vec<u8>),
}

impl Value {
    /// Push this value as a bound parameter.
    pub fn push_bind(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        match self {
            Value::Null => {
                qb.push_bind(Option::<i64>::None);
            }
            Value::Int(v) => {
                qb.push_bind(*v);
            }
            Value::Real(v) => {
                qb.push_bind(*v);
            }
            Value::Text(v) => {
                qb.push_bind(v.clone());
            }
            Value::Bool(v) => {
                qb.push_bind(i64::from(*v));
            }
            Value::Blob(v) => {
                qb.push_bind(v.clone());
            }
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

macro_rules! value_from_int {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::Int(i64::from(v))
            }
        })*
    };
}

value_from_int!(i64, i32, u32, u16, u8);

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// A single filter condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `col = ?`, or `col IS NULL` for [`Value::Null`]
    Eq(String, Value),
    /// `col IN (?, ...)`; an empty list matches nothing
    In(String, Vec<Value>),
    /// `col NOT IN (?, ...)`; an empty list matches everything
    NotIn(String, Vec<Value>),
    Between(String, Value, Value),
    NotBetween(String, Value, Value),
    Like(String, String),
    NotLike(String, String),
    /// Raw SQL fragment; each `?` is bound to the next value in order.
    /// Column names inside are not checked.
    Raw(String, Vec<Value>),
    /// Nested filter, parenthesized
    Group(Filter),
}

impl Condition {
    fn column(&self) -> Option<&str> {
        match self {
            Condition::Eq(c, _)
            | Condition::In(c, _)
            | Condition::NotIn(c, _)
            | Condition::Between(c, _, _)
            | Condition::NotBetween(c, _, _)
            | Condition::Like(c, _)
            | Condition::NotLike(c, _) => Some(c),
            Condition::Raw(..) | Condition::Group(_) => None,
        }
    }
}

/// AND-joined conditions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::Eq(column.to_string(), value.into()));
        self
    }

    pub fn is_in<V: Into<Value>>(mut self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.conditions.push(Condition::In(column.to_string(), values));
        self
    }

    pub fn not_in<V: Into<Value>>(
        mut self,
        column: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.conditions
            .push(Condition::NotIn(column.to_string(), values));
        self
    }

    pub fn between(mut self, column: &str, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Between(
            column.to_string(),
            low.into(),
            high.into(),
        ));
        self
    }

    pub fn not_between(
        mut self,
        column: &str,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.conditions.push(Condition::NotBetween(
            column.to_string(),
            low.into(),
            high.into(),
        ));
        self
    }

    pub fn like(mut self, column: &str, pattern: impl Into<String>) -> Self {
        self.conditions
            .push(Condition::Like(column.to_string(), pattern.into()));
        self
    }

    pub fn not_like(mut self, column: &str, pattern: impl Into<String>) -> Self {
        self.conditions
            .push(Condition::NotLike(column.to_string(), pattern.into()));
        self
    }

    pub fn raw(mut self, sql: impl Into<String>, binds: Vec<Value>) -> Self {
        self.conditions.push(Condition::Raw(sql.into(), binds));
        self
    }

    pub fn group(mut self, filter: Filter) -> Self {
        self.conditions.push(Condition::Group(filter));
        self
    }

    pub fn push(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Drop conditions that name columns `T` does not have, raw fragments
    /// whose placeholder count does not match their binds, and groups that
    /// end up empty.
    pub fn pruned<T: Table>(&self) -> Filter {
        self.pruned_counting::<T>().0
    }

    /// [`Filter::pruned`] plus the number of conditions it dropped. A write
    /// must not run on a filter that lost any condition, since the rest
    /// matches more rows than the caller asked for.
    pub fn pruned_counting<T: Table>(&self) -> (Filter, usize) {
        let mut dropped = 0;
        let mut conditions = Vec::with_capacity(self.conditions.len());
        for condition in &self.conditions {
            match condition {
                Condition::Group(inner) => {
                    let (inner, inner_dropped) = inner.pruned_counting::<T>();
                    dropped += inner_dropped;
                    if !inner.is_empty() {
                        conditions.push(Condition::Group(inner));
                    }
                }
                Condition::Raw(sql, binds) => {
                    let placeholders = sql.matches('?').count();
                    if placeholders == binds.len() {
                        conditions.push(condition.clone());
                    } else {
                        dropped += 1;
                        tracing::warn!(
                            target: "db::query",
                            table = T::NAME,
                            sql = %sql,
                            placeholders,
                            binds = binds.len(),
                            "Dropping raw filter with mismatched binds"
                        );
                    }
                }
                other => {
                    let column = other.column().unwrap_or_default();
                    if T::has_column(column) {
                        conditions.push(other.clone());
                    } else {
                        dropped += 1;
                        tracing::warn!(
                            target: "db::query",
                            table = T::NAME,
                            column,
                            "Dropping filter on unknown column"
                        );
                    }
                }
            }
        }
        (Filter { conditions }, dropped)
    }
}

/// Schema facts the query builder needs about a table.
pub trait Table {
    const NAME: &'static str;
    const PRIMARY_KEY: &'static str = "id";
    /// Every column that filters, sorts and writes may reference.
    const COLUMNS: &'static [&'static str];
    const DEFAULT_SORT: &'static str;

    fn has_column(column: &str) -> bool {
        Self::COLUMNS.contains(&column)
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Requested ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub column: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Append ` WHERE ...` for an already pruned filter. Pushes nothing for an
/// empty filter.
pub fn push_where(qb: &mut QueryBuilder<'_, Sqlite>, filter: &Filter) {
    if filter.is_empty() {
        return;
    }
    qb.push(" WHERE ");
    push_conditions(qb, filter);
}

fn push_conditions(qb: &mut QueryBuilder<'_, Sqlite>, filter: &Filter) {
    for (i, condition) in filter.conditions().iter().enumerate() {
        if i > 0 {
            qb.push(" AND ");
        }
        push_condition(qb, condition);
    }
}

fn push_condition(qb: &mut QueryBuilder<'_, Sqlite>, condition: &Condition) {
    match condition {
        Condition::Eq(column, value) if value.is_null() => {
            qb.push(column).push(" IS NULL");
        }
        Condition::Eq(column, value) => {
            qb.push(column).push(" = ");
            value.push_bind(qb);
        }
        Condition::In(_, values) if values.is_empty() => {
            qb.push("0 = 1");
        }
        Condition::NotIn(_, values) if values.is_empty() => {
            qb.push("1 = 1");
        }
        Condition::In(column, values) | Condition::NotIn(column, values) => {
            let op = if matches!(condition, Condition::In(..)) {
                " IN ("
            } else {
                " NOT IN ("
            };
            qb.push(column).push(op);
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    qb.push(", ");
                }
                value.push_bind(qb);
            }
            qb.push(")");
        }
        Condition::Between(column, low, high) | Condition::NotBetween(column, low, high) => {
            let op = if matches!(condition, Condition::Between(..)) {
                " BETWEEN "
            } else {
                " NOT BETWEEN "
            };
            qb.push(column).push(op);
            low.push_bind(qb);
            qb.push(" AND ");
            high.push_bind(qb);
        }
        Condition::Like(column, pattern) => {
            qb.push(column).push(" LIKE ").push_bind(pattern.clone());
        }
        Condition::NotLike(column, pattern) => {
            qb.push(column)
                .push(" NOT LIKE ")
                .push_bind(pattern.clone());
        }
        Condition::Raw(sql, binds) => {
            qb.push("(");
            let mut binds = binds.iter();
            for (i, part) in sql.split('?').enumerate() {
                if i > 0
                    && let Some(value) = binds.next()
                {
                    value.push_bind(qb);
                }
                qb.push(part);
            }
            qb.push(")");
        }
        Condition::Group(inner) => {
            qb.push("(");
            push_conditions(qb, inner);
            qb.push(")");
        }
    }
}

/// Append ` ORDER BY` for `T`. A missing or unknown sort column falls back
/// to [`Table::DEFAULT_SORT`], keeping the requested direction; the primary
/// key breaks ties so paging is stable.
pub fn push_order<T: Table>(qb: &mut QueryBuilder<'_, Sqlite>, sort: Option<&Sort>) {
    let direction = sort.map(|s| s.direction).unwrap_or_default();
    let column = match sort {
        Some(s) if T::has_column(&s.column) => s.column.as_str(),
        Some(s) => {
            tracing::warn!(
                target: "db::query",
                table = T::NAME,
                column = %s.column,
                fallback = T::DEFAULT_SORT,
                "Unknown sort column"
            );
            T::DEFAULT_SORT
        }
        None => T::DEFAULT_SORT,
    };

    qb.push(" ORDER BY ")
        .push(column)
        .push(" ")
        .push(direction.as_sql());
    if column != T::PRIMARY_KEY {
        qb.push(", ").push(T::PRIMARY_KEY).push(" ASC");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Songs;

    impl Table for Songs {
        const NAME: &'static str = "songs";
        const COLUMNS: &'static [&'static str] = &["id", "title", "year", "favorite"];
        const DEFAULT_SORT: &'static str = "title";
    }

    fn compile(filter: &Filter) -> String {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM songs");
        push_where(&mut qb, &filter.pruned::<Songs>());
        qb.sql().to_string()
    }

    #[test]
    fn test_empty_filter_has_no_where() {
        assert_eq!(compile(&Filter::new()), "SELECT * FROM songs");
    }

    #[test]
    fn test_conditions_and_join_with_positional_binds() {
        let filter = Filter::new()
            .eq("title", "Song")
            .between("year", 1970, 1980)
            .eq("favorite", true);
        assert_eq!(
            compile(&filter),
            "SELECT * FROM songs WHERE title = ? AND year BETWEEN ? AND ? AND favorite = ?"
        );
    }

    #[test]
    fn test_same_column_in_nested_groups() {
        let filter = Filter::new()
            .eq("year", 1976)
            .group(Filter::new().eq("year", 1977).like("title", "%Live%"));
        assert_eq!(
            compile(&filter),
            "SELECT * FROM songs WHERE year = ? AND (year = ? AND title LIKE ?)"
        );
    }

    #[test]
    fn test_null_equality_and_empty_lists() {
        let filter = Filter::new()
            .eq("year", Option::<i32>::None)
            .is_in("id", Vec::<i64>::new())
            .not_in("id", Vec::<i64>::new());
        assert_eq!(
            compile(&filter),
            "SELECT * FROM songs WHERE year IS NULL AND 0 = 1 AND 1 = 1"
        );
    }

    #[test]
    fn test_in_and_not_like() {
        let filter = Filter::new()
            .is_in("id", [1i64, 2, 3])
            .not_like("title", "%demo%")
            .not_between("year", 1990, 1999);
        assert_eq!(
            compile(&filter),
            "SELECT * FROM songs WHERE id IN (?, ?, ?) AND title NOT LIKE ? AND year NOT BETWEEN ? AND ?"
        );
    }

    #[test]
    fn test_unknown_columns_and_empty_groups_are_dropped() {
        let filter = Filter::new()
            .eq("title; DROP TABLE songs", "x")
            .group(Filter::new().eq("nope", 1))
            .eq("year", 2000);
        assert_eq!(compile(&filter), "SELECT * FROM songs WHERE year = ?");
    }

    #[test]
    fn test_pruning_counts_dropped_conditions() {
        let filter = Filter::new()
            .eq("year", 2000)
            .eq("yaer", 2001)
            .group(Filter::new().eq("title", "x").eq("nope", 1))
            .raw("year > ?", vec![]);
        let (pruned, dropped) = filter.pruned_counting::<Songs>();
        assert_eq!(dropped, 3);
        assert!(!pruned.is_empty());

        let (_, dropped) = Filter::new().eq("year", 2000).pruned_counting::<Songs>();
        assert_eq!(dropped, 0);
    }

    #[test]
    fn test_raw_fragment_binds_in_order() {
        let filter = Filter::new().raw(
            "year > ? OR title = ?",
            vec![Value::from(1990), Value::from("x")],
        );
        assert_eq!(
            compile(&filter),
            "SELECT * FROM songs WHERE (year > ? OR title = ?)"
        );
    }

    #[test]
    fn test_raw_fragment_with_wrong_bind_count_is_dropped() {
        let filter = Filter::new()
            .raw("year > ?", vec![])
            .eq("title", "x");
        assert_eq!(compile(&filter), "SELECT * FROM songs WHERE title = ?");
    }

    #[test]
    fn test_order_falls_back_to_default_column() {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM songs");
        push_order::<Songs>(&mut qb, Some(&Sort::desc("bogus")));
        assert_eq!(
            qb.sql().to_string(),
            "SELECT * FROM songs ORDER BY title DESC, id ASC"
        );
    }

    #[test]
    fn test_order_by_primary_key_has_no_tiebreak() {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM songs");
        push_order::<Songs>(&mut qb, Some(&Sort::asc("id")));
        assert_eq!(qb.sql().to_string(), "SELECT * FROM songs ORDER BY id ASC");
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(Some(3u32)), Value::Int(3));
        assert_eq!(Value::from(Option::<String>::None), Value::Null);
    }
}
