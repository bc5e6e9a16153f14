//! Table-generic reads and writes built on [`super::query`].
//!
//! Everything here is parameterized by a [`Table`] implementation, so the
//! same paging, counting and batch-write code serves tracks, artists,
//! albums and the online cache.
//!
//! Paged reads issue the count and the data query separately with the same
//! WHERE clause. They are not wrapped in a transaction, so a concurrent
//! write between the two can make `total` disagree with the data by a row.

use super::query::{Filter, Sort, Table, Value, push_order, push_where};
use rand::Rng;
use serde::Serialize;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{FromRow, QueryBuilder, Sqlite};

/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: u32 = 500;

/// Page size used when none is given.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Modulus for the random-order hash; the largest 31-bit prime.
const RANDOM_MODULUS: i64 = 2_147_483_647;

/// A clamped page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    /// Pages below 1 clamp to 1; sizes clamp to `1..=MAX_PAGE_SIZE`.
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub pages: u64,
}

impl Pagination {
    fn new(request: PageRequest, total: u64) -> Self {
        Self {
            page: request.page,
            page_size: request.page_size,
            total,
            pages: total.div_ceil(u64::from(request.page_size)),
        }
    }
}

/// One page of results plus its pagination envelope.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}

/// Column/value pairs for a single row write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.fields.push((column.to_string(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    fn pruned<T: Table>(&self) -> Vec<(&str, &Value)> {
        self.fields
            .iter()
            .filter(|(column, _)| {
                let known = T::has_column(column);
                if !known {
                    tracing::warn!(
                        target: "db::repo",
                        table = T::NAME,
                        column = %column,
                        "Dropping write to unknown column"
                    );
                }
                known
            })
            .map(|(column, value)| (column.as_str(), value))
            .collect()
    }
}

/// What a batch insert does when a row violates a uniqueness constraint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Conflict {
    /// Fail the whole batch (the transaction rolls back)
    #[default]
    Abort,
    /// Skip the conflicting row
    Ignore,
    /// Replace the existing row
    Replace,
}

impl Conflict {
    fn insert_verb(self) -> &'static str {
        match self {
            Conflict::Abort => "INSERT INTO ",
            Conflict::Ignore => "INSERT OR IGNORE INTO ",
            Conflict::Replace => "INSERT OR REPLACE INTO ",
        }
    }
}

/// Count rows matching `filter`.
pub async fn count<T: Table>(pool: &SqlitePool, filter: &Filter) -> sqlx::Result<u64> {
    let filter = filter.pruned::<T>();
    let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT COUNT(*) FROM {}", T::NAME));
    push_where(&mut qb, &filter);
    let total = qb.build_query_scalar::<i64>().fetch_one(pool).await?;
    Ok(u64::try_from(total).unwrap_or(0))
}

/// Fetch one sorted page of rows matching `filter`.
pub async fn paginate<T>(
    pool: &SqlitePool,
    filter: &Filter,
    sort: Option<&Sort>,
    request: PageRequest,
) -> sqlx::Result<Page<T>>
where
    T: Table + for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    let filter = filter.pruned::<T>();
    let total = count::<T>(pool, &filter).await?;

    let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT * FROM {}", T::NAME));
    push_where(&mut qb, &filter);
    push_order::<T>(&mut qb, sort);
    push_limit(&mut qb, request);

    let data = qb.build_query_as::<T>().fetch_all(pool).await?;
    Ok(Page {
        data,
        pagination: Pagination::new(request, total),
    })
}

/// Fetch one page in a pseudo-random order.
///
/// The order is a hash of the primary key and `seed`, so requesting
/// successive pages with the returned seed walks one consistent
/// permutation. A fresh seed is drawn when none is given.
pub async fn paginate_random<T>(
    pool: &SqlitePool,
    filter: &Filter,
    request: PageRequest,
    seed: Option<i64>,
) -> sqlx::Result<(Page<T>, i64)>
where
    T: Table + for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    let seed = match seed {
        Some(seed) => seed.rem_euclid(RANDOM_MODULUS - 1) + 1,
        None => rand::rng().random_range(1..RANDOM_MODULUS),
    };

    let filter = filter.pruned::<T>();
    let total = count::<T>(pool, &filter).await?;

    let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT * FROM {}", T::NAME));
    push_where(&mut qb, &filter);
    qb.push(" ORDER BY ((")
        .push(T::PRIMARY_KEY)
        .push(" * ")
        .push_bind(seed)
        .push(") % ")
        .push(RANDOM_MODULUS.to_string())
        .push("), ")
        .push(T::PRIMARY_KEY);
    push_limit(&mut qb, request);

    let data = qb.build_query_as::<T>().fetch_all(pool).await?;
    Ok((
        Page {
            data,
            pagination: Pagination::new(request, total),
        },
        seed,
    ))
}

fn push_limit(qb: &mut QueryBuilder<'_, Sqlite>, request: PageRequest) {
    qb.push(" LIMIT ")
        .push_bind(i64::from(request.page_size))
        .push(" OFFSET ")
        .push_bind(request.offset());
}

/// Insert many rows inside one transaction.
///
/// Returns the number of rows written. With [`Conflict::Abort`] the first
/// failing row rolls back the whole batch.
pub async fn batch_insert<T: Table>(
    pool: &SqlitePool,
    records: &[Record],
    conflict: Conflict,
) -> sqlx::Result<u64> {
    let mut tx = pool.begin().await?;
    let mut written = 0;

    for record in records {
        let fields = record.pruned::<T>();
        if fields.is_empty() {
            continue;
        }
        let mut qb = insert_builder::<T>(conflict.insert_verb(), &fields);
        written += qb.build().execute(&mut *tx).await?.rows_affected();
    }

    tx.commit().await?;
    Ok(written)
}

/// Insert a row, or update every given column if the primary key exists.
pub async fn upsert<T: Table>(pool: &SqlitePool, record: &Record) -> sqlx::Result<u64> {
    let fields = record.pruned::<T>();
    if fields.is_empty() {
        return Ok(0);
    }

    let mut qb = insert_builder::<T>("INSERT INTO ", &fields);
    qb.push(" ON CONFLICT(").push(T::PRIMARY_KEY).push(") DO ");

    let updates: Vec<&str> = fields
        .iter()
        .map(|(column, _)| *column)
        .filter(|column| *column != T::PRIMARY_KEY)
        .collect();
    if updates.is_empty() {
        qb.push("NOTHING");
    } else {
        qb.push("UPDATE SET ");
        for (i, column) in updates.iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            qb.push(*column).push(" = excluded.").push(*column);
        }
    }

    Ok(qb.build().execute(pool).await?.rows_affected())
}

/// Update matching rows. Returns the number of rows changed.
///
/// A filter that loses any condition to pruning updates nothing, rather
/// than the wider set of rows the remaining conditions match.
pub async fn update_where<T: Table>(
    pool: &SqlitePool,
    set: &Record,
    filter: &Filter,
) -> sqlx::Result<u64> {
    let fields = set.pruned::<T>();
    let (pruned, dropped) = filter.pruned_counting::<T>();
    if fields.is_empty() {
        return Ok(0);
    }
    if dropped > 0 {
        tracing::warn!(target: "db::repo", table = T::NAME, dropped, "Refusing update on a partly invalid filter");
        return Ok(0);
    }

    let mut qb = QueryBuilder::<Sqlite>::new(format!("UPDATE {} SET ", T::NAME));
    for (i, (column, value)) in fields.iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        qb.push(*column).push(" = ");
        value.push_bind(&mut qb);
    }
    push_where(&mut qb, &pruned);

    Ok(qb.build().execute(pool).await?.rows_affected())
}

/// Delete matching rows. Returns the number of rows removed.
///
/// An empty filter, or one that loses any condition to pruning, deletes
/// nothing.
pub async fn delete_where<T: Table>(pool: &SqlitePool, filter: &Filter) -> sqlx::Result<u64> {
    let (pruned, dropped) = filter.pruned_counting::<T>();
    if dropped > 0 {
        tracing::warn!(target: "db::repo", table = T::NAME, dropped, "Refusing delete on a partly invalid filter");
        return Ok(0);
    }
    if pruned.is_empty() {
        tracing::warn!(target: "db::repo", table = T::NAME, "Refusing unfiltered delete");
        return Ok(0);
    }

    let mut qb = QueryBuilder::<Sqlite>::new(format!("DELETE FROM {}", T::NAME));
    push_where(&mut qb, &pruned);
    Ok(qb.build().execute(pool).await?.rows_affected())
}

fn insert_builder<'a, T: Table>(verb: &str, fields: &[(&str, &Value)]) -> QueryBuilder<'a, Sqlite> {
    let mut qb = QueryBuilder::<Sqlite>::new(verb);
    qb.push(T::NAME).push(" (");
    for (i, (column, _)) in fields.iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        qb.push(*column);
    }
    qb.push(") VALUES (");
    for (i, (_, value)) in fields.iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        value.push_bind(&mut qb);
    }
    qb.push(")");
    qb
}
