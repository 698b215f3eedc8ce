use sqlx::SqlitePool;

#[derive(Debug, Clone)]
pub struct ContentRow {
    pub id: String,
    pub external_key: String,
    pub title: String,
    pub year: Option<i64>,
    pub partition_name: String,
    pub section_id: i64,
    pub kind: String,
    pub is_reachable: bool,
    pub last_seen_ts: i64,
}

/// Fields written by a reindex sweep for one enumerated item.
#[derive(Debug, Clone)]
pub struct ContentUpsert<'a> {
    pub external_key: &'a str,
    pub title: &'a str,
    pub year: Option<i64>,
    pub partition_name: &'a str,
    pub section_id: i64,
    pub kind: &'a str,
    pub cross_refs: &'a [String],
}

const CONTENT_COLUMNS: &str = "id, external_key, title, year, partition_name, section_id, kind, \
                               is_reachable, last_seen_ts";

type ContentTuple = (
    String,
    String,
    String,
    Option<i64>,
    String,
    i64,
    String,
    bool,
    i64,
);

/// Insert or refresh a row keyed by `external_key`, stamping it with the
/// current sweep. The row's id survives updates. Cross-reference ids are
/// replaced wholesale.
pub async fn upsert_content(
    pool: &SqlitePool,
    item: &ContentUpsert<'_>,
    sweep_id: &str,
) -> Result<String, sqlx::Error> {
    let now = chrono::Utc::now().timestamp();
    let new_id = uuid::Uuid::new_v4().to_string();

    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO content (id, external_key, title, year, partition_name, section_id, kind, \
         is_reachable, sweep_id, last_seen_ts, created_ts, updated_ts) \
         VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?, ?, ?) \
         ON CONFLICT(external_key) DO UPDATE SET \
         title = excluded.title, year = excluded.year, \
         partition_name = excluded.partition_name, section_id = excluded.section_id, \
         kind = excluded.kind, is_reachable = 1, sweep_id = excluded.sweep_id, \
         last_seen_ts = excluded.last_seen_ts, updated_ts = excluded.updated_ts",
    )
    .bind(&new_id)
    .bind(item.external_key)
    .bind(item.title)
    .bind(item.year)
    .bind(item.partition_name)
    .bind(item.section_id)
    .bind(item.kind)
    .bind(sweep_id)
    .bind(now)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let (id,): (String,) = sqlx::query_as("SELECT id FROM content WHERE external_key = ?")
        .bind(item.external_key)
        .fetch_one(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM content_cross_ref WHERE content_id = ?")
        .bind(&id)
        .execute(&mut *tx)
        .await?;

    for cross_ref in item.cross_refs {
        sqlx::query("INSERT OR IGNORE INTO content_cross_ref (content_id, cross_ref) VALUES (?, ?)")
            .bind(&id)
            .bind(cross_ref)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    Ok(id)
}

/// Flag every reachable row of a partition that the given sweep did not touch.
pub async fn mark_unseen_unreachable(
    pool: &SqlitePool,
    partition_name: &str,
    sweep_id: &str,
) -> Result<u64, sqlx::Error> {
    let now = chrono::Utc::now().timestamp();
    let result = sqlx::query(
        "UPDATE content SET is_reachable = 0, updated_ts = ? \
         WHERE partition_name = ? AND is_reachable = 1 \
         AND (sweep_id IS NULL OR sweep_id != ?)",
    )
    .bind(now)
    .bind(partition_name)
    .bind(sweep_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Delete unreachable rows last seen before `cutoff_ts`. Cross-reference rows
/// go with them through the foreign key.
pub async fn purge_unreachable(pool: &SqlitePool, cutoff_ts: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM content WHERE is_reachable = 0 AND last_seen_ts < ?")
        .bind(cutoff_ts)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// One random reachable row of a partition whose external key is not in `skip_keys`.
pub async fn random_in_partition(
    pool: &SqlitePool,
    partition_name: &str,
    skip_keys: &[String],
) -> Result<Option<ContentRow>, sqlx::Error> {
    random_where(pool, "partition_name", partition_name, skip_keys).await
}

pub async fn random_of_kind(
    pool: &SqlitePool,
    kind: &str,
    skip_keys: &[String],
) -> Result<Option<ContentRow>, sqlx::Error> {
    random_where(pool, "kind", kind, skip_keys).await
}

async fn random_where(
    pool: &SqlitePool,
    column: &str,
    value: &str,
    skip_keys: &[String],
) -> Result<Option<ContentRow>, sqlx::Error> {
    let skip = if skip_keys.is_empty() {
        String::new()
    } else {
        let placeholders = vec!["?"; skip_keys.len()].join(", ");
        format!("AND external_key NOT IN ({placeholders}) ")
    };
    let query = format!(
        "SELECT {CONTENT_COLUMNS} FROM content \
         WHERE {column} = ? AND is_reachable = 1 {skip}ORDER BY RANDOM() LIMIT 1"
    );

    let mut q = sqlx::query_as::<_, ContentTuple>(&query).bind(value);
    for key in skip_keys {
        q = q.bind(key);
    }
    let row = q.fetch_optional(pool).await?;
    Ok(row.map(row_to_content))
}

pub async fn get_by_external_key(
    pool: &SqlitePool,
    external_key: &str,
) -> Result<Option<ContentRow>, sqlx::Error> {
    let query = format!("SELECT {CONTENT_COLUMNS} FROM content WHERE external_key = ?");
    let row: Option<ContentTuple> = sqlx::query_as(&query)
        .bind(external_key)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(row_to_content))
}

/// All rows of a partition, reachable or not, ordered by title.
pub async fn list_partition(
    pool: &SqlitePool,
    partition_name: &str,
) -> Result<Vec<ContentRow>, sqlx::Error> {
    let query = format!(
        "SELECT {CONTENT_COLUMNS} FROM content WHERE partition_name = ? ORDER BY title, external_key"
    );
    let rows: Vec<ContentTuple> = sqlx::query_as(&query)
        .bind(partition_name)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(row_to_content).collect())
}

pub async fn count_reachable_in_partition(
    pool: &SqlitePool,
    partition_name: &str,
) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM content WHERE partition_name = ? AND is_reachable = 1",
    )
    .bind(partition_name)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

pub async fn count_reachable_of_kind(pool: &SqlitePool, kind: &str) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM content WHERE kind = ? AND is_reachable = 1")
            .bind(kind)
            .fetch_one(pool)
            .await?;
    Ok(count)
}

pub async fn get_cross_refs(
    pool: &SqlitePool,
    content_id: &str,
) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT cross_ref FROM content_cross_ref WHERE content_id = ? ORDER BY cross_ref",
    )
    .bind(content_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(r,)| r).collect())
}

fn row_to_content(r: ContentTuple) -> ContentRow {
    ContentRow {
        id: r.0,
        external_key: r.1,
        title: r.2,
        year: r.3,
        partition_name: r.4,
        section_id: r.5,
        kind: r.6,
        is_reachable: r.7,
        last_seen_ts: r.8,
    }
}
