//! Track rows.
//!
//! Tracks are keyed by file path. Writes here come from the scanner (via the
//! entity index) and from the two user-facing mutations, favorite and play
//! count. Re-indexing a path goes through [`update_track`], which never
//! touches `favorite`, `play_count` or `last_played`.

use std::path::{MAIN_SEPARATOR, Path};

use sqlx::sqlite::{SqliteConnection, SqlitePool};

use super::query::{Filter, Table, Value};
use super::repo::{self, Record};
use super::{now_text, parse_json_list, parse_timestamp, to_json_list};
use crate::model::{ArtistIds, ArtistNames, Track};

// ============================================================================
// Database Row Types
// ============================================================================

/// Database row for the tracks table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TrackRow {
    pub id: i64,
    pub path: String,
    pub title: String,
    pub artist: String,
    pub artists: String,
    pub artist_ids: String,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub genre: Option<String>,
    pub year: Option<i64>,
    pub track_number: Option<i64>,
    pub disc_number: Option<i64>,
    pub duration: i64,
    pub bitrate: Option<i64>,
    pub sample_rate: Option<i64>,
    pub channels: Option<i64>,
    pub size: i64,
    pub favorite: bool,
    pub play_count: i64,
    pub last_played: Option<String>,
    pub cover_image: Option<Vec<u8>>,
    pub lyrics: Option<String>,
    pub album_id: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

impl Table for TrackRow {
    const NAME: &'static str = "tracks";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "path",
        "title",
        "artist",
        "artists",
        "artist_ids",
        "album",
        "album_artist",
        "genre",
        "year",
        "track_number",
        "disc_number",
        "duration",
        "bitrate",
        "sample_rate",
        "channels",
        "size",
        "favorite",
        "play_count",
        "last_played",
        "cover_image",
        "lyrics",
        "album_id",
        "created_at",
        "updated_at",
    ];
    const DEFAULT_SORT: &'static str = "title";
}

fn to_u32(v: i64) -> u32 {
    u32::try_from(v).unwrap_or(0)
}

impl From<TrackRow> for Track {
    fn from(row: TrackRow) -> Self {
        Track {
            id: row.id,
            path: row.path,
            title: row.title,
            artist: row.artist,
            artists: parse_json_list::<ArtistNames>(&row.artists),
            artist_ids: parse_json_list::<ArtistIds>(&row.artist_ids),
            album: row.album,
            album_artist: row.album_artist,
            genre: row.genre,
            year: row.year.and_then(|y| i32::try_from(y).ok()),
            track_number: row.track_number.map(to_u32),
            disc_number: row.disc_number.map(to_u32),
            duration: to_u32(row.duration),
            bitrate: row.bitrate.map(to_u32),
            sample_rate: row.sample_rate.map(to_u32),
            channels: row.channels.and_then(|c| u8::try_from(c).ok()),
            size: u64::try_from(row.size).unwrap_or(0),
            favorite: row.favorite,
            play_count: to_u32(row.play_count),
            last_played: row.last_played.as_deref().map(parse_timestamp),
            cover_image: row.cover_image,
            lyrics: row.lyrics,
            album_id: row.album_id,
            created_at: parse_timestamp(&row.created_at),
            updated_at: parse_timestamp(&row.updated_at),
        }
    }
}

/// Derived fields written on every (re-)index of a file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackFields {
    pub path: String,
    pub title: String,
    pub artist: String,
    pub artists: ArtistNames,
    pub artist_ids: ArtistIds,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub genre: Option<String>,
    pub year: Option<i32>,
    pub track_number: Option<u32>,
    pub disc_number: Option<u32>,
    pub duration: u32,
    pub bitrate: Option<u32>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u8>,
    pub size: u64,
    pub cover_image: Option<Vec<u8>>,
    pub lyrics: Option<String>,
    pub album_id: Option<i64>,
}

impl TrackFields {
    fn record(&self) -> Record {
        Record::new()
            .set("title", self.title.as_str())
            .set("artist", self.artist.as_str())
            .set("artists", to_json_list(self.artists.as_slice()))
            .set("artist_ids", to_json_list(self.artist_ids.as_slice()))
            .set("album", self.album.clone())
            .set("album_artist", self.album_artist.clone())
            .set("genre", self.genre.clone())
            .set("year", self.year)
            .set("track_number", self.track_number)
            .set("disc_number", self.disc_number)
            .set("duration", self.duration)
            .set("bitrate", self.bitrate)
            .set("sample_rate", self.sample_rate)
            .set("channels", self.channels)
            .set("size", self.size)
            .set("cover_image", self.cover_image.clone())
            .set("lyrics", self.lyrics.clone())
            .set("album_id", self.album_id)
    }
}

// ============================================================================
// Index-time writes (run inside the entity index transaction)
// ============================================================================

/// Look up a track id by path.
pub async fn id_by_path(conn: &mut SqliteConnection, path: &str) -> sqlx::Result<Option<i64>> {
    sqlx::query_scalar("SELECT id FROM tracks WHERE path = ?")
        .bind(path)
        .fetch_optional(conn)
        .await
}

/// Insert a new track row. Favorite and play history start empty.
pub async fn insert_track(conn: &mut SqliteConnection, fields: &TrackFields) -> sqlx::Result<i64> {
    let now = now_text();
    let record = fields
        .record()
        .set("path", fields.path.as_str())
        .set("created_at", now.clone())
        .set("updated_at", now);

    let mut qb = sqlx::QueryBuilder::<sqlx::Sqlite>::new("INSERT INTO tracks (");
    push_columns(&mut qb, &record);
    qb.push(") VALUES (");
    push_values(&mut qb, &record);
    qb.push(") RETURNING id");

    qb.build_query_scalar::<i64>().fetch_one(conn).await
}

/// Overwrite the derived tag fields of an existing track.
pub async fn update_track(
    conn: &mut SqliteConnection,
    id: i64,
    fields: &TrackFields,
) -> sqlx::Result<()> {
    let record = fields.record().set("updated_at", now_text());

    let mut qb = sqlx::QueryBuilder::<sqlx::Sqlite>::new("UPDATE tracks SET ");
    for (i, (column, value)) in record.fields().iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        qb.push(column.as_str()).push(" = ");
        value.push_bind(&mut qb);
    }
    qb.push(" WHERE id = ").push_bind(id);

    qb.build().execute(conn).await?;
    Ok(())
}

fn push_columns(qb: &mut sqlx::QueryBuilder<'_, sqlx::Sqlite>, record: &Record) {
    for (i, (column, _)) in record.fields().iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        qb.push(column.as_str());
    }
}

fn push_values(qb: &mut sqlx::QueryBuilder<'_, sqlx::Sqlite>, record: &Record) {
    for (i, (_, value)) in record.fields().iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        value.push_bind(qb);
    }
}

// ============================================================================
// Reads and user-facing mutations
// ============================================================================

/// Get a track by its database ID.
pub async fn get_track(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<Track>> {
    let row = sqlx::query_as::<_, TrackRow>("SELECT * FROM tracks WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(Track::from))
}

/// Get a track by its file path.
pub async fn get_track_by_path(pool: &SqlitePool, path: &str) -> sqlx::Result<Option<Track>> {
    let row = sqlx::query_as::<_, TrackRow>("SELECT * FROM tracks WHERE path = ?")
        .bind(path)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(Track::from))
}

/// Delete the row for one path. Returns the number of rows removed.
pub async fn delete_track_by_path(pool: &SqlitePool, path: &str) -> sqlx::Result<u64> {
    repo::delete_where::<TrackRow>(pool, &Filter::new().eq("path", path)).await
}

/// Delete every track stored under `root`.
pub async fn delete_tracks_under(pool: &SqlitePool, root: &Path) -> sqlx::Result<u64> {
    let root = root.to_string_lossy();
    let root = root.trim_end_matches(MAIN_SEPARATOR);
    let prefix = format!("{root}{MAIN_SEPARATOR}");

    let filter = Filter::new().raw(
        "substr(path, 1, length(?)) = ?",
        vec![Value::from(prefix.as_str()), Value::from(prefix.as_str())],
    );
    repo::delete_where::<TrackRow>(pool, &filter).await
}

/// Set or clear the favorite flag. Returns false if no such track exists.
pub async fn set_favorite(pool: &SqlitePool, id: i64, favorite: bool) -> sqlx::Result<bool> {
    let set = Record::new()
        .set("favorite", favorite)
        .set("updated_at", now_text());
    let changed = repo::update_where::<TrackRow>(pool, &set, &Filter::new().eq("id", id)).await?;
    Ok(changed > 0)
}

/// Bump the play count and stamp the play time. Returns false if no such
/// track exists.
pub async fn record_play(pool: &SqlitePool, id: i64) -> sqlx::Result<bool> {
    let now = now_text();
    let result = sqlx::query(
        "UPDATE tracks SET play_count = play_count + 1, last_played = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&now)
    .bind(&now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{sample_fields, temp_db};

    #[tokio::test]
    async fn test_insert_and_read_back() {
        let (pool, _dir) = temp_db().await;
        let mut conn = pool.acquire().await.unwrap();

        let fields = sample_fields("/music/a.mp3", "Song", "A & B");
        let id = insert_track(&mut conn, &fields).await.unwrap();
        assert_eq!(id_by_path(&mut conn, "/music/a.mp3").await.unwrap(), Some(id));

        let track = get_track(&pool, id).await.unwrap().unwrap();
        assert_eq!(track.title, "Song");
        assert_eq!(track.artist, "A & B");
        assert!(!track.favorite);
        assert_eq!(track.play_count, 0);
    }

    #[tokio::test]
    async fn test_update_preserves_user_fields() {
        let (pool, _dir) = temp_db().await;
        let mut conn = pool.acquire().await.unwrap();

        let mut fields = sample_fields("/music/a.mp3", "Song", "Band");
        let id = insert_track(&mut conn, &fields).await.unwrap();
        drop(conn);

        assert!(set_favorite(&pool, id, true).await.unwrap());
        assert!(record_play(&pool, id).await.unwrap());

        fields.title = "Song (retagged)".to_string();
        let mut conn = pool.acquire().await.unwrap();
        update_track(&mut conn, id, &fields).await.unwrap();

        let track = get_track_by_path(&pool, "/music/a.mp3").await.unwrap().unwrap();
        assert_eq!(track.title, "Song (retagged)");
        assert!(track.favorite);
        assert_eq!(track.play_count, 1);
        assert!(track.last_played.is_some());
    }

    #[tokio::test]
    async fn test_mutations_on_missing_track() {
        let (pool, _dir) = temp_db().await;
        assert!(!set_favorite(&pool, 999, true).await.unwrap());
        assert!(!record_play(&pool, 999).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_tracks_under_root_only() {
        let (pool, _dir) = temp_db().await;
        let mut conn = pool.acquire().await.unwrap();
        let sep = MAIN_SEPARATOR;
        for path in [
            format!("{sep}music{sep}a.mp3"),
            format!("{sep}music{sep}sub{sep}b.mp3"),
            format!("{sep}music2{sep}c.mp3"),
        ] {
            insert_track(&mut conn, &sample_fields(&path, "T", "A"))
                .await
                .unwrap();
        }
        drop(conn);

        let root = format!("{sep}music{sep}");
        let removed = delete_tracks_under(&pool, Path::new(&root)).await.unwrap();
        assert_eq!(removed, 2);

        let remaining = get_track_by_path(&pool, &format!("{sep}music2{sep}c.mp3"))
            .await
            .unwrap();
        assert!(remaining.is_some());
    }

    #[tokio::test]
    async fn test_delete_by_path() {
        let (pool, _dir) = temp_db().await;
        let mut conn = pool.acquire().await.unwrap();
        insert_track(&mut conn, &sample_fields("/m/a.mp3", "T", "A"))
            .await
            .unwrap();
        drop(conn);

        assert_eq!(delete_track_by_path(&pool, "/m/a.mp3").await.unwrap(), 1);
        assert_eq!(delete_track_by_path(&pool, "/m/a.mp3").await.unwrap(), 0);
    }
}
