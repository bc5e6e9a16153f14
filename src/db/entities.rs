//! Artist and album rows.
//!
//! The write helpers take a `&mut SqliteConnection` so the entity index can
//! run them inside the per-file transaction. Creation uses
//! `INSERT ... ON CONFLICT DO NOTHING` followed by a lookup, which makes
//! concurrent creation of the same key converge on one row.

use sqlx::sqlite::{SqliteConnection, SqlitePool};

use super::query::Table;
use super::{now_text, parse_json_list, parse_timestamp, to_json_list};
use crate::model::{Album, Artist, ArtistIds, ArtistNames};

// ============================================================================
// Database Row Types
// ============================================================================

/// Database row for the artists table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ArtistRow {
    pub id: i64,
    pub canonical_key: String,
    pub name: String,
    pub track_count: i64,
    pub album_count: i64,
    pub photo: Option<String>,
    pub bio: Option<String>,
    pub country: Option<String>,
    pub genre: Option<String>,
    pub website: Option<String>,
    pub social_media: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Table for ArtistRow {
    const NAME: &'static str = "artists";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "canonical_key",
        "name",
        "track_count",
        "album_count",
        "photo",
        "bio",
        "country",
        "genre",
        "website",
        "social_media",
        "created_at",
        "updated_at",
    ];
    const DEFAULT_SORT: &'static str = "name";
}

impl From<ArtistRow> for Artist {
    fn from(row: ArtistRow) -> Self {
        Artist {
            id: row.id,
            name: row.name,
            track_count: u32::try_from(row.track_count).unwrap_or(0),
            album_count: u32::try_from(row.album_count).unwrap_or(0),
            photo: row.photo,
            bio: row.bio,
            country: row.country,
            genre: row.genre,
            website: row.website,
            social_media: parse_json_list(&row.social_media),
            created_at: parse_timestamp(&row.created_at),
            updated_at: parse_timestamp(&row.updated_at),
        }
    }
}

/// Database row for the albums table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AlbumRow {
    pub id: i64,
    pub canonical_key: String,
    pub title: String,
    pub primary_artist: String,
    pub artists: String,
    pub artist_ids: String,
    pub track_count: i64,
    pub year: Option<i64>,
    pub cover_image: Option<Vec<u8>>,
    pub created_at: String,
    pub updated_at: String,
}

impl Table for AlbumRow {
    const NAME: &'static str = "albums";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "canonical_key",
        "title",
        "primary_artist",
        "artists",
        "artist_ids",
        "track_count",
        "year",
        "created_at",
        "updated_at",
    ];
    const DEFAULT_SORT: &'static str = "title";
}

impl From<AlbumRow> for Album {
    fn from(row: AlbumRow) -> Self {
        Album {
            id: row.id,
            title: row.title,
            primary_artist: row.primary_artist,
            artists: parse_json_list::<ArtistNames>(&row.artists),
            artist_ids: parse_json_list::<ArtistIds>(&row.artist_ids),
            track_count: u32::try_from(row.track_count).unwrap_or(0),
            year: row.year.and_then(|y| i32::try_from(y).ok()),
            cover_image: row.cover_image,
            created_at: parse_timestamp(&row.created_at),
            updated_at: parse_timestamp(&row.updated_at),
        }
    }
}

// ============================================================================
// Artists
// ============================================================================

/// Look up an artist id by canonical key.
pub async fn artist_id_by_key(conn: &mut SqliteConnection, key: &str) -> sqlx::Result<Option<i64>> {
    sqlx::query_scalar("SELECT id FROM artists WHERE canonical_key = ?")
        .bind(key)
        .fetch_optional(conn)
        .await
}

/// Return the artist for `key`, creating it with zero counts if absent.
///
/// The boolean is true when this call created the row.
pub async fn get_or_create_artist(
    conn: &mut SqliteConnection,
    key: &str,
    name: &str,
) -> sqlx::Result<(i64, bool)> {
    let now = now_text();
    let inserted = sqlx::query(
        "INSERT INTO artists (canonical_key, name, created_at, updated_at) VALUES (?, ?, ?, ?) \
         ON CONFLICT(canonical_key) DO NOTHING",
    )
    .bind(key)
    .bind(name)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await?
    .rows_affected()
        > 0;

    let id = artist_id_by_key(conn, key)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;
    Ok((id, inserted))
}

/// Add one to an artist's track count.
pub async fn increment_artist_tracks(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<()> {
    sqlx::query("UPDATE artists SET track_count = track_count + 1, updated_at = ? WHERE id = ?")
        .bind(now_text())
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Add one to an artist's album count.
pub async fn increment_artist_albums(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<()> {
    sqlx::query("UPDATE artists SET album_count = album_count + 1, updated_at = ? WHERE id = ?")
        .bind(now_text())
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

// ============================================================================
// Albums
// ============================================================================

/// Fields for a newly created album.
#[derive(Debug, Clone)]
pub struct NewAlbum<'a> {
    pub key: &'a str,
    pub title: &'a str,
    pub primary_artist: &'a str,
    pub artists: &'a [String],
    pub artist_ids: &'a [i64],
    pub year: Option<i32>,
    pub cover_image: Option<&'a [u8]>,
}

/// Look up an album id by (canonical key, primary artist).
pub async fn album_id_by_key(
    conn: &mut SqliteConnection,
    key: &str,
    primary_artist: &str,
) -> sqlx::Result<Option<i64>> {
    sqlx::query_scalar("SELECT id FROM albums WHERE canonical_key = ? AND primary_artist = ?")
        .bind(key)
        .bind(primary_artist)
        .fetch_optional(conn)
        .await
}

/// Return the album for `(key, primary_artist)`, creating it if absent.
///
/// The boolean is true when this call created the row.
pub async fn get_or_create_album(
    conn: &mut SqliteConnection,
    album: &NewAlbum<'_>,
) -> sqlx::Result<(i64, bool)> {
    let now = now_text();
    let inserted = sqlx::query(
        r#"
        INSERT INTO albums (
            canonical_key, title, primary_artist, artists, artist_ids,
            year, cover_image, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(canonical_key, primary_artist) DO NOTHING
        "#,
    )
    .bind(album.key)
    .bind(album.title)
    .bind(album.primary_artist)
    .bind(to_json_list(album.artists))
    .bind(to_json_list(album.artist_ids))
    .bind(album.year)
    .bind(album.cover_image)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await?
    .rows_affected()
        > 0;

    let id = album_id_by_key(conn, album.key, album.primary_artist)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;
    Ok((id, inserted))
}

/// Add one to an album's track count.
pub async fn increment_album_tracks(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<()> {
    sqlx::query("UPDATE albums SET track_count = track_count + 1, updated_at = ? WHERE id = ?")
        .bind(now_text())
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Fill a missing year or cover from a track. Existing values are kept.
pub async fn fill_album_gaps(
    conn: &mut SqliteConnection,
    id: i64,
    year: Option<i32>,
    cover_image: Option<&[u8]>,
) -> sqlx::Result<()> {
    if year.is_none() && cover_image.is_none() {
        return Ok(());
    }
    sqlx::query(
        "UPDATE albums SET year = COALESCE(year, ?), cover_image = COALESCE(cover_image, ?) \
         WHERE id = ? AND ((year IS NULL AND ? IS NOT NULL) OR (cover_image IS NULL AND ? IS NOT NULL))",
    )
    .bind(year)
    .bind(cover_image)
    .bind(id)
    .bind(year)
    .bind(cover_image)
    .execute(conn)
    .await?;
    Ok(())
}

// ============================================================================
// Reads and repair
// ============================================================================

/// Get an artist by id.
pub async fn get_artist(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<Artist>> {
    let row = sqlx::query_as::<_, ArtistRow>("SELECT * FROM artists WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(Artist::from))
}

/// Get an artist by canonical key.
pub async fn get_artist_by_key(pool: &SqlitePool, key: &str) -> sqlx::Result<Option<Artist>> {
    let row = sqlx::query_as::<_, ArtistRow>("SELECT * FROM artists WHERE canonical_key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(Artist::from))
}

/// Get an album by id.
pub async fn get_album(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<Album>> {
    let row = sqlx::query_as::<_, AlbumRow>("SELECT * FROM albums WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(Album::from))
}

/// Rows touched by [`recount`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecountSummary {
    pub artists: u64,
    pub albums: u64,
}

/// Recompute every artist and album count from the current track and album
/// rows, in one transaction. Only rows whose counts were wrong are touched.
pub async fn recount(pool: &SqlitePool) -> sqlx::Result<RecountSummary> {
    let mut tx = pool.begin().await?;
    let now = now_text();

    let artists = sqlx::query(
        r#"
        WITH counted AS (
            SELECT a.id AS id,
                (SELECT COUNT(*) FROM tracks t, json_each(t.artist_ids) j
                    WHERE j.value = a.id) AS tracks,
                (SELECT COUNT(*) FROM albums al, json_each(al.artist_ids) j
                    WHERE j.value = a.id) AS albums
            FROM artists a
        )
        UPDATE artists SET
            track_count = (SELECT tracks FROM counted WHERE counted.id = artists.id),
            album_count = (SELECT albums FROM counted WHERE counted.id = artists.id),
            updated_at = ?
        WHERE id IN (
            SELECT counted.id FROM counted JOIN artists x ON x.id = counted.id
            WHERE x.track_count != counted.tracks OR x.album_count != counted.albums
        )
        "#,
    )
    .bind(&now)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let albums = sqlx::query(
        r#"
        UPDATE albums SET
            track_count = (SELECT COUNT(*) FROM tracks WHERE tracks.album_id = albums.id),
            updated_at = ?
        WHERE track_count != (SELECT COUNT(*) FROM tracks WHERE tracks.album_id = albums.id)
        "#,
    )
    .bind(&now)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    tx.commit().await?;
    Ok(RecountSummary { artists, albums })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::temp_db;

    #[tokio::test]
    async fn test_artist_creation_is_idempotent() {
        let (pool, _dir) = temp_db().await;
        let mut conn = pool.acquire().await.unwrap();

        let (id1, created1) = get_or_create_artist(&mut conn, "eagles", "Eagles").await.unwrap();
        let (id2, created2) = get_or_create_artist(&mut conn, "eagles", "EAGLES").await.unwrap();
        assert_eq!(id1, id2);
        assert!(created1);
        assert!(!created2);

        let (id3, _) = get_or_create_artist(&mut conn, "queen", "Queen").await.unwrap();
        assert_ne!(id1, id3);

        let artist = get_artist(&pool, id1).await.unwrap().unwrap();
        // First-seen display form wins
        assert_eq!(artist.name, "Eagles");
        assert_eq!(artist.track_count, 0);
    }

    #[tokio::test]
    async fn test_album_unique_per_primary_artist() {
        let (pool, _dir) = temp_db().await;
        let mut conn = pool.acquire().await.unwrap();
        let artists = vec!["A".to_string()];
        let album = NewAlbum {
            key: "greatesthits",
            title: "Greatest Hits",
            primary_artist: "A",
            artists: &artists,
            artist_ids: &[1],
            year: None,
            cover_image: None,
        };

        let (id1, created) = get_or_create_album(&mut conn, &album).await.unwrap();
        assert!(created);
        let (id2, created) = get_or_create_album(&mut conn, &album).await.unwrap();
        assert!(!created);
        assert_eq!(id1, id2);

        let other = NewAlbum {
            primary_artist: "B",
            ..album.clone()
        };
        let (id3, _) = get_or_create_album(&mut conn, &other).await.unwrap();
        assert_ne!(id1, id3);
    }

    #[tokio::test]
    async fn test_fill_album_gaps_never_overwrites() {
        let (pool, _dir) = temp_db().await;
        let mut conn = pool.acquire().await.unwrap();
        let album = NewAlbum {
            key: "x",
            title: "X",
            primary_artist: "A",
            artists: &[],
            artist_ids: &[],
            year: None,
            cover_image: None,
        };
        let (id, _) = get_or_create_album(&mut conn, &album).await.unwrap();

        fill_album_gaps(&mut conn, id, Some(1999), Some(&[1u8, 2][..])).await.unwrap();
        fill_album_gaps(&mut conn, id, Some(2005), Some(&[9u8][..])).await.unwrap();
        drop(conn);

        let album = get_album(&pool, id).await.unwrap().unwrap();
        assert_eq!(album.year, Some(1999));
        assert_eq!(album.cover_image, Some(vec![1, 2]));
    }

    #[tokio::test]
    async fn test_increments() {
        let (pool, _dir) = temp_db().await;
        let mut conn = pool.acquire().await.unwrap();
        let (id, _) = get_or_create_artist(&mut conn, "a", "A").await.unwrap();
        increment_artist_tracks(&mut conn, id).await.unwrap();
        increment_artist_tracks(&mut conn, id).await.unwrap();
        increment_artist_albums(&mut conn, id).await.unwrap();
        drop(conn);

        let artist = get_artist_by_key(&pool, "a").await.unwrap().unwrap();
        assert_eq!(artist.track_count, 2);
        assert_eq!(artist.album_count, 1);
    }
}
