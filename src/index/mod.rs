//! Canonical entity index.
//!
//! Resolves the raw artist and album strings of a scanned file to stable
//! [`Artist`](crate::model::Artist) and [`Album`](crate::model::Album) rows
//! and writes the track row, all inside one transaction per file.
//!
//! # Aggregates
//!
//! `track_count` on artists and albums moves only when the track row is
//! created, never when an already indexed path is re-indexed. An album's
//! artists get one `album_count` each when the album is created. Nothing
//! here decrements; [`EntityIndex::recount`] recomputes every count from the
//! current rows and is the only way a count goes down.
//!
//! Display variants that share a canonical key ("AC/DC", "ACDC", "ac dc")
//! resolve to the same artist; the first-seen spelling becomes its name.

use sqlx::sqlite::{SqliteConnection, SqlitePool};

use crate::db::entities::{self, NewAlbum, RecountSummary};
use crate::db::tracks::{self, TrackFields};
use crate::error::Result;
use crate::model::{ArtistIds, ArtistNames, UNKNOWN_ARTIST};
use crate::text::{canonical_key, normalize_artist, split_artists};

/// Outcome of indexing one file.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedTrack {
    pub id: i64,
    /// Whether this call created the track row
    pub created: bool,
    pub artists: ArtistNames,
    pub artist_ids: ArtistIds,
    pub album_id: Option<i64>,
}

/// Split a raw artist field into normalized, de-duplicated names.
///
/// Never empty: a blank field resolves to [`UNKNOWN_ARTIST`].
pub fn resolve_artist_names(raw: &str) -> ArtistNames {
    let mut names = ArtistNames::new();
    for part in split_artists(raw) {
        let name = normalize_artist(&part);
        if !name.is_empty() && !names.contains(&name) {
            names.push(name);
        }
    }
    if names.is_empty() {
        names.push(UNKNOWN_ARTIST.to_string());
    }
    names
}

/// Writes tracks together with the artists and albums they reference.
#[derive(Debug, Clone)]
pub struct EntityIndex {
    pool: SqlitePool,
}

impl EntityIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Index one file's fields.
    ///
    /// `fields.artists`, `fields.artist_ids` and `fields.album_id` are
    /// computed here and overwrite whatever the caller set.
    pub async fn index_track(&self, mut fields: TrackFields) -> Result<IndexedTrack> {
        let mut tx = self.pool.begin().await?;

        let existing = tracks::id_by_path(&mut *tx, &fields.path).await?;
        let created = existing.is_none();

        let (names, ids) = resolve_artists(&mut *tx, &fields.artist, created).await?;
        let album_id = resolve_album(&mut *tx, &fields, &names, &ids, created).await?;

        fields.artists = names.clone();
        fields.artist_ids = ids.clone();
        fields.album_id = album_id;

        let id = match existing {
            Some(id) => {
                tracks::update_track(&mut *tx, id, &fields).await?;
                id
            }
            None => tracks::insert_track(&mut *tx, &fields).await?,
        };

        tx.commit().await?;

        tracing::debug!(
            target: "index",
            path = %fields.path,
            id,
            created,
            artists = ?names,
            album_id,
            "Indexed track"
        );

        Ok(IndexedTrack {
            id,
            created,
            artists: names,
            artist_ids: ids,
            album_id,
        })
    }

    /// Recompute every artist and album count from current rows.
    pub async fn recount(&self) -> Result<RecountSummary> {
        let summary = entities::recount(&self.pool).await?;
        tracing::info!(
            target: "index",
            artists = summary.artists,
            albums = summary.albums,
            "Recounted aggregates"
        );
        Ok(summary)
    }
}

/// Resolve every name in the raw artist field to an artist id, in split
/// order. Names whose canonical key collides with an earlier name collapse
/// into that earlier entry.
async fn resolve_artists(
    conn: &mut SqliteConnection,
    raw: &str,
    new_track: bool,
) -> Result<(ArtistNames, ArtistIds)> {
    let mut names = ArtistNames::new();
    let mut ids = ArtistIds::new();

    for name in resolve_artist_names(raw) {
        let key = canonical_key(&name);
        let (id, created) = entities::get_or_create_artist(conn, &key, &name).await?;
        if created {
            tracing::debug!(target: "index", id, name = %name, "Created artist");
        }
        if ids.contains(&id) {
            continue;
        }
        if new_track {
            entities::increment_artist_tracks(conn, id).await?;
        }
        names.push(name);
        ids.push(id);
    }

    Ok((names, ids))
}

/// Resolve the album tag to an album id. Tracks without an album tag have
/// no album.
async fn resolve_album(
    conn: &mut SqliteConnection,
    fields: &TrackFields,
    names: &ArtistNames,
    ids: &ArtistIds,
    new_track: bool,
) -> Result<Option<i64>> {
    let Some(title) = fields
        .album
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
    else {
        return Ok(None);
    };
    let primary_artist = names.first().map_or(UNKNOWN_ARTIST, String::as_str);
    let key = canonical_key(title);

    let album = NewAlbum {
        key: &key,
        title,
        primary_artist,
        artists: names.as_slice(),
        artist_ids: ids.as_slice(),
        year: fields.year,
        cover_image: fields.cover_image.as_deref(),
    };
    let (album_id, created) = entities::get_or_create_album(conn, &album).await?;

    if created {
        tracing::debug!(target: "index", album_id, title, primary_artist, "Created album");
        for artist_id in ids {
            entities::increment_artist_albums(conn, *artist_id).await?;
        }
    } else {
        entities::fill_album_gaps(conn, album_id, fields.year, fields.cover_image.as_deref())
            .await?;
    }

    if new_track {
        entities::increment_album_tracks(conn, album_id).await?;
    }

    Ok(Some(album_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::entities::{get_album, get_artist, get_artist_by_key};
    use crate::test_utils::{sample_fields, temp_db};

    #[test]
    fn test_resolve_artist_names() {
        assert_eq!(
            resolve_artist_names("A/B&C").to_vec(),
            vec!["A".to_string(), "B".to_string(), "C".to_string()]
        );
        assert_eq!(
            resolve_artist_names("  ").to_vec(),
            vec![UNKNOWN_ARTIST.to_string()]
        );
        assert_eq!(resolve_artist_names("Tom feat. Jerry").len(), 2);
    }

    #[tokio::test]
    async fn test_reindex_does_not_bump_counts() {
        let (pool, _dir) = temp_db().await;
        let index = EntityIndex::new(pool.clone());

        let mut fields = sample_fields("/m/hotel.mp3", "Hotel California", "Eagles");
        fields.album = Some("Hotel California".to_string());

        let first = index.index_track(fields.clone()).await.unwrap();
        assert!(first.created);
        let second = index.index_track(fields).await.unwrap();
        assert!(!second.created);
        assert_eq!(first.id, second.id);

        let artist = get_artist_by_key(&pool, "eagles").await.unwrap().unwrap();
        assert_eq!(artist.track_count, 1);
        assert_eq!(artist.album_count, 1);

        let album = get_album(&pool, first.album_id.unwrap()).await.unwrap().unwrap();
        assert_eq!(album.track_count, 1);
        assert_eq!(album.primary_artist, "Eagles");
    }

    #[tokio::test]
    async fn test_multi_artist_track_links_every_artist() {
        let (pool, _dir) = temp_db().await;
        let index = EntityIndex::new(pool.clone());

        let mut fields = sample_fields("/m/duet.mp3", "Duet", "Alice & Bob");
        fields.album = Some("Together".to_string());
        let indexed = index.index_track(fields).await.unwrap();

        assert_eq!(indexed.artists.to_vec(), vec!["Alice", "Bob"]);
        assert_eq!(indexed.artist_ids.len(), 2);
        for id in &indexed.artist_ids {
            let artist = get_artist(&pool, *id).await.unwrap().unwrap();
            assert_eq!(artist.track_count, 1);
            assert_eq!(artist.album_count, 1);
        }
    }

    #[tokio::test]
    async fn test_canonical_key_variants_merge() {
        let (pool, _dir) = temp_db().await;
        let index = EntityIndex::new(pool.clone());

        let a = index
            .index_track(sample_fields("/m/1.mp3", "One", "Guns N' Roses"))
            .await
            .unwrap();
        let b = index
            .index_track(sample_fields("/m/2.mp3", "Two", "guns n roses"))
            .await
            .unwrap();
        assert_eq!(a.artist_ids, b.artist_ids);

        let artist = get_artist(&pool, a.artist_ids[0]).await.unwrap().unwrap();
        assert_eq!(artist.name, "Guns N' Roses");
        assert_eq!(artist.track_count, 2);
    }

    #[tokio::test]
    async fn test_same_album_title_different_primary_artist() {
        let (pool, _dir) = temp_db().await;
        let index = EntityIndex::new(pool.clone());

        let mut one = sample_fields("/m/1.mp3", "One", "A");
        one.album = Some("Greatest Hits".to_string());
        let mut two = sample_fields("/m/2.mp3", "Two", "B");
        two.album = Some("Greatest Hits".to_string());

        let one = index.index_track(one).await.unwrap();
        let two = index.index_track(two).await.unwrap();
        assert_ne!(one.album_id, two.album_id);
    }

    #[tokio::test]
    async fn test_track_without_album() {
        let (pool, _dir) = temp_db().await;
        let index = EntityIndex::new(pool);
        let indexed = index
            .index_track(sample_fields("/m/single.mp3", "Single", "A"))
            .await
            .unwrap();
        assert_eq!(indexed.album_id, None);
    }

    #[tokio::test]
    async fn test_recount_repairs_after_removal() {
        let (pool, _dir) = temp_db().await;
        let index = EntityIndex::new(pool.clone());

        let mut fields = sample_fields("/m/a.mp3", "A", "Band");
        fields.album = Some("Record".to_string());
        index.index_track(fields.clone()).await.unwrap();
        fields.path = "/m/b.mp3".to_string();
        index.index_track(fields).await.unwrap();

        tracks::delete_track_by_path(&pool, "/m/a.mp3").await.unwrap();
        let artist = get_artist_by_key(&pool, "band").await.unwrap().unwrap();
        assert_eq!(artist.track_count, 2);

        let summary = index.recount().await.unwrap();
        assert_eq!(summary.artists, 1);
        assert_eq!(summary.albums, 1);

        let artist = get_artist_by_key(&pool, "band").await.unwrap().unwrap();
        assert_eq!(artist.track_count, 1);
        assert_eq!(artist.album_count, 1);

        // Counts already correct: nothing to touch
        assert_eq!(index.recount().await.unwrap(), RecountSummary::default());
    }
}
