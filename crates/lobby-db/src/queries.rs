use crate::Database;
use crate::filter::RoomFilter;
use crate::models::{CategoryRow, ChannelRow, RoomRow};
use anyhow::Result;
use rusqlite::Connection;

impl Database {
    // -- Categories --

    pub fn create_category(&self, name: &str, description: Option<&str>) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO categories (name, description) VALUES (?1, ?2)",
                (name, description),
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_category(&self, id: i64) -> Result<Option<CategoryRow>> {
        self.with_conn(|conn| query_category(conn, id))
    }

    /// Full-record save of a category. The icon column always takes the
    /// incoming value; comparing it against the stored one (and deleting the
    /// stale file) is the caller's job, before this commit.
    pub fn update_category(
        &self,
        id: i64,
        name: &str,
        description: Option<&str>,
        icon: Option<&str>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE categories SET name = ?1, description = ?2, icon = ?3 WHERE id = ?4",
                (name, description, icon, id),
            )?;
            Ok(n > 0)
        })
    }

    pub fn set_category_icon(&self, id: i64, icon: Option<&str>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("UPDATE categories SET icon = ?1 WHERE id = ?2", (icon, id))?;
            Ok(())
        })
    }

    pub fn delete_category(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM categories WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }

    /// Every stored media path the delete of this category is about to
    /// orphan: its own icon plus the icon/banner of each channel in each of
    /// its rooms (the rows themselves go away via SQL cascade).
    pub fn category_media_paths(&self, id: i64) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut paths = Vec::new();

            let icon: Option<Option<String>> = conn
                .query_row("SELECT icon FROM categories WHERE id = ?1", [id], |row| {
                    row.get(0)
                })
                .optional()?;
            if let Some(Some(icon)) = icon {
                paths.push(icon);
            }

            let mut stmt = conn.prepare(
                "SELECT ch.icon, ch.banner FROM channels ch
                 JOIN rooms r ON ch.room_id = r.id
                 WHERE r.category_id = ?1",
            )?;
            collect_channel_paths(&mut stmt, [id], &mut paths)?;

            Ok(paths)
        })
    }

    // -- Rooms --

    pub fn create_room(
        &self,
        name: &str,
        owner_id: &str,
        category_id: i64,
        description: Option<&str>,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO rooms (name, owner_id, category_id, description) VALUES (?1, ?2, ?3, ?4)",
                (name, owner_id, category_id, description),
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_room(&self, id: i64) -> Result<Option<RoomRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, owner_id, category_id, description, created_at
                 FROM rooms WHERE id = ?1",
            )?;
            let row = stmt
                .query_row([id], |row| {
                    Ok(RoomRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        owner_id: row.get(2)?,
                        category_id: row.get(3)?,
                        description: row.get(4)?,
                        created_at: row.get(5)?,
                        num_members: None,
                    })
                })
                .optional()?;
            Ok(row)
        })
    }

    pub fn update_room(
        &self,
        id: i64,
        name: &str,
        category_id: i64,
        description: Option<&str>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE rooms SET name = ?1, category_id = ?2, description = ?3 WHERE id = ?4",
                (name, category_id, description, id),
            )?;
            Ok(n > 0)
        })
    }

    pub fn delete_room(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM rooms WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }

    /// Media paths of every channel that cascades away with this room.
    pub fn room_media_paths(&self, room_id: i64) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut paths = Vec::new();
            let mut stmt =
                conn.prepare("SELECT icon, banner FROM channels WHERE room_id = ?1")?;
            collect_channel_paths(&mut stmt, [room_id], &mut paths)?;
            Ok(paths)
        })
    }

    // -- Membership --

    pub fn add_member(&self, room_id: i64, user_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO room_members (room_id, user_id) VALUES (?1, ?2)",
                (room_id, user_id),
            )?;
            Ok(())
        })
    }

    pub fn remove_member(&self, room_id: i64, user_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM room_members WHERE room_id = ?1 AND user_id = ?2",
                (room_id, user_id),
            )?;
            Ok(())
        })
    }

    // -- Channels --

    pub fn create_channel(
        &self,
        name: &str,
        owner_id: &str,
        topic: &str,
        room_id: i64,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO channels (name, owner_id, topic, room_id) VALUES (?1, ?2, ?3, ?4)",
                (name, owner_id, topic, room_id),
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_channel(&self, id: i64) -> Result<Option<ChannelRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, owner_id, topic, room_id, banner, icon, created_at
                 FROM channels WHERE id = ?1",
            )?;
            let row = stmt.query_row([id], map_channel_row).optional()?;
            Ok(row)
        })
    }

    /// Full-record save of a channel; both media columns take the incoming
    /// values, stale-file cleanup happens in the caller beforehand.
    pub fn update_channel(
        &self,
        id: i64,
        name: &str,
        topic: &str,
        room_id: i64,
        icon: Option<&str>,
        banner: Option<&str>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE channels SET name = ?1, topic = ?2, room_id = ?3, icon = ?4, banner = ?5
                 WHERE id = ?6",
                (name, topic, room_id, icon, banner, id),
            )?;
            Ok(n > 0)
        })
    }

    pub fn set_channel_media(
        &self,
        id: i64,
        icon: Option<&str>,
        banner: Option<&str>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE channels SET icon = ?1, banner = ?2 WHERE id = ?3",
                (icon, banner, id),
            )?;
            Ok(())
        })
    }

    pub fn delete_channel(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM channels WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }

    // -- Listing --

    pub fn list_rooms(&self, filter: &RoomFilter) -> Result<Vec<RoomRow>> {
        let with_count = filter.counts_members();
        self.with_conn(|conn| {
            let (sql, params) = filter.sql();
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params), |row| {
                    Ok(RoomRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        owner_id: row.get(2)?,
                        category_id: row.get(3)?,
                        description: row.get(4)?,
                        created_at: row.get(5)?,
                        num_members: if with_count { Some(row.get(6)?) } else { None },
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Batch-fetch the channels of a set of rooms in one query (avoids the
    /// N+1 a per-room lookup would cost during serialization).
    pub fn channels_for_rooms(&self, room_ids: &[i64]) -> Result<Vec<ChannelRow>> {
        if room_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=room_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT id, name, owner_id, topic, room_id, banner, icon, created_at
                 FROM channels WHERE room_id IN ({}) ORDER BY id",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = room_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(params.as_slice(), map_channel_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn map_channel_row(row: &rusqlite::Row<'_>) -> std::result::Result<ChannelRow, rusqlite::Error> {
    Ok(ChannelRow {
        id: row.get(0)?,
        name: row.get(1)?,
        owner_id: row.get(2)?,
        topic: row.get(3)?,
        room_id: row.get(4)?,
        banner: row.get(5)?,
        icon: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn query_category(conn: &Connection, id: i64) -> Result<Option<CategoryRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, description, icon, created_at FROM categories WHERE id = ?1",
    )?;

    let row = stmt
        .query_row([id], |row| {
            Ok(CategoryRow {
                id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
                icon: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn collect_channel_paths<P: rusqlite::Params>(
    stmt: &mut rusqlite::Statement<'_>,
    params: P,
    paths: &mut Vec<String>,
) -> Result<()> {
    let rows = stmt.query_map(params, |row| {
        Ok((
            row.get::<_, Option<String>>(0)?,
            row.get::<_, Option<String>>(1)?,
        ))
    })?;
    for row in rows {
        let (a, b) = row?;
        paths.extend(a);
        paths.extend(b);
    }
    Ok(())
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
