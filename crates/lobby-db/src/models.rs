/// Database row types — these map directly to SQLite rows.
/// Distinct from the lobby-types API models to keep the DB layer independent.

pub struct CategoryRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub created_at: String,
}

pub struct RoomRow {
    pub id: i64,
    pub name: String,
    pub owner_id: String,
    pub category_id: i64,
    pub description: Option<String>,
    pub created_at: String,
    /// Present only when the listing asked for the member-count annotation.
    pub num_members: Option<i64>,
}

pub struct ChannelRow {
    pub id: i64,
    pub name: String,
    pub owner_id: String,
    pub topic: String,
    pub room_id: i64,
    pub banner: Option<String>,
    pub icon: Option<String>,
    pub created_at: String,
}
