use rusqlite::types::Value;

/// Conditional filter pipeline for the room listing.
///
/// Each setter corresponds to one optional query parameter; `sql()` renders
/// the steps in a fixed order (category, membership, member-count annotation,
/// room id) so the final result sequence is deterministic. Quantity
/// truncation is applied by the caller after the not-found check, not here.
#[derive(Debug, Default, Clone)]
pub struct RoomFilter {
    category_name: Option<String>,
    member_id: Option<String>,
    with_member_count: bool,
    room_id: Option<i64>,
}

impl RoomFilter {
    pub fn category(mut self, name: Option<String>) -> Self {
        self.category_name = name;
        self
    }

    /// Restrict to rooms the given user is a member of.
    pub fn member(mut self, user_id: Option<String>) -> Self {
        self.member_id = user_id;
        self
    }

    /// Annotate each row with the current count of its membership relation.
    pub fn with_member_count(mut self, enabled: bool) -> Self {
        self.with_member_count = enabled;
        self
    }

    pub fn room_id(mut self, id: Option<i64>) -> Self {
        self.room_id = id;
        self
    }

    pub fn counts_members(&self) -> bool {
        self.with_member_count
    }

    /// Render the filter into a SQL statement plus its bound parameters.
    pub fn sql(&self) -> (String, Vec<Value>) {
        let mut sql = String::from(
            "SELECT r.id, r.name, r.owner_id, r.category_id, r.description, r.created_at",
        );
        if self.with_member_count {
            sql.push_str(
                ", (SELECT COUNT(*) FROM room_members m WHERE m.room_id = r.id) AS num_members",
            );
        }
        sql.push_str(" FROM rooms r");

        let mut clauses: Vec<&str> = Vec::new();
        let mut params: Vec<Value> = Vec::new();

        if let Some(name) = &self.category_name {
            clauses.push("r.category_id IN (SELECT c.id FROM categories c WHERE c.name = ?)");
            params.push(Value::Text(name.clone()));
        }
        if let Some(user_id) = &self.member_id {
            clauses.push(
                "EXISTS (SELECT 1 FROM room_members m WHERE m.room_id = r.id AND m.user_id = ?)",
            );
            params.push(Value::Text(user_id.clone()));
        }
        if let Some(id) = self.room_id {
            clauses.push("r.id = ?");
            params.push(Value::Integer(id));
        }

        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        // Stable ordering keeps truncation deterministic.
        sql.push_str(" ORDER BY r.id");

        (sql, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_filter_selects_everything() {
        let (sql, params) = RoomFilter::default().sql();
        assert_eq!(
            sql,
            "SELECT r.id, r.name, r.owner_id, r.category_id, r.description, r.created_at \
             FROM rooms r ORDER BY r.id"
        );
        assert!(params.is_empty());
    }

    #[test]
    fn category_filter_binds_name() {
        let (sql, params) = RoomFilter::default()
            .category(Some("general".to_string()))
            .sql();
        assert!(sql.contains("WHERE r.category_id IN"));
        assert_eq!(params, vec![Value::Text("general".to_string())]);
    }

    #[test]
    fn member_count_adds_annotation_column() {
        let (sql, _) = RoomFilter::default().with_member_count(true).sql();
        assert!(sql.contains("AS num_members"));

        let (sql, _) = RoomFilter::default().sql();
        assert!(!sql.contains("num_members"));
    }

    #[test]
    fn combined_filters_keep_pipeline_order() {
        let (sql, params) = RoomFilter::default()
            .category(Some("general".to_string()))
            .member(Some("user-1".to_string()))
            .with_member_count(true)
            .room_id(Some(7))
            .sql();

        let category_pos = sql.find("r.category_id IN").unwrap();
        let member_pos = sql.find("m.user_id = ?").unwrap();
        let id_pos = sql.find("r.id = ?").unwrap();
        assert!(category_pos < member_pos && member_pos < id_pos);

        assert_eq!(
            params,
            vec![
                Value::Text("general".to_string()),
                Value::Text("user-1".to_string()),
                Value::Integer(7),
            ]
        );
    }
}
