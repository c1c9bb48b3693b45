use axum::Json;
use serde::Serialize;
use serde_json::{Value, json};

/// Metadata for one query parameter of the room listing. Served as plain
/// JSON for external documentation tooling; nothing here renders a UI.
#[derive(Debug, Clone, Serialize)]
pub struct QueryParamDoc {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub description: &'static str,
}

pub const ROOM_LIST_PARAMS: [QueryParamDoc; 5] = [
    QueryParamDoc {
        name: "category",
        kind: "string",
        description: "Category of rooms to retrieve",
    },
    QueryParamDoc {
        name: "qty",
        kind: "integer",
        description: "Limits the number of rooms to retrieve",
    },
    QueryParamDoc {
        name: "by_user",
        kind: "boolean",
        description: "Filters the rooms based on the authenticated user",
    },
    QueryParamDoc {
        name: "by_roomId",
        kind: "integer",
        description: "Filters the rooms by a specific room id",
    },
    QueryParamDoc {
        name: "with_num_members",
        kind: "boolean",
        description: "Includes the number of members in each room",
    },
];

/// GET /api/docs/schema
pub async fn schema() -> Json<Value> {
    Json(json!({
        "endpoint": "/api/room/select",
        "method": "GET",
        "parameters": ROOM_LIST_PARAMS,
    }))
}
