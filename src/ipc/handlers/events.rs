use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, now_ts, opt_str, required_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::params;
use serde_json::json;
use uuid::Uuid;

const EVENTS_LIST_MAX: i64 = 1000;

fn handle_append(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let event_type = match required_str(req, "eventType") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let actor = opt_str(&req.params, "actor");
    let page_id = opt_str(&req.params, "pageId");
    let block_id = opt_str(&req.params, "blockId");
    let payload = req.params.get("payload").cloned().unwrap_or(json!({}));
    let payload_json = match serde_json::to_string(&payload) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };

    let event_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO learning_events(id, event_type, actor, page_id, block_id, payload_json, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        params![event_id, event_type, actor, page_id, block_id, payload_json, now_ts()],
    ) {
        return err(&req.id, "db_write_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "eventId": event_id }))
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let page_id = opt_str(&req.params, "pageId");

    let sql = if page_id.is_some() {
        "SELECT id, event_type, actor, page_id, block_id, payload_json, created_at
         FROM learning_events WHERE page_id = ?
         ORDER BY created_at DESC, id LIMIT ?"
    } else {
        "SELECT id, event_type, actor, page_id, block_id, payload_json, created_at
         FROM learning_events
         ORDER BY created_at DESC, id LIMIT ?"
    };
    let mut stmt = match conn.prepare(sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let map_row = |r: &rusqlite::Row<'_>| -> rusqlite::Result<serde_json::Value> {
        let payload_raw: String = r.get(5)?;
        Ok(json!({
            "id": r.get::<_, String>(0)?,
            "eventType": r.get::<_, String>(1)?,
            "actor": r.get::<_, Option<String>>(2)?,
            "pageId": r.get::<_, Option<String>>(3)?,
            "blockId": r.get::<_, Option<String>>(4)?,
            "payload": serde_json::from_str::<serde_json::Value>(&payload_raw)
                .unwrap_or(serde_json::Value::Null),
            "createdAt": r.get::<_, String>(6)?,
        }))
    };
    let result = match &page_id {
        Some(pid) => stmt
            .query_map(params![pid, EVENTS_LIST_MAX], map_row)
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>()),
        None => stmt
            .query_map(params![EVENTS_LIST_MAX], map_row)
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>()),
    };
    match result {
        Ok(events) => ok(&req.id, json!({ "events": events })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        // Append-only log: there is deliberately no update or delete method.
        "events.append" => Some(handle_append(state, req)),
        "events.list" => Some(handle_list(state, req)),
        _ => None,
    }
}
