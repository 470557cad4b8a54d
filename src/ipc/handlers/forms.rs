use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, now_ts, opt_str, required_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

struct HandlerErr {
    code: &'static str,
    message: String,
    details: Option<serde_json::Value>,
}

impl HandlerErr {
    fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }

    fn db(e: impl ToString) -> HandlerErr {
        HandlerErr {
            code: "db_query_failed",
            message: e.to_string(),
            details: None,
        }
    }
}

fn schema_exists(conn: &Connection, schema_id: &str) -> Result<bool, HandlerErr> {
    conn.query_row(
        "SELECT 1 FROM form_schemas WHERE id = ? LIMIT 1",
        [schema_id],
        |_r| Ok(()),
    )
    .optional()
    .map(|v| v.is_some())
    .map_err(HandlerErr::db)
}

fn handle_schemas_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(schema) = req.params.get("schema") else {
        return err(&req.id, "bad_params", "missing params.schema", None);
    };
    if !schema.is_object() && !schema.is_array() {
        return err(&req.id, "bad_params", "schema must be a JSON object or array", None);
    }
    let schema_json = match serde_json::to_string(schema) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };

    let schema_id = Uuid::new_v4().to_string();
    let ts = now_ts();
    if let Err(e) = conn.execute(
        "INSERT INTO form_schemas(id, name, schema_json, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?)",
        params![schema_id, name, schema_json, ts, ts],
    ) {
        return err(&req.id, "db_write_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "schemaId": schema_id }))
}

fn handle_schemas_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let mut stmt = match conn.prepare(
        "SELECT id, name, schema_json, created_at, updated_at
         FROM form_schemas ORDER BY name, id",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let schemas = match stmt.query_map([], |r| {
        let schema_raw: String = r.get(2)?;
        Ok(json!({
            "id": r.get::<_, String>(0)?,
            "name": r.get::<_, String>(1)?,
            "schema": serde_json::from_str::<serde_json::Value>(&schema_raw)
                .unwrap_or(serde_json::Value::Null),
            "createdAt": r.get::<_, String>(3)?,
            "updatedAt": r.get::<_, String>(4)?,
        }))
    }) {
        Ok(rows) => match rows.collect::<Result<Vec<_>, _>>() {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(&req.id, json!({ "schemas": schemas }))
}

fn handle_schemas_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let schema_id = match required_str(req, "schemaId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing params.patch object", None);
    };
    match schema_exists(conn, &schema_id) {
        Ok(true) => {}
        Ok(false) => return err(&req.id, "not_found", "form schema not found", None),
        Err(e) => return e.response(&req.id),
    }

    let mut sets: Vec<&'static str> = Vec::new();
    let mut binds: Vec<String> = Vec::new();
    if let Some(name) = patch.get("name") {
        let Some(n) = name.as_str().map(str::trim).filter(|s| !s.is_empty()) else {
            return err(&req.id, "bad_params", "name must be a non-empty string", None);
        };
        sets.push("name = ?");
        binds.push(n.to_string());
    }
    if let Some(schema) = patch.get("schema") {
        if !schema.is_object() && !schema.is_array() {
            return err(&req.id, "bad_params", "schema must be a JSON object or array", None);
        }
        match serde_json::to_string(schema) {
            Ok(s) => {
                sets.push("schema_json = ?");
                binds.push(s);
            }
            Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
        }
    }
    if sets.is_empty() {
        return err(&req.id, "bad_params", "patch has no recognized fields", None);
    }

    sets.push("updated_at = ?");
    binds.push(now_ts());
    binds.push(schema_id.clone());
    let sql = format!("UPDATE form_schemas SET {} WHERE id = ?", sets.join(", "));
    if let Err(e) = conn.execute(&sql, rusqlite::params_from_iter(binds.iter())) {
        return err(&req.id, "db_write_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "schemaId": schema_id }))
}

fn handle_schemas_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let schema_id = match required_str(req, "schemaId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let assignment_count: i64 = match conn.query_row(
        "SELECT COUNT(*) FROM form_assignments WHERE form_schema_id = ?",
        [&schema_id],
        |r| r.get(0),
    ) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if assignment_count > 0 {
        return err(
            &req.id,
            "bad_params",
            "schema is still assigned to pages; remove the assignments first",
            Some(json!({ "assignmentCount": assignment_count })),
        );
    }
    match conn.execute("DELETE FROM form_schemas WHERE id = ?", [&schema_id]) {
        Ok(0) => err(&req.id, "not_found", "form schema not found", None),
        Ok(_) => ok(&req.id, json!({ "schemaId": schema_id })),
        Err(e) => err(&req.id, "db_write_failed", e.to_string(), None),
    }
}

fn handle_assignments_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let schema_id = match required_str(req, "schemaId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let page_id = match required_str(req, "pageId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let block_id = opt_str(&req.params, "blockId");
    match schema_exists(conn, &schema_id) {
        Ok(true) => {}
        Ok(false) => return err(&req.id, "not_found", "form schema not found", None),
        Err(e) => return e.response(&req.id),
    }
    match super::pages::page_exists(conn, &page_id) {
        Ok(true) => {}
        Ok(false) => return err(&req.id, "not_found", "page not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    // One assignment per (schema, page); repeated set replaces the block
    // reference.
    let assignment_id = Uuid::new_v4().to_string();
    let ts = now_ts();
    if let Err(e) = conn.execute(
        "INSERT INTO form_assignments(id, form_schema_id, page_id, block_id, created_at)
         VALUES(?, ?, ?, ?, ?)
         ON CONFLICT(form_schema_id, page_id) DO UPDATE SET block_id = excluded.block_id",
        params![assignment_id, schema_id, page_id, block_id, ts],
    ) {
        return err(&req.id, "db_write_failed", e.to_string(), None);
    }
    let stored_id: String = match conn.query_row(
        "SELECT id FROM form_assignments WHERE form_schema_id = ? AND page_id = ?",
        params![schema_id, page_id],
        |r| r.get(0),
    ) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(&req.id, json!({ "assignmentId": stored_id }))
}

fn handle_assignments_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let page_id = opt_str(&req.params, "pageId");

    let sql = if page_id.is_some() {
        "SELECT a.id, a.form_schema_id, s.name, a.page_id, a.block_id, a.created_at
         FROM form_assignments a
         JOIN form_schemas s ON s.id = a.form_schema_id
         WHERE a.page_id = ?
         ORDER BY s.name, a.id"
    } else {
        "SELECT a.id, a.form_schema_id, s.name, a.page_id, a.block_id, a.created_at
         FROM form_assignments a
         JOIN form_schemas s ON s.id = a.form_schema_id
         ORDER BY s.name, a.id"
    };
    let mut stmt = match conn.prepare(sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let map_row = |r: &rusqlite::Row<'_>| -> rusqlite::Result<serde_json::Value> {
        Ok(json!({
            "id": r.get::<_, String>(0)?,
            "schemaId": r.get::<_, String>(1)?,
            "schemaName": r.get::<_, String>(2)?,
            "pageId": r.get::<_, String>(3)?,
            "blockId": r.get::<_, Option<String>>(4)?,
            "createdAt": r.get::<_, String>(5)?,
        }))
    };
    let result = match &page_id {
        Some(pid) => stmt
            .query_map([pid], map_row)
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>()),
        None => stmt
            .query_map([], map_row)
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>()),
    };
    match result {
        Ok(assignments) => ok(&req.id, json!({ "assignments": assignments })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_assignments_remove(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let assignment_id = match required_str(req, "assignmentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match conn.execute("DELETE FROM form_assignments WHERE id = ?", [&assignment_id]) {
        Ok(0) => err(&req.id, "not_found", "assignment not found", None),
        Ok(_) => ok(&req.id, json!({ "assignmentId": assignment_id })),
        Err(e) => err(&req.id, "db_write_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "forms.schemas.create" => Some(handle_schemas_create(state, req)),
        "forms.schemas.list" => Some(handle_schemas_list(state, req)),
        "forms.schemas.update" => Some(handle_schemas_update(state, req)),
        "forms.schemas.delete" => Some(handle_schemas_delete(state, req)),
        "forms.assignments.set" => Some(handle_assignments_set(state, req)),
        "forms.assignments.list" => Some(handle_assignments_list(state, req)),
        "forms.assignments.remove" => Some(handle_assignments_remove(state, req)),
        _ => None,
    }
}
