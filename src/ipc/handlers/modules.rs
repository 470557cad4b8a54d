use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, now_ts, opt_str, parse_bool, required_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

pub const STATUS_DRAFT: &str = "draft";
pub const STATUS_PUBLISHED: &str = "published";
pub const STATUS_ARCHIVED: &str = "archived";

pub fn validate_status(status: &str) -> bool {
    matches!(status, STATUS_DRAFT | STATUS_PUBLISHED | STATUS_ARCHIVED)
}

pub fn module_exists(conn: &Connection, module_id: &str) -> Result<bool, rusqlite::Error> {
    conn.query_row(
        "SELECT 1 FROM modules WHERE id = ? LIMIT 1",
        [module_id],
        |_r| Ok(()),
    )
    .optional()
    .map(|v| v.is_some())
}

fn module_row_json(r: &rusqlite::Row<'_>) -> rusqlite::Result<serde_json::Value> {
    Ok(json!({
        "id": r.get::<_, String>(0)?,
        "title": r.get::<_, String>(1)?,
        "description": r.get::<_, String>(2)?,
        "status": r.get::<_, String>(3)?,
        "sortOrder": r.get::<_, i64>(4)?,
        "createdAt": r.get::<_, String>(5)?,
        "updatedAt": r.get::<_, String>(6)?,
    }))
}

const MODULE_COLUMNS: &str =
    "id, title, description, status, sort_order, created_at, updated_at";

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let include_archived = match parse_bool(req.params.get("includeArchived"), false) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("includeArchived {}", m), None),
    };

    let sql = if include_archived {
        format!(
            "SELECT {} FROM modules ORDER BY sort_order, id",
            MODULE_COLUMNS
        )
    } else {
        format!(
            "SELECT {} FROM modules WHERE status != 'archived' ORDER BY sort_order, id",
            MODULE_COLUMNS
        )
    };
    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let modules = match stmt.query_map([], module_row_json) {
        Ok(rows) => match rows.collect::<Result<Vec<_>, _>>() {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(&req.id, json!({ "modules": modules }))
}

fn handle_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let module_id = match required_str(req, "moduleId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let sql = format!("SELECT {} FROM modules WHERE id = ?", MODULE_COLUMNS);
    let row = conn
        .query_row(&sql, [&module_id], module_row_json)
        .optional();
    match row {
        Ok(Some(module)) => ok(&req.id, json!({ "module": module })),
        Ok(None) => err(&req.id, "not_found", "module not found", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    // Empty title blocks the action locally; nothing is written.
    let title = match required_str(req, "title") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let description = opt_str(&req.params, "description").unwrap_or_default();
    let status = opt_str(&req.params, "status").unwrap_or_else(|| STATUS_DRAFT.to_string());
    if !validate_status(&status) {
        return err(
            &req.id,
            "bad_params",
            "status must be one of: draft, published, archived",
            None,
        );
    }

    let sort_order: i64 = match conn.query_row(
        "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM modules",
        [],
        |r| r.get(0),
    ) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let module_id = Uuid::new_v4().to_string();
    let ts = now_ts();
    if let Err(e) = conn.execute(
        "INSERT INTO modules(id, title, description, status, sort_order, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        params![module_id, title, description, status, sort_order, ts, ts],
    ) {
        return err(&req.id, "db_write_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "moduleId": module_id, "sortOrder": sort_order }))
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let module_id = match required_str(req, "moduleId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing params.patch object", None);
    };

    match module_exists(conn, &module_id) {
        Ok(true) => {}
        Ok(false) => return err(&req.id, "not_found", "module not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    let mut sets: Vec<&'static str> = Vec::new();
    let mut binds: Vec<String> = Vec::new();
    if let Some(title) = patch.get("title") {
        let Some(t) = title.as_str().map(str::trim).filter(|s| !s.is_empty()) else {
            return err(&req.id, "bad_params", "title must be a non-empty string", None);
        };
        sets.push("title = ?");
        binds.push(t.to_string());
    }
    if let Some(description) = patch.get("description") {
        let Some(d) = description.as_str() else {
            return err(&req.id, "bad_params", "description must be a string", None);
        };
        sets.push("description = ?");
        binds.push(d.to_string());
    }
    if let Some(status) = patch.get("status") {
        let Some(s) = status.as_str().filter(|s| validate_status(s)) else {
            return err(
                &req.id,
                "bad_params",
                "status must be one of: draft, published, archived",
                None,
            );
        };
        sets.push("status = ?");
        binds.push(s.to_string());
    }
    if sets.is_empty() {
        return err(&req.id, "bad_params", "patch has no recognized fields", None);
    }

    sets.push("updated_at = ?");
    binds.push(now_ts());
    binds.push(module_id.clone());
    let sql = format!("UPDATE modules SET {} WHERE id = ?", sets.join(", "));
    if let Err(e) = conn.execute(&sql, rusqlite::params_from_iter(binds.iter())) {
        return err(&req.id, "db_write_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "moduleId": module_id }))
}

fn handle_reorder(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let Some(ids) = req.params.get("moduleIds").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "missing moduleIds", None);
    };
    let mut provided: Vec<String> = Vec::new();
    for v in ids {
        let Some(s) = v.as_str().map(str::trim).filter(|s| !s.is_empty()) else {
            return err(&req.id, "bad_params", "moduleIds must be non-empty strings", None);
        };
        if !provided.iter().any(|existing| existing == s) {
            provided.push(s.to_string());
        }
    }

    let mut stmt = match conn.prepare("SELECT id FROM modules ORDER BY sort_order, id") {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let existing = match stmt.query_map([], |r| r.get::<_, String>(0)) {
        Ok(rows) => match rows.collect::<Result<Vec<_>, _>>() {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    for id in &provided {
        if !existing.contains(id) {
            return err(
                &req.id,
                "bad_params",
                format!("module id not found: {}", id),
                None,
            );
        }
    }

    // Any modules not named keep their relative order after the named ones.
    let mut final_order = provided;
    for id in existing {
        if !final_order.contains(&id) {
            final_order.push(id);
        }
    }

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };
    let ts = now_ts();
    for (idx, id) in final_order.iter().enumerate() {
        if let Err(e) = tx.execute(
            "UPDATE modules SET sort_order = ?, updated_at = ? WHERE id = ?",
            params![idx as i64, ts, id],
        ) {
            let _ = tx.rollback();
            return err(&req.id, "db_write_failed", e.to_string(), None);
        }
    }
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_tx_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "moduleIds": final_order }))
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let module_id = match required_str(req, "moduleId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let page_count: i64 = match conn.query_row(
        "SELECT COUNT(*) FROM pages WHERE module_id = ?",
        [&module_id],
        |r| r.get(0),
    ) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if page_count > 0 {
        return err(
            &req.id,
            "bad_params",
            "module still has pages; move or delete them first",
            Some(json!({ "pageCount": page_count })),
        );
    }

    match conn.execute("DELETE FROM modules WHERE id = ?", [&module_id]) {
        Ok(0) => err(&req.id, "not_found", "module not found", None),
        Ok(_) => ok(&req.id, json!({ "moduleId": module_id })),
        Err(e) => err(&req.id, "db_write_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "modules.list" => Some(handle_list(state, req)),
        "modules.open" => Some(handle_open(state, req)),
        "modules.create" => Some(handle_create(state, req)),
        "modules.update" => Some(handle_update(state, req)),
        "modules.reorder" => Some(handle_reorder(state, req)),
        "modules.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
