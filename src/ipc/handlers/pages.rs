use crate::editor::{Block, BlockContent, BlockLayout, BlockList, BlockMetadata, BlockStyle};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    block_list_json, db_conn, now_ts, opt_str, parse_bool, required_str,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

use super::modules::{module_exists, validate_status, STATUS_DRAFT};

const PAGE_COLUMNS: &str =
    "id, module_id, title, description, status, sort_order, created_at, updated_at";

fn page_row_json(r: &rusqlite::Row<'_>) -> rusqlite::Result<serde_json::Value> {
    Ok(json!({
        "id": r.get::<_, String>(0)?,
        "moduleId": r.get::<_, Option<String>>(1)?,
        "title": r.get::<_, String>(2)?,
        "description": r.get::<_, String>(3)?,
        "status": r.get::<_, String>(4)?,
        "sortOrder": r.get::<_, i64>(5)?,
        "createdAt": r.get::<_, String>(6)?,
        "updatedAt": r.get::<_, String>(7)?,
    }))
}

pub fn page_exists(conn: &Connection, page_id: &str) -> Result<bool, rusqlite::Error> {
    conn.query_row("SELECT 1 FROM pages WHERE id = ? LIMIT 1", [page_id], |_r| {
        Ok(())
    })
    .optional()
    .map(|v| v.is_some())
}

fn next_page_sort_order(conn: &Connection, module_id: Option<&str>) -> Result<i64, rusqlite::Error> {
    conn.query_row(
        "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM pages
         WHERE COALESCE(module_id, '') = COALESCE(?, '')",
        [module_id],
        |r| r.get(0),
    )
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
    let module_id = opt_str(&req.params, "moduleId");
    if let Some(ref mid) = module_id {
        match module_exists(conn, mid) {
            Ok(true) => {}
            Ok(false) => return err(&req.id, "not_found", "module not found", None),
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
    }
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

    let sort_order = match next_page_sort_order(conn, module_id.as_deref()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let page_id = Uuid::new_v4().to_string();
    let ts = now_ts();
    if let Err(e) = conn.execute(
        "INSERT INTO pages(id, module_id, title, description, status, sort_order, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        params![page_id, module_id, title, description, status, sort_order, ts, ts],
    ) {
        return err(&req.id, "db_write_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "pageId": page_id, "sortOrder": sort_order }))
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let module_id = opt_str(&req.params, "moduleId");
    let include_archived = match parse_bool(req.params.get("includeArchived"), false) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("includeArchived {}", m), None),
    };

    let mut clauses: Vec<&str> = Vec::new();
    if module_id.is_some() {
        clauses.push("module_id = ?");
    }
    if !include_archived {
        clauses.push("status != 'archived'");
    }
    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };
    let sql = format!(
        "SELECT {} FROM pages{} ORDER BY sort_order, id",
        PAGE_COLUMNS, where_sql
    );
    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let result = match &module_id {
        Some(mid) => stmt.query_map([mid], page_row_json).and_then(|rows| {
            rows.collect::<Result<Vec<_>, _>>()
        }),
        None => stmt.query_map([], page_row_json).and_then(|rows| {
            rows.collect::<Result<Vec<_>, _>>()
        }),
    };
    match result {
        Ok(pages) => ok(&req.id, json!({ "pages": pages })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let page_id = match required_str(req, "pageId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let sql = format!("SELECT {} FROM pages WHERE id = ?", PAGE_COLUMNS);
    let row = conn.query_row(&sql, [&page_id], page_row_json).optional();
    let page = match row {
        Ok(Some(p)) => p,
        Ok(None) => return err(&req.id, "not_found", "page not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let block_count: i64 = match conn.query_row(
        "SELECT COUNT(*) FROM blocks WHERE page_id = ?",
        [&page_id],
        |r| r.get(0),
    ) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(&req.id, json!({ "page": page, "blockCount": block_count }))
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let page_id = match required_str(req, "pageId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing params.patch object", None);
    };
    match page_exists(conn, &page_id) {
        Ok(true) => {}
        Ok(false) => return err(&req.id, "not_found", "page not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    let mut sets: Vec<&'static str> = Vec::new();
    let mut binds: Vec<Option<String>> = Vec::new();
    if let Some(title) = patch.get("title") {
        let Some(t) = title.as_str().map(str::trim).filter(|s| !s.is_empty()) else {
            return err(&req.id, "bad_params", "title must be a non-empty string", None);
        };
        sets.push("title = ?");
        binds.push(Some(t.to_string()));
    }
    if let Some(description) = patch.get("description") {
        let Some(d) = description.as_str() else {
            return err(&req.id, "bad_params", "description must be a string", None);
        };
        sets.push("description = ?");
        binds.push(Some(d.to_string()));
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
        binds.push(Some(s.to_string()));
    }
    if let Some(module) = patch.get("moduleId") {
        if module.is_null() {
            sets.push("module_id = ?");
            binds.push(None);
        } else {
            let Some(mid) = module.as_str().map(str::trim).filter(|s| !s.is_empty()) else {
                return err(&req.id, "bad_params", "moduleId must be a string or null", None);
            };
            match module_exists(conn, mid) {
                Ok(true) => {}
                Ok(false) => return err(&req.id, "not_found", "module not found", None),
                Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
            }
            sets.push("module_id = ?");
            binds.push(Some(mid.to_string()));
        }
    }
    if sets.is_empty() {
        return err(&req.id, "bad_params", "patch has no recognized fields", None);
    }

    sets.push("updated_at = ?");
    binds.push(Some(now_ts()));
    binds.push(Some(page_id.clone()));
    let sql = format!("UPDATE pages SET {} WHERE id = ?", sets.join(", "));
    if let Err(e) = conn.execute(&sql, rusqlite::params_from_iter(binds.iter())) {
        return err(&req.id, "db_write_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "pageId": page_id }))
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let page_id = match required_str(req, "pageId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    match page_exists(conn, &page_id) {
        Ok(true) => {}
        Ok(false) => return err(&req.id, "not_found", "page not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };
    for sql in [
        "DELETE FROM form_assignments WHERE page_id = ?",
        "DELETE FROM blocks WHERE page_id = ?",
        "DELETE FROM pages WHERE id = ?",
    ] {
        if let Err(e) = tx.execute(sql, [&page_id]) {
            let _ = tx.rollback();
            return err(&req.id, "db_write_failed", e.to_string(), None);
        }
    }
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_tx_failed", e.to_string(), None);
    }
    state.sessions.remove(&page_id);
    ok(&req.id, json!({ "pageId": page_id }))
}

fn load_block_rows(
    conn: &Connection,
    page_id: &str,
) -> Result<Vec<Block>, (&'static str, String)> {
    let mut stmt = conn
        .prepare(
            "SELECT id, order_index, style_json, layout_json, metadata_json, content_json
             FROM blocks
             WHERE page_id = ?
             ORDER BY order_index, id",
        )
        .map_err(|e| ("db_query_failed", e.to_string()))?;
    let raw = stmt
        .query_map([page_id], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, i64>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, String>(3)?,
                r.get::<_, String>(4)?,
                r.get::<_, String>(5)?,
            ))
        })
        .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
        .map_err(|e| ("db_query_failed", e.to_string()))?;

    let mut blocks = Vec::with_capacity(raw.len());
    for (id, order_index, style_json, layout_json, metadata_json, content_json) in raw {
        let mut content: BlockContent = serde_json::from_str(&content_json)
            .map_err(|e| ("bad_block_content", format!("block {}: {}", id, e)))?;
        // One-time repair for sorting activities saved before ids were
        // mandatory.
        if let BlockContent::SortingActivity(ref mut sc) = content {
            sc.normalize_legacy();
        }
        blocks.push(Block {
            id,
            order_index,
            style: serde_json::from_str::<BlockStyle>(&style_json).unwrap_or_default(),
            layout: serde_json::from_str::<BlockLayout>(&layout_json).unwrap_or_default(),
            metadata: serde_json::from_str::<BlockMetadata>(&metadata_json).unwrap_or_default(),
            content,
        });
    }
    Ok(blocks)
}

fn handle_open_editor(state: &mut AppState, req: &Request) -> serde_json::Value {
    let page_id = match required_str(req, "pageId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    match page_exists(conn, &page_id) {
        Ok(true) => {}
        Ok(false) => return err(&req.id, "not_found", "page not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }
    let blocks = match load_block_rows(conn, &page_id) {
        Ok(v) => v,
        Err((code, message)) => return err(&req.id, code, message, None),
    };
    let list = BlockList::from_blocks(blocks);
    let reply = block_list_json(&list);
    state.sessions.insert(page_id.clone(), list);
    ok(&req.id, json!({ "pageId": page_id, "editor": reply }))
}

fn handle_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let page_id = match required_str(req, "pageId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(list) = state.sessions.get(&page_id) else {
        return err(
            &req.id,
            "no_editor_session",
            "open the page for editing first",
            None,
        );
    };
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    // Full upsert keyed by page id + order index: replace every row for the
    // page in one transaction. The in-memory session is left untouched
    // whether or not the write succeeds.
    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };
    if let Err(e) = tx.execute("DELETE FROM blocks WHERE page_id = ?", [&page_id]) {
        let _ = tx.rollback();
        return err(&req.id, "db_write_failed", e.to_string(), None);
    }
    let ts = now_ts();
    for block in list.blocks() {
        let (style_json, layout_json, metadata_json, content_json) = match (
            serde_json::to_string(&block.style),
            serde_json::to_string(&block.layout),
            serde_json::to_string(&block.metadata),
            serde_json::to_string(&block.content),
        ) {
            (Ok(s), Ok(l), Ok(m), Ok(c)) => (s, l, m, c),
            _ => {
                let _ = tx.rollback();
                return err(&req.id, "db_write_failed", "failed to serialize block", None);
            }
        };
        if let Err(e) = tx.execute(
            "INSERT INTO blocks(id, page_id, order_index, block_type, style_json, layout_json, metadata_json, content_json, updated_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                block.id,
                page_id,
                block.order_index,
                block.content.block_type(),
                style_json,
                layout_json,
                metadata_json,
                content_json,
                ts
            ],
        ) {
            let _ = tx.rollback();
            return err(&req.id, "db_write_failed", e.to_string(), None);
        }
    }
    if let Err(e) = tx.execute(
        "UPDATE pages SET updated_at = ? WHERE id = ?",
        params![ts, page_id],
    ) {
        let _ = tx.rollback();
        return err(&req.id, "db_write_failed", e.to_string(), None);
    }
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_tx_failed", e.to_string(), None);
    }
    ok(
        &req.id,
        json!({ "pageId": page_id, "savedBlocks": list.len() }),
    )
}

fn handle_close_editor(state: &mut AppState, req: &Request) -> serde_json::Value {
    let page_id = match required_str(req, "pageId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let closed = state.sessions.remove(&page_id).is_some();
    ok(&req.id, json!({ "pageId": page_id, "closed": closed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "pages.create" => Some(handle_create(state, req)),
        "pages.list" => Some(handle_list(state, req)),
        "pages.open" => Some(handle_open(state, req)),
        "pages.update" => Some(handle_update(state, req)),
        "pages.delete" => Some(handle_delete(state, req)),
        "pages.openEditor" => Some(handle_open_editor(state, req)),
        "pages.save" => Some(handle_save(state, req)),
        "pages.closeEditor" => Some(handle_close_editor(state, req)),
        _ => None,
    }
}
