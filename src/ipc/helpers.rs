use rusqlite::Connection;
use serde_json::Value as JsonValue;
use std::time::{SystemTime, UNIX_EPOCH};

use super::error::err;
use super::types::{AppState, Request};
use crate::editor::BlockList;

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn opt_str(params: &JsonValue, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn opt_usize(params: &JsonValue, key: &str) -> Result<Option<usize>, &'static str> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => {
            let n = v.as_u64().ok_or("must be a non-negative integer")?;
            Ok(Some(n as usize))
        }
    }
}

pub fn parse_bool(v: Option<&JsonValue>, default: bool) -> Result<bool, &'static str> {
    match v {
        None => Ok(default),
        Some(v) if v.is_null() => Ok(default),
        Some(v) => v.as_bool().ok_or("must be boolean"),
    }
}

pub fn now_ts() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

/// Wire shape shared by pages.openEditor and the blocks.* replies.
pub fn block_list_json(list: &BlockList) -> serde_json::Value {
    let blocks: Vec<serde_json::Value> = list
        .blocks()
        .iter()
        .map(|b| serde_json::to_value(b).unwrap_or(serde_json::Value::Null))
        .collect();
    let open_panel = list.open_panel().map(|(id, panel)| {
        serde_json::json!({
            "blockId": id,
            "panel": serde_json::to_value(panel).unwrap_or(serde_json::Value::Null),
        })
    });
    serde_json::json!({
        "blocks": blocks,
        "openPanel": open_panel,
    })
}

/// The editor session for a page, or the standard error reply when the page
/// has not been opened for editing.
pub fn session_mut<'a>(
    sessions: &'a mut std::collections::HashMap<String, BlockList>,
    req: &Request,
    page_id: &str,
) -> Result<&'a mut BlockList, serde_json::Value> {
    match sessions.get_mut(page_id) {
        Some(session) => Ok(session),
        None => Err(err(
            &req.id,
            "no_editor_session",
            "open the page for editing first",
            None,
        )),
    }
}
