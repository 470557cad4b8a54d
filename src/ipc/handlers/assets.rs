use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, now_ts, opt_str, required_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::params;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::path::Path;
use uuid::Uuid;

/// Checksum of a local file about to be uploaded to object storage. The
/// upload itself happens elsewhere; we only record the fingerprint.
fn sha256_of_file(path: &Path) -> anyhow::Result<(String, i64)> {
    let bytes = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok((format!("{:x}", hasher.finalize()), bytes.len() as i64))
}

fn handle_register(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let file_name = match required_str(req, "fileName") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mime_type = match required_str(req, "mimeType") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let storage_key = match required_str(req, "storageKey") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let (checksum, byte_size) = match opt_str(&req.params, "localPath") {
        Some(local) => match sha256_of_file(Path::new(&local)) {
            Ok((sum, size)) => (Some(sum), Some(size)),
            Err(e) => {
                return err(
                    &req.id,
                    "bad_params",
                    format!("failed to read localPath: {}", e),
                    None,
                )
            }
        },
        None => (None, None),
    };

    let asset_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO media_assets(id, file_name, mime_type, storage_key, byte_size, checksum_sha256, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        params![asset_id, file_name, mime_type, storage_key, byte_size, checksum, now_ts()],
    ) {
        return err(&req.id, "db_write_failed", e.to_string(), None);
    }
    ok(
        &req.id,
        json!({ "assetId": asset_id, "checksumSha256": checksum, "byteSize": byte_size }),
    )
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let mut stmt = match conn.prepare(
        "SELECT id, file_name, mime_type, storage_key, byte_size, checksum_sha256, created_at
         FROM media_assets ORDER BY created_at DESC, id",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let assets = match stmt.query_map([], |r| {
        Ok(json!({
            "id": r.get::<_, String>(0)?,
            "fileName": r.get::<_, String>(1)?,
            "mimeType": r.get::<_, String>(2)?,
            "storageKey": r.get::<_, String>(3)?,
            "byteSize": r.get::<_, Option<i64>>(4)?,
            "checksumSha256": r.get::<_, Option<String>>(5)?,
            "createdAt": r.get::<_, String>(6)?,
        }))
    }) {
        Ok(rows) => match rows.collect::<Result<Vec<_>, _>>() {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(&req.id, json!({ "assets": assets }))
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let asset_id = match required_str(req, "assetId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match conn.execute("DELETE FROM media_assets WHERE id = ?", [&asset_id]) {
        Ok(0) => err(&req.id, "not_found", "asset not found", None),
        Ok(_) => ok(&req.id, json!({ "assetId": asset_id })),
        Err(e) => err(&req.id, "db_write_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "assets.register" => Some(handle_register(state, req)),
        "assets.list" => Some(handle_list(state, req)),
        "assets.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
