use crate::db;
use crate::editor::{
    BlockContent, BlockLayout, BlockList, BlockStyle, LayoutPatch, MetadataPatch, MoveDirection,
    PaddingPreset, Panel, Provenance, StylePatch, StyleTheme, WidthClass,
};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{block_list_json, opt_usize, required_str, session_mut};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

/// Workspace-level defaults for freshly inserted blocks, kept under the
/// `setup.builder` settings key.
fn load_builder_defaults(state: &AppState) -> (BlockStyle, BlockLayout) {
    let obj = state
        .db
        .as_ref()
        .and_then(|conn| db::settings_get_json(conn, "setup.builder").ok().flatten())
        .and_then(|v| v.as_object().cloned())
        .unwrap_or_default();

    let mut style = BlockStyle::default();
    if let Some(theme) = obj
        .get("defaultTheme")
        .and_then(|v| serde_json::from_value::<StyleTheme>(v.clone()).ok())
    {
        style.theme = theme;
    }

    let mut layout = BlockLayout::default();
    if let Some(width) = obj
        .get("defaultWidth")
        .and_then(|v| serde_json::from_value::<WidthClass>(v.clone()).ok())
    {
        layout.width = width;
    }
    if let Some(preset) = obj
        .get("defaultPaddingPreset")
        .and_then(|v| serde_json::from_value::<PaddingPreset>(v.clone()).ok())
    {
        layout.padding_top = preset.pixels();
        layout.padding_bottom = preset.pixels();
    }
    (style, layout)
}

fn session_reply(req: &Request, list: &BlockList, extra: serde_json::Value) -> serde_json::Value {
    let mut result = block_list_json(list);
    if let (Some(target), Some(source)) = (result.as_object_mut(), extra.as_object()) {
        for (k, v) in source {
            target.insert(k.clone(), v.clone());
        }
    }
    ok(&req.id, result)
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let page_id = match required_str(req, "pageId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let session = match session_mut(&mut state.sessions, req, &page_id) {
        Ok(s) => s,
        Err(e) => return e,
    };
    session_reply(req, session, json!({}))
}

fn handle_insert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let page_id = match required_str(req, "pageId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(content_value) = req.params.get("content") else {
        return err(&req.id, "bad_params", "missing params.content", None);
    };
    let content: BlockContent = match serde_json::from_value(content_value.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", format!("content: {}", e), None),
    };
    let at = match opt_usize(&req.params, "atIndex") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("atIndex {}", m), None),
    };

    let (style, layout) = load_builder_defaults(state);
    let session = match session_mut(&mut state.sessions, req, &page_id) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let block_id = session.insert_block_with(content, style, layout, at);
    session_reply(req, session, json!({ "blockId": block_id }))
}

fn handle_update_content(state: &mut AppState, req: &Request) -> serde_json::Value {
    let page_id = match required_str(req, "pageId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let block_id = match required_str(req, "blockId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(content_value) = req.params.get("content") else {
        return err(&req.id, "bad_params", "missing params.content", None);
    };
    let content: BlockContent = match serde_json::from_value(content_value.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", format!("content: {}", e), None),
    };
    let session = match session_mut(&mut state.sessions, req, &page_id) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let found = session.update_content(&block_id, content);
    session_reply(req, session, json!({ "found": found }))
}

fn handle_update_style(state: &mut AppState, req: &Request) -> serde_json::Value {
    let page_id = match required_str(req, "pageId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let block_id = match required_str(req, "blockId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let patch: StylePatch = match serde_json::from_value(
        req.params.get("patch").cloned().unwrap_or(json!({})),
    ) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", format!("patch: {}", e), None),
    };
    let session = match session_mut(&mut state.sessions, req, &page_id) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let found = session.update_style(&block_id, patch);
    session_reply(req, session, json!({ "found": found }))
}

fn handle_update_layout(state: &mut AppState, req: &Request) -> serde_json::Value {
    let page_id = match required_str(req, "pageId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let block_id = match required_str(req, "blockId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let patch: LayoutPatch = match serde_json::from_value(
        req.params.get("patch").cloned().unwrap_or(json!({})),
    ) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", format!("patch: {}", e), None),
    };
    let session = match session_mut(&mut state.sessions, req, &page_id) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let found = session.update_layout(&block_id, patch);
    session_reply(req, session, json!({ "found": found }))
}

fn handle_update_metadata(state: &mut AppState, req: &Request) -> serde_json::Value {
    let page_id = match required_str(req, "pageId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let block_id = match required_str(req, "blockId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let patch: MetadataPatch = match serde_json::from_value(
        req.params.get("patch").cloned().unwrap_or(json!({})),
    ) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", format!("patch: {}", e), None),
    };
    let session = match session_mut(&mut state.sessions, req, &page_id) {
        Ok(s) => s,
        Err(e) => return e,
    };
    // Author-entered values; AI-derived writes go through metadata.*.
    let found = session.update_metadata(&block_id, patch, Provenance::Human);
    session_reply(req, session, json!({ "found": found }))
}

fn handle_duplicate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let page_id = match required_str(req, "pageId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let block_id = match required_str(req, "blockId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let session = match session_mut(&mut state.sessions, req, &page_id) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let new_id = session.duplicate_block(&block_id);
    session_reply(
        req,
        session,
        json!({ "found": new_id.is_some(), "blockId": new_id }),
    )
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let page_id = match required_str(req, "pageId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let block_id = match required_str(req, "blockId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let session = match session_mut(&mut state.sessions, req, &page_id) {
        Ok(s) => s,
        Err(e) => return e,
    };
    // Unknown ids are a no-op by contract, not an error.
    let found = session.delete_block(&block_id);
    session_reply(req, session, json!({ "found": found }))
}

fn handle_move(state: &mut AppState, req: &Request) -> serde_json::Value {
    let page_id = match required_str(req, "pageId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let block_id = match required_str(req, "blockId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let direction_raw = match required_str(req, "direction") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(direction) = MoveDirection::parse(&direction_raw) else {
        return err(&req.id, "bad_params", "direction must be up or down", None);
    };
    let session = match session_mut(&mut state.sessions, req, &page_id) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let found = session.move_block(&block_id, direction);
    session_reply(req, session, json!({ "found": found }))
}

fn handle_reorder(state: &mut AppState, req: &Request) -> serde_json::Value {
    let page_id = match required_str(req, "pageId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let source = match opt_usize(&req.params, "sourceIndex") {
        Ok(Some(v)) => v,
        Ok(None) => return err(&req.id, "bad_params", "missing sourceIndex", None),
        Err(m) => return err(&req.id, "bad_params", format!("sourceIndex {}", m), None),
    };
    // A missing destination means the drag was dropped outside any target.
    let destination = match opt_usize(&req.params, "destinationIndex") {
        Ok(v) => v,
        Err(m) => {
            return err(
                &req.id,
                "bad_params",
                format!("destinationIndex {}", m),
                None,
            )
        }
    };
    let session = match session_mut(&mut state.sessions, req, &page_id) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let moved = session.reorder_by_drag(source, destination);
    if !moved {
        return err(
            &req.id,
            "bad_params",
            "sourceIndex out of range",
            Some(json!({ "sourceIndex": source, "length": session.len() })),
        );
    }
    session_reply(req, session, json!({}))
}

fn handle_panel_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let page_id = match required_str(req, "pageId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let block_id = match required_str(req, "blockId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let panel: Panel = match serde_json::from_value(
        req.params.get("panel").cloned().unwrap_or_default(),
    ) {
        Ok(v) => v,
        Err(_) => {
            return err(
                &req.id,
                "bad_params",
                "panel must be one of: format, metadata, appearance",
                None,
            )
        }
    };
    let session = match session_mut(&mut state.sessions, req, &page_id) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let found = session.open_panel_for(&block_id, panel);
    session_reply(req, session, json!({ "found": found }))
}

fn handle_panel_close(state: &mut AppState, req: &Request) -> serde_json::Value {
    let page_id = match required_str(req, "pageId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let session = match session_mut(&mut state.sessions, req, &page_id) {
        Ok(s) => s,
        Err(e) => return e,
    };
    session.close_panel();
    session_reply(req, session, json!({}))
}

fn handle_list_item_level(
    state: &mut AppState,
    req: &Request,
    indent: bool,
) -> serde_json::Value {
    let page_id = match required_str(req, "pageId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let block_id = match required_str(req, "blockId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let item = match opt_usize(&req.params, "itemIndex") {
        Ok(Some(v)) => v,
        Ok(None) => return err(&req.id, "bad_params", "missing itemIndex", None),
        Err(m) => return err(&req.id, "bad_params", format!("itemIndex {}", m), None),
    };
    let session = match session_mut(&mut state.sessions, req, &page_id) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let found = if indent {
        session.indent_list_item(&block_id, item)
    } else {
        session.outdent_list_item(&block_id, item)
    };
    session_reply(req, session, json!({ "found": found }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "blocks.list" => Some(handle_list(state, req)),
        "blocks.insert" => Some(handle_insert(state, req)),
        "blocks.updateContent" => Some(handle_update_content(state, req)),
        "blocks.updateStyle" => Some(handle_update_style(state, req)),
        "blocks.updateLayout" => Some(handle_update_layout(state, req)),
        "blocks.updateMetadata" => Some(handle_update_metadata(state, req)),
        "blocks.duplicate" => Some(handle_duplicate(state, req)),
        "blocks.delete" => Some(handle_delete(state, req)),
        "blocks.move" => Some(handle_move(state, req)),
        "blocks.reorder" => Some(handle_reorder(state, req)),
        "blocks.panel.open" => Some(handle_panel_open(state, req)),
        "blocks.panel.close" => Some(handle_panel_close(state, req)),
        "blocks.listItem.indent" => Some(handle_list_item_level(state, req, true)),
        "blocks.listItem.outdent" => Some(handle_list_item_level(state, req, false)),
        _ => None,
    }
}
