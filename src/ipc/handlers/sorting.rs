use crate::editor::BlockContent;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{parse_bool, required_str, session_mut};
use crate::ipc::types::{AppState, Request};
use crate::sorting::SortingContent;
use serde_json::json;

/// Pulls a deep copy of the sorting content out of the block; mutations are
/// written back through the editor's update-in-place contract.
fn sorting_content(
    state: &mut AppState,
    req: &Request,
    page_id: &str,
    block_id: &str,
) -> Result<SortingContent, serde_json::Value> {
    let session = session_mut(&mut state.sessions, req, page_id)?;
    let Some(block) = session.get(block_id) else {
        return Err(err(&req.id, "not_found", "block not found", None));
    };
    match &block.content {
        BlockContent::SortingActivity(sc) => Ok(sc.clone()),
        _ => Err(err(
            &req.id,
            "bad_params",
            "block is not a sorting activity",
            Some(json!({ "blockType": block.content.block_type() })),
        )),
    }
}

fn store_sorting_content(
    state: &mut AppState,
    req: &Request,
    page_id: &str,
    block_id: &str,
    content: SortingContent,
) -> Result<(), serde_json::Value> {
    let session = session_mut(&mut state.sessions, req, page_id)?;
    session.update_content(block_id, BlockContent::SortingActivity(content));
    Ok(())
}

fn handle_add_category(state: &mut AppState, req: &Request) -> serde_json::Value {
    let page_id = match required_str(req, "pageId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let block_id = match required_str(req, "blockId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut content = match sorting_content(state, req, &page_id, &block_id) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let category_id = content.add_category();
    let categories = content.categories.len();
    if let Err(e) = store_sorting_content(state, req, &page_id, &block_id, content) {
        return e;
    }
    ok(
        &req.id,
        json!({ "categoryId": category_id, "categoryCount": categories }),
    )
}

fn handle_delete_category(state: &mut AppState, req: &Request) -> serde_json::Value {
    let page_id = match required_str(req, "pageId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let block_id = match required_str(req, "blockId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let category_id = match required_str(req, "categoryId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let confirm_cascade = match parse_bool(req.params.get("confirmCascade"), false) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("confirmCascade {}", m), None),
    };

    let mut content = match sorting_content(state, req, &page_id, &block_id) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let referencing = content.referencing_items(&category_id);
    // The only cascading delete in the model: without an interactive
    // confirmation dialog, the caller must opt in explicitly.
    if referencing > 0 && !confirm_cascade {
        return err(
            &req.id,
            "cascade_confirmation_required",
            "deleting this category also deletes its items; retry with confirmCascade",
            Some(json!({ "itemCount": referencing })),
        );
    }
    let Some(removal) = content.delete_category(&category_id) else {
        return err(&req.id, "not_found", "category not found", None);
    };
    if let Err(e) = store_sorting_content(state, req, &page_id, &block_id, content) {
        return e;
    }
    ok(
        &req.id,
        json!({ "categoryId": category_id, "itemsRemoved": removal.items_removed }),
    )
}

fn handle_add_item(state: &mut AppState, req: &Request) -> serde_json::Value {
    let page_id = match required_str(req, "pageId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let block_id = match required_str(req, "blockId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let category_id = match required_str(req, "categoryId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut content = match sorting_content(state, req, &page_id, &block_id) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(item_id) = content.add_item_to_category(&category_id) else {
        return err(&req.id, "not_found", "category not found", None);
    };
    if let Err(e) = store_sorting_content(state, req, &page_id, &block_id, content) {
        return e;
    }
    ok(&req.id, json!({ "itemId": item_id }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "sorting.addCategory" => Some(handle_add_category(state, req)),
        "sorting.deleteCategory" => Some(handle_delete_category(state, req)),
        "sorting.addItem" => Some(handle_add_item(state, req)),
        _ => None,
    }
}
