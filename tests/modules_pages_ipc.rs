
use serde_json::json;
use test_support::{request_err, request_ok, spawn_sidecar, temp_dir};

fn select_workspace(
    stdin: &mut std::process::ChildStdin,
    reader: &mut std::io::BufReader<std::process::ChildStdout>,
    workspace: &std::path::Path,
) {
    let _ = request_ok(
        stdin,
        reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
}

#[test]
fn module_crud_and_reorder() {
    let workspace = temp_dir("lessonbuilder-modules-crud");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "modules.create",
        json!({ "title": "Algebra" }),
    );
    let first_id = first
        .get("moduleId")
        .and_then(|v| v.as_str())
        .expect("id")
        .to_string();
    assert_eq!(first.get("sortOrder").and_then(|v| v.as_i64()), Some(0));

    let second = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "modules.create",
        json!({ "title": "Geometry", "description": "Shapes", "status": "published" }),
    );
    let second_id = second
        .get("moduleId")
        .and_then(|v| v.as_str())
        .expect("id")
        .to_string();
    assert_eq!(second.get("sortOrder").and_then(|v| v.as_i64()), Some(1));

    // Partial reorder: naming only the second module moves it first.
    let reordered = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "modules.reorder",
        json!({ "moduleIds": [second_id] }),
    );
    assert_eq!(
        reordered.get("moduleIds").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(2)
    );

    let listed = request_ok(&mut stdin, &mut reader, "4", "modules.list", json!({}));
    let modules = listed.get("modules").and_then(|v| v.as_array()).expect("modules");
    assert_eq!(
        modules[0].get("id").and_then(|v| v.as_str()),
        Some(second_id.as_str())
    );
    assert_eq!(
        modules[1].get("id").and_then(|v| v.as_str()),
        Some(first_id.as_str())
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "modules.update",
        json!({ "moduleId": first_id, "patch": { "status": "archived" } }),
    );
    let listed = request_ok(&mut stdin, &mut reader, "6", "modules.list", json!({}));
    assert_eq!(
        listed.get("modules").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(1)
    );
    let listed_all = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "modules.list",
        json!({ "includeArchived": true }),
    );
    assert_eq!(
        listed_all.get("modules").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(2)
    );

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn module_delete_refused_while_pages_remain() {
    let workspace = temp_dir("lessonbuilder-modules-delete");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);

    let module = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "modules.create",
        json!({ "title": "Occupied" }),
    );
    let module_id = module
        .get("moduleId")
        .and_then(|v| v.as_str())
        .expect("id")
        .to_string();
    let page = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "pages.create",
        json!({ "title": "Inside", "moduleId": module_id }),
    );
    let page_id = page
        .get("pageId")
        .and_then(|v| v.as_str())
        .expect("id")
        .to_string();

    let refused = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "modules.delete",
        json!({ "moduleId": module_id }),
    );
    assert_eq!(refused.get("code").and_then(|v| v.as_str()), Some("bad_params"));
    assert_eq!(
        refused.pointer("/details/pageCount").and_then(|v| v.as_i64()),
        Some(1)
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "pages.delete",
        json!({ "pageId": page_id }),
    );
    let deleted = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "modules.delete",
        json!({ "moduleId": module_id }),
    );
    assert_eq!(
        deleted.get("moduleId").and_then(|v| v.as_str()),
        Some(module_id.as_str())
    );

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn page_sort_order_is_per_module() {
    let workspace = temp_dir("lessonbuilder-pages-sort");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);

    let module = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "modules.create",
        json!({ "title": "Module" }),
    );
    let module_id = module
        .get("moduleId")
        .and_then(|v| v.as_str())
        .expect("id")
        .to_string();

    let in_module = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "pages.create",
        json!({ "title": "A", "moduleId": module_id }),
    );
    assert_eq!(in_module.get("sortOrder").and_then(|v| v.as_i64()), Some(0));
    let loose = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "pages.create",
        json!({ "title": "B" }),
    );
    assert_eq!(loose.get("sortOrder").and_then(|v| v.as_i64()), Some(0));
    let in_module_2 = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "pages.create",
        json!({ "title": "C", "moduleId": module_id }),
    );
    assert_eq!(in_module_2.get("sortOrder").and_then(|v| v.as_i64()), Some(1));

    let filtered = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "pages.list",
        json!({ "moduleId": module_id }),
    );
    assert_eq!(
        filtered.get("pages").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(2)
    );

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn page_update_validates_and_detaches_module() {
    let workspace = temp_dir("lessonbuilder-pages-update");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);

    let module = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "modules.create",
        json!({ "title": "Home" }),
    );
    let module_id = module
        .get("moduleId")
        .and_then(|v| v.as_str())
        .expect("id")
        .to_string();
    let page = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "pages.create",
        json!({ "title": "Movable", "moduleId": module_id }),
    );
    let page_id = page
        .get("pageId")
        .and_then(|v| v.as_str())
        .expect("id")
        .to_string();

    let bad = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "pages.update",
        json!({ "pageId": page_id, "patch": { "title": "  " } }),
    );
    assert_eq!(bad.get("code").and_then(|v| v.as_str()), Some("bad_params"));

    let bad_status = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "pages.update",
        json!({ "pageId": page_id, "patch": { "status": "retired" } }),
    );
    assert_eq!(
        bad_status.get("code").and_then(|v| v.as_str()),
        Some("bad_params")
    );

    // moduleId: null detaches the page.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "pages.update",
        json!({ "pageId": page_id, "patch": { "moduleId": null, "title": "Renamed" } }),
    );
    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "pages.open",
        json!({ "pageId": page_id }),
    );
    assert!(opened.pointer("/page/moduleId").map(|v| v.is_null()).unwrap_or(false));
    assert_eq!(
        opened.pointer("/page/title").and_then(|v| v.as_str()),
        Some("Renamed")
    );

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn requests_without_workspace_are_refused() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let error = request_err(&mut stdin, &mut reader, "1", "modules.list", json!({}));
    assert_eq!(
        error.get("code").and_then(|v| v.as_str()),
        Some("no_workspace")
    );
    let error = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "pages.create",
        json!({ "title": "Nowhere" }),
    );
    assert_eq!(
        error.get("code").and_then(|v| v.as_str()),
        Some("no_workspace")
    );
}
