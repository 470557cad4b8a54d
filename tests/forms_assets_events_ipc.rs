
use serde_json::json;
use std::io::Write;
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
fn form_schema_lifecycle_with_assignments() {
    let workspace = temp_dir("lessonbuilder-forms");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);

    let page = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "pages.create",
        json!({ "title": "Quiz Page" }),
    );
    let page_id = page
        .get("pageId")
        .and_then(|v| v.as_str())
        .expect("pageId")
        .to_string();

    let schema = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "forms.schemas.create",
        json!({
            "name": "Exit ticket",
            "schema": { "fields": [{ "name": "answer", "kind": "text" }] }
        }),
    );
    let schema_id = schema
        .get("schemaId")
        .and_then(|v| v.as_str())
        .expect("schemaId")
        .to_string();

    let assigned = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "forms.assignments.set",
        json!({ "schemaId": schema_id, "pageId": page_id }),
    );
    let assignment_id = assigned
        .get("assignmentId")
        .and_then(|v| v.as_str())
        .expect("assignmentId")
        .to_string();

    // Repeating the set for the same (schema, page) pair keeps one row.
    let reassigned = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "forms.assignments.set",
        json!({ "schemaId": schema_id, "pageId": page_id, "blockId": "block-1" }),
    );
    assert_eq!(
        reassigned.get("assignmentId").and_then(|v| v.as_str()),
        Some(assignment_id.as_str())
    );

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "forms.assignments.list",
        json!({ "pageId": page_id }),
    );
    let assignments = listed
        .get("assignments")
        .and_then(|v| v.as_array())
        .expect("assignments");
    assert_eq!(assignments.len(), 1);
    assert_eq!(
        assignments[0].get("schemaName").and_then(|v| v.as_str()),
        Some("Exit ticket")
    );
    assert_eq!(
        assignments[0].get("blockId").and_then(|v| v.as_str()),
        Some("block-1")
    );

    // Schema delete is blocked while the assignment exists.
    let refused = request_err(
        &mut stdin,
        &mut reader,
        "6",
        "forms.schemas.delete",
        json!({ "schemaId": schema_id }),
    );
    assert_eq!(refused.get("code").and_then(|v| v.as_str()), Some("bad_params"));
    assert_eq!(
        refused
            .pointer("/details/assignmentCount")
            .and_then(|v| v.as_i64()),
        Some(1)
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "forms.assignments.remove",
        json!({ "assignmentId": assignment_id }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "forms.schemas.delete",
        json!({ "schemaId": schema_id }),
    );

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn asset_register_checksums_local_file() {
    let workspace = temp_dir("lessonbuilder-assets");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);

    let local = workspace.join("hello.txt");
    let mut f = std::fs::File::create(&local).expect("create local file");
    f.write_all(b"hello world").expect("write local file");
    drop(f);

    let registered = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "assets.register",
        json!({
            "fileName": "hello.txt",
            "mimeType": "text/plain",
            "storageKey": "media/hello.txt",
            "localPath": local.to_string_lossy(),
        }),
    );
    // sha256("hello world")
    assert_eq!(
        registered.get("checksumSha256").and_then(|v| v.as_str()),
        Some("b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9")
    );
    assert_eq!(registered.get("byteSize").and_then(|v| v.as_i64()), Some(11));

    // Without a local path the fingerprint fields stay null.
    let remote_only = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "assets.register",
        json!({
            "fileName": "remote.png",
            "mimeType": "image/png",
            "storageKey": "media/remote.png",
        }),
    );
    assert!(remote_only
        .get("checksumSha256")
        .map(|v| v.is_null())
        .unwrap_or(false));

    let listed = request_ok(&mut stdin, &mut reader, "3", "assets.list", json!({}));
    assert_eq!(
        listed.get("assets").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(2)
    );

    let asset_id = registered
        .get("assetId")
        .and_then(|v| v.as_str())
        .expect("assetId")
        .to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "assets.delete",
        json!({ "assetId": asset_id }),
    );
    let missing = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "assets.delete",
        json!({ "assetId": asset_id }),
    );
    assert_eq!(missing.get("code").and_then(|v| v.as_str()), Some("not_found"));

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn event_log_is_append_only() {
    let workspace = temp_dir("lessonbuilder-events");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "events.append",
        json!({
            "eventType": "page.published",
            "actor": "admin@example.test",
            "pageId": "page-1",
            "payload": { "from": "draft" }
        }),
    );
    assert!(first.get("eventId").and_then(|v| v.as_str()).is_some());
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "events.append",
        json!({ "eventType": "block.inserted", "pageId": "page-2" }),
    );

    let filtered = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "events.list",
        json!({ "pageId": "page-1" }),
    );
    let events = filtered.get("events").and_then(|v| v.as_array()).expect("events");
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].get("eventType").and_then(|v| v.as_str()),
        Some("page.published")
    );
    assert_eq!(
        events[0].pointer("/payload/from").and_then(|v| v.as_str()),
        Some("draft")
    );

    let all = request_ok(&mut stdin, &mut reader, "4", "events.list", json!({}));
    assert_eq!(
        all.get("events").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(2)
    );

    // There is no mutation surface for past events.
    let error = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "events.update",
        json!({ "eventId": "whatever" }),
    );
    assert_eq!(
        error.get("code").and_then(|v| v.as_str()),
        Some("not_implemented")
    );
    let error = request_err(
        &mut stdin,
        &mut reader,
        "6",
        "events.delete",
        json!({ "eventId": "whatever" }),
    );
    assert_eq!(
        error.get("code").and_then(|v| v.as_str()),
        Some("not_implemented")
    );

    let _ = std::fs::remove_dir_all(workspace);
}
