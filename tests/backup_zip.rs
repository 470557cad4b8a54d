
use serde_json::json;
use test_support::{request_err, request_ok, spawn_sidecar, temp_dir};

fn seed_workspace(
    stdin: &mut std::process::ChildStdin,
    reader: &mut std::io::BufReader<std::process::ChildStdout>,
    workspace: &std::path::Path,
) -> String {
    let _ = request_ok(
        stdin,
        reader,
        "seed1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let page = request_ok(
        stdin,
        reader,
        "seed2",
        "pages.create",
        json!({ "title": "Backed up" }),
    );
    let page_id = page
        .get("pageId")
        .and_then(|v| v.as_str())
        .expect("pageId")
        .to_string();
    let _ = request_ok(
        stdin,
        reader,
        "seed3",
        "pages.openEditor",
        json!({ "pageId": page_id }),
    );
    let _ = request_ok(
        stdin,
        reader,
        "seed4",
        "blocks.insert",
        json!({ "pageId": page_id, "content": { "type": "heading", "heading": "Survives" } }),
    );
    let _ = request_ok(
        stdin,
        reader,
        "seed5",
        "pages.save",
        json!({ "pageId": page_id }),
    );
    page_id
}

#[test]
fn export_then_import_restores_content() {
    let source = temp_dir("lessonbuilder-backup-src");
    let restored = temp_dir("lessonbuilder-backup-dst");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let page_id = seed_workspace(&mut stdin, &mut reader, &source);

    let bundle = source.join("bundle.lbz");
    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "backup.export",
        json!({ "outPath": bundle.to_string_lossy() }),
    );
    assert_eq!(
        exported.get("bundleFormat").and_then(|v| v.as_str()),
        Some("lessonbuilder-workspace-v1")
    );
    assert_eq!(exported.get("entryCount").and_then(|v| v.as_i64()), Some(3));
    assert!(bundle.is_file());

    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "backup.import",
        json!({
            "inPath": bundle.to_string_lossy(),
            "workspacePath": restored.to_string_lossy(),
        }),
    );
    assert_eq!(
        imported.get("bundleFormatDetected").and_then(|v| v.as_str()),
        Some("lessonbuilder-workspace-v1")
    );

    // The sidecar is now on the restored workspace; the page and its blocks
    // came across.
    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "pages.open",
        json!({ "pageId": page_id }),
    );
    assert_eq!(
        opened.pointer("/page/title").and_then(|v| v.as_str()),
        Some("Backed up")
    );
    assert_eq!(opened.get("blockCount").and_then(|v| v.as_i64()), Some(1));

    // Sessions from the previous workspace are gone.
    let health = request_ok(&mut stdin, &mut reader, "4", "health", json!({}));
    assert_eq!(
        health.get("openEditorSessions").and_then(|v| v.as_i64()),
        Some(0)
    );

    let _ = std::fs::remove_dir_all(source);
    let _ = std::fs::remove_dir_all(restored);
}

#[test]
fn raw_sqlite_file_imports_without_manifest() {
    let source = temp_dir("lessonbuilder-backup-raw-src");
    let restored = temp_dir("lessonbuilder-backup-raw-dst");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let page_id = seed_workspace(&mut stdin, &mut reader, &source);

    // A manual copy of the database file, no zip wrapper.
    let raw_copy = source.join("manual-copy.sqlite3");
    std::fs::copy(source.join("lessonbuilder.sqlite3"), &raw_copy).expect("copy db");

    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "backup.import",
        json!({
            "inPath": raw_copy.to_string_lossy(),
            "workspacePath": restored.to_string_lossy(),
        }),
    );
    assert_eq!(
        imported.get("bundleFormatDetected").and_then(|v| v.as_str()),
        Some("raw-sqlite3")
    );

    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "pages.open",
        json!({ "pageId": page_id }),
    );
    assert_eq!(opened.get("blockCount").and_then(|v| v.as_i64()), Some(1));

    let _ = std::fs::remove_dir_all(source);
    let _ = std::fs::remove_dir_all(restored);
}

#[test]
fn foreign_zip_is_rejected_and_workspace_kept() {
    let source = temp_dir("lessonbuilder-backup-foreign");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let page_id = seed_workspace(&mut stdin, &mut reader, &source);

    // Zip signature, garbage body: detected as a zip, rejected as a bundle.
    let bogus = source.join("bogus.zip");
    std::fs::write(&bogus, [0x50, 0x4B, 0x03, 0x04, 0x00, 0x00, 0x00, 0x00]).expect("write bogus");

    let error = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "backup.import",
        json!({
            "inPath": bogus.to_string_lossy(),
            "workspacePath": source.to_string_lossy(),
        }),
    );
    assert_eq!(
        error.get("code").and_then(|v| v.as_str()),
        Some("backup_failed")
    );

    // The live workspace is untouched.
    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "pages.open",
        json!({ "pageId": page_id }),
    );
    assert_eq!(opened.get("blockCount").and_then(|v| v.as_i64()), Some(1));

    let _ = std::fs::remove_dir_all(source);
}

#[test]
fn export_without_workspace_is_refused() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let error = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "backup.export",
        json!({ "outPath": "/tmp/nowhere.lbz" }),
    );
    assert_eq!(
        error.get("code").and_then(|v| v.as_str()),
        Some("no_workspace")
    );
}
