
use serde_json::json;
use test_support::{request_err, request_ok, spawn_sidecar, temp_dir};

fn setup_block(
    stdin: &mut std::process::ChildStdin,
    reader: &mut std::io::BufReader<std::process::ChildStdout>,
    workspace: &std::path::Path,
) -> (String, String) {
    let _ = request_ok(
        stdin,
        reader,
        "s1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let page = request_ok(
        stdin,
        reader,
        "s2",
        "pages.create",
        json!({ "title": "Fingerprint Page" }),
    );
    let page_id = page
        .get("pageId")
        .and_then(|v| v.as_str())
        .expect("pageId")
        .to_string();
    let _ = request_ok(
        stdin,
        reader,
        "s3",
        "pages.openEditor",
        json!({ "pageId": page_id }),
    );
    let inserted = request_ok(
        stdin,
        reader,
        "s4",
        "blocks.insert",
        json!({ "pageId": page_id, "content": { "type": "paragraph", "body": "<p>x</p>" } }),
    );
    let block_id = inserted
        .get("blockId")
        .and_then(|v| v.as_str())
        .expect("blockId")
        .to_string();
    (page_id, block_id)
}

#[test]
fn generated_metadata_is_marked_ai() {
    let workspace = temp_dir("lessonbuilder-meta-generated");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (page_id, block_id) = setup_block(&mut stdin, &mut reader, &workspace);

    let applied = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "metadata.applyGenerated",
        json!({
            "pageId": page_id,
            "blockId": block_id,
            "metadata": {
                "behaviour_tag": "recall",
                "cognitive_skill": "comprehension",
                "difficulty": 37.5,
                "explanations": { "behaviour_tag": "ignored extra field" }
            }
        }),
    );
    let metadata = applied.get("metadata").cloned().expect("metadata");
    assert_eq!(
        metadata.get("behaviourTag").and_then(|v| v.as_str()),
        Some("recall")
    );
    assert_eq!(
        metadata.get("cognitiveSkill").and_then(|v| v.as_str()),
        Some("comprehension")
    );
    // Difficulty clamps to the 0..10 scale.
    assert_eq!(metadata.get("difficulty").and_then(|v| v.as_f64()), Some(10.0));
    assert_eq!(
        metadata.pointer("/provenance/behaviourTag").and_then(|v| v.as_str()),
        Some("ai")
    );
    assert_eq!(
        metadata.pointer("/provenance/difficulty").and_then(|v| v.as_str()),
        Some("ai")
    );
    // Fields the generator skipped stay unset.
    assert!(metadata.get("notes").is_none());
    assert!(metadata.pointer("/provenance/notes").is_none());

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn manual_edit_overrides_ai_provenance() {
    let workspace = temp_dir("lessonbuilder-meta-override");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (page_id, block_id) = setup_block(&mut stdin, &mut reader, &workspace);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "metadata.applyGenerated",
        json!({
            "pageId": page_id,
            "blockId": block_id,
            "metadata": { "behaviour_tag": "recall", "notes": "machine written" }
        }),
    );
    // Author edits one field by hand; only that field flips to human.
    let edited = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "blocks.updateMetadata",
        json!({
            "pageId": page_id,
            "blockId": block_id,
            "patch": { "notes": "checked by a person" }
        }),
    );
    let block = edited
        .get("blocks")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .cloned()
        .expect("block");
    assert_eq!(
        block.pointer("/metadata/notes").and_then(|v| v.as_str()),
        Some("checked by a person")
    );
    assert_eq!(
        block
            .pointer("/metadata/provenance/notes")
            .and_then(|v| v.as_str()),
        Some("human")
    );
    assert_eq!(
        block
            .pointer("/metadata/provenance/behaviourTag")
            .and_then(|v| v.as_str()),
        Some("ai")
    );

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn accepted_suggestions_apply_per_field() {
    let workspace = temp_dir("lessonbuilder-meta-suggestions");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (page_id, block_id) = setup_block(&mut stdin, &mut reader, &workspace);

    let applied = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "metadata.applySuggestions",
        json!({
            "pageId": page_id,
            "blockId": block_id,
            "accepted": [
                { "field": "learning_pattern", "suggestedValue": "worked-example" },
                { "field": "difficulty", "suggestedValue": 4.5 }
            ]
        }),
    );
    assert_eq!(
        applied.get("appliedFields").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(2)
    );

    let listing = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "blocks.list",
        json!({ "pageId": page_id }),
    );
    let block = listing
        .get("blocks")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .cloned()
        .expect("block");
    assert_eq!(
        block
            .pointer("/metadata/learningPattern")
            .and_then(|v| v.as_str()),
        Some("worked-example")
    );
    assert_eq!(
        block.pointer("/metadata/difficulty").and_then(|v| v.as_f64()),
        Some(4.5)
    );
    // A rejected (never sent) suggestion leaves the field untouched.
    assert!(block.pointer("/metadata/behaviourTag").is_none());

    let unknown = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "metadata.applySuggestions",
        json!({
            "pageId": page_id,
            "blockId": block_id,
            "accepted": [{ "field": "reading_age", "suggestedValue": "7" }]
        }),
    );
    assert_eq!(unknown.get("code").and_then(|v| v.as_str()), Some("bad_params"));

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn unknown_block_is_an_error_for_metadata_methods() {
    let workspace = temp_dir("lessonbuilder-meta-missing");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (page_id, _block_id) = setup_block(&mut stdin, &mut reader, &workspace);

    let error = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "metadata.applyGenerated",
        json!({
            "pageId": page_id,
            "blockId": "no-such-block",
            "metadata": { "notes": "lost" }
        }),
    );
    assert_eq!(error.get("code").and_then(|v| v.as_str()), Some("not_found"));

    let _ = std::fs::remove_dir_all(workspace);
}
