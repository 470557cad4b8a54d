use crate::editor::{MetadataPatch, Provenance};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{required_str, session_mut};
use crate::ipc::types::{AppState, Request};
use serde::Deserialize;
use serde_json::json;

/// Fingerprint payload as the generation function returns it (snake_case
/// keys, extra fields like explanations/confidence_scores ignored here).
#[derive(Debug, Default, Deserialize)]
struct GeneratedMetadata {
    #[serde(default)]
    behaviour_tag: Option<String>,
    #[serde(default)]
    cognitive_skill: Option<String>,
    #[serde(default)]
    learning_pattern: Option<String>,
    #[serde(default)]
    difficulty: Option<f64>,
    #[serde(default)]
    notes: Option<String>,
}

impl GeneratedMetadata {
    fn into_patch(self) -> MetadataPatch {
        MetadataPatch {
            behaviour_tag: self.behaviour_tag,
            cognitive_skill: self.cognitive_skill,
            learning_pattern: self.learning_pattern,
            difficulty: self.difficulty,
            notes: self.notes,
        }
    }
}

fn handle_apply_generated(state: &mut AppState, req: &Request) -> serde_json::Value {
    let page_id = match required_str(req, "pageId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let block_id = match required_str(req, "blockId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(metadata_value) = req.params.get("metadata") else {
        return err(&req.id, "bad_params", "missing params.metadata", None);
    };
    let generated: GeneratedMetadata = match serde_json::from_value(metadata_value.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", format!("metadata: {}", e), None),
    };
    let session = match session_mut(&mut state.sessions, req, &page_id) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let found = session.update_metadata(&block_id, generated.into_patch(), Provenance::Ai);
    if !found {
        return err(&req.id, "not_found", "block not found", None);
    }
    let metadata = session
        .get(&block_id)
        .map(|b| serde_json::to_value(&b.metadata).unwrap_or(serde_json::Value::Null))
        .unwrap_or(serde_json::Value::Null);
    ok(&req.id, json!({ "blockId": block_id, "metadata": metadata }))
}

fn handle_apply_suggestions(state: &mut AppState, req: &Request) -> serde_json::Value {
    let page_id = match required_str(req, "pageId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let block_id = match required_str(req, "blockId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(accepted) = req.params.get("accepted").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "missing params.accepted array", None);
    };

    // Only the suggestions the author explicitly accepted arrive here; each
    // one targets a single fingerprint field.
    let mut patch = MetadataPatch::default();
    let mut applied_fields: Vec<String> = Vec::new();
    for entry in accepted {
        let Some(field) = entry.get("field").and_then(|v| v.as_str()) else {
            return err(&req.id, "bad_params", "each suggestion needs a field", None);
        };
        let value = entry.get("suggestedValue").cloned().unwrap_or_default();
        match field {
            "behaviour_tag" => patch.behaviour_tag = value.as_str().map(str::to_string),
            "cognitive_skill" => patch.cognitive_skill = value.as_str().map(str::to_string),
            "learning_pattern" => patch.learning_pattern = value.as_str().map(str::to_string),
            "difficulty" => patch.difficulty = value.as_f64(),
            "notes" => patch.notes = value.as_str().map(str::to_string),
            other => {
                return err(
                    &req.id,
                    "bad_params",
                    format!("unknown fingerprint field: {}", other),
                    None,
                )
            }
        }
        applied_fields.push(field.to_string());
    }

    let session = match session_mut(&mut state.sessions, req, &page_id) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let found = session.update_metadata(&block_id, patch, Provenance::Ai);
    if !found {
        return err(&req.id, "not_found", "block not found", None);
    }
    ok(
        &req.id,
        json!({ "blockId": block_id, "appliedFields": applied_fields }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "metadata.applyGenerated" => Some(handle_apply_generated(state, req)),
        "metadata.applySuggestions" => Some(handle_apply_suggestions(state, req)),
        _ => None,
    }
}
