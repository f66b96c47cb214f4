//! Unsaved edits to annotations.

use annotator_store::{Action, RootState, StoreModule};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::annotations::{self, same_annotation};

pub const NAMESPACE: &str = "drafts";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    /// Just enough of the annotation to find it again: `id` and/or `$tag`.
    pub annotation: Value,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
}

impl Draft {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.tags.is_empty()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DraftChanges {
    #[serde(default)]
    text: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    is_private: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct DraftPayload {
    draft: Draft,
}

#[derive(Debug, Serialize, Deserialize)]
struct AnnotationPayload {
    annotation: Value,
}

/// Only `id` and `$tag` of an annotation are kept in a draft.
fn annotation_key(annotation: &Value) -> Value {
    let mut key = serde_json::Map::new();
    for field in ["id", "$tag"] {
        if let Some(value) = annotation.get(field).filter(|v| !v.is_null()) {
            key.insert(field.into(), value.clone());
        }
    }
    Value::Object(key)
}

fn drafts_of(state: &Value) -> anyhow::Result<Vec<Draft>> {
    Ok(serde_json::from_value(state["drafts"].clone())?)
}

pub fn module() -> StoreModule {
    StoreModule::builder(NAMESPACE)
        .initial_state(json!({"drafts": []}))
        .reducer_with("CREATE_DRAFT", |state, payload: DraftPayload| {
            let mut drafts = drafts_of(state)?;
            drafts.retain(|d| !same_annotation(&d.annotation, &payload.draft.annotation));
            drafts.push(payload.draft);
            Ok(json!({"drafts": drafts}))
        })
        .reducer_with("REMOVE_DRAFT", |state, payload: AnnotationPayload| {
            let mut drafts = drafts_of(state)?;
            drafts.retain(|d| !same_annotation(&d.annotation, &payload.annotation));
            Ok(json!({"drafts": drafts}))
        })
        .reducer("DISCARD_ALL_DRAFTS", |_, _| Ok(json!({"drafts": []})))
        .reducer("DELETE_NEW_AND_EMPTY_DRAFTS", |state, _| {
            let mut drafts = drafts_of(state)?;
            drafts.retain(|d| !(d.annotation.get("id").is_none() && d.is_empty()));
            Ok(json!({"drafts": drafts}))
        })
        .action("createDraft", |args| {
            let annotation: Value = args.get(0)?;
            let changes: DraftChanges = args.opt(1)?.unwrap_or_default();
            let draft = Draft {
                annotation: annotation_key(&annotation),
                text: changes.text,
                tags: changes.tags,
                is_private: changes.is_private,
                created_at: Utc::now(),
            };
            Ok(Action::with_payload("CREATE_DRAFT", DraftPayload { draft })?)
        })
        .action("removeDraft", |args| {
            let annotation: Value = args.get(0)?;
            Ok(Action::with_payload(
                "REMOVE_DRAFT",
                AnnotationPayload {
                    annotation: annotation_key(&annotation),
                },
            )?)
        })
        .action("discardAllDrafts", |_| Ok(Action::new("DISCARD_ALL_DRAFTS")))
        .action("deleteNewAndEmptyDrafts", |_| Ok(Action::new("DELETE_NEW_AND_EMPTY_DRAFTS")))
        .selector("countDrafts", |state, _| Ok(drafts_of(state)?.len()))
        .selector("getDraft", |state, args| {
            let annotation: Value = args.get(0)?;
            Ok(drafts_of(state)?
                .into_iter()
                .find(|d| same_annotation(&d.annotation, &annotation)))
        })
        .selector("getDraftIfNotEmpty", |state, args| {
            let annotation: Value = args.get(0)?;
            Ok(drafts_of(state)?
                .into_iter()
                .find(|d| same_annotation(&d.annotation, &annotation))
                .filter(|d| !d.is_empty()))
        })
        .root_selector("unsavedAnnotations", |root: &RootState, _| unsaved_annotations(root))
        .build()
}

/// Annotations that have a draft but were never saved. Resolved against the
/// annotations namespace so callers get the full annotation back.
fn unsaved_annotations(root: &RootState) -> anyhow::Result<Vec<Value>> {
    let Some(state) = root.get(NAMESPACE) else {
        return Ok(Vec::new());
    };
    let loaded = root
        .get(annotations::NAMESPACE)
        .and_then(|s| s["annotations"].as_array())
        .map(Vec::as_slice)
        .unwrap_or_default();

    Ok(drafts_of(state)?
        .into_iter()
        .filter(|d| d.annotation.get("id").is_none())
        .map(|d| {
            loaded
                .iter()
                .find(|a| same_annotation(a, &d.annotation))
                .cloned()
                .unwrap_or(d.annotation)
        })
        .collect())
}
