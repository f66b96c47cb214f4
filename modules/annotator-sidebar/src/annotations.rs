//! Annotations loaded into the sidebar.
//!
//! Every annotation gets a local `$tag` when it is first added, so
//! annotations that have not been saved yet (and so have no `id`) can still
//! be told apart.

use annotator_store::{Action, StoreModule};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const NAMESPACE: &str = "annotations";

#[derive(Debug, Serialize, Deserialize)]
struct AnnotationList {
    annotations: Vec<Value>,
}

fn id_of(annotation: &Value) -> Option<&str> {
    annotation.get("id").and_then(Value::as_str)
}

fn tag_of(annotation: &Value) -> Option<&str> {
    annotation.get("$tag").and_then(Value::as_str)
}

/// Same annotation: matching ids, or for unsaved ones, matching tags.
pub fn same_annotation(a: &Value, b: &Value) -> bool {
    match (id_of(a), id_of(b)) {
        (Some(a), Some(b)) => a == b,
        _ => tag_of(a).is_some() && tag_of(a) == tag_of(b),
    }
}

fn stored(state: &Value) -> Vec<Value> {
    state["annotations"].as_array().cloned().unwrap_or_default()
}

fn add(state: &Value, incoming: Vec<Value>) -> Value {
    let mut annotations = stored(state);
    let mut next_tag = state["nextTag"].as_u64().unwrap_or(1);

    for mut annotation in incoming {
        match annotations.iter_mut().find(|existing| same_annotation(existing, &annotation)) {
            Some(existing) => {
                if let (Some(fields), Some(tag)) = (annotation.as_object_mut(), tag_of(existing)) {
                    fields.insert("$tag".into(), json!(tag));
                }
                *existing = annotation;
            }
            None => {
                if let Some(fields) = annotation.as_object_mut() {
                    if !fields.contains_key("$tag") {
                        fields.insert("$tag".into(), json!(format!("t{next_tag}")));
                        next_tag += 1;
                    }
                }
                annotations.push(annotation);
            }
        }
    }

    json!({"annotations": annotations, "nextTag": next_tag})
}

fn remove(state: &Value, removed: &[Value]) -> Value {
    let annotations: Vec<Value> = stored(state)
        .into_iter()
        .filter(|annotation| !removed.iter().any(|r| same_annotation(annotation, r)))
        .collect();
    json!({"annotations": annotations})
}

pub fn module() -> StoreModule {
    StoreModule::builder(NAMESPACE)
        .initial_state(json!({"annotations": [], "nextTag": 1}))
        .reducer_with("ADD_ANNOTATIONS", |state, list: AnnotationList| Ok(add(state, list.annotations)))
        .reducer_with("REMOVE_ANNOTATIONS", |state, list: AnnotationList| {
            Ok(remove(state, &list.annotations))
        })
        .reducer("CLEAR_ANNOTATIONS", |_, _| Ok(json!({"annotations": []})))
        .action("addAnnotations", |args| {
            let annotations: Vec<Value> = args.get(0)?;
            Ok(Action::with_payload("ADD_ANNOTATIONS", AnnotationList { annotations })?)
        })
        .action("removeAnnotations", |args| {
            let annotations: Vec<Value> = args.get(0)?;
            Ok(Action::with_payload("REMOVE_ANNOTATIONS", AnnotationList { annotations })?)
        })
        .action("clearAnnotations", |_| Ok(Action::new("CLEAR_ANNOTATIONS")))
        .selector("allAnnotations", |state, _| Ok(state["annotations"].clone()))
        .selector("annotationCount", |state, _| {
            Ok(state["annotations"].as_array().map_or(0, Vec::len))
        })
        .selector("findAnnotationByID", |state, args| {
            let id: String = args.get(0)?;
            Ok(stored(state).into_iter().find(|a| id_of(a) == Some(id.as_str())))
        })
        .selector("findAnnotationByTag", |state, args| {
            let tag: String = args.get(0)?;
            Ok(stored(state).into_iter().find(|a| tag_of(a) == Some(tag.as_str())))
        })
        .selector("newAnnotations", |state, _| {
            Ok(stored(state).into_iter().filter(|a| id_of(a).is_none()).collect::<Vec<_>>())
        })
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_annotations_get_sequential_tags() {
        let state = json!({"annotations": [], "nextTag": 1});
        let next = add(&state, vec![json!({"id": "a1"}), json!({"text": "draft"})]);

        assert_eq!(
            next,
            json!({
                "annotations": [
                    {"id": "a1", "$tag": "t1"},
                    {"text": "draft", "$tag": "t2"},
                ],
                "nextTag": 3,
            })
        );
    }

    #[test]
    fn re_adding_by_id_replaces_and_keeps_tag() {
        let state = json!({"annotations": [{"id": "a1", "text": "old", "$tag": "t1"}], "nextTag": 2});
        let next = add(&state, vec![json!({"id": "a1", "text": "new"})]);

        assert_eq!(next["annotations"], json!([{"id": "a1", "text": "new", "$tag": "t1"}]));
        assert_eq!(next["nextTag"], json!(2));
    }

    #[test]
    fn saving_an_unsaved_annotation_matches_by_tag() {
        let state = json!({"annotations": [{"text": "hi", "$tag": "t4"}], "nextTag": 5});
        let next = add(&state, vec![json!({"id": "a9", "text": "hi", "$tag": "t4"})]);

        assert_eq!(next["annotations"], json!([{"id": "a9", "text": "hi", "$tag": "t4"}]));
    }

    #[test]
    fn remove_matches_by_id_or_tag() {
        let state = json!({"annotations": [
            {"id": "a1", "$tag": "t1"},
            {"$tag": "t2"},
            {"id": "a3", "$tag": "t3"},
        ]});
        let next = remove(&state, &[json!({"id": "a1"}), json!({"$tag": "t2"})]);

        assert_eq!(next, json!({"annotations": [{"id": "a3", "$tag": "t3"}]}));
    }

    #[test]
    fn unsaved_annotations_without_tags_never_match() {
        assert!(!same_annotation(&json!({"text": "a"}), &json!({"text": "a"})));
    }
}
