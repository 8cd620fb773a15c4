use serde_json::{Map, Value};

use crate::lang::is_localizable;
use crate::textutil::{slug_or_unnamed, UNNAMED};

/// A localizable node found in a survey document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalizableNode {
    /// Dot-joined path derived from page / question / choice names plus the field name.
    pub identifier: String,
    /// RFC 6901 pointer to the node inside the document.
    pub pointer: String,
    /// Field holding the node (`title`, `text`, `html`, ...).
    pub field: String,
}

/// All localizable nodes in document order.
pub fn collect_localizable(doc: &Value) -> Vec<LocalizableNode> {
    let mut out = Vec::new();
    if let Value::Object(map) = doc {
        let mut segments = Vec::new();
        walk_object(map, &mut segments, "", &mut out);
    }
    out
}

/// Calls `f` with a live mutable reference to every localizable node.
pub fn visit_localizable_mut<F>(doc: &mut Value, mut f: F)
where
    F: FnMut(&LocalizableNode, &mut Map<String, Value>),
{
    for node in collect_localizable(doc) {
        if let Some(map) = doc.pointer_mut(&node.pointer).and_then(Value::as_object_mut) {
            f(&node, map);
        }
    }
}

fn walk_object(
    map: &Map<String, Value>,
    segments: &mut Vec<String>,
    pointer: &str,
    out: &mut Vec<LocalizableNode>,
) {
    for (key, child) in map {
        let child_pointer = format!("{pointer}/{}", escape_pointer(key));
        match child {
            Value::Object(obj) if is_localizable(obj) => {
                out.push(LocalizableNode {
                    identifier: join(segments, key),
                    pointer: child_pointer,
                    field: key.clone(),
                });
            }
            Value::Object(obj) => {
                segments.push(key.clone());
                walk_object(obj, segments, &child_pointer, out);
                segments.pop();
            }
            Value::Array(items) => {
                for (idx, item) in items.iter().enumerate() {
                    let Value::Object(obj) = item else {
                        continue;
                    };
                    let item_pointer = format!("{child_pointer}/{idx}");
                    if is_localizable(obj) {
                        out.push(LocalizableNode {
                            identifier: join(segments, &format!("{key}#{idx}")),
                            pointer: item_pointer,
                            field: key.clone(),
                        });
                        continue;
                    }
                    segments.push(item_segment(key, idx, obj));
                    walk_object(obj, segments, &item_pointer, out);
                    segments.pop();
                }
            }
            _ => {}
        }
    }
}

fn item_segment(parent_key: &str, idx: usize, item: &Map<String, Value>) -> String {
    match parent_key {
        "pages" => name_segment(item, &["name"]).unwrap_or_else(|| UNNAMED.to_string()),
        "elements" | "questions" | "templateElements" => format!(
            "q.{}",
            name_segment(item, &["name"]).unwrap_or_else(|| UNNAMED.to_string())
        ),
        "choices" => format!("choice.{}", positional(item, idx)),
        "rows" => format!("row.{}", positional(item, idx)),
        "columns" => format!("col.{}", positional(item, idx)),
        _ => format!("{parent_key}#{idx}"),
    }
}

fn positional(item: &Map<String, Value>, idx: usize) -> String {
    name_segment(item, &["value", "name"]).unwrap_or_else(|| format!("#{idx}"))
}

fn name_segment(item: &Map<String, Value>, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .find_map(|f| item.get(*f).and_then(scalar_text))
        .map(|name| slug_or_unnamed(&name))
}

fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn join(segments: &[String], leaf: &str) -> String {
    if segments.is_empty() {
        return leaf.to_string();
    }
    let mut id = segments.join(".");
    id.push('.');
    id.push_str(leaf);
    id
}

fn escape_pointer(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn survey() -> Value {
        json!({
            "title": {"default": "School survey"},
            "pages": [
                {"name": "intro", "elements": [
                    {"type": "html", "name": "welcome", "html": {"default": "<h3>Hi</h3>"}}
                ]},
                {"name": "School Page Slug", "elements": [
                    {"type": "text", "name": "age", "title": {"default": "Age"}},
                    {"type": "panel", "name": "p1", "elements": [
                        {"type": "boolean", "name": "Likes/Math", "title": {"default": "Math?"}}
                    ]},
                    {"type": "radiogroup", "name": "SchoolFun",
                     "title": {"default": "Is school fun?"},
                     "choices": [
                        {"value": "Yes", "text": {"default": "Yes"}},
                        {"value": 2, "text": {"default": "Two"}},
                        {"text": {"default": "Unnamed"}},
                        "plain"
                     ]},
                    {"type": "matrix", "name": "¿?",
                     "rows": [{"value": "r1", "text": {"default": "Row"}}],
                     "columns": [{"name": "c1", "title": {"default": "Col"}}]}
                ]},
                {"elements": [
                    {"name": "x", "title": {"en": "X"}},
                    {"type": "text", "title": {"en": "No name"}}
                ]}
            ]
        })
    }

    #[test]
    fn builds_identifiers_from_structure() {
        let ids: Vec<String> = collect_localizable(&survey())
            .into_iter()
            .map(|n| n.identifier)
            .collect();
        assert_eq!(
            ids,
            vec![
                "title",
                "intro.q.welcome.html",
                "school_page_slug.q.age.title",
                "school_page_slug.q.p1.q.likes_math.title",
                "school_page_slug.q.schoolfun.title",
                "school_page_slug.q.schoolfun.choice.yes.text",
                "school_page_slug.q.schoolfun.choice.2.text",
                "school_page_slug.q.schoolfun.choice.#2.text",
                "school_page_slug.q.unnamed.row.r1.text",
                "school_page_slug.q.unnamed.col.c1.title",
                "unnamed.q.x.title",
                "unnamed.q.unnamed.title",
            ]
        );
    }

    #[test]
    fn identifiers_are_deterministic() {
        let doc = survey();
        assert_eq!(collect_localizable(&doc), collect_localizable(&doc));
    }

    #[test]
    fn pointers_resolve_and_escape() {
        let doc = json!({"a/b": {"c~d": {"default": "x"}}});
        let nodes = collect_localizable(&doc);
        assert_eq!(nodes[0].pointer, "/a~1b/c~0d");
        assert_eq!(nodes[0].identifier, "a/b.c~d");
        assert!(doc.pointer(&nodes[0].pointer).is_some());
    }

    #[test]
    fn mutable_visit_edits_in_place() {
        let mut doc = survey();
        visit_localizable_mut(&mut doc, |node, map| {
            if node.identifier == "school_page_slug.q.age.title" {
                map.insert("fr".into(), Value::String("Âge".into()));
            }
        });
        assert_eq!(
            doc.pointer("/pages/1/elements/0/title/fr"),
            Some(&json!("Âge"))
        );
    }
}
