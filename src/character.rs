//! elizaOS character file updates.
//!
//! The file is treated as an open JSON document: only `bio`, `adjectives`
//! and `style.all` are touched, every other field (and the key order) is
//! written back as it was read.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::error::{PollError, Result};
use crate::interpreter::PersonalityUpdate;

/// Read and parse a character file. The top level must be a JSON object.
pub fn load_character(path: &Path) -> Result<Value> {
    let read_err = |reason: String| PollError::ConfigRead {
        path: path.to_path_buf(),
        reason,
    };

    let raw = fs::read_to_string(path).map_err(|e| read_err(e.to_string()))?;
    let document: Value = serde_json::from_str(&raw).map_err(|e| read_err(e.to_string()))?;
    if !document.is_object() {
        return Err(read_err("top-level value is not a JSON object".to_string()));
    }
    Ok(document)
}

/// Merge an update into a character document in memory.
///
/// `bio` gains the new entry at the end, `adjectives` and `style.all` are
/// replaced. A string `bio` is kept as the first entry of the new list; a
/// `bio` or `style` of any other unexpected shape is rejected rather than
/// dropped.
pub fn apply_update_to_document(
    document: &mut Value,
    update: &PersonalityUpdate,
    path: &Path,
) -> Result<()> {
    let invalid = |field: &'static str, reason: &str| PollError::InvalidCharacter {
        path: path.to_path_buf(),
        field,
        reason: reason.to_string(),
    };

    let character = document
        .as_object_mut()
        .ok_or_else(|| PollError::ConfigRead {
            path: path.to_path_buf(),
            reason: "top-level value is not a JSON object".to_string(),
        })?;

    // Check shapes first so a rejected document is left exactly as it was.
    match character.get("bio") {
        None | Some(Value::Null) | Some(Value::Array(_)) | Some(Value::String(_)) => {}
        Some(other) => {
            let reason = format!("expected a list of strings, found {}", kind(other));
            return Err(invalid("bio", &reason));
        }
    }
    if let Some(style) = character.get("style") {
        if is_truthy(style) && !style.is_object() {
            let reason = format!("expected an object, found {}", kind(style));
            return Err(invalid("style", &reason));
        }
    }

    let bio = character.entry("bio").or_insert(Value::Null);
    if let Value::String(text) = &mut *bio {
        warn!(path = %path.display(), "Character bio is a string; converting it to a list");
        let text = std::mem::take(text);
        *bio = Value::Array(vec![Value::String(text)]);
    }
    if !bio.is_array() {
        *bio = Value::Array(Vec::new());
    }
    if let Value::Array(entries) = bio {
        entries.push(Value::String(update.update_bio.clone()));
    }

    character.insert("adjectives".to_string(), strings(&update.update_adjectives));

    let style = character.entry("style").or_insert(Value::Null);
    if !is_truthy(style) {
        *style = Value::Object(Map::new());
    }
    if let Some(style) = style.as_object_mut() {
        style.insert("all".to_string(), strings(&update.update_style_all));
    }

    Ok(())
}

/// Serialize with 4-space indentation, the layout elizaOS character files use.
pub fn to_pretty_json(document: &Value) -> std::result::Result<String, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    document.serialize(&mut ser)?;
    // serde_json only ever emits UTF-8.
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Serialize a merged character for writing, failing as a write error.
pub fn render_character(document: &Value, path: &Path) -> Result<String> {
    to_pretty_json(document).map_err(|e| PollError::ConfigWrite {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Replace the file behind `path` with `contents` via a sibling temp file
/// and a rename, so readers never see a half-written character.
///
/// Symlinks are followed: the file they point to is replaced and the link
/// stays. A read-only target is refused.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let write_err = |reason: String| PollError::ConfigWrite {
        path: path.to_path_buf(),
        reason,
    };

    let target = match fs::canonicalize(path) {
        Ok(resolved) => resolved,
        Err(e) if e.kind() == ErrorKind::NotFound => path.to_path_buf(),
        Err(e) => return Err(write_err(e.to_string())),
    };
    let existing = fs::metadata(&target).ok();
    if existing.as_ref().is_some_and(|meta| meta.permissions().readonly()) {
        return Err(write_err("file is read-only".to_string()));
    }

    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| write_err(e.to_string()))?;
    tmp.write_all(contents.as_bytes())
        .map_err(|e| write_err(e.to_string()))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| write_err(e.to_string()))?;

    // Keep the original file mode; the temp file is created 0600.
    if let Some(meta) = existing {
        if let Err(e) = fs::set_permissions(tmp.path(), meta.permissions()) {
            warn!(path = %target.display(), error = %e, "Could not carry file permissions over to the rewritten character");
        }
    }

    tmp.persist(&target).map_err(|e| write_err(e.error.to_string()))?;
    Ok(())
}

/// Load the character at `path`, merge `update` into it, and write it back.
pub fn apply_update(update: &PersonalityUpdate, path: &Path) -> Result<()> {
    let mut document = load_character(path)?;
    apply_update_to_document(&mut document, update, path)?;

    let contents = render_character(&document, path)?;
    write_atomic(path, &contents)?;

    info!(path = %path.display(), "Character configuration updated from poll results");
    Ok(())
}

fn strings(items: &[String]) -> Value {
    Value::Array(items.iter().cloned().map(Value::String).collect())
}

/// JavaScript-style truthiness: null, false, 0 and "" are falsy.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn update() -> PersonalityUpdate {
        PersonalityUpdate {
            update_bio: "B".to_string(),
            update_adjectives: vec!["z".to_string()],
            update_style_all: vec!["w".to_string()],
        }
    }

    fn merged(mut doc: Value) -> Result<Value> {
        apply_update_to_document(&mut doc, &update(), Path::new("eliza.character.json"))?;
        Ok(doc)
    }

    #[test]
    fn merges_the_three_fields() {
        let doc = merged(json!({"bio":["A"],"adjectives":["x"],"style":{"all":["y"]}})).unwrap();
        assert_eq!(
            doc,
            json!({"bio":["A","B"],"adjectives":["z"],"style":{"all":["w"]}})
        );
    }

    #[test]
    fn keeps_unrelated_fields() {
        let doc = merged(json!({
            "name": "Eliza",
            "bio": ["A"],
            "adjectives": ["x"],
            "style": {"all": ["y"], "chat": ["c"], "post": ["p"]},
            "plugins": ["@elizaos/plugin-twitter"],
            "settings": {"voice": {"model": "en_US-hfc_female-medium"}}
        }))
        .unwrap();
        assert_eq!(doc["name"], "Eliza");
        assert_eq!(doc["plugins"], json!(["@elizaos/plugin-twitter"]));
        assert_eq!(doc["settings"]["voice"]["model"], "en_US-hfc_female-medium");
        assert_eq!(doc["style"], json!({"all": ["w"], "chat": ["c"], "post": ["p"]}));
    }

    #[test]
    fn missing_bio_becomes_single_entry() {
        let doc = merged(json!({"adjectives": []})).unwrap();
        assert_eq!(doc["bio"], json!(["B"]));
        assert_eq!(doc["style"], json!({"all": ["w"]}));
    }

    #[test]
    fn string_bio_is_preserved() {
        let doc = merged(json!({"bio": "An old bio"})).unwrap();
        assert_eq!(doc["bio"], json!(["An old bio", "B"]));
    }

    #[test]
    fn unusable_bio_is_rejected_untouched() {
        let mut doc = json!({"bio": {"text": "nested"}, "adjectives": ["x"]});
        let err = apply_update_to_document(&mut doc, &update(), Path::new("c.json")).unwrap_err();
        assert!(matches!(err, PollError::InvalidCharacter { field: "bio", .. }));
        assert_eq!(doc, json!({"bio": {"text": "nested"}, "adjectives": ["x"]}));
    }

    #[test]
    fn falsy_style_is_replaced() {
        let doc = merged(json!({"bio": [], "style": false})).unwrap();
        assert_eq!(doc["style"], json!({"all": ["w"]}));
    }

    #[test]
    fn non_object_style_is_rejected() {
        let mut doc = json!({"bio": ["A"], "style": "terse"});
        let err = apply_update_to_document(&mut doc, &update(), Path::new("c.json")).unwrap_err();
        assert!(matches!(err, PollError::InvalidCharacter { field: "style", .. }));
        assert_eq!(doc["bio"], json!(["A"]));
    }

    #[test]
    fn writes_four_space_indent_and_keeps_key_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("eliza.character.json");
        fs::write(
            &path,
            r#"{"name":"Eliza","bio":["A"],"lore":["l"],"adjectives":["x"],"style":{"all":["y"]}}"#,
        )
        .unwrap();

        apply_update(&update(), &path).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("{\n    \"name\": \"Eliza\",\n    \"bio\": [\n        \"A\","));
        let keys: Vec<String> = serde_json::from_str::<Value>(&written)
            .unwrap()
            .as_object()
            .unwrap()
            .keys()
            .cloned()
            .collect();
        assert_eq!(keys, vec!["name", "bio", "lore", "adjectives", "style"]);
        // No temp files left behind.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn missing_file_is_read_error() {
        let dir = tempdir().unwrap();
        let err = apply_update(&update(), &dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, PollError::ConfigRead { .. }));
    }

    #[test]
    fn invalid_json_is_read_error_and_file_is_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();

        let err = apply_update(&update(), &path).unwrap_err();
        assert!(matches!(err, PollError::ConfigRead { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[test]
    fn top_level_array_is_read_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("list.json");
        fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(
            apply_update(&update(), &path),
            Err(PollError::ConfigRead { .. })
        ));
    }

    #[test]
    fn write_into_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gone").join("c.json");
        let err = write_atomic(&path, "{}").unwrap_err();
        assert!(matches!(err, PollError::ConfigWrite { .. }));
    }

    #[test]
    fn rendered_preview_matches_written_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("eliza.character.json");
        fs::write(&path, r#"{"bio":["A"],"adjectives":["x"],"style":{"all":["y"]}}"#).unwrap();

        let mut document = load_character(&path).unwrap();
        apply_update_to_document(&mut document, &update(), &path).unwrap();
        let preview = render_character(&document, &path).unwrap();

        apply_update(&update(), &path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), preview);
    }

    #[test]
    fn read_only_file_is_refused() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("locked.json");
        let original = r#"{"bio":["A"]}"#;
        fs::write(&path, original).unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_readonly(true);
        fs::set_permissions(&path, perms).unwrap();

        let err = apply_update(&update(), &path).unwrap_err();
        assert!(matches!(err, PollError::ConfigWrite { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_character_is_written_through() {
        let dir = tempdir().unwrap();
        let real = dir.path().join("real.json");
        let link = dir.path().join("eliza.character.json");
        fs::write(&real, r#"{"bio":["A"],"adjectives":["x"],"style":{"all":["y"]}}"#).unwrap();
        std::os::unix::fs::symlink(&real, &link).unwrap();

        apply_update(&update(), &link).unwrap();

        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        let written: Value = serde_json::from_str(&fs::read_to_string(&real).unwrap()).unwrap();
        assert_eq!(
            written,
            json!({"bio":["A","B"],"adjectives":["z"],"style":{"all":["w"]}})
        );
    }

    #[cfg(unix)]
    #[test]
    fn rewrite_keeps_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("eliza.character.json");
        fs::write(&path, r#"{"bio":[]}"#).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        apply_update(&update(), &path).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }
}
