//! document::record
//!
//! The structured-record document strategy: a JSON object with `script` and
//! `link` sections, each keyed by logical package name. Entries carry
//! `local`, `remote`, `integrity`, `crossorigin`, `algorithms`, `cdn`,
//! `fallback` and `global` fields.
//!
//! Unlike markup, both the remote and local forms live side by side in a
//! record document: updates always refresh `local`, and `remote` is only
//! rewritten outside local-only mode - consumers wanting the local copy
//! read the `local` field directly.

use serde::Serialize as _;
use serde_json::{json, Value};

use super::{DocumentError, DocumentStrategy, Reference, ReferenceUpdate, SerializeOptions};
use crate::core::types::ReferenceKind;

/// Record document strategy over a parsed JSON value.
#[derive(Debug, Default)]
pub struct RecordStrategy {
    doc: Value,
    /// (section, key) per reference index.
    entries: Vec<(String, String)>,
}

impl RecordStrategy {
    pub fn new() -> Self {
        Self {
            doc: Value::Null,
            entries: Vec::new(),
        }
    }
}

fn str_field(info: &Value, field: &str) -> Option<String> {
    info.get(field).and_then(Value::as_str).map(String::from)
}

impl DocumentStrategy for RecordStrategy {
    fn extract_references(&mut self, contents: &str) -> Result<Vec<Reference>, DocumentError> {
        self.doc =
            serde_json::from_str(contents).map_err(|e| DocumentError::Parse(e.to_string()))?;
        self.entries.clear();

        let mut references = Vec::new();
        for (section, kind) in [
            ("script", ReferenceKind::Script),
            ("link", ReferenceKind::Stylesheet),
        ] {
            let Some(object) = self.doc.get(section).and_then(Value::as_object) else {
                continue;
            };
            for (key, info) in object {
                let location = str_field(info, "remote")
                    .or_else(|| str_field(info, "local"))
                    .ok_or_else(|| {
                        DocumentError::Parse(format!(
                            "entry \"{key}\" in `{section}` has neither `remote` nor `local`"
                        ))
                    })?;
                references.push(Reference {
                    index: self.entries.len(),
                    kind,
                    location,
                    integrity: str_field(info, "integrity"),
                    algorithms: info
                        .get("algorithms")
                        .and_then(Value::as_array)
                        .map(|list| {
                            list.iter()
                                .filter_map(Value::as_str)
                                .map(String::from)
                                .collect()
                        })
                        .unwrap_or_default(),
                    cdn: str_field(info, "cdn"),
                    crossorigin: str_field(info, "crossorigin"),
                    fallback: info
                        .get("fallback")
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                    global_check: str_field(info, "global"),
                });
                self.entries.push((section.to_string(), key.clone()));
            }
        }

        Ok(references)
    }

    fn apply_update(
        &mut self,
        reference: &Reference,
        update: &ReferenceUpdate,
    ) -> Result<(), DocumentError> {
        let (section, key) = self
            .entries
            .get(reference.index)
            .cloned()
            .ok_or(DocumentError::UnknownReference(reference.index))?;
        let entry = self
            .doc
            .get_mut(&section)
            .and_then(|s| s.get_mut(&key))
            .and_then(Value::as_object_mut)
            .ok_or(DocumentError::UnknownReference(reference.index))?;

        if let Some(path) = &update.local_path {
            entry.insert("local".to_string(), json!(path));
        }
        if !update.local_mode {
            entry.insert("remote".to_string(), json!(update.new_location));
        }
        // Crossorigin keys off the entry's pre-update integrity presence.
        if let Some(value) = &update.add_crossorigin {
            if entry.contains_key("integrity") {
                entry.insert("crossorigin".to_string(), json!(value));
            }
        }
        if let Some(integrity) = &update.new_integrity {
            entry.insert("integrity".to_string(), json!(integrity));
        }
        if update.fallback {
            entry.insert("fallback".to_string(), json!(true));
        }
        if let Some(expression) = &update.global_check {
            entry.insert("global".to_string(), json!(expression));
        }

        Ok(())
    }

    fn serialize(&self, options: &SerializeOptions) -> Result<String, DocumentError> {
        let space = options.json_space.unwrap_or(2);
        let mut text = if space == 0 {
            serde_json::to_string(&self.doc).map_err(|e| DocumentError::Serialize(e.to_string()))?
        } else {
            let indent = " ".repeat(space);
            let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
            let mut buf = Vec::new();
            let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
            self.doc
                .serialize(&mut serializer)
                .map_err(|e| DocumentError::Serialize(e.to_string()))?;
            String::from_utf8(buf).map_err(|e| DocumentError::Serialize(e.to_string()))?
        };
        text.push('\n');
        Ok(text)
    }
}
