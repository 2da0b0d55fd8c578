//! document::markup
//!
//! The markup document strategy.
//!
//! Recognizes `<script src>` and `<link rel="stylesheet" href>` tags plus
//! the per-reference override attributes `data-im-algorithms`,
//! `data-im-cdn` and `data-im-global` (whose presence also requests a
//! local-copy fallback snippet).
//!
//! # Span splicing
//!
//! Rather than round-tripping a parse tree, the strategy records the byte
//! span of every reference tag and rewrites the document by splicing
//! rebuilt tags into the original text. Untouched tags - and untouched
//! documents - serialize byte-identically, so a document with nothing left
//! to reconcile is a fixed point. Script element bodies are skipped during
//! scanning, so markup embedded in string literals (such as a previously
//! inserted fallback snippet) is never picked up as a reference.

use std::sync::OnceLock;

use regex::Regex;

use super::{DocumentError, DocumentStrategy, Reference, ReferenceUpdate, SerializeOptions};
use crate::core::types::ReferenceKind;

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<(script|link)\b[^>]*>").expect("tag pattern is valid"))
}

fn script_close_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)</script\s*>").expect("close pattern is valid"))
}

fn attr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"([A-Za-z_][A-Za-z0-9_:.-]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#)
            .expect("attribute pattern is valid")
    })
}

#[derive(Debug, Clone)]
struct Attr {
    name: String,
    value: Option<String>,
}

#[derive(Debug)]
struct Slot {
    kind: ReferenceKind,
    /// The tag token as written (`script`, `LINK`, ...).
    tag_token: String,
    tag_start: usize,
    tag_end: usize,
    /// End of the element (after `</script>` for scripts).
    elem_end: usize,
    attrs: Vec<Attr>,
    self_closing: bool,
    dirty: bool,
    insert_after: Option<String>,
}

impl Slot {
    fn attr(&self, name: &str) -> Option<&Attr> {
        self.attrs
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    fn attr_value(&self, name: &str) -> Option<&str> {
        self.attr(name).and_then(|a| a.value.as_deref())
    }

    fn set_attr(&mut self, name: &str, value: &str) {
        if let Some(attr) = self
            .attrs
            .iter_mut()
            .find(|a| a.name.eq_ignore_ascii_case(name))
        {
            attr.value = Some(value.to_string());
        } else {
            self.attrs.push(Attr {
                name: name.to_string(),
                value: Some(value.to_string()),
            });
        }
    }

    fn remove_attr(&mut self, name: &str) {
        self.attrs.retain(|a| !a.name.eq_ignore_ascii_case(name));
    }

    fn rebuild(&self) -> String {
        let mut out = format!("<{}", self.tag_token);
        for attr in &self.attrs {
            out.push(' ');
            out.push_str(&attr.name);
            if let Some(value) = &attr.value {
                out.push_str("=\"");
                out.push_str(&value.replace('"', "&quot;"));
                out.push('"');
            }
        }
        if self.self_closing {
            out.push_str(" />");
        } else {
            out.push('>');
        }
        out
    }
}

/// Markup document strategy over raw tag spans.
#[derive(Debug, Default)]
pub struct MarkupStrategy {
    contents: String,
    slots: Vec<Slot>,
}

impl MarkupStrategy {
    pub fn new() -> Self {
        Self::default()
    }
}

fn parse_attrs(inner: &str) -> (Vec<Attr>, bool) {
    let trimmed = inner.trim_end();
    let self_closing = trimmed.ends_with('/');
    let inner = if self_closing {
        &trimmed[..trimmed.len() - 1]
    } else {
        inner
    };

    let attrs = attr_regex()
        .captures_iter(inner)
        .map(|caps| Attr {
            name: caps[1].to_string(),
            value: caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| m.as_str().to_string()),
        })
        .collect();
    (attrs, self_closing)
}

fn fallback_snippet(kind: ReferenceKind, local_path: &str, global_check: &str) -> String {
    let sync_element = match kind {
        ReferenceKind::Stylesheet => {
            format!("<link rel=\"stylesheet\" href=\"{local_path}\" />")
        }
        // The escaped `\u003C` keeps the written closing tag inert.
        ReferenceKind::Script => format!("<script src=\"{local_path}\">\\u003C/script>"),
    };
    format!(
        "\n<script>\n'use strict';\n{global_check} || document.write(\n  '{sync_element}'\n);\n</script>"
    )
}

impl DocumentStrategy for MarkupStrategy {
    fn extract_references(&mut self, contents: &str) -> Result<Vec<Reference>, DocumentError> {
        self.contents = contents.to_string();
        self.slots.clear();

        let mut references = Vec::new();
        let mut pos = 0;
        while let Some(caps) = tag_regex().captures_at(&self.contents, pos) {
            let whole = caps.get(0).ok_or_else(|| {
                DocumentError::Parse("tag match without a span".to_string())
            })?;
            let tag_token = caps[1].to_string();
            let is_script = tag_token.eq_ignore_ascii_case("script");

            let inner = &self.contents[whole.start() + 1 + tag_token.len()..whole.end() - 1];
            let (attrs, self_closing) = parse_attrs(inner);

            let elem_end = if is_script {
                script_close_regex()
                    .find_at(&self.contents, whole.end())
                    .map(|m| m.end())
                    .unwrap_or_else(|| whole.end())
            } else {
                whole.end()
            };
            pos = elem_end;

            let slot = Slot {
                kind: if is_script {
                    ReferenceKind::Script
                } else {
                    ReferenceKind::Stylesheet
                },
                tag_token,
                tag_start: whole.start(),
                tag_end: whole.end(),
                elem_end,
                attrs,
                self_closing,
                dirty: false,
                insert_after: None,
            };

            let qualifies = match slot.kind {
                ReferenceKind::Script => slot.attr_value("src").is_some(),
                ReferenceKind::Stylesheet => {
                    slot.attr_value("href").is_some()
                        && slot
                            .attr_value("rel")
                            .is_some_and(|rel| rel.eq_ignore_ascii_case("stylesheet"))
                }
            };
            if !qualifies {
                continue;
            }

            let location = match slot.kind {
                ReferenceKind::Script => slot.attr_value("src"),
                ReferenceKind::Stylesheet => slot.attr_value("href"),
            }
            .unwrap_or_default()
            .to_string();

            let global_attr = slot.attr("data-im-global");
            references.push(Reference {
                index: self.slots.len(),
                kind: slot.kind,
                location,
                integrity: slot.attr_value("integrity").map(String::from),
                algorithms: slot
                    .attr_value("data-im-algorithms")
                    .map(|v| v.split_whitespace().map(String::from).collect())
                    .unwrap_or_default(),
                cdn: slot.attr_value("data-im-cdn").map(String::from),
                crossorigin: None,
                fallback: global_attr.is_some(),
                global_check: global_attr.and_then(|a| a.value.clone()),
            });
            self.slots.push(slot);
        }

        Ok(references)
    }

    fn apply_update(
        &mut self,
        reference: &Reference,
        update: &ReferenceUpdate,
    ) -> Result<(), DocumentError> {
        let slot = self
            .slots
            .get_mut(reference.index)
            .ok_or(DocumentError::UnknownReference(reference.index))?;

        slot.remove_attr("data-im-cdn");
        slot.remove_attr("data-im-global");
        slot.remove_attr("data-im-algorithms");

        match slot.kind {
            ReferenceKind::Script => slot.set_attr("src", &update.new_location),
            ReferenceKind::Stylesheet => slot.set_attr("href", &update.new_location),
        }

        match &update.new_integrity {
            Some(value) if !(update.local_mode && update.omit_local_integrity) => {
                slot.set_attr("integrity", value);
            }
            _ => slot.remove_attr("integrity"),
        }

        if let Some(value) = &update.add_crossorigin {
            if slot.attr("integrity").is_some() {
                slot.set_attr("crossorigin", value);
            }
        }

        if update.fallback {
            if let (Some(path), Some(expr)) = (&update.local_path, &update.global_check) {
                slot.insert_after = Some(fallback_snippet(slot.kind, path, expr));
            }
        }

        slot.dirty = true;
        Ok(())
    }

    fn serialize(&self, options: &SerializeOptions) -> Result<String, DocumentError> {
        let mut out = String::with_capacity(self.contents.len() + 256);
        if let Some(disclaimer) = &options.disclaimer {
            out.push_str("<!--");
            out.push_str(&disclaimer.replace("--", "&hyphen;-"));
            out.push_str("-->\n");
        }

        let mut cursor = 0;
        for slot in &self.slots {
            if !slot.dirty && slot.insert_after.is_none() {
                continue;
            }
            out.push_str(&self.contents[cursor..slot.tag_start]);
            if slot.dirty {
                out.push_str(&slot.rebuild());
            } else {
                out.push_str(&self.contents[slot.tag_start..slot.tag_end]);
            }
            out.push_str(&self.contents[slot.tag_end..slot.elem_end]);
            if let Some(snippet) = &slot.insert_after {
                out.push_str(snippet);
            }
            cursor = slot.elem_end;
        }
        out.push_str(&self.contents[cursor..]);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = concat!(
        "<!DOCTYPE html>\n<html>\n<head>\n",
        "<link rel=\"stylesheet\" href=\"https://unpkg.com/leaflet@1.7.1/dist/leaflet.css\" ",
        "integrity=\"sha512-xodZ\" crossorigin=\"\" />\n",
        "<script src=\"https://code.jquery.com/jquery-3.5.1.min.js\" ",
        "integrity=\"sha256-9/aliU\" data-im-global=\"window.jQuery\"></script>\n",
        "<script>var inline = true;</script>\n",
        "</head>\n<body></body>\n</html>\n"
    );

    fn update(location: &str) -> ReferenceUpdate {
        ReferenceUpdate {
            new_location: location.to_string(),
            local_path: None,
            new_integrity: None,
            add_crossorigin: None,
            fallback: false,
            global_check: None,
            local_mode: false,
            omit_local_integrity: false,
        }
    }

    #[test]
    fn extracts_scripts_and_stylesheets_in_order() {
        let mut strategy = MarkupStrategy::new();
        let refs = strategy.extract_references(DOC).unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].kind, ReferenceKind::Stylesheet);
        assert!(refs[0].location.contains("leaflet.css"));
        assert_eq!(refs[0].integrity.as_deref(), Some("sha512-xodZ"));
        assert_eq!(refs[1].kind, ReferenceKind::Script);
        assert!(refs[1].fallback);
        assert_eq!(refs[1].global_check.as_deref(), Some("window.jQuery"));
    }

    #[test]
    fn inline_scripts_are_not_references() {
        let mut strategy = MarkupStrategy::new();
        let refs = strategy.extract_references(DOC).unwrap();
        assert!(refs.iter().all(|r| !r.location.is_empty()));
    }

    #[test]
    fn untouched_document_serializes_byte_identically() {
        let mut strategy = MarkupStrategy::new();
        strategy.extract_references(DOC).unwrap();
        let out = strategy.serialize(&SerializeOptions::default()).unwrap();
        assert_eq!(out, DOC);
    }

    #[test]
    fn update_rewrites_location_and_integrity() {
        let mut strategy = MarkupStrategy::new();
        let refs = strategy.extract_references(DOC).unwrap();

        let mut upd = update("https://unpkg.com/leaflet@1.7.1/dist/leaflet.css");
        upd.new_integrity = Some("sha512-fresh".to_string());
        strategy.apply_update(&refs[0], &upd).unwrap();

        let out = strategy.serialize(&SerializeOptions::default()).unwrap();
        assert!(out.contains("integrity=\"sha512-fresh\""));
        // The untouched script tag is preserved verbatim.
        assert!(out.contains("data-im-global=\"window.jQuery\""));
    }

    #[test]
    fn update_removes_override_attributes() {
        let mut strategy = MarkupStrategy::new();
        let refs = strategy.extract_references(DOC).unwrap();
        strategy
            .apply_update(&refs[1], &update("https://code.jquery.com/jquery-3.5.1.min.js"))
            .unwrap();
        let out = strategy.serialize(&SerializeOptions::default()).unwrap();
        assert!(!out.contains("data-im-global"));
    }

    #[test]
    fn integrity_removed_when_none_survives() {
        let mut strategy = MarkupStrategy::new();
        let refs = strategy.extract_references(DOC).unwrap();
        strategy.apply_update(&refs[0], &update("x.css")).unwrap();
        let out = strategy.serialize(&SerializeOptions::default()).unwrap();
        assert!(!out.contains("sha512-xodZ"));
    }

    #[test]
    fn local_mode_omits_integrity_when_requested() {
        let mut strategy = MarkupStrategy::new();
        let refs = strategy.extract_references(DOC).unwrap();
        let mut upd = update("node_modules/leaflet/dist/leaflet.css");
        upd.new_integrity = Some("sha512-fresh".to_string());
        upd.local_mode = true;
        upd.omit_local_integrity = true;
        strategy.apply_update(&refs[0], &upd).unwrap();
        let out = strategy.serialize(&SerializeOptions::default()).unwrap();
        assert!(!out.contains("integrity"));
    }

    #[test]
    fn crossorigin_set_only_with_integrity() {
        let mut strategy = MarkupStrategy::new();
        let refs = strategy.extract_references(DOC).unwrap();

        let mut with_integrity = update("a.js");
        with_integrity.new_integrity = Some("sha256-x".to_string());
        with_integrity.add_crossorigin = Some("anonymous".to_string());
        strategy.apply_update(&refs[1], &with_integrity).unwrap();

        let mut without_integrity = update("b.css");
        without_integrity.add_crossorigin = Some("anonymous".to_string());
        strategy.apply_update(&refs[0], &without_integrity).unwrap();

        let out = strategy.serialize(&SerializeOptions::default()).unwrap();
        assert!(out.contains("src=\"a.js\" integrity=\"sha256-x\" crossorigin=\"anonymous\""));
        assert!(!out.contains("href=\"b.css\" integrity"));
    }

    #[test]
    fn fallback_snippet_inserted_after_script_element() {
        let mut strategy = MarkupStrategy::new();
        let refs = strategy.extract_references(DOC).unwrap();
        let mut upd = update("https://code.jquery.com/jquery-3.5.1.min.js");
        upd.fallback = true;
        upd.local_path = Some("node_modules/jquery/dist/jquery.min.js".to_string());
        upd.global_check = Some("window.jQuery".to_string());
        strategy.apply_update(&refs[1], &upd).unwrap();

        let out = strategy.serialize(&SerializeOptions::default()).unwrap();
        assert!(out.contains("window.jQuery || document.write"));
        assert!(out.contains("node_modules/jquery/dist/jquery.min.js"));
        assert!(out.contains("\\u003C/script>"));
    }

    #[test]
    fn previously_inserted_fallback_is_not_rediscovered() {
        let mut strategy = MarkupStrategy::new();
        let refs = strategy.extract_references(DOC).unwrap();
        let mut upd = update("https://code.jquery.com/jquery-3.5.1.min.js");
        upd.fallback = true;
        upd.local_path = Some("node_modules/jquery/dist/jquery.min.js".to_string());
        upd.global_check = Some("window.jQuery".to_string());
        strategy.apply_update(&refs[1], &upd).unwrap();
        let rewritten = strategy.serialize(&SerializeOptions::default()).unwrap();

        // A second pass sees the same two references; the document.write
        // string inside the inserted snippet is not a reference.
        let mut second = MarkupStrategy::new();
        let refs = second.extract_references(&rewritten).unwrap();
        assert_eq!(refs.len(), 2);
    }

    #[test]
    fn disclaimer_prepended_and_escaped() {
        let mut strategy = MarkupStrategy::new();
        strategy.extract_references(DOC).unwrap();
        let out = strategy
            .serialize(&SerializeOptions {
                json_space: None,
                disclaimer: Some("auto-generated -- do not edit".to_string()),
            })
            .unwrap();
        assert!(out.starts_with("<!--auto-generated &hyphen;- do not edit-->\n"));
    }

    #[test]
    fn single_quoted_and_unquoted_attributes_parse() {
        let doc = "<script src='a.js' defer></script><script src=b.js></script>";
        let mut strategy = MarkupStrategy::new();
        let refs = strategy.extract_references(doc).unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].location, "a.js");
        assert_eq!(refs[1].location, "b.js");
    }

    #[test]
    fn non_stylesheet_links_ignored() {
        let doc = "<link rel=\"icon\" href=\"favicon.ico\" />";
        let mut strategy = MarkupStrategy::new();
        assert!(strategy.extract_references(doc).unwrap().is_empty());
    }
}
