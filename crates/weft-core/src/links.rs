//! Link extraction from content bodies and structured declarations.
//!
//! Pure transforms: nothing here touches the store or resolves raw target
//! text to an id.

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static WIKILINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[([^\[\]|]+?)(?:\|([^\[\]]*?))?\]\]")
        .unwrap_or_else(|err| panic!("wikilink regex: {err}"))
});

/// An inline `[[Target]]` or `[[Target|Display]]` reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineRef {
    pub target: String,
    pub display: Option<String>,
}

/// A declared link: target id plus edge type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LinkDeclaration {
    pub target_id: String,
    pub edge_type: String,
}

/// Capture inline references in document order.
///
/// Targets and display texts are trimmed; empty targets are skipped and an
/// empty display text is treated as absent.
#[must_use]
pub fn extract_inline_refs(body: &str) -> Vec<InlineRef> {
    WIKILINK
        .captures_iter(body)
        .filter_map(|caps| {
            let target = caps.get(1)?.as_str().trim();
            if target.is_empty() {
                return None;
            }
            let display = caps
                .get(2)
                .map(|m| m.as_str().trim())
                .filter(|d| !d.is_empty())
                .map(str::to_string);
            Some(InlineRef {
                target: target.to_string(),
                display,
            })
        })
        .collect()
}

/// Flatten `edge type → [target ids]` into `(target, type)` pairs.
///
/// Edge types are visited in sorted order, targets in declaration order.
/// Blank entries and repeated `(target, type)` pairs are dropped.
#[must_use]
pub fn flatten_declarations(declarations: &BTreeMap<String, Vec<String>>) -> Vec<LinkDeclaration> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for (edge_type, targets) in declarations {
        let edge_type = edge_type.trim();
        if edge_type.is_empty() {
            continue;
        }
        for target in targets {
            let target = target.trim();
            if target.is_empty() {
                continue;
            }
            let decl = LinkDeclaration {
                target_id: target.to_string(),
                edge_type: edge_type.to_string(),
            };
            if seen.insert(decl.clone()) {
                out.push(decl);
            }
        }
    }
    out
}
