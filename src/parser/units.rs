// SPDX-License-Identifier: MIT OR Apache-2.0

//! Top-level unit detection using tree-sitter node traversal
//!
//! Only direct children of the syntax tree root (and a few transparent
//! wrappers such as decorators, `export`, or C++ namespaces) are considered.
//! Nested methods stay inside their enclosing class unit.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tree_sitter::{Node, Parser};

use crate::parser::languages::LANGUAGES;

/// Kind of a detected unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitKind {
    Function,
    Class,
}

impl std::fmt::Display for UnitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnitKind::Function => write!(f, "function"),
            UnitKind::Class => write!(f, "class"),
        }
    }
}

/// A top-level function or class-like definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub name: String,
    pub kind: UnitKind,
    /// First line (1-indexed)
    pub start_line: usize,
    /// Last line (1-indexed, inclusive)
    pub end_line: usize,
}

/// Finds top-level units in source code
pub struct UnitExtractor;

impl Default for UnitExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract top-level units, ordered by position
    pub fn extract(&self, source: &str, path: &str, language: &str) -> Result<Vec<Unit>> {
        let lang = LANGUAGES
            .for_file(path, language)
            .ok_or_else(|| anyhow::anyhow!("Unsupported language: {}", language))?;

        let mut parser = Parser::new();
        parser.set_language(lang)?;

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| anyhow::anyhow!("Failed to parse source"))?;

        let mut units = Vec::new();
        self.collect_top_level(tree.root_node(), source.as_bytes(), language, &mut units);
        units.sort_by_key(|u| u.start_line);

        Ok(units)
    }

    fn collect_top_level(&self, parent: Node, source: &[u8], lang: &str, units: &mut Vec<Unit>) {
        let mut cursor = parent.walk();
        for child in parent.named_children(&mut cursor) {
            // C++ namespaces only scope their members
            if lang == "cpp" && child.kind() == "namespace_definition" {
                if let Some(body) = child.child_by_field_name("body") {
                    self.collect_top_level(body, source, lang, units);
                }
                continue;
            }

            if let Some(unit) = self.unit_from_node(child, source, lang) {
                units.push(unit);
            }
        }
    }

    /// Build a unit from a top-level node; the wrapper's span is kept when
    /// the definition sits inside a decorator or export.
    fn unit_from_node(&self, node: Node, source: &[u8], lang: &str) -> Option<Unit> {
        let inner = match (lang, node.kind()) {
            ("python", "decorated_definition") => node.child_by_field_name("definition")?,
            ("javascript" | "typescript", "export_statement") => {
                node.child_by_field_name("declaration")?
            }
            ("cpp", "template_declaration") => {
                let mut cursor = node.walk();
                let found = node
                    .named_children(&mut cursor)
                    .find(|c| matches!(c.kind(), "function_definition" | "class_specifier" | "struct_specifier"));
                found?
            }
            _ => node,
        };

        let (kind, name) = match lang {
            "python" => self.match_python(inner, source)?,
            "javascript" | "typescript" => self.match_ecmascript(inner, source)?,
            "rust" => self.match_rust(inner, source)?,
            "go" => self.match_go(inner, source)?,
            "c" | "cpp" => self.match_c_family(inner, source)?,
            "java" => self.match_java(inner, source)?,
            "ruby" => self.match_ruby(inner, source)?,
            _ => return None,
        };

        let (start_line, end_line) = line_span(node);
        Some(Unit {
            name,
            kind,
            start_line,
            end_line,
        })
    }

    fn match_python(&self, node: Node, source: &[u8]) -> Option<(UnitKind, String)> {
        let kind = match node.kind() {
            "function_definition" => UnitKind::Function,
            "class_definition" => UnitKind::Class,
            _ => return None,
        };
        Some((kind, field_text(node, "name", source)?))
    }

    fn match_ecmascript(&self, node: Node, source: &[u8]) -> Option<(UnitKind, String)> {
        match node.kind() {
            "function_declaration" | "generator_function_declaration" => {
                Some((UnitKind::Function, field_text(node, "name", source)?))
            }
            "class_declaration"
            | "abstract_class_declaration"
            | "interface_declaration"
            | "enum_declaration" => Some((UnitKind::Class, field_text(node, "name", source)?)),
            // const handler = (req) => { ... }
            "lexical_declaration" | "variable_declaration" => {
                let mut cursor = node.walk();
                let declarator = node
                    .named_children(&mut cursor)
                    .find(|c| c.kind() == "variable_declarator")?;
                let value = declarator.child_by_field_name("value")?;
                if matches!(
                    value.kind(),
                    "arrow_function" | "function_expression" | "function" | "generator_function"
                ) {
                    Some((UnitKind::Function, field_text(declarator, "name", source)?))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    fn match_rust(&self, node: Node, source: &[u8]) -> Option<(UnitKind, String)> {
        match node.kind() {
            "function_item" => Some((UnitKind::Function, field_text(node, "name", source)?)),
            "struct_item" | "enum_item" | "union_item" | "trait_item" => {
                Some((UnitKind::Class, field_text(node, "name", source)?))
            }
            "impl_item" => Some((UnitKind::Class, field_text(node, "type", source)?)),
            // `mod foo;` declarations have no body and are left to block chunks
            "mod_item" if node.child_by_field_name("body").is_some() => {
                Some((UnitKind::Class, field_text(node, "name", source)?))
            }
            _ => None,
        }
    }

    fn match_go(&self, node: Node, source: &[u8]) -> Option<(UnitKind, String)> {
        match node.kind() {
            "function_declaration" | "method_declaration" => {
                Some((UnitKind::Function, field_text(node, "name", source)?))
            }
            "type_declaration" => {
                let mut cursor = node.walk();
                let spec = node
                    .named_children(&mut cursor)
                    .find(|c| c.kind() == "type_spec")?;
                Some((UnitKind::Class, field_text(spec, "name", source)?))
            }
            _ => None,
        }
    }

    fn match_c_family(&self, node: Node, source: &[u8]) -> Option<(UnitKind, String)> {
        match node.kind() {
            "function_definition" => {
                let declarator = node.child_by_field_name("declarator")?;
                Some((UnitKind::Function, declarator_name(declarator, source)?))
            }
            "struct_specifier" | "class_specifier" | "union_specifier" | "enum_specifier"
                if node.child_by_field_name("body").is_some() =>
            {
                Some((UnitKind::Class, field_text(node, "name", source)?))
            }
            // typedef struct { ... } Name;
            "type_definition" => {
                let ty = node.child_by_field_name("type")?;
                if ty.child_by_field_name("body").is_none() {
                    return None;
                }
                let declarator = node.child_by_field_name("declarator")?;
                Some((UnitKind::Class, declarator_name(declarator, source)?))
            }
            // struct Name { ... }; parses as a declaration in some grammars
            "declaration" => {
                let ty = node.child_by_field_name("type")?;
                if matches!(ty.kind(), "struct_specifier" | "class_specifier")
                    && ty.child_by_field_name("body").is_some()
                {
                    Some((UnitKind::Class, field_text(ty, "name", source)?))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    fn match_java(&self, node: Node, source: &[u8]) -> Option<(UnitKind, String)> {
        match node.kind() {
            "class_declaration"
            | "interface_declaration"
            | "enum_declaration"
            | "record_declaration"
            | "annotation_type_declaration" => {
                Some((UnitKind::Class, field_text(node, "name", source)?))
            }
            _ => None,
        }
    }

    fn match_ruby(&self, node: Node, source: &[u8]) -> Option<(UnitKind, String)> {
        match node.kind() {
            "method" | "singleton_method" => {
                Some((UnitKind::Function, field_text(node, "name", source)?))
            }
            "class" | "module" => Some((UnitKind::Class, field_text(node, "name", source)?)),
            _ => None,
        }
    }
}

/// 1-indexed inclusive line span of a node
fn line_span(node: Node) -> (usize, usize) {
    let start = node.start_position();
    let end = node.end_position();
    let start_line = start.row + 1;
    // A node ending at column 0 stops on the previous line
    let end_line = if end.column == 0 && end.row > start.row {
        end.row
    } else {
        end.row + 1
    };
    (start_line, end_line.max(start_line))
}

fn field_text(node: Node, field: &str, source: &[u8]) -> Option<String> {
    let child = node.child_by_field_name(field)?;
    let text = child.utf8_text(source).ok()?;
    let first_line = text.lines().next().unwrap_or("").trim();
    if first_line.is_empty() {
        None
    } else {
        Some(first_line.to_string())
    }
}

/// Follow C/C++ declarator chains (`*name(...)`, `ns::name(...)`) to the name
fn declarator_name(mut node: Node, source: &[u8]) -> Option<String> {
    loop {
        match node.kind() {
            "identifier" | "field_identifier" | "qualified_identifier" | "operator_name"
            | "destructor_name" | "type_identifier" => {
                return node.utf8_text(source).ok().map(|s| s.to_string());
            }
            _ => node = node.child_by_field_name("declarator")?,
        }
    }
}
