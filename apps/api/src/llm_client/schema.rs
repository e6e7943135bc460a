//! Output schema descriptor — the one tree both providers are constrained by.
//!
//! `to_native_schema` feeds the schema-native provider's `responseSchema`.
//! `to_prompt_text` renders the same tree as a textual contract for providers
//! that only understand prose. Never hand-write either form elsewhere.

use serde_json::{json, Map, Value};

// Only String is used by the built-in layouts; the rest complete the descriptor.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    String,
    Number,
    Integer,
    Boolean,
}

impl PrimitiveType {
    fn native_name(self) -> &'static str {
        match self {
            PrimitiveType::String => "STRING",
            PrimitiveType::Number => "NUMBER",
            PrimitiveType::Integer => "INTEGER",
            PrimitiveType::Boolean => "BOOLEAN",
        }
    }

    fn prose_name(self) -> &'static str {
        match self {
            PrimitiveType::String => "string",
            PrimitiveType::Number => "number",
            PrimitiveType::Integer => "integer",
            PrimitiveType::Boolean => "boolean",
        }
    }
}

/// A node in the output schema tree.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    Primitive {
        kind: PrimitiveType,
        /// Allowed values. Empty means unconstrained.
        enum_values: Vec<String>,
    },
    Object {
        fields: Vec<Field>,
    },
    Array {
        items: Box<SchemaNode>,
    },
}

/// A named member of an object node.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub node: SchemaNode,
    pub required: bool,
}

impl Field {
    pub fn required(name: impl Into<String>, node: SchemaNode) -> Self {
        Self {
            name: name.into(),
            node,
            required: true,
        }
    }

    #[allow(dead_code)]
    pub fn optional(name: impl Into<String>, node: SchemaNode) -> Self {
        Self {
            name: name.into(),
            node,
            required: false,
        }
    }
}

impl SchemaNode {
    pub fn string() -> Self {
        SchemaNode::Primitive {
            kind: PrimitiveType::String,
            enum_values: Vec::new(),
        }
    }

    #[allow(dead_code)]
    pub fn primitive(kind: PrimitiveType) -> Self {
        SchemaNode::Primitive {
            kind,
            enum_values: Vec::new(),
        }
    }

    pub fn string_enum<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SchemaNode::Primitive {
            kind: PrimitiveType::String,
            enum_values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn object(fields: Vec<Field>) -> Self {
        SchemaNode::Object { fields }
    }

    pub fn array(items: SchemaNode) -> Self {
        SchemaNode::Array {
            items: Box::new(items),
        }
    }

    /// Translates the tree into the schema-native provider's `responseSchema` dialect.
    pub fn to_native_schema(&self) -> Value {
        match self {
            SchemaNode::Primitive { kind, enum_values } => {
                let mut node = json!({ "type": kind.native_name() });
                if !enum_values.is_empty() {
                    node["enum"] = json!(enum_values);
                }
                node
            }
            SchemaNode::Object { fields } => {
                let mut properties = Map::new();
                for field in fields {
                    properties.insert(field.name.clone(), field.node.to_native_schema());
                }
                let required: Vec<&str> = fields
                    .iter()
                    .filter(|f| f.required)
                    .map(|f| f.name.as_str())
                    .collect();
                json!({
                    "type": "OBJECT",
                    "properties": properties,
                    "required": required,
                })
            }
            SchemaNode::Array { items } => json!({
                "type": "ARRAY",
                "items": items.to_native_schema(),
            }),
        }
    }

    /// Renders the tree as an indented, human-readable contract for prompt text.
    pub fn to_prompt_text(&self) -> String {
        let mut out = String::new();
        match self {
            SchemaNode::Object { fields } => {
                out.push_str("A JSON object with these fields:\n");
                render_fields(fields, 0, &mut out);
            }
            SchemaNode::Array { items } => {
                out.push_str("A JSON array. Each item is ");
                out.push_str(&describe_inline(items));
                out.push('\n');
                if let SchemaNode::Object { fields } = items.as_ref() {
                    render_fields(fields, 1, &mut out);
                }
            }
            primitive => {
                out.push_str("A single JSON ");
                out.push_str(&describe_inline(primitive));
                out.push('\n');
            }
        }
        out
    }
}

fn describe_inline(node: &SchemaNode) -> String {
    match node {
        SchemaNode::Primitive { kind, enum_values } if enum_values.is_empty() => {
            kind.prose_name().to_string()
        }
        SchemaNode::Primitive { kind, enum_values } => format!(
            "{}, one of: {}",
            kind.prose_name(),
            enum_values
                .iter()
                .map(|v| format!("\"{v}\""))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        SchemaNode::Object { .. } => "object with fields:".to_string(),
        SchemaNode::Array { items } => format!("array of {}", describe_inline(items)),
    }
}

fn render_fields(fields: &[Field], depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    for field in fields {
        let presence = if field.required { "required" } else { "optional" };
        out.push_str(&format!(
            "{indent}- \"{}\" ({presence}): {}\n",
            field.name,
            describe_inline(&field.node)
        ));
        match &field.node {
            SchemaNode::Object { fields } => render_fields(fields, depth + 1, out),
            SchemaNode::Array { items } => {
                if let SchemaNode::Object { fields } = items.as_ref() {
                    render_fields(fields, depth + 1, out);
                }
            }
            SchemaNode::Primitive { .. } => {}
        }
    }
}
