//! Design system — the flat set of style tokens applied to a whole document.
//!
//! Values are style-class tokens (or a hex color for `highlight_color`) that
//! the rendering collaborator interprets. This module only guarantees shape:
//! every attribute present and non-empty.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::layout::LayoutError;
use crate::llm_client::schema::{Field, SchemaNode};

/// Identity of the built-in placeholder design.
pub const PLACEHOLDER_ID: &str = "default";

/// How the rendered document is framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayoutKind {
    /// One floating container, paper style.
    #[serde(rename = "card")]
    SingleContainer,
    /// Edge-to-edge, web page style.
    #[serde(rename = "flat")]
    Seamless,
    /// Content split into a grid of containers by heading.
    #[serde(rename = "multi-card")]
    MultiContainerGrid,
}

impl LayoutKind {
    pub const WIRE_VALUES: [&'static str; 3] = ["card", "flat", "multi-card"];
}

/// Caller's layout wish. `Auto` leaves the choice to the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutPreference {
    #[default]
    Auto,
    Card,
    Flat,
    MultiCard,
}

impl LayoutPreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayoutPreference::Auto => "auto",
            LayoutPreference::Card => "card",
            LayoutPreference::Flat => "flat",
            LayoutPreference::MultiCard => "multi-card",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignSystem {
    /// Assigned locally; whatever the model puts here is discarded.
    #[serde(default)]
    pub id: String,
    pub theme_name: String,
    pub layout_type: LayoutKind,

    pub page_background: String,
    pub container_background: String,
    pub container_shadow: String,
    pub container_max_width: String,
    pub container_padding: String,
    pub container_border_radius: String,

    pub font_family: String,
    pub base_font_size: String,
    pub line_height: String,
    pub text_color: String,

    /// H1 size only; `heading1` carries everything else.
    pub title_size: String,
    pub heading1: String,
    pub heading2: String,
    pub paragraph: String,
    pub blockquote: String,
    /// Hex color, e.g. `#6366f1`.
    pub highlight_color: String,

    pub divider_style: String,
}

impl DesignSystem {
    /// "Clean Paper", the design a fresh session starts with.
    pub fn placeholder() -> Self {
        Self {
            id: PLACEHOLDER_ID.to_string(),
            theme_name: "Clean Paper".to_string(),
            layout_type: LayoutKind::SingleContainer,
            page_background: "bg-slate-100".to_string(),
            container_background: "bg-white".to_string(),
            container_shadow: "shadow-lg".to_string(),
            container_max_width: "max-w-4xl".to_string(),
            container_padding: "p-8 md:p-16".to_string(),
            container_border_radius: "rounded-none".to_string(),
            font_family: "font-sans".to_string(),
            base_font_size: "text-base".to_string(),
            line_height: "leading-7".to_string(),
            text_color: "text-slate-700".to_string(),
            title_size: "text-4xl md:text-5xl".to_string(),
            heading1: "font-bold text-slate-900 mb-8 tracking-tight".to_string(),
            heading2: "text-2xl font-semibold text-slate-800 mt-10 mb-4 border-l-4 border-indigo-500 pl-4"
                .to_string(),
            paragraph: "mb-6".to_string(),
            blockquote: "italic text-slate-600 border-l-4 border-slate-300 pl-4 py-2 my-8 bg-slate-50"
                .to_string(),
            highlight_color: "#6366f1".to_string(),
            divider_style: "my-12 border-slate-200".to_string(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.id == PLACEHOLDER_ID
    }

    /// Wire names and values of every string style attribute.
    fn style_attributes(&self) -> [(&'static str, &str); 18] {
        [
            ("themeName", &self.theme_name),
            ("pageBackground", &self.page_background),
            ("containerBackground", &self.container_background),
            ("containerShadow", &self.container_shadow),
            ("containerMaxWidth", &self.container_max_width),
            ("containerPadding", &self.container_padding),
            ("containerBorderRadius", &self.container_border_radius),
            ("fontFamily", &self.font_family),
            ("baseFontSize", &self.base_font_size),
            ("lineHeight", &self.line_height),
            ("textColor", &self.text_color),
            ("titleSize", &self.title_size),
            ("heading1", &self.heading1),
            ("heading2", &self.heading2),
            ("paragraph", &self.paragraph),
            ("blockquote", &self.blockquote),
            ("highlightColor", &self.highlight_color),
            ("dividerStyle", &self.divider_style),
        ]
    }

    /// Rejects a design with any blank attribute, naming every offender.
    pub fn validate(&self) -> Result<(), LayoutError> {
        let blank: Vec<&str> = self
            .style_attributes()
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();

        if blank.is_empty() {
            Ok(())
        } else {
            Err(LayoutError::DesignGeneration(format!(
                "design is missing required attribute(s): {}",
                blank.join(", ")
            )))
        }
    }

    /// Output schema for one design. `id` is deliberately absent.
    pub fn schema() -> SchemaNode {
        let mut fields = vec![Field::required(
            "layoutType",
            SchemaNode::string_enum(LayoutKind::WIRE_VALUES),
        )];
        fields.extend(
            Self::placeholder()
                .style_attributes()
                .iter()
                .map(|(name, _)| Field::required(*name, SchemaNode::string())),
        );
        SchemaNode::object(fields)
    }
}

pub fn fresh_design_id() -> String {
    format!("gen-{}", Uuid::new_v4())
}

/// Validates a freshly generated design and stamps it with a new identity.
pub fn finalize_generated(mut design: DesignSystem) -> Result<DesignSystem, LayoutError> {
    design.validate()?;
    design.id = fresh_design_id();
    Ok(design)
}
