// Shared prompt fragments for the completion engine.
// Feature modules keep their own prompts.rs; only cross-cutting text lives here.

use crate::llm_client::schema::SchemaNode;

/// Repeated several times in the system instruction of providers that have no
/// native structured-output mode. Chat models drift away from a single mention.
pub const JSON_BLOCK_DIRECTIVE: &str = "Respond with exactly ONE fenced code block tagged \
    `json` (```json ... ```) containing the complete JSON value, and nothing else.";

pub const JSON_STRICTNESS: &str = "Use double quotes for every key and string. \
    No comments. No trailing commas. No prose before or after the block.";

/// Wraps a system instruction with formatting directives and, when given, the
/// textual rendering of the expected schema.
pub fn augment_system_for_json(system: Option<&str>, schema: Option<&SchemaNode>) -> String {
    let mut out = String::new();
    out.push_str("OUTPUT FORMAT (mandatory): ");
    out.push_str(JSON_BLOCK_DIRECTIVE);
    out.push_str("\n\n");

    if let Some(system) = system.map(str::trim).filter(|s| !s.is_empty()) {
        out.push_str(system);
        out.push_str("\n\n");
    }

    out.push_str("REMINDER: ");
    out.push_str(JSON_BLOCK_DIRECTIVE);
    out.push(' ');
    out.push_str(JSON_STRICTNESS);
    out.push_str("\n\n");

    if let Some(schema) = schema {
        out.push_str("The JSON value MUST match this contract:\n");
        out.push_str(&schema.to_prompt_text());
        out.push('\n');
    }

    out.push_str("FINAL RULE: ");
    out.push_str(JSON_BLOCK_DIRECTIVE);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::schema::Field;

    #[test]
    fn test_directive_is_repeated_at_least_three_times() {
        let text = augment_system_for_json(Some("You are a designer."), None);
        assert!(text.matches(JSON_BLOCK_DIRECTIVE).count() >= 3);
        assert!(text.contains("You are a designer."));
    }

    #[test]
    fn test_schema_contract_is_appended() {
        let schema = SchemaNode::object(vec![Field::required("title", SchemaNode::string())]);
        let text = augment_system_for_json(None, Some(&schema));
        assert!(text.contains("\"title\" (required): string"));
    }
}
