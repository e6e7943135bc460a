//! LLM prompt constants for design synthesis and segment rewriting.
//!
//! Templates use `{placeholder}` markers filled in one pass by [`fill`], so a
//! slot value that itself contains `{segment}` or similar is left untouched.

// ────────────────────────────────────────────────────────────────────────────
// Design phase
// ────────────────────────────────────────────────────────────────────────────

pub const DESIGN_SYSTEM: &str = "\
You are an expert visual designer. Read the STYLE REQUEST and the CONTENT SAMPLE \
and produce a design system for the whole document as JSON.\n\
\n\
Rules:\n\
1. Return a single JSON object matching the design schema. Every attribute is required and non-empty.\n\
2. Attribute values are Tailwind CSS v3 utility classes, except highlightColor which is a hex color.\n\
3. Visual style cues:\n\
   - Social / newsletter: decorative H2s (pills, borders), relaxed leading.\n\
   - Tech: dark or gradient themes, monospace accents.\n\
   - Classic: serif fonts, paper textures.\n\
4. heading2 is the main visual anchor. Be creative with gradients, capsules and borders.\n\
5. layoutType is one of \"card\" (single container), \"flat\" (seamless) or \"multi-card\" (grid). \
Honour the LAYOUT PREFERENCE unless it is \"auto\".";

/// Replace: {style_prompt}, {layout_preference}, {content_sample}
pub const DESIGN_PROMPT_TEMPLATE: &str = "\
STYLE REQUEST: {style_prompt}\n\
LAYOUT PREFERENCE: {layout_preference}\n\
CONTENT SAMPLE:\n\
{content_sample}";

/// Replace: {count}, {style_prompt}, {layout_preference}
pub const VARIATIONS_PROMPT_TEMPLATE: &str = "\
Create {count} DISTINCT design variations for this request: \"{style_prompt}\".\n\
The first should follow the request literally; the others should be creative interpretations.\n\
LAYOUT PREFERENCE: {layout_preference}\n\
Every variation must have a different themeName, palette and heading2 style.\n\
Return a JSON object of the form {\"designs\": [ ... ]}.";

// ────────────────────────────────────────────────────────────────────────────
// Content phase
// ────────────────────────────────────────────────────────────────────────────

pub const CONTENT_SYSTEM: &str = "\
You are a senior content editor. Rewrite the given text segment so it matches the requested \
style (e.g. newsletter, tech blog, business report).\n\
\n\
Rules:\n\
1. Output Markdown only. No JSON. No preamble such as \"Here is the rewritten text\".\n\
2. Formatting:\n\
   - Introduce H2 (##) headings where the text lacks structure.\n\
   - Add a relevant emoji to each heading (e.g. \"## 🚀 Title\").\n\
   - Bold the key phrases.\n\
   - Keep paragraphs short and readable.\n\
3. Continuity:\n\
   - The segment is part of a longer document.\n\
   - When PREVIOUS CONTEXT is given, continue its tone and flow without repeating it.\n\
   - Only add a top-level H1 title when IS START OF DOCUMENT is true.\n\
4. Keep every fact from the segment. Do not invent content.";

/// Replace: {style_prompt}, {previous_context}, {is_first}, {segment}
pub const REWRITE_PROMPT_TEMPLATE: &str = "\
STYLE REQUEST: {style_prompt}\n\
PREVIOUS CONTEXT (end of last segment): \"{previous_context}\"\n\
IS START OF DOCUMENT: {is_first}\n\
\n\
TEXT SEGMENT TO REWRITE:\n\
{segment}";

/// Substitutes every `{name}` marker in `template` that has an entry in
/// `slots`. Only the template is scanned; inserted values are never re-read.
/// Unknown markers (e.g. literal JSON braces) are copied through as-is.
pub fn fill(template: &str, slots: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let slot = after.find('}').and_then(|close| {
            let name = &after[..close];
            slots
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });

        match slot {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}
