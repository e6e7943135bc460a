//! Design variations: several alternative designs for one style request,
//! generated in a single model call.

use serde::Deserialize;
use tracing::{error, info};

use crate::layout::design::{finalize_generated, DesignSystem, LayoutPreference};
use crate::layout::prompts::{fill, DESIGN_SYSTEM, VARIATIONS_PROMPT_TEMPLATE};
use crate::layout::LayoutError;
use crate::llm_client::schema::{Field, SchemaNode};
use crate::llm_client::{CompletionEngine, CompletionRequest};

pub const VARIATION_COUNT: usize = 2;

/// Wire shape of a variations response: `{"designs": [...]}`.
#[derive(Debug, Deserialize)]
struct VariationsEnvelope {
    designs: Vec<DesignSystem>,
}

fn variations_schema() -> SchemaNode {
    SchemaNode::object(vec![Field::required(
        "designs",
        SchemaNode::array(DesignSystem::schema()),
    )])
}

/// Asks the model for `VARIATION_COUNT` distinct designs.
///
/// Every returned design is validated and given a fresh `gen-` id. The model
/// may return fewer designs than asked for, but never zero.
pub async fn generate_variations(
    engine: &CompletionEngine,
    style_prompt: &str,
    preference: LayoutPreference,
) -> Result<Vec<DesignSystem>, LayoutError> {
    let count = VARIATION_COUNT.to_string();
    let prompt = fill(
        VARIATIONS_PROMPT_TEMPLATE,
        &[
            ("count", count.as_str()),
            ("style_prompt", style_prompt),
            ("layout_preference", preference.as_str()),
        ],
    );
    let request = CompletionRequest::json(prompt, variations_schema()).with_system(DESIGN_SYSTEM);

    let envelope: VariationsEnvelope = engine.complete_json(&request).await.map_err(|e| {
        error!(provider = engine.provider(), error = %e, "Design variations failed");
        LayoutError::DesignGeneration(e.to_string())
    })?;

    if envelope.designs.is_empty() {
        return Err(LayoutError::DesignGeneration(
            "model returned no design variations".to_string(),
        ));
    }

    let designs = envelope
        .designs
        .into_iter()
        .map(finalize_generated)
        .collect::<Result<Vec<_>, _>>()?;

    info!(count = designs.len(), "Design variations generated");
    Ok(designs)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::layout::design::LayoutKind;
    use crate::llm_client::testing::ScriptedClient;

    fn design_value(theme: &str, layout: LayoutKind) -> serde_json::Value {
        let mut design = DesignSystem::placeholder();
        design.theme_name = theme.to_string();
        design.layout_type = layout;
        let mut value = serde_json::to_value(design).unwrap();
        value.as_object_mut().unwrap().remove("id");
        value
    }

    fn engine_returning(native: bool, body: String) -> (CompletionEngine, std::sync::Arc<ScriptedClient>) {
        let client = ScriptedClient::new(native, move |_| Ok(body.clone()));
        (CompletionEngine::new(client.clone()), client)
    }

    #[tokio::test]
    async fn test_envelope_yields_designs_with_fresh_ids() {
        let body = json!({
            "designs": [
                design_value("Neon Grid", LayoutKind::MultiContainerGrid),
                design_value("Ink & Paper", LayoutKind::SingleContainer),
            ]
        });
        let (engine, client) = engine_returning(true, body.to_string());

        let designs = generate_variations(&engine, "bold startup pitch", LayoutPreference::Auto)
            .await
            .unwrap();

        assert_eq!(designs.len(), 2);
        assert_eq!(designs[0].theme_name, "Neon Grid");
        assert!(designs.iter().all(|d| d.id.starts_with("gen-")));
        assert_ne!(designs[0].id, designs[1].id);

        let call = &client.recorded()[0];
        assert!(call.json_mode);
        assert!(call.prompt.contains("Create 2 DISTINCT"));
        assert!(call.prompt.contains("\"bold startup pitch\""));
        let native = call.output_schema.as_ref().unwrap().to_native_schema();
        assert_eq!(native["properties"]["designs"]["type"], "ARRAY");
    }

    #[tokio::test]
    async fn test_bare_array_is_rejected() {
        let body = json!([design_value("Solo", LayoutKind::Seamless)]);
        let (engine, _) = engine_returning(true, body.to_string());

        let err = generate_variations(&engine, "minimal", LayoutPreference::Flat)
            .await
            .unwrap_err();
        assert!(matches!(err, LayoutError::DesignGeneration(_)));
    }

    #[tokio::test]
    async fn test_empty_list_is_rejected() {
        let (engine, _) = engine_returning(true, json!({ "designs": [] }).to_string());

        let err = generate_variations(&engine, "minimal", LayoutPreference::Auto)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no design variations"));
    }

    #[tokio::test]
    async fn test_invalid_design_fails_the_batch() {
        let mut broken = design_value("Broken", LayoutKind::SingleContainer);
        broken["fontFamily"] = json!("");
        let body = json!({ "designs": [design_value("Fine", LayoutKind::Seamless), broken] });
        let (engine, _) = engine_returning(true, body.to_string());

        let err = generate_variations(&engine, "x", LayoutPreference::Auto)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("fontFamily"));
    }

    #[tokio::test]
    async fn test_chat_path_salvages_fenced_output() {
        let body = format!(
            "Here are your designs:\n```json\n{}\n```\nEnjoy!",
            json!({ "designs": [design_value("Retro Zine", LayoutKind::SingleContainer)] })
        );
        let (engine, client) = engine_returning(false, body);

        let designs = generate_variations(&engine, "retro zine", LayoutPreference::Card)
            .await
            .unwrap();
        assert_eq!(designs.len(), 1);
        assert_eq!(designs[0].theme_name, "Retro Zine");

        let system = client.recorded()[0].system_instruction.clone().unwrap();
        assert!(system.contains("designs"));
    }
}
