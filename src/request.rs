use crate::types::{
    CompletionPostRequest, ModuleConfigurations, OrchestrationConfig, OrchestrationModuleConfig,
    Prompt, TemplatingModuleConfig,
};

/// Build the wire request for a completion call.
///
/// Templating and LLM configs are always sent. Filtering, masking and
/// grounding are sent only when their config is present and has at least
/// one field set: the service treats key presence as "module enabled", so an
/// empty config must not appear as `{}`. Prompt fields are sent whenever they
/// are `Some`, even if empty.
pub fn construct_completion_post_request(
    config: &OrchestrationModuleConfig,
    prompt: Option<&Prompt>,
    stream: bool,
) -> CompletionPostRequest {
    let mut module_configurations = ModuleConfigurations {
        templating_module_config: TemplatingModuleConfig {
            template: config.templating.template.clone(),
        },
        llm_module_config: config.llm.clone(),
        filtering_module_config: None,
        masking_module_config: None,
        grounding_module_config: None,
    };

    if let Some(filtering) = config.filtering.as_ref().filter(|f| !f.is_empty()) {
        module_configurations.filtering_module_config = Some(filtering.clone());
    }
    if let Some(masking) = config.masking.as_ref().filter(|m| !m.is_empty()) {
        module_configurations.masking_module_config = Some(masking.clone());
    }
    if let Some(grounding) = config.grounding.as_ref().filter(|g| !g.is_empty()) {
        module_configurations.grounding_module_config = Some(grounding.clone());
    }

    let mut request = CompletionPostRequest {
        orchestration_config: OrchestrationConfig {
            stream,
            module_configurations,
        },
        input_params: None,
        messages_history: None,
    };

    if let Some(prompt) = prompt {
        request.input_params = prompt.input_params.clone();
        request.messages_history = prompt.messages_history.clone();
    }

    tracing::debug!(
        stream,
        filtering = request.orchestration_config.module_configurations.filtering_module_config.is_some(),
        masking = request.orchestration_config.module_configurations.masking_module_config.is_some(),
        grounding = request.orchestration_config.module_configurations.grounding_module_config.is_some(),
        "composed orchestration request"
    );

    request
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::*;
    use serde_json::{json, Value};
    use std::collections::HashMap;

    fn base_config() -> OrchestrationModuleConfig {
        OrchestrationModuleConfig::new(
            TemplatingModuleConfig::new(vec![ChatMessage::user("Summarize {{?text}}")]),
            LlmModuleConfig::new("gpt-4o").with_max_tokens(50),
        )
    }

    fn filtering() -> FilteringModuleConfig {
        FilteringModuleConfig {
            input: Some(FilterStageConfig {
                filters: vec![FilterConfig::new(
                    "azure_content_safety",
                    json!({"Hate": 0, "Violence": 2}),
                )],
            }),
            output: None,
        }
    }

    fn masking() -> MaskingModuleConfig {
        MaskingModuleConfig {
            masking_providers: vec![json!({
                "type": "sap_data_privacy_integration",
                "method": "anonymization",
                "entities": [{"type": "profile-email"}]
            })],
        }
    }

    fn grounding() -> GroundingModuleConfig {
        GroundingModuleConfig {
            grounding_type: Some("document_grounding_service".to_string()),
            config: Some(json!({"output_param": "context"})),
        }
    }

    fn modules(request: &CompletionPostRequest) -> Value {
        serde_json::to_value(request).unwrap()["orchestration_config"]["module_configurations"]
            .clone()
    }

    #[test]
    fn test_minimal_request_shape() {
        let request = construct_completion_post_request(&base_config(), None, false);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(
            value,
            json!({
                "orchestration_config": {
                    "stream": false,
                    "module_configurations": {
                        "templating_module_config": {
                            "template": [{"role": "user", "content": "Summarize {{?text}}"}]
                        },
                        "llm_module_config": {
                            "model_name": "gpt-4o",
                            "model_params": {"max_tokens": 50}
                        }
                    }
                }
            })
        );
    }

    #[test]
    fn test_stream_flag() {
        let request = construct_completion_post_request(&base_config(), None, true);
        assert!(request.orchestration_config.stream);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["orchestration_config"]["stream"], json!(true));
    }

    #[test]
    fn test_optional_modules_present_iff_non_empty() {
        for mask in 0..8u8 {
            let mut config = base_config();
            config.filtering = Some(if mask & 1 != 0 { filtering() } else { Default::default() });
            config.masking = Some(if mask & 2 != 0 { masking() } else { Default::default() });
            config.grounding = Some(if mask & 4 != 0 { grounding() } else { Default::default() });

            let value = modules(&construct_completion_post_request(&config, None, false));
            let obj = value.as_object().unwrap();
            assert_eq!(obj.contains_key("filtering_module_config"), mask & 1 != 0);
            assert_eq!(obj.contains_key("masking_module_config"), mask & 2 != 0);
            assert_eq!(obj.contains_key("grounding_module_config"), mask & 4 != 0);
            for (_, module) in obj {
                assert_ne!(module, &json!({}), "empty module config leaked into request");
            }
        }
    }

    #[test]
    fn test_absent_modules_omitted() {
        let value = modules(&construct_completion_post_request(&base_config(), None, false));
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert!(obj.contains_key("templating_module_config"));
        assert!(obj.contains_key("llm_module_config"));
    }

    #[test]
    fn test_module_configs_sent_verbatim() {
        let config = base_config()
            .with_filtering(filtering())
            .with_masking(masking())
            .with_grounding(grounding());
        let value = modules(&construct_completion_post_request(&config, None, false));

        assert_eq!(value["filtering_module_config"], serde_json::to_value(filtering()).unwrap());
        assert_eq!(value["masking_module_config"], serde_json::to_value(masking()).unwrap());
        assert_eq!(value["grounding_module_config"], serde_json::to_value(grounding()).unwrap());
        assert_eq!(value["llm_module_config"], serde_json::to_value(&config.llm).unwrap());
    }

    #[test]
    fn test_prompt_fields_omitted_when_absent() {
        let request = construct_completion_post_request(&base_config(), Some(&Prompt::new()), false);
        let value = serde_json::to_value(&request).unwrap();
        let obj = value.as_object().unwrap();
        assert!(!obj.contains_key("input_params"));
        assert!(!obj.contains_key("messages_history"));
    }

    #[test]
    fn test_prompt_fields_present_even_when_empty() {
        let prompt = Prompt::new()
            .with_input_params(HashMap::new())
            .with_messages_history(Vec::new());
        let value =
            serde_json::to_value(construct_completion_post_request(&base_config(), Some(&prompt), false))
                .unwrap();
        assert_eq!(value["input_params"], json!({}));
        assert_eq!(value["messages_history"], json!([]));
    }

    #[test]
    fn test_round_trip_recovers_config_and_prompt() {
        let config = base_config().with_filtering(filtering()).with_grounding(grounding());
        let prompt = Prompt::new()
            .with_input_param("text", "a long article")
            .with_messages_history(vec![
                ChatMessage::system("You are terse."),
                ChatMessage::user("Hello"),
                ChatMessage::assistant("Hi."),
            ]);

        let request = construct_completion_post_request(&config, Some(&prompt), true);
        let wire = serde_json::to_string(&request).unwrap();
        let parsed: CompletionPostRequest = serde_json::from_str(&wire).unwrap();
        let modules = parsed.orchestration_config.module_configurations;

        assert_eq!(modules.templating_module_config, config.templating);
        assert_eq!(modules.llm_module_config, config.llm);
        assert_eq!(modules.filtering_module_config, config.filtering);
        assert_eq!(modules.masking_module_config, None);
        assert_eq!(modules.grounding_module_config, config.grounding);
        assert_eq!(parsed.input_params, prompt.input_params);
        assert_eq!(parsed.messages_history, prompt.messages_history);
    }

    #[test]
    fn test_composition_is_pure() {
        let config = base_config().with_masking(masking());
        let prompt = Prompt::new().with_input_param("text", "x");
        let first = construct_completion_post_request(&config, Some(&prompt), false);
        let second = construct_completion_post_request(&config, Some(&prompt), false);
        assert_eq!(first, second);
    }
}
