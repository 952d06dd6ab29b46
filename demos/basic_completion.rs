use orchestration_client::*;
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let api_url = std::env::var("AI_API_URL").unwrap_or_else(|_| "http://localhost:8080".into());
    let token = std::env::var("AI_API_TOKEN").unwrap_or_default();

    let config = OrchestrationModuleConfig::new(
        TemplatingModuleConfig::new(vec![
            ChatMessage::system("Answer in one sentence."),
            ChatMessage::user("What is the capital of {{?country}}?"),
        ]),
        LlmModuleConfig::new("gpt-4o").with_max_tokens(100),
    )
    .with_filtering(FilteringModuleConfig {
        input: None,
        output: Some(FilterStageConfig {
            filters: vec![FilterConfig::new(
                "azure_content_safety",
                json!({"Hate": 0, "SelfHarm": 0, "Sexual": 0, "Violence": 0}),
            )],
        }),
    });

    let client = OrchestrationClient::from_client_config(
        config,
        &ClientConfig::builder(api_url).with_auth_token(token).build(),
    );

    let prompt = Prompt::new().with_input_param("country", "France");
    let response = client.chat_completion(Some(&prompt), None).await?;

    match response.content(0) {
        Ok(content) => println!("Answer: {}", content.unwrap_or_default()),
        Err(OrchestrationError::ContentFiltered) => println!("The answer was filtered."),
        Err(e) => return Err(e),
    }
    println!("Finish reason: {:?}", response.finish_reason(0));
    println!("Tokens used: {}", response.token_usage()?.total_tokens);
    Ok(())
}
