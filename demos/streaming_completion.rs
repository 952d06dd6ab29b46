use orchestration_client::*;
use std::io::Write;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let api_url = std::env::var("AI_API_URL").unwrap_or_else(|_| "http://localhost:8080".into());
    let token = std::env::var("AI_API_TOKEN").unwrap_or_default();

    let config = OrchestrationModuleConfig::new(
        TemplatingModuleConfig::new(vec![ChatMessage::user("Write a haiku about {{?topic}}.")]),
        LlmModuleConfig::new("gpt-4o").with_temperature(0.9),
    );
    let client = OrchestrationClient::from_client_config(
        config,
        &ClientConfig::builder(api_url)
            .with_auth_token(token)
            .with_resource_group("default")
            .build(),
    );

    let prompt = Prompt::new().with_input_param("topic", "autumn rain");
    let mut stream = client.stream(Some(&prompt), None).await?;

    while let Some(chunk) = stream.next().await {
        print!("{}", chunk?.delta_content(0).unwrap_or_default());
        std::io::stdout().flush().ok();
    }
    println!();

    println!("Finish reason: {:?}", stream.finish_reason(0));
    println!("Tokens used: {}", stream.token_usage()?.total_tokens);
    Ok(())
}
