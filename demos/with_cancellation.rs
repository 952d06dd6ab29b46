use orchestration_client::*;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let api_url = std::env::var("AI_API_URL").unwrap_or_else(|_| "http://localhost:8080".into());
    let token = std::env::var("AI_API_TOKEN").unwrap_or_default();

    let config = OrchestrationModuleConfig::new(
        TemplatingModuleConfig::new(vec![ChatMessage::user("Tell a very long story.")]),
        LlmModuleConfig::new("gpt-4o").with_max_tokens(4000),
    );
    let client = OrchestrationClient::from_client_config(
        config,
        &ClientConfig::builder(api_url).with_auth_token(token).build(),
    );

    // Give up after two seconds, wherever the stream is.
    let cancel = CancellationToken::new();
    let timer = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        timer.cancel();
    });

    let mut stream = match client.create_stream(cancel, None, None).await {
        Ok(stream) => stream,
        Err(OrchestrationError::Cancelled) => {
            println!("Cancelled before the first chunk arrived");
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    match stream.finish().await {
        Ok(()) => println!("Completed: {:?}", stream.content(0)?),
        Err(OrchestrationError::Cancelled) => {
            println!("Cancelled in state {:?}", stream.state());
            println!("Partial story: {}", stream.content(0)?.unwrap_or_default());
        }
        Err(e) => return Err(e),
    }
    Ok(())
}
