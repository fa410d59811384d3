use async_trait::async_trait;
use classroom_adapters::UserPrompt;
use classroom_core::Error;
use dialoguer::Input;

/// Prompts on the controlling terminal
pub struct TerminalPrompt;

#[async_trait]
impl UserPrompt for TerminalPrompt {
    fn present_url(&self, url: &str) {
        println!("Open this URL in your browser to authorize gc-cli:\n\n  {}\n", url);
    }

    async fn read_redirect_url(&self) -> Result<String, Error> {
        println!("After approving, your browser is sent to a page that fails to load.");
        println!("Copy the full URL from the address bar and paste it below.");

        tokio::task::spawn_blocking(|| {
            Input::<String>::new()
                .with_prompt("Redirect URL")
                .allow_empty(true)
                .interact_text()
                .map_err(|e| Error::Other(format!("failed to read input: {}", e)))
        })
        .await
        .map_err(|e| Error::Other(format!("input task failed: {}", e)))?
    }
}
