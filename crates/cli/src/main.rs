use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    skydesk_cli::run().await
}
