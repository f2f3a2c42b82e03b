#[tokio::main]
async fn main() -> anyhow::Result<()> {
    adgate::app::run().await
}
