#[tokio::main]
async fn main() -> anyhow::Result<()> {
    battle_notify::run().await
}
