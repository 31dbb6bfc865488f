//! API gateway binary. Configuration comes from the environment (see `.env.example`).

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    hub_gateway::run().await
}
