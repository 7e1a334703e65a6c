#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    contract_signing_server::run().await
}
