#[tokio::main]
async fn main() {
    solquery::cli::run().await;
}
