mod brief;
mod cli;
mod infra;
mod routes;
mod server;

use sender_compliance::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
