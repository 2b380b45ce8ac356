mod cli;
mod infra;
mod routes;
mod server;

use civic_requests::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
