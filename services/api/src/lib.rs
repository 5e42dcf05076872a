mod cli;
mod infra;
mod routes;
mod server;

use inspection_market::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
