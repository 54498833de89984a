mod cli;
mod infra;
mod jobs;
mod routes;
mod server;

use fund_leads::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
