mod cli;
mod demo;
mod infra;
mod sync;

use haitaton_sync::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
