use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    chapter_vault::bootstrap();

    match chapter_vault::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(code = e.code(), "chapter-vault stopped: {}", e);
            ExitCode::FAILURE
        }
    }
}
