use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match tester::start_server().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Mock backend failed: {e}");
            ExitCode::FAILURE
        }
    }
}
