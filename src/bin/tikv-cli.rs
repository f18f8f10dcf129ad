use std::io;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let mut stdout = io::stdout();
    let mut stderr = io::stderr();

    let code = tikv_cli::cli::run(std::env::args_os(), &mut stdout, &mut stderr).await;
    ExitCode::from(code.clamp(0, u8::MAX as i32) as u8)
}
