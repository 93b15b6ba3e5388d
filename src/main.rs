// src/main.rs

use loadgate::{EXIT_FAILURE, cli, logging, run};

#[tokio::main]
async fn main() {
    let code = match run_main().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("loadgate error: {err}");
            err.downcast_ref::<loadgate::errors::LoadgateError>()
                .map(|e| e.exit_code())
                .unwrap_or(EXIT_FAILURE)
        }
    };
    std::process::exit(code);
}

async fn run_main() -> anyhow::Result<i32> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    Ok(run(args).await?)
}
