// src/main.rs

use pullsync::{cli, load_config, logging, run};

#[tokio::main]
async fn main() {
    let code = match run_main().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("pullsync error: {err:?}");
            1
        }
    };
    std::process::exit(code);
}

async fn run_main() -> anyhow::Result<i32> {
    let args = cli::parse();
    let cfg = load_config(&args)?;
    logging::init_logging(args.log_level, cfg.local.log_file.as_deref())?;
    let outcome = run(args, cfg).await?;
    Ok(outcome.exit_code())
}
