use anyhow::Result;
use clap::Parser;
use racer_evaluator::{Args, helpers::setup_logging, run};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(&args.format)?;

    // Ctrl-C stops an export poll early; the last observed status is still reported.
    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let mut writer = std::io::stdout();
    run(args, cancel, &mut writer).await?;
    Ok(())
}
