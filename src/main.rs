use anyhow::Result;
use tracing::error;
use windowtally::{cli::run_cli, utils::runtime::single_thread_runtime};

fn main() -> Result<()> {
    let runtime = single_thread_runtime()?;
    let result = runtime.block_on(run_cli()).inspect_err(|e| {
        error!("Error running cli {e:?}");
    });
    // Stdin is read on a blocking thread that can't be interrupted, don't wait for it.
    runtime.shutdown_background();
    result
}
