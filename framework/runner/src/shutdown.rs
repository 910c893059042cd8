use tokio::signal;
use chaos_lite_core::prelude::ShutdownHandle;

pub(crate) fn start_shutdown_listener(
    runtime: &tokio::runtime::Runtime,
) -> anyhow::Result<ShutdownHandle> {
    let handle = ShutdownHandle::default();

    let listener_handle = handle.clone();
    runtime.spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C, interrupting the run will not clean up: {e}");
            return;
        }
        log::info!("Received shutdown signal, stopping after the current step...");
        listener_handle.shutdown();
    });

    Ok(handle)
}
