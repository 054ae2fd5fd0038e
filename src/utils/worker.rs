use std::future::Future;

/// Runs `future` to completion on its own thread and runtime, keeping the UI
/// thread free. Results travel back over channels owned by the caller.
pub fn spawn_async<F>(name: &str, future: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let name = name.to_string();
    let spawned = std::thread::Builder::new()
        .name(name.clone())
        .spawn(move || match tokio::runtime::Runtime::new() {
            Ok(rt) => rt.block_on(future),
            Err(e) => tracing::error!(task = %name, error = %e, "failed to start runtime"),
        });

    if let Err(e) = spawned {
        tracing::error!(error = %e, "failed to spawn worker thread");
    }
}
