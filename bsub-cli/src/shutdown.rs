use tokio_util::sync::CancellationToken;

/// Exit status used when the user interrupts twice
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Install a Ctrl-C handler for the lifetime of the process.
///
/// Returns a `CancellationToken` that is cancelled on the first Ctrl-C so
/// waits and prompts can stop cleanly. A second Ctrl-C exits immediately.
pub fn install_interrupt_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            return;
        }
        tracing::info!("Interrupted, stopping");
        token_clone.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!();
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    });

    token
}
