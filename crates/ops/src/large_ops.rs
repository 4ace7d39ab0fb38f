//! Install and uninstall runs (delegate to the install crate)

use crate::OpsCtx;
use appset_errors::Error;
use appset_events::EventEmitter;
use appset_install::{InstallCoordinator, InstallSummary, UninstallCoordinator, UninstallSummary};

/// Bring every managed application up to the released version
///
/// # Errors
///
/// Returns the run's failure; see `InstallCoordinator::run`.
pub async fn install(ctx: &OpsCtx) -> Result<InstallSummary, Error> {
    install_with(ctx, ctx.install_coordinator()).await
}

/// Remove every managed application, last installed first
///
/// # Errors
///
/// Returns the first failed removal.
pub async fn uninstall(ctx: &OpsCtx) -> Result<UninstallSummary, Error> {
    uninstall_with(ctx, ctx.uninstall_coordinator()).await
}

pub(crate) async fn install_with(
    ctx: &OpsCtx,
    coordinator: InstallCoordinator,
) -> Result<InstallSummary, Error> {
    ctx.emit_operation_started("install");
    let result = coordinator.run().await;
    finish(ctx, "install", &result);
    result
}

pub(crate) async fn uninstall_with(
    ctx: &OpsCtx,
    coordinator: UninstallCoordinator,
) -> Result<UninstallSummary, Error> {
    ctx.emit_operation_started("uninstall");
    let result = coordinator.run().await;
    finish(ctx, "uninstall", &result);
    result
}

fn finish<T>(ctx: &OpsCtx, operation: &str, result: &Result<T, Error>) {
    match result {
        Ok(_) => ctx.emit_operation_completed(operation, true),
        Err(e) => ctx.emit_operation_failed(operation, e.to_string()),
    }
}
