//! Small operations implemented in the ops crate

use crate::{AppStatus, OpsCtx};
use appset_errors::Error;

/// Installed version of every managed application, in install order
///
/// # Errors
///
/// Returns an error if the package manager cannot be queried.
pub async fn status(ctx: &OpsCtx) -> Result<Vec<AppStatus>, Error> {
    let mut apps = Vec::with_capacity(ctx.config.install.managed_apps.len());
    for package in ctx.config.install.managed_apps.install_order() {
        let installed = ctx.installer.installed_version(package, false).await?;
        apps.push(AppStatus {
            package: package.to_string(),
            installed,
        });
    }
    Ok(apps)
}
