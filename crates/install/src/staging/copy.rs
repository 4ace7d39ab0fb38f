use appset_errors::{Error, InstallError};
use appset_platform::{PackageInstaller, SessionId};
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Stream a downloaded file into a session's write slot, `buffer_size` bytes at a time
///
/// Returns the number of bytes copied.
pub(crate) async fn copy_into_session(
    installer: &dyn PackageInstaller,
    session: SessionId,
    split_name: &str,
    file: &Path,
    buffer_size: usize,
) -> Result<u64, Error> {
    let mut input = tokio::fs::File::open(file)
        .await
        .map_err(|e| Error::io_with_path(&e, file))?;
    let length = input
        .metadata()
        .await
        .map_err(|e| Error::io_with_path(&e, file))?
        .len();

    let mut output = installer.open_write(session, split_name, length).await?;
    let write_failed = |e: std::io::Error| InstallError::SessionFailed {
        operation: format!("write {split_name}"),
        session: session.to_string(),
        message: e.to_string(),
    };

    let mut buf = vec![0u8; buffer_size.max(1)];
    let mut copied = 0u64;
    loop {
        let read = input
            .read(&mut buf)
            .await
            .map_err(|e| Error::io_with_path(&e, file))?;
        if read == 0 {
            break;
        }
        output.write_all(&buf[..read]).await.map_err(write_failed)?;
        copied += read as u64;
    }
    output.shutdown().await.map_err(write_failed)?;

    Ok(copied)
}
