use std::{io::ErrorKind, path::Path};

use anyhow::{anyhow, Result};
use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncWriteExt},
};
use tracing::debug;

/// Reads the whole file under a shared lock. A missing file is not an error, it simply has no
/// contents yet.
pub async fn read_locked(path: &Path) -> Result<Option<Vec<u8>>> {
    let mut file = match File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    file.lock_shared()?;
    let mut buffer = Vec::new();
    let result = file.read_to_end(&mut buffer).await;
    file.unlock_async().await?;
    result?;

    Ok(Some(buffer))
}

/// Replaces the contents of `path` with `data`. The data is written to a sibling temporary file
/// under an exclusive lock and then renamed over the target, so readers either see the previous
/// contents or the new ones, never a half-written file.
pub async fn write_atomically(path: &Path, data: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow!("Path {path:?} has no file name"))?;
    let mut temp_name = std::ffi::OsString::from(".");
    temp_name.push(file_name);
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    debug!("Writing {} bytes into {path:?}", data.len());
    let mut file = File::create(&temp_path).await?;
    file.lock_exclusive()?;
    let result = async {
        file.write_all(data).await?;
        file.flush().await?;
        file.sync_all().await
    }
    .await;
    file.unlock_async().await?;
    result?;
    drop(file);

    tokio::fs::rename(&temp_path, path).await?;
    Ok(())
}
