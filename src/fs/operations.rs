use std::path::{Path, PathBuf};

use tokio::{fs::File, io::{self, AsyncWriteExt}};

/// Replaces the file at `path` with `contents` in one step. Data goes into a sibling temporary
/// file first and is renamed over the target, so readers see either the old or the new file and
/// never a half written one.
pub async fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), io::Error> {
    let temporary = temporary_sibling(path);

    let result = async {
        let mut file = File::create(&temporary).await?;
        file.write_all(contents).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&temporary, path).await
    }
    .await;

    if result.is_err() {
        let _ = tokio::fs::remove_file(&temporary).await;
    }
    result
}

fn temporary_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|v| v.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
