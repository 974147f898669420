//! Small file helpers used by the configuration writers
//!
//! Every file written here is owner read/write only, as PostgreSQL expects
//! for the contents of its data directory.

use std::path::{Path, PathBuf};

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

const FILE_MODE: u32 = 0o600;

/// Replaces the content of `path`, going through a sibling temporary file
/// so readers never see a half-written file
pub async fn write_file(path: &Path, content: &str) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let result = replace_with(&tmp, path, content).await;
    if result.is_err() {
        // Never leave a partial sibling behind in the data directory
        let _ = fs::remove_file(&tmp).await;
    }
    result
}

async fn replace_with(tmp: &Path, path: &Path, content: &str) -> std::io::Result<()> {
    let mut file = open(tmp, false).await?;
    file.write_all(content.as_bytes()).await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(tmp, path).await
}

/// Appends `content` to `path`, creating the file when missing
pub async fn append_to_file(path: &Path, content: &str) -> std::io::Result<()> {
    let mut file = open(path, true).await?;
    file.write_all(content.as_bytes()).await?;
    file.sync_all().await
}

async fn open(path: &Path, append: bool) -> std::io::Result<fs::File> {
    let mut options = OpenOptions::new();
    options.create(true);
    if append {
        options.append(true);
    } else {
        options.write(true).truncate(true);
    }
    #[cfg(unix)]
    options.mode(FILE_MODE);
    options.open(path).await
}
