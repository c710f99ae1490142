//! Platform-specific diary directory resolution.

use std::path::PathBuf;

/// Returns the platform-appropriate directory for diary files.
///
/// | Platform | Directory |
/// |----------|-----------|
/// | Linux | `$XDG_DATA_HOME/deardiary/diary` or `~/.local/share/deardiary/diary` |
/// | macOS | `~/Library/Application Support/deardiary/diary` |
/// | Windows | `%LOCALAPPDATA%\deardiary\deardiary\diary` |
pub fn diary_dir() -> PathBuf {
    let base = directories::ProjectDirs::from("", "", "deardiary")
        .expect("Failed to determine project directories");
    base.data_local_dir().join("diary")
}

/// Ensures the diary directory exists, creating it if necessary.
///
/// Returns `Ok(())` if the directory exists or was created.
/// Returns `Err` if the directory could not be created.
pub fn ensure_diary_dir(dir: &std::path::Path) -> Result<(), std::io::Error> {
    std::fs::create_dir_all(dir)?;
    Ok(())
}

/// Path of the diary file for one rotation slot.
pub fn diary_file_path(dir: &std::path::Path, index: usize) -> PathBuf {
    dir.join(format!("diary_{index}.dat"))
}
