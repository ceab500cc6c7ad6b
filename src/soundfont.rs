//! soundfont.rs
//!
//! Picks the `.sf2` file to play with.
//!
//! Accepts: a path to a file, a file name inside the SoundFont directory
//! (`GeneralUser.sf2`), or just its stem (`generaluser`). Names are matched
//! case-insensitively. With nothing given, the alphabetically first `.sf2` in
//! the directory is used.

use std::fs;
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum SoundFontError {
    #[error("SoundFont not found: {name} (looked in {dir:?})")]
    NotFound { name: String, dir: PathBuf },
    #[error("no .sf2 files in {0:?}")]
    NoneAvailable(PathBuf),
    #[error("reading SoundFont directory {dir:?}: {source}")]
    Io {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Every `.sf2` file directly inside `dir`, sorted by file name.
pub fn list_soundfonts(dir: &Path) -> Result<Vec<PathBuf>, SoundFontError> {
    let entries = fs::read_dir(dir).map_err(|source| SoundFontError::Io {
        dir: dir.to_path_buf(),
        source,
    })?;

    let mut found: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && has_sf2_extension(p))
        .collect();
    found.sort();
    Ok(found)
}

fn has_sf2_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("sf2"))
}

/// Resolve the user's `--sf` choice (or lack of one) to a file.
pub fn resolve_soundfont(choice: Option<&str>, dir: &Path) -> Result<PathBuf, SoundFontError> {
    let Some(choice) = choice.map(str::trim).filter(|c| !c.is_empty()) else {
        return list_soundfonts(dir)?
            .into_iter()
            .next()
            .ok_or_else(|| SoundFontError::NoneAvailable(dir.to_path_buf()));
    };

    let direct = Path::new(choice);
    if direct.is_file() {
        return Ok(direct.to_path_buf());
    }

    let not_found = || SoundFontError::NotFound {
        name: choice.to_string(),
        dir: dir.to_path_buf(),
    };

    // A missing directory just means the name can't be found there.
    let candidates = match list_soundfonts(dir) {
        Ok(c) => c,
        Err(SoundFontError::Io { .. }) => return Err(not_found()),
        Err(e) => return Err(e),
    };

    let same_name = |part: Option<&std::ffi::OsStr>| {
        part.and_then(|s| s.to_str())
            .is_some_and(|s| s.eq_ignore_ascii_case(choice))
    };

    if let Some(hit) = candidates.iter().find(|p| same_name(p.file_name())) {
        return Ok(hit.clone());
    }
    if let Some(hit) = candidates.iter().find(|p| same_name(p.file_stem())) {
        return Ok(hit.clone());
    }
    Err(not_found())
}
