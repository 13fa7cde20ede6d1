//! Desired-image locator resolution
//!
//! The locator file redirects loading to a differently named artifact in
//! the cache directory. Only its first line is meaningful; the rest of the
//! file is reserved.

use crate::config::Config;
use crate::error::{CacheError, CacheResult};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Resolve the path of the desired agent image.
///
/// Reads the first line of the locator file (which must end in a newline),
/// trims it, strips it to its base name, and joins it onto the cache
/// directory. Directory components in the line are discarded, so a locator
/// cannot point outside the cache directory. The resolved path is not
/// checked for existence; the subsequent open reports that.
pub fn resolve_desired_image_path(config: &Config) -> CacheResult<PathBuf> {
    let locator = config.desired_image_locator();
    let file = File::open(&locator).map_err(|e| {
        CacheError::io(
            format!("opening desired image locator {}", locator.display()),
            e,
        )
    })?;

    let mut line = String::new();
    BufReader::new(file).read_line(&mut line).map_err(|e| {
        CacheError::io(
            format!("reading desired image locator {}", locator.display()),
            e,
        )
    })?;

    if !line.ends_with('\n') {
        return Err(CacheError::LocatorMissingNewline { path: locator });
    }

    let name = line.trim();
    let base = Path::new(name)
        .file_name()
        .ok_or_else(|| CacheError::LocatorInvalid {
            path: locator.clone(),
            line: name.to_string(),
        })?;

    Ok(config.cache.directory.join(base))
}
