//! Output path derivation.
//!
//! `textures/rock.height.png` with suffix `_normals.png` becomes
//! `<output_dir>/rock.height_normals.png`: the directory and the final
//! extension are stripped, everything before the last `.` is kept.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Returns the stem of `input`'s file name (text before the last `.`), or
/// `None` if the name has no `.` at all.
pub fn file_stem(input: &Path) -> Option<String> {
    let name = input.file_name()?.to_string_lossy();
    let dot = name.rfind('.')?;
    Some(name[..dot].to_string())
}

/// Builds the output path for `input`.
///
/// Returns `None` if the input file name has no extension.
pub fn output_path(input: &Path, output_dir: &Path, suffix: &str) -> Option<PathBuf> {
    let stem = file_stem(input)?;
    Some(output_dir.join(format!("{}{}", stem, suffix)))
}

/// Returns every output path that appears more than once, in first-repeat
/// order. Inputs such as `a/rock.png` and `b/rock.png` collide this way.
pub fn duplicate_outputs<'a, I>(outputs: I) -> Vec<&'a Path>
where
    I: IntoIterator<Item = &'a Path>,
{
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    outputs
        .into_iter()
        .filter(|path| !seen.insert(*path) && reported.insert(*path))
        .collect()
}
