//! `file_sd` document rendering and atomic file replacement.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;

use crate::discovery::TargetGroup;
use crate::publisher::PublisherError;

/// Prefix of the temporary file created next to the output.
const TEMP_FILE_PREFIX: &str = ".lightsail-sd";

/// One element of the `file_sd` JSON array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSdGroup {
    pub targets: Vec<String>,
    pub labels: BTreeMap<String, String>,
}

impl From<&TargetGroup> for FileSdGroup {
    fn from(group: &TargetGroup) -> Self {
        let mut targets = group.targets.clone();
        targets.sort();

        Self {
            targets,
            labels: group.labels.clone(),
        }
    }
}

/// Serialize groups as a `file_sd` document.
///
/// Output is indented with four spaces and ends with a newline. Group
/// sources are dropped; tombstones become `{"targets": [], "labels": {}}`.
pub fn render<'a>(
    groups: impl IntoIterator<Item = &'a TargetGroup>,
) -> Result<Vec<u8>, PublisherError> {
    let doc: Vec<FileSdGroup> = groups.into_iter().map(FileSdGroup::from).collect();

    let mut buf = Vec::new();
    let mut ser =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    doc.serialize(&mut ser)?;
    buf.push(b'\n');
    Ok(buf)
}

/// Replace `path` with `contents` so that readers see either the old or the
/// new file, never a partial one.
///
/// The temporary file is created in the same directory as `path` so the
/// final rename stays on one filesystem. Missing parent directories are
/// created.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), PublisherError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let write_err = |source| PublisherError::Write {
        dir: dir.clone(),
        source,
    };

    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(write_err)?;
    }

    let mut tmp = tempfile::Builder::new()
        .prefix(TEMP_FILE_PREFIX)
        .tempfile_in(&dir)
        .map_err(write_err)?;
    tmp.write_all(contents).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;

    // The monitoring system reads the file as another user.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(tmp.path(), std::fs::Permissions::from_mode(0o644))
            .map_err(write_err)?;
    }

    tmp.persist(path).map_err(|e| PublisherError::Persist {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}
