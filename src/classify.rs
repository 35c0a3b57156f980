use crate::error::{CheckerError, Result};

pub const MIRROR_SCHEME: &str = "mirror://";

/// A parsed `mirror://<id>/<path>` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorRef {
    pub id: String,
    pub path: String,
}

impl MirrorRef {
    /// Concrete URL for one base of the mirror.
    pub fn join(&self, base: &str) -> String {
        format!("{}/{}", base.trim_end_matches('/'), self.path)
    }
}

pub fn is_mirror_reference(url: &str) -> bool {
    url.starts_with(MIRROR_SCHEME)
}

/// mirror://openbsd/OpenBSD/7.5/riscv64/install75.img
/// -> ("openbsd", "OpenBSD/7.5/riscv64/install75.img")
pub fn parse_mirror_reference(url: &str) -> Result<MirrorRef> {
    let rest = url
        .strip_prefix(MIRROR_SCHEME)
        .ok_or_else(|| CheckerError::MalformedMirrorUrl(url.to_string()))?;

    match rest.split_once('/') {
        Some((id, path)) => Ok(MirrorRef {
            id: id.to_string(),
            path: path.to_string(),
        }),
        None => Err(CheckerError::MalformedMirrorUrl(url.to_string())),
    }
}
