//! Download path parsing.

use std::fmt;

use depot_types::FileHash;

/// A validated download path: `/<group>/<segment>/<32-hex-hash>`.
///
/// `group` and `segment` are non-empty runs of ASCII letters, digits and
/// underscores. The hash accepts either case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadPath {
    group: String,
    segment: String,
    hash: FileHash,
}

impl DownloadPath {
    /// Build a path from its parts.
    ///
    /// Returns `None` if `group` or `segment` contains characters outside
    /// `[0-9A-Za-z_]`.
    pub fn new(group: &str, segment: &str, hash: FileHash) -> Option<Self> {
        if !is_name(group) || !is_name(segment) {
            return None;
        }
        Some(Self {
            group: group.to_string(),
            segment: segment.to_string(),
            hash,
        })
    }

    /// Parse and validate a path. Returns `None` when it does not match.
    pub fn parse(path: &str) -> Option<Self> {
        let rest = path.strip_prefix('/')?;
        let mut parts = rest.split('/');
        let group = parts.next()?;
        let segment = parts.next()?;
        let hash = parts.next()?;
        if parts.next().is_some() {
            return None;
        }
        Self::new(group, segment, hash.parse().ok()?)
    }

    /// Storage group component.
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Second path component.
    pub fn segment(&self) -> &str {
        &self.segment
    }

    /// Content hash named by the path.
    pub fn hash(&self) -> FileHash {
        self.hash
    }
}

impl fmt::Display for DownloadPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}/{}", self.group, self.segment, self.hash)
    }
}

fn is_name(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}
