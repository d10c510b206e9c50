//! Composite resource identities.
//!
//! Resource IDs persisted by the orchestrator are `:`-joined tuples. The
//! file-set resource additionally packs its path list into the last
//! component, joined by `,`:
//!
//! ```text
//! group/project:main:README.md,docs/intro.md
//! ```
//!
//! Decoding splits on the first `n - 1` delimiters only, so the final
//! component may itself contain `:`. Non-final components must not contain
//! `:`; this is not checked when encoding.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Separator between identity components.
pub const ID_DELIMITER: char = ':';

/// Separator between file paths in the last component of a [`FilesId`].
pub const PATH_DELIMITER: char = ',';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("malformed identity {id:?}: expected {expected}")]
    MalformedIdentity { id: String, expected: &'static str },
}

/// Join identity components with [`ID_DELIMITER`].
#[must_use]
pub fn encode(parts: &[&str]) -> String {
    parts.join(ID_DELIMITER.to_string().as_str())
}

/// Join file paths with [`PATH_DELIMITER`] in lexicographic order.
#[must_use]
pub fn encode_paths<'a>(paths: impl IntoIterator<Item = &'a str>) -> String {
    let sorted: BTreeSet<&str> = paths.into_iter().collect();
    sorted
        .into_iter()
        .collect::<Vec<_>>()
        .join(PATH_DELIMITER.to_string().as_str())
}

/// Split `id` into exactly `expected_parts` components.
///
/// Fails when fewer components are present.
pub fn decode(id: &str, expected_parts: usize) -> Result<Vec<String>, IdentityError> {
    let parts: Vec<String> = id
        .splitn(expected_parts, ID_DELIMITER)
        .map(str::to_string)
        .collect();
    if parts.len() < expected_parts {
        return Err(IdentityError::MalformedIdentity {
            id: id.to_string(),
            expected: layout_hint(expected_parts),
        });
    }
    Ok(parts)
}

fn layout_hint(parts: usize) -> &'static str {
    match parts {
        2 => "project:key",
        3 => "project:branch:path",
        _ => "more components",
    }
}

/// Generic `project:key` identity used by simple adapters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TwoPartId {
    pub first: String,
    pub second: String,
}

impl TwoPartId {
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self {
            first: first.into(),
            second: second.into(),
        }
    }
}

impl FromStr for TwoPartId {
    type Err = IdentityError;

    fn from_str(id: &str) -> Result<Self, Self::Err> {
        let mut parts = decode(id, 2)?.into_iter();
        match (parts.next(), parts.next()) {
            (Some(first), Some(second)) => Ok(Self { first, second }),
            _ => Err(malformed(id, "project:key")),
        }
    }
}

impl fmt::Display for TwoPartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode(&[&self.first, &self.second]))
    }
}

/// Identity of a single repository file: `project:branch:path`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileId {
    pub project: String,
    pub branch: String,
    pub path: String,
}

impl FileId {
    pub fn new(
        project: impl Into<String>,
        branch: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            branch: branch.into(),
            path: path.into(),
        }
    }
}

impl FromStr for FileId {
    type Err = IdentityError;

    fn from_str(id: &str) -> Result<Self, Self::Err> {
        let [project, branch, path] = three_parts(id, "project:branch:path")?;
        if path.is_empty() {
            return Err(malformed(id, "project:branch:path"));
        }
        Ok(Self {
            project,
            branch,
            path,
        })
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode(&[&self.project, &self.branch, &self.path]))
    }
}

/// Identity of a managed file set: `project:branch:path1,path2,...`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilesId {
    pub project: String,
    pub branch: String,
    pub paths: BTreeSet<String>,
}

impl FilesId {
    pub fn new<I, S>(project: impl Into<String>, branch: impl Into<String>, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            project: project.into(),
            branch: branch.into(),
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }
}

impl FromStr for FilesId {
    type Err = IdentityError;

    fn from_str(id: &str) -> Result<Self, Self::Err> {
        const LAYOUT: &str = "project:branch:file_path1,file_path2,...";
        let [project, branch, paths] = three_parts(id, LAYOUT)?;
        let paths: BTreeSet<String> = paths
            .split(PATH_DELIMITER)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        if paths.is_empty() {
            return Err(malformed(id, LAYOUT));
        }
        Ok(Self {
            project,
            branch,
            paths,
        })
    }
}

impl fmt::Display for FilesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let paths = encode_paths(self.paths.iter().map(String::as_str));
        f.write_str(&encode(&[&self.project, &self.branch, &paths]))
    }
}

fn three_parts(id: &str, expected: &'static str) -> Result<[String; 3], IdentityError> {
    let parts = decode(id, 3).map_err(|_| malformed(id, expected))?;
    <[String; 3]>::try_from(parts).map_err(|_| malformed(id, expected))
}

fn malformed(id: &str, expected: &'static str) -> IdentityError {
    IdentityError::MalformedIdentity {
        id: id.to_string(),
        expected,
    }
}
