//! Mapping between Droid's encoded project directory names and real paths.
//!
//! Droid stores each project's sessions under a directory named after the
//! absolute working directory with every `/` replaced by `-`, e.g.
//! `-Users-dev-projects-work-atlas`. The mapping is lossy: a real segment
//! that itself contains `-` cannot be told apart from a separator.

/// Segment after which the project group is read
const GROUP_MARKER: &str = "projects";
const DEFAULT_GROUP: &str = "other";
const UNKNOWN_PROJECT: &str = "unknown";

/// Project identity recovered from an encoded directory name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectInfo {
    pub path: String,
    pub name: String,
    pub group: String,
}

/// Decode a project directory name into path, name and group
pub fn decode(dir_name: &str) -> ProjectInfo {
    let replaced = dir_name.replace('-', "/");
    let relative = replaced.strip_prefix('/').unwrap_or(&replaced);
    let parts: Vec<&str> = relative.split('/').collect();

    let name = match parts.last() {
        Some(last) if !last.is_empty() => last.to_string(),
        _ => UNKNOWN_PROJECT.to_string(),
    };

    let group = parts
        .iter()
        .position(|part| *part == GROUP_MARKER)
        .and_then(|idx| parts.get(idx + 1))
        .filter(|part| !part.is_empty())
        .map(|part| part.to_string())
        .unwrap_or_else(|| DEFAULT_GROUP.to_string());

    ProjectInfo {
        path: format!("/{relative}"),
        name,
        group,
    }
}

/// Encode an absolute path the way Droid names its project directories
pub fn encode(path: &str) -> String {
    path.replace('/', "-")
}
