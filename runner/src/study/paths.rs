use std::path::{Component, Path, PathBuf};

/// Directory that relative paths of a study file are stored against
pub fn base_dir(study_file: &Path) -> PathBuf {
    match study_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Relative paths reported for a study are taken relative to its directory
pub fn resolve(path: &Path, base: &Path) -> PathBuf {
    if path.is_relative() {
        base.join(path)
    } else {
        path.to_path_buf()
    }
}

/// Turn `path` into a `/` separated string, relative to `base` where possible
pub fn to_portable(path: &Path, base: &Path) -> String {
    let relative = path.strip_prefix(base).unwrap_or(path);
    let mut parts = Vec::new();
    let mut absolute = false;

    for component in relative.components() {
        match component {
            Component::Prefix(prefix) => parts.push(prefix.as_os_str().to_string_lossy().into_owned()),
            Component::RootDir => absolute = true,
            Component::CurDir => {}
            Component::ParentDir => parts.push("..".to_owned()),
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
        }
    }

    let joined = parts.join("/");

    if absolute && !joined.contains(':') {
        format!("/{joined}")
    } else {
        joined
    }
}

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

/// Resolve a stored path against `base`, accepting either separator
pub fn from_portable(value: &str, base: &Path) -> PathBuf {
    let mut parts = value.split(is_separator).filter(|part| !part.is_empty());
    let is_drive = |part: &str| part.len() == 2 && part.ends_with(':');

    let mut path = if value.starts_with(is_separator) {
        PathBuf::from(std::path::MAIN_SEPARATOR_STR)
    } else {
        match value.split(is_separator).next() {
            Some(first) if is_drive(first) => {
                parts.next();
                PathBuf::from(format!("{first}{}", std::path::MAIN_SEPARATOR))
            }
            _ => base.to_path_buf(),
        }
    };

    path.extend(parts);
    path
}
