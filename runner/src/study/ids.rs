use std::collections::HashSet;
use uuid::Uuid;

/// length of the random token appended to id prefixes
const TOKEN_LENGTH: usize = 12;

pub fn short_token() -> String {
    let mut token = Uuid::new_v4().simple().to_string();
    token.truncate(TOKEN_LENGTH);
    token
}

/// Pick an id that is not part of `taken`.
///
/// A requested `id` is kept as is when it is free, otherwise it becomes the prefix for a
/// random suffix. Without a requested id, `prefix` (or `sim`) is suffixed.
pub fn unique_id(taken: &HashSet<String>, prefix: Option<&str>, id: Option<&str>) -> String {
    if let Some(id) = id.filter(|id| !id.is_empty()) {
        if !taken.contains(id) {
            return id.to_owned();
        }
    }

    let prefix = id
        .filter(|id| !id.is_empty())
        .or(prefix)
        .unwrap_or("sim");

    loop {
        let candidate = format!("{prefix}_{}", short_token());

        if !taken.contains(&candidate) {
            return candidate;
        }
    }
}
