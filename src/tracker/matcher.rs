/// Case-insensitive substring test of `pattern` in `title`. An empty (or blank) pattern matches
/// every title, including an empty one.
pub fn matches_target(pattern: &str, title: &str) -> bool {
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return true;
    }
    title.to_lowercase().contains(&pattern.to_lowercase())
}
