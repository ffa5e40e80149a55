//! Skip-unchanged predicate.

/// Builds `((current...) IS DISTINCT FROM (new...))`.
///
/// `IS DISTINCT FROM` treats NULL as equal to NULL, so a NULL-to-NULL write
/// counts as unchanged. Returns `None` when there is nothing to compare.
pub fn change_predicate(current: &[String], new: &[String]) -> Option<String> {
    if current.is_empty() || current.len() != new.len() {
        return None;
    }
    Some(format!(
        "(({}) IS DISTINCT FROM ({}))",
        current.join(", "),
        new.join(", ")
    ))
}
