//! Destination resolution.
//!
//! Older documents carry a single `backup_path`/`remote_backup`, newer ones a
//! list. Both forms are merged into one ordered list: the single value first,
//! then list entries in document order, skipping empties and duplicates.

use std::path::PathBuf;

use crate::model::ConfigDocument;

/// Merge a single-value field with a list-value field, preserving order.
#[must_use]
pub fn merge_unique(single: &str, list: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(list.len() + 1);
    for candidate in std::iter::once(single).chain(list.iter().map(String::as_str)) {
        if candidate.is_empty() || merged.iter().any(|existing| existing == candidate) {
            continue;
        }
        merged.push(candidate.to_string());
    }
    merged
}

impl ConfigDocument {
    /// All configured local destinations.
    #[must_use]
    pub fn local_destinations(&self) -> Vec<PathBuf> {
        merge_unique(&self.backup_path, &self.backup_paths)
            .into_iter()
            .map(PathBuf::from)
            .collect()
    }

    /// All configured remote destinations.
    #[must_use]
    pub fn remote_destinations(&self) -> Vec<String> {
        merge_unique(&self.remote_backup, &self.remote_backups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_value_comes_first_and_duplicates_are_dropped() {
        let merged = merge_unique(
            "/backup/a",
            &[
                "/backup/b".to_string(),
                String::new(),
                "/backup/a".to_string(),
                "/backup/c".to_string(),
                "/backup/b".to_string(),
            ],
        );
        assert_eq!(merged, vec!["/backup/a", "/backup/b", "/backup/c"]);
    }

    #[test]
    fn empty_inputs_resolve_to_nothing() {
        assert!(merge_unique("", &[]).is_empty());
        assert!(merge_unique("", &[String::new()]).is_empty());
    }

    #[test]
    fn document_resolves_both_kinds() {
        let doc = ConfigDocument {
            backup_path: "/mnt/backup".into(),
            backup_paths: vec!["/mnt/backup".into(), "/mnt/mirror".into()],
            remote_backups: vec!["ops@vault:/srv/logs".into()],
            ..ConfigDocument::default()
        };
        assert_eq!(
            doc.local_destinations(),
            vec![PathBuf::from("/mnt/backup"), PathBuf::from("/mnt/mirror")]
        );
        assert_eq!(doc.remote_destinations(), vec!["ops@vault:/srv/logs"]);
    }
}
