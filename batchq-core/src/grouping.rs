//! File grouping
//!
//! Splits a job's files into groups bounded by a file count and a
//! cumulative byte budget. Files are sorted ascending by estimated size
//! (stable on their original index) and packed greedily, so the same input
//! always yields the same groups.

use crate::domain::file::FileDescriptor;

/// Limits applied to each group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupLimits {
    pub max_files: usize,
    pub max_bytes: u64,
}

/// Partition `files` into ordered groups
///
/// A file larger than `max_bytes` on its own still forms a single-file
/// group. An empty input yields no groups.
pub fn group_files(files: &[FileDescriptor], limits: GroupLimits) -> Vec<Vec<&FileDescriptor>> {
    let max_files = limits.max_files.max(1);

    let mut ordered: Vec<&FileDescriptor> = files.iter().collect();
    // sort_by_key is stable: equal sizes keep their submission order
    ordered.sort_by_key(|file| file.estimated_size());

    let mut groups = Vec::new();
    let mut current: Vec<&FileDescriptor> = Vec::new();
    let mut current_bytes: u64 = 0;

    for file in ordered {
        let size = file.estimated_size();
        let over_count = current.len() + 1 > max_files;
        let over_budget = current_bytes.saturating_add(size) > limits.max_bytes;

        if !current.is_empty() && (over_count || over_budget) {
            groups.push(std::mem::take(&mut current));
            current_bytes = 0;
        }

        current_bytes = current_bytes.saturating_add(size);
        current.push(file);
    }

    if !current.is_empty() {
        groups.push(current);
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn file(name: &str, size: u64) -> FileDescriptor {
        FileDescriptor {
            name: name.to_string(),
            content: format!("ref://{}", name),
            size: Some(size),
            mime_type: None,
        }
    }

    fn names<'a>(group: &[&'a FileDescriptor]) -> Vec<&'a str> {
        group.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn test_empty_input_yields_no_groups() {
        let limits = GroupLimits {
            max_files: 4,
            max_bytes: 100,
        };
        assert!(group_files(&[], limits).is_empty());
    }

    #[test]
    fn test_ten_files_four_per_group() {
        let files: Vec<_> = (0..10).map(|i| file(&format!("f{}", i), 10)).collect();
        let limits = GroupLimits {
            max_files: 4,
            max_bytes: u64::MAX,
        };

        let groups = group_files(&files, limits);
        let sizes: Vec<usize> = groups.iter().map(|g| g.len()).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(names(&groups[0]), vec!["f0", "f1", "f2", "f3"]);
    }

    #[test]
    fn test_sorts_by_size_and_respects_budget() {
        let files = vec![file("big", 70), file("small", 10), file("mid", 40)];
        let limits = GroupLimits {
            max_files: 10,
            max_bytes: 100,
        };

        let groups = group_files(&files, limits);
        assert_eq!(groups.len(), 2);
        assert_eq!(names(&groups[0]), vec!["small", "mid"]);
        assert_eq!(names(&groups[1]), vec!["big"]);
    }

    #[test]
    fn test_oversized_file_forms_own_group() {
        let files = vec![file("a", 5), file("huge", 500), file("b", 5)];
        let limits = GroupLimits {
            max_files: 10,
            max_bytes: 50,
        };

        let groups = group_files(&files, limits);
        assert_eq!(groups.len(), 2);
        assert_eq!(names(&groups[0]), vec!["a", "b"]);
        assert_eq!(names(&groups[1]), vec!["huge"]);
    }

    #[test]
    fn test_grouping_is_deterministic() {
        let files = vec![file("x", 3), file("y", 3), file("z", 1), file("w", 3)];
        let limits = GroupLimits {
            max_files: 2,
            max_bytes: 100,
        };

        let first: Vec<Vec<&str>> = group_files(&files, limits).iter().map(|g| names(g)).collect();
        let second: Vec<Vec<&str>> =
            group_files(&files, limits).iter().map(|g| names(g)).collect();
        assert_eq!(first, second);
        assert_eq!(first, vec![vec!["z", "x"], vec!["y", "w"]]);
    }

    #[test]
    fn test_every_file_grouped_once_within_limits() {
        let mut rng = StdRng::seed_from_u64(0x5eed);

        for _ in 0..200 {
            let count = rng.random_range(0..40);
            let files: Vec<_> = (0..count)
                .map(|i| file(&format!("f{}", i), rng.random_range(0..2_000)))
                .collect();
            let limits = GroupLimits {
                max_files: rng.random_range(1..8),
                max_bytes: rng.random_range(1..5_000),
            };

            let groups = group_files(&files, limits);

            let mut seen: Vec<&str> = groups.iter().flat_map(|g| names(g)).collect();
            seen.sort_unstable();
            let mut expected: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
            expected.sort_unstable();
            assert_eq!(seen, expected);

            for group in &groups {
                assert!(!group.is_empty());
                assert!(group.len() <= limits.max_files);
                let bytes: u64 = group.iter().map(|f| f.estimated_size()).sum();
                assert!(
                    bytes <= limits.max_bytes || group.len() == 1,
                    "group of {} files with {} bytes exceeds budget {}",
                    group.len(),
                    bytes,
                    limits.max_bytes
                );
            }
        }
    }
}
