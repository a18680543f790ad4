//! Tag listing.

use std::path::Path;

use super::{RepositoryError, run_git};

/// A tag and the commit it ultimately points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRef {
    pub name: String,
    pub commit: String,
}

impl TagRef {
    pub fn new(name: impl Into<String>, commit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commit: commit.into(),
        }
    }
}

const TAG_FORMAT: &str = "--format=%(refname:strip=2)%00%(objectname)%00%(*objectname)";

/// List every tag in the repository with its target commit.
///
/// Annotated tags are peeled to the commit they tag; lightweight tags
/// already point at one.
pub async fn list_tags(repo: &Path) -> Result<Vec<TagRef>, RepositoryError> {
    let stdout = run_git(repo, &["for-each-ref", TAG_FORMAT, "refs/tags"]).await?;
    stdout.lines().map(parse_tag_line).collect()
}

fn parse_tag_line(line: &str) -> Result<TagRef, RepositoryError> {
    let mut parts = line.split('\0');
    let (Some(name), Some(object)) = (parts.next(), parts.next()) else {
        return Err(RepositoryError::InvalidOutput(format!("tag line: {line:?}")));
    };
    let peeled = parts.next().unwrap_or_default();
    let commit = if peeled.is_empty() { object } else { peeled };
    Ok(TagRef::new(name, commit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::testing::*;

    #[test]
    fn parse_lightweight_and_annotated() {
        let light = parse_tag_line("release-1.0.0\0aaaa\0").unwrap();
        assert_eq!(light, TagRef::new("release-1.0.0", "aaaa"));

        let annotated = parse_tag_line("rel/release-2.0.0\0tagobj\0bbbb").unwrap();
        assert_eq!(annotated, TagRef::new("rel/release-2.0.0", "bbbb"));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_tag_line("no-separator").is_err());
    }

    #[tokio::test]
    async fn list_tags_peels_annotated_tags() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let first = git(dir.path(), &["rev-parse", "HEAD"]);
        git(dir.path(), &["tag", "release-1.0.0"]);
        let second = commit_file(dir.path(), "a.txt", "a\n", "second");
        git(dir.path(), &["tag", "-a", "rel/release-1.1.0", "-m", "1.1.0"]);

        let mut tags = list_tags(dir.path()).await.unwrap();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(
            tags,
            vec![
                TagRef::new("rel/release-1.1.0", second),
                TagRef::new("release-1.0.0", first),
            ]
        );
    }

    #[tokio::test]
    async fn list_tags_empty_repo_has_none() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        assert!(list_tags(dir.path()).await.unwrap().is_empty());
    }
}
