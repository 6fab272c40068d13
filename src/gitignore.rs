//! Root `.gitignore` matching for the walker

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::Path;
use tokio::fs;
use tracing::{debug, warn};

/// Load `root/.gitignore`, or `None` when there is no readable file.
pub async fn load(root: &Path) -> Option<Gitignore> {
    match fs::read_to_string(root.join(".gitignore")).await {
        Ok(contents) => Some(from_contents(root, &contents)),
        Err(e) => {
            debug!("No usable .gitignore in {}: {}", root.display(), e);
            None
        }
    }
}

/// Build a matcher rooted at `root`.
///
/// Lines that fail to parse are dropped with a warning and the rest still
/// apply. The file is not caller input, so it never fails the walk.
pub fn from_contents(root: &Path, contents: &str) -> Gitignore {
    let mut builder = GitignoreBuilder::new(root);
    for line in contents.lines() {
        if let Err(e) = builder.add_line(None, line) {
            warn!("Ignoring .gitignore entry '{}': {}", line.trim(), e);
        }
    }

    builder.build().unwrap_or_else(|e| {
        warn!("Failed to build .gitignore matcher for {}: {}", root.display(), e);
        Gitignore::empty()
    })
}

/// True when `path` (absolute, under the matcher root) is ignored.
/// Negated entries whitelist.
pub fn is_ignored(gitignore: &Gitignore, path: &Path, is_dir: bool) -> bool {
    gitignore.matched(path, is_dir).is_ignore()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_line_is_dropped() {
        let root = Path::new("/repo");
        let gitignore = from_contents(root, "foo[\n*.log\n");

        assert!(is_ignored(&gitignore, &root.join("server.log"), false));
        assert!(!is_ignored(&gitignore, &root.join("src/main.rs"), false));
    }

    #[test]
    fn test_inner_slash_anchors_to_root() {
        let root = Path::new("/repo");
        let gitignore = from_contents(root, "docs/gen/\n");

        assert!(is_ignored(&gitignore, &root.join("docs/gen"), true));
        assert!(!is_ignored(&gitignore, &root.join("src/docs/gen"), true));
        // Trailing slash only applies to directories
        assert!(!is_ignored(&gitignore, &root.join("docs/gen"), false));
    }

    #[test]
    fn test_negation_and_escaped_hash() {
        let root = Path::new("/repo");
        let gitignore = from_contents(root, "*.log\n!keep.log\n\\#notes\n# comment\n");

        assert!(is_ignored(&gitignore, &root.join("debug.log"), false));
        assert!(!is_ignored(&gitignore, &root.join("keep.log"), false));
        assert!(is_ignored(&gitignore, &root.join("#notes"), false));
        assert!(!is_ignored(&gitignore, &root.join("comment"), false));
    }
}
