//! Which files and directories make it into the corpus.

/// Suffixes eligible for inclusion: prose and docs, structured config, and
/// common source languages.
pub const ELIGIBLE_EXTENSIONS: &[&str] = &[
    // prose / docs
    ".md", ".txt", ".rst", ".adoc", ".html", ".pdf",
    // structured config
    ".json", ".yml", ".yaml", ".toml",
    // source
    ".ts", ".js", ".tsx", ".jsx", ".py", ".java", ".c", ".cpp", ".h", ".cs", ".go", ".rs", ".php",
    ".rb", ".css",
];

/// Directory names pruned from traversal along with everything beneath them.
pub const IGNORED_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "dist",
    "build",
    "coverage",
    "vendor",
    "bin",
    "obj",
];

/// Lower-cased extension of `filename` including the dot, or `""`.
///
/// Dotfiles without a further dot (`.gitignore`) have no extension.
pub fn extension_of(filename: &str) -> String {
    match filename.rfind('.') {
        Some(0) | None => String::new(),
        Some(idx) => filename[idx..].to_ascii_lowercase(),
    }
}

/// `true` when the file should be read into the corpus.
///
/// Names containing `lock` are rejected whatever their extension, which keeps
/// `package-lock.json`, `Cargo.lock` and friends out.
pub fn is_eligible(filename: &str) -> bool {
    if filename.contains("lock") {
        return false;
    }
    let ext = extension_of(filename);
    !ext.is_empty() && ELIGIBLE_EXTENSIONS.contains(&ext.as_str())
}

pub fn is_ignored_dir(name: &str) -> bool {
    IGNORED_DIRS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_allowed_extensions_case_insensitively() {
        assert!(is_eligible("README.md"));
        assert!(is_eligible("main.RS"));
        assert!(is_eligible("config.Yaml"));
        assert!(is_eligible("manual.pdf"));
    }

    #[test]
    fn rejects_unknown_extensions() {
        assert!(!is_eligible("image.png"));
        assert!(!is_eligible("Makefile"));
        assert!(!is_eligible(".gitignore"));
        assert!(!is_eligible("archive.tar.gz"));
    }

    #[test]
    fn rejects_lock_files_regardless_of_extension() {
        assert!(!is_eligible("package-lock.json"));
        assert!(!is_eligible("yarn.lock"));
        assert!(!is_eligible("pnpm-lock.yaml"));
        assert!(!is_eligible("blocking.rs"));
    }

    #[test]
    fn extension_uses_last_dot() {
        assert_eq!(extension_of("a.test.TS"), ".ts");
        assert_eq!(extension_of("noext"), "");
        assert_eq!(extension_of(".env"), "");
    }

    #[test]
    fn ignored_dirs_are_exact_names() {
        assert!(is_ignored_dir("node_modules"));
        assert!(is_ignored_dir(".git"));
        assert!(!is_ignored_dir("builds"));
        assert!(!is_ignored_dir("src"));
    }
}
