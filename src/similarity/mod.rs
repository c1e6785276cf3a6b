//! External similarity (plagiarism) tool integration
//!
//! The engine does not detect copied code itself; it shells out to a
//! per-language tool (JPlag-compatible invocation) and treats the
//! trailing numeric token of its stdout as an opaque percentage. One
//! blocking call per file pair, no timeout, no retry. Parse failures are
//! soft: the file simply stays unscored.

use std::path::Path;
use std::process::Command;
use tracing::{debug, warn};

/// Map a file extension (without the dot) to the tool's language name.
/// Unsupported extensions return `None` and the caller skips the file.
pub fn language_for(extension: &str) -> Option<&'static str> {
    const CPP_EXTS: &[&str] = &[
        "cpp", "CPP", "cxx", "CXX", "c++", "C++", "c", "C", "cc", "CC", "h", "H", "hpp", "HPP",
        "hh", "HH",
    ];
    const TXT_EXTS: &[&str] = &["TXT", "txt", "ASC", "asc", "TEX", "tex"];

    if CPP_EXTS.contains(&extension) {
        Some("c/c++")
    } else if extension == "cs" || extension == "CS" {
        Some("c#-1.2")
    } else if extension == "java" || extension == "JAVA" {
        Some("java19")
    } else if extension == "py" {
        Some("python3")
    } else if TXT_EXTS.contains(&extension) {
        Some("text")
    } else {
        None
    }
}

/// Parse the last whitespace-delimited token of the tool output as a
/// percentage.
pub fn parse_trailing_percentage(stdout: &str) -> Option<f64> {
    stdout.split_whitespace().last()?.parse::<f64>().ok()
}

/// Invokes the configured external similarity command on file pairs.
pub struct SimilarityScorer {
    /// Command prefix, e.g. `["java", "-jar", "jplag.jar", "-t", "1", "-vq"]`.
    command: Vec<String>,
}

impl SimilarityScorer {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }

    /// Score one (new, old) file pair. Returns the reported percentage,
    /// or `None` when the tool failed to run or its output did not end
    /// in a number.
    pub fn score_pair(&self, language: &str, new_file: &Path, old_file: &Path) -> Option<f64> {
        let (program, args) = self.command.split_first()?;

        let output = match Command::new(program)
            .args(args)
            .arg("-l")
            .arg(language)
            .arg("-c")
            .arg(new_file)
            .arg(old_file)
            .output()
        {
            Ok(out) => out,
            Err(e) => {
                warn!("Similarity tool failed to start: {}", e);
                return None;
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        match parse_trailing_percentage(&stdout) {
            Some(value) => {
                debug!(
                    "Similarity {:.1}% for {}",
                    value,
                    new_file.file_name().unwrap_or_default().to_string_lossy()
                );
                Some(value)
            }
            None => {
                warn!(
                    "Similarity detection unsuccessful, unparsable output: {}",
                    stdout.trim()
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_table() {
        assert_eq!(language_for("cpp"), Some("c/c++"));
        assert_eq!(language_for("H"), Some("c/c++"));
        assert_eq!(language_for("cs"), Some("c#-1.2"));
        assert_eq!(language_for("java"), Some("java19"));
        assert_eq!(language_for("py"), Some("python3"));
        assert_eq!(language_for("tex"), Some("text"));
        assert_eq!(language_for("rs"), None);
        assert_eq!(language_for(""), None);
    }

    #[test]
    fn test_parse_trailing_percentage() {
        assert_eq!(
            parse_trailing_percentage("Comparing a.py-b.py: 87.5"),
            Some(87.5)
        );
        assert_eq!(parse_trailing_percentage("100"), Some(100.0));
        assert_eq!(parse_trailing_percentage("no numbers here"), None);
        assert_eq!(parse_trailing_percentage(""), None);
        // Only the final token counts.
        assert_eq!(parse_trailing_percentage("12.5 then error"), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_score_pair_with_fake_tool() {
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("fake-similarity.sh");
        {
            let mut f = std::fs::File::create(&tool).unwrap();
            writeln!(f, "#!/bin/sh\necho \"Comparing pair: 42.5\"").unwrap();
        }
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();

        let scorer = SimilarityScorer::new(vec![tool.to_string_lossy().to_string()]);
        let new_file = dir.path().join("new.py");
        let old_file = dir.path().join("old.py");
        std::fs::write(&new_file, "a\n").unwrap();
        std::fs::write(&old_file, "b\n").unwrap();

        assert_eq!(scorer.score_pair("python3", &new_file, &old_file), Some(42.5));
    }

    #[cfg(unix)]
    #[test]
    fn test_score_pair_unparsable_output_is_unscored() {
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("broken-similarity.sh");
        {
            let mut f = std::fs::File::create(&tool).unwrap();
            writeln!(f, "#!/bin/sh\necho \"tool crashed horribly\"").unwrap();
        }
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();

        let scorer = SimilarityScorer::new(vec![tool.to_string_lossy().to_string()]);
        assert_eq!(
            scorer.score_pair("text", Path::new("x.txt"), Path::new("y.txt")),
            None
        );
    }
}
