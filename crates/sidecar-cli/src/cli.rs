//! CLI argument parsing with clap.

use clap::{Parser, Subcommand};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

/// sidecar - inspect and maintain per-document settings files
#[derive(Parser, Debug)]
#[command(name = "sidecar", version, about = "Inspect and maintain document sidecar settings")]
pub struct Cli {
    /// Sidecar home directory (overrides SIDECAR_HOME)
    #[arg(long, value_name = "DIR", global = true)]
    pub home: Option<PathBuf>,

    /// Log reads, writes and purges to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print results as JSON
    #[arg(long = "json-output", global = true)]
    pub json_output: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Print the settings of a document
    Show { doc: PathBuf },

    /// Print one setting
    Get { doc: PathBuf, key: String },

    /// Set one setting; VALUE is JSON, bare words are taken as strings
    Set {
        doc: PathBuf,
        key: String,
        value: String,
    },

    /// Remove one setting
    Unset { doc: PathBuf, key: String },

    /// List every sidecar file found for a document, newest first
    Candidates { doc: PathBuf },

    /// Delete every sidecar file of a document
    Purge { doc: PathBuf },

    /// Report whether a document has a sidecar
    Exists { doc: PathBuf },

    /// Move settings to a renamed document
    Mv { old: PathBuf, new: PathBuf },

    /// Copy settings to another document
    Cp { old: PathBuf, new: PathBuf },

    /// Delete settings and the cache file of a removed document
    Rm { doc: PathBuf },

    /// Print the legacy history file name of a document
    HistoryName { doc: PathBuf },

    /// Recover a document path from a legacy history file name
    FromHistory { name: String },

    /// Print the effective configuration
    Config,
}

/// Turn a document argument into the identifier used for its sidecar.
///
/// Relative paths are made absolute against the working directory so the
/// same document always maps to the same sidecar.
pub fn doc_id(path: &Path) -> io::Result<String> {
    let absolute = std::path::absolute(path)?;
    absolute.to_str().map(str::to_string).ok_or_else(|| {
        io::Error::new(
            ErrorKind::InvalidInput,
            format!("document path is not valid UTF-8: {}", absolute.display()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut full = vec!["sidecar"];
        full.extend_from_slice(args);
        Cli::try_parse_from(full).unwrap()
    }

    #[test]
    fn test_parse_show() {
        let cli = parse(&["show", "/books/novel.epub"]);
        assert_eq!(
            cli.command,
            Command::Show {
                doc: PathBuf::from("/books/novel.epub")
            }
        );
        assert!(!cli.verbose);
        assert!(!cli.json_output);
    }

    #[test]
    fn test_parse_set_with_json_value() {
        let cli = parse(&["set", "/books/novel.epub", "page", "42"]);
        assert_eq!(
            cli.command,
            Command::Set {
                doc: PathBuf::from("/books/novel.epub"),
                key: "page".to_string(),
                value: "42".to_string(),
            }
        );
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = parse(&["get", "/b/x.pdf", "page", "--json-output", "-v", "--home", "/tmp/h"]);
        assert!(cli.json_output);
        assert!(cli.verbose);
        assert_eq!(cli.home, Some(PathBuf::from("/tmp/h")));
    }

    #[test]
    fn test_parse_kebab_case_commands() {
        assert!(matches!(
            parse(&["history-name", "/b/x.pdf"]).command,
            Command::HistoryName { .. }
        ));
        assert!(matches!(
            parse(&["from-history", "[#b#] x.pdf.lua"]).command,
            Command::FromHistory { .. }
        ));
        assert_eq!(parse(&["config"]).command, Command::Config);
    }

    #[test]
    fn test_mv_requires_two_paths() {
        assert!(Cli::try_parse_from(["sidecar", "mv", "/b/x.pdf"]).is_err());
    }

    #[test]
    fn test_doc_id_absolutizes() {
        let id = doc_id(Path::new("novel.epub")).unwrap();
        assert!(id.starts_with('/'));
        assert!(id.ends_with("/novel.epub"));
        assert_eq!(
            doc_id(Path::new("/books/novel.epub")).unwrap(),
            "/books/novel.epub"
        );
    }
}
