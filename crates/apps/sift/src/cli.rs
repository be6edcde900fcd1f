//! Command-line arguments

use clap::Parser;
use inbox::{MatchMode, SearchSettings};

#[derive(Debug, Parser)]
#[command(name = "sift")]
#[command(
    about = "Search your Gmail mailbox for emails a language model judges relevant",
    long_about = None
)]
pub struct Cli {
    /// What the emails should be about
    #[arg(required_unless_present = "logout")]
    pub query: Option<String>,

    /// Give up after this many listing pages
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Concurrent message detail fetches per page
    #[arg(long)]
    pub fetch_concurrency: Option<usize>,

    /// Concurrent classification calls (1 = sequential)
    #[arg(long)]
    pub classify_concurrency: Option<usize>,

    /// Only count an exact "true" answer as relevant
    #[arg(long)]
    pub strict: bool,

    /// Fail instead of opening a browser for Gmail consent
    #[arg(long)]
    pub non_interactive: bool,

    /// Forget the cached Gmail token and exit
    #[arg(long, conflicts_with = "query")]
    pub logout: bool,
}

impl Cli {
    /// The query with surrounding whitespace removed, `None` if blank
    pub fn query(&self) -> Option<&str> {
        self.query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
    }

    /// Layer flag overrides on top of the loaded settings
    pub fn apply(&self, mut settings: SearchSettings) -> SearchSettings {
        if let Some(max_pages) = self.max_pages {
            settings.max_pages = max_pages;
        }
        if let Some(concurrency) = self.fetch_concurrency {
            settings.fetch_concurrency = concurrency;
        }
        if let Some(concurrency) = self.classify_concurrency {
            settings.classify_concurrency = concurrency;
        }
        if self.strict {
            settings.match_mode = MatchMode::Strict;
        }
        if self.non_interactive {
            settings.interactive = false;
        }
        settings.normalized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("sift").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_query_required() {
        assert!(Cli::try_parse_from(["sift"]).is_err());
        assert!(Cli::try_parse_from(["sift", "--strict"]).is_err());
    }

    #[test]
    fn test_logout_without_query() {
        let cli = parse(&["--logout"]);
        assert!(cli.logout);
        assert_eq!(cli.query(), None);
        assert!(Cli::try_parse_from(["sift", "--logout", "invoices"]).is_err());
    }

    #[test]
    fn test_blank_query() {
        assert_eq!(parse(&["   "]).query(), None);
        assert_eq!(parse(&[" flight to Lisbon "]).query(), Some("flight to Lisbon"));
    }

    #[test]
    fn test_defaults_leave_settings_alone() {
        let settings = parse(&["invoices"]).apply(SearchSettings::default());
        assert_eq!(settings, SearchSettings::default());
    }

    #[test]
    fn test_flags_override_settings() {
        let cli = parse(&[
            "invoices",
            "--max-pages",
            "3",
            "--fetch-concurrency",
            "8",
            "--classify-concurrency",
            "0",
            "--strict",
            "--non-interactive",
        ]);
        let settings = cli.apply(SearchSettings::default());

        assert_eq!(settings.max_pages, 3);
        assert_eq!(settings.fetch_concurrency, 8);
        assert_eq!(settings.classify_concurrency, 1);
        assert_eq!(settings.match_mode, MatchMode::Strict);
        assert!(!settings.interactive);
    }
}
