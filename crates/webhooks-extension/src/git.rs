//! Parsing and comparison of Git repository URLs.

use snafu::{OptionExt, ResultExt, Snafu, ensure};
use url::Url;

type Result<T, E = GitUrlError> = std::result::Result<T, E>;

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum GitUrlError {
    #[snafu(display("failed to parse git repository url {url:?}"))]
    ParseUrl { source: url::ParseError, url: String },

    #[snafu(display("git repository url {url:?} uses the unsupported scheme {scheme:?}"))]
    UnsupportedScheme { url: String, scheme: String },

    #[snafu(display("git repository url {url:?} has an invalid hostname"))]
    InvalidHostname { url: String },

    #[snafu(display("git repository url {url:?} must have the path /<org>/<repo>"))]
    InvalidPath { url: String },
}

/// A repository on a Git hosting provider, identified by `<scheme>://<server>/<org>/<repo>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GitRepository {
    url: Url,
    server: String,
    org: String,
    repo: String,
}

impl GitRepository {
    /// Parses and validates a repository URL. A trailing `.git` is accepted and stripped,
    /// trailing slashes are not.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.strip_suffix(".git").unwrap_or(raw);
        let url = Url::parse(trimmed).context(ParseUrlSnafu { url: raw })?;

        ensure!(
            matches!(url.scheme(), "http" | "https"),
            UnsupportedSchemeSnafu {
                url: raw,
                scheme: url.scheme()
            }
        );

        let server = url
            .host_str()
            .filter(|host| {
                host.strip_suffix(".com")
                    .and_then(|rest| rest.rsplit('.').next())
                    .is_some_and(|label| !label.is_empty())
            })
            .context(InvalidHostnameSnafu { url: raw })?
            .to_owned();

        let (org, repo) = match url.path().split('/').collect::<Vec<_>>().as_slice() {
            ["", org, repo] if !org.is_empty() && !repo.is_empty() => {
                ((*org).to_owned(), (*repo).to_owned())
            }
            _ => return InvalidPathSnafu { url: raw }.fail(),
        };

        Ok(Self {
            url,
            server,
            org,
            repo,
        })
    }

    /// The URL without a `.git` suffix.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The hostname of the Git server, e.g. `github.com`.
    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// The URL without a trailing slash, as used for hub topics.
    pub fn base_url(&self) -> &str {
        self.url.as_str().trim_end_matches('/')
    }
}

/// Returns whether two repository URLs refer to the same repository. Case, a trailing slash and a
/// `.git` suffix are ignored.
pub fn is_same_repository(left: &str, right: &str) -> bool {
    normalize(left) == normalize(right)
}

fn normalize(url: &str) -> String {
    let url = url.trim().to_lowercase();
    let url = url.trim_end_matches('/');
    url.strip_suffix(".git").unwrap_or(url).to_owned()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("https://gitpalace.com/org/repo.git", "gitpalace.com", "org", "repo")]
    #[case("https://gitpalace.com/org/repo", "gitpalace.com", "org", "repo")]
    #[case("http://gitpalace.com/org/repo.git", "gitpalace.com", "org", "repo")]
    #[case("http://gitpalace.com/org/repo", "gitpalace.com", "org", "repo")]
    #[case("https://github.com/tektoncd/pipeline", "github.com", "tektoncd", "pipeline")]
    #[case("https://github.ibm.com/owner/repo", "github.ibm.com", "owner", "repo")]
    fn parse_valid_urls(
        #[case] input: &str,
        #[case] server: &str,
        #[case] org: &str,
        #[case] repo: &str,
    ) {
        let repository = GitRepository::parse(input).expect("url must be valid");
        assert_eq!(repository.server(), server);
        assert_eq!(repository.org(), org);
        assert_eq!(repository.repo(), repo);
    }

    #[rstest]
    #[case("abcd://gitpalace.com/org/repo.git")]
    #[case("https://gitpalace.io/org/repo")]
    #[case("https://gitpalace.com//repo.git")]
    #[case("https://gitpalace.com/org/")]
    #[case("https:///org/repo")]
    #[case("https://.com/org/repo")]
    #[case("https://gitpalace.com/org/repo/")]
    #[case("https://gitpalace.com/org/repo/extra")]
    #[case("gitpalace.com/org/repo")]
    #[case("")]
    fn parse_invalid_urls(#[case] input: &str) {
        assert!(GitRepository::parse(input).is_err(), "{input:?} must be rejected");
    }

    #[test]
    fn parse_reports_unsupported_scheme() {
        let error = GitRepository::parse("ftp://gitpalace.com/org/repo")
            .expect_err("ftp must be rejected");
        assert_eq!(
            error,
            GitUrlError::UnsupportedScheme {
                url: "ftp://gitpalace.com/org/repo".to_owned(),
                scheme: "ftp".to_owned()
            }
        );
    }

    #[test]
    fn base_url_strips_git_suffix() {
        let repository = GitRepository::parse("https://github.com/owner/repo.git")
            .expect("url must be valid");
        assert_eq!(repository.base_url(), "https://github.com/owner/repo");
    }

    #[rstest]
    #[case("https://github.com/owner/repo", "https://github.com/owner/repo", true)]
    #[case("https://github.com/owner/repo.git", "https://github.com/owner/repo", true)]
    #[case("https://GitHub.com/Owner/Repo/", "https://github.com/owner/repo", true)]
    #[case("https://github.com/owner/repo", "https://github.com/owner/other", false)]
    #[case("http://github.com/owner/repo", "https://github.com/owner/repo", false)]
    fn same_repository(#[case] left: &str, #[case] right: &str, #[case] expected: bool) {
        assert_eq!(is_same_repository(left, right), expected);
    }
}
