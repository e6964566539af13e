//! Normalization helpers shared by registry fetchers.
//!
//! These live on the adapter layer, not in any one ecosystem's fetcher,
//! because several fetchers need the same package-name or repository-URL
//! cleanup.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// PEP 503-compatible package name normalization: trim, lowercase,
/// `_` (and runs of `.`/`-`) collapsed to a single `-`.
pub fn normalize_pkg_name(name: &str) -> String {
    static RUN: OnceLock<Regex> = OnceLock::new();
    let run = RUN.get_or_init(|| Regex::new(r"[-_.]+").expect("valid regex"));
    run.replace_all(name.trim().to_lowercase().as_str(), "-")
        .into_owned()
}

/// Normalize a repository URL: strip a leading `git+`, rewrite
/// `git@github.com:owner/repo` and `git://github.com/owner/repo` to
/// `https://github.com/owner/repo`, and strip a trailing `.git`.
pub fn normalize_repo_url(raw: &str) -> String {
    let mut url = raw.trim();
    if let Some(rest) = url.strip_prefix("git+") {
        url = rest;
    }

    let mut owned;
    let url = if let Some(rest) = url.strip_prefix("git@github.com:") {
        owned = format!("https://github.com/{}", rest);
        owned.as_str()
    } else if let Some(rest) = url.strip_prefix("git://github.com/") {
        owned = format!("https://github.com/{}", rest);
        owned.as_str()
    } else {
        url
    };

    url.trim_end_matches(".git").to_string()
}

const PREFERRED_KEYS: &[&str] = &["Source", "Repository", "Code", "Homepage"];

/// Search `url_map` for a GitHub repository reference, preferring the keys
/// in [`PREFERRED_KEYS`], then falling back to any remaining value, then
/// to `homepage`. URLs under `/sponsors/` are skipped.
pub fn extract_repo_url(
    github_re: &Regex,
    url_map: &HashMap<String, String>,
    homepage: Option<&str>,
) -> Option<(String, String)> {
    let candidates = PREFERRED_KEYS
        .iter()
        .filter_map(|key| url_map.get(*key))
        .chain(
            url_map
                .iter()
                .filter(|(k, _)| !PREFERRED_KEYS.contains(&k.as_str()))
                .map(|(_, v)| v),
        )
        .chain(homepage.into_iter());

    for candidate in candidates {
        if candidate.contains("/sponsors/") {
            continue;
        }
        if let Some(captures) = github_re.captures(candidate) {
            let owner = captures.name("owner")?.as_str().to_string();
            let repo = captures
                .name("repo")?
                .as_str()
                .trim_end_matches(".git")
                .to_string();
            return Some((owner, repo));
        }
    }
    None
}

/// The canonical `github.com/<owner>/<repo>` matcher used by
/// [`extract_repo_url`] callers.
pub fn github_regex() -> Regex {
    Regex::new(r"github\.com[:/](?P<owner>[\w.-]+)/(?P<repo>[\w.-]+)").expect("valid regex")
}

/// Percent-encode a query component, encoding spaces as `+` (the
/// `application/x-www-form-urlencoded` convention most registries expect
/// in search query strings).
pub fn url_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_pep503_names() {
        assert_eq!(normalize_pkg_name("FastAPI"), "fastapi");
        assert_eq!(normalize_pkg_name("zope.interface"), "zope-interface");
        assert_eq!(normalize_pkg_name("  Foo_Bar--Baz  "), "foo-bar-baz");
    }

    #[test]
    fn normalizes_repo_urls() {
        assert_eq!(
            normalize_repo_url("git+https://github.com/psf/requests.git"),
            "https://github.com/psf/requests"
        );
        assert_eq!(
            normalize_repo_url("git@github.com:psf/requests.git"),
            "https://github.com/psf/requests"
        );
        assert_eq!(
            normalize_repo_url("git://github.com/psf/requests.git"),
            "https://github.com/psf/requests"
        );
    }

    #[test]
    fn extracts_repo_preferring_source_key() {
        let re = github_regex();
        let mut map = HashMap::new();
        map.insert("Homepage".to_string(), "https://example.com".to_string());
        map.insert(
            "Source".to_string(),
            "https://github.com/psf/requests".to_string(),
        );
        let (owner, repo) = extract_repo_url(&re, &map, None).unwrap();
        assert_eq!(owner, "psf");
        assert_eq!(repo, "requests");
    }

    #[test]
    fn extract_repo_url_skips_sponsors_links() {
        let re = github_regex();
        let mut map = HashMap::new();
        map.insert(
            "Funding".to_string(),
            "https://github.com/sponsors/psf".to_string(),
        );
        map.insert(
            "Repository".to_string(),
            "https://github.com/psf/requests".to_string(),
        );
        let (owner, repo) = extract_repo_url(&re, &map, None).unwrap();
        assert_eq!(owner, "psf");
        assert_eq!(repo, "requests");
    }

    #[test]
    fn url_encode_uses_plus_for_spaces() {
        assert_eq!(url_encode("g:\"a b\""), "g%3A%22a+b%22");
    }
}
