use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

static GITHUB_TREE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https://github\.com/([^/]+)/([^/]+)(?:/tree/([^/]+))?(?:/(.+))?").unwrap()
});

/// A GitHub repository location, optionally pinned to a branch and sub-path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GitHubUrl {
    pub org: String,
    pub repo: String,
    pub branch: String,
    pub path: String,
}

/// Parse `https://github.com/{org}/{repo}[/tree/{branch}][/{path}]`.
///
/// The branch defaults to `main` and the path to an empty string.
pub fn parse_github_url(url: &str) -> Option<GitHubUrl> {
    let caps = GITHUB_TREE_URL.captures(url)?;
    let get = |i: usize| caps.get(i).map(|m| m.as_str().to_string());
    Some(GitHubUrl {
        org: get(1)?,
        repo: get(2)?,
        branch: get(3).unwrap_or_else(|| "main".to_string()),
        path: get(4).unwrap_or_default(),
    })
}

/// Host, owner and repository name of a git remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GitUrl {
    pub source: String,
    pub owner: String,
    pub name: String,
}

/// Parse a git remote URL.
///
/// Accepted forms:
/// - `https://host/owner/name(.git)` (any `scheme://`, with optional `user@` and `:port`)
/// - `user@host:owner/name(.git)` (scp-like)
///
/// Owners may be nested (`group/subgroup`); the name is always the last segment.
pub fn parse_git_url(remote: &str) -> Option<GitUrl> {
    let remote = remote.trim();
    let (host, path) = if let Some((_scheme, rest)) = remote.split_once("://") {
        let (authority, path) = rest.split_once('/')?;
        let host = authority.rsplit('@').next()?;
        let host = host.split(':').next()?;
        (host, path)
    } else {
        let (authority, path) = remote.split_once(':')?;
        if authority.contains('/') {
            return None;
        }
        (authority.rsplit('@').next()?, path)
    };

    let path = path.trim_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let (name, owner) = segments.split_last()?;
    if host.is_empty() || owner.is_empty() {
        return None;
    }

    Some(GitUrl {
        source: host.to_string(),
        owner: owner.join("/"),
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn github_url_with_branch_and_path() {
        let got = parse_github_url("https://github.com/org/repo/tree/dev/docs").unwrap();
        assert_eq!(
            got,
            GitHubUrl {
                org: "org".into(),
                repo: "repo".into(),
                branch: "dev".into(),
                path: "docs".into(),
            }
        );
    }

    #[test]
    fn github_url_defaults_branch_and_path() {
        let got = parse_github_url("https://github.com/org/repo").unwrap();
        assert_eq!(got.branch, "main");
        assert_eq!(got.path, "");
    }

    #[test]
    fn github_url_keeps_nested_path() {
        let got = parse_github_url("https://github.com/org/repo/tree/v1/content/en/guide").unwrap();
        assert_eq!(got.branch, "v1");
        assert_eq!(got.path, "content/en/guide");
    }

    #[test]
    fn non_github_url_is_none() {
        assert!(parse_github_url("https://gitlab.com/org/repo").is_none());
        assert!(parse_github_url("https://github.com/org").is_none());
    }

    #[test]
    fn git_url_https() {
        let got = parse_git_url("https://github.com/nuxt/content.git").unwrap();
        assert_eq!(got.source, "github.com");
        assert_eq!(got.owner, "nuxt");
        assert_eq!(got.name, "content");
    }

    #[test]
    fn git_url_scp_like() {
        let got = parse_git_url("git@github.com:nuxt/content.git").unwrap();
        assert_eq!(
            got,
            GitUrl {
                source: "github.com".into(),
                owner: "nuxt".into(),
                name: "content".into(),
            }
        );
    }

    #[test]
    fn git_url_ssh_with_port_and_nested_owner() {
        let got = parse_git_url("ssh://git@gitlab.example.com:2222/group/sub/project.git").unwrap();
        assert_eq!(got.source, "gitlab.example.com");
        assert_eq!(got.owner, "group/sub");
        assert_eq!(got.name, "project");
    }

    #[test]
    fn git_url_rejects_local_paths() {
        assert!(parse_git_url("/srv/git/project.git").is_none());
        assert!(parse_git_url("https://github.com/only").is_none());
        assert!(parse_git_url("").is_none());
    }
}
