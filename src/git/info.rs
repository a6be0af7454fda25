use git2::Repository;
use serde::Serialize;
use std::env;
use std::path::Path;
use tracing::debug;

use super::url::parse_git_url;

/// Repository identity shown in the content UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GitInfo {
    pub name: String,
    pub owner: String,
    pub url: String,
}

/// Read `remote.origin.url` of the nearest repository at or above `root`.
///
/// Returns `None` when there is no repository, no `origin` remote, or the
/// remote URL cannot be parsed.
pub fn get_local_git_info(root: &Path) -> Option<GitInfo> {
    let repo = match Repository::discover(root) {
        Ok(r) => r,
        Err(e) => {
            debug!(root = %root.display(), error = %e, "no git repository");
            return None;
        }
    };
    let remote = repo.find_remote("origin").ok()?;
    let parsed = parse_git_url(remote.url()?)?;
    Some(GitInfo {
        url: format!("https://{}/{}/{}", parsed.source, parsed.owner, parsed.name),
        name: parsed.name,
        owner: parsed.owner,
    })
}

/// Git identity from CI environment variables of the current process.
pub fn get_git_env() -> GitInfo {
    git_env_from(|key| env::var(key).ok())
}

/// Git identity from CI environment variables, looked up through `lookup`.
///
/// Vercel, GitHub Actions and GitLab CI variables are consulted in that
/// order; Netlify only provides `REPOSITORY_URL`. Empty values count as unset.
pub fn git_env_from<F>(lookup: F) -> GitInfo
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).filter(|v| !v.is_empty());
    let project_path = var("CI_PROJECT_PATH");

    let provider = var("VERCEL_GIT_PROVIDER")
        .or_else(|| var("GITHUB_SERVER_URL").map(|_| "github".to_string()))
        .unwrap_or_default();

    let mut owner = var("VERCEL_GIT_REPO_OWNER")
        .or_else(|| var("GITHUB_REPOSITORY_OWNER"))
        .or_else(|| {
            project_path
                .as_deref()
                .and_then(|p| p.split('/').next())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_default();

    let mut name = var("VERCEL_GIT_REPO_SLUG")
        .or_else(|| {
            var("GITHUB_REPOSITORY")
                .and_then(|r| r.rsplit('/').next().map(str::to_string))
                .filter(|s| !s.is_empty())
        })
        .or_else(|| {
            project_path
                .as_deref()
                .map(|p| p.split('/').skip(1).collect::<Vec<_>>().join("/"))
                .filter(|s| !s.is_empty())
        })
        .unwrap_or_default();

    let mut url = var("REPOSITORY_URL").unwrap_or_default();

    if url.is_empty() && !provider.is_empty() && !owner.is_empty() && !name.is_empty() {
        url = format!("https://{}.com/{}/{}", provider, owner, name);
    }

    if name.is_empty()
        && owner.is_empty()
        && !url.is_empty()
        && let Some(parsed) = parse_git_url(&url)
    {
        name = parsed.name;
        owner = parsed.owner;
    }

    GitInfo { name, owner, url }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn vercel_variables() {
        let got = git_env_from(env_of(&[
            ("VERCEL_GIT_PROVIDER", "github"),
            ("VERCEL_GIT_REPO_OWNER", "acme"),
            ("VERCEL_GIT_REPO_SLUG", "site"),
        ]));
        assert_eq!(
            got,
            GitInfo {
                name: "site".into(),
                owner: "acme".into(),
                url: "https://github.com/acme/site".into(),
            }
        );
    }

    #[test]
    fn github_actions_variables() {
        let got = git_env_from(env_of(&[
            ("GITHUB_SERVER_URL", "https://github.com"),
            ("GITHUB_REPOSITORY_OWNER", "acme"),
            ("GITHUB_REPOSITORY", "acme/docs"),
        ]));
        assert_eq!(got.name, "docs");
        assert_eq!(got.owner, "acme");
        assert_eq!(got.url, "https://github.com/acme/docs");
    }

    #[test]
    fn gitlab_project_path_without_provider() {
        let got = git_env_from(env_of(&[("CI_PROJECT_PATH", "group/sub/project")]));
        assert_eq!(got.owner, "group");
        assert_eq!(got.name, "sub/project");
        assert_eq!(got.url, "");
    }

    #[test]
    fn netlify_repository_url_only() {
        let got = git_env_from(env_of(&[(
            "REPOSITORY_URL",
            "https://github.com/acme/blog",
        )]));
        assert_eq!(got.name, "blog");
        assert_eq!(got.owner, "acme");
        assert_eq!(got.url, "https://github.com/acme/blog");
    }

    #[test]
    fn empty_values_are_ignored() {
        let got = git_env_from(env_of(&[
            ("VERCEL_GIT_REPO_OWNER", ""),
            ("REPOSITORY_URL", "not a url"),
        ]));
        assert_eq!(got.owner, "");
        assert_eq!(got.name, "");
        assert_eq!(got.url, "not a url");
    }

    #[test]
    fn no_variables_is_empty() {
        assert_eq!(git_env_from(|_| None), GitInfo::default());
    }

    #[test]
    fn local_info_from_nested_directory() {
        let td = tempfile::tempdir().unwrap();
        let repo = Repository::init(td.path()).unwrap();
        repo.remote("origin", "git@github.com:acme/site.git").unwrap();
        let nested = td.path().join("content").join("docs");
        fs::create_dir_all(&nested).unwrap();

        let got = get_local_git_info(&nested).unwrap();
        assert_eq!(got.owner, "acme");
        assert_eq!(got.name, "site");
        assert_eq!(got.url, "https://github.com/acme/site");
    }

    #[test]
    fn local_info_without_origin_is_none() {
        let td = tempfile::tempdir().unwrap();
        let repo = Repository::init(td.path()).unwrap();
        repo.remote("upstream", "https://github.com/acme/site").unwrap();
        assert!(get_local_git_info(td.path()).is_none());
    }
}
