use serde::{Deserialize, Serialize};

/// A `/a/b/`-style scope path, enforced as a prefix filter on scoped entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopePath(pub String);

pub const WILDCARD_SCOPE: &str = "/ALL/";

impl ScopePath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn is_prefix_of(&self, other: &str) -> bool {
        other.starts_with(self.0.as_str())
    }
}

/// True iff `row_scopes` contains `/ALL/` or a path that is a prefix of one
/// of `allowed`. An empty `row_scopes` is never visible to a scoped caller.
pub fn is_visible(row_scopes: &[String], allowed: &[ScopePath]) -> bool {
    row_scopes.iter().any(|scope| {
        scope == WILDCARD_SCOPE || allowed.iter().any(|allow| scope == &allow.0 || ScopePath(scope.clone()).is_prefix_of(&allow.0))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_is_always_visible() {
        let allowed = vec![ScopePath("/team/a/".to_string())];
        assert!(is_visible(&["/ALL/".to_string()], &allowed));
    }

    #[test]
    fn prefix_match_is_visible() {
        let allowed = vec![ScopePath("/team/a/project/".to_string())];
        assert!(is_visible(&["/team/a/".to_string()], &allowed));
        assert!(!is_visible(&["/team/b/".to_string()], &allowed));
    }

    #[test]
    fn empty_row_scopes_never_visible() {
        let allowed = vec![ScopePath("/team/a/".to_string())];
        assert!(!is_visible(&[], &allowed));
    }
}
