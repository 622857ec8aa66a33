use gateway_common::ScopePath;

tokio::task_local! {
    static SCOPE_STACK: std::cell::RefCell<Vec<ScopeFrame>>;
}

#[derive(Clone, Debug)]
enum ScopeFrame {
    Scoped(Vec<ScopePath>),
    Unscoped,
}

/// Caller-scope visibility for the current async task. Entering an
/// unscoped block (used by background loops and internal lookups that
/// must see every document) is explicit rather than a hidden global.
pub struct ScopeContext;

impl ScopeContext {
    /// Runs `f` with `allowed` as the current caller's visible scope
    /// paths. Must be called from within a task that has entered the
    /// task-local scope stack via `ScopeContext::root`.
    pub fn current() -> Vec<ScopePath> {
        SCOPE_STACK.with(|stack| match stack.borrow().last() {
            Some(ScopeFrame::Scoped(paths)) => paths.clone(),
            Some(ScopeFrame::Unscoped) | None => Vec::new(),
        })
    }

    pub fn is_unscoped() -> bool {
        SCOPE_STACK.with(|stack| matches!(stack.borrow().last(), Some(ScopeFrame::Unscoped)))
    }

    pub async fn run_scoped<F, T>(allowed: Vec<ScopePath>, fut: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        SCOPE_STACK
            .scope(std::cell::RefCell::new(vec![ScopeFrame::Scoped(allowed)]), fut)
            .await
    }

    /// Enters an unscoped block for the duration of `fut`, nested inside
    /// an already-running scoped task (e.g. a hook resolving a shared
    /// policy document on behalf of a scoped caller).
    pub async fn with_unscoped<F, T>(fut: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        if SCOPE_STACK.try_with(|_| ()).is_ok() {
            SCOPE_STACK.with(|stack| stack.borrow_mut().push(ScopeFrame::Unscoped));
            let result = fut.await;
            SCOPE_STACK.with(|stack| {
                stack.borrow_mut().pop();
            });
            result
        } else {
            SCOPE_STACK
                .scope(std::cell::RefCell::new(vec![ScopeFrame::Unscoped]), fut)
                .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scoped_block_exposes_its_paths() {
        let paths = vec![ScopePath::new("/team-a/")];
        ScopeContext::run_scoped(paths.clone(), async {
            assert_eq!(ScopeContext::current(), paths);
            assert!(!ScopeContext::is_unscoped());
        })
        .await;
    }

    #[tokio::test]
    async fn unscoped_block_reports_unscoped() {
        ScopeContext::run_scoped(vec![ScopePath::new("/team-a/")], async {
            ScopeContext::with_unscoped(async {
                assert!(ScopeContext::is_unscoped());
            })
            .await;
            assert!(!ScopeContext::is_unscoped());
        })
        .await;
    }
}
