use std::future::Future;

/// Apply a local mutation before the server confirms it.
///
/// `state` is snapshotted, `apply` runs immediately, then `commit` is awaited.
/// On error the snapshot is restored and the error returned unchanged.
pub async fn optimistic<S, T, E, F, Fut>(state: &mut S, apply: F, commit: Fut) -> Result<T, E>
where
    S: Clone,
    F: FnOnce(&mut S),
    Fut: Future<Output = Result<T, E>>,
{
    let snapshot = state.clone();
    apply(state);
    match commit.await {
        Ok(value) => Ok(value),
        Err(e) => {
            *state = snapshot;
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failed_commit_restores_snapshot() {
        let mut titles = vec!["a".to_owned(), "b".to_owned()];
        let result: Result<(), &str> = optimistic(&mut titles, |t| t[0] = "renamed".into(), async { Err("boom") }).await;

        assert_eq!(result, Err("boom"));
        assert_eq!(titles, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn successful_commit_keeps_mutation() {
        let mut titles = vec!["a".to_owned(), "b".to_owned()];
        let result: Result<u8, &str> = optimistic(&mut titles, |t| {
            t.remove(0);
        }, async { Ok(7) }).await;

        assert_eq!(result, Ok(7));
        assert_eq!(titles, vec!["b"]);
    }
}
