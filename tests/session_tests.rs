/// Session lifecycle tests: the register/login/refresh/logout scenario and
/// the concurrent refresh race.
mod common;

use common::{file_context, memory_context, PASSWORD};
use crashkb::{error::KbError, store::AccountRepository};
use futures::future::join_all;

#[tokio::test]
async fn test_end_to_end_session_scenario() {
    let ctx = memory_context().await;

    ctx.sessions
        .register("alice", "a@x.com", "Passw0rd!")
        .await
        .unwrap();

    let login = ctx.sessions.login("alice", "Passw0rd!").await.unwrap();
    let account = ctx
        .store
        .find_account_by_username("alice")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account.refresh.unwrap().token, login.refresh_token);

    let refreshed = ctx.sessions.refresh(&login.refresh_token).await.unwrap();

    let principal = ctx.gate.resolve(&refreshed.access_token).await.unwrap();
    assert_eq!(principal.username, "alice");

    ctx.sessions.logout(&principal).await.unwrap();

    let account = ctx
        .store
        .find_account_by_username("alice")
        .await
        .unwrap()
        .unwrap();
    assert!(account.refresh.is_none());

    assert!(matches!(
        ctx.sessions.refresh(&refreshed.refresh_token).await,
        Err(KbError::InvalidToken)
    ));
}

#[tokio::test]
async fn test_refresh_is_single_use() {
    let ctx = memory_context().await;
    let session = ctx
        .sessions
        .register("alice", "a@x.com", PASSWORD)
        .await
        .unwrap();

    assert!(ctx.sessions.refresh(&session.refresh_token).await.is_ok());
    assert!(matches!(
        ctx.sessions.refresh(&session.refresh_token).await,
        Err(KbError::InvalidToken)
    ));
}

#[tokio::test]
async fn test_concurrent_refresh_has_one_winner() {
    let (ctx, _dir) = file_context().await;
    let session = ctx
        .sessions
        .register("alice", "a@x.com", PASSWORD)
        .await
        .unwrap();

    let attempts = (0..8).map(|_| {
        let sessions = ctx.sessions.clone();
        let token = session.refresh_token.clone();
        tokio::spawn(async move { sessions.refresh(&token).await })
    });

    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);

    for result in &results {
        if let Err(err) = result {
            assert!(matches!(err, KbError::InvalidToken), "unexpected {:?}", err);
        }
    }

    // The stored token is the winner's
    let account = ctx
        .store
        .find_account_by_username("alice")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account.refresh.unwrap().token, winners[0].refresh_token);
}

#[tokio::test]
async fn test_access_token_survives_logout_until_expiry() {
    let ctx = memory_context().await;
    let session = ctx
        .sessions
        .register("alice", "a@x.com", PASSWORD)
        .await
        .unwrap();

    let principal = ctx.gate.resolve(&session.access_token).await.unwrap();
    ctx.sessions.logout(&principal).await.unwrap();

    // Stateless access tokens stay valid; only renewal is cut off
    assert!(ctx.gate.resolve(&session.access_token).await.is_ok());
    assert!(matches!(
        ctx.sessions.refresh(&session.refresh_token).await,
        Err(KbError::InvalidToken)
    ));
}

#[tokio::test]
async fn test_gate_rejects_refresh_for_unknown_account() {
    let ctx = memory_context().await;
    let token = ctx.tokens.issue_refresh_token("ghost").unwrap();

    assert!(matches!(
        ctx.sessions.refresh(&token.value).await,
        Err(KbError::UserNotFound)
    ));

    let access = ctx.tokens.issue_access_token("ghost").unwrap();
    assert!(matches!(
        ctx.gate.resolve(&access.value).await,
        Err(KbError::UserNotFound)
    ));
}

#[tokio::test]
async fn test_sweep_clears_only_expired_grants() {
    let ctx = memory_context().await;
    ctx.sessions
        .register("alice", "a@x.com", PASSWORD)
        .await
        .unwrap();

    let cleared = crashkb::jobs::tasks::sweep_expired_refresh_grants(&ctx)
        .await
        .unwrap();
    assert_eq!(cleared, 0);

    let account = ctx
        .store
        .find_account_by_username("alice")
        .await
        .unwrap()
        .unwrap();
    assert!(account.refresh.is_some());
}
