//! Integration tests for the token lifecycle, driven the way the server
//! drives it: shared `Arc` managers, a running sweeper, and a clock the
//! test controls.

use std::sync::Arc;
use std::time::Duration;

use pioforge_protocol::PlayerId;
use pioforge_session::{
    Authenticator, JoinKeyConfig, JoinKeyManager, ManualClock, SessionConfig, SessionManager,
};

#[test]
fn test_create_verify_then_expire_evicts_session() {
    let clock = Arc::new(ManualClock::default());
    let sessions = SessionManager::with_clock(SessionConfig::default(), clock.clone());

    let session = sessions.create(PlayerId::new("p1"));
    assert!(sessions.verify(&session.token));

    clock.set(session.expires_at);
    assert!(!sessions.verify(&session.token));
    assert_eq!(sessions.len(), 0, "entry must be gone after failed verify");
}

#[tokio::test(start_paused = true)]
async fn test_sweeper_reclaims_expired_sessions_without_lookups() {
    let clock = Arc::new(ManualClock::default());
    let sessions = Arc::new(SessionManager::with_clock(
        SessionConfig {
            sweep_interval: Duration::from_secs(60),
            ..SessionConfig::default()
        },
        clock.clone(),
    ));
    let sweeper = sessions.start_sweeper();

    sessions.create(PlayerId::new("p1"));
    sessions.create(PlayerId::new("p2"));
    clock.advance(Duration::from_secs(2 * 60 * 60));

    // Let the next sweep tick run.
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert!(sessions.is_empty());

    sessions.shutdown();
    tokio::time::timeout(Duration::from_secs(1), sweeper)
        .await
        .expect("sweeper stops on shutdown")
        .unwrap();
}

#[tokio::test]
async fn test_join_key_hands_off_to_socket_once() {
    let clock = Arc::new(ManualClock::default());
    let join_keys = Arc::new(JoinKeyManager::with_clock(JoinKeyConfig::default(), clock));

    let key = join_keys.create(PlayerId::new("p1"));

    // Two connections race to redeem the same key; exactly one wins.
    let a = {
        let jk = Arc::clone(&join_keys);
        let key = key.clone();
        tokio::spawn(async move { jk.authenticate(&key).await.ok() })
    };
    let b = {
        let jk = Arc::clone(&join_keys);
        let key = key.clone();
        tokio::spawn(async move { jk.authenticate(&key).await.ok() })
    };
    let results = [a.await.unwrap(), b.await.unwrap()];

    assert_eq!(results.iter().filter(|r| r.is_some()).count(), 1);
    assert!(results.contains(&Some(PlayerId::new("p1"))));
}
