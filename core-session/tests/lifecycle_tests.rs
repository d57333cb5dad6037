//! Integration tests for the session lifecycle
//!
//! These tests drive a full `SessionManager` against in-memory bridges:
//! - Freshness classification and on-demand renewal
//! - Single-flight renewal under concurrent callers
//! - Sign-out signalling on renewal failure
//! - Scheduler start/stop and periodic renewal
//! - Login/logout racing an in-flight renewal

mod common;

use common::*;
use core_runtime::events::{CoreEvent, SessionEvent, SignOutReason};
use core_session::{claims, DecodeError, Freshness, SessionState};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_credential_outside_window_is_valid() {
    let clock = Arc::new(ManualClock::new(epoch()));
    let transport = Arc::new(FakeTransport::new(clock.clone()));
    let manager = manager_with(
        clock.clone(),
        transport.clone(),
        Arc::new(FakeHttpClient::new(clock.clone())),
    );
    let credential = token_expiring_at(epoch() + days(2));
    manager.login(credential.clone(), profile()).await.unwrap();

    let claims = claims::decode(credential.as_str()).unwrap();
    assert_eq!(
        manager.policy().classify(Some(&claims), epoch()),
        Freshness::Valid
    );
    assert!(manager.ensure_fresh().await);
    assert_eq!(manager.usable_credential().await, Some(credential));
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_credential_inside_window_is_renewed_once() {
    let clock = Arc::new(ManualClock::new(epoch()));
    let transport = Arc::new(FakeTransport::new(clock.clone()));
    let manager = manager_with(
        clock.clone(),
        transport.clone(),
        Arc::new(FakeHttpClient::new(clock.clone())),
    );
    let credential = token_expiring_at(epoch() + hours(12));
    manager.login(credential.clone(), profile()).await.unwrap();
    assert_eq!(manager.state().await, SessionState::NeedsRenewal);

    assert!(manager.ensure_fresh().await);
    assert!(manager.ensure_fresh().await);

    assert_eq!(transport.calls(), 1);
    assert_eq!(manager.state().await, SessionState::Valid);
    let renewed = manager.usable_credential().await.unwrap();
    assert_ne!(renewed, credential);
    assert_eq!(
        manager.claims().await.unwrap().unwrap().expires_at,
        (epoch() + days(7)).timestamp()
    );
}

#[tokio::test]
async fn test_failed_renewal_clears_store_and_signals_once() {
    let clock = Arc::new(ManualClock::new(epoch()));
    let transport = Arc::new(FakeTransport::failing(clock.clone()));
    let manager = manager_with(
        clock.clone(),
        transport.clone(),
        Arc::new(FakeHttpClient::new(clock.clone())),
    );
    manager
        .login(token_expiring_at(epoch() + hours(1)), profile())
        .await
        .unwrap();
    let mut sign_outs = manager.sign_out_events();

    // One second past expiry
    clock.advance(hours(1) + chrono::Duration::seconds(1));
    assert_eq!(manager.state().await, SessionState::Expired);

    assert!(!manager.ensure_fresh().await);
    assert!(!manager.ensure_fresh().await);
    assert!(manager.interceptor().send(customers()).await.is_err());

    assert_eq!(transport.calls(), 1);
    assert_eq!(manager.state().await, SessionState::Unauthenticated);
    assert_eq!(manager.profile().await.unwrap(), None);
    assert_eq!(
        sign_outs.recv().await.unwrap(),
        CoreEvent::Session(SessionEvent::SignOutRequired {
            reason: SignOutReason::RenewalFailed
        })
    );
    assert!(sign_outs.try_recv().is_none());
}

#[tokio::test]
async fn test_malformed_credential_is_expired() {
    assert!(matches!(
        claims::decode("not.a.jwt"),
        Err(DecodeError::Base64(_))
    ));

    let clock = Arc::new(ManualClock::new(epoch()));
    let manager = manager_with(
        clock.clone(),
        Arc::new(FakeTransport::new(clock.clone())),
        Arc::new(FakeHttpClient::new(clock.clone())),
    );
    assert_eq!(
        manager.policy().classify_token("not.a.jwt", epoch()),
        Freshness::Expired
    );
    assert!(manager
        .login(core_session::Credential::new("not.a.jwt"), profile())
        .await
        .is_err());
}

#[tokio::test]
async fn test_empty_store_makes_no_call() {
    let clock = Arc::new(ManualClock::new(epoch()));
    let transport = Arc::new(FakeTransport::new(clock.clone()));
    let manager = manager_with(
        clock.clone(),
        transport.clone(),
        Arc::new(FakeHttpClient::new(clock.clone())),
    );

    assert!(!manager.ensure_fresh().await);
    assert_eq!(manager.usable_credential().await, None);
    assert_eq!(transport.calls(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_share_one_renewal() {
    let clock = Arc::new(ManualClock::new(epoch()));
    let transport =
        Arc::new(FakeTransport::new(clock.clone()).with_delay(Duration::from_millis(50)));
    let manager = manager_with(
        clock.clone(),
        transport.clone(),
        Arc::new(FakeHttpClient::new(clock.clone())),
    );
    manager
        .login(token_expiring_at(epoch() + hours(6)), profile())
        .await
        .unwrap();

    let callers: Vec<_> = (0..16)
        .map(|_| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.ensure_fresh().await })
        })
        .collect();

    for caller in futures::future::join_all(callers).await {
        assert!(caller.unwrap());
    }
    assert_eq!(transport.calls(), 1);
    assert_eq!(manager.coordinator().attempts_started(), 1);
    assert!(!manager.coordinator().is_renewing().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_share_one_failure() {
    let clock = Arc::new(ManualClock::new(epoch()));
    let transport =
        Arc::new(FakeTransport::failing(clock.clone()).with_delay(Duration::from_millis(50)));
    let manager = manager_with(
        clock.clone(),
        transport.clone(),
        Arc::new(FakeHttpClient::new(clock.clone())),
    );
    manager
        .login(token_expiring_at(epoch() + hours(6)), profile())
        .await
        .unwrap();
    let mut sign_outs = manager.sign_out_events();

    let callers: Vec<_> = (0..16)
        .map(|_| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.ensure_fresh().await })
        })
        .collect();

    for caller in futures::future::join_all(callers).await {
        assert!(!caller.unwrap());
    }
    assert_eq!(transport.calls(), 1);
    assert_eq!(manager.state().await, SessionState::Unauthenticated);
    assert!(sign_outs.recv().await.unwrap().is_sign_out());
    assert!(sign_outs.try_recv().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_renews_inside_window() {
    let clock = Arc::new(ManualClock::new(epoch()));
    let transport = Arc::new(FakeTransport::new(clock.clone()));
    let manager = manager_with(
        clock.clone(),
        transport.clone(),
        Arc::new(FakeHttpClient::new(clock.clone())),
    );
    let mut events = manager.subscribe();
    manager
        .login(token_expiring_at(epoch() + days(2)), profile())
        .await
        .unwrap();

    let scheduler = manager.scheduler();
    assert_eq!(scheduler.interval(), Duration::from_secs(3600));
    let handle = scheduler.start();

    // Immediate check finds a valid credential
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(transport.calls(), 0);

    clock.advance(hours(36));
    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert_eq!(transport.calls(), 1);
    assert_eq!(manager.state().await, SessionState::Valid);

    // Later ticks see the renewed credential as valid
    tokio::time::sleep(Duration::from_secs(3 * 3600)).await;
    assert_eq!(transport.calls(), 1);

    handle.shutdown().await;

    let mut saw_renewed = false;
    while let Ok(event) = events.try_recv() {
        saw_renewed |= matches!(event, CoreEvent::Session(SessionEvent::Renewed { .. }));
    }
    assert!(saw_renewed);
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_failure_signals_once() {
    let clock = Arc::new(ManualClock::new(epoch()));
    let transport = Arc::new(FakeTransport::failing(clock.clone()));
    let manager = manager_with(
        clock.clone(),
        transport.clone(),
        Arc::new(FakeHttpClient::new(clock.clone())),
    );
    manager
        .login(token_expiring_at(epoch() + hours(3)), profile())
        .await
        .unwrap();
    let mut sign_outs = manager.sign_out_events();

    let handle = manager.start_scheduler();
    tokio::time::sleep(Duration::from_secs(5 * 3600)).await;

    assert_eq!(transport.calls(), 1);
    assert!(sign_outs.recv().await.unwrap().is_sign_out());
    assert!(sign_outs.try_recv().is_none());
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_stop_is_idempotent() {
    let clock = Arc::new(ManualClock::new(epoch()));
    let transport = Arc::new(FakeTransport::new(clock.clone()));
    let manager = manager_with(
        clock.clone(),
        transport.clone(),
        Arc::new(FakeHttpClient::new(clock.clone())),
    );
    manager
        .login(token_expiring_at(epoch() + days(7)), profile())
        .await
        .unwrap();

    let handle = manager.start_scheduler();
    handle.stop();
    handle.stop();
    assert!(handle.is_stopped());

    // No ticks after stop, even once the credential enters its window
    clock.advance(days(6) + hours(12));
    tokio::time::sleep(Duration::from_secs(4 * 3600)).await;
    assert_eq!(transport.calls(), 0);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_logout_during_renewal_wins() {
    let clock = Arc::new(ManualClock::new(epoch()));
    let transport =
        Arc::new(FakeTransport::new(clock.clone()).with_delay(Duration::from_secs(2)));
    let manager = manager_with(
        clock.clone(),
        transport.clone(),
        Arc::new(FakeHttpClient::new(clock.clone())),
    );
    manager
        .login(token_expiring_at(epoch() + hours(1)), profile())
        .await
        .unwrap();

    let renewing = tokio::spawn({
        let manager = manager.clone();
        async move { manager.ensure_fresh().await }
    });
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(manager.coordinator().is_renewing().await);
    manager.logout().await.unwrap();

    assert!(!renewing.await.unwrap());
    assert_eq!(transport.calls(), 1);
    assert_eq!(manager.state().await, SessionState::Unauthenticated);
    assert!(!manager.coordinator().sign_out_signal().has_fired());
}

#[tokio::test(start_paused = true)]
async fn test_logout_during_scheduled_renewal_does_not_sign_out() {
    let clock = Arc::new(ManualClock::new(epoch()));
    let transport =
        Arc::new(FakeTransport::new(clock.clone()).with_delay(Duration::from_secs(2)));
    let manager = manager_with(
        clock.clone(),
        transport.clone(),
        Arc::new(FakeHttpClient::new(clock.clone())),
    );
    manager
        .login(token_expiring_at(epoch() + hours(1)), profile())
        .await
        .unwrap();
    let mut sign_outs = manager.sign_out_events();

    let handle = manager.start_scheduler();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(manager.coordinator().is_renewing().await);
    manager.logout().await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(transport.calls(), 1);
    assert_eq!(manager.state().await, SessionState::Unauthenticated);
    assert!(!manager.coordinator().sign_out_signal().has_fired());
    assert!(sign_outs.try_recv().is_none());
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_login_during_renewal_wins() {
    let clock = Arc::new(ManualClock::new(epoch()));
    let transport =
        Arc::new(FakeTransport::new(clock.clone()).with_delay(Duration::from_secs(2)));
    let manager = manager_with(
        clock.clone(),
        transport.clone(),
        Arc::new(FakeHttpClient::new(clock.clone())),
    );
    manager
        .login(token_expiring_at(epoch() + hours(1)), profile())
        .await
        .unwrap();

    let renewing = tokio::spawn({
        let manager = manager.clone();
        async move { manager.ensure_fresh().await }
    });
    tokio::time::sleep(Duration::from_secs(1)).await;
    let fresh_login = token_expiring_at(epoch() + days(5));
    manager.login(fresh_login.clone(), profile()).await.unwrap();

    assert!(renewing.await.unwrap());
    assert_eq!(manager.usable_credential().await, Some(fresh_login));
    assert_eq!(transport.calls(), 1);
}

fn customers() -> bridge_traits::http::HttpRequest {
    bridge_traits::http::HttpRequest::new(bridge_traits::http::HttpMethod::Get, CUSTOMERS_URL)
}
