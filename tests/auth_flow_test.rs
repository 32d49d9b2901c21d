// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sign-up/sign-in/sign-out flows and the identity-change listener.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use safetylearn_api::auth::IdentityEvent;
use safetylearn_api::models::profile::AgeGroup;
use safetylearn_api::services::{SignUpDetails, SignUpOutcome};

mod common;
use common::{build_harness, test_identity};

fn signup_details() -> SignUpDetails {
    SignUpDetails {
        name: "Maya".to_string(),
        age: 8,
        age_group: AgeGroup::Young,
    }
}

#[tokio::test]
async fn test_sign_up_with_session_seeds_rows_and_returns_user() {
    let harness = build_harness();

    let outcome = harness
        .session
        .sign_up("Maya@Example.com ", "hunter42", signup_details())
        .await
        .unwrap();

    let SignUpOutcome::SignedIn(user) = outcome else {
        panic!("expected an established session");
    };

    // Email was normalized before reaching the provider
    assert_eq!(user.email, "maya@example.com");
    assert_eq!(user.name, "Maya");
    assert_eq!(user.age, 8);
    assert_eq!(user.age_group, AgeGroup::Young);
    assert_eq!(user.progress.current_level, 1);

    // Rows were seeded eagerly; the assembling fetch found them in place
    assert_eq!(harness.stores.profile_creates.load(Ordering::SeqCst), 1);
    assert_eq!(harness.stores.progress_creates.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_sign_up_with_confirmation_pending() {
    let harness = build_harness();
    harness.provider.set_confirm_required(true);

    let outcome = harness
        .session
        .sign_up("maya@example.com", "hunter42", signup_details())
        .await
        .unwrap();

    assert!(matches!(outcome, SignUpOutcome::ConfirmationRequired));
    // No session, so no rows were written
    assert_eq!(harness.stores.profile_creates.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_sign_in_maps_provider_errors() {
    let harness = build_harness();
    harness
        .provider
        .set_sign_in_error("HTTP 400: Invalid login credentials");

    let err = harness
        .session
        .sign_in("maya@example.com", "wrong")
        .await
        .unwrap_err();

    assert!(err
        .to_string()
        .contains("Invalid email or password. Please check your credentials"));
}

#[tokio::test]
async fn test_sign_in_loads_assembled_user() {
    let harness = build_harness();
    harness
        .provider
        .set_identity(Some(test_identity("u1", "kid@example.com")));

    let user = harness
        .session
        .sign_in("kid@example.com", "hunter42")
        .await
        .unwrap();

    assert_eq!(user.id, "u1");
    assert_eq!(user.progress.current_level, 1);
}

#[tokio::test]
async fn test_sign_out_clears_session() {
    let harness = build_harness();
    harness
        .provider
        .set_identity(Some(test_identity("u1", "kid@example.com")));

    harness.session.current_user().await.unwrap();
    harness.session.sign_out().await.unwrap();

    assert_eq!(harness.provider.sign_outs.load(Ordering::SeqCst), 1);
    assert!(harness.session.current_user().await.is_none());
}

#[tokio::test]
async fn test_identity_listener_delivers_transitions() {
    let harness = build_harness();

    let seen: Arc<Mutex<Vec<Option<String>>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let _guard = harness.session.on_identity_change(move |user| {
        sink.lock().unwrap().push(user.map(|u| u.id));
    });

    // Sign-out transition delivers None immediately
    harness.provider.emit(IdentityEvent::SignedOut);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(seen.lock().unwrap().as_slice(), &[None]);

    // Sign-in transition waits for propagation, then delivers the user
    harness
        .provider
        .set_identity(Some(test_identity("u1", "kid@example.com")));
    harness.provider.emit(IdentityEvent::SignedIn);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(
        seen.lock().unwrap().as_slice(),
        &[None, Some("u1".to_string())]
    );
}

#[tokio::test]
async fn test_second_listener_registration_is_inert() {
    let harness = build_harness();

    let first_calls = Arc::new(AtomicUsize::new(0));
    let second_calls = Arc::new(AtomicUsize::new(0));

    let first_sink = first_calls.clone();
    let _first = harness
        .session
        .on_identity_change(move |_| {
            first_sink.fetch_add(1, Ordering::SeqCst);
        });

    let second_sink = second_calls.clone();
    let _second = harness
        .session
        .on_identity_change(move |_| {
            second_sink.fetch_add(1, Ordering::SeqCst);
        });

    harness.provider.emit(IdentityEvent::SignedOut);
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Only the first registration fires; the duplicate was rejected
    assert_eq!(first_calls.load(Ordering::SeqCst), 1);
    assert_eq!(second_calls.load(Ordering::SeqCst), 0);
}
