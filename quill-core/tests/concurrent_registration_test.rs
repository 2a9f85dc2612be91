//! Concurrent registration tests
//!
//! Several logins race for the same username or the same provider account.
//! Every login must end with a persisted user, usernames must stay unique
//! and one provider account must never produce two users.
//!
//! Run with: cargo test --test concurrent_registration_test -- --nocapture

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use serde_json::json;
use tempfile::TempDir;
use uuid::Uuid;

use quill_core::adapters::duckdb::DuckDbRepository;
use quill_core::domain::user::is_valid_username;
use quill_core::domain::{AuthPayload, Provider};
use quill_core::ports::Repository;
use quill_core::services::IdentityResolver;

/// Logins racing at once
const THREAD_COUNT: usize = 6;

fn create_test_repo(temp_dir: &TempDir) -> Arc<DuckDbRepository> {
    let db_path = temp_dir.path().join("test_concurrent.duckdb");
    let repo = DuckDbRepository::new(&db_path).expect("Failed to create repository");
    repo.ensure_schema().expect("Failed to initialize schema");
    Arc::new(repo)
}

/// Twitter login with nickname "popular"; `screen_name` keeps the cached
/// handles distinct between accounts
fn popular_payload(uid: &str, screen_name: &str) -> AuthPayload {
    serde_json::from_value(json!({
        "provider": "twitter",
        "uid": uid,
        "info": { "nickname": "popular" },
        "extra": { "raw_info": { "screen_name": screen_name } }
    }))
    .unwrap()
}

/// Different accounts all asking for the same nickname.
///
/// Exactly one gets the bare name, the rest get suffixed names.
#[test]
fn test_concurrent_registrations_share_nickname() {
    let temp_dir = TempDir::new().unwrap();
    let repo = create_test_repo(&temp_dir);
    let resolver = Arc::new(IdentityResolver::new(repo.clone(), repo.clone()));

    let barrier = Arc::new(Barrier::new(THREAD_COUNT));
    let error_count = Arc::new(AtomicUsize::new(0));
    let mut handles = vec![];

    for thread_id in 0..THREAD_COUNT {
        let barrier = Arc::clone(&barrier);
        let resolver = Arc::clone(&resolver);
        let error_count = Arc::clone(&error_count);

        handles.push(thread::spawn(move || {
            let payload = popular_payload(
                &format!("uid-{}", thread_id),
                &format!("popular_fan_{}", thread_id),
            );
            barrier.wait();

            match resolver.resolve(&payload, None, None) {
                Ok(resolution) => Some(resolution.user.username),
                Err(e) => {
                    println!("Thread {}: registration failed: {}", thread_id, e);
                    error_count.fetch_add(1, Ordering::SeqCst);
                    None
                }
            }
        }));
    }

    let usernames: Vec<String> = handles
        .into_iter()
        .filter_map(|h| h.join().unwrap())
        .collect();

    println!("Usernames: {:?}", usernames);
    assert_eq!(error_count.load(Ordering::SeqCst), 0);
    assert_eq!(usernames.len(), THREAD_COUNT);

    let distinct: HashSet<String> = usernames.iter().map(|u| u.to_lowercase()).collect();
    assert_eq!(distinct.len(), THREAD_COUNT, "usernames must be unique");
    assert_eq!(usernames.iter().filter(|u| *u == "popular").count(), 1);
    assert!(usernames.iter().all(|u| is_valid_username(u)));

    assert_eq!(repo.count_users().unwrap() as usize, THREAD_COUNT);
    assert_eq!(repo.count_identities().unwrap() as usize, THREAD_COUNT);
}

/// The same provider account logging in from several places at once
/// ends up with one user.
#[test]
fn test_concurrent_logins_of_same_account() {
    let temp_dir = TempDir::new().unwrap();
    let repo = create_test_repo(&temp_dir);
    let resolver = Arc::new(IdentityResolver::new(repo.clone(), repo.clone()));

    let barrier = Arc::new(Barrier::new(THREAD_COUNT));
    let mut handles = vec![];

    for _ in 0..THREAD_COUNT {
        let barrier = Arc::clone(&barrier);
        let resolver = Arc::clone(&resolver);

        handles.push(thread::spawn(move || -> Result<Uuid, String> {
            let payload = popular_payload("same-uid", "popular");
            barrier.wait();
            resolver
                .resolve(&payload, None, None)
                .map(|r| r.user_id())
                .map_err(|e| e.to_string())
        }));
    }

    let results: Vec<Result<Uuid, String>> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();
    let failures: Vec<&String> = results.iter().filter_map(|r| r.as_ref().err()).collect();
    assert!(failures.is_empty(), "logins failed: {:?}", failures);

    let user_ids: HashSet<Uuid> = results.into_iter().filter_map(Result::ok).collect();
    assert_eq!(user_ids.len(), 1);
    assert_eq!(repo.count_users().unwrap(), 1);
    assert_eq!(repo.count_identities().unwrap(), 1);

    let identity = repo
        .find_identity(Provider::Twitter, "same-uid")
        .unwrap()
        .unwrap();
    assert!(user_ids.contains(&identity.user_id));
}

/// Readers keep working while registrations are being written.
#[test]
fn test_reads_during_registrations() {
    let temp_dir = TempDir::new().unwrap();
    let repo = create_test_repo(&temp_dir);
    let resolver = Arc::new(IdentityResolver::new(repo.clone(), repo.clone()));

    let barrier = Arc::new(Barrier::new(THREAD_COUNT));
    let read_errors = Arc::new(AtomicUsize::new(0));
    let mut handles = vec![];

    for thread_id in 0..THREAD_COUNT {
        let barrier = Arc::clone(&barrier);
        let resolver = Arc::clone(&resolver);
        let repo = Arc::clone(&repo);
        let read_errors = Arc::clone(&read_errors);

        handles.push(thread::spawn(move || {
            barrier.wait();
            if thread_id % 2 == 0 {
                let payload = popular_payload(
                    &format!("writer-{}", thread_id),
                    &format!("writer_{}", thread_id),
                );
                resolver.resolve(&payload, None, None).unwrap();
            } else {
                for _ in 0..10 {
                    if repo.list_users().is_err() || repo.namespace_owner("popular").is_err() {
                        read_errors.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(read_errors.load(Ordering::SeqCst), 0);
    assert_eq!(repo.count_users().unwrap() as usize, THREAD_COUNT / 2);
}
