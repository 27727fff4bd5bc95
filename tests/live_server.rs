//! Integration tests against a real Bolt server. Gated behind the
//! `live-server` feature and `BOLT_TEST_URI` so the default `cargo test`
//! run never depends on a reachable database (§8, DESIGN.md "Test
//! tooling").
#![cfg(feature = "live-server")]

use bolt_driver::auth::AuthConfig;
use bolt_driver::Driver;

fn test_uri() -> Option<String> {
    std::env::var("BOLT_TEST_URI").ok()
}

fn test_auth() -> AuthConfig {
    match (std::env::var("BOLT_TEST_USER"), std::env::var("BOLT_TEST_PASSWORD")) {
        (Ok(user), Ok(password)) => AuthConfig::basic(user, password),
        _ => AuthConfig::none(),
    }
}

#[tokio::test]
async fn run_returns_1() {
    let Some(uri) = test_uri() else {
        eprintln!("skipping: BOLT_TEST_URI not set");
        return;
    };
    let driver = Driver::connect(&uri, test_auth()).expect("valid uri");
    let mut session = driver.session(Default::default());

    let mut result = session.run("RETURN 1 AS n", Default::default()).await.expect("run succeeds");
    let record = result.next().await.expect("record fetch succeeds").expect("one record");
    assert_eq!(record[0].as_integer().unwrap(), 1);
    assert!(result.next().await.unwrap().is_none());

    driver.close().await;
}

#[tokio::test]
async fn managed_write_transaction_commits() {
    let Some(uri) = test_uri() else {
        eprintln!("skipping: BOLT_TEST_URI not set");
        return;
    };
    let driver = Driver::connect(&uri, test_auth()).expect("valid uri");
    let mut session = driver.session(Default::default());

    let sum: i64 = session
        .execute_write(|tx| {
            Box::pin(async move {
                let mut result = tx.run("RETURN 1 + 1 AS total", Default::default()).await?;
                let record = result.next().await?.expect("one record");
                Ok(record[0].as_integer()?)
            })
        })
        .await
        .expect("managed write succeeds");
    assert_eq!(sum, 2);

    driver.close().await;
}

#[tokio::test]
async fn reset_recovers_a_failed_connection() {
    let Some(uri) = test_uri() else {
        eprintln!("skipping: BOLT_TEST_URI not set");
        return;
    };
    let driver = Driver::connect(&uri, test_auth()).expect("valid uri");
    let mut session = driver.session(Default::default());

    let failure = session.run("THIS IS NOT CYPHER", Default::default()).await;
    assert!(failure.is_err());

    // The session transparently resets the connection before releasing
    // it; a subsequent query on a fresh session must still succeed.
    let mut session = driver.session(Default::default());
    let mut result = session.run("RETURN 1 AS n", Default::default()).await.expect("run succeeds after a prior failure");
    assert!(result.next().await.unwrap().is_some());

    driver.close().await;
}
