//! Skips wiremock tests where localhost sockets can't be bound.
//!
//! Set `KOTOBA_AUDIO_REQUIRE_SOCKET_TESTS=1` to turn the skip into a failure.

use std::net::TcpListener;
use std::panic::Location;

use wiremock::MockServer;

const REQUIRE_SOCKET_TESTS_VAR: &str = "KOTOBA_AUDIO_REQUIRE_SOCKET_TESTS";

#[track_caller]
fn localhost_unavailable() -> bool {
    if TcpListener::bind("127.0.0.1:0").is_ok() {
        return false;
    }
    let caller = Location::caller();
    let required = std::env::var(REQUIRE_SOCKET_TESTS_VAR)
        .is_ok_and(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"));
    assert!(
        !required,
        "{caller}: no localhost socket for the mock server and {REQUIRE_SOCKET_TESTS_VAR} is set"
    );
    eprintln!("{caller}: no localhost socket for the mock server, skipping");
    true
}

/// Starts a mock server, or returns `None` when the test should be skipped.
#[track_caller]
pub fn start_mock_server_or_skip() -> impl Future<Output = Option<MockServer>> {
    let skip = localhost_unavailable();
    async move {
        if skip {
            None
        } else {
            Some(MockServer::start().await)
        }
    }
}

/// Value a skipped test returns, so `require_mock_server!` works in tests
/// returning `()` as well as `Result`.
pub trait SkippedTest {
    fn skipped() -> Self;
}

impl SkippedTest for () {
    fn skipped() -> Self {}
}

impl<E> SkippedTest for Result<(), E> {
    fn skipped() -> Self {
        Ok(())
    }
}

pub fn socket_skip_return<T: SkippedTest>() -> T {
    T::skipped()
}
