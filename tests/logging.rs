//! Log output of the limiter as seen through a tracing subscriber.
use slidegate::{ManualClock, RateLimiter, TrackingSleeper};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone)]
struct SharedWriter(Arc<Mutex<Vec<u8>>>);

impl<'a> MakeWriter<'a> for SharedWriter {
    type Writer = SharedGuard;
    fn make_writer(&'a self) -> Self::Writer {
        SharedGuard(self.0.clone())
    }
}

struct SharedGuard(Arc<Mutex<Vec<u8>>>);
impl std::io::Write for SharedGuard {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn retries_and_rejections_are_logged_but_operation_errors_are_not() {
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::fmt()
        .with_writer(BoxMakeWriter::new(SharedWriter(buffer.clone())))
        .with_max_level(tracing::Level::DEBUG)
        .without_time()
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let clock = ManualClock::new();
    let limiter = RateLimiter::builder()
        .capacity(1)
        .period(Duration::from_millis(100))
        .auto_retry(true)
        .max_retries(1)
        .with_clock(clock.clone())
        .with_sleeper(TrackingSleeper::new())
        .build()
        .unwrap();

    let failed = limiter
        .execute((), |()| async {
            Err::<(), _>(std::io::Error::new(std::io::ErrorKind::Other, "secret-failure"))
        })
        .await;
    assert!(failed.unwrap_err().is_inner());
    assert!(limiter.acquire(&()).await.is_err());

    let logs = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
    assert!(logs.contains("rate limited; waiting to retry"), "logs: {logs}");
    assert!(logs.contains("rate limit exceeded"), "logs: {logs}");
    assert!(!logs.contains("secret-failure"), "logs: {logs}");
}
