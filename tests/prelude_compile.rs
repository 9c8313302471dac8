//! Compile-time prelude coverage test.
use slidegate::prelude::*;
use std::time::Duration;
use tower::service_fn;
use tower_layer::Layer;
use tower_service::Service;

#[tokio::test]
async fn prelude_reexports_core_types() {
    let config = RateLimiterConfig::new(3, Duration::from_millis(100)).expect("valid config");
    let limiter: RateLimiter<()> = RateLimiterBuilder::new()
        .config(config)
        .with_clock(ManualClock::new())
        .with_sleeper(TokioSleeper)
        .build()
        .expect("limiter");
    let _decision: Decision = limiter.check(&());
    let _key = KeyExtractor::<(), ()>::global();

    let layer: RateLimitLayer<()> = limiter.layer();
    let mut svc = layer.layer(service_fn(|_req: ()| async { Ok::<_, std::io::Error>(()) }));
    svc.call(()).await.expect("service call failed");

    let _sinks = (NullSink, LogSink, MemorySink::new());
    let _err: Option<LimitError<std::io::Error>> = None;
    let _denied: Option<RateLimitExceeded> = None;
    let _cfg_err: Option<ConfigError> = None;
    let _event: Option<LimiterEvent> = None;
}
