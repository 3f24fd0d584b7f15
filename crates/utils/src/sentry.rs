use sentry_tracing::{EventFilter, SentryLayer};
use tracing::Level;

const SENTRY_DSN_ENV: &str = "SENTRY_DSN";

/// Initialise the Sentry client. Without `SENTRY_DSN` the returned guard wraps a
/// disabled client and nothing leaves the process.
pub fn init_once() -> sentry::ClientInitGuard {
    let environment = if cfg!(debug_assertions) {
        "dev"
    } else {
        "production"
    };
    let dsn = std::env::var(SENTRY_DSN_ENV).ok().filter(|dsn| !dsn.is_empty());

    sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: Some(environment.into()),
            ..Default::default()
        },
    ))
}

/// Tracing layer forwarding errors as Sentry events and warnings as breadcrumbs.
pub fn sentry_layer<S>() -> SentryLayer<S>
where
    S: tracing::Subscriber,
    S: for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    SentryLayer::default()
        .span_filter(|meta| {
            matches!(
                *meta.level(),
                Level::DEBUG | Level::INFO | Level::WARN | Level::ERROR
            )
        })
        .event_filter(|meta| match *meta.level() {
            Level::ERROR => EventFilter::Event,
            Level::DEBUG | Level::INFO | Level::WARN => EventFilter::Breadcrumb,
            Level::TRACE => EventFilter::Ignore,
        })
}
