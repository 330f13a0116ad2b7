//! Access log records and the hooks run once a request completes.

use crate::RequestContext;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// One completed request, handed to the [`Logger`] hook.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    pub method: String,
    /// Client address, see [`RequestContext::remote_addr`]
    pub addr: String,
    /// Basic auth user, `-` when the request carried none
    pub auth: String,
    pub request_uri: String,
    pub status: u16,
    pub seconds: f64,
    pub referer: String,
    pub user_agent: String,
    /// Value of the `uid` session cookie, empty when absent
    pub uid: String,
}

pub type Logger = Arc<dyn Fn(&LogRecord) + Send + Sync>;

/// Called with the elapsed time of every request slower than the configured threshold
pub type LongQueryHandler = Arc<dyn Fn(Duration, &RequestContext) + Send + Sync>;

/// An access logger emitting each record as an `info` event on target `micro_router::access`.
///
/// Pass it straight to [`Router::set_logger`](crate::Router::set_logger).
pub fn tracing_logger() -> impl Fn(&LogRecord) + Send + Sync + 'static {
    |record: &LogRecord| {
        info!(
            target: "micro_router::access",
            method = %record.method,
            addr = %record.addr,
            auth = %record.auth,
            uri = %record.request_uri,
            status = record.status,
            seconds = record.seconds,
            referer = %record.referer,
            user_agent = %record.user_agent,
            uid = %record.uid,
            "request completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn record() -> LogRecord {
        LogRecord {
            method: "GET".into(),
            addr: "10.0.0.1".into(),
            auth: "-".into(),
            request_uri: "/index?page=2".into(),
            status: 200,
            seconds: 0.5,
            referer: String::new(),
            user_agent: "curl/8.0".into(),
            uid: "abc".into(),
        }
    }

    #[test]
    fn test_serialize_record() {
        let value = serde_json::to_value(record()).unwrap();
        assert_eq!(
            value,
            json!({
                "method": "GET",
                "addr": "10.0.0.1",
                "auth": "-",
                "request_uri": "/index?page=2",
                "status": 200,
                "seconds": 0.5,
                "referer": "",
                "user_agent": "curl/8.0",
                "uid": "abc",
            })
        );
    }

    #[test]
    fn test_tracing_logger() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt().with_writer(move || writer.clone()).with_ansi(false).finish();
        tracing::subscriber::with_default(subscriber, || {
            let logger = tracing_logger();
            logger(&record());
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains(" INFO micro_router::access: request completed"), "{output}");
        for field in ["method=GET", "addr=10.0.0.1", "auth=-", "uri=/index?page=2", "status=200", "uid=abc"] {
            assert!(output.contains(field), "missing {field} in {output}");
        }
        assert!(output.contains("user_agent=curl/8.0"), "{output}");
    }
}
