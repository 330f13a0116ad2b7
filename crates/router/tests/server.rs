use micro_router::{handler_fn, LogRecord, Router, RouterError, Server};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Notify;

async fn wait_for_listener(server: &Server) -> std::net::SocketAddr {
    for _ in 0..200 {
        if let Some(addr) = server.local_addr() {
            return addr;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("server did not start listening");
}

async fn send(addr: std::net::SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    String::from_utf8(response).unwrap()
}

#[tokio::test]
async fn serve_requests_then_shutdown() {
    let records = Arc::new(Mutex::new(Vec::<LogRecord>::new()));
    let sink = Arc::clone(&records);

    let mut router = Router::new();
    router.set_logger(move |record| sink.lock().unwrap().push(record.clone()));
    router.get(
        "/hello/:name",
        handler_fn(|ctx| {
            Box::pin(async move {
                let greeting = format!("hello {}", ctx.param("name"));
                ctx.write_string(&greeting);
            })
        }),
    );
    router.post(
        "/echo",
        handler_fn(|ctx| {
            Box::pin(async move {
                let body = ctx.body().clone();
                ctx.write(&body);
            })
        }),
    );

    let server = Arc::new(
        Server::builder()
            .address("127.0.0.1:0")
            .router(router)
            .shutdown_timeout(Duration::from_secs(1))
            .build()
            .unwrap(),
    );
    let running = tokio::spawn({
        let server = Arc::clone(&server);
        async move { server.start().await }
    });
    let addr = wait_for_listener(&server).await;

    let response = send(addr, "GET /hello/world HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
    assert!(response.ends_with("\r\n\r\nhello world"), "{response}");

    let response = send(
        addr,
        "POST /echo HTTP/1.1\r\nHost: localhost\r\nContent-Length: 4\r\nConnection: close\r\n\r\nping",
    )
    .await;
    assert!(response.ends_with("\r\n\r\nping"), "{response}");

    let response = send(addr, "GET /missing HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"), "{response}");
    assert!(response.ends_with("404 Not Found"), "{response}");

    server.shutdown().await.unwrap();
    running.await.unwrap().unwrap();

    let records = records.lock().unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].addr, "127.0.0.1");
    assert_eq!(records[0].request_uri, "/hello/world");
    assert_eq!(records[2].status, 404);

    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn shutdown_times_out_with_request_in_flight() {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    let entered = Arc::new(Notify::new());

    let notify = Arc::clone(&entered);

    let mut router = Router::new();
    router.set_error_handler(move |e| sink.lock().unwrap().push(e.to_string()));
    router.get(
        "/slow",
        handler_fn(move |ctx| {
            let entered = Arc::clone(&notify);
            Box::pin(async move {
                entered.notify_one();
                tokio::time::sleep(Duration::from_secs(3)).await;
                ctx.write_string("late");
            })
        }),
    );

    let server = Arc::new(
        Server::builder()
            .address("127.0.0.1:0")
            .router(router)
            .shutdown_timeout(Duration::from_millis(100))
            .build()
            .unwrap(),
    );
    let running = tokio::spawn({
        let server = Arc::clone(&server);
        async move { server.start().await }
    });
    let addr = wait_for_listener(&server).await;

    let client = tokio::spawn(send(addr, "GET /slow HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n"));
    entered.notified().await;

    let outcome = server.shutdown().await;
    assert!(
        matches!(outcome, Err(RouterError::ShutdownTimeout { timeout }) if timeout == Duration::from_millis(100)),
        "{outcome:?}"
    );
    assert_eq!(errors.lock().unwrap().len(), 1);
    assert!(running.await.unwrap().is_ok());

    client.abort();
}
