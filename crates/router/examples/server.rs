use http::Method;
use micro_router::{handler_fn, tracing_logger, Router, Server};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let mut router = Router::new();
    router
        .set_logger(tracing_logger())
        .set_uid(true)
        .set_auth_check(|user, password| user == "admin" && password == "secret")
        .set_error_handler(|e| error!(cause = %e, "router error"))
        .set_long_query_handler(Duration::from_millis(200), |elapsed, ctx| {
            warn!(uri = ctx.request_uri(), ?elapsed, "slow request");
        });

    router.get(
        "/",
        handler_fn(|ctx| Box::pin(async move { ctx.write_string("hello world") })),
    );
    router.get(
        "/user/:name",
        handler_fn(|ctx| {
            Box::pin(async move {
                let reply = json!({ "name": ctx.param("name"), "verbose": ctx.query_bool("verbose") });
                if let Err(e) = ctx.write_json(&reply) {
                    warn!(cause = %e, "write json error");
                }
            })
        }),
    );
    router.register_auth(
        Method::GET,
        "/admin/*",
        handler_fn(|ctx| {
            Box::pin(async move {
                let page = format!("admin page {}", ctx.param("*"));
                ctx.write_string(&page);
            })
        }),
    );
    router.register_redirect("/home", "/");
    router.register_static("/assets", "./assets");

    let server = Arc::new(Server::builder().address("127.0.0.1:3000").router(router).build().unwrap());
    let running = tokio::spawn({
        let server = Arc::clone(&server);
        async move { server.start().await }
    });

    tokio::signal::ctrl_c().await.unwrap();
    info!("ctrl-c received, shutting down");
    server.shutdown().await.unwrap();
    running.await.unwrap().unwrap();
}
