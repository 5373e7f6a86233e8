//! Minimal contxt demo: a hyper server whose handlers take a `Context`.
//!
//! Run with:
//!   cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:3000/hello?name=alice
//!   curl -i -X POST http://localhost:3000/users \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice","email":"a@example.com"}'
//!   curl -i -X POST http://localhost:3000/users \
//!        -d 'name=bob&email=b@example.com'
//!   curl -i -X POST http://localhost:3000/users -F name=carol -F email=c@example.com
//!   curl -i http://localhost:3000/whoami -H 'x-request-id: 7'
//!   curl -i http://localhost:3000/old

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use contxt::{Config, Context, Json};
use http::{Method, StatusCode};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{error, info};

#[derive(Debug, Deserialize, Serialize)]
struct NewUser {
    name: String,
    email: String,
}

contxt::header_bindable! {
    #[derive(Debug, Default, Serialize)]
    struct Caller {
        #[header = "X-Request-Id"]
        request_id: String,
        #[header = "User-Agent"]
        user_agent: String,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt::init();

    let addr: SocketAddr = "0.0.0.0:3000".parse()?;
    let listener = TcpListener::bind(addr).await?;
    let config = Arc::new(Config::default());
    info!(%addr, "listening");

    let mut tasks = tokio::task::JoinSet::new();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                break;
            }

            res = listener.accept() => {
                let (stream, peer) = match res {
                    Ok(v) => v,
                    Err(e) => {
                        error!("accept error: {e}");
                        continue;
                    }
                };

                let config = Arc::clone(&config);
                tasks.spawn(async move {
                    let svc = service_fn(move |req| {
                        let config = Arc::clone(&config);
                        async move {
                            Ok::<_, std::convert::Infallible>(dispatch(Context::new(req, config)).await)
                        }
                    });

                    if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                        .serve_connection(TokioIo::new(stream), svc)
                        .await
                    {
                        error!(%peer, "connection error: {e}");
                    }
                });
            }

            Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
        }
    }

    while tasks.join_next().await.is_some() {}
    info!("stopped");
    Ok(())
}

// Routing is deliberately naive: the demo is about the context, not the router.
async fn dispatch(mut ctx: Context<Incoming>) -> http::Response<Full<Bytes>> {
    let route = (ctx.request().method.clone(), ctx.request().uri.path().to_owned());
    match (&route.0, route.1.as_str()) {
        (&Method::GET, "/hello") => hello(&mut ctx),
        (&Method::POST, "/users") => create_user(&mut ctx).await,
        (&Method::GET, "/whoami") => whoami(&mut ctx),
        (&Method::GET, "/old") => ctx.redirect("/hello", Some(StatusCode::MOVED_PERMANENTLY)),
        _ => ctx.status(StatusCode::NOT_FOUND).send("not found"),
    }
    ctx.into_response()
}

// GET /hello?name=…
fn hello(ctx: &mut Context<Incoming>) {
    let name = ctx.query("name").into_owned();
    let name = if name.is_empty() { "world".to_owned() } else { name };
    ctx.send(format!("hello, {name}"));
}

// POST /users: JSON, urlencoded or multipart, the handler does not care.
async fn create_user(ctx: &mut Context<Incoming>) {
    match ctx.body_parser::<NewUser>().await {
        Ok(user) => {
            if let Err(e) = ctx.status(StatusCode::CREATED).json(&user) {
                error!("failed to write user: {e}");
            }
        }
        Err(e) => {
            let code = e.status_code();
            ctx.status(code).send(Json(serde_json::json!({ "error": e.to_string() })));
        }
    }
}

// GET /whoami
fn whoami(ctx: &mut Context<Incoming>) {
    let mut caller = Caller::default();
    match ctx.headers(&mut caller) {
        Ok(()) => ctx.send(Json(caller)),
        Err(e) => ctx.status(e.status_code()).send(e.to_string()),
    }
}
