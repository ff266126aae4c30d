//! A stand-in for a hosted relay channel.
//!
//! `GET /` streams a fake webhook delivery every second, `HEAD /new` answers
//! with a redirect to the stream, so both `sse-relay` modes can be tried
//! locally:
//!
//! ```text
//! cargo run --example relay_server
//! cargo run -- --channel-endpoint http://127.0.0.1:3000/new
//! ```

use axum::{
    body::Body,
    http::{
        header::{CONTENT_TYPE, LOCATION},
        StatusCode,
    },
    response::IntoResponse,
    routing::{get, head},
    Router,
};
use futures_util::{stream, StreamExt};
use rand_core::{OsRng, RngCore};
use std::{convert::Infallible, time::Duration};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + 'static>> {
    let arg = std::env::args().nth(1);
    let listen_addr = arg.as_deref().unwrap_or("127.0.0.1:3000");

    let router = Router::new()
        .route("/", get(event_stream))
        .route("/new", head(new_channel));

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    println!("Starting relay server on {}", listener.local_addr()?);
    axum::serve(listener, router).await?;

    Ok(())
}

async fn new_channel() -> impl IntoResponse {
    (StatusCode::TEMPORARY_REDIRECT, [(LOCATION, "http://127.0.0.1:3000/")])
}

async fn event_stream() -> impl IntoResponse {
    let ready = stream::once(async { Ok::<_, Infallible>(String::from("event: ready\ndata: {}\n\n")) });

    let deliveries = stream::unfold(0u64, |counter| async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        let counter = counter + 1;
        let frame = delivery(counter);
        println!("Sending delivery {}", counter);
        Some((Ok(frame), counter))
    });

    (
        [(CONTENT_TYPE, "text/event-stream")],
        Body::from_stream(ready.chain(deliveries)),
    )
}

fn delivery(counter: u64) -> String {
    let body = match OsRng.next_u32() % 3 {
        0 => r#"{"action":"opened"}"#,
        1 => r#"{"action":"closed"}"#,
        _ => r#"{"zen":"Keep it logically awesome."}"#,
    };
    format!(
        "id: {}\nevent: webhook\ndata: {{\"x-delivery\":\"{:08x}\",\"body\":{}}}\n\n",
        counter,
        OsRng.next_u32(),
        body
    )
}
