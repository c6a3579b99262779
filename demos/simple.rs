/*
 * simple.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Staffetta, an asynchronous HTTP client library.
 *
 * Basic usage: a GET with a callback, a GET awaited as a future, and a
 * plain-text POST.
 */

use staffetta::{HttpClient, HttpClientSettings};
use tokio::sync::oneshot;

#[tokio::main]
async fn main() {
    let client = HttpClient::new(HttpClientSettings::default());

    // GET with a completion callback.
    let (tx, rx) = oneshot::channel();
    let request = staffetta::HttpRequest::new(
        staffetta::Method::Get,
        "www.google.com".parse().expect("url"),
    );
    client.execute_request(request, "", move |result| {
        let _ = tx.send(result);
    });
    if let Ok(result) = rx.await {
        println!("{}", result.body_as_string());
    }

    // GET awaited directly.
    match client.get("https://duckduckgo.com").await {
        Ok(result) => println!("status {}", result.status_code),
        Err(e) => eprintln!("bad url: {}", e),
    }

    // POST some plain text.
    let result = client
        .post(
            "http://httpbin.org/post",
            b"some data to post".to_vec(),
            "text/plain",
        )
        .await
        .expect("url");
    println!("{}", result.body_as_string());

    client.shutdown().await;
}
