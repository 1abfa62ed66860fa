use std::sync::mpsc;

use fibretry_http::{AsyncHttpClient, ClientOptions, HttpResponse, Result};

fn main() -> anyhow::Result<()> {
    let base_url =
        std::env::var("FIBRETRY_BASE_URL").unwrap_or_else(|_| "https://httpbin.org".to_owned());

    let client = AsyncHttpClient::new(base_url)?.with_options(ClientOptions::from_env()?)?;
    let (tx, rx) = mpsc::channel();

    client.get(
        "/get",
        [("greeting", "hello world")],
        move |outcome: Result<HttpResponse>| {
            let _ = tx.send(outcome);
        },
    )?;

    println!("request submitted, waiting for callback...");
    let response = rx.recv()??;
    println!("{} {}", response.status, response.body_as_string());

    Ok(())
}
