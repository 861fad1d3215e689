// This example serves a directory over HTTP/1.
//
// Run `cargo run --example serve_dir -- <root> [port]`, then
// point your browser to http://localhost:3000/

use std::{env, net::SocketAddr};

use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use staticfile_stream::ServeDir;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let mut args = env::args().skip(1);
    let root = args.next().unwrap_or_else(|| ".".to_owned());
    let port = match args.next() {
        Some(port) => port.parse()?,
        None => 3000,
    };

    let mut serve_dir = ServeDir::new(root)?;
    serve_dir
        .read_only(true)
        .not_found_document(Some("/404.html".to_owned()));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = TcpListener::bind(addr).await?;
    println!(
        "Serving {} on http://localhost:{}/",
        serve_dir.root().display(),
        port
    );

    loop {
        let (stream, remote) = listener.accept().await?;
        let serve_dir = serve_dir.clone();
        tokio::spawn(async move {
            if let Err(err) = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), serve_dir)
                .await
            {
                tracing::warn!(%remote, error = %err, "connection error");
            }
        });
    }
}
