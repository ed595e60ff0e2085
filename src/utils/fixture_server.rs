// Minimal HTTP server handing canned pages to a real browser in tests.
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use crate::utils::config::Config;

// Serves `pages` keyed by request path (query included) until the runtime shuts down.
pub async fn serve(pages: HashMap<String, String>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let pages = Arc::new(pages);

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let pages = Arc::clone(&pages);
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                let n = stream.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]);
                let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();

                let (status, body) = match pages.get(&path) {
                    Some(body) => ("200 OK", body.clone()),
                    None => ("404 Not Found", "<html><body>Missing</body></html>".to_string()),
                };
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    addr
}

pub fn config_for(addr: SocketAddr, output_dir: &std::path::Path, extra: &[(&str, &str)]) -> Config {
    let mut env: HashMap<String, String> = extra.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    env.insert("D2L_BASE_URL".to_string(), format!("http://{}", addr));
    env.insert("D2L_OUTPUT_DIR".to_string(), output_dir.display().to_string());
    env.insert("D2L_WAIT_MS".to_string(), "5000".to_string());
    env.insert("D2L_TIMEOUT_MS".to_string(), "10000".to_string());
    Config::from_lookup(|key| env.get(key).cloned()).unwrap()
}

pub fn page(body: &str) -> String {
    format!("<!DOCTYPE html><html><body>{}</body></html>", body)
}
