//! Test servers that wiremock cannot imitate.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Serve `head` followed by `filler` repeated until the client hangs up.
/// Responses are chunked and carry no Content-Length. Returns the base URL.
pub async fn endless_chunked_server(
    content_type: &'static str,
    head: &'static str,
    filler: &'static str,
) -> String {
    assert!(!head.is_empty() && !filler.is_empty());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(serve_endless(stream, content_type, head, filler));
        }
    });
    format!("http://{addr}")
}

async fn serve_endless(
    mut stream: TcpStream,
    content_type: &'static str,
    head: &'static str,
    filler: &'static str,
) {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => request.extend_from_slice(&buf[..n]),
        }
    }

    let header = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {content_type}\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n"
    );
    if stream.write_all(header.as_bytes()).await.is_err() || request.starts_with(b"HEAD") {
        return;
    }

    let mut next = head;
    loop {
        let frame = format!("{:x}\r\n{next}\r\n", next.len());
        if stream.write_all(frame.as_bytes()).await.is_err() {
            return;
        }
        next = filler;
    }
}
