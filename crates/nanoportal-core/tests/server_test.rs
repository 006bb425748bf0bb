use nanoportal_core::{Controller, Outcome, Portal, PortalConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

fn portal() -> Portal {
    Portal::new(PortalConfig::default()).controller(
        Controller::new("echo")
            .action("path", |_, params| Outcome::data(&params))
            .action("form", |scope, _| {
                let name = scope.request().get("name", "nobody").to_string();
                let ip = scope.request().ip().map(|ip| ip.to_string());
                scope.set("name", name);
                scope.set("ip", ip);
                let posted = scope.request().was_posted();
                scope.set("posted", posted);
                Ok(Outcome::None)
            }),
    )
}

async fn start() -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(portal().serve(listener));
    addr
}

async fn exchange(addr: std::net::SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut out = Vec::new();
    stream.read_to_end(&mut out).await.unwrap();
    String::from_utf8_lossy(&out).to_string()
}

#[tokio::test]
async fn test_get_over_socket() {
    let addr = start().await;
    let response = exchange(
        addr,
        "GET /echo/path/a/b?x=1 HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;

    assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
    assert!(response.to_ascii_lowercase().contains("x-request-id:"));
    assert!(response.ends_with(r#"["a","b"]"#), "{response}");
}

#[tokio::test]
async fn test_form_post_over_socket() {
    let addr = start().await;
    let body = "name=ada+lovelace";
    let raw = format!(
        "POST /echo/form HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\
         Content-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    );
    let response = exchange(addr, &raw).await;

    assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
    assert!(
        response.ends_with(r#"{"ip":"127.0.0.1","name":"ada lovelace","posted":true}"#),
        "{response}"
    );
}

#[tokio::test]
async fn test_unknown_path_over_socket() {
    let addr = start().await;
    let response = exchange(
        addr,
        "GET /nope HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;

    assert!(response.starts_with("HTTP/1.1 404 Not Found"), "{response}");
}
