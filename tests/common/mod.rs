//! Shared utilities for integration testing: a programmable mock remote
//! endpoint speaking just enough HTTP/1.1.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use http_invoker::codec::{encode_exception, Codec, JsonCodec, MarshallingConfig, RemoteException};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// One request as seen by the mock remote.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Handle onto a running mock remote.
pub struct MockRemote {
    pub addr: SocketAddr,
    pub requests: Arc<Mutex<Vec<RecordedRequest>>>,
    pub connections: Arc<AtomicUsize>,
}

impl MockRemote {
    pub fn uri(&self) -> http::Uri {
        format!("http://{}", self.addr).parse().unwrap()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

/// Start a keep-alive mock remote; `respond` maps each recorded request to
/// raw response bytes.
pub async fn start_mock_remote<F>(respond: F) -> MockRemote
where
    F: Fn(&RecordedRequest) -> Vec<u8> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests: Arc<Mutex<Vec<RecordedRequest>>> = Arc::new(Mutex::new(Vec::new()));
    let connections = Arc::new(AtomicUsize::new(0));
    let respond = Arc::new(respond);

    {
        let requests = requests.clone();
        let connections = connections.clone();
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((mut socket, _)) => {
                        connections.fetch_add(1, Ordering::SeqCst);
                        let requests = requests.clone();
                        let respond = respond.clone();
                        tokio::spawn(async move {
                            let mut buf = Vec::new();
                            loop {
                                let request = match read_request(&mut socket, &mut buf).await {
                                    Some(request) => request,
                                    None => break,
                                };
                                let response = respond(&request);
                                requests.lock().unwrap().push(request);
                                if socket.write_all(&response).await.is_err() {
                                    break;
                                }
                            }
                        });
                    }
                    Err(_) => break,
                }
            }
        });
    }

    MockRemote {
        addr,
        requests,
        connections,
    }
}

/// Read one request (headers plus body) from the socket. Returns `None`
/// when the peer closes.
async fn read_request(
    socket: &mut tokio::net::TcpStream,
    buf: &mut Vec<u8>,
) -> Option<RecordedRequest> {
    let header_end = loop {
        if let Some(pos) = find(buf, b"\r\n\r\n") {
            break pos + 4;
        }
        let mut tmp = [0u8; 4096];
        match socket.read(&mut tmp).await {
            Ok(0) | Err(_) => return None,
            Ok(n) => buf.extend_from_slice(&tmp[..n]),
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect();

    let chunked = headers
        .iter()
        .any(|(key, value)| key.eq_ignore_ascii_case("transfer-encoding") && value.contains("chunked"));
    let content_length: usize = headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.parse().ok())
        .unwrap_or(0);

    let body_end = if chunked {
        loop {
            if let Some(pos) = find(&buf[header_end..], b"0\r\n\r\n") {
                break header_end + pos + 5;
            }
            let mut tmp = [0u8; 4096];
            match socket.read(&mut tmp).await {
                Ok(0) | Err(_) => return None,
                Ok(n) => buf.extend_from_slice(&tmp[..n]),
            }
        }
    } else {
        while buf.len() < header_end + content_length {
            let mut tmp = [0u8; 4096];
            match socket.read(&mut tmp).await {
                Ok(0) | Err(_) => return None,
                Ok(n) => buf.extend_from_slice(&tmp[..n]),
            }
        }
        header_end + content_length
    };

    let body = buf[header_end..body_end].to_vec();
    buf.drain(..body_end);
    Some(RecordedRequest {
        method,
        path,
        headers,
        body,
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Build raw response bytes with a Content-Length body.
pub fn response(status: u16, headers: &[(&str, &str)], body: &[u8]) -> Vec<u8> {
    let reason = match status {
        200 => "OK",
        204 => "No Content",
        500 => "Internal Server Error",
        _ => "Unknown",
    };
    let mut out = format!("HTTP/1.1 {status} {reason}\r\n");
    for (key, value) in headers {
        out.push_str(&format!("{key}: {value}\r\n"));
    }
    if status != 204 {
        out.push_str(&format!("Content-Length: {}\r\n", body.len()));
    }
    out.push_str("\r\n");
    let mut bytes = out.into_bytes();
    if status != 204 {
        bytes.extend_from_slice(body);
    }
    bytes
}

/// Encode an exception payload the way the server side would.
#[allow(dead_code)]
pub fn exception_payload(exception: &RemoteException) -> Vec<u8> {
    let codec = JsonCodec;
    let mut buf = Vec::new();
    {
        let mut writer = codec
            .writer(&MarshallingConfig::exceptions(), Box::new(&mut buf))
            .unwrap();
        encode_exception(writer.as_mut(), exception).unwrap();
    }
    buf
}
