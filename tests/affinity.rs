//! Session-affinity acquisition tests against a mock remote endpoint.

use std::sync::Arc;

use http_invoker::auth::NoCredentials;
use http_invoker::codec::JsonCodec;
use http_invoker::pool::HttpConnectionPool;
use http_invoker::{TargetConfig, TargetContext};

mod common;

fn context(remote: &common::MockRemote, config: TargetConfig) -> Arc<TargetContext> {
    TargetContext::new(
        Arc::new(HttpConnectionPool::new(remote.uri())),
        Arc::new(JsonCodec),
        Arc::new(NoCredentials),
        config,
    )
}

#[tokio::test]
async fn concurrent_waiters_share_one_probe() {
    let remote = common::start_mock_remote(|request| {
        assert_eq!(request.path, "/common/v1/affinity");
        assert_eq!(request.method, "GET");
        common::response(204, &[("Set-Cookie", "JSESSIONID=node-7; Path=/")], b"")
    })
    .await;
    let ctx = context(&remote, TargetConfig::default());

    let mut waiters = Vec::new();
    for _ in 0..6 {
        let ctx = ctx.clone();
        waiters.push(tokio::spawn(async move {
            ctx.await_session_id(true).await
        }));
    }
    for waiter in waiters {
        assert_eq!(waiter.await.unwrap().as_deref(), Some("node-7"));
    }

    // Exactly one probe request was issued for all six callers.
    assert_eq!(remote.request_count(), 1);
}

#[tokio::test]
async fn failed_probe_releases_waiters_with_none() {
    // Bind and immediately drop a listener so the port refuses
    // connections.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let ctx = TargetContext::new(
        Arc::new(HttpConnectionPool::new(
            format!("http://{addr}").parse().unwrap(),
        )),
        Arc::new(JsonCodec),
        Arc::new(NoCredentials),
        TargetConfig::default(),
    );

    let mut waiters = Vec::new();
    for _ in 0..4 {
        let ctx = ctx.clone();
        waiters.push(tokio::spawn(async move {
            ctx.await_session_id(true).await
        }));
    }
    for waiter in waiters {
        assert_eq!(waiter.await.unwrap(), None);
    }
}

#[tokio::test]
async fn clear_allows_a_fresh_acquisition() {
    let remote = common::start_mock_remote(|request| {
        let id = format!("gen-{}", request.path.len());
        common::response(
            204,
            &[("Set-Cookie", &format!("JSESSIONID={id}"))],
            b"",
        )
    })
    .await;
    let ctx = context(&remote, TargetConfig::default());

    let first = ctx.await_session_id(true).await;
    assert!(first.is_some());
    assert_eq!(remote.request_count(), 1);

    ctx.clear_session_id();
    assert_eq!(ctx.session_id(), None);

    let second = ctx.await_session_id(true).await;
    assert!(second.is_some());
    assert_eq!(remote.request_count(), 2);
}

#[tokio::test]
async fn eager_configuration_probes_at_init() {
    let remote = common::start_mock_remote(|_| {
        common::response(204, &[("Set-Cookie", "JSESSIONID=eager-1")], b"")
    })
    .await;
    let config = TargetConfig {
        eager_affinity: true,
        ..TargetConfig::default()
    };
    let ctx = context(&remote, config);
    ctx.init();

    // Not required: piggy-backs on the acquisition init() started.
    assert_eq!(
        ctx.await_session_id(false).await.as_deref(),
        Some("eager-1")
    );
    assert_eq!(remote.request_count(), 1);
}

#[tokio::test]
async fn probe_path_extends_the_target_base_path() {
    let remote = common::start_mock_remote(|request| {
        assert_eq!(request.path, "/app/common/v1/affinity");
        common::response(204, &[("Set-Cookie", "JSESSIONID=base-path")], b"")
    })
    .await;
    let ctx = TargetContext::new(
        Arc::new(HttpConnectionPool::new(
            format!("http://{}/app", remote.addr).parse().unwrap(),
        )),
        Arc::new(JsonCodec),
        Arc::new(NoCredentials),
        TargetConfig::default(),
    );

    assert_eq!(
        ctx.await_session_id(true).await.as_deref(),
        Some("base-path")
    );
}

#[tokio::test]
async fn session_id_survives_unrelated_exchanges() {
    let remote = common::start_mock_remote(|request| {
        if request.path.ends_with("/affinity") {
            common::response(204, &[("Set-Cookie", "JSESSIONID=sticky")], b"")
        } else {
            common::response(204, &[], b"")
        }
    })
    .await;
    let ctx = context(&remote, TargetConfig::default());

    assert_eq!(ctx.await_session_id(true).await.as_deref(), Some("sticky"));

    // A response without the cookie leaves the cached identifier alone.
    let connection = ctx.pool().acquire(false).await.unwrap();
    let request = http::Request::builder()
        .method(http::Method::GET)
        .uri("/other")
        .body(())
        .unwrap();
    ctx.dispatch(connection, request, None, None).await.unwrap();
    assert_eq!(ctx.session_id().as_deref(), Some("sticky"));
}
