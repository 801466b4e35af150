// Mock of the device's /update endpoint
#![allow(dead_code)]

use std::net::TcpListener as StdTcpListener;
use std::sync::{Arc, Mutex};
use std::thread;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedField {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

#[derive(Clone)]
struct MockState {
    status: StatusCode,
    body: &'static str,
    requests: Arc<Mutex<Vec<Vec<ReceivedField>>>>,
}

pub struct MockOta {
    pub url: String,
    requests: Arc<Mutex<Vec<Vec<ReceivedField>>>>,
}

impl MockOta {
    /// Serve `/update` on an ephemeral port, answering every upload with `status`
    pub fn start(status: StatusCode, body: &'static str) -> Self {
        let listener = StdTcpListener::bind("127.0.0.1:0").expect("bind mock OTA listener");
        listener
            .set_nonblocking(true)
            .expect("non-blocking mock OTA listener");
        let addr = listener.local_addr().expect("mock OTA address");

        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            status,
            body,
            requests: Arc::clone(&requests),
        };

        thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("mock OTA runtime");
            runtime.block_on(async move {
                let listener =
                    tokio::net::TcpListener::from_std(listener).expect("tokio mock OTA listener");
                let app = Router::new()
                    .route("/update", post(handle_update))
                    .with_state(state);
                axum::serve(listener, app).await.expect("serve mock OTA");
            });
        });

        Self {
            url: format!("http://{addr}/update"),
            requests,
        }
    }

    pub fn ok() -> Self {
        Self::start(StatusCode::OK, "Update successful")
    }

    /// Multipart fields of every upload received so far
    pub fn requests(&self) -> Vec<Vec<ReceivedField>> {
        self.requests.lock().expect("mock OTA requests").clone()
    }
}

async fn handle_update(
    State(state): State<MockState>,
    mut multipart: Multipart,
) -> (StatusCode, &'static str) {
    let mut fields = Vec::new();
    while let Some(field) = multipart.next_field().await.expect("multipart field") {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(|s| s.to_string());
        let content_type = field.content_type().map(|s| s.to_string());
        let data = field.bytes().await.expect("multipart field bytes").to_vec();
        fields.push(ReceivedField {
            name,
            file_name,
            content_type,
            data,
        });
    }
    state
        .requests
        .lock()
        .expect("mock OTA requests")
        .push(fields);
    (state.status, state.body)
}

/// URL of a port nothing listens on
pub fn refused_url() -> String {
    let listener = StdTcpListener::bind("127.0.0.1:0").expect("bind throwaway listener");
    let addr = listener.local_addr().expect("throwaway address");
    drop(listener);
    format!("http://{addr}/update")
}

/// Deterministic image: noisy blocks alternating with erased (0xFF) flash
pub fn firmware_image(len: usize) -> Vec<u8> {
    let mut image = vec![0xE9, 0x02, 0x02, 0x20];
    let mut state: u32 = 0x1234_5678;
    while image.len() < len {
        state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        let byte = if (image.len() / 256) % 2 == 0 {
            (state >> 16) as u8
        } else {
            0xFF
        };
        image.push(byte);
    }
    image.truncate(len);
    image
}
