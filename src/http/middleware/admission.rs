//! Admission control middleware.
//!
//! Enforces the policy's verdict for every request under the protected
//! prefix: 429 on reject, a sleep on delay, pass-through otherwise.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::admission::{Admission, Clock, Verdict};
use crate::http::request::request_id;
use crate::http::response::{apply_quota_headers, rejection_response};
use crate::http::server::AppState;

pub async fn admission_middleware<C: Clock>(
    State(state): State<AppState<C>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.is_protected(request.uri().path()) {
        return next.run(request).await;
    }

    let key = state.extractor.extract(&request);
    let Admission { verdict, quota } = state.policy.admit(&key);
    let window = state.policy.window();

    match verdict {
        Verdict::Reject(reason) => {
            tracing::info!(
                request_id = %request_id(&request),
                client = %key,
                reason = %reason,
                "Admission denied"
            );
            return rejection_response(reason, &state.reject_message, &quota, window);
        }
        Verdict::AllowWithDelay(delay) => {
            // The slot is already spent. If the client disconnects, this
            // future is dropped mid-sleep and nothing is refunded.
            tokio::time::sleep(delay).await;
        }
        Verdict::Allow => {}
    }

    let mut response = next.run(request).await;
    apply_quota_headers(response.headers_mut(), &quota, window);
    response
}
