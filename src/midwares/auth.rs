use std::{net::SocketAddr, sync::Arc, time::{SystemTime, UNIX_EPOCH}};
use axum::{extract::{ConnectInfo, Request}, middleware::Next, response::IntoResponse, Extension};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::app_state::{AppError, Config, RequestContext};

type HmacSha256 = Hmac<Sha256>;

pub fn hmac_sha256(key: &str, data: &str) -> String {
  let mut mac = HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC can take key of any size");
  mac.update(data.as_bytes());
  let result = mac.finalize();
  hex::encode(result.into_bytes())
}

// Signed-request check: every caller carries (timestamp, signature,
// user) either in headers or, for the websocket route, packed into the
// subprotocol list. The signature covers path + timestamp + user so a
// token minted for one user cannot drive another user's board.
pub async fn signed_request_auth(
  ConnectInfo(addr): ConnectInfo<SocketAddr>,
  Extension(config): Extension<Arc<Config>>,
  mut req: Request,
  next: Next,
) -> Result<impl IntoResponse, AppError> {

  let headers = req.headers();
  let uri_path = req.uri().path().to_string();
  let now = SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map_err(|e| AppError::InternalError(e.to_string()))?
    .as_secs();

  let (timestamp, signature, user) = if uri_path == "/wsboard" {
    // websockets cannot set custom headers from a browser, so the
    // credentials ride in sec-websocket-protocol
    headers
      .get("sec-websocket-protocol")
      .and_then(|v| v.to_str().ok())
      .map(|proto| {
        let mut parts = proto.split(',').map(|s| s.trim());
        let ws_ts = parts.next().and_then(|s| s.parse::<u64>().ok());
        let ws_sig = parts.next().map(|s| s.to_string());
        let ws_user = parts.next().map(|s| s.to_string());
        (ws_ts, ws_sig, ws_user)
      })
      .unwrap_or((None, None, None))
  } else {
    let http_ts = headers
      .get("x-timestamp")
      .and_then(|v| v.to_str().ok())
      .and_then(|v| v.parse::<u64>().ok());
    let http_sig = headers
      .get("x-signature")
      .and_then(|v| v.to_str().ok())
      .map(|s| s.to_string());
    let http_user = headers
      .get("x-user")
      .and_then(|v| v.to_str().ok())
      .map(|s| s.to_string());
    (http_ts, http_sig, http_user)
  };

  let (Some(ts), Some(sig), Some(user_id)) = (timestamp, signature, user) else {
    return Err(AppError::Unauthorized("Missing timestamp, signature or user".to_string()));
  };

  if now.saturating_sub(ts) > 60 {
    return Err(AppError::Unauthorized("Request expired".to_string()));
  }

  let expected = hmac_sha256(&config.hmac_key, &format!("{}{}{}", uri_path, ts, user_id));
  if sig != expected {
    return Err(AppError::Unauthorized("Invalid signature".to_string()));
  }

  // prefer the proxy header, fall back to the socket address
  let remote_ip = req
    .headers()
    .get("x-forwarded-for")
    .and_then(|h| h.to_str().ok())
    .unwrap_or(&addr.ip().to_string())
    .to_string();

  req.extensions_mut().insert(RequestContext {
    user_id,
    remote_ip,
    timestamp: ts.to_string(),
    signature: sig,
  });

  Ok(next.run(req).await)
}
