pub mod rate_limit;
pub mod request_id;
pub mod session_auth;

pub use rate_limit::{AskRateLimiter, RateLimitExceeded, TokenBucket};
pub use request_id::{REQUEST_ID_HEADER, RequestId, request_id_middleware};
pub use session_auth::{
    AuthUser, SESSION_COOKIE, clear_session_cookie, require_auth, session_cookie,
    session_token_from_headers,
};
