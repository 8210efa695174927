use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use tracing::debug;

use crate::session::Session;
use crate::state::AppState;

/// Attach a [`Session`] to every request, built from the bearer token when
/// one is present and valid. Never rejects: anonymous clients may read the
/// board and submit a name.
pub async fn load_session(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let session = match req.headers().typed_get::<Authorization<Bearer>>() {
        Some(auth) => match state.tokens.verify(auth.token()) {
            Some(claims) => Session::from_claims(claims),
            None => {
                debug!("Ignoring invalid session token");
                Session::anonymous()
            }
        },
        None => Session::anonymous(),
    };

    req.extensions_mut().insert(session);
    next.run(req).await
}
