use axum::{Extension, Json};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use nyboard_types::api::{Claims, SessionResponse};
use nyboard_types::models::Entry;

/// Session tokens stay valid for a year; the board is seasonal.
const TOKEN_TTL_DAYS: i64 = 365;

/// What this client has already claimed on the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submitted {
    pub id: Uuid,
    pub name: String,
    pub rank: u64,
}

impl From<&Entry> for Submitted {
    fn from(entry: &Entry) -> Self {
        Self {
            id: entry.id,
            name: entry.name.clone(),
            rank: entry.rank,
        }
    }
}

/// One client's view of its own participation, rebuilt on every request
/// from the token it presents. A client without a valid token is anonymous.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    submitted: Option<Submitted>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn from_claims(claims: Claims) -> Self {
        Self {
            submitted: Some(Submitted {
                id: claims.sub,
                name: claims.name,
                rank: claims.rank,
            }),
        }
    }

    pub fn submitted(&self) -> Option<&Submitted> {
        self.submitted.as_ref()
    }

    pub fn record(&mut self, entry: &Entry) {
        self.submitted = Some(entry.into());
    }
}

#[derive(Clone)]
pub struct TokenKeys {
    header: Header,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenKeys {
    /// HS256 keys derived from a shared secret.
    pub fn new(secret: &str) -> Self {
        Self {
            header: Header::default(),
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Keys whose header names an algorithm the secret cannot sign with.
    #[cfg(test)]
    pub(crate) fn unusable(secret: &str) -> Self {
        Self {
            header: Header::new(jsonwebtoken::Algorithm::RS256),
            ..Self::new(secret)
        }
    }

    pub fn issue(&self, submitted: &Submitted) -> anyhow::Result<String> {
        let claims = Claims {
            sub: submitted.id,
            name: submitted.name.clone(),
            rank: submitted.rank,
            exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
        };

        Ok(encode(&self.header, &claims, &self.encoding)?)
    }

    /// `None` for anything that fails signature or expiry checks.
    pub fn verify(&self, token: &str) -> Option<Claims> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .ok()
    }
}

pub async fn current_session(Extension(session): Extension<Session>) -> Json<SessionResponse> {
    let submitted = session.submitted();
    Json(SessionResponse {
        name: submitted.map(|s| s.name.clone()),
        rank: submitted.map(|s| s.rank),
        can_post: submitted.is_some(),
    })
}
