use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims issued by the identity provider. `sub` is the profile id the
/// session belongs to (the auth uid doubles as the profile document id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: Uuid,
}

impl Claims {
    pub fn new(profile_id: impl Into<String>, duration_secs: i64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: profile_id.into(),
            iat: now,
            exp: now + duration_secs,
            jti: Uuid::now_v7(),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

/// Authenticated caller. Handlers pass `profile_id` explicitly into the
/// matching core; nothing below the route layer reads session state.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub profile_id: String,
    pub token_id: Uuid,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            profile_id: claims.sub,
            token_id: claims.jti,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_claims_are_not_expired() {
        let claims = Claims::new("profile-1", 3600);
        assert!(!claims.is_expired());
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn auth_user_takes_subject_as_profile_id() {
        let claims = Claims::new("profile-1", 60);
        let jti = claims.jti;
        let user = AuthUser::from(claims);
        assert_eq!(user.profile_id, "profile-1");
        assert_eq!(user.token_id, jti);
    }
}
