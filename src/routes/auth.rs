use serde::{Deserialize, Serialize};

use crate::db::user::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id for members, free-form for admins
    pub role: Role,
    pub exp: i64, // expiration timestamp
    pub iat: i64, // issued at timestamp
}

/// Who is calling, as established by a verified token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    Admin,
    Member(UserId),
}

impl Caller {
    pub fn may_act_for(&self, user_id: UserId) -> bool {
        match self {
            Caller::Admin => true,
            Caller::Member(id) => *id == user_id,
        }
    }
}

// Tokens are minted by the login front end; this side only verifies them.
pub struct AuthService {
    jwt_secret: String,
}

impl AuthService {
    pub fn new(jwt_secret: String) -> Self {
        Self { jwt_secret }
    }

    pub fn verify_token(&self, token: &str) -> Result<Caller, Box<dyn std::error::Error>> {
        let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::HS256);
        validation.leeway = 10;
        validation.validate_exp = true;

        let token_data = jsonwebtoken::decode::<Claims>(
            token,
            &jsonwebtoken::DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|err| {
            tracing::error!("Error decoding token: {:?}", err);
            "Invalid token"
        })?;

        let claims = token_data.claims;
        match claims.role {
            Role::Admin => Ok(Caller::Admin),
            Role::User => {
                let id = claims.sub.parse::<UserId>().map_err(|_| "Invalid subject")?;
                Ok(Caller::Member(id))
            }
        }
    }

    #[cfg(test)]
    pub fn issue_token(&self, sub: &str, role: Role) -> String {
        let now = chrono::Utc::now();
        let claims = Claims {
            sub: sub.to_string(),
            role,
            exp: (now + chrono::Duration::minutes(15)).timestamp(),
            iat: now.timestamp(),
        };
        jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .unwrap()
    }
}
