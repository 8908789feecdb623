use serde::{Deserialize, Serialize};

/// JWT payload. The role is a snapshot taken at issuance; it is not
/// refreshed from the store while the token lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,  // user email
    pub role: String, // role at issuance time
    pub iat: usize,   // issued at (unix timestamp)
    pub exp: usize,   // expires at (unix timestamp)
}
