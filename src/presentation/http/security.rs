use poem::Result as PoemResult;
use poem_openapi::{SecurityScheme, auth::ApiKey};

use crate::{domain::errors::BroadcastError, presentation::http::mappers::map_error};

#[derive(SecurityScheme)]
#[oai(ty = "api_key", key_name = "x-api-key", key_in = "header")]
pub struct ApiKeyAuth(pub ApiKey);

impl ApiKeyAuth {
    /// A present but wrong key is a 403; a missing header is rejected earlier with 401.
    pub fn verify(&self, expected: &str) -> PoemResult<()> {
        if self.0.key == expected {
            Ok(())
        } else {
            Err(map_error(BroadcastError::Forbidden(
                "invalid API key".to_string(),
            )))
        }
    }
}
