use crate::decode::deserialize_number_from_string;
use crate::option::Params;
use crate::Client;
use crate::MalError;
use crate::Response;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

/// Account of the legacy API credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct User {
    #[serde(default, deserialize_with = "deserialize_number_from_string")]
    pub id: u64,
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Clone, Copy)]
pub struct AccountService<'a> {
    pub(crate) client: &'a Client,
}

impl AccountService<'_> {
    /// Check the Basic credentials and return their account.
    ///
    /// Fails with [`MalError::NoContent`] when the server answers 204.
    pub async fn verify(&self, cancel: &CancellationToken) -> Result<(User, Response), MalError> {
        self.client
            .get_xml("api/account/verify_credentials.xml", Params::new(), cancel)
            .await
    }
}
