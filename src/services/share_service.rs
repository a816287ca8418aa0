use serde_json::Value;
use tracing::{info, instrument};

use crate::api::ApiClient;
use crate::fetch_error::FetchError;
use crate::models::{ChatReply, ShareChannel, ShareReceipt, ShareRequest, ShareSection};

/// Report sharing and the assistant chat, both thin pass-throughs to the
/// backend.
#[derive(Clone)]
pub struct ShareService {
    api: ApiClient,
}

impl ShareService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Sends a section report to `contact` (an email address or a phone
    /// number depending on `channel`).
    #[instrument(skip(self, payload))]
    pub async fn share(
        &self,
        section: ShareSection,
        payload: Value,
        channel: ShareChannel,
        contact: &str,
    ) -> Result<ShareReceipt, FetchError> {
        let contact = contact.trim().to_string();
        let (email, phone) = match channel {
            ShareChannel::Email => (Some(contact), None),
            ShareChannel::Whatsapp => (None, Some(contact)),
        };
        let request = ShareRequest {
            section,
            payload,
            channel,
            email,
            phone,
        };
        let receipt = self.api.share(&request).await?;
        info!("Shared {:?} report via {:?}", section, channel);
        Ok(receipt)
    }

    #[instrument(skip(self))]
    pub async fn ask(&self, query: &str) -> Result<ChatReply, FetchError> {
        self.api.chatbot_query(query).await
    }
}
