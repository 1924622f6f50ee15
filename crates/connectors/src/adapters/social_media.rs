//! Social-profile directory adapter.

use crate::error::{ConnectorError, ConnectorResult};
use crate::traits::{SearchContext, SourceConnector};
use crate::transport::{HttpTransport, TransportRequest};
use async_trait::async_trait;
use osint_core::types::{EntityType, MediaType, Query, RawResult, SourceType};
use serde::Deserialize;
use std::sync::Arc;

const SOURCE_NAME: &str = "social_profiles";
const SUPPORTED: &[EntityType] = &[
    EntityType::SocialProfile,
    EntityType::Username,
    EntityType::Person,
];

#[derive(Debug, Deserialize)]
struct ProfileEnvelope {
    #[serde(default)]
    profiles: Vec<Profile>,
}

#[derive(Debug, Deserialize)]
struct Profile {
    platform: String,
    username: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    bio: Option<String>,
    profile_url: String,
    #[serde(default)]
    joined: Option<String>,
    #[serde(default)]
    location: Option<String>,
}

pub struct SocialProfileConnector {
    base_url: String,
    transport: Arc<dyn HttpTransport>,
}

impl SocialProfileConnector {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            base_url: "https://profiles.api.example/v2/lookup".to_string(),
            transport,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl SourceConnector for SocialProfileConnector {
    fn source_name(&self) -> &str {
        SOURCE_NAME
    }

    fn source_type(&self) -> SourceType {
        SourceType::SocialMedia
    }

    fn supported_entity_types(&self) -> &[EntityType] {
        SUPPORTED
    }

    fn rate_limit_per_hour(&self) -> u32 {
        200
    }

    fn base_confidence(&self) -> f64 {
        0.7
    }

    async fn search(&self, query: &Query, ctx: &SearchContext) -> ConnectorResult<Vec<RawResult>> {
        ctx.check()?;
        let url = format!(
            "{}?handle={}",
            self.base_url,
            urlencoding::encode(query.query_string.trim())
        );

        let response = self
            .transport
            .execute(TransportRequest::get(url), ctx)
            .await?;
        if response.status != 200 {
            return Err(ConnectorError::from_status(response.status));
        }

        let envelope: ProfileEnvelope = serde_json::from_slice(&response.body)
            .map_err(|e| ConnectorError::MalformedResponse(e.to_string()))?;

        let results = envelope
            .profiles
            .into_iter()
            .map(|profile| {
                let title = format!("{} profile: {}", profile.platform, profile.username);
                let body = serde_json::json!({
                    "platform": profile.platform,
                    "username": profile.username,
                    "display_name": profile.display_name,
                    "bio": profile.bio,
                    "joined": profile.joined,
                    "location": profile.location,
                });
                let mut result = RawResult::new(
                    query.query_id.clone(),
                    SOURCE_NAME,
                    profile.profile_url,
                    title,
                    body.to_string().into_bytes(),
                    MediaType::Json,
                )
                .with_metadata("platform", &profile.platform)
                .with_metadata("username", &profile.username);
                if let Some(display_name) = &profile.display_name {
                    result = result.with_metadata("display_name", display_name);
                }
                if let Some(location) = &profile.location {
                    result = result.with_metadata("location", location);
                }
                result
            })
            .collect();

        Ok(results)
    }

    async fn validate_credentials(&self) -> ConnectorResult<bool> {
        Ok(true)
    }
}
