#[cfg(test)]
mod tests;

use anyhow::{Context, Result, anyhow};
use aws_credential_types::Credentials;
use aws_sigv4::http_request::{SignableBody, SignableRequest, SigningParams, SigningSettings, sign};
use aws_sigv4::sign::v4;
use aws_smithy_runtime_api::client::identity::Identity;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};
use url::Url;

use super::{Embedder, check_dimension};
use crate::config::EmbeddingConfig;

/// SigV4 service name of the Bedrock runtime
const SIGNING_NAME: &str = "bedrock";

/// Client for the Bedrock runtime `InvokeModel` API, speaking the Titan Text
/// Embeddings v2 request format.
///
/// Requests carry the API key as a bearer token when one is configured,
/// otherwise they are SigV4-signed with the static AWS credentials.
#[derive(Debug, Clone)]
pub struct BedrockClient {
    endpoint: Url,
    region: String,
    model: String,
    dimension: usize,
    api_key: Option<String>,
    credentials: Option<Credentials>,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TitanRequest<'a> {
    input_text: &'a str,
    dimensions: usize,
    normalize: bool,
    embedding_types: [&'static str; 1],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TitanResponse {
    embedding: Option<Vec<f32>>,
    embeddings_by_type: Option<EmbeddingsByType>,
    input_text_token_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsByType {
    float: Option<Vec<f32>>,
}

impl BedrockClient {
    #[inline]
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let endpoint = config
            .bedrock_endpoint()
            .context("Failed to build Bedrock endpoint from config")?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .build()
            .into();

        let credentials = config.aws_credentials.as_ref().map(|c| {
            Credentials::new(
                &c.access_key_id,
                &c.secret_access_key,
                c.session_token.clone(),
                None,
                "environment",
            )
        });
        if config.api_key.is_none() && credentials.is_none() {
            warn!("No Bedrock API key or AWS credentials configured; requests will be unsigned");
        }

        Ok(Self {
            endpoint,
            region: config.region.clone(),
            model: config.model_id().to_string(),
            dimension: config.dimension as usize,
            api_key: config.api_key.clone(),
            credentials,
            agent,
        })
    }

    /// Headers that SigV4-sign a POST of `body` to `url`
    fn sigv4_headers(
        &self,
        credentials: &Credentials,
        url: &Url,
        body: &str,
    ) -> Result<Vec<(String, String)>> {
        let identity: Identity = credentials.clone().into();
        let params: SigningParams<'_> = v4::SigningParams::builder()
            .identity(&identity)
            .region(&self.region)
            .name(SIGNING_NAME)
            .time(SystemTime::now())
            .settings(SigningSettings::default())
            .build()
            .context("Failed to build SigV4 parameters")?
            .into();

        let signable = SignableRequest::new(
            "POST",
            url.as_str(),
            [
                ("content-type", "application/json"),
                ("accept", "application/json"),
            ]
            .into_iter(),
            SignableBody::Bytes(body.as_bytes()),
        )
        .context("Failed to prepare request for signing")?;

        let (instructions, _signature) = sign(signable, &params)
            .context("Failed to sign Bedrock request")?
            .into_parts();

        Ok(instructions
            .headers()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect())
    }

    fn invoke_url(&self) -> Result<Url> {
        // Model ids carry a version suffix after ':', sent encoded like the AWS SDKs do
        self.endpoint
            .join(&format!("/model/{}/invoke", self.model.replace(':', "%3A")))
            .context("Failed to build Bedrock invoke URL")
    }
}

impl Embedder for BedrockClient {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!("Generating Titan embedding for text (length: {})", text.len());

        let request = TitanRequest {
            input_text: text,
            dimensions: self.dimension,
            normalize: true,
            embedding_types: ["float"],
        };
        let request_json =
            serde_json::to_string(&request).context("Failed to serialize Titan request")?;

        let url = self.invoke_url()?;

        let mut builder = self
            .agent
            .post(url.as_str())
            .header("Content-Type", "application/json")
            .header("Accept", "application/json");
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        } else if let Some(credentials) = &self.credentials {
            for (name, value) in self.sigv4_headers(credentials, &url, &request_json)? {
                builder = builder.header(name, value);
            }
        }

        let response_text = match builder
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())
        {
            Ok(text) => text,
            Err(ureq::Error::StatusCode(status)) => {
                warn!("Bedrock returned HTTP {} for model {}", status, self.model);
                return Err(anyhow!(
                    "Bedrock rejected the request for model {}: HTTP {}",
                    self.model,
                    status
                ));
            }
            Err(e) => {
                warn!("Bedrock request to {} failed: {}", url, e);
                return Err(anyhow!("Bedrock request failed: {}", e));
            }
        };

        let response: TitanResponse =
            serde_json::from_str(&response_text).context("Failed to parse Titan response")?;

        let embedding = response
            .embeddings_by_type
            .and_then(|by_type| by_type.float)
            .or(response.embedding)
            .ok_or_else(|| anyhow!("Titan response contained no float embedding"))?;

        check_dimension(&embedding, self.dimension)?;

        debug!(
            "Generated embedding with {} dimensions from {:?} input tokens",
            embedding.len(),
            response.input_text_token_count
        );

        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
