use base64::{Engine as _, engine::general_purpose};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Response};
use rtvi_client_types::{ErrorResponse, InboundMessageType, RtviMessageInbound, RtviMessageOutbound, Value};
use secrecy::{ExposeSecret, SecretString};

use crate::client::consts::{CACHE_CONTROL_HEADER, CONNECTION_HEADER, EVENT_STREAM_CONTENT_TYPE};
use crate::client::utils;
use crate::client::RtviClientOptions;
use crate::error::{Result, RtviError};
use crate::transport::{AuthBundle, MessageHandler};

fn with_headers(mut request: RequestBuilder, headers: &[(String, SecretString)]) -> RequestBuilder {
    for (name, value) in headers {
        request = request.header(name.as_str(), value.expose_secret());
    }
    request
}

/// Performs the authentication handshake against the connect endpoint.
///
/// The response body, whatever its content, becomes the auth bundle.
pub async fn fetch_auth_bundle(
    client: &Client,
    base_url: &str,
    options: &RtviClientOptions,
    request_data: &Value,
) -> Result<AuthBundle> {
    let url = utils::endpoint_url(base_url, options.endpoints().connect());
    let body = utils::connect_body(request_data, options.services(), options.config())?;
    tracing::debug!("will request bundle: {}", serde_json::to_string(&body)?);

    let request = with_headers(client.post(&url), options.headers()).json(&body);
    let response = request
        .send()
        .await
        .map_err(|e| RtviError::http("Failed while authenticating.", e))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| RtviError::http("Failed while authenticating.", e))?;

    if !status.is_success() {
        let message = format!("Failed while authenticating: {}", text);
        tracing::error!("{} (status {})", message, status.as_u16());
        return Err(RtviError::Http {
            message,
            source: None,
        });
    }
    Ok(AuthBundle::new(text))
}

/// Sends messages to the bot over plain HTTP when no transport connection exists.
///
/// Responses are delivered through the same handler the transport uses.
pub struct HttpMessageDispatcher {
    client: Client,
    action_url: String,
    headers: Vec<(String, SecretString)>,
    request_data: Value,
    on_message: MessageHandler,
}

impl HttpMessageDispatcher {
    pub fn new(
        client: Client,
        base_url: &str,
        options: &RtviClientOptions,
        request_data: Value,
        on_message: MessageHandler,
    ) -> Self {
        Self {
            client,
            action_url: utils::endpoint_url(base_url, options.endpoints().action()),
            headers: options.headers().to_vec(),
            request_data,
            on_message,
        }
    }

    /// Posts `message` to the action endpoint.
    ///
    /// Only building the request can fail here; the request itself runs on a
    /// spawned task and reports failures as `error-response` messages.
    pub fn send_message(&self, message: &RtviMessageOutbound) -> Result<()> {
        let body = utils::action_body(&self.request_data, message)?;
        tracing::info!("will request action: {}", self.action_url);

        let request = with_headers(
            self.client
                .post(&self.action_url)
                .header(CACHE_CONTROL_HEADER, "no-cache")
                .header(CONNECTION_HEADER, "keep-alive"),
            &self.headers,
        )
        .json(&body);

        let message_id = message.id().to_string();
        let on_message = self.on_message.clone();
        tokio::spawn(async move {
            if let Err(e) = perform(request, &message_id, &on_message).await {
                tracing::error!("failed to complete action request: {}", e);
                on_message(error_response(&message_id, &e.detailed_message()));
            }
        });
        Ok(())
    }
}

fn error_response(message_id: &str, error: &str) -> RtviMessageInbound {
    // serializing a single string field cannot fail
    let data = serde_json::to_string(&ErrorResponse::new(error)).ok();
    RtviMessageInbound::with_id(Some(message_id), InboundMessageType::ERROR_RESPONSE, data)
}

async fn perform(request: RequestBuilder, message_id: &str, on_message: &MessageHandler) -> Result<()> {
    let response = request
        .send()
        .await
        .map_err(|e| RtviError::http("Failed to send action request.", e))?;

    let status = response.status();
    if !status.is_success() {
        tracing::error!("failed with status code: {}", status.as_u16());
        let error = format!("Request failed with status code {}", status.as_u16());
        on_message(error_response(message_id, &error));
        return Ok(());
    }

    let is_event_stream = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains(EVENT_STREAM_CONTENT_TYPE))
        .unwrap_or(false);
    tracing::debug!("is event stream: {}", is_event_stream);

    if is_event_stream {
        read_event_stream(response, on_message).await
    } else {
        let body = response
            .bytes()
            .await
            .map_err(|e| RtviError::http("Failed to read action response.", e))?;
        match serde_json::from_slice::<RtviMessageInbound>(&body) {
            Ok(message) => on_message(message),
            Err(e) => tracing::error!("failed to parse regular JSON: {}", e),
        }
        Ok(())
    }
}

async fn read_event_stream(mut response: Response, on_message: &MessageHandler) -> Result<()> {
    let mut parser = EventStreamParser::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| RtviError::http("Failed to read action stream.", e))?
    {
        for message in parser.push(&chunk) {
            on_message(message);
        }
    }
    tracing::debug!("stream task completed successfully");
    Ok(())
}

/// Incremental parser for streamed action responses.
///
/// Events are separated by a blank line. The text after the first `:` of
/// every line is concatenated, base64 decoded and parsed as one inbound
/// message. Events that do not decode are skipped.
#[derive(Debug, Default)]
pub struct EventStreamParser {
    buffer: Vec<u8>,
}

impl EventStreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk of the body and returns every message it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<RtviMessageInbound> {
        self.buffer.extend_from_slice(chunk);

        let mut messages = Vec::new();
        while let Some(end) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let event: Vec<u8> = self.buffer.drain(..end + 2).take(end).collect();
            if let Some(message) = Self::parse_event(&String::from_utf8_lossy(&event)) {
                messages.push(message);
            }
        }
        messages
    }

    fn parse_event(event: &str) -> Option<RtviMessageInbound> {
        let encoded: String = event
            .lines()
            .filter_map(|line| line.split_once(':'))
            .map(|(_, value)| value.trim())
            .collect();

        let decoded = general_purpose::STANDARD.decode(encoded.as_bytes()).ok()?;
        match serde_json::from_slice::<RtviMessageInbound>(&decoded) {
            Ok(message) => {
                tracing::debug!("received stream message: {:?}", message.message_type());
                Some(message)
            }
            Err(e) => {
                tracing::error!("failed to parse JSON: {}", e);
                None
            }
        }
    }
}
