use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use rtvi_client_types::{ActionRequest, ActionResponse, RtviMessageInbound, RtviMessageOutbound, Value};

use crate::client::{RtviClient, WeakRtviClient};
use crate::error::{Result, RtviError};
use crate::helper::RtviClientHelper;

pub const LLM_FUNCTION_CALL: &str = "llm-function-call";
pub const LLM_FUNCTION_CALL_START: &str = "llm-function-call-start";
pub const LLM_JSON_COMPLETION: &str = "llm-json-completion";
pub const LLM_FUNCTION_CALL_RESULT: &str = "llm-function-call-result";

/// A function call requested by the LLM.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LlmFunctionCallData {
    function_name: String,
    tool_call_id: String,
    args: Value,
}

impl LlmFunctionCallData {
    pub fn new(function_name: &str, tool_call_id: &str, args: Value) -> Self {
        Self {
            function_name: function_name.to_string(),
            tool_call_id: tool_call_id.to_string(),
            args,
        }
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    pub fn tool_call_id(&self) -> &str {
        &self.tool_call_id
    }

    pub fn args(&self) -> &Value {
        &self.args
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LlmFunctionCallResult {
    function_name: String,
    tool_call_id: String,
    arguments: Value,
    result: Value,
}

impl LlmFunctionCallResult {
    fn new(call: &LlmFunctionCallData, result: Value) -> Self {
        Self {
            function_name: call.function_name.clone(),
            tool_call_id: call.tool_call_id.clone(),
            arguments: call.args.clone(),
            result,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LlmContextMessage {
    role: String,
    content: String,
}

impl LlmContextMessage {
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LlmContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    messages: Option<Vec<LlmContextMessage>>,
}

impl LlmContext {
    pub fn new(messages: Vec<LlmContextMessage>) -> Self {
        Self {
            messages: Some(messages),
        }
    }

    pub fn messages(&self) -> &[LlmContextMessage] {
        self.messages.as_deref().unwrap_or_default()
    }
}

/// Receives the LLM events handled by [`LlmHelper`].
#[async_trait]
#[allow(unused_variables)]
pub trait LlmHelperDelegate: Send + Sync {
    fn on_llm_json_completion(&self, json: &str) {}

    /// Invoked when the LLM calls a function. The returned value, if any, is
    /// sent back to the bot as the function result.
    async fn on_llm_function_call(&self, call: &LlmFunctionCallData) -> Option<Value> {
        None
    }

    fn on_llm_function_call_start(&self, function_name: &str) {}
}

/// Helper for interacting with an LLM service.
#[derive(Clone)]
pub struct LlmHelper {
    service: String,
    client: WeakRtviClient,
    delegate: Arc<RwLock<Option<Arc<dyn LlmHelperDelegate>>>>,
}

impl LlmHelper {
    pub fn set_delegate(&self, delegate: Option<Arc<dyn LlmHelperDelegate>>) {
        *self.delegate.write().unwrap_or_else(PoisonError::into_inner) = delegate;
    }

    fn delegate(&self) -> Option<Arc<dyn LlmHelperDelegate>> {
        self.delegate
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn client(&self) -> Result<RtviClient> {
        self.client
            .upgrade()
            .ok_or_else(|| RtviError::other("the client owning this helper was dropped"))
    }

    /// Returns the bot's current LLM context. The bot must be ready.
    pub async fn get_context(&self) -> Result<LlmContext> {
        self.client()?
            .action_with_result(ActionRequest::new(&self.service, "get_context"))
            .await
    }

    /// Replaces the bot's LLM context.
    pub async fn set_context(&self, context: LlmContext, interrupt: bool) -> Result<ActionResponse> {
        let request = ActionRequest::new(&self.service, "set_context")
            .with_argument("messages", Value::from_serializable(context.messages())?)
            .with_argument("interrupt", Value::Boolean(interrupt));
        self.client()?.action(request).await
    }

    /// Appends a message to the bot's LLM context.
    pub async fn append_to_messages(
        &self,
        message: LlmContextMessage,
        run_immediately: bool,
    ) -> Result<ActionResponse> {
        let request = ActionRequest::new(&self.service, "append_to_messages")
            .with_argument("messages", Value::from_serializable(&[message])?)
            .with_argument("run_immediately", Value::Boolean(run_immediately));
        self.client()?.action(request).await
    }

    /// Runs the bot's current LLM context, useful after appending messages
    /// without `run_immediately`.
    pub async fn run(&self, interrupt: bool) -> Result<ActionResponse> {
        let request = ActionRequest::new(&self.service, "run")
            .with_argument("interrupt", Value::Boolean(interrupt));
        self.client()?.action(request).await
    }

    callback_variants! {
        fn get_context_with_callback => get_context() -> LlmContext;
        fn set_context_with_callback => set_context(context: LlmContext, interrupt: bool) -> ActionResponse;
        fn append_to_messages_with_callback => append_to_messages(message: LlmContextMessage, run_immediately: bool) -> ActionResponse;
        fn run_with_callback => run(interrupt: bool) -> ActionResponse;
    }

    fn handle_function_call(&self, call: LlmFunctionCallData) {
        let Some(delegate) = self.delegate() else {
            return;
        };
        let client = self.client.clone();
        tokio::spawn(async move {
            let Some(result) = delegate.on_llm_function_call(&call).await else {
                return;
            };
            let Some(client) = client.upgrade() else {
                return;
            };
            let message = Value::from_serializable(&LlmFunctionCallResult::new(&call, result))
                .map(|data| RtviMessageOutbound::new(LLM_FUNCTION_CALL_RESULT, Some(data)));
            match message {
                Ok(message) => {
                    if let Err(e) = client.send_message(&message) {
                        tracing::error!("failed to send function call result: {}", e);
                    }
                }
                Err(e) => tracing::error!("failed to encode function call result: {}", e),
            }
        });
    }
}

impl RtviClientHelper for LlmHelper {
    fn new(service: &str, client: WeakRtviClient) -> Self {
        Self {
            service: service.to_string(),
            client,
            delegate: Arc::new(RwLock::new(None)),
        }
    }

    fn handle_message(&self, message: &RtviMessageInbound) {
        let Some(message_type) = message.message_type() else {
            return;
        };
        tracing::debug!("llm helper received message: {}", message_type);

        match message_type {
            LLM_JSON_COMPLETION => {
                if let (Some(data), Some(delegate)) = (message.data(), self.delegate()) {
                    delegate.on_llm_json_completion(data);
                }
            }
            LLM_FUNCTION_CALL_START => {
                if let (Ok(call), Some(delegate)) =
                    (message.decode_data::<LlmFunctionCallData>(), self.delegate())
                {
                    delegate.on_llm_function_call_start(call.function_name());
                }
            }
            LLM_FUNCTION_CALL => match message.decode_data::<LlmFunctionCallData>() {
                Ok(call) => self.handle_function_call(call),
                Err(e) => tracing::error!("failed to decode function call: {}", e),
            },
            _ => {}
        }
    }

    fn message_types(&self) -> HashSet<String> {
        [LLM_FUNCTION_CALL, LLM_FUNCTION_CALL_START, LLM_JSON_COMPLETION]
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeTransport, wait_for};
    use crate::client::RtviClientOptions;
    use rtvi_client_types::TransportState;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Calculator {
        started: Mutex<Vec<String>>,
        completions: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmHelperDelegate for Calculator {
        fn on_llm_json_completion(&self, json: &str) {
            self.completions.lock().unwrap().push(json.to_string());
        }

        async fn on_llm_function_call(&self, call: &LlmFunctionCallData) -> Option<Value> {
            let a = call.args().get("a")?.as_f64()?;
            let b = call.args().get("b")?.as_f64()?;
            Some(Value::from(a + b))
        }

        fn on_llm_function_call_start(&self, function_name: &str) {
            self.started.lock().unwrap().push(function_name.to_string());
        }
    }

    async fn ready_client() -> (RtviClient, Arc<FakeTransport>) {
        let transport = Arc::new(FakeTransport::new());
        let client = RtviClient::new(transport.clone(), RtviClientOptions::builder().build());
        client.start().await.unwrap();
        transport.deliver(RtviMessageInbound::new("bot-ready", Some(r#"{"version":"0.2.0"}"#.to_string())));
        assert_eq!(client.state(), TransportState::Ready);
        (client, transport)
    }

    #[tokio::test]
    async fn test_function_call_result_is_sent_back() {
        let (client, transport) = ready_client().await;
        let llm = client.register_helper::<LlmHelper>("llm").unwrap();
        let calculator = Arc::new(Calculator::default());
        llm.set_delegate(Some(calculator.clone()));

        let call = r#"{"function_name":"add","tool_call_id":"call-1","args":{"a":1,"b":2}}"#;
        transport.deliver(RtviMessageInbound::new(LLM_FUNCTION_CALL_START, Some(call.to_string())));
        transport.deliver(RtviMessageInbound::new(LLM_FUNCTION_CALL, Some(call.to_string())));
        assert_eq!(*calculator.started.lock().unwrap(), vec!["add".to_string()]);

        wait_for(|| transport.sent_of_type(LLM_FUNCTION_CALL_RESULT).len() == 1).await;
        let sent = transport.sent_of_type(LLM_FUNCTION_CALL_RESULT);
        let json = serde_json::to_value(&sent[0]).unwrap();
        assert_eq!(json["data"]["function_name"], "add");
        assert_eq!(json["data"]["tool_call_id"], "call-1");
        assert_eq!(json["data"]["arguments"]["a"], 1.0);
        assert_eq!(json["data"]["result"], 3.0);
    }

    #[tokio::test]
    async fn test_json_completion_is_forwarded_raw() {
        let (client, transport) = ready_client().await;
        let llm = client.register_helper::<LlmHelper>("llm").unwrap();
        let calculator = Arc::new(Calculator::default());
        llm.set_delegate(Some(calculator.clone()));

        transport.deliver(RtviMessageInbound::new(
            LLM_JSON_COMPLETION,
            Some(r#"{"answer":42}"#.to_string()),
        ));
        assert_eq!(
            *calculator.completions.lock().unwrap(),
            vec![r#"{"answer":42}"#.to_string()]
        );
    }

    #[tokio::test]
    async fn test_actions_target_the_helper_service() {
        let (client, transport) = ready_client().await;
        transport.respond_with(|message| {
            (message.message_type() == "action").then(|| {
                RtviMessageInbound::with_id(
                    Some(message.id()),
                    "action-response",
                    Some(r#"{"result":{"messages":[{"role":"user","content":"hi"}]}}"#.to_string()),
                )
            })
        });
        let llm = client.register_helper::<LlmHelper>("llm").unwrap();

        let context = llm.get_context().await.unwrap();
        assert_eq!(context.messages(), &[LlmContextMessage::new("user", "hi")]);

        llm.append_to_messages(LlmContextMessage::new("user", "more"), true)
            .await
            .unwrap();

        let actions = transport.sent_of_type("action");
        let json = serde_json::to_value(&actions[1]).unwrap();
        assert_eq!(json["data"]["service"], "llm");
        assert_eq!(json["data"]["action"], "append_to_messages");
        assert_eq!(json["data"]["arguments"][0]["value"][0]["content"], "more");
        assert_eq!(json["data"]["arguments"][1]["name"], "run_immediately");
    }
}
