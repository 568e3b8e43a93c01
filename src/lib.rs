#[macro_use]
mod callback;

mod client;
mod delegate;
mod dispatcher;
mod error;
mod helper;
mod http;
mod promise;
mod state;
mod transport;

#[cfg(test)]
mod testing;

pub use rtvi_client_types as types;

pub use client::{ConfigError, Endpoints, RtviClient, RtviClientOptions, RtviClientOptionsBuilder, WeakRtviClient};
pub use delegate::{DelegateHandle, RtviClientDelegate};
pub use dispatcher::MessageDispatcher;
pub use error::{BoxError, Result, RtviError};
pub use helper::llm::{
    LlmContext, LlmContextMessage, LlmFunctionCallData, LlmFunctionCallResult, LlmHelper,
    LlmHelperDelegate,
};
pub use helper::{HelperRegistry, RtviClientHelper};
pub use http::{EventStreamParser, HttpMessageDispatcher, fetch_auth_bundle};
pub use promise::{Pending, Promise};
pub use state::StateCell;
pub use transport::websocket::WebSocketTransport;
pub use transport::{AuthBundle, MessageHandler, Transport, TransportContext};
