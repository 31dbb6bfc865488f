// ============================================================================
// Typed Operation Registry
// ============================================================================
//
// Every backend operation the gateway can call has a statically known
// request and response shape. An `Operation` describes one of them; the
// registry maps (service, method) to a type-erased codec built from it.
//
// Unknown operations are an error, never an untyped passthrough.
//
// ============================================================================

use crate::auth::UserContext;
use crate::gateway::OperationId;
use bytes::Bytes;
use hub_error::{GatewayError, GatewayResult};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::marker::PhantomData;

/// What a builder can see of the inbound request
#[derive(Debug, Clone, Copy)]
pub struct OperationInput<'a> {
    pub body: &'a [u8],
    pub path_vars: &'a HashMap<String, String>,
    pub user: Option<&'a UserContext>,
}

impl<'a> OperationInput<'a> {
    /// Parse the JSON body; an empty body yields `T::default()`
    pub fn json_body<T: DeserializeOwned + Default>(&self) -> GatewayResult<T> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(T::default());
        }
        serde_json::from_slice(self.body)
            .map_err(|e| GatewayError::invalid_request(format!("request body is not valid JSON: {}", e)))
    }

    /// First present path variable among `names`
    pub fn path_var(&self, names: &[&str]) -> Option<&'a str> {
        names
            .iter()
            .find_map(|name| self.path_vars.get(*name))
            .map(String::as_str)
    }

    pub fn require_path_var(&self, names: &[&str]) -> GatewayResult<&'a str> {
        self.path_var(names)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| GatewayError::invalid_request(format!("missing path parameter '{}'", names[0])))
    }

    /// The authenticated user; operations acting on a user's data need one
    pub fn require_user(&self) -> GatewayResult<&'a UserContext> {
        self.user.ok_or(GatewayError::TokenMissing)
    }
}

pub trait Operation: Send + Sync + 'static {
    const SERVICE: &'static str;
    const METHOD: &'static str;

    type Request: Serialize;
    type Response: DeserializeOwned + Serialize;

    fn build_request(input: &OperationInput<'_>) -> GatewayResult<Self::Request>;

    fn id() -> OperationId {
        OperationId::new(Self::SERVICE, Self::METHOD)
    }
}

/// Type-erased view of an `Operation`
pub trait OperationCodec: Send + Sync {
    fn encode_request(&self, input: &OperationInput<'_>) -> GatewayResult<Bytes>;

    /// Decode through the typed response, then re-encode as JSON
    fn decode_response(&self, body: &[u8]) -> GatewayResult<serde_json::Value>;
}

struct TypedCodec<O>(PhantomData<fn() -> O>);

impl<O: Operation> OperationCodec for TypedCodec<O> {
    fn encode_request(&self, input: &OperationInput<'_>) -> GatewayResult<Bytes> {
        let request = O::build_request(input)?;
        Ok(Bytes::from(serde_json::to_vec(&request)?))
    }

    fn decode_response(&self, body: &[u8]) -> GatewayResult<serde_json::Value> {
        let response: O::Response = serde_json::from_slice(body).map_err(|e| {
            tracing::error!(
                operation = %O::id(),
                error = %e,
                "Backend response does not match the operation's response shape"
            );
            GatewayError::internal(format!("unexpected response from {}: {}", O::id(), e))
        })?;
        Ok(serde_json::to_value(response)?)
    }
}

#[derive(Default)]
pub struct OperationRegistry {
    codecs: HashMap<OperationId, Box<dyn OperationCodec>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<O: Operation>(&mut self) -> &mut Self {
        self.codecs
            .insert(O::id(), Box::new(TypedCodec::<O>(PhantomData)));
        self
    }

    pub fn get(&self, operation: &OperationId) -> GatewayResult<&dyn OperationCodec> {
        self.codecs
            .get(operation)
            .map(|codec| codec.as_ref())
            .ok_or_else(|| GatewayError::UnsupportedOperation {
                service: operation.service.clone(),
                operation: operation.method.clone(),
            })
    }

    pub fn contains(&self, operation: &OperationId) -> bool {
        self.codecs.contains_key(operation)
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }
}
