use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::JsonRpcErrorObject;
use crate::notification::JsonRpcNotification;
use crate::request::JsonRpcRequest;
use crate::response::ResponseResult;

/// Implemented by anything that can answer a single JSON-RPC method call.
/// `Ctx` is left generic rather than fixed to a concrete session type: the
/// gateway's own `RequestContext` (in `gateway-context`) fills this slot,
/// keeping this crate free of any dependency on the rest of the workspace.
#[async_trait]
pub trait JsonRpcHandler<Ctx>: Send + Sync {
    async fn handle(
        &self,
        ctx: &Ctx,
        request: &JsonRpcRequest,
    ) -> Result<ResponseResult, JsonRpcErrorObject>;

    /// Notifications are routed here instead when the method has no `id`.
    /// Default is a silent no-op, matching most handlers' needs.
    async fn handle_notification(&self, _ctx: &Ctx, _notification: &JsonRpcNotification) {}
}

/// Adapts a plain async closure into a `JsonRpcHandler`, for methods that
/// don't need a dedicated type.
pub struct FunctionHandler<F> {
    func: F,
}

impl<F> FunctionHandler<F> {
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<Ctx, F, Fut> JsonRpcHandler<Ctx> for FunctionHandler<F>
where
    Ctx: Send + Sync,
    F: Fn(&Ctx, &JsonRpcRequest) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<ResponseResult, JsonRpcErrorObject>> + Send,
{
    async fn handle(
        &self,
        ctx: &Ctx,
        request: &JsonRpcRequest,
    ) -> Result<ResponseResult, JsonRpcErrorObject> {
        (self.func)(ctx, request).await
    }
}

/// Method-name keyed registry of handlers, with an optional default handler
/// for methods not explicitly registered (used by adapter fan-out: an
/// unmatched method falls through to the router's "no such tool" mapping).
pub struct JsonRpcDispatcher<Ctx> {
    handlers: HashMap<String, Arc<dyn JsonRpcHandler<Ctx>>>,
    default_handler: Option<Arc<dyn JsonRpcHandler<Ctx>>>,
}

impl<Ctx> Default for JsonRpcDispatcher<Ctx> {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
            default_handler: None,
        }
    }
}

impl<Ctx> JsonRpcDispatcher<Ctx> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_method(&mut self, method: impl Into<String>, handler: Arc<dyn JsonRpcHandler<Ctx>>) {
        self.handlers.insert(method.into(), handler);
    }

    pub fn register_methods(&mut self, methods: impl IntoIterator<Item = (String, Arc<dyn JsonRpcHandler<Ctx>>)>) {
        for (method, handler) in methods {
            self.handlers.insert(method, handler);
        }
    }

    pub fn set_default_handler(&mut self, handler: Arc<dyn JsonRpcHandler<Ctx>>) {
        self.default_handler = Some(handler);
    }

    pub fn supported_methods(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }

    fn resolve(&self, method: &str) -> Option<&Arc<dyn JsonRpcHandler<Ctx>>> {
        self.handlers.get(method).or(self.default_handler.as_ref())
    }

    pub async fn handle_request(
        &self,
        ctx: &Ctx,
        request: &JsonRpcRequest,
    ) -> Result<ResponseResult, JsonRpcErrorObject> {
        match self.resolve(&request.method) {
            Some(handler) => handler.handle(ctx, request).await,
            None => Err(JsonRpcErrorObject::method_not_found(&request.method)),
        }
    }

    pub async fn handle_notification(&self, ctx: &Ctx, notification: &JsonRpcNotification) {
        if let Some(handler) = self.resolve(&notification.method) {
            handler.handle_notification(ctx, notification).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RequestId;
    use serde_json::json;

    struct EchoHandler;

    #[async_trait]
    impl JsonRpcHandler<()> for EchoHandler {
        async fn handle(
            &self,
            _ctx: &(),
            request: &JsonRpcRequest,
        ) -> Result<ResponseResult, JsonRpcErrorObject> {
            Ok(ResponseResult::Value(json!({ "echo": request.method })))
        }
    }

    #[tokio::test]
    async fn dispatches_to_registered_method() {
        let mut dispatcher: JsonRpcDispatcher<()> = JsonRpcDispatcher::new();
        dispatcher.register_method("ping", Arc::new(EchoHandler));

        let request = JsonRpcRequest::new(RequestId::Number(1), "ping".to_string(), None);
        let result = dispatcher.handle_request(&(), &request).await.unwrap();
        assert_eq!(result.into_value(), json!({ "echo": "ping" }));
    }

    #[tokio::test]
    async fn unregistered_method_without_default_is_method_not_found() {
        let dispatcher: JsonRpcDispatcher<()> = JsonRpcDispatcher::new();
        let request = JsonRpcRequest::new(RequestId::Number(1), "nope".to_string(), None);
        let err = dispatcher.handle_request(&(), &request).await.unwrap_err();
        assert_eq!(err.code, -32601);
    }
}
