//! Bridge between a POST route and a JSON-RPC processor.

use crate::context::APPLICATION_JSON_UTF_8;
use crate::error::BoxError;
use crate::handler::RequestHandler;
use crate::RequestContext;
use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;
use tracing::debug;

/// Decodes a JSON-RPC request body, runs the method and encodes the reply
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RpcProcessor: Send + Sync {
    async fn process(&self, body: Bytes) -> Result<Bytes, BoxError>;
}

#[derive(Debug)]
pub(crate) struct JsonRpcHandler<P> {
    processor: P,
}

impl<P> JsonRpcHandler<P> {
    pub(crate) fn new(processor: P) -> Self {
        Self { processor }
    }
}

#[async_trait]
impl<P: RpcProcessor> RequestHandler for JsonRpcHandler<P> {
    async fn invoke(&self, ctx: &mut RequestContext) {
        match self.processor.process(ctx.body().clone()).await {
            Ok(reply) => {
                ctx.set_content_type(APPLICATION_JSON_UTF_8);
                ctx.write_header(StatusCode::OK);
                ctx.write(&reply);
            }
            Err(e) => {
                debug!(cause = %e, "json-rpc request rejected");
                ctx.standard_error(StatusCode::BAD_REQUEST);
            }
        }
    }
}
