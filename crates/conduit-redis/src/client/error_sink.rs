use bb8_redis::bb8::ErrorSink;
use bb8_redis::redis::RedisError;
use conduit_core::context::DatasourceContext;

/// Forwards background connection errors of the pool to the context logger.
#[derive(Debug, Clone)]
pub(crate) struct ContextErrorSink {
    context: DatasourceContext,
}

impl ContextErrorSink {
    pub(crate) fn new(context: DatasourceContext) -> Self {
        Self { context }
    }
}

impl ErrorSink<RedisError> for ContextErrorSink {
    fn sink(&self, error: RedisError) {
        self.context
            .error(format!("Redis connection error: {error}"));
    }

    fn boxed_clone(&self) -> Box<dyn ErrorSink<RedisError>> {
        Box::new(self.clone())
    }
}
