//! Scripted `RemoteCall` stub shared by the unit tests.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use shared::{error::TransportError, protocol::Value};
use tokio::sync::Mutex;

use crate::RemoteCall;

type MakeError = Arc<dyn Fn() -> TransportError + Send + Sync>;

#[derive(Clone)]
enum Reply {
    Value(Value),
    Fail(MakeError),
}

pub(crate) struct ScriptedRemote {
    endpoint: Option<String>,
    replies: HashMap<String, Reply>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<String>>,
    log: Mutex<Vec<String>>,
}

fn call_key(method: &str, args: &[Value]) -> String {
    let args: Vec<String> = args.iter().map(ToString::to_string).collect();
    format!("{method}({})", args.join(","))
}

fn script_key(method: &str, args: &[&str]) -> String {
    format!("{method}({})", args.join(","))
}

fn wildcard_key(method: &str) -> String {
    format!("{method}(*)")
}

impl ScriptedRemote {
    pub(crate) fn new() -> Self {
        Self::with_endpoint(Some("http://stub.test:8000/clicker"))
    }

    pub(crate) fn unconfigured() -> Self {
        Self::with_endpoint(Some(""))
    }

    fn with_endpoint(endpoint: Option<&str>) -> Self {
        Self {
            endpoint: endpoint.map(str::to_string),
            replies: HashMap::new(),
            delays: HashMap::new(),
            calls: Mutex::new(Vec::new()),
            log: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn reply(mut self, method: &str, args: &[&str], value: impl Into<Value>) -> Self {
        self.replies
            .insert(script_key(method, args), Reply::Value(value.into()));
        self
    }

    pub(crate) fn reply_any(mut self, method: &str, value: impl Into<Value>) -> Self {
        self.replies
            .insert(wildcard_key(method), Reply::Value(value.into()));
        self
    }

    pub(crate) fn fail(
        mut self,
        method: &str,
        args: &[&str],
        make: impl Fn() -> TransportError + Send + Sync + 'static,
    ) -> Self {
        self.replies
            .insert(script_key(method, args), Reply::Fail(Arc::new(make)));
        self
    }

    pub(crate) fn fail_any(
        mut self,
        method: &str,
        make: impl Fn() -> TransportError + Send + Sync + 'static,
    ) -> Self {
        self.replies
            .insert(wildcard_key(method), Reply::Fail(Arc::new(make)));
        self
    }

    pub(crate) fn delay(mut self, method: &str, args: &[&str], delay: Duration) -> Self {
        self.delays.insert(script_key(method, args), delay);
        self
    }

    /// Calls in the order they were issued, as `method(arg,..)`.
    pub(crate) async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    pub(crate) async fn count(&self, method: &str) -> usize {
        let prefix = format!("{method}(");
        self.calls
            .lock()
            .await
            .iter()
            .filter(|call| call.starts_with(&prefix))
            .count()
    }

    /// Start (`>`) and finish (`<`) markers for every call.
    pub(crate) async fn log(&self) -> Vec<String> {
        self.log.lock().await.clone()
    }
}

#[async_trait]
impl RemoteCall for ScriptedRemote {
    fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, TransportError> {
        let key = call_key(method, &args);
        self.calls.lock().await.push(key.clone());
        self.log.lock().await.push(format!("> {key}"));

        if let Some(delay) = self.delays.get(&key) {
            tokio::time::sleep(*delay).await;
        }

        let reply = self
            .replies
            .get(&key)
            .or_else(|| self.replies.get(&wildcard_key(method)))
            .cloned();
        self.log.lock().await.push(format!("< {key}"));

        match reply {
            Some(Reply::Value(value)) => Ok(value),
            Some(Reply::Fail(make)) => Err(make()),
            None => Err(TransportError::Other(format!("unscripted call {key}"))),
        }
    }
}
