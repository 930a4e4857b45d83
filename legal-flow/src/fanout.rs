use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::{
    context::Context,
    error::{GraphError, Result},
    task::{NextAction, Task, TaskResult},
};

/// Runs independent child tasks concurrently against the shared context.
///
/// Children write their outputs into the context themselves; their
/// `NextAction`s are ignored and the fan-out always continues along its own
/// outgoing edge. The first child failure fails the whole fan-out.
pub struct FanOutTask {
    id: String,
    children: Vec<Arc<dyn Task>>,
}

impl FanOutTask {
    pub fn new(id: impl Into<String>, children: Vec<Arc<dyn Task>>) -> Self {
        Self {
            id: id.into(),
            children,
        }
    }
}

#[async_trait]
impl Task for FanOutTask {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        info!(fanout = %self.id, children = self.children.len(), "Starting fan-out");

        let mut set = JoinSet::new();
        for child in &self.children {
            let child = Arc::clone(child);
            let ctx = context.clone();
            set.spawn(async move {
                let id = child.id().to_string();
                child.run(ctx).await.map_err(|e| (id, e))
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(_)) => {}
                Ok(Err((child_id, e))) => {
                    error!(fanout = %self.id, child = %child_id, error = %e, "Fan-out child failed");
                    set.abort_all();
                    return Err(e);
                }
                Err(join_err) => {
                    set.abort_all();
                    return Err(GraphError::TaskExecutionFailed(format!(
                        "fan-out child panicked or was cancelled: {join_err}"
                    )));
                }
            }
        }

        Ok(TaskResult::new(None, NextAction::Continue))
    }
}
