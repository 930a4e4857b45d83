use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::{
    context::Context,
    error::{GraphError, Result},
    task::{NextAction, Task},
};

/// Type alias for edge condition functions
pub type EdgeCondition = Arc<dyn Fn(&Context) -> bool + Send + Sync>;

/// Upper bound on executed tasks per run unless overridden
pub const DEFAULT_MAX_STEPS: usize = 64;

/// Edge between tasks in the graph
#[derive(Clone)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub condition: Option<EdgeCondition>,
}

/// An immutable graph of tasks, built with [`GraphBuilder`]
pub struct Graph {
    pub id: String,
    tasks: HashMap<String, Arc<dyn Task>>,
    edges: Vec<Edge>,
    start_task_id: Option<String>,
    max_steps: usize,
}

impl Graph {
    /// Run the graph from its start task until a task returns `End` or no
    /// outgoing edge matches.
    pub async fn execute(&self, context: Context) -> Result<ExecutionResult> {
        let start = self.start_task_id.clone().ok_or(GraphError::EmptyGraph)?;
        self.execute_from(&start, context).await
    }

    /// Run the graph starting from a specific task
    pub async fn execute_from(&self, task_id: &str, context: Context) -> Result<ExecutionResult> {
        let mut current = task_id.to_string();
        let mut steps = Vec::new();
        let mut response = None;

        loop {
            if steps.len() >= self.max_steps {
                return Err(GraphError::StepLimitExceeded(self.max_steps));
            }

            let task = self
                .get_task(&current)
                .ok_or_else(|| GraphError::TaskNotFound(current.clone()))?;

            let started = Instant::now();
            debug!(graph = %self.id, task_id = %current, "Running task");
            let mut result = task.run(context.clone()).await?;
            result.task_id = current.clone();
            info!(
                graph = %self.id,
                task_id = %current,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Task finished"
            );

            steps.push(current.clone());
            if result.response.is_some() {
                response = result.response.clone();
            }

            match result.next_action {
                NextAction::End => break,
                NextAction::GoTo(target) => {
                    if !self.tasks.contains_key(&target) {
                        return Err(GraphError::TaskNotFound(target));
                    }
                    current = target;
                }
                NextAction::Continue => match self.find_next_task(&current, &context) {
                    Some(next) => current = next,
                    None => break,
                },
            }
        }

        Ok(ExecutionResult {
            response,
            steps,
        })
    }

    /// Find the next task based on edges and conditions.
    ///
    /// Edges are checked in insertion order; the first unconditional edge or
    /// conditional edge whose predicate holds wins.
    pub fn find_next_task(&self, current_task_id: &str, context: &Context) -> Option<String> {
        self.edges
            .iter()
            .filter(|edge| edge.from == current_task_id)
            .find(|edge| match &edge.condition {
                Some(condition) => condition(context),
                None => true,
            })
            .map(|edge| edge.to.clone())
    }

    pub fn start_task_id(&self) -> Option<&str> {
        self.start_task_id.as_deref()
    }

    pub fn get_task(&self, task_id: &str) -> Option<Arc<dyn Task>> {
        self.tasks.get(task_id).cloned()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }
}

/// Builder for creating graphs
pub struct GraphBuilder {
    id: String,
    tasks: HashMap<String, Arc<dyn Task>>,
    edges: Vec<Edge>,
    start_task_id: Option<String>,
    max_steps: usize,
}

impl GraphBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tasks: HashMap::new(),
            edges: Vec::new(),
            start_task_id: None,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    /// Add a task. The first task added becomes the start task.
    pub fn add_task(mut self, task: Arc<dyn Task>) -> Self {
        let task_id = task.id().to_string();
        if self.start_task_id.is_none() {
            self.start_task_id = Some(task_id.clone());
        }
        self.tasks.insert(task_id, task);
        self
    }

    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push(Edge {
            from: from.into(),
            to: to.into(),
            condition: None,
        });
        self
    }

    pub fn add_conditional_edge<F>(
        mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        condition: F,
    ) -> Self
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        self.edges.push(Edge {
            from: from.into(),
            to: to.into(),
            condition: Some(Arc::new(condition)),
        });
        self
    }

    /// Chain tasks in order with unconditional edges
    pub fn add_sequence(mut self, task_ids: &[&str]) -> Self {
        for pair in task_ids.windows(2) {
            self = self.add_edge(pair[0], pair[1]);
        }
        self
    }

    /// Ignored when the task id is unknown
    pub fn set_start_task(mut self, task_id: impl Into<String>) -> Self {
        let task_id = task_id.into();
        if self.tasks.contains_key(&task_id) {
            self.start_task_id = Some(task_id);
        }
        self
    }

    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn build(self) -> Graph {
        Graph {
            id: self.id,
            tasks: self.tasks,
            edges: self.edges,
            start_task_id: self.start_task_id,
            max_steps: self.max_steps,
        }
    }
}

/// Outcome of a full graph run
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Last response produced by any task
    pub response: Option<String>,
    /// Ids of the tasks that ran, in order
    pub steps: Vec<String>,
}
