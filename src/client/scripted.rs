use std::collections::VecDeque;

use parking_lot::Mutex;
use thiserror::Error;

use super::{ClientError, GraphClient, Parameters, Record, SummarizedResult};

/// Statement observed by a [`ScriptedClient`].
#[derive(Clone, Debug, PartialEq)]
pub struct ExecutedStatement {
    /// Rendered statement text.
    pub statement: String,
    /// Parameters sent alongside the text.
    pub parameters: Parameters,
}

/// Failure replayed by a [`ScriptedClient`].
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ScriptedFailure(pub String);

enum Reply {
    Records(Vec<Record>),
    Failure(String),
}

/// In-memory client that replays queued replies and records every statement.
///
/// Replies are consumed in order; once the queue is empty every statement
/// yields an empty result.
#[derive(Default)]
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Reply>>,
    executed: Mutex<Vec<ExecutedStatement>>,
}

impl ScriptedClient {
    /// Creates a client with no queued replies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the records returned by the next statement.
    pub fn respond(&self, records: Vec<Record>) -> &Self {
        self.replies.lock().push_back(Reply::Records(records));
        self
    }

    /// Queues a failure for the next statement.
    pub fn fail(&self, message: impl Into<String>) -> &Self {
        self.replies.lock().push_back(Reply::Failure(message.into()));
        self
    }

    /// Every statement run so far, oldest first.
    pub fn executed(&self) -> Vec<ExecutedStatement> {
        self.executed.lock().clone()
    }

    /// The most recent statement.
    pub fn last(&self) -> Option<ExecutedStatement> {
        self.executed.lock().last().cloned()
    }

    /// Number of queued replies not consumed yet.
    pub fn pending(&self) -> usize {
        self.replies.lock().len()
    }
}

impl GraphClient for ScriptedClient {
    fn run(
        &self,
        statement: &str,
        parameters: &Parameters,
    ) -> std::result::Result<SummarizedResult, ClientError> {
        self.executed.lock().push(ExecutedStatement {
            statement: statement.to_owned(),
            parameters: parameters.clone(),
        });
        match self.replies.lock().pop_front() {
            Some(Reply::Records(records)) => Ok(SummarizedResult::new(records)),
            Some(Reply::Failure(message)) => Err(Box::new(ScriptedFailure(message))),
            None => Ok(SummarizedResult::default()),
        }
    }
}
