use crate::conversation::{Conversation, Message};
use crate::error::{CompletionError, SubmitRejected};
use crate::llm::{CompletionClient, reply_message};
use std::collections::HashSet;
use tracing::{debug, info};

/// Whether a completion request is outstanding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestState {
    #[default]
    Idle,
    Submitting,
}

/// Handle for the request started by [`ChatSession::begin`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Text to send to the endpoint (exactly what the user typed)
    pub prompt: String,
    /// Conversation generation the reply belongs to
    pub epoch: u64,
}

/// Conversation plus the busy flag that gates new submissions.
///
/// Flow per submission: `Idle -> Submitting -> Idle`, appending the user
/// message on the way in and exactly one assistant message on the way out.
#[derive(Debug, Default)]
pub struct ChatSession {
    conversation: Conversation,
    state: RequestState,
    epoch: u64,
    /// Indices of assistant messages that stand in for a failed completion
    failed: HashSet<usize>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    #[cfg(test)]
    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state == RequestState::Submitting
    }

    /// Positions of the assistant messages that report a failed completion
    pub fn failed_replies(&self) -> &HashSet<usize> {
        &self.failed
    }

    /// Accept `input`, append it as a user message and enter Submitting.
    ///
    /// Blank input and input while busy are rejected with nothing changed.
    pub fn begin(&mut self, input: &str) -> Result<Submission, SubmitRejected> {
        if input.trim().is_empty() {
            return Err(SubmitRejected::Empty);
        }
        if self.is_busy() {
            debug!("submission rejected, request already in flight");
            return Err(SubmitRejected::Busy);
        }

        self.conversation.append(Message::user(input));
        self.state = RequestState::Submitting;
        Ok(Submission {
            prompt: input.to_string(),
            epoch: self.epoch,
        })
    }

    /// Record the outcome of a submission as one assistant message and go
    /// back to Idle.
    ///
    /// An outcome whose conversation was cleared in the meantime is dropped.
    /// Returns whether the message was appended.
    pub fn finish(&mut self, epoch: u64, outcome: &Result<String, CompletionError>) -> bool {
        self.state = RequestState::Idle;
        if epoch != self.epoch {
            info!(epoch, current = self.epoch, "discarding reply for cleared conversation");
            return false;
        }
        if outcome.is_err() {
            self.failed.insert(self.conversation.len());
        }
        self.conversation.append(reply_message(outcome));
        true
    }

    /// Empty the conversation. An in-flight request keeps the session busy
    /// until its (discarded) reply arrives.
    pub fn clear(&mut self) {
        self.conversation.clear();
        self.failed.clear();
        self.epoch += 1;
    }

    /// Run a whole submission inline: begin, call the endpoint, finish.
    ///
    /// The reply is in the conversation afterwards either way; the returned
    /// outcome says whether it is model text or an error report.
    pub async fn submit(
        &mut self,
        client: &CompletionClient,
        input: &str,
    ) -> Result<Result<String, CompletionError>, SubmitRejected> {
        let submission = self.begin(input)?;
        let outcome = client.try_complete(&submission.prompt).await;
        self.finish(submission.epoch, &outcome);
        Ok(outcome)
    }
}
