//! Downstream receivers of applied operation batches.

use std::sync::mpsc::Sender;

use crate::chunk::AssistantStreamChunk;
use crate::operation::Operation;

/// Receives every batch a [`StateStore`](crate::StateStore) applies, in
/// apply order, exactly once. Forwarding is fire-and-forget: a sink cannot
/// reject or delay a batch.
pub trait OperationSink: Send {
    fn forward(&mut self, operations: &[Operation]);
}

impl<F> OperationSink for F
where
    F: FnMut(&[Operation]) + Send,
{
    fn forward(&mut self, operations: &[Operation]) {
        self(operations)
    }
}

/// Wraps each batch into one `update-state` chunk and sends it over a channel.
#[derive(Debug, Clone)]
pub struct ChunkSender {
    tx: Sender<AssistantStreamChunk>,
}

impl ChunkSender {
    pub fn new(tx: Sender<AssistantStreamChunk>) -> Self {
        Self { tx }
    }
}

impl OperationSink for ChunkSender {
    fn forward(&mut self, operations: &[Operation]) {
        let chunk = AssistantStreamChunk::update_state(operations.to_vec());
        if self.tx.send(chunk).is_err() {
            tracing::warn!(
                operations = operations.len(),
                "update-state receiver dropped, batch not delivered"
            );
        }
    }
}
