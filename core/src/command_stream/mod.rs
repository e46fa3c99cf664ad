//! Command streams and their receivers.
//!
//! - [`LinearStream`] - Append-only cursor over a command buffer allocation
//! - [`CommandStreamReceiver`] - Consumer of submitted batches
//! - [`SoftwareCommandStreamReceiver`] - In-process receiver with software completion

mod linear_stream;
mod receiver;
mod software;

pub use linear_stream::LinearStream;
pub use receiver::{
    BatchBuffer, CommandStreamReceiver, FlushStamp, QueueThrottle, ResidencyContainer, TaskCount,
    DEFAULT_SLICE_COUNT, MI_BATCH_BUFFER_END,
};
pub use software::{CompletionMode, SoftwareCommandStreamReceiver, SubmittedBatch};
