//! Navigator engine: HTTP API client, streaming reply pipeline and effect execution.
mod accumulator;
mod api;
mod chunk;
mod decode;
mod engine;
mod frame;
mod persist;
mod reply;
mod stream;
mod types;

pub use accumulator::{StreamAccumulator, EMPTY_REPLY_MESSAGE};
pub use api::{
    ApiClient, ApiError, ApiMessage, ApiSettings, AuthToken, ChatHistory, ChatSummary,
    MessageParts, Session, UserInfo, STATUS_ERROR, STATUS_PENDING, STATUS_SUCCESS,
};
pub use chunk::{parse_frame, ChatCompletionChunk, FrameEvent, DONE_SENTINEL};
pub use decode::{DecodeError, StreamDecoder};
pub use engine::EngineHandle;
pub use frame::{FrameSplitter, FRAME_DELIMITER};
pub use persist::{ensure_state_dir, AtomicFileWriter, PersistError};
pub use reply::{parse_reply, validate_reply, ReplyError, REPLY_ERROR_PREFIX};
pub use stream::{
    ChannelProgressSink, ChatStreamer, ProgressSink, ReqwestStreamer, StreamSettings,
    DEFAULT_COMPLETION_PATH,
};
pub use types::{
    CompletionRequest, ContextTurn, EngineEvent, FailureKind, Reference, ReplyParts, RequestId,
    StreamError, StreamOutcome,
};
