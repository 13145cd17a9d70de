mod controller;
mod events;
pub mod extract;
pub mod prompt_builder;
mod session;
mod ticker;

pub use controller::{SearchController, SearchError, validate_query};
pub use events::{
    CANCELLED_MESSAGE, EMPTY_RESULT_MESSAGE, EventReceiver, EventSender, FAILURE_MESSAGE,
    LOADING_MESSAGE, SearchEvent, StatusKind, event_channel,
};
pub use extract::{Extraction, ExtractionError};
pub use prompt_builder::{PromptInputs, build_search_prompt};
pub use session::{SessionSnapshot, SessionStatus};
pub use ticker::{TickerSet, TickerSettings};
