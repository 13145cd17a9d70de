use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use hyperscan_core::{Citation, Offer};

pub const CANCELLED_MESSAGE: &str = "Busca cancelada.";
pub const FAILURE_MESSAGE: &str =
    "Ocorreu um erro ao buscar as ofertas. Por favor, tente novamente.";
pub const LOADING_MESSAGE: &str = "Analisando a galáxia de ofertas para você...";
pub const EMPTY_RESULT_MESSAGE: &str = "Nenhuma oferta encontrada. Tente refinar sua busca.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusKind {
    Info,
    Error,
}

/// Everything the controller tells the rendering side.  Every event names
/// the session it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SearchEvent {
    /// Loading indicator on, counters at zero.
    Started { session: Uuid, query: String },
    Progress {
        session: Uuid,
        elapsed_seconds: u64,
        progress_count: u64,
    },
    /// Final offer list.  Empty means "no offers found".
    Offers { session: Uuid, offers: Vec<Offer> },
    Citations {
        session: Uuid,
        citations: Vec<Citation>,
    },
    Status {
        session: Uuid,
        kind: StatusKind,
        message: String,
    },
    /// Loading indicator off; the search affordance is available again.
    Idle { session: Uuid },
}

impl SearchEvent {
    pub fn session(&self) -> Uuid {
        match self {
            Self::Started { session, .. }
            | Self::Progress { session, .. }
            | Self::Offers { session, .. }
            | Self::Citations { session, .. }
            | Self::Status { session, .. }
            | Self::Idle { session } => *session,
        }
    }
}

pub type EventSender = mpsc::UnboundedSender<SearchEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<SearchEvent>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
