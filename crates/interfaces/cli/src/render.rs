use std::io::{self, IsTerminal, Write};

use hyperscan_core::{Citation, Offer};
use hyperscan_runtime::{EMPTY_RESULT_MESSAGE, LOADING_MESSAGE, SearchEvent, StatusKind};

use crate::lists::Shelves;

/// List membership shown next to a card.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Marks {
    pub compared: bool,
    pub saved: bool,
}

pub(crate) fn format_offer_card(index: usize, offer: &Offer, marks: Marks) -> String {
    let mut card = format!("[{index}] {}\n    {} | {}", offer.name, offer.store, offer.price);
    if marks.compared {
        card.push_str("  [comparando]");
    }
    if marks.saved {
        card.push_str("  [salvo]");
    }
    card.push_str(&format!("\n    {}", offer.link));
    if offer.has_image() {
        card.push_str(&format!("\n    imagem: {}", offer.image));
    }
    card
}

pub(crate) fn format_citations(citations: &[Citation]) -> Option<String> {
    if citations.is_empty() {
        return None;
    }
    let mut block = String::from("Fontes:");
    for citation in citations {
        block.push_str(&format!("\n  - {} ({})", citation.title, citation.uri));
    }
    Some(block)
}

pub(crate) fn format_progress(elapsed_seconds: u64, progress_count: u64) -> String {
    format!("{elapsed_seconds}s | {progress_count} itens analisados")
}

/// Prints search events to stdout.
///
/// Progress is redrawn in place on a terminal and skipped otherwise, so
/// piped output only carries results.
pub(crate) struct Renderer {
    live_progress: bool,
    progress_open: bool,
}

impl Renderer {
    pub(crate) fn new() -> Self {
        Self {
            live_progress: io::stdout().is_terminal(),
            progress_open: false,
        }
    }

    pub(crate) fn render(&mut self, event: &SearchEvent, shelves: &Shelves) {
        match event {
            SearchEvent::Started { query, .. } => {
                self.close_progress();
                println!("{LOADING_MESSAGE} ({query})");
            }
            SearchEvent::Progress {
                elapsed_seconds,
                progress_count,
                ..
            } => {
                if self.live_progress {
                    print!("\r{}", format_progress(*elapsed_seconds, *progress_count));
                    let _ = io::stdout().flush();
                    self.progress_open = true;
                }
            }
            SearchEvent::Offers { offers, .. } => {
                self.close_progress();
                if offers.is_empty() {
                    println!("{EMPTY_RESULT_MESSAGE}");
                }
                for (index, offer) in offers.iter().enumerate() {
                    println!("{}", format_offer_card(index + 1, offer, shelves.marks(offer)));
                }
            }
            SearchEvent::Citations { citations, .. } => {
                if let Some(block) = format_citations(citations) {
                    println!("{block}");
                }
            }
            SearchEvent::Status { kind, message, .. } => {
                self.close_progress();
                match kind {
                    StatusKind::Info => println!("{message}"),
                    StatusKind::Error => eprintln!("{message}"),
                }
            }
            SearchEvent::Idle { .. } => self.close_progress(),
        }
    }

    fn close_progress(&mut self) {
        if self.progress_open {
            println!();
            self.progress_open = false;
        }
    }
}
