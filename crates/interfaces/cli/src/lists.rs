use std::sync::Arc;

use anyhow::Result;

use hyperscan_core::Offer;
use hyperscan_storage::{KeyValueStore, OfferList, RecentSearches};

use crate::render::{Marks, format_offer_card};
use crate::{OfferListCommands, RecentCommands};

/// The comparison and saved lists, owned by the front end.
pub(crate) struct Shelves {
    pub compare: OfferList,
    pub saved: OfferList,
}

impl Shelves {
    pub(crate) fn load(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        Ok(Self {
            compare: OfferList::comparison(store.clone())?,
            saved: OfferList::saved(store)?,
        })
    }

    pub(crate) fn marks(&self, offer: &Offer) -> Marks {
        Marks {
            compared: self.compare.contains(&offer.link),
            saved: self.saved.contains(&offer.link),
        }
    }
}

pub(crate) fn print_recent(recent: &RecentSearches) {
    if recent.items().is_empty() {
        println!("(nenhuma busca recente)");
        return;
    }
    for (index, query) in recent.items().iter().enumerate() {
        println!("{}. {query}", index + 1);
    }
}

pub(crate) fn print_offer_list(title: &str, list: &OfferList, shelves: Option<&Shelves>) {
    println!("── {title} ({}) ──", list.len());
    if list.is_empty() {
        println!("(vazia)");
        return;
    }
    for (index, offer) in list.items().iter().enumerate() {
        let marks = shelves.map(|shelves| shelves.marks(offer)).unwrap_or_default();
        println!("{}", format_offer_card(index + 1, offer, marks));
    }
}

pub(crate) fn run_recent_command(
    store: Arc<dyn KeyValueStore>,
    command: RecentCommands,
) -> Result<()> {
    let mut recent = RecentSearches::load(store)?;
    match command {
        RecentCommands::List => print_recent(&recent),
        RecentCommands::Remove { tag } => {
            if recent.remove(&tag)? {
                println!("removido: {tag}");
            } else {
                println!("busca não encontrada: {tag}");
            }
        }
        RecentCommands::Clear => {
            recent.clear()?;
            println!("buscas recentes apagadas");
        }
    }
    Ok(())
}

pub(crate) fn run_offer_list_command(
    mut list: OfferList,
    title: &str,
    command: OfferListCommands,
) -> Result<()> {
    match command {
        OfferListCommands::List => print_offer_list(title, &list, None),
        OfferListCommands::Remove { link } => {
            if list.remove(&link)? {
                println!("removido de {title}: {link}");
            } else {
                println!("link não está em {title}: {link}");
            }
        }
        OfferListCommands::Clear => {
            list.clear()?;
            println!("{title}: lista apagada");
        }
    }
    Ok(())
}
