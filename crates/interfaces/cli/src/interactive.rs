use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use uuid::Uuid;

use hyperscan_config::AppConfig;
use hyperscan_core::Offer;
use hyperscan_core::commands::Command;
use hyperscan_llm::GroundedModel;
use hyperscan_runtime::{SearchController, SearchEvent, event_channel};
use hyperscan_storage::{KeyValueStore, RecentSearches};

use crate::lists::{Shelves, print_offer_list, print_recent};
use crate::render::Renderer;

const HELP: &str = "\
<texto>            buscar ofertas (cancela a busca em andamento)
/cancel            cancelar a busca em andamento
/scope a, b        restringir as próximas buscas a essas fontes
/scope             voltar a buscar em toda a internet
/compare N         adicionar a oferta N à comparação
/save N            salvar a oferta N
/uncompare N       remover o item N da comparação
/unsave N          remover o item N dos salvos
/compared          listar a comparação
/saved             listar os salvos
/recent            listar buscas recentes
/forget <busca>    remover uma busca recente
/help              esta ajuda
/exit              sair";

enum Flow {
    Continue,
    Exit,
}

/// Which search the screen belongs to, and its latest offers.
#[derive(Debug, Default)]
struct ResultsView {
    current: Option<Uuid>,
    last_offers: Vec<Offer>,
}

impl ResultsView {
    fn begin(&mut self, id: Uuid) {
        self.current = Some(id);
        self.last_offers.clear();
    }

    /// Returns `false` for events of any other session, which must not be
    /// rendered.
    fn accept(&mut self, event: &SearchEvent) -> bool {
        if self.current != Some(event.session()) {
            return false;
        }
        match event {
            SearchEvent::Started { .. } => self.last_offers.clear(),
            SearchEvent::Offers { offers, .. } => self.last_offers = offers.clone(),
            _ => {}
        }
        true
    }

    /// The 1-based `index` of the last result list.
    fn offer_at(&self, index: usize) -> Option<&Offer> {
        self.last_offers.get(index.checked_sub(1)?)
    }
}

struct Session {
    controller: SearchController,
    shelves: Shelves,
    scope: Vec<String>,
    results: ResultsView,
}

pub(crate) async fn run_interactive_session(
    config: AppConfig,
    model: Arc<dyn GroundedModel>,
    store: Arc<dyn KeyValueStore>,
) -> Result<()> {
    let (events_tx, mut events_rx) = event_channel();
    let recent = RecentSearches::load(store.clone())?;
    let mut session = Session {
        controller: SearchController::new(model, config, recent, events_tx),
        shelves: Shelves::load(store)?,
        scope: Vec::new(),
        results: ResultsView::default(),
    };
    let mut renderer = Renderer::new();

    println!("hyperscan: digite um produto para buscar ofertas, /help para comandos");
    print!("buscas recentes: ");
    println!("{}", session.controller.recent().items().join(", "));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let Some(command) = Command::parse(&line) else {
                    continue;
                };
                match session.handle(command).await {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Exit) => break,
                    Err(err) => eprintln!("erro: {err:#}"),
                }
            }
            Some(event) = events_rx.recv() => {
                if session.results.accept(&event) {
                    renderer.render(&event, &session.shelves);
                }
            }
        }
    }

    session.controller.cancel().await;
    println!("sessão encerrada");
    Ok(())
}

impl Session {
    async fn handle(&mut self, command: Command) -> Result<Flow> {
        match command {
            Command::Search(query) => {
                if let Some(id) = self.controller.start(&query, self.scope.clone()).await {
                    self.results.begin(id);
                }
            }
            Command::Cancel => {
                if !self.controller.cancel().await {
                    println!("nenhuma busca em andamento");
                }
            }
            Command::Scope(sources) => {
                self.scope = sources;
                if self.scope.is_empty() {
                    println!("escopo: toda a internet");
                } else {
                    println!("escopo: {}", self.scope.join(", "));
                }
            }
            Command::Compare(index) => {
                let Some(offer) = self.result_at(index) else {
                    return Ok(Flow::Continue);
                };
                if self.shelves.compare.add(offer)? {
                    println!("adicionado à comparação ({})", self.shelves.compare.len());
                } else {
                    println!("já está na comparação");
                }
            }
            Command::Save(index) => {
                let Some(offer) = self.result_at(index) else {
                    return Ok(Flow::Continue);
                };
                if self.shelves.saved.add(offer)? {
                    println!("oferta salva ({})", self.shelves.saved.len());
                } else {
                    println!("oferta já salva");
                }
            }
            Command::Uncompare(index) => {
                match self.shelves.compare.items().get(index - 1).map(|offer| offer.link.clone()) {
                    Some(link) => {
                        self.shelves.compare.remove(&link)?;
                        println!("removido da comparação");
                    }
                    None => println!("comparação não tem item {index}"),
                }
            }
            Command::Unsave(index) => {
                match self.shelves.saved.items().get(index - 1).map(|offer| offer.link.clone()) {
                    Some(link) => {
                        self.shelves.saved.remove(&link)?;
                        println!("removido dos salvos");
                    }
                    None => println!("salvos não tem item {index}"),
                }
            }
            Command::Compared => {
                print_offer_list("comparação", &self.shelves.compare, Some(&self.shelves))
            }
            Command::Saved => {
                print_offer_list("salvos", &self.shelves.saved, Some(&self.shelves))
            }
            Command::Recent => print_recent(self.controller.recent()),
            Command::Forget(tag) => {
                if self.controller.recent_mut().remove(&tag)? {
                    println!("removido: {tag}");
                } else {
                    println!("busca não encontrada: {tag}");
                }
            }
            Command::Help => println!("{HELP}"),
            Command::Exit => return Ok(Flow::Exit),
            Command::Invalid(message) => println!("{message}"),
        }
        Ok(Flow::Continue)
    }

    fn result_at(&self, index: usize) -> Option<Offer> {
        let offer = self.results.offer_at(index).cloned();
        if offer.is_none() {
            println!("não há oferta {index} nos resultados atuais");
        }
        offer
    }
}
