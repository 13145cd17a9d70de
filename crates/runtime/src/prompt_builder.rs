//! Prompt assembly for the grounded offer search.
//!
//! The model is not a structured API, so extraction only works if the output
//! contract is spelled out completely: the array shape, the exact key set, and
//! the instruction to return `[]` rather than invent offers.

use hyperscan_config::SearchConfig;

/// Everything the prompt depends on.  Building the prompt is pure.
#[derive(Debug, Clone)]
pub struct PromptInputs<'a> {
    /// Trimmed, non-empty user query; quoted verbatim in the prompt.
    pub query: &'a str,
    /// Named stores/sites to restrict the search to.  Blank entries are
    /// ignored; an empty scope means unrestricted web search.
    pub source_scope: &'a [String],
    pub max_offers: usize,
    pub market: &'a str,
    pub preferred_domain: &'a str,
}

impl<'a> PromptInputs<'a> {
    pub fn new(query: &'a str, source_scope: &'a [String], config: &'a SearchConfig) -> Self {
        Self {
            query,
            source_scope,
            max_offers: config.max_offers,
            market: &config.market,
            preferred_domain: &config.preferred_domain,
        }
    }
}

/// Trimmed, non-blank scope entries in their original order.
pub fn normalize_scope(source_scope: &[String]) -> Vec<String> {
    source_scope
        .iter()
        .map(|source| source.trim())
        .filter(|source| !source.is_empty())
        .map(ToString::to_string)
        .collect()
}

pub fn build_search_prompt(inputs: &PromptInputs<'_>) -> String {
    let query = inputs.query;
    let max_offers = inputs.max_offers;
    let scope_block = build_scope_block(inputs.source_scope);
    let market_rules = build_market_rules(inputs.market, inputs.preferred_domain);

    format!(
        "Você é um assistente de compras online de altíssima precisão. Sua missão é encontrar \
         as melhores ofertas na internet para o produto que o usuário deseja.\n\n\
         Usuário quer comprar: \"{query}\"\n\n\
         Sua tarefa: encontrar no máximo {max_offers} das melhores ofertas para este produto.\n\
         {scope_block}\n\n\
         Regras obrigatórias:\n\
         1. Produto exato: cada oferta deve corresponder EXATAMENTE ao produto \"{query}\". \
         Não inclua acessórios, produtos similares nem variações de cor, capacidade ou modelo, \
         a menos que a busca peça isso.\n\
         2. Integridade do link (a regra mais importante):\n\
         {market_rules}\
         - O link deve abrir diretamente a página do produto; nunca uma página de busca, \
         categoria ou a página inicial da loja.\n\
         - URLs incompletas ou com marcadores como \"XXXXXXX\" são inválidas.\n\
         - Se a página mostrar o produto como esgotado ou indisponível, descarte a oferta.\n\
         - Na dúvida, DESCARTE a oferta. Poucos resultados corretos valem mais do que muitos \
         resultados duvidosos.\n\
         3. Imagem: informe a URL direta de uma imagem do produto quando houver uma confiável. \
         Caso contrário use uma string vazia (\"\"). A falta de imagem não é motivo para \
         descartar a oferta.\n\
         4. Formato de saída: responda com um único array JSON. Cada elemento é um objeto com \
         APENAS as chaves name, store, price, link, image e nenhuma outra. 'name' é o nome \
         completo do produto, 'store' o nome da loja, 'price' o preço formatado como texto \
         (ex.: \"R$ 9.999,00\"), 'link' a URL direta da página do produto e 'image' a URL da \
         imagem ou \"\".\n\n\
         Se nenhuma oferta cumprir todas as regras, responda com um array JSON vazio: []. \
         Não invente resultados."
    )
}

fn build_scope_block(source_scope: &[String]) -> String {
    let sources = normalize_scope(source_scope);
    if sources.is_empty() {
        return "Pesquise em toda a internet.".to_string();
    }
    format!(
        "Pesquise SOMENTE nestas fontes: {}. Ignore ofertas de qualquer outra loja ou site.",
        sources.join(", ")
    )
}

fn build_market_rules(market: &str, preferred_domain: &str) -> String {
    let market = market.trim();
    if market.is_empty() {
        return String::new();
    }
    let mut rules = format!("- A loja deve operar em {market}.");
    let domain = preferred_domain.trim();
    if !domain.is_empty() {
        rules.push_str(&format!(
            " Prefira endereços terminados em \"{domain}\"; links que redirecionam para sites \
             de outros países são inaceitáveis."
        ));
    }
    rules.push('\n');
    rules
}
