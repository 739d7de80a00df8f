use crate::config::Config;
use crate::error::Result;
use crate::llm::ChatClient;
use crate::medical::sparql::{build_entity_query, entity_from_bindings, SparqlClient};
use crate::medical::{KnowledgeGraph, MedicalEntity};

/// Fill the fixed question-answering template with retrieved context.
pub fn build_prompt(context: &str, query: &str) -> String {
    format!(
        "Context: {context}\n\n\
         Query: {query}\n\n\
         Based on the medical knowledge provided in the context, please provide a detailed response. \n\
         Include relevant relationships between medical entities and cite sources when possible.\n\n\
         Response:"
    )
}

/// DBpedia-backed medical knowledge graph with LLM question answering.
pub struct MedicalRag {
    sparql: SparqlClient,
    llm: ChatClient,
    graph: KnowledgeGraph,
    result_limit: usize,
}

impl MedicalRag {
    pub fn new(sparql: SparqlClient, llm: ChatClient, result_limit: usize) -> Self {
        Self {
            sparql,
            llm,
            graph: KnowledgeGraph::new(),
            result_limit,
        }
    }

    /// Wire up the SPARQL and chat clients from `[medical]` and `[llm]`.
    pub fn from_config(config: &Config, llm_api_key: String) -> Result<Self> {
        let sparql = SparqlClient::new(config.medical.sparql_endpoint.clone(), config.medical.timeout())?;
        let llm = ChatClient::from_config(&config.llm, llm_api_key)?;
        Ok(Self::new(sparql, llm, config.medical.result_limit))
    }

    pub fn graph(&self) -> &KnowledgeGraph {
        &self.graph
    }

    /// Look up the first DBpedia entity whose label contains `search_term`.
    pub async fn query_medical_entity(&self, search_term: &str) -> Result<Option<MedicalEntity>> {
        let query = build_entity_query(search_term, self.result_limit);
        let results = self.sparql.select(&query).await?;
        log::debug!(
            "SPARQL lookup for {:?} returned {} row(s)",
            search_term,
            results.results.bindings.len()
        );
        entity_from_bindings(&results.results.bindings)
    }

    pub fn update_knowledge_graph(&mut self, entity: &MedicalEntity) -> usize {
        self.graph.update(entity)
    }

    /// Look up every term and merge the hits. Returns how many terms matched.
    pub async fn build_graph<S: AsRef<str>>(&mut self, search_terms: &[S]) -> Result<usize> {
        let mut found = 0;
        for term in search_terms {
            let term = term.as_ref();
            match self.query_medical_entity(term).await? {
                Some(entity) => {
                    log::info!(
                        "{:?} -> {} ({}, {} related)",
                        term,
                        entity.label,
                        entity.entity_type,
                        entity.related_entities.len()
                    );
                    self.update_knowledge_graph(&entity);
                    found += 1;
                }
                None => log::info!("{:?} -> no matching entity", term),
            }
        }
        Ok(found)
    }

    pub fn generate_rag_context(&self, query: &str) -> String {
        self.graph.generate_context(query)
    }

    /// Answer `user_query` with the graph context, via one chat completion.
    pub async fn query_with_rag(&self, user_query: &str) -> Result<String> {
        let context = self.generate_rag_context(user_query);
        let prompt = build_prompt(&context, user_query);
        log::debug!("Prompt is {} bytes", prompt.len());
        self.llm.complete(&prompt).await
    }
}
