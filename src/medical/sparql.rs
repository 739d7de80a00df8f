//! SPARQL-over-HTTP client and the DBpedia medical entity query.

use crate::error::{GraphragError, Result};
use crate::medical::{MedicalEntity, RelatedEntity};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// SPARQL JSON results document (`application/sparql-results+json`).
#[derive(Debug, Clone, Deserialize)]
pub struct SparqlResults {
    #[serde(default)]
    pub head: SparqlHead,
    pub results: SparqlBindings,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SparqlHead {
    #[serde(default)]
    pub vars: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SparqlBindings {
    pub bindings: Vec<Binding>,
}

/// One solution row: variable name -> bound term. Unbound OPTIONAL
/// variables are absent from the map.
pub type Binding = HashMap<String, SparqlTerm>;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SparqlTerm {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub value: String,
    #[serde(rename = "xml:lang", default)]
    pub lang: Option<String>,
}

/// Blocking-style SPARQL SELECT client.
#[derive(Debug, Clone)]
pub struct SparqlClient {
    http: Client,
    endpoint: String,
}

impl SparqlClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GraphragError::Http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run a SELECT query and decode the JSON results.
    pub async fn select(&self, query: &str) -> Result<SparqlResults> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("query", query), ("format", "json")])
            .header("Accept", "application/sparql-results+json")
            .send()
            .await
            .map_err(|e| GraphragError::Sparql(format!("Request to {} failed: {}", self.endpoint, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GraphragError::Sparql(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(GraphragError::Sparql(format!("Endpoint returned {}: {}", status, body)));
        }

        serde_json::from_str(&body)
            .map_err(|e| GraphragError::Sparql(format!("Malformed results document: {}", e)))
    }
}

/// Quote `value` as a SPARQL string literal, escaping every character that
/// could terminate or alter the literal.
pub fn escape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// DBpedia query for diseases, drugs, proteins and anatomical structures
/// whose English label contains `search_term` (case-insensitive).
pub fn build_entity_query(search_term: &str, limit: usize) -> String {
    format!(
        r#"PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>
PREFIX dbo: <http://dbpedia.org/ontology/>
PREFIX dbp: <http://dbpedia.org/property/>

SELECT DISTINCT ?entity ?label ?description ?type ?related ?relatedLabel WHERE {{
    ?entity rdfs:label ?label ;
            a ?type .
    OPTIONAL {{
        ?entity dbo:abstract ?description .
        FILTER(LANG(?description) = "en")
    }}
    OPTIONAL {{
        ?entity ?relation ?related .
        ?related rdfs:label ?relatedLabel .
        FILTER(LANG(?relatedLabel) = "en")
        FILTER(?relation IN (dbo:drug, dbo:disease, dbo:protein, dbo:anatomicalStructure))
    }}
    FILTER(CONTAINS(LCASE(STR(?label)), LCASE({term})))
    FILTER(LANG(?label) = "en")
    FILTER(?type IN (dbo:Disease, dbo:Drug, dbo:Protein, dbo:AnatomicalStructure))
}}
LIMIT {limit}
"#,
        term = escape_literal(search_term),
        limit = limit,
    )
}

/// Fold result rows into the first entity they describe.
///
/// Rows are grouped by `?entity` in first-seen order and only the first group
/// is returned; later entities are dropped. Every row of that group binding
/// both `?related` and `?relatedLabel` contributes one related entity.
pub fn entity_from_bindings(bindings: &[Binding]) -> Result<Option<MedicalEntity>> {
    let mut entity: Option<MedicalEntity> = None;
    let mut skipped = 0usize;

    for binding in bindings {
        let uri = required(binding, "entity")?;

        match entity.as_mut() {
            None => {
                let type_uri = required(binding, "type")?;
                entity = Some(MedicalEntity {
                    uri: uri.to_string(),
                    label: required(binding, "label")?.to_string(),
                    description: binding.get("description").map(|t| t.value.clone()),
                    entity_type: type_uri.rsplit('/').next().unwrap_or(type_uri).to_string(),
                    related_entities: Vec::new(),
                    source_links: vec![uri.to_string()],
                });
            }
            Some(first) if first.uri != uri => {
                required(binding, "label")?;
                required(binding, "type")?;
                skipped += 1;
                continue;
            }
            Some(_) => {}
        }

        if let (Some(related), Some(related_label), Some(first)) = (
            binding.get("related"),
            binding.get("relatedLabel"),
            entity.as_mut(),
        ) {
            first.related_entities.push(RelatedEntity {
                uri: related.value.clone(),
                label: related_label.value.clone(),
            });
        }
    }

    if skipped > 0 {
        log::debug!("Ignored {} row(s) describing other entities", skipped);
    }

    Ok(entity)
}

fn required<'a>(binding: &'a Binding, var: &str) -> Result<&'a str> {
    binding
        .get(var)
        .map(|t| t.value.as_str())
        .ok_or_else(|| GraphragError::Parse(format!("SPARQL binding is missing ?{}", var)))
}
