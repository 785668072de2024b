//! Knowledge base search for RAG agents
//!
//! The knowledge base is a directory of `.md` and `.txt` documents. Documents
//! are split into paragraphs and ranked by how many distinct query terms they
//! contain, then by total term hits.

use async_trait::async_trait;
use sdk::errors::EngineError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{str_arg, truncate, Tool};

const MAX_RESULTS: usize = 5;
const MAX_EXCERPT_BYTES: usize = 1200;
const MAX_DEPTH: usize = 4;

pub struct SearchKnowledgeBaseTool {
    root: PathBuf,
}

#[derive(Debug)]
struct Hit {
    source: String,
    excerpt: String,
    distinct: usize,
    total: usize,
}

impl SearchKnowledgeBaseTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn documents(&self) -> Result<Vec<PathBuf>, EngineError> {
        let mut found = Vec::new();
        if !self.root.is_dir() {
            return Ok(found);
        }
        let mut pending = vec![(self.root.clone(), 0usize)];
        while let Some((dir, depth)) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() && depth < MAX_DEPTH {
                    pending.push((path, depth + 1));
                } else if file_type.is_file() && is_document(&path) {
                    found.push(path);
                }
            }
        }
        found.sort();
        Ok(found)
    }
}

fn is_document(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()).as_deref(),
        Some("md") | Some("txt")
    )
}

fn terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 2)
        .map(|t| t.to_lowercase())
        .collect();
    terms.sort();
    terms.dedup();
    terms
}

fn score(paragraph: &str, terms: &[String]) -> (usize, usize) {
    let lower = paragraph.to_lowercase();
    terms.iter().fold((0, 0), |(distinct, total), term| {
        let n = lower.matches(term.as_str()).count();
        (distinct + usize::from(n > 0), total + n)
    })
}

#[async_trait]
impl Tool for SearchKnowledgeBaseTool {
    fn name(&self) -> &'static str {
        "search_knowledge_base"
    }

    fn description(&self) -> &'static str {
        "Search the specialized knowledge base and return the most relevant excerpts."
    }

    fn arguments_hint(&self) -> &'static str {
        r#"{"query": "search terms"}"#
    }

    async fn call(&self, args: &serde_json::Value) -> Result<String, EngineError> {
        let query = str_arg(args, "query")?;
        let terms = terms(query);
        info!("Knowledge base search: {}", query);

        if terms.is_empty() {
            return Ok(format!("No knowledge base results for: {}", query));
        }

        let mut hits = Vec::new();
        for doc in self.documents().await? {
            let content = match tokio::fs::read_to_string(&doc).await {
                Ok(c) => c,
                Err(e) => {
                    debug!("Skipping unreadable document {}: {}", doc.display(), e);
                    continue;
                }
            };
            let source = doc
                .strip_prefix(&self.root)
                .unwrap_or(&doc)
                .display()
                .to_string();

            for paragraph in content.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
                let (distinct, total) = score(paragraph, &terms);
                if distinct > 0 {
                    hits.push(Hit {
                        source: source.clone(),
                        excerpt: truncate(paragraph, MAX_EXCERPT_BYTES),
                        distinct,
                        total,
                    });
                }
            }
        }

        if hits.is_empty() {
            return Ok(format!("No knowledge base results for: {}", query));
        }

        hits.sort_by(|a, b| {
            b.distinct
                .cmp(&a.distinct)
                .then(b.total.cmp(&a.total))
                .then(a.source.cmp(&b.source))
        });

        Ok(hits
            .iter()
            .take(MAX_RESULTS)
            .enumerate()
            .map(|(i, h)| format!("[{}] {}\n{}", i + 1, h.source, h.excerpt))
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}
