use crate::postings::{Posting, PostingsList};
use crate::tokenizer::TokenizerOptions;
use crate::DocId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Read-only view of an index consumed by the query evaluator.
///
/// `postings` returns `None` for a term that was never indexed, which is distinct
/// from a term that is present with an empty list.
pub trait PostingsStore: Send + Sync {
    fn postings(&self, term: &str) -> Option<&PostingsList>;
    fn document_frequency(&self, term: &str) -> u32;
    fn term_frequency(&self, doc_id: DocId, term: &str) -> u32;
    fn document_length(&self, doc_id: DocId) -> u32;
    fn document_name(&self, doc_id: DocId) -> Option<&str>;
    fn num_docs(&self) -> u32;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocMeta {
    /// File name or path the document was read from.
    pub name: String,
    /// Number of indexed tokens.
    pub length: u32,
}

/// In-memory positional inverted index.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct InvertedIndex {
    postings: HashMap<String, PostingsList>,
    df: HashMap<String, u32>,
    docs: Vec<DocMeta>,
    options: TokenizerOptions,
}

impl InvertedIndex {
    pub fn new() -> Self { Self::default() }

    pub fn with_options(options: TokenizerOptions) -> Self {
        Self { options, ..Self::default() }
    }

    /// Tokenizer options the index was built with; queries must use the same.
    pub fn options(&self) -> TokenizerOptions { self.options }

    /// Append a document and its `(term, position)` tokens; returns the new id.
    pub fn add_document<I, S>(&mut self, name: impl Into<String>, tokens: I) -> DocId
    where
        I: IntoIterator<Item = (S, usize)>,
        S: AsRef<str>,
    {
        let doc_id = self.docs.len() as DocId;
        self.docs.push(DocMeta { name: name.into(), length: 0 });
        let mut length = 0u32;
        for (term, pos) in tokens {
            self.insert(term.as_ref(), doc_id, pos as u32);
            length += 1;
        }
        self.docs[doc_id as usize].length = length;
        doc_id
    }

    /// Record one occurrence. Documents must be inserted in ascending id order.
    fn insert(&mut self, term: &str, doc_id: DocId, offset: u32) {
        let list = self.postings.entry(term.to_string()).or_default();
        debug_assert!(list.last().map_or(true, |p| p.doc_id <= doc_id));
        if list.last().map_or(true, |p| p.doc_id != doc_id) {
            *self.df.entry(term.to_string()).or_insert(0) += 1;
        }
        list.push(Posting::new(doc_id, offset));
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.postings.keys().map(String::as_str)
    }

    pub fn num_terms(&self) -> usize { self.postings.len() }

    pub fn doc_meta(&self, doc_id: DocId) -> Option<&DocMeta> {
        self.docs.get(doc_id as usize)
    }
}

impl PostingsStore for InvertedIndex {
    fn postings(&self, term: &str) -> Option<&PostingsList> {
        self.postings.get(term)
    }

    fn document_frequency(&self, term: &str) -> u32 {
        self.df.get(term).copied().unwrap_or(0)
    }

    fn term_frequency(&self, doc_id: DocId, term: &str) -> u32 {
        self.postings.get(term).map_or(0, |l| l.count_for(doc_id) as u32)
    }

    fn document_length(&self, doc_id: DocId) -> u32 {
        self.docs.get(doc_id as usize).map_or(0, |d| d.length)
    }

    fn document_name(&self, doc_id: DocId) -> Option<&str> {
        self.docs.get(doc_id as usize).map(|d| d.name.as_str())
    }

    fn num_docs(&self) -> u32 { self.docs.len() as u32 }
}
