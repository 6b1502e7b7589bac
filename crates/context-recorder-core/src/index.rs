//! In-memory full-text search index over context entries.
//!
//! The index is a disposable projection of the [`Store`] held in a RAM-only
//! tantivy index: it can be thrown away and rebuilt at any time, and it is
//! never consulted to decide whether an entry exists.
//!
//! # Lifecycle
//!
//! ```text
//! Empty ──build()──▶ Building ──▶ Ready
//!   │                              ▲  │
//!   └── search()/suggest() ────────┘  └── add_document / remove_document
//! ```
//!
//! While `Empty`, [`SearchIndex::add_document`] and
//! [`SearchIndex::remove_document`] are no-ops; [`SearchIndex::search`] and
//! [`SearchIndex::suggest`] build the index first. A mutation that fails
//! inside tantivy drops the index back to `Empty`, so the next query
//! rebuilds it from the store.
//!
//! # Scoring
//!
//! Each entry is indexed as four text fields: content (boost 2), tags
//! (boost 3), associated file paths (boost 1) and author (boost 1). Every
//! query token becomes, per field, an exact BM25 term clause plus a prefix
//! clause and a fuzzy clause (edit distance `round(fuzzy × token length)`,
//! at most 2). Prefix and fuzzy clauses score a constant scaled down by
//! [`PREFIX_WEIGHT`] and [`FUZZY_WEIGHT`], so exact matches rank first.
//! Clauses are ORed; ties fall back to insertion order.

use tantivy::collector::{Count, TopDocs};
use tantivy::query::{BooleanQuery, BoostQuery, FuzzyTermQuery, Occur, Query, TermQuery};
use tantivy::schema::{
    Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, Value, FAST, STORED, STRING,
};
use tantivy::tokenizer::{LowerCaser, RemoveLongFilter, SimpleTokenizer, TextAnalyzer, TokenStream};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::models::ContextEntry;
use crate::store::Store;

/// Per-field boosts: content, tags, file paths, author.
pub const FIELD_BOOSTS: [f32; 4] = [2.0, 3.0, 1.0, 1.0];

/// Scale applied to prefix-only matches.
pub const PREFIX_WEIGHT: f32 = 0.375;
/// Scale applied to fuzzy-only matches.
pub const FUZZY_WEIGHT: f32 = 0.45;

/// Largest edit distance tantivy's Levenshtein automata support.
const MAX_FUZZY_DISTANCE: u8 = 2;

const TOKENIZER: &str = "ccr_words";
const WRITER_HEAP_BYTES: usize = 20_000_000;

/// Lifecycle state of a [`SearchIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Empty,
    Building,
    Ready,
}

/// Matching behavior.
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Edit-distance tolerance as a fraction of query token length.
    pub fuzzy: f64,
    /// Whether a query token matches indexed tokens it is a prefix of.
    pub prefix: bool,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            fuzzy: 0.2,
            prefix: true,
        }
    }
}

/// A ranked query result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
}

#[derive(Clone, Copy)]
struct Fields {
    id: Field,
    seq: Field,
    content: Field,
    tags: Field,
    files: Field,
    author: Field,
}

impl Fields {
    fn text(&self) -> [Field; 4] {
        [self.content, self.tags, self.files, self.author]
    }

    fn weighted(&self) -> impl Iterator<Item = (Field, f32)> {
        self.text().into_iter().zip(FIELD_BOOSTS)
    }
}

fn build_schema() -> (Schema, Fields) {
    let mut builder = Schema::builder();

    let id = builder.add_text_field("id", STRING | STORED);
    let seq = builder.add_u64_field("seq", STORED | FAST);

    let text = TextOptions::default().set_indexing_options(
        TextFieldIndexing::default()
            .set_tokenizer(TOKENIZER)
            .set_index_option(IndexRecordOption::WithFreqs),
    );
    let content = builder.add_text_field("content", text.clone());
    let tags = builder.add_text_field("tags", text.clone());
    let files = builder.add_text_field("files", text.clone());
    let author = builder.add_text_field("author", text);

    let fields = Fields {
        id,
        seq,
        content,
        tags,
        files,
        author,
    };
    (builder.build(), fields)
}

/// Lower-cased words split on whitespace and punctuation, so
/// `"src/auth/login.ts"` indexes as `src auth login ts`.
fn analyzer() -> TextAnalyzer {
    TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(40))
        .filter(LowerCaser)
        .build()
}

fn tokenize(text: &str) -> Vec<String> {
    let mut analyzer = analyzer();
    let mut stream = analyzer.token_stream(text);
    let mut tokens = Vec::new();
    while stream.advance() {
        tokens.push(stream.token().text.clone());
    }
    tokens
}

fn should(query: impl Query + 'static, boost: f32) -> (Occur, Box<dyn Query>) {
    (Occur::Should, Box::new(BoostQuery::new(Box::new(query), boost)))
}

/// The live tantivy index, present while `Building` or `Ready`.
struct Corpus {
    reader: IndexReader,
    writer: IndexWriter,
    fields: Fields,
}

impl Corpus {
    fn create() -> tantivy::Result<Self> {
        let (schema, fields) = build_schema();
        let index = Index::create_in_ram(schema);
        index.tokenizers().register(TOKENIZER, analyzer());
        let writer = index.writer_with_num_threads(1, WRITER_HEAP_BYTES)?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        Ok(Self {
            reader,
            writer,
            fields,
        })
    }

    fn stage(&mut self, entry: &ContextEntry, seq: u64) -> tantivy::Result<()> {
        let f = self.fields;
        self.writer.delete_term(Term::from_field_text(f.id, &entry.id));
        self.writer.add_document(doc!(
            f.id => entry.id.as_str(),
            f.seq => seq,
            f.content => entry.content.as_str(),
            f.tags => entry.tags.join(" "),
            f.files => entry.file_paths().collect::<Vec<_>>().join(" "),
            f.author => entry.author().unwrap_or_default(),
        ))?;
        Ok(())
    }

    fn unstage(&mut self, id: &str) {
        self.writer.delete_term(Term::from_field_text(self.fields.id, id));
    }

    fn commit(&mut self) -> tantivy::Result<()> {
        self.writer.commit()?;
        self.reader.reload()
    }

    fn num_docs(&self) -> usize {
        self.reader.searcher().num_docs() as usize
    }

    fn contains(&self, id: &str) -> tantivy::Result<bool> {
        let query = TermQuery::new(
            Term::from_field_text(self.fields.id, id),
            IndexRecordOption::Basic,
        );
        Ok(self.reader.searcher().search(&query, &Count)? > 0)
    }

    /// Live documents containing `token` in any text field.
    fn doc_count(&self, token: &str) -> tantivy::Result<usize> {
        let clauses: Vec<(Occur, Box<dyn Query>)> = self
            .fields
            .text()
            .into_iter()
            .map(|field| {
                let query: Box<dyn Query> = Box::new(TermQuery::new(
                    Term::from_field_text(field, token),
                    IndexRecordOption::Basic,
                ));
                (Occur::Should, query)
            })
            .collect();
        self.reader.searcher().search(&BooleanQuery::new(clauses), &Count)
    }

    fn rank(&self, query: &dyn Query, limit: usize) -> tantivy::Result<Vec<SearchHit>> {
        let searcher = self.reader.searcher();
        let top = searcher.search(query, &TopDocs::with_limit(limit))?;

        let mut ranked = Vec::with_capacity(top.len());
        for (score, address) in top {
            let doc: TantivyDocument = searcher.doc(address)?;
            let id = doc
                .get_first(self.fields.id)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let seq = doc
                .get_first(self.fields.seq)
                .and_then(|v| v.as_u64())
                .unwrap_or(u64::MAX);
            ranked.push((score, seq, id));
        }
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));

        Ok(ranked
            .into_iter()
            .map(|(score, _, id)| SearchHit { id, score })
            .collect())
    }

    /// Distinct indexed terms starting with `prefix`, across all text fields.
    fn terms_with_prefix(&self, prefix: &str) -> tantivy::Result<Vec<String>> {
        let searcher = self.reader.searcher();
        let mut terms: Vec<String> = Vec::new();
        for segment in searcher.segment_readers() {
            for field in self.fields.text() {
                let inverted = segment.inverted_index(field)?;
                let mut stream = inverted.terms().range().ge(prefix.as_bytes()).into_stream()?;
                while stream.advance() {
                    let Ok(term) = std::str::from_utf8(stream.key()) else {
                        continue;
                    };
                    if !term.starts_with(prefix) {
                        break;
                    }
                    terms.push(term.to_string());
                }
            }
        }
        terms.sort();
        terms.dedup();
        Ok(terms)
    }
}

/// Fuzzy, prefix-aware full-text index keyed by entry id.
pub struct SearchIndex {
    options: IndexOptions,
    state: IndexState,
    corpus: Option<Corpus>,
    next_seq: u64,
}

impl SearchIndex {
    pub fn new(options: IndexOptions) -> Self {
        Self {
            options,
            state: IndexState::Empty,
            corpus: None,
            next_seq: 0,
        }
    }

    pub fn state(&self) -> IndexState {
        self.state
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.corpus.as_ref().map_or(0, Corpus::num_docs)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &str) -> bool {
        self.corpus
            .as_ref()
            .is_some_and(|c| c.contains(id).unwrap_or(false))
    }

    /// Discard all state and return to [`IndexState::Empty`].
    pub fn reset(&mut self) {
        self.corpus = None;
        self.next_seq = 0;
        self.state = IndexState::Empty;
    }

    /// Discard any existing state and index the full corpus from `store`.
    ///
    /// Idempotent. On failure the index is left `Empty` and the error is
    /// returned. Returns the number of indexed documents.
    pub async fn build<S: Store + ?Sized>(&mut self, store: &S) -> Result<usize> {
        self.reset();
        self.state = IndexState::Building;

        let entries = match store.get_all().await {
            Ok(entries) => entries,
            Err(e) => {
                self.reset();
                return Err(e);
            }
        };

        let corpus = Corpus::create().and_then(|mut corpus| {
            for (seq, entry) in (0u64..).zip(&entries) {
                corpus.stage(entry, seq)?;
            }
            corpus.commit()?;
            Ok(corpus)
        });
        match corpus {
            Ok(corpus) => {
                self.next_seq = entries.len() as u64;
                self.corpus = Some(corpus);
                self.state = IndexState::Ready;
                info!(documents = entries.len(), "search index built");
                Ok(entries.len())
            }
            Err(e) => {
                self.reset();
                Err(e.into())
            }
        }
    }

    /// Build the index if it is not `Ready` yet.
    pub async fn ensure_ready<S: Store + ?Sized>(&mut self, store: &S) -> Result<()> {
        if self.state != IndexState::Ready {
            debug!("search index cold, building");
            self.build(store).await?;
        }
        Ok(())
    }

    /// Ranked query with lazy build.
    pub async fn search<S: Store + ?Sized>(
        &mut self,
        store: &S,
        text: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        self.ensure_ready(store).await?;
        self.query(text, limit)
    }

    /// Completion candidates with lazy build.
    pub async fn suggest<S: Store + ?Sized>(
        &mut self,
        store: &S,
        partial: &str,
        limit: usize,
    ) -> Result<Vec<String>> {
        self.ensure_ready(store).await?;
        self.completions(partial, limit)
    }

    /// Index one entry. No-op unless the index is `Ready`; re-adding an id
    /// replaces its previous document.
    pub fn add_document(&mut self, entry: &ContextEntry) {
        if self.state != IndexState::Ready {
            return;
        }
        let Some(corpus) = self.corpus.as_mut() else {
            return;
        };
        let seq = self.next_seq;
        self.next_seq += 1;
        match corpus.stage(entry, seq).and_then(|()| corpus.commit()) {
            Ok(()) => debug!(id = %entry.id, "indexed entry"),
            Err(e) => {
                warn!(id = %entry.id, error = %e, "index update failed, discarding index");
                self.reset();
            }
        }
    }

    /// Drop one entry. No-op unless the index is `Ready`.
    pub fn remove_document(&mut self, id: &str) {
        if self.state != IndexState::Ready {
            return;
        }
        let Some(corpus) = self.corpus.as_mut() else {
            return;
        };
        corpus.unstage(id);
        match corpus.commit() {
            Ok(()) => debug!(id, "removed entry from index"),
            Err(e) => {
                warn!(id, error = %e, "index update failed, discarding index");
                self.reset();
            }
        }
    }

    /// Rank indexed documents against `text`, most relevant first.
    ///
    /// Query tokens are combined with OR; an entry matching more tokens (or
    /// matching them in higher-boosted fields) scores higher.
    pub fn query(&self, text: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let Some(corpus) = &self.corpus else {
            return Ok(Vec::new());
        };
        let tokens = tokenize(text);
        if tokens.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        for token in &tokens {
            let distance = self.max_edit_distance(token.chars().count());
            for (field, boost) in corpus.fields.weighted() {
                let term = Term::from_field_text(field, token);
                clauses.push(should(
                    TermQuery::new(term.clone(), IndexRecordOption::WithFreqs),
                    boost,
                ));
                if self.options.prefix {
                    clauses.push(should(
                        FuzzyTermQuery::new_prefix(term.clone(), 0, false),
                        boost * PREFIX_WEIGHT,
                    ));
                }
                if distance > 0 {
                    clauses.push(should(
                        FuzzyTermQuery::new(term, distance, true),
                        boost * FUZZY_WEIGHT,
                    ));
                }
            }
        }

        let hits = corpus.rank(&BooleanQuery::new(clauses), limit)?;
        debug!(query = text, hits = hits.len(), "index query");
        Ok(hits)
    }

    /// Completion candidates for the last token of `partial`.
    ///
    /// Indexed terms the token prefixes are returned, the ones found in the
    /// most entries first. Earlier tokens of `partial` are kept as a leading
    /// phrase: `"login time"` may suggest `"login timeout"`.
    pub fn completions(&self, partial: &str, limit: usize) -> Result<Vec<String>> {
        let Some(corpus) = &self.corpus else {
            return Ok(Vec::new());
        };
        let tokens = tokenize(partial);
        let Some((last, head)) = tokens.split_last() else {
            return Ok(Vec::new());
        };

        let mut counted: Vec<(usize, String)> = Vec::new();
        for term in corpus.terms_with_prefix(last)? {
            // Deleted documents keep their terms until a merge.
            let docs = corpus.doc_count(&term)?;
            if docs > 0 {
                counted.push((docs, term));
            }
        }
        counted.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

        let lead = head.join(" ");
        Ok(counted
            .into_iter()
            .take(limit)
            .map(|(_, term)| {
                if lead.is_empty() {
                    term
                } else {
                    format!("{} {}", lead, term)
                }
            })
            .collect())
    }

    fn max_edit_distance(&self, token_len: usize) -> u8 {
        let d = (token_len as f64 * self.options.fuzzy).round().max(0.0);
        (d.min(MAX_FUZZY_DISTANCE as f64)) as u8
    }
}

impl Default for SearchIndex {
    fn default() -> Self {
        Self::new(IndexOptions::default())
    }
}
