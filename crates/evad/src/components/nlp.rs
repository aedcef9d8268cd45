//! Text analysis component (`nlp_` methods).

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use eva_protocol::Payload;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use super::{
    COMPONENTS_TARGET, CapabilityComponent, ComponentError, ComponentInitError, decode_args,
    into_payload,
};

const METHODS: &[&str] = &[
    "nlp_analyze_text",
    "nlp_extract_entities",
    "nlp_sentiment_analysis",
    "nlp_generate_embeddings",
];

const CAPABILITIES: &[&str] = &[
    "text_analysis",
    "entity_extraction",
    "sentiment_analysis",
    "embedding_generation",
    "language_detection",
];

/// Width of generated embedding vectors.
pub(crate) const EMBEDDING_DIMENSION: usize = 768;
const EMBEDDING_MODEL: &str = "distilbert-base-uncased";

const POSITIVE_WORDS: &[&str] = &[
    "amazing",
    "best",
    "excellent",
    "fantastic",
    "good",
    "great",
    "happy",
    "love",
    "nice",
    "wonderful",
];

const NEGATIVE_WORDS: &[&str] = &[
    "angry", "awful", "bad", "broken", "hate", "horrible", "poor", "sad", "terrible", "worst",
];

/// Component answering the `nlp_` methods.
#[derive(Debug, Default)]
pub struct NlpProcessor {
    initialized: AtomicBool,
}

impl NlpProcessor {
    /// Creates an uninitialised processor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Deserialize)]
struct TextArgs {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct TextAnalysis {
    word_count: usize,
    char_count: usize,
    sentences: usize,
    language: &'static str,
    complexity_score: f64,
    readability: f64,
}

#[derive(Debug, Serialize, PartialEq)]
struct Entity {
    text: String,
    label: &'static str,
    confidence: f64,
}

#[derive(Debug, Serialize)]
struct EntityExtraction {
    entity_count: usize,
    entities: Vec<Entity>,
}

#[derive(Debug, Serialize)]
struct SentimentScores {
    positive: f64,
    negative: f64,
    neutral: f64,
}

#[derive(Debug, Serialize)]
struct Sentiment {
    sentiment: &'static str,
    confidence: f64,
    scores: SentimentScores,
}

#[derive(Debug, Serialize)]
struct Embedding {
    embedding: Vec<f64>,
    dimension: usize,
    model: &'static str,
}

#[async_trait]
impl CapabilityComponent for NlpProcessor {
    fn name(&self) -> &'static str {
        "nlp"
    }

    async fn initialize(&self) -> Result<(), ComponentInitError> {
        if !self.initialized.swap(true, Ordering::SeqCst) {
            info!(target: COMPONENTS_TARGET, component = "nlp", "NLP processor ready");
        }
        Ok(())
    }

    async fn process(
        &self,
        method: &str,
        data: &Payload,
        _options: &Payload,
    ) -> Result<Payload, ComponentError> {
        match method {
            "nlp_analyze_text" => {
                let args: TextArgs = decode_args(method, data)?;
                into_payload(&analyze_text(&args.text))
            }
            "nlp_extract_entities" => {
                let args: TextArgs = decode_args(method, data)?;
                into_payload(&extract_entities(&args.text))
            }
            "nlp_sentiment_analysis" => {
                let args: TextArgs = decode_args(method, data)?;
                into_payload(&sentiment(&args.text))
            }
            "nlp_generate_embeddings" => {
                let args: TextArgs = decode_args(method, data)?;
                into_payload(&Embedding {
                    embedding: embed(&args.text),
                    dimension: EMBEDDING_DIMENSION,
                    model: EMBEDDING_MODEL,
                })
            }
            other => Err(ComponentError::unknown_method(self.name(), other)),
        }
    }

    fn capabilities(&self) -> &'static [&'static str] {
        CAPABILITIES
    }

    fn methods(&self) -> &'static [&'static str] {
        METHODS
    }
}

fn analyze_text(text: &str) -> TextAnalysis {
    TextAnalysis {
        word_count: text.split_whitespace().count(),
        char_count: text.chars().count(),
        // Counts '.'-separated segments, so unterminated text is one sentence.
        sentences: text.split('.').count(),
        language: "en",
        complexity_score: 0.7,
        readability: 0.8,
    }
}

fn extract_entities(text: &str) -> EntityExtraction {
    let mut entities: Vec<Entity> = Vec::new();
    for token in text.split_whitespace() {
        let word = token.trim_matches(|c: char| !c.is_alphanumeric());
        let capitalised = word.chars().next().is_some_and(char::is_uppercase);
        if capitalised && !entities.iter().any(|entity| entity.text == word) {
            entities.push(Entity {
                text: word.to_owned(),
                label: "PROPER_NOUN",
                confidence: 0.9,
            });
        }
    }
    EntityExtraction {
        entity_count: entities.len(),
        entities,
    }
}

fn sentiment(text: &str) -> Sentiment {
    let (positive, negative) =
        text.split_whitespace()
            .fold((0_u32, 0_u32), |(positive, negative), token| {
                let word = token
                    .trim_matches(|c: char| !c.is_alphanumeric())
                    .to_lowercase();
                if POSITIVE_WORDS.contains(&word.as_str()) {
                    (positive + 1, negative)
                } else if NEGATIVE_WORDS.contains(&word.as_str()) {
                    (positive, negative + 1)
                } else {
                    (positive, negative)
                }
            });

    let total = f64::from(positive + negative);
    if positive + negative == 0 {
        return Sentiment {
            sentiment: "neutral",
            confidence: 0.5,
            scores: SentimentScores {
                positive: 0.0,
                negative: 0.0,
                neutral: 1.0,
            },
        };
    }

    let scores = SentimentScores {
        positive: f64::from(positive) / total,
        negative: f64::from(negative) / total,
        neutral: 0.0,
    };
    let label = match positive.cmp(&negative) {
        std::cmp::Ordering::Greater => "positive",
        std::cmp::Ordering::Less => "negative",
        std::cmp::Ordering::Equal => "neutral",
    };
    Sentiment {
        sentiment: label,
        confidence: scores.positive.max(scores.negative),
        scores,
    }
}

/// Derives a stable vector from the text by hashing it with a block counter.
fn embed(text: &str) -> Vec<f64> {
    let mut values = Vec::with_capacity(EMBEDDING_DIMENSION);
    let mut block: u32 = 0;
    while values.len() < EMBEDDING_DIMENSION {
        let digest = Sha256::new()
            .chain_update(text.as_bytes())
            .chain_update(block.to_le_bytes())
            .finalize();
        for chunk in digest.chunks_exact(4) {
            if values.len() == EMBEDDING_DIMENSION {
                break;
            }
            if let Ok(bytes) = <[u8; 4]>::try_from(chunk) {
                values.push(f64::from(u32::from_le_bytes(bytes)) / f64::from(u32::MAX));
            }
        }
        block += 1;
    }
    values
}
