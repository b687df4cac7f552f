//! Signal synthesis and narrative enrichment.

pub mod narrative;
pub mod openai;
pub mod synthesizer;

pub use narrative::{
    build_prompt, fallback_narrative, parse_narrative, Narrative, NarrativeContext,
    NarrativeError, NarrativeProvider,
};
pub use openai::{OpenAiNarrative, OpenAiSettings};
pub use synthesizer::{decide, indicators_for, price_levels, synthetic_indicators, vote, SignalSynthesizer, Votes};
