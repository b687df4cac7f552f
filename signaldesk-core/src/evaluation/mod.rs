//! Signal evaluation rubric.

pub mod scorer;

pub use scorer::{
    alignment_score, evaluate, momentum_score, oscillator_score, trend_confirmation_score,
    trend_strength_score, DEFAULT_PASS_THRESHOLD,
};
