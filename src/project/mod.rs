/// Whole-project analysis and translation.
pub mod analyzer;
pub mod translator;

pub use analyzer::{ProjectInfo, SourceFile, analyze};
pub use translator::{ProjectTranslator, TranslateOptions, TranslationOutcome};
