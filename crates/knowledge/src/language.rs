//! Statistical language identification.

use serde::{Deserialize, Serialize};
use whatlang::Lang;

/// Shorter inputs are too ambiguous to classify.
const MIN_DETECTABLE_CHARS: usize = 10;

/// ISO 639-1 code (or 639-3 when no two-letter code is mapped) plus detector confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedLanguage {
    pub code: String,
    pub confidence: f32,
}

impl DetectedLanguage {
    pub fn english(confidence: f32) -> Self {
        Self {
            code: "en".to_string(),
            confidence,
        }
    }

    pub fn is_english(&self) -> bool {
        self.code == "en"
    }
}

/// Detect the language of `text`, defaulting to English with zero confidence.
pub fn detect_language(text: &str) -> DetectedLanguage {
    let trimmed = text.trim();
    if trimmed.chars().count() < MIN_DETECTABLE_CHARS {
        return DetectedLanguage::english(0.0);
    }

    match whatlang::detect(trimmed) {
        Some(info) => DetectedLanguage {
            code: iso_code(info.lang()),
            confidence: info.confidence() as f32,
        },
        None => DetectedLanguage::english(0.0),
    }
}

fn iso_code(lang: Lang) -> String {
    let code = match lang {
        Lang::Eng => "en",
        Lang::Hin => "hi",
        Lang::Mar => "mr",
        Lang::Ben => "bn",
        Lang::Tam => "ta",
        Lang::Tel => "te",
        Lang::Urd => "ur",
        Lang::Spa => "es",
        Lang::Fra => "fr",
        Lang::Deu => "de",
        Lang::Por => "pt",
        Lang::Ita => "it",
        Lang::Nld => "nl",
        Lang::Rus => "ru",
        Lang::Tur => "tr",
        Lang::Ara => "ar",
        Lang::Cmn => "zh",
        Lang::Jpn => "ja",
        Lang::Kor => "ko",
        other => other.code(),
    };
    code.to_string()
}

/// English name of a language code, used in generation instructions.
pub fn language_name(code: &str) -> String {
    let name = match code.to_lowercase().as_str() {
        "en" => "English",
        "hi" => "Hindi",
        "mr" => "Marathi",
        "bn" => "Bengali",
        "ta" => "Tamil",
        "te" => "Telugu",
        "ur" => "Urdu",
        "es" => "Spanish",
        "fr" => "French",
        "de" => "German",
        "pt" => "Portuguese",
        "it" => "Italian",
        "nl" => "Dutch",
        "ru" => "Russian",
        "tr" => "Turkish",
        "ar" => "Arabic",
        "zh" => "Chinese",
        "ja" => "Japanese",
        "ko" => "Korean",
        _ => return code.to_string(),
    };
    name.to_string()
}
