//! Prompt types for sift.

use serde::{Deserialize, Serialize};
use sift_core::AppError;
use std::fmt;
use std::str::FromStr;

/// Response style requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    Academic,
    Executive,
    Eli5,
    Technical,
    Debate,
    Legal,
    Medical,
    Creative,
    #[default]
    Standard,
}

/// Generation budget attached to a persona.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PersonaSettings {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Persona {
    pub const ALL: [Persona; 9] = [
        Persona::Academic,
        Persona::Executive,
        Persona::Eli5,
        Persona::Technical,
        Persona::Debate,
        Persona::Legal,
        Persona::Medical,
        Persona::Creative,
        Persona::Standard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Persona::Academic => "academic",
            Persona::Executive => "executive",
            Persona::Eli5 => "eli5",
            Persona::Technical => "technical",
            Persona::Debate => "debate",
            Persona::Legal => "legal",
            Persona::Medical => "medical",
            Persona::Creative => "creative",
            Persona::Standard => "standard",
        }
    }

    pub fn settings(&self) -> PersonaSettings {
        let (max_tokens, temperature) = match self {
            Persona::Academic => (600, 0.2),
            Persona::Executive => (200, 0.1),
            Persona::Eli5 => (400, 0.4),
            Persona::Technical => (700, 0.2),
            Persona::Debate => (500, 0.3),
            Persona::Legal => (600, 0.1),
            Persona::Medical => (500, 0.15),
            Persona::Creative => (600, 0.6),
            Persona::Standard => (500, 0.3),
        };
        PersonaSettings {
            max_tokens,
            temperature,
        }
    }

    /// Style instructions appended to the answer prompt.
    pub fn instructions(&self) -> &'static str {
        match self {
            Persona::Academic => {
                "Respond in a formal academic style:\n\
                 - Use precise, scholarly language\n\
                 - Cite [1], [2], etc. for every claim\n\
                 - Include nuance, caveats and limitations\n\
                 - Structure the answer as a thesis with supporting arguments"
            }
            Persona::Executive => {
                "Respond as an executive summary:\n\
                 - At most 3-4 bullet points\n\
                 - Lead with the key takeaway\n\
                 - Business-friendly language, no jargon\n\
                 - Close with a bottom-line recommendation"
            }
            Persona::Eli5 => {
                "Explain it like I'm 5:\n\
                 - Very simple everyday words and short sentences\n\
                 - Use relatable analogies and examples\n\
                 - Avoid technical terms entirely"
            }
            Persona::Technical => {
                "Provide a technical deep-dive:\n\
                 - Include specific data, formulas or code where relevant\n\
                 - Use precise technical terminology\n\
                 - Explain the underlying mechanisms and methods"
            }
            Persona::Debate => {
                "Present a balanced debate view:\n\
                 - List every perspective found in the evidence\n\
                 - Note which sources support each position\n\
                 - Highlight agreement and disagreement\n\
                 - Do not favor any side; let the reader decide"
            }
            Persona::Legal => {
                "Respond in a formal legal style:\n\
                 - Use precise legal terminology where appropriate\n\
                 - Reference source documents explicitly and avoid unfounded claims\n\
                 - End with: \"This information is for educational purposes only and does not constitute legal advice.\""
            }
            Persona::Medical => {
                "Respond in a clinical style:\n\
                 - Accurate medical terminology with lay explanations\n\
                 - Include appropriate safety warnings and note limitations\n\
                 - Include: \"Consult a qualified healthcare provider for personalized medical advice.\""
            }
            Persona::Creative => {
                "Respond in an engaging, creative style:\n\
                 - Use vivid language, analogies and storytelling\n\
                 - Stay accurate while keeping the reader interested"
            }
            Persona::Standard => "Answer briefly and cite sources [1], [2], etc.",
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Persona {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Persona::ALL
            .into_iter()
            .find(|persona| persona.as_str() == wanted)
            .ok_or_else(|| {
                AppError::InvalidInput(format!(
                    "Unknown persona '{}'. Expected one of: {}",
                    s,
                    Persona::ALL.map(|p| p.as_str()).join(", ")
                ))
            })
    }
}

/// How the answer prompt is framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptMode {
    Confident,
    Cautious,
    Conflict,
}

/// One evidence excerpt shown to the generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub source: String,
    pub text: String,
}

/// One side of a detected contradiction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerspectiveItem {
    pub source: String,
    pub claim: String,
}

/// One web search result shown to the generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebItem {
    pub name: String,
    pub title: String,
    pub snippet: String,
}

/// Everything the answer prompt is rendered from.
#[derive(Debug, Clone)]
pub struct AnswerPromptInput {
    pub query: String,
    pub persona: Persona,
    pub mode: PromptMode,
    pub evidence: Vec<EvidenceItem>,
    pub perspectives: Vec<PerspectiveItem>,
    pub web: Vec<WebItem>,
    /// Human-readable language name the answer must be written in
    pub response_language: Option<String>,
}

/// A fully built prompt ready for generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPrompt {
    /// User message (required)
    pub user: String,

    /// Metadata about the built prompt
    pub metadata: BuiltPromptMetadata,
}

/// Metadata about a built prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuiltPromptMetadata {
    pub persona: Persona,
    pub mode: PromptMode,
    pub evidence_items: usize,
    pub perspective_items: usize,
    pub web_items: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persona_parsing() {
        assert_eq!("debate".parse::<Persona>().unwrap(), Persona::Debate);
        assert_eq!(" ELI5 ".parse::<Persona>().unwrap(), Persona::Eli5);
        let err = "pirate".parse::<Persona>().unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_persona_budgets() {
        assert_eq!(Persona::Executive.settings().max_tokens, 200);
        assert_eq!(Persona::Technical.settings().max_tokens, 700);
        assert_eq!(Persona::Creative.settings().temperature, 0.6);
        assert_eq!(Persona::default(), Persona::Standard);
    }

    #[test]
    fn test_every_persona_has_instructions() {
        for persona in Persona::ALL {
            assert!(!persona.instructions().is_empty(), "{}", persona);
        }
    }

    #[test]
    fn test_persona_serde_names() {
        let json = serde_json::to_string(&Persona::Eli5).unwrap();
        assert_eq!(json, "\"eli5\"");
    }
}
