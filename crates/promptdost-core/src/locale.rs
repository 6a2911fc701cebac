//! User-facing copy in the supported languages.
//!
//! Hindi is the default; it is what the web app ships with.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Locale {
    #[default]
    #[serde(rename = "hi")]
    Hindi,
    #[serde(rename = "en")]
    English,
}

/// Every message shown to end users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    IdeaEmpty,
    IdeaTooShort,
    AllBackendsBusy,
    SomethingWentWrong,
}

impl From<&ValidationError> for Message {
    fn from(err: &ValidationError) -> Self {
        match err {
            ValidationError::Missing => Message::IdeaEmpty,
            ValidationError::TooShort { .. } => Message::IdeaTooShort,
        }
    }
}

impl Locale {
    pub fn text(self, message: Message) -> &'static str {
        use Message::*;
        match (self, message) {
            (Locale::Hindi, IdeaEmpty) => "कृपया कोई विचार लिखें!",
            (Locale::Hindi, IdeaTooShort) => "कृपया कम से कम 3 अक्षरों का विचार लिखें।",
            (Locale::Hindi, AllBackendsBusy) => "सभी मॉडल्स व्यस्त हैं। कृपया बाद में प्रयास करें।",
            (Locale::Hindi, SomethingWentWrong) => "कुछ गड़बड़ हुई।",
            (Locale::English, IdeaEmpty) => "Please write an idea!",
            (Locale::English, IdeaTooShort) => "Please write an idea of at least 3 characters.",
            (Locale::English, AllBackendsBusy) => "All models are busy. Please try again later.",
            (Locale::English, SomethingWentWrong) => "Something went wrong.",
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Locale::Hindi => "hi",
            Locale::English => "en",
        }
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hi" | "hindi" => Ok(Locale::Hindi),
            "en" | "english" => Ok(Locale::English),
            other => Err(format!("unsupported locale '{}'", other)),
        }
    }
}
