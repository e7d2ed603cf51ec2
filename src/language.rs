//! Supported chat languages and the localized strings the session needs

use crate::error::{Result, SessionError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of languages the backend understands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Pl,
    Es,
}

impl Language {
    /// All supported languages in display order
    pub const ALL: [Language; 3] = [Language::En, Language::Pl, Language::Es];

    /// Wire code sent to the backend (`en`, `pl`, `es`)
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Pl => "pl",
            Language::Es => "es",
        }
    }

    /// Native display name
    pub fn name(&self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Pl => "Polski",
            Language::Es => "Español",
        }
    }

    /// UI strings for this language
    pub fn strings(&self) -> &'static Translations {
        match self {
            Language::En => &EN,
            Language::Pl => &PL,
            Language::Es => &ES,
        }
    }

    /// Text of the system entry appended when switching to this language
    pub fn changed_notice(&self) -> String {
        format!("{} {}", self.strings().language_selected, self.name())
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Language::En),
            "pl" => Ok(Language::Pl),
            "es" => Ok(Language::Es),
            _ => Err(SessionError::UnsupportedLanguage(s.to_string())),
        }
    }
}

/// Localized strings surfaced by the session layer
#[derive(Debug)]
pub struct Translations {
    /// Prefix of the "language changed" system entry
    pub language_selected: &'static str,
    /// Shown when the transport fails to connect
    pub connection_error: &'static str,
    /// Label of the manual retry control
    pub retry_connection: &'static str,
    /// Prompt shown before a language has been chosen
    pub select_language: &'static str,
    /// Quick-start chips offered on an empty conversation
    pub suggestions: [&'static str; 4],
}

static EN: Translations = Translations {
    language_selected: "Language changed to",
    connection_error: "Failed to connect to chatbot. Please try again.",
    retry_connection: "Retry Connection",
    select_language: "Choose your preferred language:",
    suggestions: [
        "Student ID Help",
        "Course Information",
        "Campus Services",
        "Academic Support",
    ],
};

static PL: Translations = Translations {
    language_selected: "Język zmieniony na",
    connection_error: "Nie udało się połączyć z chatbotem. Spróbuj ponownie.",
    retry_connection: "Ponów połączenie",
    select_language: "Wybierz preferowany język:",
    suggestions: [
        "Pomoc z legitymacją",
        "Informacje o kursach",
        "Usługi kampusowe",
        "Wsparcie akademickie",
    ],
};

static ES: Translations = Translations {
    language_selected: "Idioma cambiado a",
    connection_error: "Error al conectar con el chatbot. Inténtalo de nuevo.",
    retry_connection: "Reintentar conexión",
    select_language: "Elige tu idioma preferido:",
    suggestions: [
        "Ayuda con ID estudiantil",
        "Información de cursos",
        "Servicios del campus",
        "Apoyo académico",
    ],
};
