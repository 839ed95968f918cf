//! Types d'erreurs pour le crate bcdc

use thiserror::Error;

/// Erreurs pouvant survenir lors des échanges avec le catalogue ou le WFS
#[derive(Debug, Error)]
pub enum BcdcError {
    /// Erreur de transport HTTP (connexion, timeout, TLS)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Réponse HTTP en erreur
    #[error("HTTP {status} from {url}: {message}")]
    Status {
        status: u16,
        url: String,
        message: String,
    },

    /// Rapport d'exception OGC renvoyé par le service
    #[error("Service exception: {0}")]
    Service(String),

    /// Réponse illisible
    #[error("Failed to decode {what}: {reason}")]
    Decode { what: String, reason: String },

    /// Jeu de données introuvable dans le catalogue et le WFS
    #[error("Dataset not found: {0}")]
    DatasetNotFound(String),

    /// Emprise invalide
    #[error("{0:?} is not a valid bounding box representation")]
    InvalidBounds(String),

    /// Système de coordonnées non reconnu
    #[error("Invalid CRS: {0}")]
    InvalidCrs(String),

    /// Erreur d'I/O (cache des tables)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BcdcError {
    /// Crée une erreur de décodage avec contexte
    pub fn decode(what: impl Into<String>, reason: impl ToString) -> Self {
        Self::Decode {
            what: what.into(),
            reason: reason.to_string(),
        }
    }

    /// Indique si l'erreur est transitoire (nouvelle tentative possible)
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T, E = BcdcError> = std::result::Result<T, E>;
