//! Conversion entre une durée en secondes et sa forme affichable
//!
//! Les chaînes produites ici sont persistées dans les enregistrements de
//! groupe et affichées telles quelles par la couche chat : la règle de
//! remplissage doit rester stable.
//!
//! - `format_duration(3661)` → `"01:01:01"`
//! - `format_duration(59)` → `"00:59"`
//! - `format_duration(0)` → [`UNDEFINED_DURATION`]

/// Valeur affichée pour une durée nulle ou négative
pub const UNDEFINED_DURATION: &str = "undefined";

/// Erreurs de lecture d'une durée affichable
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseDurationError {
    #[error("Empty duration")]
    Empty,

    #[error("Too many fields in duration '{0}' (expected at most H:MM:SS)")]
    TooManyFields(String),

    #[error("Invalid field '{field}' in duration '{text}'")]
    InvalidField { text: String, field: String },
}

/// Formate un nombre de secondes en `MM:SS` ou `H:MM:SS`
///
/// Minutes et secondes sont toujours sur deux chiffres. Le champ des heures
/// est omis quand il vaut zéro, complété à deux chiffres en dessous de 10,
/// et laissé tel quel au-delà.
pub fn format_duration(seconds: i64) -> String {
    if seconds <= 0 {
        return UNDEFINED_DURATION.to_string();
    }

    let hours = seconds / 3600;
    let minutes = (seconds / 60) % 60;
    let secs = seconds % 60;

    if hours == 0 {
        format!("{:02}:{:02}", minutes, secs)
    } else if hours < 10 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    }
}

/// Lit une durée affichable et retourne le nombre de secondes
///
/// Un champ seul est lu comme des secondes, deux champs comme `MM:SS`, trois
/// comme `H:MM:SS`. Les valeurs ≥ 60 sont reportées sur l'unité supérieure
/// (de droite à gauche), les heures ne sont pas plafonnées. La valeur
/// [`UNDEFINED_DURATION`] vaut 0.
pub fn parse_duration(text: &str) -> Result<i64, ParseDurationError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ParseDurationError::Empty);
    }
    if text == UNDEFINED_DURATION {
        return Ok(0);
    }

    let fields: Vec<&str> = text.split(':').collect();
    if fields.len() > 3 {
        return Err(ParseDurationError::TooManyFields(text.to_string()));
    }

    // [heures, minutes, secondes], alignés à droite
    let mut values = [0i64; 3];
    let offset = 3 - fields.len();
    for (i, field) in fields.iter().enumerate() {
        let value = field
            .trim()
            .parse::<u32>()
            .map_err(|_| ParseDurationError::InvalidField {
                text: text.to_string(),
                field: field.to_string(),
            })?;
        values[offset + i] = i64::from(value);
    }

    let [mut hours, mut minutes, mut secs] = values;
    minutes += secs / 60;
    secs %= 60;
    hours += minutes / 60;
    minutes %= 60;

    Ok(hours * 3600 + minutes * 60 + secs)
}

/// Réécrit une durée affichable sous sa forme canonique
pub fn normalize_duration(text: &str) -> Result<String, ParseDurationError> {
    parse_duration(text).map(format_duration)
}
