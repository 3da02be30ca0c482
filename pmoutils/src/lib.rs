//! Utilitaires partagés par les crates PMOBot.
//!
//! - [`duration`] : conversion secondes ⇄ `H:MM:SS` / `MM:SS`
//! - [`store`] : stockage clé/valeur JSON sur disque
//!
//! # Examples
//!
//! ```
//! use pmoutils::{format_duration, parse_duration};
//!
//! assert_eq!(format_duration(3661), "01:01:01");
//! assert_eq!(parse_duration("01:01:01").unwrap(), 3661);
//! ```
pub mod duration;
pub mod store;

pub use duration::{
    ParseDurationError, UNDEFINED_DURATION, format_duration, normalize_duration, parse_duration,
};
pub use store::{JsonStore, StoreError};

/// Retourne une chaîne décrivant le système d'exploitation et sa version.
///
/// Utilisée dans l'User-Agent des clients HTTP.
///
/// # Format
/// - macOS: "macOS/15.1" ou "Mac OS/10.15.7"
/// - Linux: "Linux/6.5.0" ou "Ubuntu/22.04"
/// - Windows: "Windows/10.0.19045"
/// - Autre: "{OS}/Unknown"
pub fn get_os_string() -> String {
    let info = os_info::get();
    let os_type = format!("{:?}", info.os_type());

    // Obtenir la version si disponible
    let version = info.version();
    if version != &os_info::Version::Unknown {
        format!("{}/{}", os_type, version)
    } else {
        format!("{}/Unknown", os_type)
    }
}
