//! Extension de pmoconfig pour les files d'attente

use anyhow::Result;
use pmoconfig::Config;
use serde_yaml::{Number, Value};

/// Trait d'extension pour pmoconfig::Config
pub trait QueueConfigExt {
    /// Longueur maximale des files (`None` : pas de limite)
    ///
    /// La valeur `0` dans le fichier de configuration signifie « illimité ».
    fn get_queue_limit(&self) -> Result<Option<usize>>;

    /// Définit la longueur maximale des files (`None` écrit `0`)
    fn set_queue_limit(&self, limit: Option<usize>) -> Result<()>;
}

impl QueueConfigExt for Config {
    fn get_queue_limit(&self) -> Result<Option<usize>> {
        match self.get_value(&["sessions", "queue_limit"]) {
            Ok(Value::Number(n)) => match n.as_u64() {
                Some(0) => Ok(None),
                Some(limit) => Ok(Some(limit as usize)),
                None => {
                    tracing::warn!("Invalid queue limit {}, queues are unlimited", n);
                    Ok(None)
                }
            },
            _ => Ok(None),
        }
    }

    fn set_queue_limit(&self, limit: Option<usize>) -> Result<()> {
        let n = Number::from(limit.unwrap_or(0));
        self.set_value(&["sessions", "queue_limit"], Value::Number(n))
    }
}
