//! Téléchargement en deux temps : `{pk}.part` puis renommage
//!
//! Le fichier n'existe sous son nom final qu'après réception complète du
//! corps. Une erreur ou une annulation supprime le fichier partiel : le cache
//! ne voit jamais un téléchargement incomplet.
//!
//! Chaque tentative a son propre fichier partiel (`{pk}.{n}.part`) : deux
//! téléchargements simultanés de la même source ne se gênent pas, et
//! l'annulation de l'un laisse l'autre intact.

use crate::error::{Result, SourceError};
use futures::StreamExt;
use pmometadata::SourceKind;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

/// Extension des fichiers en cours de téléchargement
pub const STAGING_EXTENSION: &str = "part";

/// Numéro de tentative, unique dans le processus
static ATTEMPT: AtomicU64 = AtomicU64::new(0);

/// Génère une clé de fichier à partir de la source
///
/// Les 16 premiers octets du SHA-256 de `{kind}:{id}`, en hexadécimal : la
/// même source donne toujours le même nom de fichier.
///
/// # Exemple
///
/// ```
/// use pmometadata::SourceKind;
/// use pmosource::pk_from_source;
///
/// let pk = pk_from_source(SourceKind::ServiceA, "abc");
/// assert_eq!(pk.len(), 32);  // 16 octets = 32 caractères hex
/// assert_eq!(pk, pk_from_source(SourceKind::ServiceA, "abc"));
/// ```
pub fn pk_from_source(kind: SourceKind, source_id: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(kind.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(source_id.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..16])
}

/// Chemin du fichier partiel de la tentative `attempt`
pub fn staged_path(dest_dir: &Path, pk: &str, attempt: u64) -> PathBuf {
    dest_dir.join(format!("{}.{}.{}", pk, attempt, STAGING_EXTENSION))
}

/// Chemin final du fichier
pub fn final_path(dest_dir: &Path, pk: &str, extension: &str) -> PathBuf {
    dest_dir.join(format!("{}.{}", pk, extension))
}

/// Télécharge `url` vers `dest_dir/{pk}.{extension}`
///
/// # Returns
///
/// Le chemin final. En cas d'erreur ou d'annulation, le fichier `.part` est
/// supprimé et aucun fichier final n'est créé.
pub async fn download_staged(
    client: &Client,
    url: &str,
    dest_dir: &Path,
    pk: &str,
    extension: &str,
    cancel: &CancellationToken,
) -> Result<PathBuf> {
    if cancel.is_cancelled() {
        return Err(SourceError::Cancelled);
    }

    tokio::fs::create_dir_all(dest_dir).await?;
    let part = staged_path(dest_dir, pk, ATTEMPT.fetch_add(1, Ordering::Relaxed));

    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SourceError::Cancelled),
        r = fetch_to_file(client, url, &part) => r,
    };

    let written = match result {
        Ok(written) => written,
        Err(e) => {
            remove_partial(&part).await;
            return Err(e);
        }
    };

    // Une tentative concurrente a déjà produit le fichier complet
    let target = final_path(dest_dir, pk, extension);
    if tokio::fs::try_exists(&target).await.unwrap_or(false) {
        tracing::debug!("{} already downloaded, dropping duplicate", target.display());
        remove_partial(&part).await;
        return Ok(target);
    }

    if let Err(e) = tokio::fs::rename(&part, &target).await {
        remove_partial(&part).await;
        return Err(e.into());
    }

    tracing::info!("Downloaded {} ({} bytes) to {}", url, written, target.display());
    Ok(target)
}

async fn fetch_to_file(client: &Client, url: &str, part: &Path) -> Result<u64> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::from_status_code(status.as_u16(), url));
    }

    let expected = response.content_length();
    let mut file = tokio::fs::File::create(part).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    if let Some(expected) = expected {
        if written != expected {
            return Err(SourceError::Transient(format!(
                "Truncated body for {}: {} of {} bytes",
                url, written, expected
            )));
        }
    }

    Ok(written)
}

async fn remove_partial(part: &Path) {
    match tokio::fs::remove_file(part).await {
        Ok(()) => tracing::debug!("Removed partial download {}", part.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove partial download {}: {}", part.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pk_depends_on_kind_and_id() {
        let a = pk_from_source(SourceKind::ServiceA, "x");
        assert_ne!(a, pk_from_source(SourceKind::ServiceB, "x"));
        assert_ne!(a, pk_from_source(SourceKind::ServiceA, "y"));
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_paths() {
        let dir = Path::new("/cache");
        assert_eq!(staged_path(dir, "ab", 7), PathBuf::from("/cache/ab.7.part"));
        assert_eq!(final_path(dir, "ab", "mp3"), PathBuf::from("/cache/ab.mp3"));
    }
}
