//! Queue : file de lecture ordonnée d'un groupe

use crate::error::{QueueError, Result};
use pmometadata::MediaItem;
use pmoutils::format_duration;
use rand::seq::SliceRandom;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

/// File de lecture d'un groupe
///
/// Les morceaux sont des références partagées vers des [`MediaItem`] dont le
/// cache garde la propriété. La durée totale est tenue à jour à chaque
/// mutation ; la longueur ne dépasse jamais `limit` (les insertions en trop
/// sont refusées, pas tronquées).
///
/// Aucune méthode ne supprime de fichier : celles qui retirent des morceaux
/// retournent les éléments dont c'était la dernière référence dans la file,
/// à charge pour l'appelant de les confier au cache.
#[derive(Debug, Clone, Default)]
pub struct Queue {
    tracks: VecDeque<Arc<MediaItem>>,
    total_duration: u64,
    limit: Option<usize>,
    owner: Option<String>,
}

impl Queue {
    /// Crée une file sans limite
    pub fn new() -> Self {
        Self::default()
    }

    /// Crée une file avec une longueur maximale optionnelle
    pub fn with_limit(limit: Option<usize>) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    /// Associe un propriétaire (étiquette libre, ex: identifiant du groupe)
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Met à jour la longueur maximale
    ///
    /// Les morceaux déjà présents sont conservés : la limite ne s'applique
    /// qu'aux insertions suivantes.
    pub fn set_limit(&mut self, limit: Option<usize>) {
        self.limit = limit;
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Vrai si une insertion serait refusée
    pub fn is_full(&self) -> bool {
        self.limit.is_some_and(|limit| self.tracks.len() >= limit)
    }

    /// Places restantes (`None` si pas de limite)
    pub fn remaining_capacity(&self) -> Option<usize> {
        self.limit
            .map(|limit| limit.saturating_sub(self.tracks.len()))
    }

    /// Somme des durées des morceaux (en secondes)
    pub fn total_duration(&self) -> u64 {
        self.total_duration
    }

    /// Durée totale affichable
    pub fn total_duration_formatted(&self) -> String {
        format_duration(i64::try_from(self.total_duration).unwrap_or(i64::MAX))
    }

    pub fn get(&self, index: usize) -> Option<&Arc<MediaItem>> {
        self.tracks.get(index)
    }

    pub fn front(&self) -> Option<&Arc<MediaItem>> {
        self.tracks.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<MediaItem>> {
        self.tracks.iter()
    }

    /// Copie des références dans l'ordre de lecture
    pub fn snapshot(&self) -> Vec<Arc<MediaItem>> {
        self.tracks.iter().cloned().collect()
    }

    /// Ajoute un morceau en fin de file
    ///
    /// Retourne `false` (file inchangée) si la limite est atteinte.
    pub fn append(&mut self, item: Arc<MediaItem>) -> bool {
        if self.is_full() {
            self.log_refused(&item);
            return false;
        }
        self.total_duration += item.duration_secs();
        self.tracks.push_back(item);
        true
    }

    /// Comme [`Queue::append`], mais en erreur typée
    pub fn try_append(&mut self, item: Arc<MediaItem>) -> Result<()> {
        if self.append(item) {
            Ok(())
        } else {
            Err(self.limit_exceeded())
        }
    }

    /// Insère un morceau à une position (`index == len` ajoute en fin)
    ///
    /// Retourne `Ok(false)` (file inchangée) si la limite est atteinte.
    pub fn insert(&mut self, item: Arc<MediaItem>, index: usize) -> Result<bool> {
        if index > self.tracks.len() {
            return Err(self.out_of_range(index));
        }
        if self.is_full() {
            self.log_refused(&item);
            return Ok(false);
        }
        self.total_duration += item.duration_secs();
        self.tracks.insert(index, item);
        Ok(true)
    }

    fn log_refused(&self, item: &MediaItem) {
        tracing::debug!(
            "Queue {} full ({} tracks), refusing '{}'",
            self.owner.as_deref().unwrap_or("-"),
            self.tracks.len(),
            item.title()
        );
    }

    /// Déplace un morceau : retrait à `from` puis insertion à `to`
    ///
    /// `to` est interprété sur la file après retrait, il doit donc être
    /// strictement inférieur à la longueur.
    pub fn move_item(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.tracks.len();
        if from >= len {
            return Err(self.out_of_range(from));
        }
        if to >= len {
            return Err(self.out_of_range(to));
        }
        if let Some(item) = self.tracks.remove(from) {
            self.tracks.insert(to, item);
        }
        Ok(())
    }

    /// Échange deux positions
    pub fn swap(&mut self, a: usize, b: usize) -> Result<()> {
        for index in [a, b] {
            if index >= self.tracks.len() {
                return Err(self.out_of_range(index));
            }
        }
        self.tracks.swap(a, b);
        Ok(())
    }

    /// Vrai si au moins un autre morceau partage le fichier de celui à `index`
    ///
    /// Le fichier d'un morceau ne peut être supprimé qu'au retrait de sa
    /// dernière référence.
    pub fn is_duplicate(&self, index: usize) -> Result<bool> {
        let item = self
            .tracks
            .get(index)
            .ok_or_else(|| self.out_of_range(index))?;
        Ok(self.count_path(item.path()) > 1)
    }

    /// Vrai si un morceau de la file référence ce fichier
    pub fn contains_path(&self, path: &Path) -> bool {
        self.tracks.iter().any(|item| item.path() == path)
    }

    /// Retire le morceau à `index`
    ///
    /// Ne supprime pas le fichier : l'appelant consulte
    /// [`Queue::is_duplicate`] avant le retrait pour savoir s'il le peut.
    pub fn remove_at(&mut self, index: usize) -> Result<Arc<MediaItem>> {
        let item = self
            .tracks
            .remove(index)
            .ok_or_else(|| self.out_of_range(index))?;
        self.total_duration -= item.duration_secs();
        Ok(item)
    }

    /// Retire et retourne le premier morceau
    pub fn pop_front(&mut self) -> Option<Arc<MediaItem>> {
        let item = self.tracks.pop_front()?;
        self.total_duration -= item.duration_secs();
        Some(item)
    }

    /// Retire tous les morceaux dont le titre diffère de `title_exception`
    ///
    /// Parcours à rebours pour que les indices restent valides. Retourne les
    /// morceaux retirés qui étaient la dernière référence à leur fichier.
    pub fn remove_all_except(&mut self, title_exception: &str) -> Vec<Arc<MediaItem>> {
        self.remove_where(|item| item.title() != title_exception)
    }

    /// Vide la file ; retourne un élément par fichier libéré
    pub fn clear(&mut self) -> Vec<Arc<MediaItem>> {
        self.remove_where(|_| true)
    }

    /// Mélange l'ordre des morceaux
    pub fn shuffle(&mut self) {
        let mut rng = rand::rng();
        self.tracks.make_contiguous().shuffle(&mut rng);
    }

    fn remove_where<F>(&mut self, mut predicate: F) -> Vec<Arc<MediaItem>>
    where
        F: FnMut(&MediaItem) -> bool,
    {
        let mut released = Vec::new();
        for index in (0..self.tracks.len()).rev() {
            if !predicate(&self.tracks[index]) {
                continue;
            }
            let duplicated = self.count_path(self.tracks[index].path()) > 1;
            if let Some(item) = self.tracks.remove(index) {
                self.total_duration -= item.duration_secs();
                if !duplicated {
                    released.push(item);
                }
            }
        }
        released
    }

    fn count_path(&self, path: &Path) -> usize {
        self.tracks.iter().filter(|item| item.path() == path).count()
    }

    fn out_of_range(&self, index: usize) -> QueueError {
        QueueError::IndexOutOfRange {
            index,
            len: self.tracks.len(),
        }
    }

    fn limit_exceeded(&self) -> QueueError {
        QueueError::LimitExceeded {
            limit: self.limit.unwrap_or(self.tracks.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmometadata::SourceKind;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn track(title: &str, path: &str, duration: u64) -> Arc<MediaItem> {
        Arc::new(MediaItem::new(
            title,
            SourceKind::ServiceA,
            title,
            format!("/cache/{}", path),
            duration,
        ))
    }

    fn titles(queue: &Queue) -> Vec<&str> {
        queue.iter().map(|item| item.title()).collect()
    }

    fn assert_duration_invariant(queue: &Queue) {
        let sum: u64 = queue.iter().map(|item| item.duration_secs()).sum();
        assert_eq!(queue.total_duration(), sum);
    }

    #[test]
    fn test_limit_rejects_without_mutation() {
        let mut queue = Queue::with_limit(Some(1));
        assert!(queue.append(track("A", "a", 100)));
        assert!(!queue.append(track("B", "b", 200)));

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.total_duration(), 100);
        assert_eq!(queue.insert(track("C", "c", 5), 0), Ok(false));
        assert_eq!(
            queue.try_append(track("D", "d", 5)),
            Err(QueueError::LimitExceeded { limit: 1 })
        );
        assert_eq!(titles(&queue), vec!["A"]);
    }

    #[test]
    fn test_insert_positions() {
        let mut queue = Queue::new();
        queue.append(track("A", "a", 10));
        queue.append(track("C", "c", 30));

        assert_eq!(queue.insert(track("B", "b", 20), 1), Ok(true));
        assert_eq!(queue.insert(track("D", "d", 40), 3), Ok(true));
        assert_eq!(
            queue.insert(track("E", "e", 50), 9),
            Err(QueueError::IndexOutOfRange { index: 9, len: 4 })
        );

        assert_eq!(titles(&queue), vec!["A", "B", "C", "D"]);
        assert_eq!(queue.total_duration(), 100);
        assert_eq!(queue.total_duration_formatted(), "01:40");
    }

    #[test]
    fn test_move_is_pop_then_insert() {
        let mut queue = Queue::new();
        for name in ["A", "B", "C", "D"] {
            queue.append(track(name, name, 1));
        }

        queue.move_item(0, 2).unwrap();
        assert_eq!(titles(&queue), vec!["B", "C", "A", "D"]);

        queue.move_item(3, 0).unwrap();
        assert_eq!(titles(&queue), vec!["D", "B", "C", "A"]);

        assert!(queue.move_item(4, 0).is_err());
        assert!(queue.move_item(0, 4).is_err());
        assert_eq!(queue.total_duration(), 4);
    }

    #[test]
    fn test_swap() {
        let mut queue = Queue::new();
        for name in ["A", "B", "C"] {
            queue.append(track(name, name, 1));
        }

        queue.swap(0, 2).unwrap();
        assert_eq!(titles(&queue), vec!["C", "B", "A"]);
        queue.swap(1, 1).unwrap();
        assert_eq!(titles(&queue), vec!["C", "B", "A"]);
        assert_eq!(
            queue.swap(0, 3),
            Err(QueueError::IndexOutOfRange { index: 3, len: 3 })
        );
    }

    #[test]
    fn test_is_duplicate() {
        let mut queue = Queue::new();
        queue.append(track("A", "x", 10));
        queue.append(track("B", "x", 10));
        queue.append(track("C", "y", 10));

        assert_eq!(queue.is_duplicate(0), Ok(true));
        assert_eq!(queue.is_duplicate(1), Ok(true));
        assert_eq!(queue.is_duplicate(2), Ok(false));
        assert!(queue.is_duplicate(3).is_err());

        queue.remove_at(0).unwrap();
        assert_eq!(queue.is_duplicate(0), Ok(false));
    }

    #[test]
    fn test_remove_at_updates_duration() {
        let mut queue = Queue::new();
        queue.append(track("A", "a", 100));
        queue.append(track("B", "b", 200));

        let removed = queue.remove_at(1).unwrap();
        assert_eq!(removed.title(), "B");
        assert_eq!(queue.total_duration(), 100);
        assert!(queue.remove_at(1).is_err());
        assert_eq!(queue.pop_front().unwrap().title(), "A");
        assert_eq!(queue.total_duration(), 0);
        assert!(queue.pop_front().is_none());
    }

    #[test]
    fn test_remove_all_except_releases_last_references() {
        let mut queue = Queue::new();
        queue.append(track("Keep", "k", 10));
        queue.append(track("A", "x", 20));
        queue.append(track("B", "x", 30));
        queue.append(track("C", "y", 40));
        queue.append(track("Keep", "k", 10));
        // Même fichier qu'un morceau conservé
        queue.append(track("D", "k", 10));

        let released = queue.remove_all_except("Keep");
        let mut paths: Vec<_> = released
            .iter()
            .map(|item| item.path().to_string_lossy().into_owned())
            .collect();
        paths.sort();

        assert_eq!(titles(&queue), vec!["Keep", "Keep"]);
        assert_eq!(queue.total_duration(), 20);
        assert_eq!(paths, vec!["/cache/x", "/cache/y"]);
    }

    #[test]
    fn test_clear_releases_each_file_once() {
        let mut queue = Queue::with_limit(Some(5)).with_owner("42");
        queue.append(track("A", "x", 20));
        queue.append(track("B", "x", 30));
        queue.append(track("C", "y", 40));

        let released = queue.clear();
        assert_eq!(released.len(), 2);
        assert!(queue.is_empty());
        assert_eq!(queue.total_duration(), 0);
        assert_eq!(queue.owner(), Some("42"));
        assert_eq!(queue.remaining_capacity(), Some(5));
    }

    #[test]
    fn test_shuffle_keeps_members() {
        let mut queue = Queue::new();
        for i in 0..20 {
            queue.append(track(&format!("T{}", i), &format!("t{}", i), i));
        }
        let before = queue.total_duration();
        queue.shuffle();

        let mut names: Vec<_> = titles(&queue).into_iter().map(String::from).collect();
        names.sort();
        let mut expected: Vec<_> = (0..20).map(|i| format!("T{}", i)).collect();
        expected.sort();
        assert_eq!(names, expected);
        assert_eq!(queue.total_duration(), before);
    }

    #[test]
    fn test_duration_invariant_over_random_operations() {
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut queue = Queue::with_limit(Some(8));

            for step in 0..200 {
                let item = track(
                    &format!("T{}", step),
                    &format!("p{}", rng.random_range(0..6)),
                    rng.random_range(0..600),
                );
                let len = queue.len();
                match rng.random_range(0..6) {
                    0 => {
                        queue.append(item);
                    }
                    1 => {
                        let _ = queue.insert(item, rng.random_range(0..=len));
                    }
                    2 if len > 0 => {
                        queue.remove_at(rng.random_range(0..len)).unwrap();
                    }
                    3 if len > 0 => {
                        queue
                            .move_item(rng.random_range(0..len), rng.random_range(0..len))
                            .unwrap();
                    }
                    4 if len > 0 => {
                        queue
                            .swap(rng.random_range(0..len), rng.random_range(0..len))
                            .unwrap();
                    }
                    5 if step % 25 == 0 => {
                        queue.remove_all_except("T0");
                    }
                    _ => {
                        queue.pop_front();
                    }
                }

                assert_duration_invariant(&queue);
                assert!(queue.len() <= 8);
            }
        }
    }
}
