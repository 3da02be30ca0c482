//! Index des références croisées entre groupes
//!
//! Le cache est partagé : un même fichier peut figurer dans la file de
//! plusieurs groupes, ou être lu par plusieurs groupes à la fois. L'index
//! dit, pour chaque chemin, quels groupes le référencent encore. Il est
//! reconstruit pour un groupe après chaque mutation de sa session.

use crate::group::{GroupId, GroupSession};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
pub(crate) struct ReferenceIndex {
    /// chemin -> groupes dont la file ou le curseur référence le fichier
    referenced: HashMap<PathBuf, HashSet<GroupId>>,
    /// chemin -> groupes en train de lire le fichier
    playing: HashMap<PathBuf, HashSet<GroupId>>,
}

impl ReferenceIndex {
    /// Remplace les références d'un groupe par celles de sa session
    pub(crate) fn rebuild_group(&mut self, session: &GroupSession) {
        let group = session.id();
        self.remove_group(group);

        for path in session.referenced_paths() {
            self.referenced.entry(path).or_default().insert(group.clone());
        }
        if let Some(item) = session.now_playing() {
            self.playing
                .entry(item.path().to_path_buf())
                .or_default()
                .insert(group.clone());
        }
    }

    /// Retire toutes les références d'un groupe
    pub(crate) fn remove_group(&mut self, group: &GroupId) {
        for map in [&mut self.referenced, &mut self.playing] {
            map.retain(|_, groups| {
                groups.remove(group);
                !groups.is_empty()
            });
        }
    }

    pub(crate) fn is_referenced(&self, path: &Path) -> bool {
        self.referenced.contains_key(path)
    }

    pub(crate) fn is_playing(&self, path: &Path) -> bool {
        self.playing.contains_key(path)
    }

    /// Groupes référençant un fichier
    pub(crate) fn groups_for(&self, path: &Path) -> Vec<GroupId> {
        let mut groups: Vec<_> = self
            .referenced
            .get(path)
            .map(|groups| groups.iter().cloned().collect())
            .unwrap_or_default();
        groups.sort();
        groups
    }
}
