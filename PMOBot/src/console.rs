//! Pilote console : une commande par ligne sur l'entrée standard
//!
//! Remplace localement la passerelle de discussion. Les indices saisis
//! commencent à 1, comme dans la liste affichée par `queue`.

use anyhow::{Result, anyhow, bail};
use pmosession::{Error, GroupId, SessionManager};
use pmosource::SourceError;
use std::collections::HashSet;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Groupe actif au démarrage
pub const DEFAULT_GROUP: &str = "console";

const HELP: &str = "\
Commands:
  play <source> [position]   queue a track (service_x:id or a service URL)
  next                       finish the current track and play the next one
  skip                       cancel downloads and play the next track
  stop                       stop playback, keep the queue
  queue                      show the queue
  remove <n>                 remove track n
  move <from> <to>           move a track
  swap <a> <b>               swap two tracks
  clear                      empty the queue
  keep <title>               remove every track with another title
  shuffle                    shuffle the queue
  volume <0-200>             set the group volume
  cancel                     cancel running downloads
  reset                      drop the group state and its saved record
  group [id]                 show or switch the active group
  help                       show this help
  quit                       save and exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Play {
        input: String,
        position: Option<usize>,
    },
    Next,
    Skip,
    Stop,
    Queue,
    Remove(usize),
    Move(usize, usize),
    Swap(usize, usize),
    Clear,
    Keep(String),
    Shuffle,
    Volume(i64),
    Cancel,
    Reset,
    Group(Option<String>),
    Help,
    Quit,
}

impl Command {
    /// Analyse une ligne de commande ; `None` pour une ligne vide
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        let Some((name, rest)) = split_word(line) else {
            return Ok(None);
        };
        let args: Vec<&str> = rest.split_whitespace().collect();

        let command = match name.to_lowercase().as_str() {
            "play" | "p" => match args.as_slice() {
                [input] => Command::Play {
                    input: input.to_string(),
                    position: None,
                },
                [input, position] => Command::Play {
                    input: input.to_string(),
                    position: Some(parse_index(position)?),
                },
                _ => bail!("Usage: play <source> [position]"),
            },
            "next" | "n" => Command::Next,
            "skip" | "s" => Command::Skip,
            "stop" => Command::Stop,
            "queue" | "q" => Command::Queue,
            "remove" | "rm" => match args.as_slice() {
                [index] => Command::Remove(parse_index(index)?),
                _ => bail!("Usage: remove <n>"),
            },
            "move" | "mv" => match args.as_slice() {
                [from, to] => Command::Move(parse_index(from)?, parse_index(to)?),
                _ => bail!("Usage: move <from> <to>"),
            },
            "swap" => match args.as_slice() {
                [a, b] => Command::Swap(parse_index(a)?, parse_index(b)?),
                _ => bail!("Usage: swap <a> <b>"),
            },
            "clear" => Command::Clear,
            "keep" if !rest.is_empty() => Command::Keep(rest.to_string()),
            "keep" => bail!("Usage: keep <title>"),
            "shuffle" => Command::Shuffle,
            "volume" | "vol" => match args.as_slice() {
                [volume] => Command::Volume(
                    volume
                        .parse()
                        .map_err(|_| anyhow!("Invalid volume '{}'", volume))?,
                ),
                _ => bail!("Usage: volume <0-200>"),
            },
            "cancel" => Command::Cancel,
            "reset" => Command::Reset,
            "group" | "g" => Command::Group(args.first().map(|id| id.to_string())),
            "help" | "h" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => bail!("Unknown command '{}' (try 'help')", other),
        };
        Ok(Some(command))
    }
}

fn split_word(line: &str) -> Option<(&str, &str)> {
    if line.is_empty() {
        return None;
    }
    match line.split_once(char::is_whitespace) {
        Some((word, rest)) => Some((word, rest.trim())),
        None => Some((line, "")),
    }
}

/// Indice saisi (à partir de 1) vers indice de file (à partir de 0)
fn parse_index(text: &str) -> Result<usize> {
    match text.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n - 1),
        _ => bail!("Invalid position '{}' (positions start at 1)", text),
    }
}

/// Message affiché pour une erreur de session
pub fn describe_error(error: &Error) -> String {
    match error {
        Error::CapacityExceeded { capacity } => format!(
            "The media cache is full ({} tracks are in use). Try again once a track has finished.",
            capacity
        ),
        Error::IndexOutOfRange { index, len } => format!(
            "There is no track #{} (the queue has {} tracks).",
            index + 1,
            len
        ),
        Error::LimitExceeded { limit } => {
            format!("The queue is full ({} tracks maximum).", limit)
        }
        Error::FileMissing(_) => {
            "The track could not be retrieved again and was dropped.".to_string()
        }
        Error::CorruptRecord { key, .. } => format!(
            "The saved state of this group is damaged ({}). Use 'reset' to start over.",
            key
        ),
        Error::VolumeOutOfRange(volume) => {
            format!("Volume {} is out of range (0-200).", volume)
        }
        Error::Source(SourceError::Cancelled) => "Download cancelled.".to_string(),
        Error::Source(SourceError::NotFound(id)) => format!("Nothing found for '{}'.", id),
        Error::Source(SourceError::RateLimited(_)) => {
            "The service is rate limiting us, try again later.".to_string()
        }
        Error::Source(SourceError::Unrecognized(input)) => {
            format!("I don't know how to play '{}'.", input)
        }
        other => format!("Something went wrong: {}", other),
    }
}

/// État du pilote console
pub struct Console {
    manager: SessionManager,
    group: GroupId,
    /// Ajouts en cours de téléchargement
    tasks: JoinSet<()>,
    fetching: HashSet<GroupId>,
}

impl Console {
    pub fn new(manager: SessionManager) -> Self {
        Self {
            manager,
            group: GroupId::from(DEFAULT_GROUP),
            tasks: JoinSet::new(),
            fetching: HashSet::new(),
        }
    }

    /// Lit et exécute les commandes jusqu'à `quit`, la fin de l'entrée ou Ctrl+C
    pub async fn run(&mut self) -> Result<()> {
        println!("PMOBot console, active group '{}'. Type 'help'.", self.group);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            let line = tokio::select! {
                line = lines.next_line() => line?,
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted");
                    break;
                }
            };
            let Some(line) = line else {
                break;
            };

            match Command::parse(&line) {
                Ok(Some(Command::Quit)) => break,
                Ok(Some(command)) => self.execute(command).await,
                Ok(None) => {}
                Err(e) => println!("{}", e),
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Annule les téléchargements lancés par `play` et attend la fin de
    /// leurs tâches : aucune session n'est modifiée après le retour
    pub async fn shutdown(&mut self) {
        if self.tasks.is_empty() {
            return;
        }
        info!("Waiting for {} pending fetch(es)", self.tasks.len());
        for group in self.fetching.drain() {
            self.manager.cancel_download(&group);
        }
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                warn!("Fetch task failed: {}", e);
            }
        }
    }

    /// Nombre de tâches d'ajout pas encore terminées
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    async fn execute(&mut self, command: Command) {
        debug!("Group {}: {:?}", self.group, command);
        let manager = &self.manager;
        let group = &self.group;

        let outcome = match command {
            Command::Play { input, position } => {
                self.spawn_enqueue(input, position);
                Ok(())
            }
            Command::Next => manager.advance(group).await.map(print_now_playing),
            Command::Skip => manager.skip(group).await.map(print_now_playing),
            Command::Stop => manager.stop(group).await.map(|stopped| match stopped {
                Some(item) => println!("Stopped {}", item.title()),
                None => println!("Nothing is playing."),
            }),
            Command::Queue => self.print_queue().await,
            Command::Remove(index) => manager
                .remove(group, index)
                .await
                .map(|item| println!("Removed {}", item.title())),
            Command::Move(from, to) => manager
                .move_item(group, from, to)
                .await
                .map(|_| println!("Moved #{} to #{}", from + 1, to + 1)),
            Command::Swap(a, b) => manager
                .swap(group, a, b)
                .await
                .map(|_| println!("Swapped #{} and #{}", a + 1, b + 1)),
            Command::Clear => manager
                .clear(group)
                .await
                .map(|count| println!("Removed {} tracks", count)),
            Command::Keep(title) => manager
                .remove_all_except(group, &title)
                .await
                .map(|count| println!("Removed {} tracks", count)),
            Command::Shuffle => manager.shuffle(group).await.map(|_| println!("Shuffled")),
            Command::Volume(volume) => manager
                .set_volume(group, volume)
                .await
                .map(|_| println!("Volume set to {}%", volume)),
            Command::Cancel => {
                if manager.cancel_download(group) {
                    println!("Cancelling downloads...");
                } else {
                    println!("No download in progress.");
                }
                Ok(())
            }
            Command::Reset => manager
                .teardown(group)
                .await
                .map(|_| println!("Group {} reset", group)),
            Command::Group(None) => {
                println!("Active group: {}", group);
                println!("Known groups: {:?}", manager.groups().await);
                Ok(())
            }
            Command::Group(Some(id)) => {
                self.group = GroupId::new(id);
                println!("Active group: {}", self.group);
                Ok(())
            }
            Command::Help => {
                println!("{}", HELP);
                Ok(())
            }
            Command::Quit => Ok(()),
        };

        if let Err(e) = outcome {
            println!("{}", describe_error(&e));
        }
    }

    /// Le téléchargement tourne en tâche de fond : `skip` et `cancel`
    /// restent disponibles pendant ce temps
    fn spawn_enqueue(&mut self, input: String, position: Option<usize>) {
        let manager = self.manager.clone();
        let group = self.group.clone();
        println!("Fetching {}...", input);

        // Les tâches terminées ne sont plus à attendre
        while let Some(joined) = self.tasks.try_join_next() {
            if let Err(e) = joined {
                warn!("Fetch task failed: {}", e);
            }
        }
        self.fetching.insert(group.clone());

        self.tasks.spawn(async move {
            match manager.enqueue(&group, &input, position).await {
                Ok(queued) => {
                    let cached = if queued.reused { " (cached)" } else { "" };
                    println!(
                        "[{}] Queued {} at #{}{}",
                        group,
                        queued.item,
                        queued.position + 1,
                        cached
                    );
                    start_if_idle(&manager, &group).await;
                }
                Err(e) => println!("[{}] {}", group, describe_error(&e)),
            }
        });
    }

    async fn print_queue(&self) -> pmosession::Result<()> {
        let snapshot = self.manager.snapshot(&self.group).await?;
        println!(
            "Group {} ({}), volume {}%",
            snapshot.id, snapshot.name, snapshot.volume
        );
        match &snapshot.now_playing {
            Some(item) => println!("Now playing: {}", item),
            None => println!("Now playing: -"),
        }
        if snapshot.queue.is_empty() {
            println!("The queue is empty.");
        }
        for (index, item) in snapshot.queue.iter().enumerate() {
            println!("{:>3}. {}", index + 1, item);
        }
        let limit = snapshot
            .limit
            .map(|limit| format!(" / {}", limit))
            .unwrap_or_default();
        println!(
            "{}{} tracks, total {}",
            snapshot.queue.len(),
            limit,
            snapshot.total_duration_formatted()
        );
        Ok(())
    }
}

/// Lance la lecture si le groupe ne joue rien
async fn start_if_idle(manager: &SessionManager, group: &GroupId) {
    let idle = matches!(manager.snapshot(group).await, Ok(s) if s.now_playing.is_none());
    if idle {
        match manager.advance(group).await {
            Ok(playing) => print_now_playing(playing),
            Err(e) => println!("[{}] {}", group, describe_error(&e)),
        }
    }
}

fn print_now_playing(item: Option<std::sync::Arc<pmometadata::MediaItem>>) {
    match item {
        Some(item) => println!("Now playing {}", item),
        None => println!("The queue is empty, playback stopped."),
    }
}
