//! Administrative and debug surface.
//!
//! Console commands for poking the dialogue system in a live session. None
//! of this is needed for correct play.

use std::str::FromStr;

use guds_core::DialogueManager;
use guds_core::types::{ActionId, GameTime, SpeakerId};
use guds_core::world::DialogueWorld;
use tracing::info;

use crate::error::{GameError, Result};

/// One debug command, applied to the bank of a named speaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugCommand {
    /// `Action <id>`: speak a line of the action now.
    Action(ActionId),
    /// `LoadAll`: queue every variety of the bank.
    LoadAll,
    /// `UnloadAll`: drop every variety of the bank.
    UnloadAll,
    /// `LoadRandom <n> [NOCLEAR]`: load `n` random varieties, first
    /// unloading as many unless `NOCLEAR` is given.
    LoadRandom {
        /// How many.
        count: usize,
        /// Keep the resident varieties.
        keep_existing: bool,
    },
    /// `Load <idx>`: load one variety.
    Load(usize),
    /// `FlushAll`: flush every bank.
    FlushAll,
}

impl FromStr for DebugCommand {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || GameError::BadCommand(s.to_string());
        let mut words = s.split_whitespace();
        let verb = words.next().ok_or_else(bad)?;
        let mut number = || -> Result<usize> {
            words.next().and_then(|w| w.parse().ok()).ok_or_else(bad)
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "action" => {
                let id = u16::try_from(number()?).map_err(|_| bad())?;
                Self::Action(ActionId(id))
            }
            "loadall" => Self::LoadAll,
            "unloadall" => Self::UnloadAll,
            "loadrandom" => {
                let count = number()?;
                let keep_existing = s
                    .split_whitespace()
                    .nth(2)
                    .is_some_and(|w| w.eq_ignore_ascii_case("noclear"));
                Self::LoadRandom { count, keep_existing }
            }
            "load" => Self::Load(number()?),
            "flushall" => Self::FlushAll,
            _ => return Err(bad()),
        };
        Ok(command)
    }
}

/// First speaker whose name contains `needle`, case-insensitively.
#[must_use]
pub fn find_speaker(world: &dyn DialogueWorld, needle: &str) -> Option<SpeakerId> {
    let needle = needle.to_lowercase();
    world.speaker_ids().into_iter().find(|id| {
        world
            .speaker(*id)
            .is_some_and(|s| s.name.to_lowercase().contains(&needle))
    })
}

/// Run `command` against the speaker matching `name` and describe what
/// happened.
///
/// # Errors
///
/// Returns an error if the command does not parse, no speaker matches, or
/// the speaker has no bank.
pub fn run_test(
    manager: &mut DialogueManager,
    world: &mut dyn DialogueWorld,
    name: &str,
    command: &str,
    now: GameTime,
) -> Result<String> {
    let command: DebugCommand = command.parse()?;
    let speaker = find_speaker(world, name)
        .ok_or_else(|| GameError::SpeakerNotFound(name.to_string()))?;
    let speaker_name = world.speaker(speaker).map(|s| s.name.clone()).unwrap_or_default();
    let bank = world
        .speaker(speaker)
        .and_then(|s| s.bound_bank.clone())
        .ok_or_else(|| GameError::NoBank(speaker_name.clone()))?;

    info!(speaker = %speaker_name, bank = %bank, ?command, "debug command");

    let outcome = match command {
        DebugCommand::Action(action) => {
            if manager.play_action_directly(world, action, speaker, None, None, now) {
                format!("{speaker_name} played action {action}")
            } else {
                format!("{speaker_name} has no playable line for action {action}")
            }
        }
        DebugCommand::LoadAll => {
            let n = manager.force_load_all_varieties(&bank, now);
            format!("{bank}: queued {n} varieties")
        }
        DebugCommand::UnloadAll => {
            let n = manager.unload_all_varieties(world, &bank);
            format!("{bank}: unloaded {n} varieties")
        }
        DebugCommand::LoadRandom { count, keep_existing } => {
            let ok = manager.load_random_varieties(world, &bank, count, keep_existing, now);
            format!("{bank}: random load of {count} {}", if ok { "issued" } else { "refused" })
        }
        DebugCommand::Load(index) => {
            let ok = manager.load_variety(&bank, index, now);
            format!("{bank}: variety {index} {}", if ok { "requested" } else { "refused" })
        }
        DebugCommand::FlushAll => {
            let n = manager.flush_all(world);
            format!("flushed {n} banks")
        }
    };
    Ok(outcome)
}
