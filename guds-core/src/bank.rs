//! Bank payloads and per-bank-name collections.
//!
//! A [`BankCollection`] owns the loaded root and variety payloads of one bank
//! name together with the speakers referencing it. Its aggregate table is the
//! single source of truth for "does this speaker have a line for action X":
//! it is rebuilt from the root plus every loaded variety whenever a slot
//! changes.

use std::collections::BTreeSet;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::types::{ActionId, BankSlot, EventId, GameTime, LineRole, SideAssetId, SpeakerId};

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// Reference to a playable audio cue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioCue {
    /// Cue identifier, also the identity used for repeat suppression.
    pub id: String,
    /// Playback length in seconds.
    #[serde(default)]
    pub duration: f32,
}

/// One voice line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GudLine {
    /// Audio for the line. Root banks may leave this empty for lines that
    /// only exist in varieties.
    #[serde(default)]
    pub audio: Option<AudioCue>,
    /// Who the line is spoken to.
    #[serde(default)]
    pub addressee: LineRole,
    /// Who the line talks about.
    #[serde(default)]
    pub referring_to: LineRole,
    /// Events that may be triggered in reply once the line finishes.
    #[serde(default)]
    pub response_events: Vec<EventId>,
}

impl GudLine {
    /// Audio id, if any.
    #[must_use]
    pub fn audio_id(&self) -> Option<&str> {
        self.audio.as_ref().map(|a| a.id.as_str())
    }
}

/// Bucket of line indices for one action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GudAction {
    /// Lines usable in any state.
    #[serde(default)]
    pub lines: Vec<usize>,
    /// Lines usable only in combat.
    #[serde(default)]
    pub combat_only: Vec<usize>,
    /// Lines usable only out of combat.
    #[serde(default)]
    pub non_combat_only: Vec<usize>,
}

impl GudAction {
    fn merge_from(&mut self, other: &GudAction) {
        union_into(&mut self.lines, &other.lines);
        union_into(&mut self.combat_only, &other.combat_only);
        union_into(&mut self.non_combat_only, &other.non_combat_only);
    }
}

fn union_into(dst: &mut Vec<usize>, src: &[usize]) {
    for idx in src {
        if !dst.contains(idx) {
            dst.push(*idx);
        }
    }
}

/// Content of one loaded bank package.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BankData {
    /// Line table, indexed by line index.
    #[serde(default)]
    pub lines: Vec<GudLine>,
    /// Action table, indexed by [`ActionId`].
    #[serde(default)]
    pub actions: Vec<GudAction>,
    /// Facial animation set to mount on speakers using this bank.
    #[serde(default)]
    pub side_asset: Option<SideAssetId>,
}

impl BankData {
    /// Look up an action.
    #[must_use]
    pub fn action(&self, id: ActionId) -> Option<&GudAction> {
        self.actions.get(id.index())
    }

    /// Look up a line.
    #[must_use]
    pub fn line(&self, index: usize) -> Option<&GudLine> {
        self.lines.get(index)
    }

    /// Whether the bank can voice `id` in the given combat state.
    ///
    /// Unconditional lines always count; otherwise only the bucket that
    /// matches the combat state does.
    #[must_use]
    pub fn has_line_for(&self, id: ActionId, in_combat: bool) -> bool {
        let Some(action) = self.action(id) else {
            return false;
        };
        if !action.lines.is_empty() {
            return true;
        }
        if in_combat {
            !action.combat_only.is_empty()
        } else {
            !action.non_combat_only.is_empty()
        }
    }

    /// Candidate line indices for `id` in the given combat state.
    #[must_use]
    pub fn line_pool(&self, id: ActionId, in_combat: bool) -> Vec<usize> {
        let Some(action) = self.action(id) else {
            return Vec::new();
        };
        let conditional = if in_combat {
            &action.combat_only
        } else {
            &action.non_combat_only
        };
        action
            .lines
            .iter()
            .chain(conditional)
            .copied()
            .filter(|i| *i < self.lines.len())
            .collect()
    }

    /// Splice a variety's content into this aggregate.
    ///
    /// A line slot without audio takes the variety's line at the same index;
    /// action buckets are unioned.
    fn splice(&mut self, variety: &BankData) {
        if self.lines.len() < variety.lines.len() {
            self.lines.resize_with(variety.lines.len(), GudLine::default);
        }
        for (dst, src) in self.lines.iter_mut().zip(&variety.lines) {
            if dst.audio.is_none() && src.audio.is_some() {
                *dst = src.clone();
            }
        }
        if self.actions.len() < variety.actions.len() {
            self.actions.resize_with(variety.actions.len(), GudAction::default);
        }
        for (dst, src) in self.actions.iter_mut().zip(&variety.actions) {
            dst.merge_from(src);
        }
    }
}

// ---------------------------------------------------------------------------
// Collection
// ---------------------------------------------------------------------------

/// A payload resident in a collection slot.
#[derive(Debug, Clone)]
pub struct LoadedAsset {
    /// Bank content.
    pub data: BankData,
    /// When the load completed.
    pub loaded_at: GameTime,
}

/// Everything loaded for one bank name.
#[derive(Debug, Clone)]
pub struct BankCollection {
    slots: Vec<Option<LoadedAsset>>,
    speakers: Vec<SpeakerId>,
    orphaned_at: Option<GameTime>,
    aggregate: BankData,
}

impl BankCollection {
    /// Empty collection with room for `slot_count` slots.
    #[must_use]
    pub fn new(slot_count: usize) -> Self {
        Self {
            slots: vec![None; slot_count.max(1)],
            speakers: Vec::new(),
            orphaned_at: None,
            aggregate: BankData::default(),
        }
    }

    /// Aggregate line/action table (root plus loaded varieties).
    #[must_use]
    pub fn aggregate(&self) -> &BankData {
        &self.aggregate
    }

    /// Whether the root is resident.
    #[must_use]
    pub fn has_root(&self) -> bool {
        self.is_loaded(BankSlot::Root)
    }

    /// Whether a slot holds data.
    #[must_use]
    pub fn is_loaded(&self, slot: BankSlot) -> bool {
        self.slots.get(slot.index()).is_some_and(Option::is_some)
    }

    /// Asset in a slot.
    #[must_use]
    pub fn slot(&self, slot: BankSlot) -> Option<&LoadedAsset> {
        self.slots.get(slot.index()).and_then(Option::as_ref)
    }

    /// Place an asset in a slot and rebuild the aggregate.
    pub fn insert(&mut self, slot: BankSlot, asset: LoadedAsset) {
        let idx = slot.index();
        if self.slots.len() <= idx {
            self.slots.resize(idx + 1, None);
        }
        self.slots[idx] = Some(asset);
        self.rebuild_aggregate();
    }

    /// Remove a variety and rebuild the aggregate.
    pub fn remove_variety(&mut self, variety: usize) -> Option<LoadedAsset> {
        let asset = self.slots.get_mut(variety + 1).and_then(Option::take);
        if asset.is_some() {
            self.rebuild_aggregate();
        }
        asset
    }

    fn rebuild_aggregate(&mut self) {
        let mut slots = self.slots.iter().flatten();
        let mut aggregate = match self.slots.first().and_then(Option::as_ref) {
            Some(root) => {
                slots.next();
                root.data.clone()
            }
            None => BankData::default(),
        };
        for variety in slots {
            aggregate.splice(&variety.data);
        }
        self.aggregate = aggregate;
    }

    /// Loaded slots with their assets, root first.
    pub fn loaded_slots(&self) -> impl Iterator<Item = (BankSlot, &LoadedAsset)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|a| (BankSlot::from_index(i), a)))
    }

    /// Indices of loaded varieties, ascending.
    #[must_use]
    pub fn loaded_varieties(&self) -> Vec<usize> {
        self.loaded_slots()
            .filter_map(|(slot, _)| match slot {
                BankSlot::Variety(v) => Some(v),
                BankSlot::Root => None,
            })
            .collect()
    }

    /// Number of loaded varieties.
    #[must_use]
    pub fn loaded_variety_count(&self) -> usize {
        self.slots.iter().skip(1).filter(|s| s.is_some()).count()
    }

    /// Loaded varieties ordered oldest first; ties keep slot order.
    #[must_use]
    pub fn varieties_by_age(&self) -> Vec<usize> {
        let mut loaded: Vec<(usize, GameTime)> = self
            .loaded_slots()
            .filter_map(|(slot, asset)| match slot {
                BankSlot::Variety(v) => Some((v, asset.loaded_at)),
                BankSlot::Root => None,
            })
            .collect();
        loaded.sort_by_key(|(_, at)| OrderedFloat(at.seconds()));
        loaded.into_iter().map(|(v, _)| v).collect()
    }

    /// Side assets of every loaded slot.
    #[must_use]
    pub fn side_assets(&self) -> BTreeSet<SideAssetId> {
        self.loaded_slots()
            .filter_map(|(_, a)| a.data.side_asset.clone())
            .collect()
    }

    // -- speakers ----------------------------------------------------------

    /// Referencing speakers.
    #[must_use]
    pub fn speakers(&self) -> &[SpeakerId] {
        &self.speakers
    }

    /// Add a speaker; clears the orphan stamp.
    pub fn add_speaker(&mut self, id: SpeakerId) {
        if !self.speakers.contains(&id) {
            self.speakers.push(id);
        }
        self.orphaned_at = None;
    }

    /// Remove a speaker. Stamps the orphan time when the last one leaves.
    pub fn remove_speaker(&mut self, id: SpeakerId, now: GameTime) -> bool {
        let before = self.speakers.len();
        self.speakers.retain(|s| *s != id);
        let removed = self.speakers.len() != before;
        if removed && self.speakers.is_empty() {
            self.orphaned_at = Some(now);
        }
        removed
    }

    /// Whether no speaker references this collection.
    #[must_use]
    pub fn is_orphaned(&self) -> bool {
        self.speakers.is_empty()
    }

    /// When the collection lost its last speaker.
    #[must_use]
    pub fn orphaned_at(&self) -> Option<GameTime> {
        self.orphaned_at
    }

    /// Stamp the orphan time if not already stamped.
    pub fn mark_orphaned(&mut self, now: GameTime) {
        if self.speakers.is_empty() && self.orphaned_at.is_none() {
            self.orphaned_at = Some(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cue(id: &str) -> Option<AudioCue> {
        Some(AudioCue {
            id: id.to_string(),
            duration: 1.0,
        })
    }

    fn line(id: Option<&str>) -> GudLine {
        GudLine {
            audio: id.and_then(cue),
            ..GudLine::default()
        }
    }

    fn root_data() -> BankData {
        BankData {
            lines: vec![line(Some("r0")), line(None)],
            actions: vec![GudAction {
                lines: vec![0],
                ..GudAction::default()
            }],
            side_asset: Some(SideAssetId("face_root".into())),
        }
    }

    fn variety_data() -> BankData {
        BankData {
            lines: vec![line(None), line(Some("v1")), line(Some("v2"))],
            actions: vec![
                GudAction {
                    lines: vec![1],
                    ..GudAction::default()
                },
                GudAction {
                    combat_only: vec![2],
                    ..GudAction::default()
                },
            ],
            side_asset: Some(SideAssetId("face_g1".into())),
        }
    }

    fn asset(data: BankData, at: f64) -> LoadedAsset {
        LoadedAsset {
            data,
            loaded_at: GameTime(at),
        }
    }

    #[test]
    fn combat_only_action_has_no_line_out_of_combat() {
        let data = BankData {
            lines: vec![line(Some("a"))],
            actions: vec![GudAction {
                combat_only: vec![0],
                ..GudAction::default()
            }],
            side_asset: None,
        };
        assert!(data.has_line_for(ActionId(0), true));
        assert!(!data.has_line_for(ActionId(0), false));
        assert!(data.line_pool(ActionId(0), false).is_empty());
        assert_eq!(data.line_pool(ActionId(0), true), vec![0]);
    }

    #[test]
    fn unknown_action_has_no_line() {
        assert!(!root_data().has_line_for(ActionId(9), false));
    }

    #[test]
    fn variety_splices_into_aggregate_and_unsplices() {
        let mut c = BankCollection::new(3);
        c.insert(BankSlot::Root, asset(root_data(), 1.0));
        assert_eq!(c.aggregate().line_pool(ActionId(0), false), vec![0]);

        c.insert(BankSlot::Variety(0), asset(variety_data(), 2.0));
        let agg = c.aggregate();
        assert_eq!(agg.line(0).and_then(GudLine::audio_id), Some("r0"));
        assert_eq!(agg.line(1).and_then(GudLine::audio_id), Some("v1"));
        assert_eq!(agg.line_pool(ActionId(0), false), vec![0, 1]);
        assert!(agg.has_line_for(ActionId(1), true));

        c.remove_variety(0);
        let agg = c.aggregate();
        assert_eq!(agg.line_pool(ActionId(0), false), vec![0]);
        assert!(agg.line(1).and_then(GudLine::audio_id).is_none());
        assert!(!agg.has_line_for(ActionId(1), true));
    }

    #[test]
    fn oldest_variety_by_load_time() {
        let mut c = BankCollection::new(4);
        c.insert(BankSlot::Root, asset(root_data(), 0.0));
        c.insert(BankSlot::Variety(2), asset(variety_data(), 5.0));
        c.insert(BankSlot::Variety(0), asset(variety_data(), 7.0));
        c.insert(BankSlot::Variety(1), asset(variety_data(), 3.0));
        assert_eq!(c.varieties_by_age(), vec![1, 2, 0]);
        assert_eq!(c.loaded_variety_count(), 3);
    }

    #[test]
    fn orphan_stamp_follows_speaker_set() {
        let mut sm = slotmap::SlotMap::<SpeakerId, ()>::with_key();
        let a = sm.insert(());
        let b = sm.insert(());
        let mut c = BankCollection::new(1);
        c.add_speaker(a);
        c.add_speaker(b);
        c.add_speaker(a);
        assert_eq!(c.speakers().len(), 2);

        assert!(c.remove_speaker(a, GameTime(1.0)));
        assert!(c.orphaned_at().is_none());
        assert!(c.remove_speaker(b, GameTime(2.0)));
        assert_eq!(c.orphaned_at(), Some(GameTime(2.0)));

        c.add_speaker(a);
        assert!(c.orphaned_at().is_none());
    }

    #[test]
    fn side_assets_deduplicate() {
        let mut c = BankCollection::new(3);
        c.insert(BankSlot::Root, asset(root_data(), 0.0));
        c.insert(BankSlot::Variety(0), asset(root_data(), 0.0));
        assert_eq!(c.side_assets().len(), 1);
    }
}
