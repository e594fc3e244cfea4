use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use display_model::{ConfigId, DisplayConfiguration, PhotoDescriptor, PhotoId, PhotoSource};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::Result;
use crate::resolver::CandidateResolver;
use crate::sequence_store::SequenceStore;

/// Iteration state for one display configuration.
///
/// `order` holds the photo ids being walked, `cursor` the position of the
/// photo currently on screen (`None` until the first advance). In shuffle
/// mode `order` is a shuffle bag that is regenerated on every wraparound.
#[derive(Debug, Clone)]
pub struct SequenceState {
    order: Vec<PhotoId>,
    cursor: Option<usize>,
    last_shown: Option<PhotoId>,
    generated_for_count: usize,
    source: PhotoSource,
    shuffle: bool,
    rng: StdRng,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildReason {
    Initial,
    CandidatesChanged,
    SourceChanged,
    ModeChanged,
    CursorOutOfRange,
}

impl SequenceState {
    pub fn build(
        ids: &[PhotoId],
        source: PhotoSource,
        shuffle: bool,
        last_shown: Option<PhotoId>,
        mut rng: StdRng,
    ) -> Self {
        let order = if shuffle {
            shuffled_order(ids, last_shown, &mut rng)
        } else {
            ids.to_vec()
        };
        Self {
            order,
            cursor: None,
            last_shown,
            generated_for_count: ids.len(),
            source,
            shuffle,
            rng,
        }
    }

    fn rebuilt(self, ids: &[PhotoId], source: PhotoSource, shuffle: bool) -> Self {
        Self::build(ids, source, shuffle, self.last_shown, self.rng)
    }

    /// Why this state can no longer be walked against `ids`, if it can't.
    fn staleness(
        &self,
        ids: &[PhotoId],
        source: PhotoSource,
        shuffle: bool,
    ) -> Option<RebuildReason> {
        if self.source != source {
            return Some(RebuildReason::SourceChanged);
        }
        if self.shuffle != shuffle {
            return Some(RebuildReason::ModeChanged);
        }
        if self.generated_for_count != ids.len() || self.order.len() != ids.len() {
            return Some(RebuildReason::CandidatesChanged);
        }
        let members: HashSet<PhotoId> = ids.iter().copied().collect();
        if !self.order.iter().all(|id| members.contains(id)) {
            return Some(RebuildReason::CandidatesChanged);
        }
        if self.cursor.is_some_and(|cursor| cursor >= self.order.len()) {
            return Some(RebuildReason::CursorOutOfRange);
        }
        None
    }

    /// Moves to the next photo. Returns its id and whether a new shuffle bag was drawn.
    fn advance(&mut self, ids: &[PhotoId]) -> Option<(PhotoId, bool)> {
        let next = self.cursor.map_or(0, |cursor| cursor + 1);
        let mut regenerated = false;
        let position = if next >= self.order.len() {
            if self.shuffle && self.cursor.is_some() {
                self.order = shuffled_order(ids, self.last_shown, &mut self.rng);
                regenerated = true;
            }
            0
        } else {
            next
        };
        let id = *self.order.get(position)?;
        self.cursor = Some(position);
        self.last_shown = Some(id);
        Some((id, regenerated))
    }

    pub fn current(&self) -> Option<PhotoId> {
        self.cursor.and_then(|cursor| self.order.get(cursor).copied())
    }

    pub fn order(&self) -> &[PhotoId] {
        &self.order
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn last_shown(&self) -> Option<PhotoId> {
        self.last_shown
    }

    pub fn generated_for_count(&self) -> usize {
        self.generated_for_count
    }
}

/// A fresh permutation of `ids` whose first element is never `avoid`
/// (unless `ids` has a single member).
pub fn shuffled_order(ids: &[PhotoId], avoid: Option<PhotoId>, rng: &mut StdRng) -> Vec<PhotoId> {
    let mut order = ids.to_vec();
    order.shuffle(rng);
    if order.len() > 1 && order.first().copied() == avoid {
        let other = rng.random_range(1..order.len());
        order.swap(0, other);
    }
    order
}

/// Decides which photo a display shows next.
///
/// Every read resolves the candidate set while holding the configuration's
/// slot lock, and commits the advanced state only after the last await, so a
/// cancelled request leaves the sequence exactly where it was.
pub struct Sequencer {
    resolver: CandidateResolver,
    store: Arc<SequenceStore>,
    seeds: Mutex<StdRng>,
}

enum SeedDraw {
    Take,
    Peek,
}

impl Sequencer {
    pub fn new(resolver: CandidateResolver, store: Arc<SequenceStore>, seed: Option<u64>) -> Self {
        let seeds = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            resolver,
            store,
            seeds: Mutex::new(seeds),
        }
    }

    pub fn store(&self) -> &Arc<SequenceStore> {
        &self.store
    }

    pub async fn next(
        &self,
        config: &DisplayConfiguration,
        cancel: &CancellationToken,
    ) -> Result<Option<PhotoDescriptor>> {
        let source = config.source()?;
        let slot = self.store.slot(config.id);
        let mut guard = slot.lock().await;
        let candidates = self.resolver.resolve(&source, cancel).await?;
        Ok(self.advance_locked(&mut guard, config, source, &candidates))
    }

    /// The photo on screen, or the start of a sequence if there is none yet.
    pub async fn current(
        &self,
        config: &DisplayConfiguration,
        cancel: &CancellationToken,
    ) -> Result<Option<PhotoDescriptor>> {
        let source = config.source()?;
        let slot = self.store.slot(config.id);
        let mut guard = slot.lock().await;
        let candidates = self.resolver.resolve(&source, cancel).await?;
        if let Some(state) = guard.as_ref()
            && !candidates.is_empty()
            && state
                .staleness(&ids_of(&candidates), source, config.shuffle)
                .is_none()
            && let Some(id) = state.current()
        {
            return Ok(find(&candidates, id));
        }
        Ok(self.advance_locked(&mut guard, config, source, &candidates))
    }

    /// The next `count` photos `next` would return. Never advances the sequence.
    pub async fn preload(
        &self,
        config: &DisplayConfiguration,
        count: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<PhotoDescriptor>> {
        let source = config.source()?;
        if count == 0 {
            return Ok(Vec::new());
        }
        let slot = self.store.slot(config.id);
        let mut guard = slot.lock().await;
        let candidates = self.resolver.resolve(&source, cancel).await?;
        if candidates.is_empty() {
            // Same as next: an empty set keeps no state around.
            if guard.take().is_some() {
                debug!(config_id = config.id, "candidate set empty; sequence cleared");
            }
            return Ok(Vec::new());
        }
        let ids = ids_of(&candidates);
        let (mut simulated, _) =
            self.prepare(guard.clone(), &ids, source, config.shuffle, SeedDraw::Peek);
        drop(guard);

        let by_id: HashMap<PhotoId, &PhotoDescriptor> =
            candidates.iter().map(|photo| (photo.id, photo)).collect();
        let mut upcoming = Vec::with_capacity(count);
        for _ in 0..count {
            let Some((id, _)) = simulated.advance(&ids) else {
                break;
            };
            if let Some(photo) = by_id.get(&id) {
                upcoming.push((*photo).clone());
            }
        }
        Ok(upcoming)
    }

    pub async fn count(
        &self,
        config: &DisplayConfiguration,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let source = config.source()?;
        self.resolver.count(&source, cancel).await
    }

    /// Discards the sequence for `id`; the next read starts a new cycle.
    pub async fn reset(&self, id: ConfigId) {
        if self.store.reset(id).await {
            info!(config_id = id, "sequence reset");
        }
    }

    /// Drops everything held for a deleted configuration.
    pub async fn forget(&self, id: ConfigId) {
        self.store.remove(id).await;
        debug!(config_id = id, "sequence slot released");
    }

    /// One advance against already-resolved candidates. The caller holds the slot lock.
    fn advance_locked(
        &self,
        slot: &mut Option<SequenceState>,
        config: &DisplayConfiguration,
        source: PhotoSource,
        candidates: &[PhotoDescriptor],
    ) -> Option<PhotoDescriptor> {
        if candidates.is_empty() {
            if slot.take().is_some() {
                debug!(config_id = config.id, "candidate set empty; sequence cleared");
            }
            return None;
        }
        let ids = ids_of(candidates);
        let (mut state, reason) =
            self.prepare(slot.take(), &ids, source, config.shuffle, SeedDraw::Take);
        log_rebuild(config.id, reason, &state);
        let advanced = state.advance(&ids);
        *slot = Some(state);
        let (id, regenerated) = advanced?;
        if regenerated {
            debug!(config_id = config.id, photos = ids.len(), "shuffle cycle regenerated");
        }
        find(candidates, id)
    }

    fn prepare(
        &self,
        existing: Option<SequenceState>,
        ids: &[PhotoId],
        source: PhotoSource,
        shuffle: bool,
        draw: SeedDraw,
    ) -> (SequenceState, Option<RebuildReason>) {
        match existing {
            Some(state) => match state.staleness(ids, source, shuffle) {
                None => (state, None),
                Some(reason) => (state.rebuilt(ids, source, shuffle), Some(reason)),
            },
            None => {
                let rng = self.state_rng(draw);
                (
                    SequenceState::build(ids, source, shuffle, None, rng),
                    Some(RebuildReason::Initial),
                )
            }
        }
    }

    fn state_rng(&self, draw: SeedDraw) -> StdRng {
        let mut seeds = self.seeds.lock().unwrap_or_else(PoisonError::into_inner);
        let seed = match draw {
            SeedDraw::Take => seeds.random::<u64>(),
            SeedDraw::Peek => seeds.clone().random::<u64>(),
        };
        StdRng::seed_from_u64(seed)
    }
}

fn ids_of(candidates: &[PhotoDescriptor]) -> Vec<PhotoId> {
    candidates.iter().map(|photo| photo.id).collect()
}

fn find(candidates: &[PhotoDescriptor], id: PhotoId) -> Option<PhotoDescriptor> {
    candidates.iter().find(|photo| photo.id == id).cloned()
}

fn log_rebuild(config_id: ConfigId, reason: Option<RebuildReason>, state: &SequenceState) {
    match reason {
        None => {}
        Some(RebuildReason::Initial) => debug!(
            config_id,
            photos = state.generated_for_count,
            shuffle = state.shuffle,
            source = %state.source,
            "sequence started"
        ),
        Some(reason) => info!(
            config_id,
            photos = state.generated_for_count,
            shuffle = state.shuffle,
            source = %state.source,
            reason = ?reason,
            "sequence rebuilt"
        ),
    }
}
