//! Pooled particle storage.
//!
//! Every slot is preallocated; emission and retirement are O(1) index moves
//! between a free stack and a live list. No per-particle heap allocation
//! ever happens after construction, and growth only occurs when an emission
//! finds the free stack empty.

use glam::{Vec3, Vec4};

/// Number of slots added per emergency growth.
pub const GROWTH_SLAB: usize = 16;

/// A single pooled particle. Plain data, trivially copyable.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Particle {
    /// World position.
    pub pos: Vec3,
    /// Velocity in world units per second.
    pub vel: Vec3,
    /// Per-particle constant acceleration (overwritten by anchor attraction).
    pub acc: Vec3,
    /// Ejection direction captured at emission, for oriented rendering.
    pub orient_dir: Vec3,
    /// Offset from the emission point, for pinned emitters.
    pub rel_pos: Vec3,
    /// Age in milliseconds.
    pub age_ms: i32,
    /// Total lifetime in milliseconds.
    pub lifetime_ms: i32,
    /// Interpolated RGBA color.
    pub color: Vec4,
    /// Interpolated size in world units.
    pub size: f32,
    /// Spin speed in degrees per second.
    pub spin_speed: f32,
    /// Index into the emitter's bound species list.
    pub species: u16,
}

/// Stable handle to a slot in a [`ParticleStore`].
///
/// Handles are indices: they stay valid across store growth, and they are
/// only ever produced and retired by the owning emitter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ParticleHandle(u32);

impl ParticleHandle {
    /// Slot index of this handle.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Capacity-growing particle pool partitioned into a free stack and a live
/// list.
///
/// The live list keeps emission order: oldest first, newest at the end.
/// Rendering iterates it in reverse so the newest particle comes first.
#[derive(Debug)]
pub struct ParticleStore {
    slots: Vec<Particle>,
    free: Vec<u32>,
    live: Vec<u32>,
    grown: bool,
}

impl ParticleStore {
    /// Creates a store with `initial` preallocated slots.
    #[must_use]
    pub fn with_capacity(initial: usize) -> Self {
        let mut store = Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: Vec::new(),
            grown: false,
        };
        store.add_slots(initial);
        store.grown = false;
        store
    }

    /// Total number of slots (live + free).
    #[must_use]
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of live particles.
    #[must_use]
    #[inline]
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Number of free slots.
    #[must_use]
    #[inline]
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Takes a slot from the free stack and appends it to the live list,
    /// growing the store by [`GROWTH_SLAB`] slots if none are free.
    pub fn acquire(&mut self) -> ParticleHandle {
        if self.free.is_empty() {
            self.add_slots(GROWTH_SLAB);
        }
        debug_assert!(!self.free.is_empty());
        let index = self.free.pop().unwrap_or(0);
        self.live.push(index);
        ParticleHandle(index)
    }

    /// Returns a live slot to the free stack.
    ///
    /// A handle not currently live is ignored. The newest live particle is
    /// retired in O(1); releasing an older one scans the live list, so bulk
    /// retirement goes through [`retain_live`](Self::retain_live) instead.
    pub fn release(&mut self, handle: ParticleHandle) {
        if self.live.last() == Some(&handle.0) {
            self.live.pop();
            self.free.push(handle.0);
            return;
        }
        if let Some(pos) = self.live.iter().position(|&i| i == handle.0) {
            self.live.remove(pos);
            self.free.push(handle.0);
        }
    }

    /// Retires the most recently acquired live particle, returning its
    /// handle. O(1): pops the tail of the live list.
    pub fn retire_newest(&mut self) -> Option<ParticleHandle> {
        let index = self.live.pop()?;
        self.free.push(index);
        Some(ParticleHandle(index))
    }

    /// Handle of the most recently acquired live particle.
    #[must_use]
    pub fn newest(&self) -> Option<ParticleHandle> {
        self.live.last().map(|&i| ParticleHandle(i))
    }

    /// Immutable access to a slot.
    #[must_use]
    #[inline]
    pub fn get(&self, handle: ParticleHandle) -> &Particle {
        &self.slots[handle.index()]
    }

    /// Mutable access to a slot.
    #[inline]
    pub fn get_mut(&mut self, handle: ParticleHandle) -> &mut Particle {
        &mut self.slots[handle.index()]
    }

    /// Iterates live particles, newest first.
    pub fn live_particles(&self) -> impl Iterator<Item = &Particle> {
        self.live.iter().rev().map(|&i| &self.slots[i as usize])
    }

    /// Iterates live handles, newest first.
    pub fn live_handles(&self) -> impl Iterator<Item = ParticleHandle> + '_ {
        self.live.iter().rev().map(|&i| ParticleHandle(i))
    }

    /// Visits every live particle mutably, oldest first.
    pub fn for_each_live_mut<F: FnMut(&mut Particle)>(&mut self, mut visit: F) {
        for &index in &self.live {
            visit(&mut self.slots[index as usize]);
        }
    }

    /// Visits every live particle mutably, oldest first, releasing those for
    /// which `keep` returns false. Relative order of survivors is preserved.
    pub fn retain_live<F: FnMut(&mut Particle) -> bool>(&mut self, mut keep: F) {
        let mut write = 0;
        for read in 0..self.live.len() {
            let index = self.live[read];
            if keep(&mut self.slots[index as usize]) {
                self.live[write] = index;
                write += 1;
            } else {
                self.free.push(index);
            }
        }
        self.live.truncate(write);
    }

    /// Releases every live particle.
    pub fn clear_live(&mut self) {
        self.free.extend(self.live.drain(..));
    }

    /// Reports and clears the growth flag: `Some(capacity)` if the store
    /// grew since the last call.
    pub fn take_capacity_change(&mut self) -> Option<usize> {
        if self.grown {
            self.grown = false;
            Some(self.slots.len())
        } else {
            None
        }
    }

    fn add_slots(&mut self, count: usize) {
        let base = self.slots.len();
        self.slots.resize(base + count, Particle::default());
        self.free.reserve(count);
        for index in base..base + count {
            self.free.push(index as u32);
        }
        self.grown = true;
    }
}
