//! Memory: the boot arena, the two-phase subsystem protocol, and tagged
//! allocation accounting.
//!
//! The accounting subsystem is the first one up and the last one torn down,
//! so bookkeeping stays valid across every other subsystem's whole lifetime.

pub mod arena;
pub mod two_phase;

pub use arena::{ArenaBlock, LinearAllocator};
pub use two_phase::{ArenaBox, Subsystem, SubsystemError, SystemSlot};

/// Classification for tracked allocations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(usize)]
pub enum MemoryTag {
    /// Allocation nobody classified yet; tracked, but warned about.
    Unknown = 0,
    /// The boot arena's backing block.
    LinearAllocator,
    /// Subsystem state carved out of the arena.
    Application,
    /// Event bus listener storage.
    Event,
    /// Input snapshot state.
    Input,
    /// Renderer frontend and backend state.
    Renderer,
    /// Texture pixel memory.
    Texture,
    /// Game instance state.
    Game,
}

impl MemoryTag {
    /// Number of tags, for stats arrays.
    pub const COUNT: usize = 8;

    const ALL: [MemoryTag; Self::COUNT] = [
        MemoryTag::Unknown,
        MemoryTag::LinearAllocator,
        MemoryTag::Application,
        MemoryTag::Event,
        MemoryTag::Input,
        MemoryTag::Renderer,
        MemoryTag::Texture,
        MemoryTag::Game,
    ];

    fn label(self) -> &'static str {
        match self {
            MemoryTag::Unknown => "UNKNOWN",
            MemoryTag::LinearAllocator => "LINEAR_ALLOC",
            MemoryTag::Application => "APPLICATION",
            MemoryTag::Event => "EVENT",
            MemoryTag::Input => "INPUT",
            MemoryTag::Renderer => "RENDERER",
            MemoryTag::Texture => "TEXTURE",
            MemoryTag::Game => "GAME",
        }
    }
}

/// Running totals of tracked bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryStats {
    total_allocated: u64,
    tagged: [u64; MemoryTag::COUNT],
}

/// Tagged allocation accounting.
///
/// Tracking is explicit: subsystems report their own notable allocations
/// (the arena block, subsystem carves, texture pixels). The allocation
/// counter only ever increments; it counts allocations made, not live ones.
#[derive(Debug)]
pub struct MemorySystem {
    stats: MemoryStats,
    alloc_count: u64,
}

impl MemorySystem {
    fn new() -> Self {
        Self {
            stats: MemoryStats::default(),
            alloc_count: 0,
        }
    }

    /// Records an allocation of `size` bytes under `tag`.
    pub fn track_alloc(&mut self, size: u64, tag: MemoryTag) {
        if tag == MemoryTag::Unknown {
            log::warn!("allocation tracked with MemoryTag::Unknown; classify it");
        }
        self.stats.total_allocated += size;
        self.stats.tagged[tag as usize] += size;
        self.alloc_count += 1;
    }

    /// Records a release of `size` bytes under `tag`.
    pub fn track_free(&mut self, size: u64, tag: MemoryTag) {
        if tag == MemoryTag::Unknown {
            log::warn!("free tracked with MemoryTag::Unknown; classify it");
        }
        if size > self.stats.tagged[tag as usize] {
            log::warn!(
                "freed {} B under {} but only {} B were tracked",
                size,
                tag.label(),
                self.stats.tagged[tag as usize]
            );
        }
        self.stats.total_allocated = self.stats.total_allocated.saturating_sub(size);
        self.stats.tagged[tag as usize] = self.stats.tagged[tag as usize].saturating_sub(size);
    }

    /// Total number of allocations tracked since boot.
    pub fn allocation_count(&self) -> u64 {
        self.alloc_count
    }

    /// Bytes currently tracked across all tags.
    pub fn total_allocated(&self) -> u64 {
        self.stats.total_allocated
    }

    /// Bytes currently tracked under one tag.
    pub fn tagged(&self, tag: MemoryTag) -> u64 {
        self.stats.tagged[tag as usize]
    }

    /// Renders the per-tag usage table logged at startup.
    pub fn usage_report(&self) -> String {
        let mut out = String::from("System memory use (tagged):\n");
        for tag in MemoryTag::ALL {
            let (value, unit) = scaled(self.stats.tagged[tag as usize]);
            out.push_str(&format!("  {:<12} {:>8.2} {}\n", tag.label(), value, unit));
        }
        out
    }
}

impl Subsystem for MemorySystem {
    const NAME: &'static str = "memory system";
    type Args<'a> = ();

    fn initialize(_args: ()) -> Result<Self, SubsystemError> {
        Ok(Self::new())
    }

    fn shutdown(&mut self) {
        log::debug!(
            "memory system shut down after {} tracked allocations",
            self.alloc_count
        );
    }
}

fn scaled(amount: u64) -> (f64, &'static str) {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;
    const GIB: u64 = 1024 * MIB;

    if amount >= GIB {
        (amount as f64 / GIB as f64, "GiB")
    } else if amount >= MIB {
        (amount as f64 / MIB as f64, "MiB")
    } else if amount >= KIB {
        (amount as f64 / KIB as f64, "KiB")
    } else {
        (amount as f64, "B")
    }
}
