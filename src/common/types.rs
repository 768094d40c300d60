// src/common/types.rs

use core::fmt;
use heapless::Vec;

// --- Value limits used for normalization ---

/// Largest distance the radar can meaningfully report, in centimeters.
pub const MAX_DISTANCE_CM: u16 = 800;
/// Energies are percentages.
pub const MAX_ENERGY: u8 = 100;
/// Most distance gates an engineering report can carry.
pub const MAX_GATES: usize = 16;

// --- Target state ---

/// Target state byte of a periodic report. Bit 0: moving target, bit 1: still target.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TargetState(u8);

impl TargetState {
    pub const NONE: TargetState = TargetState(0x00);
    pub const MOVING: TargetState = TargetState(0x01);
    pub const STILL: TargetState = TargetState(0x02);
    pub const BOTH: TargetState = TargetState(0x03);

    /// Builds a state from the raw byte. Undefined high bits are dropped;
    /// the second value tells whether any were set.
    pub fn from_raw(raw: u8) -> (Self, bool) {
        (TargetState(raw & 0x03), raw & !0x03 != 0)
    }

    #[inline]
    pub const fn bits(&self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn has_target(&self) -> bool {
        self.0 != 0
    }

    #[inline]
    pub const fn has_moving_target(&self) -> bool {
        self.0 & 0x01 != 0
    }

    #[inline]
    pub const fn has_still_target(&self) -> bool {
        self.0 & 0x02 != 0
    }
}

// --- Report fields ---

/// Every value a periodic report feeds to an output.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum Field {
    HasTarget = 0,
    HasMovingTarget = 1,
    HasStillTarget = 2,
    MovingDistance = 3,
    StillDistance = 4,
    MovingEnergy = 5,
    StillEnergy = 6,
    DetectionDistance = 7,
}

impl Field {
    pub const ALL: [Field; 8] = [
        Field::HasTarget,
        Field::HasMovingTarget,
        Field::HasStillTarget,
        Field::MovingDistance,
        Field::StillDistance,
        Field::MovingEnergy,
        Field::StillEnergy,
        Field::DetectionDistance,
    ];

    pub const fn is_binary(&self) -> bool {
        matches!(self, Field::HasTarget | Field::HasMovingTarget | Field::HasStillTarget)
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Field::HasTarget => "has_target",
            Field::HasMovingTarget => "has_moving_target",
            Field::HasStillTarget => "has_still_target",
            Field::MovingDistance => "moving_distance",
            Field::StillDistance => "still_distance",
            Field::MovingEnergy => "moving_energy",
            Field::StillEnergy => "still_energy",
            Field::DetectionDistance => "detection_distance",
        }
    }

    const fn bit(&self) -> u8 {
        1 << (*self as u8)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Small set of [`Field`]s.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub struct FieldSet(u8);

impl FieldSet {
    pub const EMPTY: FieldSet = FieldSet(0);
    pub const ALL: FieldSet = FieldSet(0xFF);

    pub fn insert(&mut self, field: Field) {
        self.0 |= field.bit();
    }

    pub const fn contains(&self, field: Field) -> bool {
        self.0 & field.bit() != 0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub const fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = Field> + '_ {
        Field::ALL.into_iter().filter(move |f| self.contains(*f))
    }
}

impl FromIterator<Field> for FieldSet {
    fn from_iter<T: IntoIterator<Item = Field>>(iter: T) -> Self {
        let mut set = FieldSet::EMPTY;
        for field in iter {
            set.insert(field);
        }
        set
    }
}

// --- Engineering data ---

/// Per-gate energies from an engineering-mode report.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct GateEnergies {
    pub moving: Vec<u8, MAX_GATES>,
    pub still: Vec<u8, MAX_GATES>,
}

/// Bitmask of gate indexes, bit `n` = gate `n`.
pub type GateMask = u16;

impl GateEnergies {
    /// Gates whose moving energy differs from `previous` (or every gate when there is none).
    pub fn moving_changes(&self, previous: Option<&GateEnergies>) -> GateMask {
        diff_mask(&self.moving, previous.map(|p| &p.moving[..]))
    }

    pub fn still_changes(&self, previous: Option<&GateEnergies>) -> GateMask {
        diff_mask(&self.still, previous.map(|p| &p.still[..]))
    }
}

fn diff_mask(current: &[u8], previous: Option<&[u8]>) -> GateMask {
    current.iter().enumerate().fold(0, |mask, (gate, value)| {
        if previous.and_then(|p| p.get(gate)) == Some(value) {
            mask
        } else {
            mask | (1 << gate)
        }
    })
}

// --- Normalization helpers ---

/// Clamps a raw distance; the flag is set when clamping happened.
pub fn clamp_distance(raw: u16) -> (u16, bool) {
    if raw > MAX_DISTANCE_CM {
        (MAX_DISTANCE_CM, true)
    } else {
        (raw, false)
    }
}

/// Clamps a raw energy byte to a percentage.
pub fn clamp_energy(raw: u8) -> (u8, bool) {
    if raw > MAX_ENERGY {
        (MAX_ENERGY, true)
    } else {
        (raw, false)
    }
}
