/// Plain data for the N-body simulator: states, bodies, spacecraft and ids

use glam::DVec3;

/// Newtonian constant of gravitation (m^3 kg^-1 s^-2)
pub const G_SI: f64 = 6.67430e-11;

/// Position and velocity, barycentric unless stated otherwise
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct State {
    pub position_m: DVec3,
    pub velocity_mps: DVec3,
}

pub fn make_state(position_m: DVec3, velocity_mps: DVec3) -> State {
    State {
        position_m,
        velocity_mps,
    }
}

impl State {
    pub fn is_finite(&self) -> bool {
        self.position_m.is_finite() && self.velocity_mps.is_finite()
    }

    /// `self - other`, component-wise
    pub fn relative_to(&self, other: &State) -> State {
        State {
            position_m: self.position_m - other.position_m,
            velocity_mps: self.velocity_mps - other.velocity_mps,
        }
    }
}

/// Massive body id. Zero is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct BodyId(pub u32);

impl BodyId {
    pub const INVALID: BodyId = BodyId(0);

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

/// Spacecraft id. Zero is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SpacecraftId(pub u32);

impl SpacecraftId {
    pub const INVALID: SpacecraftId = SpacecraftId(0);

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BodyHandle {
    pub id: BodyId,
}

impl BodyHandle {
    pub fn valid(&self) -> bool {
        self.id.is_valid()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SpacecraftHandle {
    pub id: SpacecraftId,
}

impl SpacecraftHandle {
    pub fn valid(&self) -> bool {
        self.id.is_valid()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MassiveBody {
    /// Assigned by the simulation on creation
    pub id: BodyId,
    pub mass_kg: f64,
    pub radius_m: f64,
    pub atmosphere_top_height_m: f64,
    pub terrain_max_height_m: f64,
    pub soi_radius_m: f64,
    pub state: State,
}

/// Test particle: feels gravity, exerts none
#[derive(Debug, Clone, PartialEq)]
pub struct Spacecraft {
    pub id: SpacecraftId,
    pub dry_mass_kg: f64,
    pub prop_mass_kg: f64,
    pub state: State,
}

impl Default for Spacecraft {
    fn default() -> Self {
        Self {
            id: SpacecraftId::INVALID,
            dry_mass_kg: 1.0,
            prop_mass_kg: 0.0,
            state: State::default(),
        }
    }
}

/// Output of the two-body barycentric constructor
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TwoBodyBarycentricStates {
    pub state_a: State,
    pub state_b: State,
}
