/// Orbital mechanics
///
/// - `GameSimulation`: N-body propagator (massive bodies + test-particle spacecraft)
/// - `CelestialEphemeris` and trajectory prediction in a sandbox
/// - RTN frames, two-body elements and orbit construction helpers

pub mod elements;
pub mod ephemeris;
pub mod frames;
pub mod helpers;
pub mod simulation;
pub mod trajectory;
pub mod types;

pub use elements::{
    compute_orbital_elements, estimate_orbital_period, select_prediction_horizon_and_dt, OrbitalElements,
    PredictionSampling,
};
pub use ephemeris::{hermite_position, hermite_state, CelestialEphemeris};
pub use frames::{compute_rtn_frame, RtnFrame};
pub use helpers::{
    circular_orbit_relative_state_xz, nbody_accel_body_centered, point_mass_accel, two_body_circular_barycentric_xz,
};
pub use simulation::{GameSimulation, ManeuverImpulse, ManeuverPlan, SimConfig};
pub use trajectory::{
    build_celestial_ephemeris, predict_spacecraft_trajectory, sample_state_hermite, sample_state_linear,
    trajectory_to_body_centered_inertial, TrajectoryOptions, TrajectorySample,
};
pub use types::{
    make_state, BodyHandle, BodyId, MassiveBody, Spacecraft, SpacecraftHandle, SpacecraftId, State,
    TwoBodyBarycentricStates, G_SI,
};
