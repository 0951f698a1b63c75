//! Distance to volume mapping.
//!
//! Runs once per tick over the whole roster. Purely numeric, O(peer count),
//! no allocation, no suspension points.
//!
//! The mapping is a linear ramp between two host-configured distances:
//! full volume at or below `min_distance`, silence at or beyond
//! `max_distance`, linear in between. Volumes are expressed in the
//! transport's `0..=200` scale.
//!
//! A degenerate range (`max <= min`) would break monotonicity, so it is
//! rejected at configuration time and the ramp itself never has to check.

use earshot_proto::PeerId;

use crate::{error::ConfigError, roster::Roster};

/// Full volume on the transport's per-peer scale.
pub const MAX_VOLUME: u8 = 200;

/// The audible range configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttenuationConfig {
    min_distance: f32,
    max_distance: f32,
}

impl Default for AttenuationConfig {
    fn default() -> Self {
        Self { min_distance: 10.0, max_distance: 100.0 }
    }
}

impl AttenuationConfig {
    /// Create a configuration with the given range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if either bound is non-finite or if
    /// `max_distance <= min_distance`.
    pub fn new(min_distance: f32, max_distance: f32) -> Result<Self, ConfigError> {
        Self::validate(min_distance, max_distance)?;
        Ok(Self { min_distance, max_distance })
    }

    /// Distance at or below which peers play at full volume.
    #[must_use]
    pub fn min_distance(&self) -> f32 {
        self.min_distance
    }

    /// Distance at or beyond which peers are silent.
    #[must_use]
    pub fn max_distance(&self) -> f32 {
        self.max_distance
    }

    /// Update the minimum distance.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the new value is non-finite or does not
    /// leave `max_distance` strictly above it. The range is unchanged on
    /// error.
    pub fn set_min_distance(&mut self, value: f32) -> Result<(), ConfigError> {
        Self::validate(value, self.max_distance)?;
        self.min_distance = value;
        Ok(())
    }

    /// Update the maximum distance.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the new value is non-finite or not
    /// strictly above `min_distance`. The range is unchanged on error.
    pub fn set_max_distance(&mut self, value: f32) -> Result<(), ConfigError> {
        Self::validate(self.min_distance, value)?;
        self.max_distance = value;
        Ok(())
    }

    /// The attenuation scalar for a distance, in `[0, 1]`.
    #[must_use]
    pub fn attenuation_for(&self, distance: f32) -> f32 {
        let range = self.max_distance - self.min_distance;
        let scalar = ((distance - self.min_distance) / range).clamp(0.0, 1.0);
        1.0 - scalar
    }

    /// The per-peer volume for a distance, in `0..=MAX_VOLUME`.
    #[must_use]
    pub fn volume_for(&self, distance: f32) -> u8 {
        // Saturating float-to-int cast keeps a NaN distance silent rather
        // than loud.
        (self.attenuation_for(distance) * f32::from(MAX_VOLUME)).round() as u8
    }

    fn validate(min: f32, max: f32) -> Result<(), ConfigError> {
        for value in [min, max] {
            if !value.is_finite() {
                return Err(ConfigError::NonFiniteDistance { value });
            }
        }

        if max <= min {
            return Err(ConfigError::InvalidDistanceRange { min, max });
        }

        Ok(())
    }
}

/// Compute a volume for every remote peer, relative to the local peer.
///
/// Does nothing while the roster is empty. The callback receives each
/// remote peer exactly once per invocation, in roster order.
pub fn update_volumes<F>(roster: &Roster, config: &AttenuationConfig, mut set_volume: F)
where
    F: FnMut(PeerId, u8),
{
    let Some(local) = roster.local_peer() else {
        return;
    };

    let reference = local.position();
    let local_id = local.network_id();

    for peer in roster.iter().filter(|p| p.network_id() != local_id) {
        let distance = peer.position().distance_to(&reference);
        set_volume(peer.network_id(), config.volume_for(distance));
    }
}
