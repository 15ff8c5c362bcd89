// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Interfaces to the external collaborators the engine drives.
//!
//! The imaging/deconvolution engine, the image-statistics probe, the noise
//! model and the gain solver are all external, blocking, file-producing
//! tools. The engine only depends on the contracts here: every invocation
//! returns a typed `Result`, and every expected on-disk artifact is checked
//! for existence via [`Artifact`] before it is trusted.

mod error;

pub use error::{BoundsViolation, PrimitiveError};

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::chunks::FrequencyChunk;

/// A named file-system artifact produced by an external primitive. External
/// tools signal failure either by raising or by the artifact simply not
/// appearing on disk, so construction checks existence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact(PathBuf);

impl Artifact {
    /// Wrap `path`, verifying the artifact actually exists on disk.
    pub fn ensure_exists(path: &Path) -> Result<Artifact, PrimitiveError> {
        if path.exists() {
            Ok(Artifact(path.to_path_buf()))
        } else {
            Err(PrimitiveError::MissingArtifact(path.to_path_buf()))
        }
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

/// The (min, max, stddev) triple of an image product. `stddev` may be NaN
/// when the image is empty or degenerate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageStats {
    pub min: f64,
    pub max: f64,
    pub stddev: f64,
}

/// Absolute numeric sanity bounds on image statistics, used to catch
/// divergent/runaway cleans.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SanityBounds {
    /// No image maximum may exceed this \[Jy/beam\].
    pub max_ceiling: f64,

    /// No image minimum may lie below this \[Jy/beam\].
    pub min_floor: f64,
}

impl SanityBounds {
    /// Check `stats` against these bounds. The standard deviation must also
    /// be a real number; a NaN stddev means the image is empty or degenerate.
    pub fn check(&self, stats: ImageStats) -> Result<(), BoundsViolation> {
        if !stats.stddev.is_finite() {
            return Err(BoundsViolation::StddevNotFinite {
                stddev: stats.stddev,
            });
        }
        if stats.max > self.max_ceiling {
            return Err(BoundsViolation::MaxTooHigh {
                max: stats.max,
                ceiling: self.max_ceiling,
            });
        }
        if stats.min < self.min_floor {
            return Err(BoundsViolation::MinTooLow {
                min: stats.min,
                floor: self.min_floor,
            });
        }
        Ok(())
    }
}

/// The restoring (synthesised) beam of an image: major axis, minor axis
/// \[arcsec\] and position angle \[deg\].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RestoringBeam {
    pub bmaj: f64,
    pub bmin: f64,
    pub bpa: f64,
}

/// Restoration modes of the imaging primitive.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum RestoreMode {
    #[strum(serialize = "clean")]
    Clean,

    #[strum(serialize = "residual")]
    Residual,
}

/// Gain-solution modes of the self-calibration primitive.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveMode {
    #[strum(serialize = "phase")]
    #[serde(rename = "phase")]
    Phase,

    #[strum(serialize = "amplitude")]
    #[serde(rename = "amplitude")]
    Amplitude,
}

/// Gridding/weighting settings handed to `invert`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InvertSettings {
    /// Image size \[pixels\] along each axis.
    pub image_size: usize,

    /// Cell size \[arcsec\].
    pub cell_size: f64,

    /// Robustness parameter of the imaging weighting scheme.
    pub robust: f64,
}

/// One convolved chunk image handed to `stack`, with its combination weight
/// and RMS.
#[derive(Debug, Clone)]
pub struct StackContribution {
    pub image: PathBuf,
    pub weight: f64,
    pub rms: f64,
}

/// The imaging/deconvolution engine. All operations are blocking and produce
/// named file-system artifacts at the paths the engine supplies; callers
/// verify the artifacts afterwards with [`Artifact::ensure_exists`] and the
/// [`StatsProbe`].
pub trait ImagingPrimitive: Send + Sync {
    /// Grid and Fourier-transform the visibilities into a dirty map and a
    /// synthesised (dirty) beam.
    fn invert(
        &self,
        vis: &Path,
        map: &Path,
        beam: &Path,
        settings: &InvertSettings,
    ) -> Result<(), PrimitiveError>;

    /// Derive the initial clean mask for a chunk (major cycle 0) from a
    /// parametric or catalogue source model.
    fn initial_mask(&self, vis: &Path, mask: &Path) -> Result<(), PrimitiveError>;

    /// Copy/regrid an existing mask (the previous major cycle's final mask)
    /// onto this cycle's grid.
    fn regrid_mask(&self, src: &Path, mask: &Path) -> Result<(), PrimitiveError>;

    /// Threshold an image into a clean mask: every pixel above `threshold`
    /// is unmasked.
    fn mask_from_image(
        &self,
        image: &Path,
        threshold: f64,
        mask: &Path,
    ) -> Result<(), PrimitiveError>;

    /// Deconvolve the map down to `cutoff` within the masked region,
    /// optionally continuing from an earlier model.
    #[allow(clippy::too_many_arguments)]
    fn clean(
        &self,
        map: &Path,
        beam: &Path,
        mask: &Path,
        cutoff: f64,
        max_iterations: u32,
        starting_model: Option<&Path>,
        model: &Path,
    ) -> Result<(), PrimitiveError>;

    /// Restore the model against the map and beam, producing either the
    /// restored ("clean") image or the residual image.
    fn restore(
        &self,
        map: &Path,
        beam: &Path,
        model: &Path,
        mode: RestoreMode,
        out: &Path,
    ) -> Result<(), PrimitiveError>;

    /// Read the restoring-beam parameters of a restored image.
    fn restoring_beam(&self, image: &Path) -> Result<RestoringBeam, PrimitiveError>;

    /// Convolve an image to a common restoring beam.
    fn convolve(
        &self,
        image: &Path,
        beam: &RestoringBeam,
        out: &Path,
    ) -> Result<(), PrimitiveError>;

    /// Combine weighted, convolved chunk images into one stacked image.
    fn stack(
        &self,
        contributions: &[StackContribution],
        out: &Path,
    ) -> Result<(), PrimitiveError>;
}

/// The image-statistics probe.
pub trait StatsProbe: Send + Sync {
    /// (min, max, stddev) of an image. `stddev` may be NaN for an
    /// empty/degenerate image.
    fn stats(&self, image: &Path) -> Result<ImageStats, PrimitiveError>;
}

/// The noise model: the theoretical noise of a chunk's dataset \[Jy/beam\].
pub trait NoiseModel: Send + Sync {
    fn theoretical_noise(&self, chunk: &FrequencyChunk) -> Result<f64, PrimitiveError>;
}

/// The self-calibration (gain-solving) primitive.
pub trait GainSolver: Send + Sync {
    /// Solve antenna gains against `model` and apply them to the chunk's
    /// visibilities. `uv_range` is `(uvmin, uvmax)` \[klambda\];
    /// `solution_interval` is in minutes.
    fn solve_gains(
        &self,
        vis: &Path,
        model: &Path,
        uv_range: (f64, f64),
        solution_interval: f64,
        mode: SolveMode,
    ) -> Result<(), PrimitiveError>;
}
