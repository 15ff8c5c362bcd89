// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Stacking the per-chunk continuum images into one image per beam.
//!
//! After all chunks have run their major/minor loops, each chunk's final
//! image is validated against the numeric sanity bounds, a common restoring
//! beam is computed across the accepted chunks (with outlier rejection on
//! the beam parameters), every accepted image is convolved to that beam, and
//! the convolved images are combined weighted by inverse residual variance.

mod error;

pub use error::StackingError;

use std::path::PathBuf;

use itertools::Itertools;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    chunks::{ChunkWorkspace, FrequencyChunk},
    constants::MAD_TO_SIGMA,
    math::{mean, median, median_absolute_deviation},
    params::ContinuumParams,
    primitives::{ImagingPrimitive, RestoringBeam, StackContribution, StatsProbe},
    selfcal::{ChunkResult, RejectReason},
    store::{ParamStore, StoreField, StoreKey},
};

/// One chunk's contribution to the stacked image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub chunk: usize,

    /// Normalized combination weight (mean 1 across contributions).
    pub weight: f64,
}

/// A chunk excluded from stacking, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub chunk: usize,
    pub reason: RejectReason,
}

/// The final combined product for a beam. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackedImage {
    /// The common restoring beam all contributions were convolved to. None
    /// when no chunk was accepted.
    pub common_beam: Option<RestoringBeam>,

    pub contributions: Vec<Contribution>,
    pub rejections: Vec<Rejection>,

    /// Whether the combined image passed its sanity bounds. A beam with
    /// zero accepted chunks is invalid, not an error.
    pub valid: bool,

    pub image: Option<PathBuf>,
}

/// Consumes all per-chunk results of a beam and builds the stacked image.
pub struct Stacker<'a> {
    pub params: &'a ContinuumParams,
    pub imaging: &'a dyn ImagingPrimitive,
    pub probe: &'a dyn StatsProbe,
    pub store: &'a ParamStore,
}

impl Stacker<'_> {
    /// Validate, convolve, weight and combine the chunks' final images. The
    /// result (including an invalid one) is persisted to the parameter
    /// store.
    pub fn stack(
        &self,
        chunks: &[FrequencyChunk],
        results: &[ChunkResult],
    ) -> Result<StackedImage, StackingError> {
        let mut rejections: Vec<Rejection> = vec![];
        let mut accepted: Vec<(&FrequencyChunk, &ChunkResult, PathBuf, RestoringBeam)> = vec![];

        // Sanity-check every chunk's final image.
        for result in results {
            let chunk = match chunks.iter().find(|c| c.index == result.chunk) {
                Some(chunk) => chunk,
                // A stored result with no chunk definition in this run. It
                // can't contribute, but it must still show up in the summary.
                None => {
                    warn!(
                        "Chunk {}: result has no matching frequency chunk; excluded",
                        result.chunk
                    );
                    rejections.push(Rejection {
                        chunk: result.chunk,
                        reason: RejectReason::UpstreamDataMissing,
                    });
                    continue;
                }
            };
            if !result.success {
                rejections.push(Rejection {
                    chunk: result.chunk,
                    reason: result
                        .reject_reason
                        .unwrap_or(RejectReason::ImageInvalid),
                });
                continue;
            }
            let beam = match result.restoring_beam {
                Some(beam) => beam,
                None => {
                    rejections.push(Rejection {
                        chunk: result.chunk,
                        reason: RejectReason::ImageInvalid,
                    });
                    continue;
                }
            };
            let workspace = ChunkWorkspace::new(&self.params.beam_dir, chunk);
            let final_image = workspace.image(result.last_major, result.last_minor);
            match self.probe.stats(&final_image) {
                Ok(stats) => match self.params.sanity_bounds.check(stats) {
                    Ok(()) => accepted.push((chunk, result, final_image, beam)),
                    Err(violation) => {
                        warn!("Chunk {}: final image rejected: {violation}", result.chunk);
                        rejections.push(Rejection {
                            chunk: result.chunk,
                            reason: RejectReason::ImageInvalid,
                        });
                    }
                },
                Err(e) => {
                    warn!("Chunk {}: final image unreadable: {e}", result.chunk);
                    rejections.push(Rejection {
                        chunk: result.chunk,
                        reason: RejectReason::ImageInvalid,
                    });
                }
            }
        }

        // Common restoring beam with outlier rejection.
        let beams: Vec<(usize, RestoringBeam)> = accepted
            .iter()
            .map(|(chunk, _, _, beam)| (chunk.index, *beam))
            .collect();
        let (common, outliers) = common_beam(
            &beams,
            self.params.beam_mad_threshold,
            self.params.beam_safety_factor,
        );
        for &outlier in &outliers {
            warn!("Chunk {outlier}: rejected for outlier synthesised beam parameters");
            rejections.push(Rejection {
                chunk: outlier,
                reason: RejectReason::SynthesisedBeam,
            });
        }
        accepted.retain(|(chunk, ..)| !outliers.contains(&chunk.index));

        let common = match (common, accepted.is_empty()) {
            (Some(common), false) => common,
            _ => {
                warn!(
                    "Beam {}: no chunks accepted for stacking; no continuum image produced",
                    self.params.beam
                );
                let stacked = StackedImage {
                    common_beam: None,
                    contributions: vec![],
                    rejections,
                    valid: false,
                    image: None,
                };
                self.persist(&stacked)?;
                return Ok(stacked);
            }
        };
        info!(
            "Beam {}: common restoring beam {:.2}\" x {:.2}\" at {:.1} deg",
            self.params.beam, common.bmaj, common.bmin, common.bpa
        );

        // Convolve each accepted chunk to the common beam and re-validate.
        let mut convolved: Vec<(usize, PathBuf, f64, f64)> = vec![];
        for (chunk, result, final_image, _) in &accepted {
            let workspace = ChunkWorkspace::new(&self.params.beam_dir, chunk);
            let out = workspace.convolved();
            let stats = self
                .imaging
                .convolve(final_image, &common, &out)
                .and_then(|()| self.probe.stats(&out));
            match stats.map(|stats| self.params.sanity_bounds.check(stats)) {
                Ok(Ok(())) => {
                    // Unwrap is fine: successful results always carry these.
                    let weight = result.weight.unwrap_or(0.0);
                    let rms = result.rms.unwrap_or(f64::NAN);
                    convolved.push((chunk.index, out, weight, rms));
                }
                Ok(Err(violation)) => {
                    warn!("Chunk {}: convolved image rejected: {violation}", chunk.index);
                    rejections.push(Rejection {
                        chunk: chunk.index,
                        reason: RejectReason::ImageInvalid,
                    });
                }
                Err(e) => {
                    warn!("Chunk {}: convolution failed: {e}", chunk.index);
                    rejections.push(Rejection {
                        chunk: chunk.index,
                        reason: RejectReason::ImageInvalid,
                    });
                }
            }
        }

        if convolved.is_empty() {
            let stacked = StackedImage {
                common_beam: Some(common),
                contributions: vec![],
                rejections,
                valid: false,
                image: None,
            };
            self.persist(&stacked)?;
            return Ok(stacked);
        }

        // Inverse-variance weights, normalized to mean 1.
        let raw_weights: Vec<f64> = convolved.iter().map(|(_, _, w, _)| *w).collect();
        let weight_mean = mean(&raw_weights);
        let contributions: Vec<StackContribution> = convolved
            .iter()
            .map(|(_, image, weight, rms)| StackContribution {
                image: image.clone(),
                weight: weight / weight_mean,
                rms: *rms,
            })
            .collect();

        let out = self.params.beam_dir.join("image_mf");
        let valid = match self
            .imaging
            .stack(&contributions, &out)
            .and_then(|()| self.probe.stats(&out))
        {
            Ok(stats) => match self.params.sanity_bounds.check(stats) {
                Ok(()) => true,
                Err(violation) => {
                    warn!("Beam {}: combined image rejected: {violation}", self.params.beam);
                    false
                }
            },
            Err(e) => {
                warn!("Beam {}: combining chunks failed: {e}", self.params.beam);
                false
            }
        };

        let stacked = StackedImage {
            common_beam: Some(common),
            contributions: convolved
                .iter()
                .zip(contributions.iter())
                .map(|(&(chunk, ..), c)| Contribution {
                    chunk,
                    weight: c.weight,
                })
                .collect(),
            rejections,
            valid,
            image: valid.then_some(out),
        };
        info!(
            "Beam {}: stacked {} chunks, {} rejected ({})",
            self.params.beam,
            stacked.contributions.len(),
            stacked.rejections.len(),
            stacked
                .rejections
                .iter()
                .map(|r| format!("{}: {}", r.chunk, r.reason))
                .join(", ")
        );
        self.persist(&stacked)?;
        Ok(stacked)
    }

    fn persist(&self, stacked: &StackedImage) -> Result<(), StackingError> {
        self.store.set(
            StoreKey {
                beam: self.params.beam,
                chunk: None,
                field: StoreField::StackedImage,
            },
            stacked,
        )?;
        Ok(())
    }
}

/// Compute the common restoring beam across chunks, rejecting outliers by
/// median absolute deviation on each of (bmaj, bmin, bpa) independently. A
/// chunk flagged on any dimension is excluded. The common beam is the
/// maximum major/minor axis of the survivors scaled by `safety_factor`, with
/// their median position angle.
///
/// Returns the common beam (None if no chunk survives) and the rejected
/// chunk indices.
pub fn common_beam(
    beams: &[(usize, RestoringBeam)],
    mad_threshold: f64,
    safety_factor: f64,
) -> (Option<RestoringBeam>, Vec<usize>) {
    if beams.is_empty() {
        return (None, vec![]);
    }

    let bmajs: Vec<f64> = beams.iter().map(|(_, b)| b.bmaj).collect();
    let bmins: Vec<f64> = beams.iter().map(|(_, b)| b.bmin).collect();
    let bpas: Vec<f64> = beams.iter().map(|(_, b)| b.bpa).collect();

    let mut rejected: Vec<usize> = vec![];
    for (i, &(chunk, _)) in beams.iter().enumerate() {
        let outlier = is_mad_outlier(&bmajs, i, mad_threshold)
            || is_mad_outlier(&bmins, i, mad_threshold)
            || is_mad_outlier(&bpas, i, mad_threshold);
        if outlier {
            rejected.push(chunk);
        }
    }

    let kept: Vec<&RestoringBeam> = beams
        .iter()
        .filter(|(chunk, _)| !rejected.contains(chunk))
        .map(|(_, b)| b)
        .collect();
    if kept.is_empty() {
        return (None, rejected);
    }

    let max_bmaj = kept.iter().map(|b| b.bmaj).fold(f64::MIN, f64::max);
    let max_bmin = kept.iter().map(|b| b.bmin).fold(f64::MIN, f64::max);
    let kept_bpas: Vec<f64> = kept.iter().map(|b| b.bpa).collect();

    (
        Some(RestoringBeam {
            bmaj: max_bmaj * safety_factor,
            bmin: max_bmin * safety_factor,
            bpa: median(&kept_bpas),
        }),
        rejected,
    )
}

/// Is `values[i]` an outlier by the MAD criterion? The MAD is scaled to a
/// Gaussian sigma estimate. When the MAD is 0 (the majority of values are
/// identical), any value that differs from the median is an outlier.
fn is_mad_outlier(values: &[f64], i: usize, threshold: f64) -> bool {
    let med = median(values);
    let mad = median_absolute_deviation(values);
    let deviation = (values[i] - med).abs();
    if mad == 0.0 {
        deviation > f64::EPSILON * med.abs().max(1.0)
    } else {
        deviation > threshold * MAD_TO_SIGMA * mad
    }
}
