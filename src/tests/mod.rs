// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Shared test helpers: mock collaborators that write empty artifact files
//! and return configured statistics, plus a call log for asserting how the
//! engine drove them.

use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use crate::{
    chunks::FrequencyChunk,
    primitives::{
        GainSolver, ImageStats, ImagingPrimitive, InvertSettings, NoiseModel, PrimitiveError,
        RestoreMode, RestoringBeam, SolveMode, StackContribution, StatsProbe,
    },
};

/// Statistics that pass all default validity checks.
pub(crate) const GOOD_STATS: ImageStats = ImageStats {
    min: -0.1,
    max: 1.0,
    stddev: 0.01,
};

/// A mock imaging engine, statistics probe and noise model in one. Every
/// operation records a call string, optionally fails if a configured needle
/// matches the call, and touches its output files so artifact-existence
/// checks pass.
pub(crate) struct MockImaging {
    /// `(needle, stats)` rules; the first rule whose needle is contained in
    /// the probed path wins. Falls back to [`GOOD_STATS`].
    pub(crate) stats_rules: Mutex<Vec<(String, ImageStats)>>,

    /// `(needle, beam)` rules for `restoring_beam`, by path substring.
    pub(crate) beam_rules: Mutex<Vec<(String, RestoringBeam)>>,

    /// Needles that make a call fail when contained in its call string.
    pub(crate) fail: Mutex<Vec<String>>,

    /// Every call made, in order.
    pub(crate) calls: Mutex<Vec<String>>,

    /// Theoretical noise returned for every chunk.
    pub(crate) noise: f64,
}

pub(crate) const DEFAULT_BEAM: RestoringBeam = RestoringBeam {
    bmaj: 12.0,
    bmin: 10.0,
    bpa: 5.0,
};

impl MockImaging {
    pub(crate) fn new() -> MockImaging {
        MockImaging {
            stats_rules: Mutex::new(vec![]),
            beam_rules: Mutex::new(vec![]),
            fail: Mutex::new(vec![]),
            calls: Mutex::new(vec![]),
            noise: 1e-4,
        }
    }

    pub(crate) fn stats_rule(&self, needle: &str, stats: ImageStats) {
        self.stats_rules.lock().unwrap().push((needle.to_string(), stats));
    }

    pub(crate) fn fail_on(&self, needle: &str) {
        self.fail.lock().unwrap().push(needle.to_string());
    }

    pub(crate) fn calls_containing(&self, needle: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.contains(needle))
            .cloned()
            .collect()
    }

    /// Calls of one operation only: matches on the `op:` prefix, so e.g.
    /// `clean:` doesn't also pick up `restore:clean:` records.
    pub(crate) fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .cloned()
            .collect()
    }

    fn record(&self, call: String) -> Result<(), PrimitiveError> {
        self.calls.lock().unwrap().push(call.clone());
        if self.fail.lock().unwrap().iter().any(|n| call.contains(n)) {
            return Err(PrimitiveError::TaskFailed {
                task: "mock",
                message: call,
            });
        }
        Ok(())
    }

    fn touch(&self, path: &Path) -> Result<(), PrimitiveError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, b"")?;
        Ok(())
    }
}

impl ImagingPrimitive for MockImaging {
    fn invert(
        &self,
        _vis: &Path,
        map: &Path,
        beam: &Path,
        _settings: &InvertSettings,
    ) -> Result<(), PrimitiveError> {
        self.record(format!("invert:{}", map.display()))?;
        self.touch(map)?;
        self.touch(beam)
    }

    fn initial_mask(&self, _vis: &Path, mask: &Path) -> Result<(), PrimitiveError> {
        self.record(format!("initial_mask:{}", mask.display()))?;
        self.touch(mask)
    }

    fn regrid_mask(&self, src: &Path, mask: &Path) -> Result<(), PrimitiveError> {
        self.record(format!("regrid_mask:{}->{}", src.display(), mask.display()))?;
        self.touch(mask)
    }

    fn mask_from_image(
        &self,
        image: &Path,
        _threshold: f64,
        mask: &Path,
    ) -> Result<(), PrimitiveError> {
        self.record(format!(
            "mask_from_image:{}->{}",
            image.display(),
            mask.display()
        ))?;
        self.touch(mask)
    }

    fn clean(
        &self,
        _map: &Path,
        _beam: &Path,
        _mask: &Path,
        _cutoff: f64,
        _max_iterations: u32,
        starting_model: Option<&Path>,
        model: &Path,
    ) -> Result<(), PrimitiveError> {
        let start = starting_model
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "none".to_string());
        self.record(format!("clean:{}:start={start}", model.display()))?;
        self.touch(model)
    }

    fn restore(
        &self,
        _map: &Path,
        _beam: &Path,
        _model: &Path,
        mode: RestoreMode,
        out: &Path,
    ) -> Result<(), PrimitiveError> {
        self.record(format!("restore:{mode}:{}", out.display()))?;
        self.touch(out)
    }

    fn restoring_beam(&self, image: &Path) -> Result<RestoringBeam, PrimitiveError> {
        self.record(format!("restoring_beam:{}", image.display()))?;
        let path = image.display().to_string();
        let rules = self.beam_rules.lock().unwrap();
        Ok(rules
            .iter()
            .find(|(needle, _)| path.contains(needle))
            .map(|(_, beam)| *beam)
            .unwrap_or(DEFAULT_BEAM))
    }

    fn convolve(
        &self,
        _image: &Path,
        _beam: &RestoringBeam,
        out: &Path,
    ) -> Result<(), PrimitiveError> {
        self.record(format!("convolve:{}", out.display()))?;
        self.touch(out)
    }

    fn stack(
        &self,
        contributions: &[StackContribution],
        out: &Path,
    ) -> Result<(), PrimitiveError> {
        self.record(format!("stack:{}:{}", contributions.len(), out.display()))?;
        self.touch(out)
    }
}

impl StatsProbe for MockImaging {
    fn stats(&self, image: &Path) -> Result<ImageStats, PrimitiveError> {
        let path = image.display().to_string();
        let rules = self.stats_rules.lock().unwrap();
        Ok(rules
            .iter()
            .find(|(needle, _)| path.contains(needle))
            .map(|(_, stats)| *stats)
            .unwrap_or(GOOD_STATS))
    }
}

impl NoiseModel for MockImaging {
    fn theoretical_noise(&self, chunk: &FrequencyChunk) -> Result<f64, PrimitiveError> {
        self.record(format!("noise:{}", chunk.index))?;
        Ok(self.noise)
    }
}

/// A mock gain solver with the same needle-based failure injection.
pub(crate) struct MockSolver {
    pub(crate) fail: Mutex<Vec<String>>,
    pub(crate) calls: Mutex<Vec<String>>,
}

impl MockSolver {
    pub(crate) fn new() -> MockSolver {
        MockSolver {
            fail: Mutex::new(vec![]),
            calls: Mutex::new(vec![]),
        }
    }

    pub(crate) fn fail_on(&self, needle: &str) {
        self.fail.lock().unwrap().push(needle.to_string());
    }
}

impl GainSolver for MockSolver {
    fn solve_gains(
        &self,
        vis: &Path,
        _model: &Path,
        uv_range: (f64, f64),
        solution_interval: f64,
        mode: SolveMode,
    ) -> Result<(), PrimitiveError> {
        let call = format!(
            "solve:{}:{}-{}:{}:{mode}",
            vis.display(),
            uv_range.0,
            uv_range.1,
            solution_interval
        );
        self.calls.lock().unwrap().push(call.clone());
        if self.fail.lock().unwrap().iter().any(|n| call.contains(n)) {
            return Err(PrimitiveError::TaskFailed {
                task: "selfcal",
                message: call,
            });
        }
        Ok(())
    }
}

/// A chunk whose (empty) visibility file is created on disk under `dir`.
pub(crate) fn make_chunk(dir: &Path, index: usize) -> FrequencyChunk {
    let visibility: PathBuf = dir.join(format!("chunk_{index:02}.mir"));
    std::fs::write(&visibility, b"").unwrap();
    FrequencyChunk {
        index,
        channel_bin: 64,
        visibility,
    }
}
