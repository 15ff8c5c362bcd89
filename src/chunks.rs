// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Frequency chunks and their on-disk workspaces.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One contiguous sub-band of the observation, imaged independently of all
/// other chunks. Created upstream when the dataset is split; this engine
/// only ever reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyChunk {
    /// The chunk index within the beam.
    pub index: usize,

    /// The number of input channels binned into each output channel of this
    /// chunk.
    pub channel_bin: usize,

    /// The chunk's calibrated visibility dataset. Owned by the
    /// conversion/flagging stage; read-only here.
    pub visibility: PathBuf,
}

/// The working directory of one chunk, with the conventional artifact names
/// of the imaging loop.
///
/// Each chunk gets a disjoint directory, so chunks can be imaged in parallel
/// without their intermediate files clobbering each other. The dirty
/// map/beam pair is made once per major cycle; masks, models, restored
/// images and residuals are named by (major, minor) cycle index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkWorkspace {
    dir: PathBuf,
}

impl ChunkWorkspace {
    /// The workspace of `chunk` under the beam-level working directory.
    pub fn new(beam_dir: &Path, chunk: &FrequencyChunk) -> ChunkWorkspace {
        ChunkWorkspace {
            dir: beam_dir.join(format!("{:02}", chunk.index)),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The dirty map of a major cycle.
    pub fn map(&self, major: usize) -> PathBuf {
        self.dir.join(format!("map_{major:02}"))
    }

    /// The synthesised (dirty) beam of a major cycle.
    pub fn beam(&self, major: usize) -> PathBuf {
        self.dir.join(format!("beam_{major:02}"))
    }

    pub fn mask(&self, major: usize, minor: usize) -> PathBuf {
        self.dir.join(format!("mask_{major:02}_{minor:02}"))
    }

    pub fn model(&self, major: usize, minor: usize) -> PathBuf {
        self.dir.join(format!("model_{major:02}_{minor:02}"))
    }

    /// The restored image of a minor cycle.
    pub fn image(&self, major: usize, minor: usize) -> PathBuf {
        self.dir.join(format!("image_{major:02}_{minor:02}"))
    }

    pub fn residual(&self, major: usize, minor: usize) -> PathBuf {
        self.dir.join(format!("residual_{major:02}_{minor:02}"))
    }

    /// A chunk's image convolved to the common restoring beam, ready for
    /// stacking.
    pub fn convolved(&self) -> PathBuf {
        self.dir.join("image_conv")
    }

    /// Create the directory if it doesn't exist yet.
    pub fn create(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)
    }
}
