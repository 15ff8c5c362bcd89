// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors that can escape the chunk driver. Chunk-local imaging failures
//! never appear here; they are recorded on [`ChunkResult`](super::ChunkResult).

use thiserror::Error;

use crate::{params::ParamsError, schedule::ScheduleError, store::StoreError};

#[derive(Error, Debug)]
pub enum SelfCalError {
    #[error(transparent)]
    Params(#[from] ParamsError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Couldn't create a chunk working directory: {0}")]
    Io(#[from] std::io::Error),
}
