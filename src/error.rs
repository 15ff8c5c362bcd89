// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The top-level error type wrapping every module's errors.

use thiserror::Error;

use crate::{
    params::ParamsError, primitives::PrimitiveError, schedule::ScheduleError,
    selfcal::SelfCalError, stacking::StackingError, store::StoreError,
};

#[derive(Error, Debug)]
pub enum ApercalError {
    #[error("{0}")]
    Params(#[from] ParamsError),

    #[error("{0}")]
    Schedule(#[from] ScheduleError),

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Primitive(#[from] PrimitiveError),

    #[error("{0}")]
    SelfCal(#[from] SelfCalError),

    #[error("{0}")]
    Stacking(#[from] StackingError),
}
