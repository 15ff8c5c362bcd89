// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors that can escape the stacker. Per-chunk convolution/validation
//! failures are recorded as rejections, never raised.

use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum StackingError {
    #[error(transparent)]
    Store(#[from] StoreError),
}
