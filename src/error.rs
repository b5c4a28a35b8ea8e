// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Failure to run the external spell checker.
///
/// This is kept apart from [`Error`] so that callers can tell "the
/// checker never ran" from "the checker found nothing".
#[derive(Error, Debug)]
pub enum CheckerError {
    #[error("Could not run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("IO error while talking to {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Could not read {path:?} as PO file: {message}")]
    CatalogRead { path: PathBuf, message: String },
    #[error(transparent)]
    Checker(#[from] CheckerError),
    /// The checker output does not line up with the lines sent to it.
    #[error("Internal error, hunspell output is out of sync with its input: {0}")]
    Protocol(String),
}

pub type Result<T> = std::result::Result<T, Error>;
