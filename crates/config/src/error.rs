// Copyright The blitz authors
// SPDX-License-Identifier: Apache-2.0

//! Errors for the config crate.

use miette::Diagnostic;
use std::path::PathBuf;

/// Errors that can occur while loading or validating configuration.
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum Error {
    /// A collection of errors found while validating a configuration.
    #[error("Invalid configuration: {errors:?}")]
    #[diagnostic(code(blitz::config::invalid_configuration))]
    InvalidConfiguration {
        /// Every validation error found in the document.
        #[related]
        errors: Vec<Error>,
    },

    /// A configuration file could not be read.
    #[error("Failed to read `{path}`: {details}", path = path.display())]
    #[diagnostic(code(blitz::config::file_read_error))]
    FileRead {
        /// The path that could not be read.
        path: PathBuf,
        /// A description of the underlying I/O error.
        details: String,
    },

    /// A configuration document could not be deserialized.
    #[error("YAML deserialization error in {context}: {details}")]
    #[diagnostic(code(blitz::config::deserialization_error))]
    Deserialization {
        /// The document in which the error occurred.
        context: String,
        /// A description of the error reported by the deserializer.
        details: String,
    },

    /// A field holds a value outside its permitted range.
    #[error("Invalid value for `{field}`: {details}")]
    #[diagnostic(code(blitz::config::invalid_value))]
    InvalidValue {
        /// The offending field, dotted from the document root.
        field: String,
        /// Why the value was rejected.
        details: String,
    },
}

impl Error {
    /// Wraps a non-empty list of validation errors, or returns `Ok(())`.
    pub fn from_validation(errors: Vec<Error>) -> Result<(), Error> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidConfiguration { errors })
        }
    }
}
