//! Protein-metabolite association extraction for the HMDB XML exports.
//!
//! The metabolite export is read once into a [`metabolite::MetaboliteIndex`];
//! the protein export is then streamed through a
//! [`protein::AssociationExtractor`], which yields one
//! [`domain::AssociationDocument`] per resolvable association.

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod metabolite;
pub mod output;
pub mod protein;
pub mod xml;
