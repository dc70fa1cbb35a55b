//! Binary-payload filtering.
//!
//! The concatenated binary objects of an RPT form one document; [`detect`]
//! classifies it, [`pdf`] and [`afp`] subset it down to the selected pages.

pub mod afp;
pub mod detect;
pub mod pdf;
