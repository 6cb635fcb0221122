//! Body parsers for the supported submission content types.
//!
//! Each parser fills a [`FormData`](crate::models::FormData) with values in
//! the order the fields first appeared in the raw body.

pub mod json;
pub mod multipart;
pub mod urlencoded;
