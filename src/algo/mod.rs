//! Mesh editing algorithms.
//!
//! - **Classification**: point-on-face and point-on-edge projection, planar
//!   segment intersection, Delaunay and flip predicates
//! - **Insertion**: point, Delaunay point, and edge insertion with
//!   legalization by edge flips
//! - **Curves**: drivers that embed polyline curves into a surface
//! - **Partitioning**: face regrouping along feature edges

pub mod classify;
pub mod curves;
pub mod insert;
pub mod partition;
