// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend implementations for different spatial strategies.
//!
//! - `flatvec`: flat vector with linear scans (small, simple).
//! - `rtree`: generic R-tree (`T: Scalar`) with an area/margin split (aliases: `RTreeI64`, `RTreeF64`).
//!
//! Split note
//! ----------
//! When a node overflows, its children are sorted along each axis by centroid and
//! every split point `k` with at least `min_children` entries on both sides is scored:
//!
//! `cost(k) = area(LB_k) * k + area(RB_k) * (n - k)`
//!
//! where `LB_k` and `RB_k` bound the first `k` and the remaining `n - k` entries.
//! Prefix/suffix boxes make each axis O(n). Ties (common with zero-area boxes such as
//! points or axis-parallel segments) fall back to the summed margins of the two halves.

pub mod flatvec;
pub mod rtree;
