//! Residual and Jacobian assembly for nodal discontinuous Galerkin (DG) discretizations
//! of systems of conservation laws.
//!
//! The central type is [`DgOperator`](assembly::DgOperator), which evaluates the strong-form
//! DG residual on cells, boundary faces and interior faces. Local Jacobians are obtained
//! with forward-mode automatic differentiation through [`Fad`](fad::Fad), so that
//! physics models only need to implement their flux laws once, generically over the scalar type.
//!
//! The crate also contains a small reference discretization on structured Cartesian meshes
//! ([`space::StructuredDgSpace`]), a few physics models ([`physics`]) and a system-level driver
//! ([`assembly::DgSystem`]) that loops over all mesh entities.

pub mod assembly;
pub mod fad;
pub mod flux;
pub mod parameters;
pub mod physics;
pub mod quadrature;
pub mod space;

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;

pub use fad::{Fad, Real};
