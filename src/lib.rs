//! EasyStencil: turn photos into tattoo stencils, then touch them up by hand.

#![allow(clippy::too_many_arguments)]

#[macro_use]
pub mod logger;
pub mod app;
pub mod cli;
pub mod components;
pub mod error;
pub mod io;
pub mod ops;
pub mod raster;
pub mod session;
pub mod settings;
pub mod store;
pub mod styles;

pub use error::StencilError;
pub use raster::RasterImage;
pub use session::SessionController;
